//! Inheritance graph and virtual-method grouping.
//!
//! Built once over all module units after project initialization, the [`InheritMap`]
//! records for every type its base edge, interface edges, and the reverse (subtype)
//! adjacency, resolving targets across module boundaries where possible and flagging an
//! edge external when the target lives outside the project.
//!
//! On top of the graph sits the method-group engine. Two virtual methods are linked when
//! one's declaring type is a base type or implemented interface of the other's
//! (transitively, in either direction) and their parameter/return signatures match;
//! linked methods form one [`MethodGroup`] that must rename in lockstep or be skipped in
//! lockstep. Groups are computed lazily the first time any method of a hierarchy is
//! visited and cached in an arena: repeated lookups for methods of the same group yield
//! the same [`GroupId`], which is what group identity means.
//!
//! # External groups
//!
//! A group can never be renamed when its override or implementation structure crosses an
//! edge the project cannot see, because the invisible side cannot be patched:
//!
//! - a reuse-slot virtual whose declaration chain hits an external or missing base
//!   before an in-scope method with a matching signature, or
//! - any public virtual in a hierarchy that implements an external interface (implicit
//!   interface implementation is matched by the runtime, invisibly to the tool).
//!
//! New-slot virtuals never override anything above them, so an external base class alone
//! does not contaminate them.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

use boxcar::Vec as BoxcarVec;
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;

use crate::{
    metadata::{
        model::{ModuleDef, TypeDefOrRef},
        MethodKey, TypeKey,
    },
    project::Project,
};

/// One base-type or interface edge of the graph.
#[derive(Debug, Clone)]
pub struct TypeEdge {
    /// Display name of the target type
    pub name: String,
    /// Resolved in-scope target, `None` when the edge is external or unresolvable
    pub target: Option<TypeKey>,
}

impl TypeEdge {
    /// Whether the edge leaves the project's module set.
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.target.is_none()
    }
}

/// A virtual method as the grouping engine sees it.
#[derive(Debug, Clone)]
struct VirtualMethod {
    key: MethodKey,
    new_slot: bool,
    public: bool,
}

/// Per-type node of the graph.
#[derive(Debug)]
struct TypeNode {
    base: Option<TypeEdge>,
    interfaces: Vec<TypeEdge>,
    subtypes: Vec<TypeKey>,
    virtuals: Vec<VirtualMethod>,
}

/// Identity of a method group within its [`InheritMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(usize);

/// An equivalence class of virtual methods that share one rename decision.
#[derive(Debug)]
pub struct MethodGroup {
    /// Member method keys, closure order
    pub methods: Vec<MethodKey>,
    /// Whether the group touches an unresolvable base or interface
    pub external: bool,
    /// The decided group name, unset until the first pass decides it
    name: RwLock<Option<String>>,
}

impl MethodGroup {
    /// The decided name, if any.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        read_lock!(self.name).clone()
    }

    /// Decide (or re-decide, during retraction) the group name.
    pub fn set_name(&self, name: &str) {
        *write_lock!(self.name) = Some(name.to_string());
    }

    /// Distinct declaring types of the members, closure order.
    #[must_use]
    pub fn type_keys(&self) -> Vec<TypeKey> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for method in &self.methods {
            if seen.insert(method.type_key.clone()) {
                out.push(method.type_key.clone());
            }
        }
        out
    }
}

/// The inheritance graph plus the lazily-populated method-group arena.
pub struct InheritMap {
    nodes: SkipMap<TypeKey, TypeNode>,
    groups: BoxcarVec<MethodGroup>,
    group_of: DashMap<MethodKey, GroupId>,
}

impl InheritMap {
    /// Build the graph over every type of every module unit.
    ///
    /// Runs once, after [`Project::init`]; the graph is read-only afterwards apart from
    /// the group names living inside the arena.
    #[must_use]
    pub fn build(project: &Project) -> Self {
        let mut ordered_keys = Vec::new();
        let mut nodes: HashMap<TypeKey, TypeNode> = HashMap::new();

        for unit in project.modules() {
            let module = unit.module();
            for (index, ty) in module.types.iter().enumerate() {
                if ty.is_module_type() {
                    continue;
                }
                let key = TypeKey::for_type(module, index);
                let base = ty
                    .base
                    .as_ref()
                    .map(|edge| Self::resolve_edge(project, module, *edge));
                let interfaces = ty
                    .interfaces
                    .iter()
                    .map(|edge| Self::resolve_edge(project, module, *edge))
                    .collect();
                let virtuals = ty
                    .methods
                    .iter()
                    .filter(|m| m.is_virtual())
                    .map(|m| VirtualMethod {
                        key: MethodKey::new(key.clone(), &m.name, m.param_sig()),
                        new_slot: m.is_new_slot(),
                        public: m.flags.is_public(),
                    })
                    .collect();

                ordered_keys.push(key.clone());
                nodes.insert(
                    key,
                    TypeNode {
                        base,
                        interfaces,
                        subtypes: Vec::new(),
                        virtuals,
                    },
                );
            }
        }

        // reverse adjacency, in project processing order for reproducible closures
        for key in &ordered_keys {
            let mut targets = Vec::new();
            if let Some(node) = nodes.get(key) {
                if let Some(base) = &node.base {
                    targets.extend(base.target.clone());
                }
                for iface in &node.interfaces {
                    targets.extend(iface.target.clone());
                }
            }
            for target in targets {
                if let Some(node) = nodes.get_mut(&target) {
                    node.subtypes.push(key.clone());
                }
            }
        }

        let map = SkipMap::new();
        for (key, node) in nodes {
            map.insert(key, node);
        }
        InheritMap {
            nodes: map,
            groups: BoxcarVec::new(),
            group_of: DashMap::new(),
        }
    }

    fn resolve_edge(project: &Project, module: &ModuleDef, edge: TypeDefOrRef) -> TypeEdge {
        match edge {
            TypeDefOrRef::Def(index) => TypeEdge {
                name: module.type_full_name(index),
                target: Some(TypeKey::for_type(module, index)),
            },
            TypeDefOrRef::Ref(handle) => {
                let row = module.type_ref(handle);
                let target = project.handle_of(&row.scope).and_then(|h| {
                    let defining = project.module(h).module();
                    defining
                        .find_any_type(&row.namespace, &row.name)
                        .map(|index| TypeKey::for_type(defining, index))
                });
                TypeEdge {
                    name: row.full_name(),
                    target,
                }
            }
        }
    }

    /// Whether the graph knows this type.
    #[must_use]
    pub fn contains_type(&self, key: &TypeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Whether the type has an external base or interface edge of its own.
    #[must_use]
    pub fn has_external_edge(&self, key: &TypeKey) -> bool {
        self.nodes.get(key).is_some_and(|entry| {
            let node = entry.value();
            node.base.as_ref().is_some_and(TypeEdge::is_external)
                || node.interfaces.iter().any(TypeEdge::is_external)
        })
    }

    /// The transitive in-scope base types (classes and interfaces) of a type,
    /// nearest-first. Used to seed derived name scopes with inherited names.
    #[must_use]
    pub fn base_types(&self, key: &TypeKey) -> Vec<TypeKey> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut out = Vec::new();
        queue.push_back(key.clone());
        visited.insert(key.clone());

        while let Some(current) = queue.pop_front() {
            let Some(entry) = self.nodes.get(&current) else {
                continue;
            };
            let node = entry.value();
            let targets = node
                .base
                .iter()
                .chain(node.interfaces.iter())
                .filter_map(|e| e.target.clone());
            for target in targets {
                if visited.insert(target.clone()) {
                    out.push(target.clone());
                    queue.push_back(target);
                }
            }
        }
        out
    }

    /// The group a virtual method belongs to, computing and caching the hierarchy
    /// closure on first visit. `None` for methods the graph does not know as virtual.
    #[must_use]
    pub fn method_group(&self, key: &MethodKey) -> Option<&MethodGroup> {
        if let Some(id) = self.group_of.get(key) {
            return self.groups.get(id.0);
        }

        let is_virtual = self.nodes.get(&key.type_key).is_some_and(|entry| {
            entry.value().virtuals.iter().any(|v| v.key == *key)
        });
        if !is_virtual {
            return None;
        }

        let id = self.compute_group(key);
        self.groups.get(id.0)
    }

    /// Resolve a method directly to its group id (same caching as
    /// [`InheritMap::method_group`]).
    #[must_use]
    pub fn group_id(&self, key: &MethodKey) -> Option<GroupId> {
        self.method_group(key)?;
        self.group_of.get(key).map(|id| *id)
    }

    /// Walk the hierarchy closure around `seed` and register the resulting group.
    fn compute_group(&self, seed: &MethodKey) -> GroupId {
        let sig = seed.sig.clone();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut members: Vec<VirtualMethod> = Vec::new();
        let mut external_interface = false;

        queue.push_back(seed.type_key.clone());
        while let Some(type_key) = queue.pop_front() {
            if !visited.insert(type_key.clone()) {
                continue;
            }
            let Some(entry) = self.nodes.get(&type_key) else {
                continue;
            };
            let node = entry.value();

            for virt in &node.virtuals {
                if virt.key.sig == sig {
                    members.push(virt.clone());
                }
            }
            if let Some(base) = &node.base {
                if let Some(target) = &base.target {
                    queue.push_back(target.clone());
                }
            }
            for iface in &node.interfaces {
                match &iface.target {
                    Some(target) => queue.push_back(target.clone()),
                    None => external_interface = true,
                }
            }
            for subtype in &node.subtypes {
                queue.push_back(subtype.clone());
            }
        }

        let mut external = external_interface && members.iter().any(|m| m.public);
        if !external {
            external = members
                .iter()
                .any(|m| !m.new_slot && !self.override_resolves_in_scope(&m.key));
        }

        let group = MethodGroup {
            methods: members.iter().map(|m| m.key.clone()).collect(),
            external,
            name: RwLock::new(None),
        };
        let id = GroupId(self.groups.push(group));
        for member in &members {
            self.group_of.insert(member.key.clone(), id);
        }
        id
    }

    /// For a reuse-slot virtual, walk the base chain looking for the slot it overrides.
    /// Resolution fails when an external or dangling edge appears before an in-scope
    /// method with a matching signature.
    fn override_resolves_in_scope(&self, key: &MethodKey) -> bool {
        let mut current = key.type_key.clone();
        loop {
            let Some(entry) = self.nodes.get(&current) else {
                return false;
            };
            let base = match entry.value().base.as_ref() {
                // no base at all: the slot is this method's own
                None => return true,
                Some(edge) => edge.clone(),
            };
            let Some(target) = base.target else {
                return false;
            };
            let Some(base_entry) = self.nodes.get(&target) else {
                return false;
            };
            if base_entry
                .value()
                .virtuals
                .iter()
                .any(|v| v.key.sig == key.sig)
            {
                return true;
            }
            current = target;
        }
    }

    /// Number of groups computed so far.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::ParamSig,
        project::{Project, Settings},
        test::factories::{
            hierarchy_project, method_key_of, widget_hierarchy_module, TestTypes,
        },
    };

    fn built() -> (Project, InheritMap, TestTypes) {
        let (project, types) = hierarchy_project();
        let map = InheritMap::build(&project);
        (project, map, types)
    }

    #[test]
    fn test_base_types_are_transitive() {
        let (_project, map, types) = built();
        let bases = map.base_types(&types.derived);
        assert!(bases.contains(&types.base));
        assert!(bases.contains(&types.contract));
    }

    #[test]
    fn test_override_pair_lands_in_one_group() {
        let (_project, map, types) = built();
        let base_run = method_key_of(&types.base, "Run");
        let derived_run = method_key_of(&types.derived, "Run");

        let a = map.group_id(&base_run).unwrap();
        let b = map.group_id(&derived_run).unwrap();
        assert_eq!(a, b);

        let group = map.method_group(&base_run).unwrap();
        assert_eq!(group.methods.len(), 3); // contract + base + derived
        assert!(!group.external);
    }

    #[test]
    fn test_group_lookup_is_cached() {
        let (_project, map, types) = built();
        let key = method_key_of(&types.base, "Run");
        let first = map.group_id(&key).unwrap();
        let second = map.group_id(&key).unwrap();
        assert_eq!(first, second);
        assert_eq!(map.group_count(), 1);
    }

    #[test]
    fn test_unrelated_signature_groups_apart() {
        let (_project, map, types) = built();
        let run = map.group_id(&method_key_of(&types.base, "Run")).unwrap();
        let other = map
            .group_id(&MethodKey::new(
                types.base.clone(),
                "Tick",
                ParamSig::new(&["System.Int64"], "System.Void"),
            ))
            .unwrap();
        assert_ne!(run, other);
    }

    #[test]
    fn test_external_interface_marks_group() {
        let (_project, map, types) = built();
        let dispose = method_key_of(&types.disposable, "Dispose");
        let group = map.method_group(&dispose).unwrap();
        assert!(group.external);
    }

    #[test]
    fn test_reuse_slot_with_external_base_is_external() {
        let mut project = Project::new(Settings::default());
        project.add_module(widget_hierarchy_module("Lib"));
        project.init().unwrap();
        let map = InheritMap::build(&project);

        // Refresh in widget_hierarchy_module reuses a slot from a base outside the
        // project; its group can never rename.
        let refresh = MethodKey::new(
            TypeKey::new("Lib", "Widgets", "Panel"),
            "Refresh",
            ParamSig::new(&[], "System.Void"),
        );
        let group = map.method_group(&refresh).unwrap();
        assert!(group.external);
    }

    #[test]
    fn test_non_virtual_has_no_group() {
        let (_project, map, types) = built();
        let key = MethodKey::new(
            types.base.clone(),
            "Helper",
            ParamSig::new(&[], "System.Void"),
        );
        assert!(map.method_group(&key).is_none());
    }
}
