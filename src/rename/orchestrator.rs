//! The rename driver and its status machine.
//!
//! [`Obfuscator`] walks all module units in a fixed order — fields, parameters,
//! properties, events, methods, then types — because later stages depend on earlier
//! decisions: accessor skip decisions must be final before the two-pass virtual-method
//! logic runs, and types rename last because the mapping and the resource renames are
//! keyed by original type names.
//!
//! Every rename is *patch then define*: first every module in `referenced_by` has its
//! matching unresolved-reference rows rewritten (and removed from its unresolved list),
//! only then is the definition itself renamed. A symbol with zero matching references is
//! a no-op during patching, never a fault.
//!
//! Virtual methods go through the method-group engine. The first pass names groups (or
//! force-skips the whole group when any member must be skipped, retracting an already
//! reserved name from every affected scope); the second pass performs the actual
//! rewrite for everything not skipped.

use std::collections::HashMap;

use crate::{
    assembly::Operand,
    hide,
    mapping::{MapWriter, TextMapWriter, XmlMapWriter},
    metadata::{
        flags::MethodSemantics,
        model::{CaValue, TypeDef},
        EventKey, FieldKey, MethodKey, ParamSig, PropertyKey, TypeKey,
    },
    project::{save_modules, ModuleHandle, ModuleLoader, ModuleWriter, Project, ProjectConfig, StrongNameSigner},
    rename::{
        inherit::InheritMap,
        map::{ObfuscationMap, ObfuscationStatus},
        namegroup::{NameGroup, NameMaker},
    },
    Result,
};

/// Full name of the opt-in/opt-out marker attribute honored by `should_rename_type`.
const OBFUSCATE_ATTRIBUTE: &str = "Dotshroud.ObfuscateAttribute";

/// Return type whose methods get their resource-name literals patched along with a type
/// rename (designer-generated resource lookup).
const RESOURCE_MANAGER: &str = "System.Resources.ResourceManager";

type SigScopes = HashMap<TypeKey, HashMap<ParamSig, NameGroup>>;

/// The top-level rename driver.
pub struct Obfuscator {
    project: Project,
    inherit: InheritMap,
    map: ObfuscationMap,
    unique_type_index: usize,
    unique_member_index: usize,
}

impl Obfuscator {
    /// Wrap an initialized project.
    ///
    /// # Panics
    /// Panics when the project has not been initialized; running the pipeline against
    /// un-indexed modules is a caller bug.
    #[must_use]
    pub fn new(project: Project) -> Self {
        assert!(
            project.is_initialized(),
            "Expected that Project::init would be called before use"
        );
        let inherit = InheritMap::build(&project);
        Obfuscator {
            project,
            inherit,
            map: ObfuscationMap::new(),
            unique_type_index: 0,
            unique_member_index: 0,
        }
    }

    /// Load a parsed descriptor through `loader` and wrap the resulting project.
    ///
    /// # Errors
    /// Propagates loading and pre-flight configuration faults.
    pub fn from_config(config: ProjectConfig, loader: &dyn ModuleLoader) -> Result<Self> {
        Ok(Self::new(Project::load(config, loader)?))
    }

    /// The obfuscation ledger accumulated so far.
    #[must_use]
    pub fn map(&self) -> &ObfuscationMap {
        &self.map
    }

    /// The underlying project.
    #[must_use]
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Consume the driver, returning the mutated project.
    #[must_use]
    pub fn into_project(self) -> Project {
        self.project
    }

    /// Run the complete in-memory pipeline: all rename stages in their fixed order,
    /// then string hiding when enabled.
    ///
    /// # Errors
    /// Only the string-hiding transform can fail (body finalization); the rename stages
    /// record soft outcomes in the map instead of erroring.
    pub fn run(&mut self) -> Result<()> {
        self.rename_fields();
        self.rename_params();
        self.rename_properties();
        self.rename_events();
        self.rename_methods();
        self.rename_types();
        if self.project.settings().hide_strings {
            self.hide_strings()?;
        }
        Ok(())
    }

    /// Whether a type participates in obfuscation at all, honoring the marker attribute
    /// and the marked-only setting.
    pub(crate) fn should_rename_type(ty: &TypeDef, marked_only: bool) -> bool {
        for attr in &ty.custom_attributes {
            if attr.attribute_type != OBFUSCATE_ATTRIBUTE {
                continue;
            }
            let ctor = match attr.ctor_args.first().map(|a| &a.value) {
                Some(CaValue::Bool(value)) => *value,
                _ => true,
            };
            let named = match attr.named_arg("ShouldObfuscate").map(|a| &a.value) {
                Some(CaValue::Bool(value)) => *value,
                _ => true,
            };
            return ctor && named;
        }
        !marked_only
    }

    /// Rename all eligible fields, grouping names per (type, field type) scope.
    pub fn rename_fields(&mut self) {
        struct FieldJob {
            field_index: usize,
            key: FieldKey,
            sig: String,
            enum_backing: bool,
            is_public: bool,
        }

        let reuse_names = self.project.settings().reuse_names;
        let marked_only = self.project.settings().marked_only;

        for handle in self.project.handles() {
            let type_count = self.project.module(handle).module().types.len();
            for type_index in 0..type_count {
                let (jobs, type_is_public) = {
                    let module = self.project.module(handle).module();
                    let ty = &module.types[type_index];
                    if ty.is_module_type() || !Self::should_rename_type(ty, marked_only) {
                        continue;
                    }
                    let type_key = TypeKey::for_type(module, type_index);
                    let jobs: Vec<FieldJob> = ty
                        .fields
                        .iter()
                        .enumerate()
                        .map(|(field_index, field)| FieldJob {
                            field_index,
                            key: FieldKey::new(type_key.clone(), &field.field_type, &field.name),
                            sig: field.field_type.clone(),
                            enum_backing: field
                                .flags
                                .contains(crate::metadata::flags::FieldAttributes::RT_SPECIAL_NAME)
                                && field.name == "value__",
                            is_public: field.flags.is_public(),
                        })
                        .collect();
                    (jobs, ty.flags.is_public())
                };

                // name scopes are per type, keyed by field type
                let mut name_groups: HashMap<String, NameGroup> = HashMap::new();
                for job in jobs {
                    let skipped = job.enum_backing
                        || self.project.module(handle).skip().should_skip_field(
                            &job.key,
                            job.is_public,
                            type_is_public,
                        );
                    if skipped {
                        self.map.update_field(
                            &job.key,
                            ObfuscationStatus::Skipped("filtered".to_string()),
                        );
                        name_groups
                            .entry(job.sig.clone())
                            .or_default()
                            .add(&job.key.name);
                        continue;
                    }

                    let new_name = if reuse_names {
                        name_groups.entry(job.sig.clone()).or_default().get_next()
                    } else {
                        let name = NameMaker::unique_name(self.unique_member_index);
                        self.unique_member_index += 1;
                        name
                    };
                    self.rename_field(handle, &job.key, type_index, job.field_index, &new_name);
                    name_groups
                        .entry(job.sig.clone())
                        .or_default()
                        .add(&new_name);
                }
            }
        }
    }

    /// Patch-then-define for one field.
    fn rename_field(
        &mut self,
        handle: ModuleHandle,
        key: &FieldKey,
        type_index: usize,
        field_index: usize,
        new_name: &str,
    ) {
        for referencing in self.project.module(handle).referenced_by().to_vec() {
            self.project
                .module_mut(referencing)
                .patch_member_refs(|module, row| key.matches_ref(module, row), new_name);
        }
        self.project.module_mut(handle).module_mut().types[type_index].fields[field_index].name =
            new_name.to_string();
        self.map
            .update_field(key, ObfuscationStatus::Renamed(new_name.to_string()));
    }

    /// Strip parameter names and rename generic parameters on methods and types.
    pub fn rename_params(&mut self) {
        let marked_only = self.project.settings().marked_only;

        for handle in self.project.handles() {
            let type_count = self.project.module(handle).module().types.len();
            for type_index in 0..type_count {
                let (method_jobs, rename_type_params) = {
                    let module = self.project.module(handle).module();
                    let ty = &module.types[type_index];
                    if ty.is_module_type() || !Self::should_rename_type(ty, marked_only) {
                        continue;
                    }
                    let type_key = TypeKey::for_type(module, type_index);
                    let type_is_public = ty.flags.is_public();
                    let skip = self.project.module(handle).skip();

                    let method_jobs: Vec<usize> = ty
                        .methods
                        .iter()
                        .enumerate()
                        .filter(|(_, m)| {
                            let key = MethodKey::new(type_key.clone(), &m.name, m.param_sig());
                            !skip.should_skip_method(&key, m.flags.is_public(), type_is_public)
                        })
                        .map(|(index, _)| index)
                        .collect();
                    let rename_type_params = !skip.should_skip_type(&type_key, type_is_public);
                    (method_jobs, rename_type_params)
                };

                let ty = &mut self.project.module_mut(handle).module_mut().types[type_index];
                for method_index in method_jobs {
                    let method = &mut ty.methods[method_index];
                    for param in &mut method.params {
                        if param.custom_attributes.is_empty() {
                            param.name = None;
                        }
                    }
                    let mut index = 0;
                    for param in &mut method.generic_params {
                        if param.custom_attributes.is_empty() {
                            param.name = NameMaker::unique_name(index);
                            index += 1;
                        }
                    }
                }
                if rename_type_params {
                    for (index, param) in ty.generic_params.iter_mut().enumerate() {
                        param.name = NameMaker::unique_name(index);
                    }
                }
            }
        }
    }

    /// Rename or drop properties. Properties with custom attributes are renamed (the
    /// attribute may be reflected over); the rest are removed outright. Skipping a
    /// property force-skips its accessors.
    pub fn rename_properties(&mut self) {
        if !self.project.settings().rename_properties {
            return;
        }

        struct PropertyJob {
            index: usize,
            key: PropertyKey,
            runtime_special: bool,
            is_public: bool,
            attribute_setter: bool,
            has_attributes: bool,
            accessor_keys: Vec<MethodKey>,
        }

        let reuse_names = self.project.settings().reuse_names;
        let marked_only = self.project.settings().marked_only;

        for handle in self.project.handles() {
            let type_count = self.project.module(handle).module().types.len();
            for type_index in 0..type_count {
                let (jobs, type_is_public) = {
                    let module = self.project.module(handle).module();
                    let ty = &module.types[type_index];
                    if ty.is_module_type() || !Self::should_rename_type(ty, marked_only) {
                        continue;
                    }
                    let type_key = TypeKey::for_type(module, type_index);

                    // a property on an attribute type with a public setter stays: it is
                    // set by name in attribute syntax
                    let on_attribute_type = match &ty.base {
                        Some(base) => base_name(module, base).ends_with("Attribute"),
                        None => false,
                    };

                    let jobs: Vec<PropertyJob> = ty
                        .properties
                        .iter()
                        .enumerate()
                        .map(|(index, prop)| {
                            let accessor_keys = [prop.get_method, prop.set_method]
                                .iter()
                                .flatten()
                                .map(|&m| MethodKey::for_method(module, type_index, m))
                                .collect();
                            let getter_public = prop
                                .get_method
                                .is_some_and(|m| ty.methods[m].flags.is_public());
                            let setter_public = prop
                                .set_method
                                .is_some_and(|m| ty.methods[m].flags.is_public());
                            PropertyJob {
                                index,
                                key: PropertyKey::for_property(module, type_index, index),
                                runtime_special: prop.flags.contains(
                                    crate::metadata::flags::PropertyAttributes::RT_SPECIAL_NAME,
                                ),
                                is_public: getter_public || setter_public,
                                attribute_setter: on_attribute_type && setter_public,
                                has_attributes: !prop.custom_attributes.is_empty(),
                                accessor_keys,
                            }
                        })
                        .collect();
                    (jobs, ty.flags.is_public())
                };

                let mut to_drop = Vec::new();
                let mut reuse_index = 0;
                for job in jobs {
                    if job.runtime_special {
                        self.map.update_property(
                            &job.key,
                            ObfuscationStatus::Skipped("runtime special".to_string()),
                        );
                        continue;
                    }
                    let filtered = self.project.module(handle).skip().should_skip_property(
                        &job.key,
                        job.is_public,
                        type_is_public,
                    );
                    if filtered {
                        self.map.update_property(
                            &job.key,
                            ObfuscationStatus::Skipped("filtered".to_string()),
                        );
                        // property skip forces accessor skip; the reverse coupling is
                        // deliberately absent
                        for accessor in job.accessor_keys {
                            self.project
                                .module_mut(handle)
                                .skip_mut()
                                .force_skip_method(accessor);
                        }
                        continue;
                    }
                    if job.attribute_setter {
                        self.map.update_property(
                            &job.key,
                            ObfuscationStatus::Skipped(
                                "public setter of a custom attribute".to_string(),
                            ),
                        );
                        continue;
                    }
                    if job.has_attributes {
                        let new_name = if reuse_names {
                            let name = NameMaker::unique_name(reuse_index);
                            reuse_index += 1;
                            name
                        } else {
                            let name = NameMaker::unique_name(self.unique_member_index);
                            self.unique_member_index += 1;
                            name
                        };
                        self.rename_property(handle, &job.key, type_index, job.index, &new_name);
                    } else {
                        to_drop.push((job.index, job.key));
                    }
                }

                for (index, key) in to_drop.into_iter().rev() {
                    self.project
                        .module_mut(handle)
                        .module_mut()
                        .types[type_index]
                        .properties
                        .remove(index);
                    self.map
                        .update_property(&key, ObfuscationStatus::Renamed("dropped".to_string()));
                }
            }
        }
    }

    /// Patch-then-define for one property.
    fn rename_property(
        &mut self,
        handle: ModuleHandle,
        key: &PropertyKey,
        type_index: usize,
        property_index: usize,
        new_name: &str,
    ) {
        for referencing in self.project.module(handle).referenced_by().to_vec() {
            self.project
                .module_mut(referencing)
                .patch_member_refs(|module, row| key.matches_ref(module, row), new_name);
        }
        self.project.module_mut(handle).module_mut().types[type_index].properties[property_index]
            .name = new_name.to_string();
        self.map
            .update_property(key, ObfuscationStatus::Renamed(new_name.to_string()));
    }

    /// Drop events (or skip them), force-skipping the accessors of skipped events.
    pub fn rename_events(&mut self) {
        if !self.project.settings().rename_events {
            return;
        }

        struct EventJob {
            index: usize,
            key: EventKey,
            runtime_special: bool,
            is_public: bool,
            accessor_keys: Vec<MethodKey>,
        }

        let marked_only = self.project.settings().marked_only;

        for handle in self.project.handles() {
            let type_count = self.project.module(handle).module().types.len();
            for type_index in 0..type_count {
                let (jobs, type_is_public) = {
                    let module = self.project.module(handle).module();
                    let ty = &module.types[type_index];
                    if ty.is_module_type() || !Self::should_rename_type(ty, marked_only) {
                        continue;
                    }
                    let jobs: Vec<EventJob> = ty
                        .events
                        .iter()
                        .enumerate()
                        .map(|(index, event)| {
                            let accessor_keys = [event.add_method, event.remove_method]
                                .iter()
                                .flatten()
                                .map(|&m| MethodKey::for_method(module, type_index, m))
                                .collect();
                            let add_public = event
                                .add_method
                                .is_some_and(|m| ty.methods[m].flags.is_public());
                            EventJob {
                                index,
                                key: EventKey::for_event(module, type_index, index),
                                runtime_special: event.flags.contains(
                                    crate::metadata::flags::EventAttributes::RT_SPECIAL_NAME,
                                ),
                                is_public: add_public,
                                accessor_keys,
                            }
                        })
                        .collect();
                    (jobs, ty.flags.is_public())
                };

                let mut to_drop = Vec::new();
                for job in jobs {
                    if job.runtime_special {
                        self.map.update_event(
                            &job.key,
                            ObfuscationStatus::Skipped("runtime special".to_string()),
                        );
                        continue;
                    }
                    let filtered = self.project.module(handle).skip().should_skip_event(
                        &job.key,
                        job.is_public,
                        type_is_public,
                    );
                    if filtered {
                        self.map.update_event(
                            &job.key,
                            ObfuscationStatus::Skipped("filtered".to_string()),
                        );
                        for accessor in job.accessor_keys {
                            self.project
                                .module_mut(handle)
                                .skip_mut()
                                .force_skip_method(accessor);
                        }
                        continue;
                    }
                    to_drop.push((job.index, job.key));
                }

                for (index, key) in to_drop.into_iter().rev() {
                    self.project
                        .module_mut(handle)
                        .module_mut()
                        .types[type_index]
                        .events
                        .remove(index);
                    self.map
                        .update_event(&key, ObfuscationStatus::Renamed("dropped".to_string()));
                }
            }
        }
    }

    /// Rename methods: first pass decides virtual groups (naming or force-skipping
    /// whole groups), seeds each type's name scopes with inherited names, and the
    /// second pass performs the rewrites.
    pub fn rename_methods(&mut self) {
        struct MethodJob {
            method_index: usize,
            key: MethodKey,
            is_virtual: bool,
            is_runtime: bool,
            special_name: bool,
            semantics: MethodSemantics,
            is_public: bool,
        }

        let marked_only = self.project.settings().marked_only;
        let rename_properties = self.project.settings().rename_properties;
        let rename_events = self.project.settings().rename_events;
        let mut base_sig_names: SigScopes = HashMap::new();

        for handle in self.project.handles() {
            let type_count = self.project.module(handle).module().types.len();

            // first pass: group decisions and early skips
            for type_index in 0..type_count {
                let (type_key, jobs, type_is_public, renames) = {
                    let module = self.project.module(handle).module();
                    let ty = &module.types[type_index];
                    if ty.is_module_type() {
                        continue;
                    }
                    let type_key = TypeKey::for_type(module, type_index);
                    let jobs = Self::collect_method_jobs(module, type_index)
                        .map(|(method_index, key)| {
                            let method = &ty.methods[method_index];
                            MethodJob {
                                method_index,
                                key,
                                is_virtual: method.is_virtual(),
                                is_runtime: method.is_runtime(),
                                special_name: method.is_special_name(),
                                semantics: method.semantics,
                                is_public: method.flags.is_public(),
                            }
                        })
                        .collect::<Vec<_>>();
                    (
                        type_key,
                        jobs,
                        ty.flags.is_public(),
                        Self::should_rename_type(ty, marked_only),
                    )
                };

                for job in jobs {
                    let mut skip: Option<String> = None;
                    if !renames {
                        skip = Some("obfuscation attribute found on type".to_string());
                    }
                    if job.is_runtime {
                        skip = Some("runtime method".to_string());
                    }
                    if self.project.module(handle).skip().should_skip_method(
                        &job.key,
                        job.is_public,
                        type_is_public,
                    ) {
                        skip = Some("filtered".to_string());
                    }

                    // skipped non-virtuals are finalized here; skipped virtuals are
                    // handled through their group below
                    if !job.is_virtual {
                        if let Some(reason) = skip {
                            self.map
                                .update_method(&job.key, ObfuscationStatus::Skipped(reason));
                        }
                        continue;
                    }

                    if job.special_name {
                        match job.semantics {
                            MethodSemantics::Getter | MethodSemantics::Setter => {
                                if !rename_properties {
                                    skip = Some("skipping properties".to_string());
                                }
                            }
                            MethodSemantics::AddOn | MethodSemantics::RemoveOn => {
                                if !rename_events {
                                    skip = Some("skipping events".to_string());
                                }
                            }
                            _ => {
                                skip = Some("virtual and special name".to_string());
                            }
                        }
                    }

                    let status = self.map.method_status(&job.key);
                    if (skip.is_some() && !status.is_skipped()) || status.is_unknown() {
                        self.decide_virtual_method(&mut base_sig_names, &job.key, skip);
                    }
                }

                // seed this type's scopes with every name already taken upstream
                for base_key in self.inherit.base_types(&type_key) {
                    let inherited: Vec<(ParamSig, NameGroup)> = base_sig_names
                        .get(&base_key)
                        .map(|scopes| {
                            scopes
                                .iter()
                                .map(|(sig, group)| (sig.clone(), group.clone()))
                                .collect()
                        })
                        .unwrap_or_default();
                    for (sig, group) in inherited {
                        name_group(&mut base_sig_names, &type_key, &sig).add_all(&group);
                    }
                }
            }

            // second pass: apply
            for type_index in 0..type_count {
                let (type_key, jobs) = {
                    let module = self.project.module(handle).module();
                    let ty = &module.types[type_index];
                    if ty.is_module_type() {
                        continue;
                    }
                    let jobs: Vec<(usize, MethodKey, bool, MethodSemantics)> =
                        Self::collect_method_jobs(module, type_index)
                            .map(|(method_index, key)| {
                                let method = &ty.methods[method_index];
                                (method_index, key, method.is_special_name(), method.semantics)
                            })
                            .collect();
                    (TypeKey::for_type(module, type_index), jobs)
                };

                for (method_index, key, special_name, semantics) in jobs {
                    if self.map.method_status(&key).is_skipped() {
                        continue;
                    }
                    if special_name {
                        match semantics {
                            MethodSemantics::Getter | MethodSemantics::Setter => {
                                if rename_properties {
                                    self.apply_method_rename(
                                        handle,
                                        &mut base_sig_names,
                                        &type_key,
                                        &key,
                                        type_index,
                                        method_index,
                                        true,
                                    );
                                } else {
                                    self.map.update_method(
                                        &key,
                                        ObfuscationStatus::Skipped("skipping properties".into()),
                                    );
                                }
                            }
                            MethodSemantics::AddOn | MethodSemantics::RemoveOn => {
                                if rename_events {
                                    self.apply_method_rename(
                                        handle,
                                        &mut base_sig_names,
                                        &type_key,
                                        &key,
                                        type_index,
                                        method_index,
                                        true,
                                    );
                                } else {
                                    self.map.update_method(
                                        &key,
                                        ObfuscationStatus::Skipped("skipping events".into()),
                                    );
                                }
                            }
                            _ => {
                                self.map.update_method(
                                    &key,
                                    ObfuscationStatus::Skipped("special name".into()),
                                );
                            }
                        }
                    } else {
                        self.apply_method_rename(
                            handle,
                            &mut base_sig_names,
                            &type_key,
                            &key,
                            type_index,
                            method_index,
                            false,
                        );
                    }
                }
            }
        }
    }

    /// The `(method index, key)` pairs of a type, declaration order.
    fn collect_method_jobs<'a>(
        module: &'a crate::metadata::model::ModuleDef,
        type_index: usize,
    ) -> impl Iterator<Item = (usize, MethodKey)> + 'a {
        let type_key = TypeKey::for_type(module, type_index);
        module.types[type_index]
            .methods
            .iter()
            .enumerate()
            .map(move |(index, method)| {
                (
                    index,
                    MethodKey::new(type_key.clone(), &method.name, method.param_sig()),
                )
            })
    }

    /// First-pass decision for one virtual method: name its group, or force the whole
    /// group to skipped (retracting an already reserved name).
    fn decide_virtual_method(
        &mut self,
        base_sig_names: &mut SigScopes,
        key: &MethodKey,
        skip: Option<String>,
    ) {
        let Some((group_name, external, members, type_keys)) =
            self.inherit.method_group(key).map(|group| {
                (
                    group.name(),
                    group.external,
                    group.methods.clone(),
                    group.type_keys(),
                )
            })
        else {
            if let Some(reason) = skip {
                self.map
                    .update_method(key, ObfuscationStatus::Skipped(reason));
            }
            return;
        };

        let sig = &key.sig;
        match group_name {
            None => {
                let mut skip = skip;
                if external {
                    skip = Some("external base class or interface".to_string());
                }

                let new_name = if skip.is_some() {
                    // an unrenamable group keeps the original name as its group name
                    key.name.clone()
                } else {
                    for type_key in &type_keys {
                        name_group(base_sig_names, type_key, sig);
                    }
                    let scopes: Vec<&NameGroup> = type_keys
                        .iter()
                        .map(|tk| &base_sig_names[tk][sig])
                        .collect();
                    NameGroup::next_across(&scopes)
                };

                if let Some(group) = self.inherit.method_group(key) {
                    group.set_name(&new_name);
                }
                for member in &members {
                    let status = match &skip {
                        Some(reason) => ObfuscationStatus::Skipped(reason.clone()),
                        None => ObfuscationStatus::WillRename(new_name.clone()),
                    };
                    self.map.update_method(member, status);
                }
                for type_key in &type_keys {
                    name_group(base_sig_names, type_key, sig).add(&new_name);
                }
            }
            Some(existing) => {
                if let Some(reason) = skip {
                    // retract: the group was named, but a member must be skipped, so
                    // the reservation is undone in every affected scope and the whole
                    // group reverts to its original name
                    debug_assert!(
                        !external,
                        "external groups are skipped when first named; their members \
                         can never reach the retraction path"
                    );
                    for type_key in &type_keys {
                        name_group(base_sig_names, type_key, sig).remove(&existing);
                    }
                    let reverted = key.name.clone();
                    if let Some(group) = self.inherit.method_group(key) {
                        group.set_name(&reverted);
                    }
                    for member in &members {
                        self.map
                            .update_method(member, ObfuscationStatus::Skipped(reason.clone()));
                    }
                    for type_key in &type_keys {
                        name_group(base_sig_names, type_key, sig).add(&reverted);
                    }
                } else {
                    debug_assert!(
                        {
                            let status = self.map.method_status(key);
                            status.is_skipped() || status.new_name() == Some(existing.as_str())
                        },
                        "a named group implies every member already carries its name"
                    );
                }
            }
        }
    }

    /// Second-pass rewrite of one method: fetch or allocate its name, patch every
    /// referencing module, rename the definition.
    #[allow(clippy::too_many_arguments)]
    fn apply_method_rename(
        &mut self,
        handle: ModuleHandle,
        base_sig_names: &mut SigScopes,
        type_key: &TypeKey,
        key: &MethodKey,
        type_index: usize,
        method_index: usize,
        clear_semantics: bool,
    ) {
        let status = self.map.method_status(key);
        let new_name = match status {
            ObfuscationStatus::Renamed(name) | ObfuscationStatus::WillRename(name) => name,
            ObfuscationStatus::Skipped(_) => return,
            ObfuscationStatus::Unknown => {
                let group = name_group(base_sig_names, type_key, &key.sig);
                let name = group.get_next();
                group.add(&name);
                name
            }
        };

        for referencing in self.project.module(handle).referenced_by().to_vec() {
            self.project
                .module_mut(referencing)
                .patch_member_refs(|module, row| key.matches_ref(module, row), &new_name);
        }
        let method =
            &mut self.project.module_mut(handle).module_mut().types[type_index].methods
                [method_index];
        method.name = new_name.clone();
        if clear_semantics {
            method.semantics = MethodSemantics::None;
        }
        self.map
            .update_method(key, ObfuscationStatus::Renamed(new_name));
    }

    /// Rename types last: synthetic namespace and short name, arity suffix preserved,
    /// nested types namespace-less, resources renamed or dropped in lockstep.
    pub fn rename_types(&mut self) {
        let reuse_names = self.project.settings().reuse_names;
        let marked_only = self.project.settings().marked_only;

        for handle in self.project.handles() {
            let (unrenamed_keys, resource_count, type_count) = {
                let module = self.project.module(handle).module();
                let keys: Vec<TypeKey> = (0..module.types.len())
                    .map(|index| TypeKey::for_type(module, index))
                    .collect();
                (keys, module.resources.len(), module.types.len())
            };
            let mut resource_candidates: Vec<usize> = (0..resource_count).collect();
            let mut type_index_counter = 0;

            for type_index in 0..type_count {
                let unrenamed_key = unrenamed_keys[type_index].clone();
                let (renames, skipped, full_name, generic_arity, nested) = {
                    let module = self.project.module(handle).module();
                    let ty = &module.types[type_index];
                    if ty.is_module_type() {
                        continue;
                    }
                    (
                        Self::should_rename_type(ty, marked_only),
                        self.project
                            .module(handle)
                            .skip()
                            .should_skip_type(&unrenamed_key, ty.flags.is_public()),
                        module.type_full_name(type_index),
                        ty.generic_params.len(),
                        ty.declaring_type.is_some(),
                    )
                };

                if !renames {
                    self.map.update_type(
                        &unrenamed_key,
                        ObfuscationStatus::Skipped("marked".to_string()),
                    );
                    self.drop_matching_resources(handle, &mut resource_candidates, &full_name, "marked");
                    continue;
                }
                if skipped {
                    self.map.update_type(
                        &unrenamed_key,
                        ObfuscationStatus::Skipped("filtered".to_string()),
                    );
                    self.drop_matching_resources(
                        handle,
                        &mut resource_candidates,
                        &full_name,
                        "filtered",
                    );
                    continue;
                }

                let (mut name, mut namespace) = if reuse_names {
                    (
                        NameMaker::unique_type_name(type_index_counter),
                        NameMaker::unique_namespace(type_index_counter),
                    )
                } else {
                    let index = self.unique_type_index;
                    self.unique_type_index += 1;
                    (
                        NameMaker::unique_name(index),
                        NameMaker::unique_namespace(index),
                    )
                };
                type_index_counter += 1;
                if generic_arity > 0 {
                    name = format!("{name}`{generic_arity}");
                }
                if nested {
                    // namespaces are meaningless for nested types
                    namespace = String::new();
                }
                let new_key = TypeKey::new(&unrenamed_key.scope, &namespace, &name);

                self.rename_matching_resources(
                    handle,
                    &mut resource_candidates,
                    type_index,
                    &full_name,
                    &new_key,
                );
                self.rename_type(handle, type_index, &unrenamed_key, &new_key);
            }

            for resource_index in resource_candidates {
                let name = self.project.module(handle).module().resources[resource_index]
                    .name
                    .clone();
                self.map.add_resource(
                    &name,
                    ObfuscationStatus::Skipped("no clear new name".to_string()),
                );
            }
        }
    }

    /// Record resources that belong to a type which is not being renamed.
    fn drop_matching_resources(
        &mut self,
        handle: ModuleHandle,
        candidates: &mut Vec<usize>,
        full_name: &str,
        reason: &str,
    ) {
        let module = self.project.module(handle).module();
        let matched: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&index| resource_stem(&module.resources[index].name) == full_name)
            .collect();
        for index in &matched {
            let name = module.resources[*index].name.clone();
            self.map
                .add_resource(&name, ObfuscationStatus::Skipped(reason.to_string()));
        }
        candidates.retain(|index| !matched.contains(index));
    }

    /// Rename resources tied to a renamed type and patch designer-generated resource
    /// lookups (`ResourceManager`-returning methods loading the type's full name).
    fn rename_matching_resources(
        &mut self,
        handle: ModuleHandle,
        candidates: &mut Vec<usize>,
        type_index: usize,
        full_name: &str,
        new_key: &TypeKey,
    ) {
        let matched: Vec<usize> = {
            let module = self.project.module(handle).module();
            candidates
                .iter()
                .copied()
                .filter(|&index| resource_stem(&module.resources[index].name) == full_name)
                .collect()
        };
        if matched.is_empty() {
            return;
        }

        let new_full_name = new_key.full_name();
        let module = self.project.module_mut(handle).module_mut();

        for method in &mut module.types[type_index].methods {
            if method.return_type != RESOURCE_MANAGER {
                continue;
            }
            let Some(body) = method.body.as_mut() else {
                continue;
            };
            for instruction in &mut body.instructions {
                if instruction.as_ldstr() == Some(full_name) {
                    instruction.operand = Operand::String(new_full_name.clone());
                }
            }
        }

        for index in &matched {
            let resource = &mut module.resources[*index];
            let old_name = resource.name.clone();
            let suffix = &old_name[full_name.len()..];
            resource.name = format!("{new_full_name}{suffix}");
            let renamed = resource.name.clone();
            self.map
                .add_resource(&old_name, ObfuscationStatus::Renamed(renamed));
        }
        candidates.retain(|index| !matched.contains(index));
    }

    /// Patch-then-define for one type.
    fn rename_type(
        &mut self,
        handle: ModuleHandle,
        type_index: usize,
        old_key: &TypeKey,
        new_key: &TypeKey,
    ) {
        for referencing in self.project.module(handle).referenced_by().to_vec() {
            self.project.module_mut(referencing).patch_type_refs(
                |row| old_key.matches_ref(row),
                &new_key.namespace,
                &new_key.name,
            );
        }
        let ty = &mut self.project.module_mut(handle).module_mut().types[type_index];
        ty.namespace = new_key.namespace.clone();
        ty.name = new_key.name.clone();
        self.map.update_type(
            old_key,
            ObfuscationStatus::Renamed(format!("[{}]{}", new_key.scope, new_key.full_name())),
        );
    }

    /// Run the string-hiding transform over every module. Must run after all renaming;
    /// the pipeline order in [`Obfuscator::run`] guarantees it runs at most once.
    pub fn hide_strings(&mut self) -> Result<()> {
        hide::hide_strings(&mut self.project)
    }

    /// Write every rewritten module to the configured output directory, re-signing
    /// originally signed ones through `signer`.
    ///
    /// # Errors
    /// See [`save_modules`].
    pub fn save_modules(
        &self,
        writer: &dyn ModuleWriter,
        signer: &dyn StrongNameSigner,
    ) -> Result<()> {
        save_modules(&self.project, writer, signer)
    }

    /// Write the mapping file (`Mapping.txt` or `Mapping.xml` per settings) to the
    /// output directory.
    ///
    /// # Errors
    /// I/O and XML serialization faults.
    pub fn save_mapping(&self) -> Result<()> {
        let settings = self.project.settings();
        let file_name = if settings.xml_mapping {
            "Mapping.xml"
        } else {
            "Mapping.txt"
        };
        let path = settings.out_path.join(file_name);
        let file = std::fs::File::create(path)?;
        if settings.xml_mapping {
            XmlMapWriter::new(file).write_map(&self.map)
        } else {
            TextMapWriter::new(file).write_map(&self.map)
        }
    }
}

/// The name scope for `(type, signature)`, created on demand.
fn name_group<'a>(
    base_sig_names: &'a mut SigScopes,
    type_key: &TypeKey,
    sig: &ParamSig,
) -> &'a mut NameGroup {
    base_sig_names
        .entry(type_key.clone())
        .or_default()
        .entry(sig.clone())
        .or_default()
}

/// Display name of a base edge without resolving it.
fn base_name(
    module: &crate::metadata::model::ModuleDef,
    base: &crate::metadata::model::TypeDefOrRef,
) -> String {
    match base {
        crate::metadata::model::TypeDefOrRef::Def(index) => module.type_full_name(*index),
        crate::metadata::model::TypeDefOrRef::Ref(handle) => module.type_ref(*handle).full_name(),
    }
}

/// The file stem a resource is matched by (`Ns.Widget.resources` → `Ns.Widget`).
fn resource_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(at) => &name[..at],
        None => name,
    }
}
