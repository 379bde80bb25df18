//! One loaded module plus its derived cross-module reference index.
//!
//! A [`ModuleUnit`] owns the mutable [`ModuleDef`] tree, the module's skip rules, its
//! position in the project reference graph, and — after [`ModuleUnit::init`] — the two
//! unresolved-reference lists the rename pass patches:
//!
//! - `unresolved_refs`: member-ref rows used by any instruction in this module whose
//!   declaring scope is another in-scope module;
//! - `unresolved_type_refs`: in-scope type-ref rows used by instructions *or* by
//!   `System.Type`-typed custom-attribute arguments (`typeof(...)` literals), which must
//!   be patched when their target type renames.
//!
//! `init` runs exactly once, after every module of the project has been added and before
//! any renaming starts; a rename pass that outran it would silently miss references.
//! Consuming either list earlier is a programming error and panics.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::{
    assembly::Operand,
    metadata::model::{MemberRefHandle, MemberRefRow, ModuleDef, TypeRefHandle, TypeRefRow},
    project::{skip::SkipSet, ModuleHandle},
};

/// One module of the project.
#[derive(Debug)]
pub struct ModuleUnit {
    module: ModuleDef,
    filename: PathBuf,
    skip: SkipSet,
    references: Vec<ModuleHandle>,
    referenced_by: Vec<ModuleHandle>,
    unresolved_refs: Option<Vec<MemberRefHandle>>,
    unresolved_type_refs: Option<Vec<TypeRefHandle>>,
}

impl ModuleUnit {
    /// Wrap a loaded module with its skip rules.
    #[must_use]
    pub fn new(module: ModuleDef, filename: &Path, skip: SkipSet) -> Self {
        ModuleUnit {
            module,
            filename: filename.to_path_buf(),
            skip,
            references: Vec::new(),
            referenced_by: Vec::new(),
            unresolved_refs: None,
            unresolved_type_refs: None,
        }
    }

    /// Module name (assembly simple name).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.module.name
    }

    /// Path the module was loaded from.
    #[must_use]
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// The owned module tree.
    #[must_use]
    pub fn module(&self) -> &ModuleDef {
        &self.module
    }

    /// Mutable access to the owned module tree.
    pub fn module_mut(&mut self) -> &mut ModuleDef {
        &mut self.module
    }

    /// This module's skip rules.
    #[must_use]
    pub fn skip(&self) -> &SkipSet {
        &self.skip
    }

    /// Mutable access to the skip rules (accessor force-skip coupling).
    pub fn skip_mut(&mut self) -> &mut SkipSet {
        &mut self.skip
    }

    /// Handles of the modules this module references.
    #[must_use]
    pub fn references(&self) -> &[ModuleHandle] {
        &self.references
    }

    /// Handles of the modules that reference this module.
    #[must_use]
    pub fn referenced_by(&self) -> &[ModuleHandle] {
        &self.referenced_by
    }

    pub(crate) fn set_adjacency(
        &mut self,
        references: Vec<ModuleHandle>,
        referenced_by: Vec<ModuleHandle>,
    ) {
        self.references = references;
        self.referenced_by = referenced_by;
    }

    /// Build the unresolved-reference index. Called by the project once all modules are
    /// loaded; `in_scope` is the set of project module names.
    pub(crate) fn init(&mut self, in_scope: &HashSet<String>) {
        let mut member_seen = HashSet::new();
        let mut member_refs = Vec::new();

        for ty in &self.module.types {
            for method in &ty.methods {
                let Some(body) = &method.body else { continue };
                for instruction in &body.instructions {
                    // Definition operands need no patching: renaming the definition
                    // itself covers them. Only reference rows are indexed.
                    if let Operand::MemberRef(handle) = instruction.operand {
                        if member_seen.insert(handle) {
                            member_refs.push(handle);
                        }
                    }
                }
            }
        }
        member_refs.retain(|&h| {
            let row = self.module.member_ref(h);
            let declaring = self.module.type_ref(row.declaring);
            in_scope.contains(&declaring.scope)
        });

        // Every type-ref row, table order. Instruction operands, member-ref declaring
        // scopes, and `System.Type`-typed custom-attribute arguments (typeof literals)
        // all address rows of this one table, so the table walk covers them all.
        let type_refs: Vec<TypeRefHandle> = (0..self.module.type_refs.len())
            .map(|index| TypeRefHandle(index as u32))
            .filter(|&h| {
                let row = self.module.type_ref(h);
                in_scope.contains(&row.scope) && row.name != "<Module>"
            })
            .collect();

        log::debug!(
            "{}: {} unresolved member refs, {} unresolved type refs",
            self.module.name,
            member_refs.len(),
            type_refs.len()
        );

        self.unresolved_refs = Some(member_refs);
        self.unresolved_type_refs = Some(type_refs);
    }

    /// The unresolved member references still awaiting a patch.
    ///
    /// # Panics
    /// Panics when called before [`ModuleUnit::init`]; that ordering is a bug in the
    /// caller, not a recoverable condition.
    #[must_use]
    pub fn unresolved_refs(&self) -> &[MemberRefHandle] {
        self.unresolved_refs
            .as_deref()
            .expect("Expected that ModuleUnit::init would be called before use")
    }

    /// The unresolved type references still awaiting a patch.
    ///
    /// # Panics
    /// Panics when called before [`ModuleUnit::init`].
    #[must_use]
    pub fn unresolved_type_refs(&self) -> &[TypeRefHandle] {
        self.unresolved_type_refs
            .as_deref()
            .expect("Expected that ModuleUnit::init would be called before use")
    }

    /// Rewrite every unresolved member-ref row matching `matches` to `new_name`,
    /// removing it from the unresolved list. Returns the number of rows patched; zero
    /// matches is a normal outcome.
    pub(crate) fn patch_member_refs<F>(&mut self, matches: F, new_name: &str) -> usize
    where
        F: Fn(&ModuleDef, &MemberRefRow) -> bool,
    {
        let list = self
            .unresolved_refs
            .as_mut()
            .expect("Expected that ModuleUnit::init would be called before use");

        let mut to_patch = Vec::new();
        let mut remaining = Vec::with_capacity(list.len());
        for &handle in list.iter() {
            let row = &self.module.member_refs[handle.0 as usize];
            if matches(&self.module, row) {
                to_patch.push(handle);
            } else {
                remaining.push(handle);
            }
        }
        *list = remaining;

        for handle in &to_patch {
            self.module.member_refs[handle.0 as usize].name = new_name.to_string();
        }
        to_patch.len()
    }

    /// Rewrite every unresolved type-ref row matching `matches` to the new namespace and
    /// name, removing it from the unresolved list. Returns the number of rows patched.
    pub(crate) fn patch_type_refs<F>(
        &mut self,
        matches: F,
        new_namespace: &str,
        new_name: &str,
    ) -> usize
    where
        F: Fn(&TypeRefRow) -> bool,
    {
        let list = self
            .unresolved_type_refs
            .as_mut()
            .expect("Expected that ModuleUnit::init would be called before use");

        let mut to_patch = Vec::new();
        let mut remaining = Vec::with_capacity(list.len());
        for &handle in list.iter() {
            let row = &self.module.type_refs[handle.0 as usize];
            if matches(row) {
                to_patch.push(handle);
            } else {
                remaining.push(handle);
            }
        }
        *list = remaining;

        for handle in &to_patch {
            let row = &mut self.module.type_refs[handle.0 as usize];
            row.namespace = new_namespace.to_string();
            row.name = new_name.to_string();
        }
        to_patch.len()
    }
}
