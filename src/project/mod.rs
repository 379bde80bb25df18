//! Multi-module project container and reference graph.
//!
//! A [`Project`] owns every [`ModuleUnit`] of one obfuscation run in a handle-indexed
//! arena. Modules reference each other many-to-many and possibly cyclically; adjacency is
//! therefore stored as [`ModuleHandle`] lists on each unit rather than as object links,
//! which keeps traversal O(1) and the ownership tree flat.
//!
//! Lifecycle: add all modules, then [`Project::init`] exactly once. Init performs the
//! pre-flight configuration checks (a signed module without a configured key is fatal
//! before any rewriting), wires the bidirectional `references`/`referenced_by` lists,
//! and builds each unit's unresolved-reference index. Processing order is the stable
//! insertion order everywhere; nothing iterates a hashed collection.

pub mod config;
mod loader;
mod module_unit;
mod output;
pub mod skip;
mod settings;

use std::collections::HashSet;

pub use config::{ModuleConfig, ProjectConfig};
pub use loader::ModuleLoader;
pub use module_unit::ModuleUnit;
pub use output::{save_modules, ModuleWriter, StrongNameSigner};
pub use settings::Settings;

use crate::{Error, Result};

/// Stable handle of a module within its [`Project`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub(crate) usize);

/// The set of modules processed together in one run.
#[derive(Debug)]
pub struct Project {
    modules: Vec<ModuleUnit>,
    settings: Settings,
    initialized: bool,
}

impl Project {
    /// Create an empty project with the given settings.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Project {
            modules: Vec::new(),
            settings,
            initialized: false,
        }
    }

    /// Load every module of a parsed project descriptor through `loader` and
    /// initialize the project.
    ///
    /// # Errors
    /// Propagates loader failures ([`Error::ModuleNotFound`] by convention) and the
    /// pre-flight configuration faults of [`Project::init`].
    pub fn load(config: ProjectConfig, loader: &dyn ModuleLoader) -> Result<Self> {
        let mut project = Project::new(config.settings);
        for module_config in config.modules {
            let module = loader.load(&module_config.file)?;
            project.add_module(ModuleUnit::new(
                module,
                &module_config.file,
                module_config.skip,
            ));
        }
        project.init()?;
        Ok(project)
    }

    /// Append a module; insertion order is processing order.
    pub fn add_module(&mut self, unit: ModuleUnit) -> ModuleHandle {
        self.modules.push(unit);
        ModuleHandle(self.modules.len() - 1)
    }

    /// Project settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Finish project setup: pre-flight checks, reference graph, per-module indexes.
    ///
    /// Must run exactly once, after all modules are added and before any renaming.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for a signed module without a configured signing key.
    ///
    /// # Panics
    /// Panics when called twice; double initialization is a caller bug.
    pub fn init(&mut self) -> Result<()> {
        assert!(!self.initialized, "Project::init must only run once");

        for unit in &self.modules {
            if unit.module().signed && self.settings.key_file.is_none() {
                return Err(Error::Config(format!(
                    "Obfuscating the signed module '{}' would result in an invalid module; \
                     use the KeyFile setting to configure a signing key",
                    unit.name()
                )));
            }
        }

        let in_scope: HashSet<String> =
            self.modules.iter().map(|u| u.name().to_string()).collect();

        // references: distinct in-scope type-ref scopes, first-use order
        let mut references: Vec<Vec<ModuleHandle>> = Vec::with_capacity(self.modules.len());
        for unit in &self.modules {
            let mut seen = HashSet::new();
            let mut targets = Vec::new();
            for row in &unit.module().type_refs {
                if row.scope != unit.name()
                    && in_scope.contains(&row.scope)
                    && seen.insert(row.scope.clone())
                {
                    if let Some(target) = self.handle_of(&row.scope) {
                        targets.push(target);
                    }
                }
            }
            references.push(targets);
        }

        let mut referenced_by: Vec<Vec<ModuleHandle>> = vec![Vec::new(); self.modules.len()];
        for (index, targets) in references.iter().enumerate() {
            for target in targets {
                referenced_by[target.0].push(ModuleHandle(index));
            }
        }

        for (index, (refs, back_refs)) in references
            .into_iter()
            .zip(referenced_by.into_iter())
            .enumerate()
        {
            self.modules[index].set_adjacency(refs, back_refs);
        }

        for unit in &mut self.modules {
            unit.init(&in_scope);
        }

        log::info!("project initialized with {} modules", self.modules.len());
        self.initialized = true;
        Ok(())
    }

    /// Whether `init` has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether a scope name refers to one of the project's modules.
    #[must_use]
    pub fn contains_scope(&self, scope: &str) -> bool {
        self.modules.iter().any(|u| u.name() == scope)
    }

    /// Handle of the module with the given name.
    #[must_use]
    pub fn handle_of(&self, name: &str) -> Option<ModuleHandle> {
        self.modules
            .iter()
            .position(|u| u.name() == name)
            .map(ModuleHandle)
    }

    /// All module handles, processing order.
    #[must_use]
    pub fn handles(&self) -> Vec<ModuleHandle> {
        (0..self.modules.len()).map(ModuleHandle).collect()
    }

    /// The unit behind a handle.
    #[must_use]
    pub fn module(&self, handle: ModuleHandle) -> &ModuleUnit {
        &self.modules[handle.0]
    }

    /// Mutable access to the unit behind a handle.
    pub fn module_mut(&mut self, handle: ModuleHandle) -> &mut ModuleUnit {
        &mut self.modules[handle.0]
    }

    /// All units, processing order.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleUnit> {
        self.modules.iter()
    }

    /// Number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the project holds no modules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::factories::{library_with_widget, program_calling_widget};

    #[test]
    fn test_adjacency_is_bidirectional() {
        let mut project = Project::new(Settings::default());
        let lib = project.add_module(library_with_widget("Lib"));
        let app = project.add_module(program_calling_widget("App", "Lib"));
        project.init().unwrap();

        assert_eq!(project.module(app).references(), &[lib]);
        assert_eq!(project.module(lib).referenced_by(), &[app]);
        assert!(project.module(lib).references().is_empty());
    }

    #[test]
    fn test_signed_module_without_key_is_fatal() {
        let mut project = Project::new(Settings::default());
        let mut unit = library_with_widget("Lib");
        unit.module_mut().signed = true;
        project.add_module(unit);

        assert!(matches!(project.init(), Err(Error::Config(_))));
    }

    #[test]
    fn test_signed_module_with_key_passes_preflight() {
        let settings = Settings {
            key_file: Some("key.snk".to_string()),
            ..Settings::default()
        };
        let mut project = Project::new(settings);
        let mut unit = library_with_widget("Lib");
        unit.module_mut().signed = true;
        project.add_module(unit);

        assert!(project.init().is_ok());
    }
}
