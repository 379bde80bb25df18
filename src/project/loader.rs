//! The module-loader boundary.

use std::path::Path;

use crate::{metadata::model::ModuleDef, Result};

/// Produces the mutable module tree from a binary module on disk.
///
/// Implementations live outside this crate (the binary-format reader); the pipeline only
/// relies on the returned [`ModuleDef`] being complete: all types with members and
/// decoded bodies, reference tables populated, and `signed` reflecting the presence of a
/// strong-name signature.
///
/// The loader is expected to exclude non-patchable reference forms from the tables it
/// materializes: definition records reached through definition operands, and
/// compiler-synthesized specification forms (generic instantiations, call sites), which
/// the runtime resolves dynamically and which therefore need no patch.
pub trait ModuleLoader {
    /// Load one module.
    ///
    /// # Errors
    /// [`crate::Error::ModuleNotFound`] when the path does not resolve to a readable
    /// module; any other loader-specific error otherwise.
    fn load(&self, path: &Path) -> Result<ModuleDef>;
}
