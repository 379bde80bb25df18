//! Write-back and re-signing of the rewritten modules.
//!
//! The output loop is staged: each module is written, then re-signed if it was
//! originally signed. A failure part-way through leaves the modules written before it on
//! disk; that incomplete-output window is inherent to the staged loop and deliberately
//! not masked.

use std::fs;
use std::path::Path;

use crate::{metadata::model::ModuleDef, project::Project, Error, Result};

/// Writes a module tree back to its binary form.
pub trait ModuleWriter {
    /// Write `module` to `path`.
    ///
    /// # Errors
    /// Any writer-specific error; treated as fatal by the output loop.
    fn write(&self, module: &ModuleDef, path: &Path) -> Result<()>;
}

/// Re-signs a written module with a strong-name key.
pub trait StrongNameSigner {
    /// Sign the module at `path` with the given key blob.
    ///
    /// # Errors
    /// Any signer-specific error; surfaced as [`Error::Signing`] by the output loop.
    fn sign(&self, key: &[u8], path: &Path) -> Result<()>;
}

/// Write every module of the project to the configured output directory, re-signing the
/// ones that were originally signed.
///
/// The key file comes from the project settings; the value `auto` resolves through the
/// module's own key-file attribute. A relative key path is probed against the working
/// directory and the module's source directory, matching how build scripts usually lay
/// keys out next to their projects.
///
/// # Errors
/// Propagates writer errors unchanged and wraps key-file problems in [`Error::Signing`]
/// (or [`Error::Config`] when `auto` finds no attribute to resolve through).
pub fn save_modules(
    project: &Project,
    writer: &dyn ModuleWriter,
    signer: &dyn StrongNameSigner,
) -> Result<()> {
    let out_path = &project.settings().out_path;

    for unit in project.modules() {
        let file_name = unit
            .filename()
            .file_name()
            .ok_or_else(|| Error::Config(format!("invalid module path: {:?}", unit.filename())))?;
        let out_name = out_path.join(file_name);

        writer.write(unit.module(), &out_name)?;

        if unit.module().signed {
            let Some(configured) = project.settings().key_file.as_deref() else {
                // pre-flight already rejected this combination
                continue;
            };

            let key_file = if configured == "auto" {
                resolve_key_attribute(unit.module()).ok_or_else(|| {
                    Error::Config(format!(
                        "KeyFile='auto', but module '{}' carries no key-file attribute",
                        unit.name()
                    ))
                })?
            } else {
                configured.to_string()
            };
            let key_path = resolve_key_path(&key_file, unit.filename());

            let key = fs::read(&key_path).map_err(|e| Error::Signing {
                module: unit.name().to_string(),
                key_file: key_path.display().to_string(),
                message: e.to_string(),
            })?;
            signer.sign(&key, &out_name).map_err(|e| Error::Signing {
                module: unit.name().to_string(),
                key_file: key_path.display().to_string(),
                message: e.to_string(),
            })?;
        }
        log::info!("wrote {}", out_name.display());
    }
    Ok(())
}

/// The key-file path recorded in the module's `AssemblyKeyFileAttribute`, if any.
fn resolve_key_attribute(module: &ModuleDef) -> Option<String> {
    use crate::metadata::model::CaValue;

    module
        .custom_attributes
        .iter()
        .filter(|a| a.attribute_type == "System.Reflection.AssemblyKeyFileAttribute")
        .find_map(|a| match a.ctor_args.first().map(|arg| &arg.value) {
            Some(CaValue::Str(path)) => Some(path.clone()),
            _ => None,
        })
}

/// Probe a possibly-relative key path against the working directory and the module's
/// source directory.
fn resolve_key_path(key_file: &str, module_path: &Path) -> std::path::PathBuf {
    let direct = Path::new(key_file);
    if direct.is_absolute() || direct.exists() {
        return direct.to_path_buf();
    }
    if let Some(parent) = module_path.parent() {
        let candidate = parent.join(key_file);
        if candidate.exists() {
            return candidate;
        }
    }
    direct.to_path_buf()
}
