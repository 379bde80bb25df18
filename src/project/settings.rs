//! Project-wide settings consumed by the pipeline.
//!
//! These arrive already parsed (from the descriptor reader or from a caller constructing
//! a project programmatically); the pipeline treats them as plain data.

use std::path::PathBuf;

/// Global options for one obfuscation run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory the rewritten modules and the mapping file are written to
    pub out_path: PathBuf,
    /// Strong-name key file; `Some("auto")` resolves through each module's key-file
    /// attribute. Required when any input module is signed.
    pub key_file: Option<String>,
    /// Run the string-hiding transform after renaming
    pub hide_strings: bool,
    /// Rename property accessors and properties (off force-skips the accessors)
    pub rename_properties: bool,
    /// Rename event accessors and events (off force-skips the accessors)
    pub rename_events: bool,
    /// Recycle short names across non-colliding scopes instead of one global counter
    pub reuse_names: bool,
    /// Only process types carrying the opt-in obfuscation attribute
    pub marked_only: bool,
    /// Write the mapping file as XML instead of text
    pub xml_mapping: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            out_path: PathBuf::from("."),
            key_file: None,
            hide_strings: true,
            rename_properties: true,
            rename_events: true,
            reuse_names: true,
            marked_only: false,
            xml_mapping: false,
        }
    }
}
