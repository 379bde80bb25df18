use thiserror::Error;

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The taxonomy distinguishes three fatal classes: configuration faults detected before any
/// rewriting starts, resource faults while bringing modules into the project, and signing
/// faults at write-back time. Soft outcomes (a skipped symbol, a reference with no match
/// during patching, an unresolvable inheritance edge) are never represented here; they are
/// ordinary control flow recorded in the obfuscation map.
///
/// Consuming per-module derived state before initialization is a programming error, not an
/// error value: those paths panic (see [`crate::project::ModuleUnit::unresolved_refs`]).
#[derive(Error, Debug)]
pub enum Error {
    /// The project descriptor could not be read or is not a valid project document.
    ///
    /// Reported once, before any module is touched. The message carries the failing
    /// path and the underlying cause.
    #[error("Unable to read specified project file: {0}")]
    Project(String),

    /// A required configuration value is missing or malformed.
    ///
    /// Covers missing `file` attributes on module elements, unknown setting values,
    /// and a signed input module in a project without a configured signing key.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A referenced input module could not be found or read.
    #[error("Unable to find module: {0}")]
    ModuleNotFound(String),

    /// A module write-back or re-sign step failed.
    ///
    /// This is the late fault of the staged output loop: modules written before the
    /// failing one remain on disk. The message names the module and the key file.
    #[error("Failed to sign '{module}' with key file \"{key_file}\": {message}")]
    Signing {
        /// The module that could not be signed
        module: String,
        /// The key file that was used for the attempt
        key_file: String,
        /// Underlying cause
        message: String,
    },

    /// A skip rule carried a regular expression that does not parse.
    #[error("Invalid skip pattern '{pattern}': {message}")]
    Pattern {
        /// The offending pattern text
        pattern: String,
        /// Parser diagnostic
        message: String,
    },

    /// A forward-declared branch label was never placed before body finalization.
    #[error("Branch label {0} was declared but never placed")]
    UnplacedLabel(usize),

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// XML error from the descriptor reader or the mapping writer.
    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
