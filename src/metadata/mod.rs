//! Symbol identities, attribute flags, and the mutable module model.
//!
//! Everything the rename and string-hiding passes read or mutate lives here: the
//! [`model`] tree the external loader produces, the attribute [`flags`] copied through
//! from the binary format, and the structural symbol [`key`]s that survive renaming.

pub mod flags;
pub mod key;
pub mod model;

pub use key::{EventKey, FieldKey, MethodKey, ParamSig, PropertyKey, TypeKey};
