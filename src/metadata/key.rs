//! Structurally-comparable symbol identities.
//!
//! Keys capture the identity of a type or member independently of the live module tree,
//! so they survive renaming: every key used by the pipeline is taken *before* mutation
//! and then matched against definitions and reference rows by structure alone.
//!
//! # Identity rules
//!
//! - A [`TypeKey`] is globally identified by `(scope, namespace, name)` where `scope` is
//!   the defining module's name. Nested types carry an empty namespace.
//! - Member keys combine the owning [`TypeKey`], the member name, and the declared
//!   signature with type names as plain strings, order-sensitive for methods.
//!
//! All keys are cheap to hash and order, which the group caches and the key-ordered
//! inheritance index rely on.

use std::fmt;

use crate::metadata::model::{MemberRefRow, MemberRefSig, ModuleDef, TypeRefRow};

/// Method signature used for override matching and name scoping: ordered parameter type
/// names plus the return type name. Method names are deliberately not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamSig {
    /// Parameter type names, in declaration order
    pub params: Vec<String>,
    /// Return type name
    pub return_type: String,
}

impl ParamSig {
    /// Build a signature from type-name slices.
    #[must_use]
    pub fn new(params: &[&str], return_type: &str) -> Self {
        ParamSig {
            params: params.iter().map(|p| (*p).to_string()).collect(),
            return_type: return_type.to_string(),
        }
    }
}

impl fmt::Display for ParamSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.return_type, self.params.join(", "))
    }
}

/// Identity of a type definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey {
    /// Name of the defining module
    pub scope: String,
    /// Namespace, empty for nested types
    pub namespace: String,
    /// Simple name, including any generic arity suffix
    pub name: String,
}

impl TypeKey {
    /// Build a key from its parts.
    #[must_use]
    pub fn new(scope: &str, namespace: &str, name: &str) -> Self {
        TypeKey {
            scope: scope.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Capture the key of the type at `index` in `module`.
    #[must_use]
    pub fn for_type(module: &ModuleDef, index: usize) -> Self {
        let ty = &module.types[index];
        TypeKey::new(&module.name, &ty.namespace, &ty.name)
    }

    /// Full name in `namespace.name` form (bare name when the namespace is empty).
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Whether a type-ref row refers to this type.
    #[must_use]
    pub fn matches_ref(&self, row: &TypeRefRow) -> bool {
        row.scope == self.scope && row.namespace == self.namespace && row.name == self.name
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]{}", self.scope, self.full_name())
    }
}

/// Identity of a method definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    /// Declaring type
    pub type_key: TypeKey,
    /// Method name
    pub name: String,
    /// Parameter/return signature
    pub sig: ParamSig,
}

impl MethodKey {
    /// Build a key from its parts.
    #[must_use]
    pub fn new(type_key: TypeKey, name: &str, sig: ParamSig) -> Self {
        MethodKey {
            type_key,
            name: name.to_string(),
            sig,
        }
    }

    /// Capture the key of `module.types[type_index].methods[method_index]`.
    #[must_use]
    pub fn for_method(module: &ModuleDef, type_index: usize, method_index: usize) -> Self {
        let method = &module.types[type_index].methods[method_index];
        MethodKey::new(
            TypeKey::for_type(module, type_index),
            &method.name,
            method.param_sig(),
        )
    }

    /// Whether a member-ref row in `module` refers to this method.
    #[must_use]
    pub fn matches_ref(&self, module: &ModuleDef, row: &MemberRefRow) -> bool {
        match &row.sig {
            MemberRefSig::Method(sig) => {
                row.name == self.name
                    && *sig == self.sig
                    && self.type_key.matches_ref(module.type_ref(row.declaring))
            }
            _ => false,
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}::{}({})",
            self.sig.return_type,
            self.type_key,
            self.name,
            self.sig.params.join(", ")
        )
    }
}

/// Identity of a field definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    /// Declaring type
    pub type_key: TypeKey,
    /// Field type name
    pub field_type: String,
    /// Field name
    pub name: String,
}

impl FieldKey {
    /// Build a key from its parts.
    #[must_use]
    pub fn new(type_key: TypeKey, field_type: &str, name: &str) -> Self {
        FieldKey {
            type_key,
            field_type: field_type.to_string(),
            name: name.to_string(),
        }
    }

    /// Capture the key of `module.types[type_index].fields[field_index]`.
    #[must_use]
    pub fn for_field(module: &ModuleDef, type_index: usize, field_index: usize) -> Self {
        let field = &module.types[type_index].fields[field_index];
        FieldKey::new(
            TypeKey::for_type(module, type_index),
            &field.field_type,
            &field.name,
        )
    }

    /// Whether a member-ref row in `module` refers to this field.
    #[must_use]
    pub fn matches_ref(&self, module: &ModuleDef, row: &MemberRefRow) -> bool {
        match &row.sig {
            MemberRefSig::Field(field_type) => {
                row.name == self.name
                    && *field_type == self.field_type
                    && self.type_key.matches_ref(module.type_ref(row.declaring))
            }
            _ => false,
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}::{}", self.field_type, self.type_key, self.name)
    }
}

/// Identity of a property definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyKey {
    /// Declaring type
    pub type_key: TypeKey,
    /// Property type name
    pub property_type: String,
    /// Property name
    pub name: String,
}

impl PropertyKey {
    /// Build a key from its parts.
    #[must_use]
    pub fn new(type_key: TypeKey, property_type: &str, name: &str) -> Self {
        PropertyKey {
            type_key,
            property_type: property_type.to_string(),
            name: name.to_string(),
        }
    }

    /// Capture the key of `module.types[type_index].properties[index]`.
    #[must_use]
    pub fn for_property(module: &ModuleDef, type_index: usize, index: usize) -> Self {
        let prop = &module.types[type_index].properties[index];
        PropertyKey::new(
            TypeKey::for_type(module, type_index),
            &prop.property_type,
            &prop.name,
        )
    }

    /// Whether a member-ref row in `module` refers to this property.
    #[must_use]
    pub fn matches_ref(&self, module: &ModuleDef, row: &MemberRefRow) -> bool {
        match &row.sig {
            MemberRefSig::Property(property_type) => {
                row.name == self.name
                    && *property_type == self.property_type
                    && self.type_key.matches_ref(module.type_ref(row.declaring))
            }
            _ => false,
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}::{}", self.property_type, self.type_key, self.name)
    }
}

/// Identity of an event definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    /// Declaring type
    pub type_key: TypeKey,
    /// Event handler type name
    pub event_type: String,
    /// Event name
    pub name: String,
}

impl EventKey {
    /// Build a key from its parts.
    #[must_use]
    pub fn new(type_key: TypeKey, event_type: &str, name: &str) -> Self {
        EventKey {
            type_key,
            event_type: event_type.to_string(),
            name: name.to_string(),
        }
    }

    /// Capture the key of `module.types[type_index].events[index]`.
    #[must_use]
    pub fn for_event(module: &ModuleDef, type_index: usize, index: usize) -> Self {
        let event = &module.types[type_index].events[index];
        EventKey::new(
            TypeKey::for_type(module, type_index),
            &event.event_type,
            &event.name,
        )
    }

    /// Whether a member-ref row in `module` refers to this event.
    #[must_use]
    pub fn matches_ref(&self, module: &ModuleDef, row: &MemberRefRow) -> bool {
        match &row.sig {
            MemberRefSig::Event(event_type) => {
                row.name == self.name
                    && *event_type == self.event_type
                    && self.type_key.matches_ref(module.type_ref(row.declaring))
            }
            _ => false,
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}::{}", self.event_type, self.type_key, self.name)
    }
}
