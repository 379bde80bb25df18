//! Type definitions and their non-method members.

use crate::metadata::{
    flags::{EventAttributes, FieldAttributes, PropertyAttributes, TypeAttributes},
    model::{CustomAttribute, MethodDef, TypeRefHandle},
};

/// Target of a base-type or interface edge: either a type defined in the same module or
/// a row in the reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDefOrRef {
    /// Index into the owning module's `types`
    Def(usize),
    /// Row in the owning module's `type_refs`
    Ref(TypeRefHandle),
}

/// A generic parameter of a type or method.
#[derive(Debug, Clone, Default)]
pub struct GenericParam {
    /// Declared parameter name
    pub name: String,
    /// Attached custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}

/// One type definition.
#[derive(Debug, Default)]
pub struct TypeDef {
    /// Namespace (empty for nested types)
    pub namespace: String,
    /// Simple name, including any generic arity suffix (`List`1`)
    pub name: String,
    /// Type attributes
    pub flags: TypeAttributes,
    /// Declaring type index for nested types
    pub declaring_type: Option<usize>,
    /// Indices of nested types, declaration order
    pub nested_types: Vec<usize>,
    /// Generic parameters
    pub generic_params: Vec<GenericParam>,
    /// Base type edge, `None` for module roots and interfaces
    pub base: Option<TypeDefOrRef>,
    /// Implemented interface edges
    pub interfaces: Vec<TypeDefOrRef>,
    /// Methods, declaration order
    pub methods: Vec<MethodDef>,
    /// Fields, declaration order
    pub fields: Vec<FieldDef>,
    /// Properties, declaration order
    pub properties: Vec<PropertyDef>,
    /// Events, declaration order
    pub events: Vec<EventDef>,
    /// Attached custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
    /// Explicit class size, set for explicit-layout blob carriers
    pub class_size: Option<u32>,
    /// Explicit packing size
    pub packing_size: Option<u16>,
}

impl TypeDef {
    /// Create a type with default (not-public) attributes.
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        TypeDef {
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags: TypeAttributes::NOT_PUBLIC,
            ..Default::default()
        }
    }

    /// Whether this is the compiler-emitted `<Module>` pseudo type, which never
    /// participates in renaming.
    #[must_use]
    pub fn is_module_type(&self) -> bool {
        self.namespace.is_empty() && self.name == "<Module>"
    }
}

/// One field definition.
#[derive(Debug, Default)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field attributes
    pub flags: FieldAttributes,
    /// Full name of the field type
    pub field_type: String,
    /// RVA-addressed initial value, present when `HAS_FIELD_RVA` is set
    pub initial_value: Option<Vec<u8>>,
    /// Attached custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}

impl FieldDef {
    /// Create a field with the given name and type.
    #[must_use]
    pub fn new(name: &str, field_type: &str, flags: FieldAttributes) -> Self {
        FieldDef {
            name: name.to_string(),
            field_type: field_type.to_string(),
            flags,
            ..Default::default()
        }
    }
}

/// One property definition. Accessors are indices into the declaring type's `methods`.
#[derive(Debug, Default)]
pub struct PropertyDef {
    /// Property name
    pub name: String,
    /// Property attributes
    pub flags: PropertyAttributes,
    /// Full name of the property type
    pub property_type: String,
    /// Getter method index
    pub get_method: Option<usize>,
    /// Setter method index
    pub set_method: Option<usize>,
    /// Attached custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}

/// One event definition. Accessors are indices into the declaring type's `methods`.
#[derive(Debug, Default)]
pub struct EventDef {
    /// Event name
    pub name: String,
    /// Event attributes
    pub flags: EventAttributes,
    /// Full name of the event handler type
    pub event_type: String,
    /// Subscribe accessor method index
    pub add_method: Option<usize>,
    /// Unsubscribe accessor method index
    pub remove_method: Option<usize>,
    /// Attached custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}
