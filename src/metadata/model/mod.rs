//! Mutable in-memory representation of one managed module.
//!
//! This is the tree the external module loader produces and the writer consumes: type
//! definitions with their members and bodies, plus the two patchable reference tables
//! (`type_refs`, `member_refs`) that carry every use of a symbol defined elsewhere.
//!
//! # Reference indirection
//!
//! Instruction operands and custom-attribute arguments never embed names of foreign
//! symbols directly. They address a row in the owning module's reference tables through
//! [`TypeRefHandle`] / [`MemberRefHandle`], the same row-handle discipline metadata tokens
//! use in the binary format. Rewriting a row therefore patches every use site at once,
//! which is what makes the patch-then-define rename scheme linear instead of quadratic.
//!
//! # Ordering
//!
//! All collections preserve declaration order as produced by the loader. The rename
//! pipeline iterates them in that order, which is what makes name assignment reproducible
//! across runs.

mod method;
mod typedef;

pub use method::{MethodBody, MethodDef, Param};
pub use typedef::{EventDef, FieldDef, GenericParam, PropertyDef, TypeDef, TypeDefOrRef};

/// Index of a row in a module's `type_refs` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRefHandle(pub u32);

/// Index of a row in a module's `member_refs` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberRefHandle(pub u32);

/// A reference to a type defined outside this module (or in another scope of it).
///
/// `scope` names the module or external assembly that defines the type. Rows whose scope
/// is one of the project's own modules are the patch targets of the rename pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRefRow {
    /// Name of the defining module or external assembly
    pub scope: String,
    /// Namespace of the referenced type (empty for nested types)
    pub namespace: String,
    /// Name of the referenced type
    pub name: String,
}

impl TypeRefRow {
    /// Full name in `namespace.name` form (bare name when the namespace is empty).
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// Signature of a member reference, discriminating the member kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRefSig {
    /// Method reference: ordered parameter type names plus return type name
    Method(crate::metadata::ParamSig),
    /// Field reference: field type name
    Field(String),
    /// Property reference: property type name
    Property(String),
    /// Event reference: event handler type name
    Event(String),
}

/// A reference to a member defined on some (possibly foreign) type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRefRow {
    /// The declaring type, as a row in the same module's `type_refs` table
    pub declaring: TypeRefHandle,
    /// Member name
    pub name: String,
    /// Member signature
    pub sig: MemberRefSig,
}

/// An embedded resource entry.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Resource name, conventionally `Full.Type.Name.resources`
    pub name: String,
    /// Raw resource payload
    pub data: Vec<u8>,
}

/// Value of a custom-attribute argument.
#[derive(Debug, Clone, PartialEq)]
pub enum CaValue {
    /// Boolean constant
    Bool(bool),
    /// 32-bit integer constant
    Int(i32),
    /// String constant
    Str(String),
    /// A `typeof(...)` literal, addressing the type through the reference table
    TypeRef(TypeRefHandle),
}

/// One positional or named custom-attribute argument.
#[derive(Debug, Clone, PartialEq)]
pub struct CaArgument {
    /// Declared type of the argument (e.g. `System.Type`, `System.Boolean`)
    pub arg_type: String,
    /// Argument value
    pub value: CaValue,
}

/// A custom attribute attached to the module, a type, or a member.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttribute {
    /// Full name of the attribute type
    pub attribute_type: String,
    /// Constructor arguments, in order
    pub ctor_args: Vec<CaArgument>,
    /// Named property arguments
    pub named_args: Vec<(String, CaArgument)>,
}

impl CustomAttribute {
    /// Look up a named argument by property name.
    #[must_use]
    pub fn named_arg(&self, name: &str) -> Option<&CaArgument> {
        self.named_args
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
    }

    /// All `System.Type`-typed argument values, i.e. `typeof(...)` literals.
    pub fn type_args(&self) -> impl Iterator<Item = TypeRefHandle> + '_ {
        self.ctor_args
            .iter()
            .chain(self.named_args.iter().map(|(_, a)| a))
            .filter_map(|a| match a.value {
                CaValue::TypeRef(handle) if a.arg_type == "System.Type" => Some(handle),
                _ => None,
            })
    }
}

/// One loaded managed module.
///
/// Types are stored flat in declaration order; nesting is expressed through
/// [`TypeDef::declaring_type`] / [`TypeDef::nested_types`] index links, mirroring how the
/// binary format's nested-class table works and keeping `&mut` access to any single type
/// trivially available.
#[derive(Debug, Default)]
pub struct ModuleDef {
    /// Module name (assembly simple name)
    pub name: String,
    /// Whether the module carries a strong-name signature
    pub signed: bool,
    /// All type definitions, flat, declaration order
    pub types: Vec<TypeDef>,
    /// Type reference table
    pub type_refs: Vec<TypeRefRow>,
    /// Member reference table
    pub member_refs: Vec<MemberRefRow>,
    /// Embedded resources
    pub resources: Vec<Resource>,
    /// Module-level custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}

impl ModuleDef {
    /// Create an empty module with the given name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        ModuleDef {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Resolve a type-ref handle to its row.
    #[must_use]
    pub fn type_ref(&self, handle: TypeRefHandle) -> &TypeRefRow {
        &self.type_refs[handle.0 as usize]
    }

    /// Resolve a member-ref handle to its row.
    #[must_use]
    pub fn member_ref(&self, handle: MemberRefHandle) -> &MemberRefRow {
        &self.member_refs[handle.0 as usize]
    }

    /// Append a type-ref row, returning its handle.
    pub fn add_type_ref(&mut self, row: TypeRefRow) -> TypeRefHandle {
        let handle = TypeRefHandle(u32::try_from(self.type_refs.len()).unwrap_or(u32::MAX));
        self.type_refs.push(row);
        handle
    }

    /// Append a member-ref row, returning its handle.
    pub fn add_member_ref(&mut self, row: MemberRefRow) -> MemberRefHandle {
        let handle = MemberRefHandle(u32::try_from(self.member_refs.len()).unwrap_or(u32::MAX));
        self.member_refs.push(row);
        handle
    }

    /// Full name of the type at `index`, with nested types joined to their declaring
    /// chain by `/` as in the binary format.
    #[must_use]
    pub fn type_full_name(&self, index: usize) -> String {
        let ty = &self.types[index];
        match ty.declaring_type {
            Some(parent) => format!("{}/{}", self.type_full_name(parent), ty.name),
            None => {
                if ty.namespace.is_empty() {
                    ty.name.clone()
                } else {
                    format!("{}.{}", ty.namespace, ty.name)
                }
            }
        }
    }

    /// Find a top-level type by namespace and name.
    #[must_use]
    pub fn find_type(&self, namespace: &str, name: &str) -> Option<usize> {
        self.types.iter().position(|t| {
            t.declaring_type.is_none() && t.namespace == namespace && t.name == name
        })
    }

    /// Find any type (including nested) by namespace and name.
    #[must_use]
    pub fn find_any_type(&self, namespace: &str, name: &str) -> Option<usize> {
        self.types
            .iter()
            .position(|t| t.namespace == namespace && t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_full_name() {
        let mut module = ModuleDef::new("Lib");
        module.types.push(TypeDef::new("Ns", "Outer"));
        let mut inner = TypeDef::new("", "Inner");
        inner.declaring_type = Some(0);
        module.types.push(inner);
        module.types[0].nested_types.push(1);

        assert_eq!(module.type_full_name(0), "Ns.Outer");
        assert_eq!(module.type_full_name(1), "Ns.Outer/Inner");
    }

    #[test]
    fn test_type_args_extraction() {
        let attr = CustomAttribute {
            attribute_type: "Some.Marker".to_string(),
            ctor_args: vec![
                CaArgument {
                    arg_type: "System.Type".to_string(),
                    value: CaValue::TypeRef(TypeRefHandle(3)),
                },
                CaArgument {
                    arg_type: "System.String".to_string(),
                    value: CaValue::Str("x".to_string()),
                },
            ],
            named_args: vec![(
                "Target".to_string(),
                CaArgument {
                    arg_type: "System.Type".to_string(),
                    value: CaValue::TypeRef(TypeRefHandle(7)),
                },
            )],
        };

        let args: Vec<_> = attr.type_args().collect();
        assert_eq!(args, vec![TypeRefHandle(3), TypeRefHandle(7)]);
    }
}
