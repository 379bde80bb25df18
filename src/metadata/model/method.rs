//! Method definitions and bodies.

use crate::{
    assembly::Instruction,
    metadata::{
        flags::{MethodAttributes, MethodImplKind, MethodSemantics},
        model::CustomAttribute,
        ParamSig,
    },
};

/// One formal parameter.
#[derive(Debug, Clone, Default)]
pub struct Param {
    /// Declared name; `None` once stripped by the rename pass
    pub name: Option<String>,
    /// Full name of the parameter type
    pub param_type: String,
    /// Attached custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}

impl Param {
    /// Create a named parameter.
    #[must_use]
    pub fn new(name: &str, param_type: &str) -> Self {
        Param {
            name: Some(name.to_string()),
            param_type: param_type.to_string(),
            ..Default::default()
        }
    }
}

/// A method body: local variable types plus the instruction stream.
#[derive(Debug, Default)]
pub struct MethodBody {
    /// Local variable type names, slot order
    pub locals: Vec<String>,
    /// Decoded instruction stream
    pub instructions: Vec<Instruction>,
}

/// One method definition.
#[derive(Debug, Default)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Method attributes
    pub flags: MethodAttributes,
    /// Implementation kind (IL, runtime-provided, native)
    pub impl_kind: MethodImplKind,
    /// Accessor role from the method-semantics table
    pub semantics: MethodSemantics,
    /// Full name of the return type
    pub return_type: String,
    /// Formal parameters, order-sensitive
    pub params: Vec<Param>,
    /// Generic parameters
    pub generic_params: Vec<super::GenericParam>,
    /// Body, absent for abstract and runtime-provided methods
    pub body: Option<MethodBody>,
    /// Attached custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}

impl MethodDef {
    /// Create a bodiless method with the given shape.
    #[must_use]
    pub fn new(name: &str, return_type: &str, params: Vec<Param>, flags: MethodAttributes) -> Self {
        MethodDef {
            name: name.to_string(),
            return_type: return_type.to_string(),
            params,
            flags,
            ..Default::default()
        }
    }

    /// Whether the method participates in virtual dispatch.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.flags.contains(MethodAttributes::VIRTUAL)
    }

    /// Whether the method introduces a fresh vtable slot rather than reusing one.
    #[must_use]
    pub fn is_new_slot(&self) -> bool {
        self.flags.contains(MethodAttributes::NEW_SLOT)
    }

    /// Whether the name is special (accessors, operators, constructors).
    #[must_use]
    pub fn is_special_name(&self) -> bool {
        self.flags.contains(MethodAttributes::SPECIAL_NAME)
    }

    /// Whether the implementation is supplied by the runtime (delegates etc.).
    #[must_use]
    pub fn is_runtime(&self) -> bool {
        self.impl_kind == MethodImplKind::Runtime
    }

    /// The signature used for grouping and name scoping: parameter and return type
    /// names, order-sensitive, name excluded.
    #[must_use]
    pub fn param_sig(&self) -> ParamSig {
        ParamSig {
            params: self.params.iter().map(|p| p.param_type.clone()).collect(),
            return_type: self.return_type.clone(),
        }
    }
}
