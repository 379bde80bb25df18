//! Convenient re-exports of the most commonly used types.
//!
//! # Example
//!
//! ```rust,no_run
//! use dotshroud::prelude::*;
//!
//! let config = ProjectConfig::from_path("project.xml".as_ref())?;
//! # let loader: &dyn ModuleLoader = unimplemented!();
//! let mut obfuscator = Obfuscator::from_config(config, loader)?;
//! obfuscator.run()?;
//! # Ok::<(), dotshroud::Error>(())
//! ```

pub use crate::Error;
pub use crate::Result;

pub use crate::metadata::{
    flags::{
        EventAttributes, FieldAttributes, MethodAttributes, MethodImplKind, MethodSemantics,
        PropertyAttributes, TypeAttributes,
    },
    model::{
        CaArgument, CaValue, CustomAttribute, EventDef, FieldDef, GenericParam, MemberRefHandle,
        MemberRefRow, MemberRefSig, MethodBody, MethodDef, ModuleDef, Param, PropertyDef,
        Resource, TypeDef, TypeDefOrRef, TypeRefHandle, TypeRefRow,
    },
    EventKey, FieldKey, MethodKey, ParamSig, PropertyKey, TypeKey,
};

pub use crate::assembly::{BodyBuilder, Instruction, Label, OpCode, Operand};

pub use crate::project::{
    skip::{MemberRule, NamePattern, SkipSet, TypeRule, TypeSkipFlags, Visibility},
    ModuleConfig, ModuleHandle, ModuleLoader, ModuleUnit, ModuleWriter, Project, ProjectConfig,
    Settings, StrongNameSigner,
};

pub use crate::rename::{
    InheritMap, MethodGroup, NameGroup, NameMaker, ObfuscationMap, ObfuscationStatus, Obfuscator,
};

pub use crate::mapping::{MapWriter, TextMapWriter, XmlMapWriter};
