//! CIL instructions with typed operands.
//!
//! The instruction set modelled here is the subset the pipeline inspects or emits:
//! literal loads, field and array access, calls, branches, and the arithmetic the
//! string-table initializer needs. Compact encodings (`ldc.i4.0` vs `ldc.i4`) are kept
//! distinct so an emitted stream round-trips byte-for-byte through the writer.

use strum::{AsRefStr, Display};

use crate::metadata::model::{MemberRefHandle, TypeRefHandle};

/// CIL opcodes, named by mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[allow(missing_docs)]
pub enum OpCode {
    #[strum(serialize = "nop")]
    Nop,
    #[strum(serialize = "dup")]
    Dup,
    #[strum(serialize = "pop")]
    Pop,
    #[strum(serialize = "ret")]
    Ret,
    #[strum(serialize = "ldstr")]
    Ldstr,
    #[strum(serialize = "ldnull")]
    Ldnull,
    #[strum(serialize = "ldc.i4.m1")]
    LdcI4M1,
    #[strum(serialize = "ldc.i4.0")]
    LdcI40,
    #[strum(serialize = "ldc.i4.1")]
    LdcI41,
    #[strum(serialize = "ldc.i4.2")]
    LdcI42,
    #[strum(serialize = "ldc.i4.3")]
    LdcI43,
    #[strum(serialize = "ldc.i4.4")]
    LdcI44,
    #[strum(serialize = "ldc.i4.5")]
    LdcI45,
    #[strum(serialize = "ldc.i4.6")]
    LdcI46,
    #[strum(serialize = "ldc.i4.7")]
    LdcI47,
    #[strum(serialize = "ldc.i4.8")]
    LdcI48,
    #[strum(serialize = "ldc.i4.s")]
    LdcI4S,
    #[strum(serialize = "ldc.i4")]
    LdcI4,
    #[strum(serialize = "ldarg.0")]
    Ldarg0,
    #[strum(serialize = "ldarg.1")]
    Ldarg1,
    #[strum(serialize = "ldarg.2")]
    Ldarg2,
    #[strum(serialize = "ldarg.3")]
    Ldarg3,
    #[strum(serialize = "ldarg.s")]
    LdargS,
    #[strum(serialize = "ldloc.0")]
    Ldloc0,
    #[strum(serialize = "ldloc.1")]
    Ldloc1,
    #[strum(serialize = "ldloc.2")]
    Ldloc2,
    #[strum(serialize = "ldloc.3")]
    Ldloc3,
    #[strum(serialize = "ldloc.s")]
    LdlocS,
    #[strum(serialize = "stloc.0")]
    Stloc0,
    #[strum(serialize = "stloc.1")]
    Stloc1,
    #[strum(serialize = "stloc.2")]
    Stloc2,
    #[strum(serialize = "stloc.3")]
    Stloc3,
    #[strum(serialize = "stloc.s")]
    StlocS,
    #[strum(serialize = "ldsfld")]
    Ldsfld,
    #[strum(serialize = "stsfld")]
    Stsfld,
    #[strum(serialize = "ldfld")]
    Ldfld,
    #[strum(serialize = "stfld")]
    Stfld,
    #[strum(serialize = "ldtoken")]
    Ldtoken,
    #[strum(serialize = "call")]
    Call,
    #[strum(serialize = "callvirt")]
    Callvirt,
    #[strum(serialize = "newobj")]
    Newobj,
    #[strum(serialize = "newarr")]
    Newarr,
    #[strum(serialize = "ldlen")]
    Ldlen,
    #[strum(serialize = "ldelem.ref")]
    LdelemRef,
    #[strum(serialize = "stelem.ref")]
    StelemRef,
    #[strum(serialize = "ldelem.u1")]
    LdelemU1,
    #[strum(serialize = "stelem.i1")]
    StelemI1,
    #[strum(serialize = "conv.i4")]
    ConvI4,
    #[strum(serialize = "conv.u1")]
    ConvU1,
    #[strum(serialize = "add")]
    Add,
    #[strum(serialize = "xor")]
    Xor,
    #[strum(serialize = "clt")]
    Clt,
    #[strum(serialize = "br")]
    Br,
    #[strum(serialize = "br.s")]
    BrS,
    #[strum(serialize = "brtrue")]
    Brtrue,
    #[strum(serialize = "brtrue.s")]
    BrtrueS,
    #[strum(serialize = "brfalse")]
    Brfalse,
    #[strum(serialize = "brfalse.s")]
    BrfalseS,
    #[strum(serialize = "isinst")]
    Isinst,
    #[strum(serialize = "castclass")]
    Castclass,
    #[strum(serialize = "box")]
    Box,
}

impl OpCode {
    /// Whether the opcode transfers control to a branch target operand.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            OpCode::Br
                | OpCode::BrS
                | OpCode::Brtrue
                | OpCode::BrtrueS
                | OpCode::Brfalse
                | OpCode::BrfalseS
        )
    }
}

/// A typed instruction operand.
///
/// Operands that refer to symbols do so through table handles (reference rows) or
/// `(type, member)` index pairs (definitions in the same module), never through embedded
/// names; renaming therefore never rewrites instruction streams, only table rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// Inline 8-bit signed immediate
    Int8(i8),
    /// Inline 8-bit unsigned immediate
    UInt8(u8),
    /// Inline 32-bit immediate
    Int32(i32),
    /// Inline string literal (`ldstr`)
    String(String),
    /// A row in the owning module's type-ref table
    TypeRef(TypeRefHandle),
    /// A row in the owning module's member-ref table
    MemberRef(MemberRefHandle),
    /// A type defined in the owning module, by flat index
    TypeDef(usize),
    /// A method defined in the owning module
    MethodDef {
        /// Flat index of the declaring type
        type_index: usize,
        /// Index into the declaring type's method list
        method_index: usize,
    },
    /// A field defined in the owning module
    FieldDef {
        /// Flat index of the declaring type
        type_index: usize,
        /// Index into the declaring type's field list
        field_index: usize,
    },
    /// Branch target, as an instruction index within the same body
    Target(usize),
}

/// One decoded or synthesized instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The opcode
    pub opcode: OpCode,
    /// The operand, `Operand::None` for operand-less opcodes
    pub operand: Operand,
}

impl Instruction {
    /// An instruction without operand.
    #[must_use]
    pub fn new(opcode: OpCode) -> Self {
        Instruction {
            opcode,
            operand: Operand::None,
        }
    }

    /// An instruction with the given operand.
    #[must_use]
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Instruction { opcode, operand }
    }

    /// The string literal carried by an `ldstr`, if this is one.
    #[must_use]
    pub fn as_ldstr(&self) -> Option<&str> {
        if self.opcode == OpCode::Ldstr {
            if let Operand::String(value) = &self.operand {
                return Some(value);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonics() {
        assert_eq!(OpCode::LdcI4M1.to_string(), "ldc.i4.m1");
        assert_eq!(OpCode::LdelemRef.to_string(), "ldelem.ref");
        assert_eq!(OpCode::BrtrueS.to_string(), "brtrue.s");
    }

    #[test]
    fn test_branch_classification() {
        assert!(OpCode::BrS.is_branch());
        assert!(OpCode::Brtrue.is_branch());
        assert!(!OpCode::Call.is_branch());
    }

    #[test]
    fn test_as_ldstr() {
        let load = Instruction::with_operand(OpCode::Ldstr, Operand::String("hi".to_string()));
        assert_eq!(load.as_ldstr(), Some("hi"));
        assert_eq!(Instruction::new(OpCode::Ret).as_ldstr(), None);
    }
}
