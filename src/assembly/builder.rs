//! Declarative method-body construction with label back-patching.
//!
//! Synthesized bodies (string accessors, the table initializer) are emitted as a flat
//! instruction sequence with forward-declared labels instead of hand-computed branch
//! targets. A label is declared up front, branched to from anywhere, and placed exactly
//! once; [`BodyBuilder::finish`] resolves every branch to the instruction index the label
//! landed on.

use crate::{
    assembly::{Instruction, OpCode, Operand},
    Error, Result,
};

/// A forward-declarable branch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Builder for an instruction sequence with deferred branch resolution.
#[derive(Debug, Default)]
pub struct BodyBuilder {
    instructions: Vec<Instruction>,
    labels: Vec<Option<usize>>,
    fixups: Vec<(usize, Label)>,
}

impl BodyBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        BodyBuilder::default()
    }

    /// Append an operand-less instruction.
    pub fn emit(&mut self, opcode: OpCode) -> &mut Self {
        self.instructions.push(Instruction::new(opcode));
        self
    }

    /// Append an instruction with an operand.
    pub fn emit_with(&mut self, opcode: OpCode, operand: Operand) -> &mut Self {
        self.instructions
            .push(Instruction::with_operand(opcode, operand));
        self
    }

    /// Declare a label that can be branched to before it is placed.
    pub fn declare_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Place a label at the position of the next emitted instruction.
    pub fn place_label(&mut self, label: Label) {
        self.labels[label.0] = Some(self.instructions.len());
    }

    /// Append a branch to `label`; the target operand is resolved in [`Self::finish`].
    pub fn emit_branch(&mut self, opcode: OpCode, label: Label) -> &mut Self {
        debug_assert!(opcode.is_branch(), "emit_branch needs a branch opcode");
        self.fixups.push((self.instructions.len(), label));
        self.instructions
            .push(Instruction::with_operand(opcode, Operand::Target(usize::MAX)));
        self
    }

    /// Append an `ldc.i4` with the most compact encoding for `value`.
    #[allow(clippy::cast_possible_truncation)] // intentional for the .s encoding
    pub fn emit_ldc_i4(&mut self, value: i32) -> &mut Self {
        match value {
            -1 => self.emit(OpCode::LdcI4M1),
            0 => self.emit(OpCode::LdcI40),
            1 => self.emit(OpCode::LdcI41),
            2 => self.emit(OpCode::LdcI42),
            3 => self.emit(OpCode::LdcI43),
            4 => self.emit(OpCode::LdcI44),
            5 => self.emit(OpCode::LdcI45),
            6 => self.emit(OpCode::LdcI46),
            7 => self.emit(OpCode::LdcI47),
            8 => self.emit(OpCode::LdcI48),
            v if (-128..=127).contains(&v) => {
                self.emit_with(OpCode::LdcI4S, Operand::Int8(v as i8))
            }
            v => self.emit_with(OpCode::LdcI4, Operand::Int32(v)),
        }
    }

    /// Append an argument load with the most compact encoding.
    #[allow(clippy::cast_possible_truncation)]
    pub fn emit_ldarg(&mut self, index: u16) -> &mut Self {
        match index {
            0 => self.emit(OpCode::Ldarg0),
            1 => self.emit(OpCode::Ldarg1),
            2 => self.emit(OpCode::Ldarg2),
            3 => self.emit(OpCode::Ldarg3),
            i => self.emit_with(OpCode::LdargS, Operand::UInt8(i as u8)),
        }
    }

    /// Append a local load with the most compact encoding.
    #[allow(clippy::cast_possible_truncation)]
    pub fn emit_ldloc(&mut self, index: u16) -> &mut Self {
        match index {
            0 => self.emit(OpCode::Ldloc0),
            1 => self.emit(OpCode::Ldloc1),
            2 => self.emit(OpCode::Ldloc2),
            3 => self.emit(OpCode::Ldloc3),
            i => self.emit_with(OpCode::LdlocS, Operand::UInt8(i as u8)),
        }
    }

    /// Append a local store with the most compact encoding.
    #[allow(clippy::cast_possible_truncation)]
    pub fn emit_stloc(&mut self, index: u16) -> &mut Self {
        match index {
            0 => self.emit(OpCode::Stloc0),
            1 => self.emit(OpCode::Stloc1),
            2 => self.emit(OpCode::Stloc2),
            3 => self.emit(OpCode::Stloc3),
            i => self.emit_with(OpCode::StlocS, Operand::UInt8(i as u8)),
        }
    }

    /// Resolve all branches and return the finished instruction stream.
    ///
    /// # Errors
    /// Returns [`Error::UnplacedLabel`] if any declared label that a branch targets was
    /// never placed.
    pub fn finish(mut self) -> Result<Vec<Instruction>> {
        for (index, label) in &self.fixups {
            let target = self.labels[label.0].ok_or(Error::UnplacedLabel(label.0))?;
            self.instructions[*index].operand = Operand::Target(target);
        }
        Ok(self.instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_ldc_encodings() {
        let mut builder = BodyBuilder::new();
        builder.emit_ldc_i4(0).emit_ldc_i4(42).emit_ldc_i4(100_000);
        let body = builder.finish().unwrap();

        assert_eq!(body[0].opcode, OpCode::LdcI40);
        assert_eq!(body[1].opcode, OpCode::LdcI4S);
        assert_eq!(body[1].operand, Operand::Int8(42));
        assert_eq!(body[2].opcode, OpCode::LdcI4);
        assert_eq!(body[2].operand, Operand::Int32(100_000));
    }

    #[test]
    fn test_forward_branch_resolution() {
        let mut builder = BodyBuilder::new();
        let done = builder.declare_label();
        builder.emit(OpCode::Dup);
        builder.emit_branch(OpCode::BrtrueS, done);
        builder.emit(OpCode::Pop);
        builder.place_label(done);
        builder.emit(OpCode::Ret);
        let body = builder.finish().unwrap();

        assert_eq!(body[1].operand, Operand::Target(3));
        assert_eq!(body[3].opcode, OpCode::Ret);
    }

    #[test]
    fn test_backward_branch_resolution() {
        let mut builder = BodyBuilder::new();
        let top = builder.declare_label();
        builder.place_label(top);
        builder.emit(OpCode::Nop);
        builder.emit_branch(OpCode::Brtrue, top);
        let body = builder.finish().unwrap();

        assert_eq!(body[1].operand, Operand::Target(0));
    }

    #[test]
    fn test_unplaced_label_is_an_error() {
        let mut builder = BodyBuilder::new();
        let nowhere = builder.declare_label();
        builder.emit_branch(OpCode::BrS, nowhere);
        assert!(matches!(builder.finish(), Err(Error::UnplacedLabel(0))));
    }
}
