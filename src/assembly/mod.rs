//! CIL instruction representation and body synthesis.
//!
//! [`Instruction`] / [`OpCode`] / [`Operand`] model decoded method bodies the way the
//! loader hands them over; [`BodyBuilder`] assembles new bodies declaratively with
//! forward-declared labels, so transforms never compute branch offsets by hand.

mod builder;
mod instruction;

pub use builder::{BodyBuilder, Label};
pub use instruction::{Instruction, OpCode, Operand};
