use crate::panic_reason::PanicReason;
use crate::types::RawInstruction;

use core::fmt;

/// Describe a panic reason with the instruction that caused it and its
/// program counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PanicInstruction {
    reason: PanicReason,
    instruction: RawInstruction,
    pc: usize,
}

impl PanicInstruction {
    /// Represents an error described by a reason and the offending
    /// instruction.
    pub const fn error(reason: PanicReason, instruction: RawInstruction, pc: usize) -> Self {
        Self {
            reason,
            instruction,
            pc,
        }
    }

    /// Underlying panic reason.
    pub const fn reason(&self) -> &PanicReason {
        &self.reason
    }

    /// Underlying raw instruction.
    pub const fn instruction(&self) -> &RawInstruction {
        &self.instruction
    }

    /// Program counter of the offending instruction, relative to its
    /// function's code.
    pub const fn pc(&self) -> usize {
        self.pc
    }
}

impl fmt::Display for PanicInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at pc {} ({})",
            self.reason,
            self.pc,
            crate::Instruction::new(self.instruction)
        )
    }
}
