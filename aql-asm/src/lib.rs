//! Atomic types of the AQL virtual machine: instruction encoding, opcode
//! definitions and runtime panic reasons.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod instruction;
mod panic_instruction;
mod panic_reason;
mod types;

pub mod opcode;


pub use instruction::Instruction;
pub use opcode::{Opcode, OpcodeRepr};
pub use panic_instruction::PanicInstruction;
pub use panic_reason::PanicReason;
pub use types::{FunctionId, Immediate16, RawInstruction, RegisterId};
