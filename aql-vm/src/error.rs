//! Runtime and compile-time error implementations

use aql_asm::{PanicInstruction, PanicReason, RawInstruction};

/// Compile error variants, carrying a description of the offending node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CompileError {
    /// An identifier was used before any definition was in scope.
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    /// The left-hand side of an assignment cannot be assigned to.
    #[error("invalid assignment target `{0}`")]
    InvalidAssignmentTarget(String),
    /// `break` appeared outside any loop.
    #[error("`break` outside of a loop")]
    BreakOutsideLoop,
    /// `continue` appeared outside any loop.
    #[error("`continue` outside of a loop")]
    ContinueOutsideLoop,
    /// The lowering does not support this node.
    #[error("unsupported node: {0}")]
    UnsupportedNode(String),
    /// The operator string does not name a known operation.
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),
    /// A function needed more registers than an operand byte can address.
    #[error("function `{0}` exceeds the register window limit")]
    TooManyRegisters(String),
    /// A constant pool outgrew the wide-immediate index range.
    #[error("function `{0}` exceeds the constant pool limit")]
    TooManyConstants(String),
    /// The global table outgrew the wide-immediate index range.
    #[error("too many global bindings")]
    TooManyGlobals,
    /// More captured variables than a capture-count byte can express.
    #[error("function `{0}` captures too many variables")]
    TooManyUpvalues(String),
    /// A jump target landed outside the signed wide-immediate range.
    #[error("jump offset out of range")]
    JumpOutOfRange,
    /// The heap refused an allocation while interning a constant.
    #[error("out of memory while compiling")]
    OutOfMemory,
}

/// Interpreter runtime error variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InterpreterError {
    /// The instruction execution resulted in a well-formed panic, caused by
    /// an explicit instruction.
    #[error("execution error: {0}")]
    PanicInstruction(PanicInstruction),
    /// The VM execution resulted in a well-formed panic that wasn't caused
    /// by a specific instruction.
    #[error("execution error: {0}")]
    Panic(PanicReason),
}

impl InterpreterError {
    /// Describe a runtime panic raised while executing an instruction.
    pub const fn from_runtime(
        reason: PanicReason,
        instruction: RawInstruction,
        pc: usize,
    ) -> Self {
        Self::PanicInstruction(PanicInstruction::error(reason, instruction, pc))
    }

    /// Return the panic reason that caused this error.
    pub const fn panic_reason(&self) -> PanicReason {
        match self {
            Self::PanicInstruction(result) => *result.reason(),
            Self::Panic(reason) => *reason,
        }
    }

    /// Return the instruction that caused this error, if applicable.
    pub const fn instruction(&self) -> Option<&RawInstruction> {
        match self {
            Self::PanicInstruction(result) => Some(result.instruction()),
            Self::Panic(_) => None,
        }
    }
}

impl From<PanicReason> for InterpreterError {
    fn from(reason: PanicReason) -> Self {
        Self::Panic(reason)
    }
}

/// Either phase of the pipeline failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The program failed to lower to bytecode.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// The program aborted at runtime.
    #[error(transparent)]
    Runtime(#[from] InterpreterError),
}

/// Result of an operation that can only fail with a runtime panic.
pub type SimpleResult<T> = Result<T, PanicReason>;
