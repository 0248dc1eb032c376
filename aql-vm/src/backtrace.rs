//! Backtrace implementation to track program errors.

use crate::error::InterpreterError;
use crate::interpreter::Interpreter;

use core::fmt;

/// One symbolized level of the frame stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacktraceFrame {
    function: String,
    pc: usize,
}

impl BacktraceFrame {
    /// Name of the function executing at this level.
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Program counter at this level, in instructions.
    pub const fn pc(&self) -> usize {
        self.pc
    }
}

#[derive(Debug, Clone)]
/// Runtime description derived from a VM error.
pub struct Backtrace {
    call_stack: Vec<BacktraceFrame>,
    error: InterpreterError,
}

impl Backtrace {
    /// Create a backtrace from a vm instance and the error that stopped
    /// it, before the frames are unwound.
    pub fn from_vm_error(vm: &Interpreter, error: InterpreterError) -> Self {
        let call_stack = vm
            .call_stack()
            .iter()
            .map(|frame| BacktraceFrame {
                function: vm
                    .functions()
                    .get(frame.function())
                    .map(|function| function.name().to_string())
                    .unwrap_or_default(),
                pc: frame.pc(),
            })
            .collect();

        Self { call_stack, error }
    }

    /// Call stack of the VM when the error occurred, bottom first.
    pub fn call_stack(&self) -> &[BacktraceFrame] {
        self.call_stack.as_slice()
    }

    /// The error that caused this backtrace.
    pub const fn error(&self) -> &InterpreterError {
        &self.error
    }
}

impl fmt::Display for Backtrace {
    /// One-line diagnostic naming the error kind and the offending source
    /// location, innermost frame first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error.panic_reason())?;

        match self.call_stack.last() {
            Some(frame) => write!(f, " in {} at pc {}", frame.function(), frame.pc()),
            None => Ok(()),
        }
    }
}
