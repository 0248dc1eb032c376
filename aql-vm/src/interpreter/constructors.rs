use super::{Interpreter, InterpreterParams};
use crate::function::Functions;
use crate::heap::Heap;

impl Interpreter {
    /// A fresh interpreter with the given limits.
    pub fn new(params: InterpreterParams) -> Self {
        Self {
            registers: Vec::new(),
            frames: Vec::new(),
            globals: Vec::new(),
            heap: Heap::new(params.heap),
            functions: Functions::default(),
            params,
            instructions_executed: 0,
            backtrace: None,
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(InterpreterParams::default())
    }
}
