//! Guaranteed-release teardown paths: frame unwind on error, value
//! hand-back and whole-interpreter shutdown.

use super::{CallFrame, Interpreter};
use crate::function::Functions;
use crate::value::Value;

use core::mem;

impl Interpreter {
    /// Release every register of a dead frame and the up-value cells its
    /// closure sites minted.
    pub(crate) fn teardown(&mut self, frame: &CallFrame) {
        let end = (frame.base() + frame.max_stack()).min(self.registers.len());

        for index in frame.base()..end {
            let replaced = mem::replace(&mut self.registers[index], Value::Nil);
            self.heap.release(replaced);
        }

        for cell in frame.cells() {
            self.heap.decref(cell);
        }
    }

    /// Unwind every frame after a runtime error.
    pub(crate) fn unwind(&mut self) {
        while let Some(frame) = self.frames.pop() {
            self.teardown(&frame);
        }

        self.registers.clear();
    }

    /// Hand back a value previously returned by
    /// [`Interpreter::execute`](Self::execute).
    pub fn release(&mut self, value: Value) {
        self.heap.release(value);
    }

    /// Release the global table and every constant pool, then run a final
    /// collection pass with no roots.
    ///
    /// Once every returned value was handed back, the heap's allocated
    /// bytes return to zero. The interpreter cannot execute afterwards.
    pub fn shutdown(&mut self) {
        for index in 0..self.globals.len() {
            let replaced = mem::replace(&mut self.globals[index], Value::Nil);
            self.heap.release(replaced);
        }
        self.globals.clear();

        let functions = mem::replace(&mut self.functions, Functions::default());
        self.heap.teardown_pool(&functions);

        self.heap.collect(core::iter::empty());
    }
}
