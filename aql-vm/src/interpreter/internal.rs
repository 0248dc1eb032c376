//! Register, global, constant and up-value access with the reference-count
//! discipline every store obeys: retain the incoming value, release the
//! displaced one.

use super::{CallFrame, Interpreter};
use crate::error::SimpleResult;
use crate::heap::Handle;
use crate::value::Value;

use aql_asm::{Immediate16, PanicReason, RegisterId};

use core::mem;

impl Interpreter {
    pub(crate) fn frame(&self) -> &CallFrame {
        self.frames.last().expect("no active frame")
    }

    pub(crate) fn frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("no active frame")
    }

    /// Absolute register file index of `register` in the current frame,
    /// bounds-checked against the function's declared window.
    pub(crate) fn reg_index(&self, register: RegisterId) -> SimpleResult<usize> {
        let frame = self.frame();
        if register >= frame.max_stack() {
            return Err(PanicReason::RegisterOutOfBounds);
        }

        Ok(frame.base() + register)
    }

    pub(crate) fn read_register(&self, register: RegisterId) -> SimpleResult<Value> {
        Ok(self.registers[self.reg_index(register)?])
    }

    /// Store a copy of `value`; the register owns a fresh reference.
    pub(crate) fn write_register(&mut self, register: RegisterId, value: Value) -> SimpleResult<()> {
        let index = self.reg_index(register)?;

        self.heap.retain(value);
        let replaced = mem::replace(&mut self.registers[index], value);
        self.heap.release(replaced);

        Ok(())
    }

    /// Store a freshly-allocated value; its initial reference transfers
    /// into the register.
    pub(crate) fn transfer_register(
        &mut self,
        register: RegisterId,
        value: Value,
    ) -> SimpleResult<()> {
        let index = self.reg_index(register)?;

        let replaced = mem::replace(&mut self.registers[index], value);
        self.heap.release(replaced);

        Ok(())
    }

    pub(crate) fn copy_register(&mut self, a: RegisterId, b: RegisterId) -> SimpleResult<()> {
        let value = self.read_register(b)?;
        self.write_register(a, value)
    }

    pub(crate) fn pop_register(&mut self, a: RegisterId) -> SimpleResult<()> {
        self.transfer_register(a, Value::Nil)
    }

    pub(crate) fn load_constant(&mut self, a: RegisterId, bx: Immediate16) -> SimpleResult<()> {
        let index = usize::try_from(bx).map_err(|_| PanicReason::ConstantOutOfBounds)?;
        let function = self
            .functions
            .get(self.frame().function())
            .expect("executing an unregistered function");
        let value = *function
            .constants()
            .get(index)
            .ok_or(PanicReason::ConstantOutOfBounds)?;

        self.write_register(a, value)
    }

    pub(crate) fn global_get(&mut self, a: RegisterId, bx: Immediate16) -> SimpleResult<()> {
        let index = usize::try_from(bx).map_err(|_| PanicReason::UndefinedName)?;
        // The table grows on first write, so an index past the written
        // length is a use before any definition ran.
        let value = *self
            .globals
            .get(index)
            .ok_or(PanicReason::UndefinedName)?;

        self.write_register(a, value)
    }

    pub(crate) fn global_set(&mut self, a: RegisterId, bx: Immediate16) -> SimpleResult<()> {
        let index = usize::try_from(bx).map_err(|_| PanicReason::UndefinedName)?;
        let value = self.read_register(a)?;

        if index >= self.globals.len() {
            self.globals.resize(index + 1, Value::Nil);
        }

        self.heap.retain(value);
        let replaced = mem::replace(&mut self.globals[index], value);
        self.heap.release(replaced);

        Ok(())
    }

    fn upvalue_cell(&self, index: usize) -> SimpleResult<Handle> {
        let closure = self
            .frame()
            .closure()
            .ok_or(PanicReason::UpvalueOutOfBounds)?;

        self.heap
            .closure_upvalues(closure)
            .get(index)
            .copied()
            .ok_or(PanicReason::UpvalueOutOfBounds)
    }

    pub(crate) fn upvalue_get(&mut self, a: RegisterId, b: usize) -> SimpleResult<()> {
        let cell = self.upvalue_cell(b)?;
        let value = self.heap.upvalue(cell);

        self.write_register(a, value)
    }

    pub(crate) fn upvalue_set(&mut self, a: RegisterId, b: usize) -> SimpleResult<()> {
        let cell = self.upvalue_cell(b)?;
        let value = self.read_register(a)?;

        self.heap.upvalue_store(cell, value);

        Ok(())
    }

    /// Run a cycle-collection pass when one is due. Called only between
    /// instructions, at allocation sites and the return epilogue.
    pub(crate) fn gc_tick(&mut self) {
        if !self.heap.should_collect() {
            return;
        }

        let roots: Vec<Handle> = self
            .registers
            .iter()
            .filter_map(|value| value.handle())
            .chain(self.globals.iter().filter_map(|value| value.handle()))
            .chain(self.frames.iter().flat_map(|frame| frame.cells()))
            .chain(
                self.functions
                    .iter()
                    .flat_map(|function| function.constants().iter())
                    .filter_map(|value| value.handle()),
            )
            .collect();

        self.heap.collect(roots);
    }
}
