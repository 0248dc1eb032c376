//! Array allocation and indexed access.

use super::Interpreter;
use crate::error::SimpleResult;
use crate::heap::Handle;
use crate::value::Value;

use aql_asm::{PanicReason, RegisterId};

impl Interpreter {
    /// `NEWA a, b`: array of immediate length `b`, filled with `nil`.
    pub(crate) fn new_array(&mut self, a: RegisterId, b: usize) -> SimpleResult<()> {
        let value = self.heap.new_array(b, Value::Nil)?;

        self.transfer_register(a, value)?;
        self.gc_tick();

        Ok(())
    }

    /// `NEWAC a, b, c`: array of length `R[b]`, filled with `R[c]`.
    pub(crate) fn new_array_with_capacity(
        &mut self,
        a: RegisterId,
        b: RegisterId,
        c: RegisterId,
    ) -> SimpleResult<()> {
        let len = match self.read_register(b)? {
            Value::Int(len) if len >= 0 => len as usize,
            Value::Int(_) => return Err(PanicReason::IndexOutOfRange),
            _ => return Err(PanicReason::TypeMismatch),
        };
        let fill = self.read_register(c)?;

        let value = self.heap.new_array(len, fill)?;

        self.transfer_register(a, value)?;
        self.gc_tick();

        Ok(())
    }

    /// `AGET a, b, c`: `R[a] = R[b][R[c]]`.
    pub(crate) fn array_get(
        &mut self,
        a: RegisterId,
        b: RegisterId,
        c: RegisterId,
    ) -> SimpleResult<()> {
        let array = self.array_operand(b)?;
        let index = self.index_operand(c)?;

        let value = *self
            .heap
            .array(array)
            .get(index)
            .ok_or(PanicReason::IndexOutOfRange)?;

        self.write_register(a, value)
    }

    /// `ASET a, b, c`: `R[a][R[b]] = R[c]`.
    pub(crate) fn array_set(
        &mut self,
        a: RegisterId,
        b: RegisterId,
        c: RegisterId,
    ) -> SimpleResult<()> {
        let array = self.array_operand(a)?;
        let index = self.index_operand(b)?;
        let value = self.read_register(c)?;

        self.heap.array_store(array, index, value)
    }

    fn array_operand(&self, register: RegisterId) -> SimpleResult<Handle> {
        match self.read_register(register)? {
            Value::Array(handle) => Ok(handle),
            _ => Err(PanicReason::TypeMismatch),
        }
    }

    /// Arrays are indexed by small non-negative integers.
    fn index_operand(&self, register: RegisterId) -> SimpleResult<usize> {
        match self.read_register(register)? {
            Value::Int(index) if index >= 0 => Ok(index as usize),
            Value::Int(_) => Err(PanicReason::IndexOutOfRange),
            _ => Err(PanicReason::TypeMismatch),
        }
    }
}
