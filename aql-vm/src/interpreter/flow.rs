//! Jumps, the call/return hand-off protocol and closure construction.

use super::{CallFrame, Interpreter};
use crate::error::SimpleResult;
use crate::state::ExecuteState;
use crate::value::Value;

use aql_asm::{Immediate16, PanicReason, RegisterId};

use core::mem;

impl Interpreter {
    /// Relative jump; offsets are relative to the address after the jump
    /// instruction, which the fetch already advanced past.
    pub(crate) fn jump(&mut self, bx: Immediate16) -> SimpleResult<()> {
        let frame = self.frame_mut();
        let pc = frame.pc() as isize + bx as isize;

        if pc < 0 {
            return Err(PanicReason::InvalidInstruction);
        }

        frame.set_pc(pc as usize);

        Ok(())
    }

    /// Branch on the truthiness of `R[a]`.
    pub(crate) fn jump_if(
        &mut self,
        a: RegisterId,
        bx: Immediate16,
        when: bool,
    ) -> SimpleResult<()> {
        if self.read_register(a)?.is_truthy() == when {
            self.jump(bx)?;
        }

        Ok(())
    }

    /// `CALL a, b, c`: invoke `R[a]` with the `b - 1` arguments in
    /// `R[a+1..a+b]`. The callee window starts at the first argument, so
    /// arguments become the callee's parameter registers without copying.
    pub(crate) fn call(
        &mut self,
        a: RegisterId,
        b: usize,
        _c: usize,
    ) -> Result<ExecuteState, PanicReason> {
        let callee = self.read_register(a)?;
        let argc = b.saturating_sub(1);

        let (id, closure) = match callee {
            Value::Function(handle) => (self.heap.function_id(handle), None),
            Value::Closure(handle) => (self.heap.closure_function(handle), Some(handle)),
            _ => return Err(PanicReason::CallNonFunction),
        };

        if self.frames.len() >= self.params.max_call_depth {
            return Err(PanicReason::CallDepthExceeded);
        }

        let caller = self.frame();
        if a + b > caller.max_stack() {
            return Err(PanicReason::RegisterOutOfBounds);
        }

        let function = self.functions.get(id).ok_or(PanicReason::CallNonFunction)?;
        if function.param_count() != argc {
            return Err(PanicReason::ArityMismatch);
        }

        let max_stack = function.max_stack();
        let base = caller.base() + a + 1;
        let ret = caller.base() + a;

        tracing::trace!(
            function = function.name(),
            base,
            argc,
            depth = self.frames.len(),
            "call",
        );

        // Clear the window above the arguments; those slots may still hold
        // stale caller temporaries whose registers were already recycled.
        let end = base + max_stack;
        if self.registers.len() < end {
            self.registers.resize(end, Value::Nil);
        }
        for index in base + argc..end {
            let replaced = mem::replace(&mut self.registers[index], Value::Nil);
            self.heap.release(replaced);
        }

        self.frames
            .push(CallFrame::new(id, base, max_stack, closure, Some(ret)));

        Ok(ExecuteState::Proceed)
    }

    /// `RET a, b`: return `R[a]` (`nil` when `b < 2`), releasing the whole
    /// frame window.
    pub(crate) fn ret(&mut self, a: RegisterId, b: usize) -> Result<ExecuteState, PanicReason> {
        let value = if b < 2 {
            Value::Nil
        } else {
            self.read_register(a)?
        };

        // The result must survive its own frame's teardown.
        self.heap.retain(value);

        let frame = self.frames.pop().expect("no active frame");
        self.teardown(&frame);

        tracing::trace!(depth = self.frames.len(), "return");

        match frame.ret() {
            Some(ret) if !self.frames.is_empty() => {
                let caller = self.frame();
                let caller_end = caller.base() + caller.max_stack();
                self.registers.truncate(caller_end);

                // The retained reference transfers into the caller's slot;
                // only then is the value rooted again and a collection pass
                // safe.
                let replaced = mem::replace(&mut self.registers[ret], value);
                self.heap.release(replaced);
                self.gc_tick();

                Ok(ExecuteState::Proceed)
            }
            _ => {
                // Top-level return: the value leaves the register file, so
                // no pass may run here. Shutdown runs the final one.
                self.registers.truncate(frame.base());
                Ok(ExecuteState::Return(value))
            }
        }
    }

    /// `CLOS a, b, c`: build a closure over the function in `R[b]` with the
    /// captured values in `R[b+1..=b+c]`.
    ///
    /// The first execution of a site within a frame instance copies the
    /// captures into fresh cells and caches the cell list under the site's
    /// pc; later executions in the same frame reuse those cells, so sibling
    /// closures of one activation alias their bindings. Separate
    /// activations always mint separate cells.
    pub(crate) fn make_closure(
        &mut self,
        a: RegisterId,
        b: RegisterId,
        c: usize,
    ) -> SimpleResult<()> {
        let id = match self.read_register(b)? {
            Value::Function(handle) => self.heap.function_id(handle),
            _ => return Err(PanicReason::TypeMismatch),
        };

        // The fetch already advanced past this instruction.
        let site = self.frame().pc() - 1;

        let cells = match self.frame().site_cells(site).map(<[_]>::to_vec) {
            Some(cells) => {
                // Reused cells: the new closure takes its own references.
                for cell in &cells {
                    self.heap.incref(*cell);
                }
                cells
            }
            None => {
                let mut cells = Vec::with_capacity(c);
                for i in 0..c {
                    let value = self.read_register(b + 1 + i)?;
                    cells.push(self.heap.new_upvalue(value)?);
                }

                // The cache owns one reference per cell on top of the
                // closure's.
                for cell in &cells {
                    self.heap.incref(*cell);
                }
                self.frame_mut().cache_cells(site, cells.clone());

                cells
            }
        };

        let closure = self.heap.new_closure(id, cells)?;
        self.transfer_register(a, closure)?;
        self.gc_tick();

        Ok(())
    }
}
