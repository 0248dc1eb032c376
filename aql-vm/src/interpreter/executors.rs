//! Fetch/dispatch loop and the top-level execution entry points.

use super::{CallFrame, Interpreter};
use crate::ast::Program;
use crate::backtrace::Backtrace;
use crate::compiler::Compiler;
use crate::error::{CompileError, Error, InterpreterError};
use crate::state::{ExecuteState, ProgramState};
use crate::value::Value;

use aql_asm::{FunctionId, Instruction, OpcodeRepr, PanicReason, RawInstruction};

impl Interpreter {
    /// A compiler writing into this interpreter's heap and registry. Use
    /// it directly to reserve builtin slots before compiling.
    pub fn compiler(&mut self) -> Compiler<'_> {
        Compiler::new(&mut self.heap, &mut self.functions)
    }

    /// Lower a program into this interpreter's registry.
    pub fn compile(&mut self, program: &Program) -> Result<FunctionId, CompileError> {
        self.compiler().compile(program)
    }

    /// Compile and execute a program; the returned value carries one owned
    /// reference, to be handed back through [`Interpreter::release`].
    pub fn run(&mut self, program: &Program) -> Result<Value, Error> {
        let main = self.compile(program)?;

        Ok(self.execute(main)?)
    }

    /// Execute a registered zero-parameter function to its final value.
    ///
    /// On a runtime error every frame is unwound, its registers released,
    /// and a [`Backtrace`] is captured for the embedder.
    pub fn execute(&mut self, function: FunctionId) -> Result<Value, InterpreterError> {
        let record = self
            .functions
            .get(function)
            .ok_or(InterpreterError::Panic(PanicReason::CallNonFunction))?;
        if record.param_count() != 0 {
            return Err(InterpreterError::Panic(PanicReason::ArityMismatch));
        }

        let max_stack = record.max_stack();
        let base = self.registers.len();
        self.registers.resize(base + max_stack, Value::Nil);
        self.frames
            .push(CallFrame::new(function, base, max_stack, None, None));

        match self.run_program() {
            Ok(state) => Ok(state.value()),
            Err(error) => {
                self.backtrace = Some(Backtrace::from_vm_error(self, error));
                self.unwind();

                Err(error)
            }
        }
    }

    fn run_program(&mut self) -> Result<ProgramState, InterpreterError> {
        loop {
            match self.step()? {
                ExecuteState::Proceed => continue,
                ExecuteState::Return(value) => return Ok(ProgramState::Return(value)),
            }
        }
    }

    /// Fetch, decode and execute one instruction.
    fn step(&mut self) -> Result<ExecuteState, InterpreterError> {
        if let Some(budget) = self.params.instruction_budget {
            if self.instructions_executed >= budget {
                return Err(InterpreterError::Panic(
                    PanicReason::ExecutionBudgetExceeded,
                ));
            }
        }
        self.instructions_executed += 1;

        let frame = self.frame();
        let pc = frame.pc();
        let raw = self
            .functions
            .get(frame.function())
            .expect("executing an unregistered function")
            .code()
            .get(pc)
            .copied()
            .ok_or(InterpreterError::Panic(PanicReason::InvalidInstruction))?;

        self.frame_mut().advance();

        self.instruction(raw, pc)
    }

    /// Execute a decoded instruction, attaching the offending instruction
    /// and pc to any panic.
    pub(crate) fn instruction(
        &mut self,
        raw: RawInstruction,
        pc: usize,
    ) -> Result<ExecuteState, InterpreterError> {
        self._instruction(Instruction::new(raw))
            .map_err(|reason| InterpreterError::from_runtime(reason, raw, pc))
    }

    fn _instruction(&mut self, instr: Instruction) -> Result<ExecuteState, PanicReason> {
        let (op, a, b, c, bx) = instr.into_inner();

        match OpcodeRepr::from(op) {
            OpcodeRepr::LOADK => {
                self.load_constant(a, bx)?;
            }

            // The three register-to-register forms differ only in which
            // operand the compiler considers the binding slot.
            OpcodeRepr::MOVE | OpcodeRepr::LGET | OpcodeRepr::LSET => {
                self.copy_register(a, b)?;
            }

            OpcodeRepr::GGET => {
                self.global_get(a, bx)?;
            }

            OpcodeRepr::GSET => {
                self.global_set(a, bx)?;
            }

            OpcodeRepr::UGET => {
                self.upvalue_get(a, b)?;
            }

            OpcodeRepr::USET => {
                self.upvalue_set(a, b)?;
            }

            OpcodeRepr::ADD => {
                self.alu_add(a, b, c)?;
            }

            OpcodeRepr::SUB => {
                self.alu_numeric(a, b, c, i64::checked_sub, |l, r| l - r)?;
            }

            OpcodeRepr::MUL => {
                self.alu_numeric(a, b, c, i64::checked_mul, |l, r| l * r)?;
            }

            OpcodeRepr::DIV => {
                self.alu_div(a, b, c)?;
            }

            OpcodeRepr::MOD => {
                self.alu_mod(a, b, c)?;
            }

            OpcodeRepr::EQ => {
                self.alu_eq(a, b, c, false)?;
            }

            OpcodeRepr::NEQ => {
                self.alu_eq(a, b, c, true)?;
            }

            OpcodeRepr::LT => {
                self.alu_compare(a, b, c, |l, r| l < r)?;
            }

            OpcodeRepr::LTE => {
                self.alu_compare(a, b, c, |l, r| l <= r)?;
            }

            OpcodeRepr::GT => {
                self.alu_compare(a, b, c, |l, r| l > r)?;
            }

            OpcodeRepr::GTE => {
                self.alu_compare(a, b, c, |l, r| l >= r)?;
            }

            OpcodeRepr::NOT => {
                self.alu_not(a, b)?;
            }

            OpcodeRepr::NEG => {
                self.alu_neg(a, b)?;
            }

            OpcodeRepr::JMP => {
                self.jump(bx)?;
            }

            OpcodeRepr::JZ => {
                self.jump_if(a, bx, false)?;
            }

            OpcodeRepr::JNZ => {
                self.jump_if(a, bx, true)?;
            }

            OpcodeRepr::NEWA => {
                self.new_array(a, b)?;
            }

            OpcodeRepr::NEWAC => {
                self.new_array_with_capacity(a, b, c)?;
            }

            OpcodeRepr::AGET => {
                self.array_get(a, b, c)?;
            }

            OpcodeRepr::ASET => {
                self.array_set(a, b, c)?;
            }

            OpcodeRepr::CLOS => {
                self.make_closure(a, b, c)?;
            }

            OpcodeRepr::CALL => {
                return self.call(a, b, c);
            }

            OpcodeRepr::RET => {
                return self.ret(a, b);
            }

            OpcodeRepr::POP => {
                self.pop_register(a)?;
            }

            OpcodeRepr::UNDEFINED => {
                return Err(PanicReason::InvalidInstruction);
            }
        }

        Ok(ExecuteState::Proceed)
    }
}
