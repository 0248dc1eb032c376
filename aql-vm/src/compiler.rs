//! AST to bytecode lowering.
//!
//! The compiler walks the tree once, interning constants and emitting typed
//! opcodes into a per-function scope; a [`SymbolTable`] stack mirrors the
//! lexical scopes and resolves names into register, global or up-value
//! indices. Locals are pinned to a low contiguous register prefix and
//! expression temporaries live strictly above them, so no temporary can
//! trample a live binding.

use crate::ast::{Block, Expr, Program, Stmt};
use crate::consts::*;
use crate::error::CompileError;
use crate::function::{Function, Functions};
use crate::heap::Heap;
use crate::value::Value;

use aql_asm::{FunctionId, Immediate16, Opcode, RawInstruction, RegisterId};

use core::mem;

mod regalloc;
pub mod symbol_table;

use regalloc::RegisterAllocator;
pub use symbol_table::{Symbol, SymbolScope, SymbolTable};

/// Unfilled `break`/`continue` jump positions of one lexical loop.
#[derive(Debug, Default)]
struct LoopContext {
    break_jumps: Vec<usize>,
    continue_jumps: Vec<usize>,
}

/// Bytecode and pool under construction for one function body.
#[derive(Debug)]
struct CompilationScope {
    name: String,
    param_count: usize,
    instructions: Vec<Opcode>,
    constants: Vec<Value>,
    regs: RegisterAllocator,
    loops: Vec<LoopContext>,
}

impl CompilationScope {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_count: 0,
            instructions: Vec::new(),
            constants: Vec::new(),
            regs: RegisterAllocator::default(),
            loops: Vec::new(),
        }
    }
}

/// The bytecode compiler.
///
/// Borrows the heap to intern string constants as real heap objects and the
/// function registry to intern compiled functions; the resulting top-level
/// function reproduces the program's semantics when executed.
#[derive(Debug)]
pub struct Compiler<'a> {
    heap: &'a mut Heap,
    functions: &'a mut Functions,
    symbols: SymbolTable,
    scopes: Vec<CompilationScope>,
}

impl<'a> Compiler<'a> {
    /// A fresh compiler writing into the given heap and registry.
    pub fn new(heap: &'a mut Heap, functions: &'a mut Functions) -> Self {
        Self {
            heap,
            functions,
            symbols: SymbolTable::default(),
            scopes: vec![CompilationScope::new("main")],
        }
    }

    /// Reserve a builtin global slot before compilation. The embedder is
    /// responsible for installing the matching value.
    pub fn define_builtin(&mut self, name: &str) -> Symbol {
        self.symbols.define_builtin(name)
    }

    /// Lower a whole program into the registered top-level function.
    ///
    /// The value of a trailing expression statement becomes the program's
    /// result. No function is registered when lowering fails.
    pub fn compile(mut self, program: &Program) -> Result<FunctionId, CompileError> {
        let count = program.stmts.len();
        for (i, stmt) in program.stmts.iter().enumerate() {
            match stmt {
                Stmt::ExprStmt { expr } if i + 1 == count => {
                    let result = self.expr(expr)?;
                    self.emit(Opcode::RET(result, 2));
                }
                _ => self.stmt(stmt)?,
            }
        }

        if !matches!(
            program.stmts.last(),
            Some(Stmt::ExprStmt { .. } | Stmt::Return { .. })
        ) {
            self.emit(Opcode::RET(0, 1));
        }

        let scope = self.scopes.pop().expect("scope underflow");
        let function = Function::new(
            scope.name,
            0,
            scope.regs.max_stack(),
            assemble(scope.instructions),
            scope.constants,
        );

        Ok(self.functions.register(function))
    }

    /* STATEMENTS */

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Let { name, value } => self.binding(name, value, false)?,
            Stmt::Const { name, value } => self.binding(name, value, true)?,
            Stmt::Assign { name, value } => self.assign(name, value)?,
            Stmt::IndexAssign {
                target,
                index,
                value,
            } => {
                let target = self.expr(target)?;
                let index = self.expr(index)?;
                let value = self.expr(value)?;

                self.emit(Opcode::ASET(target, index, value));
                self.free(value);
                self.free(index);
                self.free(target);
            }
            Stmt::Return { value } => match value {
                Some(value) => {
                    let result = self.expr(value)?;
                    self.emit(Opcode::RET(result, 2));
                    self.free(result);
                }
                None => {
                    self.emit(Opcode::RET(0, 1));
                }
            },
            Stmt::ExprStmt { expr } => {
                let result = self.expr(expr)?;
                self.emit(Opcode::POP(result));
                self.free(result);
            }
            Stmt::If {
                cond,
                then,
                elifs,
                alt,
            } => self.if_stmt(cond, then, elifs, alt.as_ref())?,
            Stmt::While { cond, body } => self.while_stmt(cond, body)?,
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => self.for_stmt(init.as_deref(), cond.as_ref(), update.as_deref(), body)?,
            Stmt::Break => {
                let jump = self.emit(Opcode::JMP(0));
                let ctx = self
                    .scope_mut()
                    .loops
                    .last_mut()
                    .ok_or(CompileError::BreakOutsideLoop)?;
                ctx.break_jumps.push(jump);
            }
            Stmt::Continue => {
                let jump = self.emit(Opcode::JMP(0));
                let ctx = self
                    .scope_mut()
                    .loops
                    .last_mut()
                    .ok_or(CompileError::ContinueOutsideLoop)?;
                ctx.continue_jumps.push(jump);
            }
            Stmt::Block(block) => self.block(block)?,
        }

        // Statement boundary: every temporary is dead.
        self.scope_mut().regs.reset();

        Ok(())
    }

    fn block(&mut self, block: &Block) -> Result<(), CompileError> {
        block.stmts.iter().try_for_each(|stmt| self.stmt(stmt))
    }

    fn binding(&mut self, name: &str, value: &Expr, is_const: bool) -> Result<(), CompileError> {
        let result = self.expr(value)?;
        let symbol = self.define(name, is_const)?;

        self.store_symbol(&symbol, result);
        self.free(result);

        Ok(())
    }

    fn assign(&mut self, name: &str, value: &Expr) -> Result<(), CompileError> {
        let result = self.expr(value)?;

        match self.symbols.resolve(name) {
            Some(symbol) if symbol.is_const || symbol.scope == SymbolScope::Builtin => {
                return Err(CompileError::InvalidAssignmentTarget(name.into()));
            }
            Some(symbol) => match symbol.scope {
                SymbolScope::Global => {
                    self.emit(Opcode::GSET(result, symbol.index as Immediate16));
                }
                SymbolScope::Local => {
                    self.emit(Opcode::LSET(symbol.index, result));
                }
                SymbolScope::Free => {
                    self.emit(Opcode::USET(result, symbol.index));
                }
                SymbolScope::Builtin => unreachable!("rejected above"),
            },
            // A bare assignment to an unknown name defines it: a global at
            // the top level, a local inside a function.
            None => {
                let symbol = self.define(name, false)?;
                self.store_symbol(&symbol, result);
            }
        }

        self.free(result);

        Ok(())
    }

    fn if_stmt(
        &mut self,
        cond: &Expr,
        then: &Block,
        elifs: &[(Expr, Block)],
        alt: Option<&Block>,
    ) -> Result<(), CompileError> {
        let mut end_jumps = Vec::new();
        let arms = core::iter::once((cond, then)).chain(elifs.iter().map(|(c, b)| (c, b)));

        for (cond, body) in arms {
            let cond_reg = self.expr(cond)?;
            let skip = self.emit(Opcode::JZ(cond_reg, 0));
            self.free(cond_reg);

            self.block(body)?;
            end_jumps.push(self.emit(Opcode::JMP(0)));

            let next_arm = self.position();
            self.patch_jump(skip, next_arm)?;
        }

        if let Some(alt) = alt {
            self.block(alt)?;
        }

        let end = self.position();
        for jump in end_jumps {
            self.patch_jump(jump, end)?;
        }

        Ok(())
    }

    fn while_stmt(&mut self, cond: &Expr, body: &Block) -> Result<(), CompileError> {
        let loop_start = self.position();

        let cond_reg = self.expr(cond)?;
        let exit = self.emit(Opcode::JZ(cond_reg, 0));
        self.free(cond_reg);

        self.scope_mut().loops.push(LoopContext::default());
        self.block(body)?;

        let back = self.emit(Opcode::JMP(0));
        self.patch_jump(back, loop_start)?;

        let end = self.position();
        self.patch_jump(exit, end)?;

        let ctx = self.scope_mut().loops.pop().expect("loop underflow");
        for jump in ctx.break_jumps {
            self.patch_jump(jump, end)?;
        }
        // `continue` in a while loop re-tests the condition.
        for jump in ctx.continue_jumps {
            self.patch_jump(jump, loop_start)?;
        }

        Ok(())
    }

    fn for_stmt(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        update: Option<&Stmt>,
        body: &Block,
    ) -> Result<(), CompileError> {
        if let Some(init) = init {
            self.stmt(init)?;
        }

        let loop_start = self.position();
        let exit = match cond {
            Some(cond) => {
                let cond_reg = self.expr(cond)?;
                let exit = self.emit(Opcode::JZ(cond_reg, 0));
                self.free(cond_reg);
                Some(exit)
            }
            None => None,
        };

        self.scope_mut().loops.push(LoopContext::default());
        self.block(body)?;

        // `continue` in a for loop runs the update section first.
        let update_label = self.position();
        if let Some(update) = update {
            self.stmt(update)?;
        }

        let back = self.emit(Opcode::JMP(0));
        self.patch_jump(back, loop_start)?;

        let end = self.position();
        if let Some(exit) = exit {
            self.patch_jump(exit, end)?;
        }

        let ctx = self.scope_mut().loops.pop().expect("loop underflow");
        for jump in ctx.break_jumps {
            self.patch_jump(jump, end)?;
        }
        for jump in ctx.continue_jumps {
            self.patch_jump(jump, update_label)?;
        }

        Ok(())
    }

    /* EXPRESSIONS */

    fn expr(&mut self, expr: &Expr) -> Result<RegisterId, CompileError> {
        match expr {
            Expr::Int(i) => self.load_constant(Value::Int(*i)),
            Expr::Float(n) => self.load_constant(Value::Number(*n)),
            Expr::Bool(b) => self.load_constant(Value::Bool(*b)),
            Expr::Null => self.load_constant(Value::Nil),
            Expr::String(s) => {
                let k = self.string_constant(s)?;
                let result = self.alloc()?;
                self.emit(Opcode::LOADK(result, k as Immediate16));
                Ok(result)
            }
            Expr::Ident(name) => {
                let symbol = self
                    .symbols
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                let result = self.alloc()?;
                self.load_symbol(&symbol, result);
                Ok(result)
            }
            Expr::Prefix { op, expr } => {
                let operand = self.expr(expr)?;
                self.free(operand);
                let result = self.alloc()?;

                match op.as_str() {
                    "!" => self.emit(Opcode::NOT(result, operand)),
                    "-" => self.emit(Opcode::NEG(result, operand)),
                    _ => return Err(CompileError::UnknownOperator(op.clone())),
                };

                Ok(result)
            }
            Expr::Infix { op, lhs, rhs } => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                self.free(rhs);
                self.free(lhs);
                let result = self.alloc()?;

                match op.as_str() {
                    "+" => self.emit(Opcode::ADD(result, lhs, rhs)),
                    "-" => self.emit(Opcode::SUB(result, lhs, rhs)),
                    "*" => self.emit(Opcode::MUL(result, lhs, rhs)),
                    "/" => self.emit(Opcode::DIV(result, lhs, rhs)),
                    "%" => self.emit(Opcode::MOD(result, lhs, rhs)),
                    "==" => self.emit(Opcode::EQ(result, lhs, rhs)),
                    "!=" => self.emit(Opcode::NEQ(result, lhs, rhs)),
                    "<" => self.emit(Opcode::LT(result, lhs, rhs)),
                    "<=" => self.emit(Opcode::LTE(result, lhs, rhs)),
                    ">" => self.emit(Opcode::GT(result, lhs, rhs)),
                    ">=" => self.emit(Opcode::GTE(result, lhs, rhs)),
                    _ => return Err(CompileError::UnknownOperator(op.clone())),
                };

                Ok(result)
            }
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::Index { target, index } => {
                let target = self.expr(target)?;
                let index = self.expr(index)?;
                self.free(index);
                self.free(target);
                let result = self.alloc()?;

                self.emit(Opcode::AGET(result, target, index));

                Ok(result)
            }
            Expr::Array { elems } => self.array_literal(elems),
            Expr::ArrayCtor { capacity, default } => {
                let capacity = self.expr(capacity)?;
                let fill = match default {
                    Some(default) => self.expr(default)?,
                    None => self.load_constant(Value::Nil)?,
                };
                self.free(fill);
                self.free(capacity);
                let result = self.alloc()?;

                self.emit(Opcode::NEWAC(result, capacity, fill));

                Ok(result)
            }
            Expr::FuncLit { name, params, body } => {
                self.function_literal(name.as_deref(), params, body)
            }
        }
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Result<RegisterId, CompileError> {
        let argc = args.len();

        // The callee and its arguments must land in contiguous registers:
        // the callee's window starts right above its own slot.
        let base = self.alloc_block(argc + 1)?;

        let callee = self.expr(callee)?;
        self.move_into(base, callee);

        for (i, arg) in args.iter().enumerate() {
            let arg = self.expr(arg)?;
            self.move_into(base + 1 + i, arg);
        }

        self.emit(Opcode::CALL(base, argc + 1, 1));

        for i in 1..=argc {
            self.free(base + i);
        }

        Ok(base)
    }

    fn array_literal(&mut self, elems: &[Expr]) -> Result<RegisterId, CompileError> {
        let result = self.alloc()?;

        if elems.len() <= u8::MAX as usize {
            self.emit(Opcode::NEWA(result, elems.len()));
        } else {
            // Oversized literals route through the runtime-length form.
            let capacity = self.load_constant(Value::Int(elems.len() as i64))?;
            let fill = self.load_constant(Value::Nil)?;
            self.emit(Opcode::NEWAC(result, capacity, fill));
            self.free(fill);
            self.free(capacity);
        }

        for (i, elem) in elems.iter().enumerate() {
            let index = self.load_constant(Value::Int(i as i64))?;
            let value = self.expr(elem)?;

            self.emit(Opcode::ASET(result, index, value));
            self.free(value);
            self.free(index);
        }

        Ok(result)
    }

    fn function_literal(
        &mut self,
        name: Option<&str>,
        params: &[String],
        body: &Block,
    ) -> Result<RegisterId, CompileError> {
        // A named literal binds in the enclosing scope before its body is
        // compiled, so top-level recursion by name resolves.
        let binding = match name {
            Some(name) => Some(self.define(name, false)?),
            None => None,
        };

        self.enter_scope(name.unwrap_or("<anonymous>"));

        for param in params {
            let symbol = self.symbols.define(param, false);
            self.scope_mut().regs.pin(symbol.index);
        }
        self.scope_mut().param_count = params.len();

        self.block(body)?;

        if !matches!(body.stmts.last(), Some(Stmt::Return { .. })) {
            self.emit(Opcode::RET(0, 1));
        }

        let (scope, free_symbols) = self.leave_scope();

        if free_symbols.len() > u8::MAX as usize {
            return Err(CompileError::TooManyUpvalues(scope.name));
        }

        let function = Function::new(
            scope.name,
            scope.param_count,
            scope.regs.max_stack().max(scope.param_count),
            assemble(scope.instructions),
            scope.constants,
        );
        let id = self.functions.register(function);

        let value = self
            .heap
            .new_function(id)
            .map_err(|_| CompileError::OutOfMemory)?;
        let k = self.push_constant(value)?;

        if free_symbols.is_empty() {
            let result = self.alloc()?;
            self.emit(Opcode::LOADK(result, k as Immediate16));

            if let Some(symbol) = &binding {
                self.store_symbol(symbol, result);
            }

            return Ok(result);
        }

        // Captured values travel in the registers right above the function.
        let base = self.alloc_block(free_symbols.len() + 1)?;
        self.emit(Opcode::LOADK(base, k as Immediate16));

        for (i, symbol) in free_symbols.iter().enumerate() {
            self.load_symbol(symbol, base + 1 + i);
        }

        self.emit(Opcode::CLOS(base, base, free_symbols.len()));

        for i in 1..=free_symbols.len() {
            self.free(base + i);
        }

        if let Some(symbol) = &binding {
            self.store_symbol(symbol, base);
        }

        Ok(base)
    }

    /* SYMBOL ACCESS */

    fn define(&mut self, name: &str, is_const: bool) -> Result<Symbol, CompileError> {
        let symbol = self.symbols.define(name, is_const);

        match symbol.scope {
            SymbolScope::Global if symbol.index > VM_MAX_POOL_INDEX => {
                Err(CompileError::TooManyGlobals)
            }
            SymbolScope::Local if symbol.index >= VM_MAX_REGISTERS => {
                Err(CompileError::TooManyRegisters(self.scope().name.clone()))
            }
            SymbolScope::Local => {
                self.scope_mut().regs.pin(symbol.index);
                Ok(symbol)
            }
            _ => Ok(symbol),
        }
    }

    fn load_symbol(&mut self, symbol: &Symbol, target: RegisterId) {
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => {
                self.emit(Opcode::GGET(target, symbol.index as Immediate16));
            }
            SymbolScope::Local => {
                self.emit(Opcode::LGET(target, symbol.index));
            }
            SymbolScope::Free => {
                self.emit(Opcode::UGET(target, symbol.index));
            }
        }
    }

    fn store_symbol(&mut self, symbol: &Symbol, source: RegisterId) {
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => {
                self.emit(Opcode::GSET(source, symbol.index as Immediate16));
            }
            SymbolScope::Local => {
                if symbol.index != source {
                    self.emit(Opcode::MOVE(symbol.index, source));
                }
            }
            SymbolScope::Free => {
                self.emit(Opcode::USET(source, symbol.index));
            }
        }
    }

    /* SCOPES, REGISTERS, CONSTANTS */

    fn enter_scope(&mut self, name: &str) {
        self.scopes.push(CompilationScope::new(name));
        self.symbols = SymbolTable::enclosed(mem::take(&mut self.symbols));
    }

    fn leave_scope(&mut self) -> (CompilationScope, Vec<Symbol>) {
        let scope = self.scopes.pop().expect("scope underflow");
        let (outer, free_symbols) = mem::take(&mut self.symbols).pop();
        self.symbols = outer.expect("scope underflow");

        (scope, free_symbols)
    }

    fn scope(&self) -> &CompilationScope {
        self.scopes.last().expect("scope underflow")
    }

    fn scope_mut(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("scope underflow")
    }

    fn emit(&mut self, op: Opcode) -> usize {
        let scope = self.scope_mut();
        scope.instructions.push(op);

        scope.instructions.len() - 1
    }

    fn position(&self) -> usize {
        self.scope().instructions.len()
    }

    /// Rewrite the placeholder offset of the jump at `position` to land on
    /// `target`. Offsets are relative to the address after the jump.
    fn patch_jump(&mut self, position: usize, target: usize) -> Result<(), CompileError> {
        let offset = target as isize - (position as isize + 1);
        let offset = Immediate16::try_from(offset).map_err(|_| CompileError::JumpOutOfRange)?;

        let instructions = &mut self.scope_mut().instructions;
        instructions[position] = match instructions[position] {
            Opcode::JMP(_) => Opcode::JMP(offset),
            Opcode::JZ(register, _) => Opcode::JZ(register, offset),
            Opcode::JNZ(register, _) => Opcode::JNZ(register, offset),
            _ => unreachable!("patched a non-jump instruction"),
        };

        Ok(())
    }

    fn alloc(&mut self) -> Result<RegisterId, CompileError> {
        let scope = self.scope_mut();
        scope
            .regs
            .alloc()
            .ok_or_else(|| CompileError::TooManyRegisters(scope.name.clone()))
    }

    fn alloc_block(&mut self, len: usize) -> Result<RegisterId, CompileError> {
        let scope = self.scope_mut();
        scope
            .regs
            .alloc_block(len)
            .ok_or_else(|| CompileError::TooManyRegisters(scope.name.clone()))
    }

    fn free(&mut self, register: RegisterId) {
        self.scope_mut().regs.free(register);
    }

    fn move_into(&mut self, target: RegisterId, source: RegisterId) {
        if source != target {
            self.emit(Opcode::MOVE(target, source));
            self.free(source);
        }
    }

    fn load_constant(&mut self, value: Value) -> Result<RegisterId, CompileError> {
        let k = self.constant(value)?;
        let result = self.alloc()?;
        self.emit(Opcode::LOADK(result, k as Immediate16));

        Ok(result)
    }

    /// Intern an immediate constant, reusing a structurally equal entry.
    fn constant(&mut self, value: Value) -> Result<usize, CompileError> {
        debug_assert!(value.handle().is_none());

        let scope = self.scope();
        if let Some(k) = scope.constants.iter().position(|entry| *entry == value) {
            return Ok(k);
        }

        self.push_constant(value)
    }

    /// Intern a string constant, reusing an entry with equal contents.
    fn string_constant(&mut self, contents: &str) -> Result<usize, CompileError> {
        let heap = &self.heap;
        let scope = self.scopes.last().expect("scope underflow");

        let interned = scope.constants.iter().position(
            |entry| matches!(entry, Value::String(h) if heap.string(*h) == contents),
        );
        if let Some(k) = interned {
            return Ok(k);
        }

        let value = self
            .heap
            .new_string(contents)
            .map_err(|_| CompileError::OutOfMemory)?;

        self.push_constant(value)
    }

    fn push_constant(&mut self, value: Value) -> Result<usize, CompileError> {
        let scope = self.scope_mut();
        if scope.constants.len() > VM_MAX_POOL_INDEX {
            return Err(CompileError::TooManyConstants(scope.name.clone()));
        }

        scope.constants.push(value);

        Ok(scope.constants.len() - 1)
    }
}

fn assemble(instructions: Vec<Opcode>) -> Vec<RawInstruction> {
    instructions.into_iter().map(RawInstruction::from).collect()
}
