//! Compiled function records and the process-wide registry

use crate::value::Value;

use aql_asm::{FunctionId, Instruction, RawInstruction};

use itertools::Itertools;

use core::fmt;

/// An immutable compiled function.
///
/// `max_stack` is the size of the register window a frame reserves for this
/// function; no instruction of a well-formed function addresses a register
/// at or past it.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    name: String,
    param_count: usize,
    max_stack: usize,
    code: Vec<RawInstruction>,
    constants: Vec<Value>,
}

impl Function {
    /// Assemble a function record.
    pub fn new(
        name: impl Into<String>,
        param_count: usize,
        max_stack: usize,
        code: Vec<RawInstruction>,
        constants: Vec<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            param_count,
            max_stack,
            code,
            constants,
        }
    }

    /// Symbolic name, as written in the source.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of parameters; they occupy the lowest registers on entry.
    pub const fn param_count(&self) -> usize {
        self.param_count
    }

    /// Size of the register window.
    pub const fn max_stack(&self) -> usize {
        self.max_stack
    }

    /// Packed instruction stream.
    pub fn code(&self) -> &[RawInstruction] {
        &self.code
    }

    /// Fetch and decode one instruction.
    pub fn instruction(&self, pc: usize) -> Option<Instruction> {
        self.code.get(pc).copied().map(Instruction::new)
    }

    /// Constant pool. Boxed entries hold one reference each, owned by the
    /// pool until teardown.
    pub fn constants(&self) -> &[Value] {
        &self.constants
    }
}

impl fmt::Display for Function {
    /// Disassembly listing, one instruction per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} (params: {}, window: {})",
            self.name, self.param_count, self.max_stack,
        )?;

        let listing = self
            .code
            .iter()
            .enumerate()
            .map(|(pc, raw)| format!("  {pc}: {}", Instruction::new(*raw)))
            .join("\n");

        f.write_str(&listing)
    }
}

/// Registry interning every compiled function under a stable id.
///
/// `MAKE_CLOSURE` and constant pools reference functions through these ids,
/// never through owning pointers, so cross-function references cannot form
/// cycles.
#[derive(Debug, Default)]
pub struct Functions {
    functions: Vec<Function>,
}

impl Functions {
    /// Intern a function, returning its id.
    pub fn register(&mut self, function: Function) -> FunctionId {
        let id = self.functions.len() as FunctionId;
        self.functions.push(function);

        id
    }

    /// Look a function up by id.
    pub fn get(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id as usize)
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether no function was registered yet.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Iterate all registered functions.
    pub fn iter(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }
}
