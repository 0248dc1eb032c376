//! Shared type aliases for instruction operands.

/// Index of a register inside the current frame window.
pub type RegisterId = usize;

/// Signed wide immediate overlapping the `b` and `c` operand bytes.
///
/// Indexes constant pools and the global table, and encodes jump offsets
/// relative to the address after the jump instruction.
pub type Immediate16 = i16;

/// Packed representation of an instruction: `op(8) | a(8) | b(8) | c(8)`,
/// big-endian.
pub type RawInstruction = u32;

/// Stable identifier of a function interned in the runtime registry.
///
/// Constant pools reference functions by id only, never by owning pointer,
/// so a pool can never participate in a reference cycle.
pub type FunctionId = u32;
