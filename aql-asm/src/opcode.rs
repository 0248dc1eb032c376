//! Opcode definitions: the operand-carrying [`Opcode`] the compiler emits
//! and the field-free [`OpcodeRepr`] the dispatcher branches on.

use crate::instruction::Instruction;
use crate::panic_reason::PanicReason;
use crate::types::{Immediate16, RawInstruction, RegisterId};

use consts::*;

use core::fmt;

pub mod consts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
/// Instruction representation for the interpreter.
///
/// Register operands (`$rA`, `$rB`, `$rC`) are unsigned indices into the
/// current frame's register window. `bx` is a signed 16-bit immediate
/// overlapping the `b` and `c` operand bytes; it indexes the current
/// function's constant pool (`K`), the process-wide global table (`G`) or
/// encodes a jump offset relative to the address **after** the jump
/// instruction. `U` is the current closure's up-value list.
///
/// All opcodes advance the program counter by one instruction after
/// performing their operation, except for the jump family, `CALL` and `RET`.
pub enum Opcode {
    /// Loads a constant-pool entry.
    ///
    /// | Operation   | ```$rA = K[bx];```     |
    /// | Syntax      | `loadk $rA, bx`        |
    /// | Encoding    | `0x00 rA bx bx`        |
    ///
    /// #### Panics
    /// - `bx` is out of the pool's bounds.
    LOADK(RegisterId, Immediate16) = OP_LOADK,

    /// Copies one register into another.
    ///
    /// | Operation   | ```$rA = $rB;```       |
    /// | Syntax      | `move $rA, $rB`        |
    /// | Encoding    | `0x01 rA rB -`         |
    MOVE(RegisterId, RegisterId) = OP_MOVE,

    /// Reads a global slot.
    ///
    /// | Operation   | ```$rA = G[bx];```     |
    /// | Syntax      | `gget $rA, bx`         |
    /// | Encoding    | `0x02 rA bx bx`        |
    ///
    /// #### Panics
    /// - `G[bx]` was never written (defensive undefined-name check).
    GGET(RegisterId, Immediate16) = OP_GGET,

    /// Writes a global slot.
    ///
    /// | Operation   | ```G[bx] = $rA;```     |
    /// | Syntax      | `gset $rA, bx`         |
    /// | Encoding    | `0x03 rA bx bx`        |
    GSET(RegisterId, Immediate16) = OP_GSET,

    /// Reads a local binding slot.
    ///
    /// | Operation   | ```$rA = $rB;```       |
    /// | Syntax      | `lget $rA, $rB`        |
    /// | Encoding    | `0x04 rA rB -`         |
    LGET(RegisterId, RegisterId) = OP_LGET,

    /// Writes a local binding slot. `$rA` is the binding.
    ///
    /// | Operation   | ```$rA = $rB;```       |
    /// | Syntax      | `lset $rA, $rB`        |
    /// | Encoding    | `0x05 rA rB -`         |
    LSET(RegisterId, RegisterId) = OP_LSET,

    /// Reads an up-value cell.
    ///
    /// | Operation   | ```$rA = U[b].cell;``` |
    /// | Syntax      | `uget $rA, b`          |
    /// | Encoding    | `0x06 rA b -`          |
    ///
    /// #### Panics
    /// - the current frame executes a plain function, or `b` is out of the
    ///   up-value list's bounds.
    UGET(RegisterId, RegisterId) = OP_UGET,

    /// Writes an up-value cell. The write is visible to every closure
    /// sharing the cell.
    ///
    /// | Operation   | ```U[b].cell = $rA;``` |
    /// | Syntax      | `uset $rA, b`          |
    /// | Encoding    | `0x07 rA b -`          |
    USET(RegisterId, RegisterId) = OP_USET,

    /// Adds two registers; concatenates when either operand is a string.
    ///
    /// | Operation   | ```$rA = $rB + $rC;``` |
    /// | Syntax      | `add $rA, $rB, $rC`    |
    /// | Encoding    | `0x10 rA rB rC`        |
    ///
    /// #### Panics
    /// - neither numeric nor string operands.
    ADD(RegisterId, RegisterId, RegisterId) = OP_ADD,

    /// Subtracts two registers.
    ///
    /// | Operation   | ```$rA = $rB - $rC;``` |
    /// | Syntax      | `sub $rA, $rB, $rC`    |
    /// | Encoding    | `0x11 rA rB rC`        |
    SUB(RegisterId, RegisterId, RegisterId) = OP_SUB,

    /// Multiplies two registers.
    ///
    /// | Operation   | ```$rA = $rB * $rC;``` |
    /// | Syntax      | `mul $rA, $rB, $rC`    |
    /// | Encoding    | `0x12 rA rB rC`        |
    MUL(RegisterId, RegisterId, RegisterId) = OP_MUL,

    /// Divides two registers.
    ///
    /// | Operation   | ```$rA = $rB / $rC;``` |
    /// | Syntax      | `div $rA, $rB, $rC`    |
    /// | Encoding    | `0x13 rA rB rC`        |
    ///
    /// #### Panics
    /// - `$rC` is zero.
    DIV(RegisterId, RegisterId, RegisterId) = OP_DIV,

    /// Modulo remainder of two registers.
    ///
    /// | Operation   | ```$rA = $rB % $rC;``` |
    /// | Syntax      | `mod $rA, $rB, $rC`    |
    /// | Encoding    | `0x14 rA rB rC`        |
    ///
    /// #### Panics
    /// - `$rC` is zero.
    MOD(RegisterId, RegisterId, RegisterId) = OP_MOD,

    /// Compares two registers for equality.
    EQ(RegisterId, RegisterId, RegisterId) = OP_EQ,

    /// Compares two registers for inequality.
    NEQ(RegisterId, RegisterId, RegisterId) = OP_NEQ,

    /// Compares two registers for less-than.
    ///
    /// #### Panics
    /// - non-numeric operands.
    LT(RegisterId, RegisterId, RegisterId) = OP_LT,

    /// Compares two registers for less-than-or-equal.
    LTE(RegisterId, RegisterId, RegisterId) = OP_LTE,

    /// Compares two registers for greater-than.
    GT(RegisterId, RegisterId, RegisterId) = OP_GT,

    /// Compares two registers for greater-than-or-equal.
    GTE(RegisterId, RegisterId, RegisterId) = OP_GTE,

    /// Logical negation of a register's truthiness.
    ///
    /// | Operation   | ```$rA = !$rB;```      |
    /// | Syntax      | `not $rA, $rB`         |
    /// | Encoding    | `0x26 rA rB -`         |
    NOT(RegisterId, RegisterId) = OP_NOT,

    /// Arithmetic negation.
    ///
    /// | Operation   | ```$rA = -$rB;```      |
    /// | Syntax      | `neg $rA, $rB`         |
    /// | Encoding    | `0x27 rA rB -`         |
    ///
    /// #### Panics
    /// - non-numeric operand.
    NEG(RegisterId, RegisterId) = OP_NEG,

    /// Unconditional relative jump.
    ///
    /// | Operation   | ```$pc += bx;```       |
    /// | Syntax      | `jmp bx`               |
    /// | Encoding    | `0x30 -  bx bx`        |
    JMP(Immediate16) = OP_JMP,

    /// Jumps when `$rA` is falsy (`nil` or `false`).
    ///
    /// | Operation   | ```if !truthy($rA) { $pc += bx };``` |
    /// | Syntax      | `jz $rA, bx`                         |
    /// | Encoding    | `0x31 rA bx bx`                      |
    JZ(RegisterId, Immediate16) = OP_JZ,

    /// Jumps when `$rA` is truthy.
    JNZ(RegisterId, Immediate16) = OP_JNZ,

    /// Allocates an array of immediate length `b`, filled with `nil`.
    ///
    /// | Operation   | ```$rA = array(b);```  |
    /// | Syntax      | `newa $rA, b`          |
    /// | Encoding    | `0x40 rA b -`          |
    NEWA(RegisterId, usize) = OP_NEWA,

    /// Allocates an array of length `$rB`, every slot filled with `$rC`.
    ///
    /// | Operation   | ```$rA = array($rB, $rC);``` |
    /// | Syntax      | `newac $rA, $rB, $rC`        |
    /// | Encoding    | `0x41 rA rB rC`              |
    ///
    /// #### Panics
    /// - `$rB` is not a non-negative integer.
    NEWAC(RegisterId, RegisterId, RegisterId) = OP_NEWAC,

    /// Indexed array read.
    ///
    /// | Operation   | ```$rA = $rB[$rC];```  |
    /// | Syntax      | `aget $rA, $rB, $rC`   |
    /// | Encoding    | `0x42 rA rB rC`        |
    ///
    /// #### Panics
    /// - `$rB` is not an array, `$rC` is not an integer, or the index is out
    ///   of range.
    AGET(RegisterId, RegisterId, RegisterId) = OP_AGET,

    /// Indexed array write.
    ///
    /// | Operation   | ```$rA[$rB] = $rC;```  |
    /// | Syntax      | `aset $rA, $rB, $rC`   |
    /// | Encoding    | `0x43 rA rB rC`        |
    ASET(RegisterId, RegisterId, RegisterId) = OP_ASET,

    /// Constructs a closure over the function in `$rB`, capturing the `c`
    /// values in `$rB+1 ..= $rB+c` into fresh up-value cells.
    ///
    /// | Operation   | ```$rA = closure($rB, $rB+1 .. $rB+c);``` |
    /// | Syntax      | `clos $rA, $rB, c`                        |
    /// | Encoding    | `0x50 rA rB c`                            |
    ///
    /// The capture source registers are logically dead afterwards. Within
    /// one frame instance the same `clos` site reuses the cells it created
    /// first, so sibling closures of one activation share their bindings.
    ///
    /// #### Panics
    /// - `$rB` does not hold a function.
    CLOS(RegisterId, RegisterId, usize) = OP_CLOS,

    /// Calls the function or closure in `$rA` with the `b - 1` arguments in
    /// `$rA+1 .. $rA+b`. The callee's register window starts at `$rA+1`; its
    /// single result replaces `$rA`.
    ///
    /// | Syntax      | `call $rA, b, c`       |
    /// | Encoding    | `0x51 rA b c`          |
    ///
    /// #### Panics
    /// - `$rA` is not callable, or the argument count does not match the
    ///   callee's parameter count.
    CALL(RegisterId, usize, usize) = OP_CALL,

    /// Returns from the current frame. `b < 2` returns no value (`nil`);
    /// otherwise `$rA` is the result.
    ///
    /// | Syntax      | `ret $rA, b`           |
    /// | Encoding    | `0x52 rA b -`          |
    RET(RegisterId, usize) = OP_RET,

    /// Releases the ephemeral slot `$rA`, leaving `nil` behind.
    ///
    /// | Syntax      | `pop $rA`              |
    /// | Encoding    | `0x53 rA - -`          |
    POP(RegisterId) = OP_POP,
}

impl Opcode {
    /// Opcode byte of this instruction.
    pub const fn repr(&self) -> OpcodeRepr {
        match self {
            Self::LOADK(..) => OpcodeRepr::LOADK,
            Self::MOVE(..) => OpcodeRepr::MOVE,
            Self::GGET(..) => OpcodeRepr::GGET,
            Self::GSET(..) => OpcodeRepr::GSET,
            Self::LGET(..) => OpcodeRepr::LGET,
            Self::LSET(..) => OpcodeRepr::LSET,
            Self::UGET(..) => OpcodeRepr::UGET,
            Self::USET(..) => OpcodeRepr::USET,
            Self::ADD(..) => OpcodeRepr::ADD,
            Self::SUB(..) => OpcodeRepr::SUB,
            Self::MUL(..) => OpcodeRepr::MUL,
            Self::DIV(..) => OpcodeRepr::DIV,
            Self::MOD(..) => OpcodeRepr::MOD,
            Self::EQ(..) => OpcodeRepr::EQ,
            Self::NEQ(..) => OpcodeRepr::NEQ,
            Self::LT(..) => OpcodeRepr::LT,
            Self::LTE(..) => OpcodeRepr::LTE,
            Self::GT(..) => OpcodeRepr::GT,
            Self::GTE(..) => OpcodeRepr::GTE,
            Self::NOT(..) => OpcodeRepr::NOT,
            Self::NEG(..) => OpcodeRepr::NEG,
            Self::JMP(..) => OpcodeRepr::JMP,
            Self::JZ(..) => OpcodeRepr::JZ,
            Self::JNZ(..) => OpcodeRepr::JNZ,
            Self::NEWA(..) => OpcodeRepr::NEWA,
            Self::NEWAC(..) => OpcodeRepr::NEWAC,
            Self::AGET(..) => OpcodeRepr::AGET,
            Self::ASET(..) => OpcodeRepr::ASET,
            Self::CLOS(..) => OpcodeRepr::CLOS,
            Self::CALL(..) => OpcodeRepr::CALL,
            Self::RET(..) => OpcodeRepr::RET,
            Self::POP(..) => OpcodeRepr::POP,
        }
    }
}

impl From<Opcode> for RawInstruction {
    fn from(op: Opcode) -> RawInstruction {
        use Opcode::*;

        let pack_abc = |op: u8, a: RegisterId, b: usize, c: usize| {
            (op as u32) << 24 | (a as u32 & 0xff) << 16 | (b as u32 & 0xff) << 8 | (c as u32 & 0xff)
        };
        let pack_abx = |op: u8, a: RegisterId, bx: Immediate16| {
            (op as u32) << 24 | (a as u32 & 0xff) << 16 | (bx as u16 as u32)
        };

        match op {
            LOADK(a, bx) => pack_abx(OP_LOADK, a, bx),
            MOVE(a, b) => pack_abc(OP_MOVE, a, b, 0),
            GGET(a, bx) => pack_abx(OP_GGET, a, bx),
            GSET(a, bx) => pack_abx(OP_GSET, a, bx),
            LGET(a, b) => pack_abc(OP_LGET, a, b, 0),
            LSET(a, b) => pack_abc(OP_LSET, a, b, 0),
            UGET(a, b) => pack_abc(OP_UGET, a, b, 0),
            USET(a, b) => pack_abc(OP_USET, a, b, 0),
            ADD(a, b, c) => pack_abc(OP_ADD, a, b, c),
            SUB(a, b, c) => pack_abc(OP_SUB, a, b, c),
            MUL(a, b, c) => pack_abc(OP_MUL, a, b, c),
            DIV(a, b, c) => pack_abc(OP_DIV, a, b, c),
            MOD(a, b, c) => pack_abc(OP_MOD, a, b, c),
            EQ(a, b, c) => pack_abc(OP_EQ, a, b, c),
            NEQ(a, b, c) => pack_abc(OP_NEQ, a, b, c),
            LT(a, b, c) => pack_abc(OP_LT, a, b, c),
            LTE(a, b, c) => pack_abc(OP_LTE, a, b, c),
            GT(a, b, c) => pack_abc(OP_GT, a, b, c),
            GTE(a, b, c) => pack_abc(OP_GTE, a, b, c),
            NOT(a, b) => pack_abc(OP_NOT, a, b, 0),
            NEG(a, b) => pack_abc(OP_NEG, a, b, 0),
            JMP(bx) => pack_abx(OP_JMP, 0, bx),
            JZ(a, bx) => pack_abx(OP_JZ, a, bx),
            JNZ(a, bx) => pack_abx(OP_JNZ, a, bx),
            NEWA(a, b) => pack_abc(OP_NEWA, a, b, 0),
            NEWAC(a, b, c) => pack_abc(OP_NEWAC, a, b, c),
            AGET(a, b, c) => pack_abc(OP_AGET, a, b, c),
            ASET(a, b, c) => pack_abc(OP_ASET, a, b, c),
            CLOS(a, b, c) => pack_abc(OP_CLOS, a, b, c),
            CALL(a, b, c) => pack_abc(OP_CALL, a, b, c),
            RET(a, b) => pack_abc(OP_RET, a, b, 0),
            POP(a) => pack_abc(OP_POP, a, 0, 0),
        }
    }
}

impl TryFrom<Instruction> for Opcode {
    type Error = PanicReason;

    fn try_from(instr: Instruction) -> Result<Self, PanicReason> {
        use Opcode::*;

        let (op, a, b, c, bx) = instr.into_inner();

        let op = match OpcodeRepr::from(op) {
            OpcodeRepr::LOADK => LOADK(a, bx),
            OpcodeRepr::MOVE => MOVE(a, b),
            OpcodeRepr::GGET => GGET(a, bx),
            OpcodeRepr::GSET => GSET(a, bx),
            OpcodeRepr::LGET => LGET(a, b),
            OpcodeRepr::LSET => LSET(a, b),
            OpcodeRepr::UGET => UGET(a, b),
            OpcodeRepr::USET => USET(a, b),
            OpcodeRepr::ADD => ADD(a, b, c),
            OpcodeRepr::SUB => SUB(a, b, c),
            OpcodeRepr::MUL => MUL(a, b, c),
            OpcodeRepr::DIV => DIV(a, b, c),
            OpcodeRepr::MOD => MOD(a, b, c),
            OpcodeRepr::EQ => EQ(a, b, c),
            OpcodeRepr::NEQ => NEQ(a, b, c),
            OpcodeRepr::LT => LT(a, b, c),
            OpcodeRepr::LTE => LTE(a, b, c),
            OpcodeRepr::GT => GT(a, b, c),
            OpcodeRepr::GTE => GTE(a, b, c),
            OpcodeRepr::NOT => NOT(a, b),
            OpcodeRepr::NEG => NEG(a, b),
            OpcodeRepr::JMP => JMP(bx),
            OpcodeRepr::JZ => JZ(a, bx),
            OpcodeRepr::JNZ => JNZ(a, bx),
            OpcodeRepr::NEWA => NEWA(a, b),
            OpcodeRepr::NEWAC => NEWAC(a, b, c),
            OpcodeRepr::AGET => AGET(a, b, c),
            OpcodeRepr::ASET => ASET(a, b, c),
            OpcodeRepr::CLOS => CLOS(a, b, c),
            OpcodeRepr::CALL => CALL(a, b, c),
            OpcodeRepr::RET => RET(a, b),
            OpcodeRepr::POP => POP(a),
            OpcodeRepr::UNDEFINED => return Err(PanicReason::InvalidInstruction),
        };

        Ok(op)
    }
}

impl TryFrom<RawInstruction> for Opcode {
    type Error = PanicReason;

    fn try_from(raw: RawInstruction) -> Result<Self, PanicReason> {
        Instruction::new(raw).try_into()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Opcode::*;

        match *self {
            LOADK(a, bx) => write!(f, "loadk r{a}, k{bx}"),
            MOVE(a, b) => write!(f, "move r{a}, r{b}"),
            GGET(a, bx) => write!(f, "gget r{a}, g{bx}"),
            GSET(a, bx) => write!(f, "gset r{a}, g{bx}"),
            LGET(a, b) => write!(f, "lget r{a}, r{b}"),
            LSET(a, b) => write!(f, "lset r{a}, r{b}"),
            UGET(a, b) => write!(f, "uget r{a}, u{b}"),
            USET(a, b) => write!(f, "uset r{a}, u{b}"),
            ADD(a, b, c) => write!(f, "add r{a}, r{b}, r{c}"),
            SUB(a, b, c) => write!(f, "sub r{a}, r{b}, r{c}"),
            MUL(a, b, c) => write!(f, "mul r{a}, r{b}, r{c}"),
            DIV(a, b, c) => write!(f, "div r{a}, r{b}, r{c}"),
            MOD(a, b, c) => write!(f, "mod r{a}, r{b}, r{c}"),
            EQ(a, b, c) => write!(f, "eq r{a}, r{b}, r{c}"),
            NEQ(a, b, c) => write!(f, "neq r{a}, r{b}, r{c}"),
            LT(a, b, c) => write!(f, "lt r{a}, r{b}, r{c}"),
            LTE(a, b, c) => write!(f, "lte r{a}, r{b}, r{c}"),
            GT(a, b, c) => write!(f, "gt r{a}, r{b}, r{c}"),
            GTE(a, b, c) => write!(f, "gte r{a}, r{b}, r{c}"),
            NOT(a, b) => write!(f, "not r{a}, r{b}"),
            NEG(a, b) => write!(f, "neg r{a}, r{b}"),
            JMP(bx) => write!(f, "jmp {bx}"),
            JZ(a, bx) => write!(f, "jz r{a}, {bx}"),
            JNZ(a, bx) => write!(f, "jnz r{a}, {bx}"),
            NEWA(a, b) => write!(f, "newa r{a}, {b}"),
            NEWAC(a, b, c) => write!(f, "newac r{a}, r{b}, r{c}"),
            AGET(a, b, c) => write!(f, "aget r{a}, r{b}, r{c}"),
            ASET(a, b, c) => write!(f, "aset r{a}, r{b}, r{c}"),
            CLOS(a, b, c) => write!(f, "clos r{a}, r{b}, {c}"),
            CALL(a, b, c) => write!(f, "call r{a}, {b}, {c}"),
            RET(a, b) => write!(f, "ret r{a}, {b}"),
            POP(a) => write!(f, "pop r{a}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
/// A version of `Opcode` without operands, used by the dispatcher to branch
/// without unnecessary decoding.
#[allow(missing_docs)]
pub enum OpcodeRepr {
    LOADK = OP_LOADK,
    MOVE = OP_MOVE,
    GGET = OP_GGET,
    GSET = OP_GSET,
    LGET = OP_LGET,
    LSET = OP_LSET,
    UGET = OP_UGET,
    USET = OP_USET,
    ADD = OP_ADD,
    SUB = OP_SUB,
    MUL = OP_MUL,
    DIV = OP_DIV,
    MOD = OP_MOD,
    EQ = OP_EQ,
    NEQ = OP_NEQ,
    LT = OP_LT,
    LTE = OP_LTE,
    GT = OP_GT,
    GTE = OP_GTE,
    NOT = OP_NOT,
    NEG = OP_NEG,
    JMP = OP_JMP,
    JZ = OP_JZ,
    JNZ = OP_JNZ,
    NEWA = OP_NEWA,
    NEWAC = OP_NEWAC,
    AGET = OP_AGET,
    ASET = OP_ASET,
    CLOS = OP_CLOS,
    CALL = OP_CALL,
    RET = OP_RET,
    POP = OP_POP,
    /// The byte can't be mapped to any known opcode.
    UNDEFINED = 0xff,
}

impl From<u8> for OpcodeRepr {
    fn from(b: u8) -> Self {
        use OpcodeRepr::*;

        match b {
            OP_LOADK => LOADK,
            OP_MOVE => MOVE,
            OP_GGET => GGET,
            OP_GSET => GSET,
            OP_LGET => LGET,
            OP_LSET => LSET,
            OP_UGET => UGET,
            OP_USET => USET,
            OP_ADD => ADD,
            OP_SUB => SUB,
            OP_MUL => MUL,
            OP_DIV => DIV,
            OP_MOD => MOD,
            OP_EQ => EQ,
            OP_NEQ => NEQ,
            OP_LT => LT,
            OP_LTE => LTE,
            OP_GT => GT,
            OP_GTE => GTE,
            OP_NOT => NOT,
            OP_NEG => NEG,
            OP_JMP => JMP,
            OP_JZ => JZ,
            OP_JNZ => JNZ,
            OP_NEWA => NEWA,
            OP_NEWAC => NEWAC,
            OP_AGET => AGET,
            OP_ASET => ASET,
            OP_CLOS => CLOS,
            OP_CALL => CALL,
            OP_RET => RET,
            OP_POP => POP,
            _ => UNDEFINED,
        }
    }
}
