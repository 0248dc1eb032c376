//! Inlined arithmetic, comparison and logic over `Int`/`Number`, with the
//! string-coercing `+` on top.

use super::Interpreter;
use crate::error::SimpleResult;
use crate::value::Value;

use aql_asm::{PanicReason, RegisterId};

impl Interpreter {
    /// `+`: numeric addition, or concatenation when either side is a
    /// string (the other operand is coerced through the canonical
    /// printer).
    pub(crate) fn alu_add(&mut self, a: RegisterId, b: RegisterId, c: RegisterId) -> SimpleResult<()> {
        let lhs = self.read_register(b)?;
        let rhs = self.read_register(c)?;

        if matches!(lhs, Value::String(_)) || matches!(rhs, Value::String(_)) {
            let mut text = self.heap.render(lhs);
            text.push_str(&self.heap.render(rhs));

            let value = self.heap.new_string(&text)?;
            self.transfer_register(a, value)?;
            self.gc_tick();

            return Ok(());
        }

        let value = match (lhs, rhs) {
            (Value::Int(l), Value::Int(r)) => match l.checked_add(r) {
                Some(sum) => Value::Int(sum),
                None => Value::Number(l as f64 + r as f64),
            },
            _ => Value::Number(Self::number(lhs)? + Self::number(rhs)?),
        };

        self.write_register(a, value)
    }

    /// `-`, `*`: integer arithmetic stays integer, promoting to `Number`
    /// on overflow; any `Number` operand computes in floating point.
    pub(crate) fn alu_numeric<I, F>(
        &mut self,
        a: RegisterId,
        b: RegisterId,
        c: RegisterId,
        int_op: I,
        float_op: F,
    ) -> SimpleResult<()>
    where
        I: FnOnce(i64, i64) -> Option<i64>,
        F: FnOnce(f64, f64) -> f64,
    {
        let lhs = self.read_register(b)?;
        let rhs = self.read_register(c)?;

        let value = match (lhs, rhs) {
            (Value::Int(l), Value::Int(r)) => match int_op(l, r) {
                Some(result) => Value::Int(result),
                None => Value::Number(float_op(l as f64, r as f64)),
            },
            _ => Value::Number(float_op(Self::number(lhs)?, Self::number(rhs)?)),
        };

        self.write_register(a, value)
    }

    /// `/`: always produces a `Number`; a zero divisor panics.
    pub(crate) fn alu_div(&mut self, a: RegisterId, b: RegisterId, c: RegisterId) -> SimpleResult<()> {
        let lhs = Self::number(self.read_register(b)?)?;
        let rhs = Self::number(self.read_register(c)?)?;

        if rhs == 0.0 {
            return Err(PanicReason::DivisionByZero);
        }

        self.write_register(a, Value::Number(lhs / rhs))
    }

    /// `%`: integer remainder for integer operands, floating remainder
    /// otherwise; a zero divisor panics.
    pub(crate) fn alu_mod(&mut self, a: RegisterId, b: RegisterId, c: RegisterId) -> SimpleResult<()> {
        let lhs = self.read_register(b)?;
        let rhs = self.read_register(c)?;

        match rhs {
            Value::Int(0) => return Err(PanicReason::DivisionByZero),
            Value::Number(n) if n == 0.0 => return Err(PanicReason::DivisionByZero),
            _ => (),
        }

        let value = match (lhs, rhs) {
            (Value::Int(l), Value::Int(r)) => match l.checked_rem(r) {
                Some(result) => Value::Int(result),
                None => Value::Number((l as f64) % (r as f64)),
            },
            _ => Value::Number(Self::number(lhs)? % Self::number(rhs)?),
        };

        self.write_register(a, value)
    }

    /// `==` / `!=`: never panics; mixed kinds are simply unequal.
    pub(crate) fn alu_eq(
        &mut self,
        a: RegisterId,
        b: RegisterId,
        c: RegisterId,
        negated: bool,
    ) -> SimpleResult<()> {
        let lhs = self.read_register(b)?;
        let rhs = self.read_register(c)?;

        let equal = self.heap.values_equal(lhs, rhs);

        self.write_register(a, Value::Bool(equal != negated))
    }

    /// Ordering comparisons operate on numbers only.
    pub(crate) fn alu_compare<F>(
        &mut self,
        a: RegisterId,
        b: RegisterId,
        c: RegisterId,
        compare: F,
    ) -> SimpleResult<()>
    where
        F: FnOnce(f64, f64) -> bool,
    {
        let lhs = Self::number(self.read_register(b)?)?;
        let rhs = Self::number(self.read_register(c)?)?;

        self.write_register(a, Value::Bool(compare(lhs, rhs)))
    }

    /// `!`: logical negation of truthiness.
    pub(crate) fn alu_not(&mut self, a: RegisterId, b: RegisterId) -> SimpleResult<()> {
        let value = self.read_register(b)?;

        self.write_register(a, Value::Bool(!value.is_truthy()))
    }

    /// Unary `-`.
    pub(crate) fn alu_neg(&mut self, a: RegisterId, b: RegisterId) -> SimpleResult<()> {
        let value = match self.read_register(b)? {
            Value::Int(i) => match i.checked_neg() {
                Some(negated) => Value::Int(negated),
                None => Value::Number(-(i as f64)),
            },
            Value::Number(n) => Value::Number(-n),
            _ => return Err(PanicReason::TypeMismatch),
        };

        self.write_register(a, value)
    }

    fn number(value: Value) -> SimpleResult<f64> {
        match value {
            Value::Int(i) => Ok(i as f64),
            Value::Number(n) => Ok(n),
            _ => Err(PanicReason::TypeMismatch),
        }
    }
}
