//! Operator semantics shared by the interpreter and the fragment runtime.

use std::cmp::Ordering;

use crate::{
    error::{DivisionByZero, EvalError, InvalidKey, InvalidOperand},
    parser::BinaryOp,
    value::Value,
};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    fn truncate(self) -> i64 {
        match self {
            Self::Int(i) => i,
            Self::Float(f) => f as i64,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Self::Int(i) => i == 0,
            Self::Float(f) => f == 0.0,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Self::Int(i) => Value::Int(i),
            Self::Float(f) => Value::Float(f),
        }
    }
}

fn parse_number(s: &str) -> Option<Number> {
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::Int(i));
    }
    // Rust also accepts `inf` and `NaN`, which are not numeric strings here.
    if !trimmed.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<f64>().ok().map(Number::Float)
}

fn to_number(value: &Value, operator: BinaryOp) -> Result<Number, EvalError> {
    let number = match value {
        Value::Null => Some(Number::Int(0)),
        Value::Bool(b) => Some(Number::Int(i64::from(*b))),
        Value::Int(i) => Some(Number::Int(*i)),
        Value::Float(f) => Some(Number::Float(*f)),
        Value::String(s) => parse_number(s),
        _ => None,
    };
    match number {
        Some(number) => Ok(number),
        None => InvalidOperand {
            operator: operator.symbol(),
            type_name: value.type_name(),
        }
        .fail(),
    }
}

/// Returns the string form of `value` used by `+` concatenation.
///
/// # Errors
///
/// Functions, and objects that do not provide a string form, cannot be concatenated.
pub fn to_eel_string(value: &Value) -> Result<String, EvalError> {
    let string = match value {
        Value::Null | Value::Bool(false) => Some(String::new()),
        Value::Bool(true) => Some("1".to_string()),
        Value::Int(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::List(_) | Value::Map(_) => Some("Array".to_string()),
        Value::Object(object) => object.to_eel_string(),
        Value::Function(_) => None,
    };
    match string {
        Some(string) => Ok(string),
        None => InvalidOperand {
            operator: BinaryOp::Add.symbol(),
            type_name: value.type_name(),
        }
        .fail(),
    }
}

/// Converts a value into a collection key.
///
/// # Errors
///
/// Lists, maps, objects and functions cannot be used as keys.
pub fn collection_key(value: &Value) -> Result<String, EvalError> {
    match value {
        Value::Null | Value::Bool(false) => Ok(String::new()),
        Value::Bool(true) => Ok("1".to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok((f.trunc() as i64).to_string()),
        Value::String(s) => Ok(s.clone()),
        other => InvalidKey {
            type_name: other.type_name(),
        }
        .fail(),
    }
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
        (Value::Int(l), Value::Float(r)) => (*l as f64).partial_cmp(r),
        (Value::Float(l), Value::Int(r)) => l.partial_cmp(&(*r as f64)),
        (Value::Float(l), Value::Float(r)) => l.partial_cmp(r),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

/// Evaluates a comparison. Incomparable operands make every ordering operator `false`.
pub fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    match op {
        BinaryOp::Eq => left == right,
        BinaryOp::NotEq => left != right,
        _ => match ordering(left, right) {
            None => false,
            Some(ordering) => match op {
                BinaryOp::Less => ordering.is_lt(),
                BinaryOp::LessEq => ordering.is_le(),
                BinaryOp::Greater => ordering.is_gt(),
                BinaryOp::GreaterEq => ordering.is_ge(),
                _ => false,
            },
        },
    }
}

#[inline]
fn int_op(op: BinaryOp, l: i64, r: i64) -> Number {
    let exact = match op {
        BinaryOp::Add => l.checked_add(r),
        BinaryOp::Sub => l.checked_sub(r),
        BinaryOp::Mul => l.checked_mul(r),
        BinaryOp::Div if l.checked_rem(r) == Some(0) => l.checked_div(r),
        _ => None,
    };
    // Overflowing or inexact integer results fall back to float arithmetic.
    exact.map_or_else(|| float_op(op, l as f64, r as f64), Number::Int)
}

#[inline]
fn float_op(op: BinaryOp, l: f64, r: f64) -> Number {
    Number::Float(match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        _ => l / r,
    })
}

/// Evaluates an arithmetic operator.
///
/// # Errors
///
/// If an operand cannot be coerced to a number, [`EvalError::InvalidOperand`] is returned. If the divisor of `/` or
/// `%` is zero, [`EvalError::DivisionByZero`] is returned.
pub fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    if op == BinaryOp::Add && (matches!(left, Value::String(_)) || matches!(right, Value::String(_))) {
        let mut out = to_eel_string(left)?;
        out.push_str(&to_eel_string(right)?);
        return Ok(Value::String(out));
    }

    let l = to_number(left, op)?;
    let r = to_number(right, op)?;

    if matches!(op, BinaryOp::Div | BinaryOp::Mod) && r.is_zero() {
        return DivisionByZero { operator: op.symbol() }.fail();
    }

    let result = match (op, l, r) {
        (BinaryOp::Mod, l, r) => match r.truncate() {
            // Truncating a fractional divisor such as 0.5 can still produce zero.
            0 => return DivisionByZero { operator: op.symbol() }.fail(),
            r => Number::Int(l.truncate().checked_rem(r).unwrap_or(0)),
        },
        (op, Number::Int(l), Number::Int(r)) => int_op(op, l, r),
        (op, l, r) => float_op(op, l.as_f64(), r.as_f64()),
    };
    Ok(result.into_value())
}

/// Evaluates any binary operator against two unwrapped operands.
///
/// # Errors
///
/// See [`arithmetic`].
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    if op.is_comparison() {
        Ok(Value::Bool(compare(op, left, right)))
    } else {
        arithmetic(op, left, right)
    }
}
