//! Exact numeric comparison and arithmetic using `rust_decimal`.
//!
//! JSON numbers are promoted to `Decimal` so `0.1 + 0.2` compares equal to
//! `0.3`. Values that do not fit a `Decimal` (very large exponents) fall
//! back to `f64` comparison.

use std::cmp::Ordering;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value};

use crate::error::EvalError;

/// Promote a JSON number to a `Decimal`.
pub fn to_decimal(n: &Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        return Some(Decimal::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(Decimal::from(u));
    }
    n.as_f64().and_then(|f| Decimal::try_from(f).ok())
}

/// Total order between two JSON numbers.
pub fn compare_numbers(l: &Number, r: &Number) -> Option<Ordering> {
    match (to_decimal(l), to_decimal(r)) {
        (Some(l), Some(r)) => Some(l.cmp(&r)),
        _ => l.as_f64()?.partial_cmp(&r.as_f64()?),
    }
}

/// Ordering for two JSON values when both are numbers.
pub fn compare_json(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::Number(l), Value::Number(r)) => compare_numbers(l, r),
        _ => None,
    }
}

/// Convert a `Decimal` back into a JSON number, preferring an integer
/// representation when the value has no fractional part.
pub fn decimal_to_json(d: Decimal) -> Value {
    let normalized = d.normalize();
    if normalized.scale() == 0 {
        if let Some(i) = normalized.to_i64() {
            return Value::from(i);
        }
    }
    normalized
        .to_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Exact addition of two JSON numbers.
pub fn add(name: &str, l: &Value, r: &Value) -> Result<Value, EvalError> {
    let (l, r) = match (l, r) {
        (Value::Number(l), Value::Number(r)) => (l, r),
        _ => {
            return Err(EvalError::intrinsic(
                name,
                format!("expected two numbers, got {} and {}", type_of(l), type_of(r)),
            ))
        }
    };
    let l = to_decimal(l).ok_or_else(|| EvalError::intrinsic(name, "number out of range"))?;
    let r = to_decimal(r).ok_or_else(|| EvalError::intrinsic(name, "number out of range"))?;
    let sum = l
        .checked_add(r)
        .ok_or_else(|| EvalError::intrinsic(name, "addition overflow"))?;
    Ok(decimal_to_json(sum))
}

/// Read a JSON number as an `i64`, accepting integral floats like `2.0`.
pub fn as_integer(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            let d = to_decimal(n)?;
            if d.fract().is_zero() {
                d.to_i64()
            } else {
                None
            }
        }),
        _ => None,
    }
}

/// The JSON type name used in error messages.
pub fn type_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
