//! Partial matching of conditional mock `when` patterns.
//!
//! A pattern matches when every key it names matches the same key in the
//! input; extra input keys are ignored. A leaf may be an operator object
//! such as `{ "$gt": 10 }`.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::numeric;

/// Match a `when` clause against the effective input. A single-key
/// `{ "input": ... }` wrapper is unwrapped first.
pub fn when_matches(when: &Value, input: &Value) -> bool {
    if let Some(inner) = input_wrapper(when) {
        if pattern_matches(inner, Some(input)) {
            return true;
        }
    }
    pattern_matches(when, Some(input))
}

fn input_wrapper(when: &Value) -> Option<&Value> {
    match when {
        Value::Object(map) if map.len() == 1 => map.get("input"),
        _ => None,
    }
}

fn pattern_matches(pattern: &Value, actual: Option<&Value>) -> bool {
    match pattern {
        Value::Object(map) if is_operator_object(map) => {
            map.iter().all(|(op, arg)| operator_matches(op, arg, actual))
        }
        Value::Object(map) => match actual {
            Some(Value::Object(fields)) => map
                .iter()
                .all(|(key, sub)| pattern_matches(sub, fields.get(key))),
            _ => false,
        },
        Value::Array(items) => match actual {
            Some(Value::Array(values)) => {
                items.len() == values.len()
                    && items
                        .iter()
                        .zip(values)
                        .all(|(p, v)| pattern_matches(p, Some(v)))
            }
            _ => false,
        },
        scalar => actual.is_some_and(|v| scalar_equals(scalar, v)),
    }
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}

fn operator_matches(op: &str, arg: &Value, actual: Option<&Value>) -> bool {
    if op == "$exists" {
        return arg.as_bool().unwrap_or(true) == actual.is_some();
    }
    let Some(actual) = actual else {
        // Only `$ne` holds for a missing field.
        return op == "$ne";
    };
    match op {
        "$eq" => scalar_equals(arg, actual),
        "$ne" => !scalar_equals(arg, actual),
        "$gt" => order(actual, arg).is_some_and(Ordering::is_gt),
        "$gte" => order(actual, arg).is_some_and(Ordering::is_ge),
        "$lt" => order(actual, arg).is_some_and(Ordering::is_lt),
        "$lte" => order(actual, arg).is_some_and(Ordering::is_le),
        "$in" => arg
            .as_array()
            .is_some_and(|options| options.iter().any(|o| scalar_equals(o, actual))),
        "$contains" => match actual {
            Value::String(s) => arg.as_str().is_some_and(|needle| s.contains(needle)),
            Value::Array(items) => items.iter().any(|item| scalar_equals(arg, item)),
            _ => false,
        },
        _ => false,
    }
}

fn order(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => numeric::compare_json(l, r),
    }
}

fn scalar_equals(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(_), Value::Number(_)) => {
            numeric::compare_json(l, r) == Some(Ordering::Equal)
        }
        _ => l == r,
    }
}
