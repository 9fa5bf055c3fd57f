//! Choice rule evaluation.
//!
//! Conditions form a recursive tree of `And`/`Or`/`Not` over data tests.
//! A data test whose operands have the wrong JSON type evaluates to
//! `false`; a `Variable` that does not resolve is a runtime error, except
//! under `IsPresent` and `IsNull`, where a missing path is simply absent
//! and therefore not null.

use std::cmp::Ordering;

use serde_json::Value;
use stepcheck_interchange::{Comparison, Condition, Operand};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::EvalError;
use crate::numeric;
use crate::path::{self, Scope};

/// Evaluate a condition tree against the state's effective input.
pub fn eval_condition(cond: &Condition, scope: &Scope<'_>) -> Result<bool, EvalError> {
    match cond {
        Condition::And(items) => {
            for item in items {
                if !eval_condition(item, scope)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Or(items) => {
            for item in items {
                if eval_condition(item, scope)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::Not(inner) => Ok(!eval_condition(inner, scope)?),
        Condition::Test {
            variable,
            comparison,
            operand,
        } => eval_test(variable, *comparison, operand, scope),
    }
}

fn eval_test(
    variable: &str,
    comparison: Comparison,
    operand: &Operand,
    scope: &Scope<'_>,
) -> Result<bool, EvalError> {
    if comparison.is_type_test() {
        let expected = matches!(operand, Operand::Literal(Value::Bool(true)));
        match comparison {
            Comparison::IsPresent => return Ok(path::is_present(variable, scope) == expected),
            Comparison::IsNull if !path::is_present(variable, scope) => return Ok(!expected),
            _ => {}
        }
        let value = path::resolve(variable, scope)?;
        let actual = match comparison {
            Comparison::IsNull => value.is_null(),
            Comparison::IsNumeric => value.is_number(),
            Comparison::IsString => value.is_string(),
            Comparison::IsBoolean => value.is_boolean(),
            Comparison::IsTimestamp => parse_timestamp(&value).is_some(),
            _ => false,
        };
        return Ok(actual == expected);
    }

    let left = path::resolve(variable, scope)?;
    let right = match operand {
        Operand::Literal(v) => v.clone(),
        Operand::Path(p) => path::resolve(p, scope)?,
    };

    let result = match comparison {
        Comparison::StringEquals => order_strings(&left, &right).map(Ordering::is_eq),
        Comparison::StringLessThan => order_strings(&left, &right).map(Ordering::is_lt),
        Comparison::StringGreaterThan => order_strings(&left, &right).map(Ordering::is_gt),
        Comparison::StringLessThanEquals => order_strings(&left, &right).map(Ordering::is_le),
        Comparison::StringGreaterThanEquals => order_strings(&left, &right).map(Ordering::is_ge),
        Comparison::StringMatches => match (left.as_str(), right.as_str()) {
            (Some(text), Some(pattern)) => Some(glob_matches(pattern, text)),
            _ => None,
        },
        Comparison::NumericEquals => numeric::compare_json(&left, &right).map(Ordering::is_eq),
        Comparison::NumericLessThan => numeric::compare_json(&left, &right).map(Ordering::is_lt),
        Comparison::NumericGreaterThan => {
            numeric::compare_json(&left, &right).map(Ordering::is_gt)
        }
        Comparison::NumericLessThanEquals => {
            numeric::compare_json(&left, &right).map(Ordering::is_le)
        }
        Comparison::NumericGreaterThanEquals => {
            numeric::compare_json(&left, &right).map(Ordering::is_ge)
        }
        Comparison::BooleanEquals => match (left.as_bool(), right.as_bool()) {
            (Some(l), Some(r)) => Some(l == r),
            _ => None,
        },
        Comparison::TimestampEquals => order_timestamps(&left, &right).map(Ordering::is_eq),
        Comparison::TimestampLessThan => order_timestamps(&left, &right).map(Ordering::is_lt),
        Comparison::TimestampGreaterThan => {
            order_timestamps(&left, &right).map(Ordering::is_gt)
        }
        Comparison::TimestampLessThanEquals => {
            order_timestamps(&left, &right).map(Ordering::is_le)
        }
        Comparison::TimestampGreaterThanEquals => {
            order_timestamps(&left, &right).map(Ordering::is_ge)
        }
        Comparison::IsNull
        | Comparison::IsPresent
        | Comparison::IsNumeric
        | Comparison::IsString
        | Comparison::IsBoolean
        | Comparison::IsTimestamp => None,
    };
    Ok(result.unwrap_or(false))
}

fn order_strings(l: &Value, r: &Value) -> Option<Ordering> {
    Some(l.as_str()?.cmp(r.as_str()?))
}

fn order_timestamps(l: &Value, r: &Value) -> Option<Ordering> {
    Some(parse_timestamp(l)?.cmp(&parse_timestamp(r)?))
}

pub(crate) fn parse_timestamp(v: &Value) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(v.as_str()?, &Rfc3339).ok()
}

/// `StringMatches` glob: `*` matches any run of characters, `\*` and `\\`
/// are literal.
pub fn glob_matches(pattern: &str, text: &str) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Tok {
        Star,
        Char(char),
    }
    let mut toks = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => toks.push(Tok::Char(escaped)),
                None => toks.push(Tok::Char('\\')),
            },
            '*' => toks.push(Tok::Star),
            c => toks.push(Tok::Char(c)),
        }
    }
    let text: Vec<char> = text.chars().collect();

    // Greedy match with single-star backtracking.
    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match toks.get(p) {
            Some(Tok::Char(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            Some(Tok::Star) => {
                star = Some((p, t));
                p += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }
    toks[p..].iter().all(|tok| *tok == Tok::Star)
}
