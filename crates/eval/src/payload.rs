//! Payload templates: `Parameters`, `ItemSelector`, `ResultSelector`.
//!
//! A key ending in `.$` is replaced by a key without the suffix whose value
//! is the result of a path, context path, or intrinsic call. Everything
//! else is copied through, recursing into nested objects and arrays.

use serde_json::{Map, Value};

use crate::context::Entropy;
use crate::error::EvalError;
use crate::intrinsic;
use crate::path::{self, Scope};

pub fn render(
    template: &Value,
    scope: &Scope<'_>,
    entropy: &mut Entropy,
) -> Result<Value, EvalError> {
    match template {
        Value::Object(fields) => {
            let mut out = Map::with_capacity(fields.len());
            for (key, value) in fields {
                match key.strip_suffix(".$") {
                    Some(target) => {
                        let expr = value.as_str().ok_or_else(|| EvalError::TypeError {
                            message: format!(
                                "value of '{}' must be a path or intrinsic string",
                                key
                            ),
                        })?;
                        out.insert(target.to_string(), dynamic(expr, scope, entropy)?);
                    }
                    None => {
                        out.insert(key.clone(), render(value, scope, entropy)?);
                    }
                }
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| render(item, scope, entropy))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn dynamic(expr: &str, scope: &Scope<'_>, entropy: &mut Entropy) -> Result<Value, EvalError> {
    if intrinsic::is_intrinsic(expr) {
        intrinsic::evaluate(expr, scope, entropy)
    } else {
        path::resolve(expr, scope)
    }
}
