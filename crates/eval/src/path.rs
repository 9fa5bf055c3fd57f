//! Path/Value resolver.
//!
//! Evaluates the JSONPath subset used by ASL against two roots: `$` reads
//! the business document, `$$` reads the execution-context object.
//! Supported segments: `.field`, `['field']`, `[n]`, and `[*]`/`.*`
//! wildcards (which collect matches into an array).
//!
//! Reference paths (fields and indices only) are also used as write
//! targets for `ResultPath`, creating missing intermediate objects.

use serde_json::{Map, Value};

use stepcheck_interchange::PathField;

use crate::error::EvalError;

/// The two documents a path may read from.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub input: &'a Value,
    pub context: &'a Value,
}

impl<'a> Scope<'a> {
    pub fn new(input: &'a Value, context: &'a Value) -> Self {
        Scope { input, context }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
    Data,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(usize),
    Wildcard,
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    pub root: Root,
    pub segments: Vec<Segment>,
    text: String,
}

impl JsonPath {
    pub fn parse(text: &str) -> Result<JsonPath, EvalError> {
        let (root, rest) = if let Some(rest) = text.strip_prefix("$$") {
            (Root::Context, rest)
        } else if let Some(rest) = text.strip_prefix('$') {
            (Root::Data, rest)
        } else {
            return Err(invalid(text, "must start with '$' or '$$'"));
        };

        let chars: Vec<char> = rest.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '.' => {
                    i += 1;
                    let start = i;
                    while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                        i += 1;
                    }
                    let name: String = chars[start..i].iter().collect();
                    if name.is_empty() {
                        return Err(invalid(text, "empty field name"));
                    }
                    if name == "*" {
                        segments.push(Segment::Wildcard);
                    } else {
                        segments.push(Segment::Field(name));
                    }
                }
                '[' => {
                    let close = chars[i..]
                        .iter()
                        .position(|&c| c == ']')
                        .map(|p| p + i)
                        .ok_or_else(|| invalid(text, "unterminated '['"))?;
                    let inner: String = chars[i + 1..close].iter().collect();
                    let inner = inner.trim();
                    if inner == "*" {
                        segments.push(Segment::Wildcard);
                    } else if let Some(quoted) = strip_quotes(inner) {
                        segments.push(Segment::Field(quoted.to_string()));
                    } else {
                        let index = inner
                            .parse::<usize>()
                            .map_err(|_| invalid(text, &format!("bad index '{}'", inner)))?;
                        segments.push(Segment::Index(index));
                    }
                    i = close + 1;
                }
                other => {
                    return Err(invalid(text, &format!("unexpected character '{}'", other)));
                }
            }
        }

        Ok(JsonPath {
            root,
            segments,
            text: text.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|s| *s == Segment::Wildcard)
    }

    /// Look the path up, returning `None` when any segment is missing.
    pub fn lookup(&self, scope: &Scope<'_>) -> Option<Value> {
        let root = match self.root {
            Root::Data => scope.input,
            Root::Context => scope.context,
        };
        if self.has_wildcard() {
            let mut out = Vec::new();
            collect(root, &self.segments, &mut out);
            return Some(Value::Array(out));
        }
        let mut current = root;
        for seg in &self.segments {
            current = step(current, seg)?;
        }
        Some(current.clone())
    }
}

fn step<'v>(value: &'v Value, seg: &Segment) -> Option<&'v Value> {
    match (seg, value) {
        (Segment::Field(name), Value::Object(map)) => map.get(name),
        (Segment::Index(i), Value::Array(items)) => items.get(*i),
        _ => None,
    }
}

fn collect(value: &Value, segments: &[Segment], out: &mut Vec<Value>) {
    let Some((first, rest)) = segments.split_first() else {
        out.push(value.clone());
        return;
    };
    match first {
        Segment::Wildcard => match value {
            Value::Array(items) => items.iter().for_each(|v| collect(v, rest, out)),
            Value::Object(map) => map.values().for_each(|v| collect(v, rest, out)),
            _ => {}
        },
        seg => {
            if let Some(next) = step(value, seg) {
                collect(next, rest, out);
            }
        }
    }
}

fn strip_quotes(s: &str) -> Option<&str> {
    s.strip_prefix('\'')
        .and_then(|r| r.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|r| r.strip_suffix('"')))
}

fn invalid(path: &str, message: &str) -> EvalError {
    EvalError::InvalidPath {
        path: path.to_string(),
        message: message.to_string(),
    }
}

// ── Public resolver API ─────────────────────────────────────────────

/// Resolve a required path. A missing path fails with `PathNotFound`.
pub fn resolve(path: &str, scope: &Scope<'_>) -> Result<Value, EvalError> {
    JsonPath::parse(path)?
        .lookup(scope)
        .ok_or_else(|| EvalError::PathNotFound {
            path: path.to_string(),
        })
}

/// Presence check. Never fails: a malformed or missing path is absent.
pub fn is_present(path: &str, scope: &Scope<'_>) -> bool {
    JsonPath::parse(path)
        .ok()
        .and_then(|p| p.lookup(scope))
        .is_some()
}

/// Apply an `InputPath`/`OutputPath`: `null` yields `{}`.
pub fn select(field: &PathField, scope: &Scope<'_>) -> Result<Value, EvalError> {
    match field {
        PathField::Discard => Ok(Value::Object(Map::new())),
        PathField::Path(p) => resolve(p, scope),
    }
}

/// Apply a `ResultPath`: `null` keeps the raw input, `$` replaces it,
/// anything else writes `result` into a copy of the raw input.
pub fn merge_result(
    field: &PathField,
    raw_input: &Value,
    result: Value,
) -> Result<Value, EvalError> {
    match field {
        PathField::Discard => Ok(raw_input.clone()),
        PathField::Path(p) => set(raw_input, p, result),
    }
}

/// Write `value` at reference path `path` inside a copy of `target`.
pub fn set(target: &Value, path: &str, value: Value) -> Result<Value, EvalError> {
    let parsed = JsonPath::parse(path)?;
    if parsed.root != Root::Data {
        return Err(invalid(path, "a write target cannot use the context root '$$'"));
    }
    if parsed.has_wildcard() {
        return Err(invalid(path, "a write target cannot contain wildcards"));
    }
    if parsed.segments.is_empty() {
        return Ok(value);
    }

    let mut doc = target.clone();
    if !doc.is_object() && matches!(parsed.segments[0], Segment::Field(_)) {
        // ASL replaces a non-object input with a fresh object when writing a field.
        doc = Value::Object(Map::new());
    }
    write_at(&mut doc, &parsed.segments, value, path)?;
    Ok(doc)
}

fn write_at(
    doc: &mut Value,
    segments: &[Segment],
    value: Value,
    path: &str,
) -> Result<(), EvalError> {
    let Some((first, rest)) = segments.split_first() else {
        *doc = value;
        return Ok(());
    };
    match first {
        Segment::Field(name) => {
            let map = doc.as_object_mut().ok_or_else(|| EvalError::TypeError {
                message: format!(
                    "cannot write '{}' in '{}': parent is not an object",
                    name, path
                ),
            })?;
            let slot = map
                .entry(name.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !rest.is_empty() && !slot.is_object() && !slot.is_array() {
                *slot = Value::Object(Map::new());
            }
            write_at(slot, rest, value, path)
        }
        Segment::Index(i) => {
            let items = doc.as_array_mut().ok_or_else(|| EvalError::TypeError {
                message: format!("cannot index [{}] in '{}': parent is not an array", i, path),
            })?;
            let slot = items.get_mut(*i).ok_or_else(|| EvalError::PathNotFound {
                path: path.to_string(),
            })?;
            write_at(slot, rest, value, path)
        }
        Segment::Wildcard => Err(invalid(path, "a write target cannot contain wildcards")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "order": { "id": "o-1", "items": [ { "sku": "a", "qty": 2 }, { "sku": "b", "qty": 5 } ] },
            "weird key": true,
            "n": null
        })
    }

    #[test]
    fn resolves_fields_indices_and_quoted_keys() {
        let input = doc();
        let ctx = json!({ "Execution": { "Name": "run-1" } });
        let scope = Scope::new(&input, &ctx);

        assert_eq!(resolve("$", &scope).unwrap(), input);
        assert_eq!(resolve("$.order.id", &scope).unwrap(), json!("o-1"));
        assert_eq!(resolve("$.order.items[1].sku", &scope).unwrap(), json!("b"));
        assert_eq!(resolve("$['weird key']", &scope).unwrap(), json!(true));
        assert_eq!(resolve("$$.Execution.Name", &scope).unwrap(), json!("run-1"));
        assert_eq!(resolve("$.n", &scope).unwrap(), Value::Null);
    }

    #[test]
    fn wildcard_collects_into_array() {
        let input = doc();
        let ctx = Value::Null;
        let scope = Scope::new(&input, &ctx);
        assert_eq!(
            resolve("$.order.items[*].qty", &scope).unwrap(),
            json!([2, 5])
        );
    }

    #[test]
    fn missing_path_fails_but_presence_check_does_not() {
        let input = doc();
        let ctx = Value::Null;
        let scope = Scope::new(&input, &ctx);

        assert_eq!(
            resolve("$.order.missing", &scope).unwrap_err(),
            EvalError::PathNotFound {
                path: "$.order.missing".to_string()
            }
        );
        assert!(!is_present("$.order.missing", &scope));
        assert!(!is_present("not a path", &scope));
        assert!(is_present("$.n", &scope));
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(matches!(
            JsonPath::parse("order.id"),
            Err(EvalError::InvalidPath { .. })
        ));
        assert!(matches!(
            JsonPath::parse("$.a[x]"),
            Err(EvalError::InvalidPath { .. })
        ));
        assert!(matches!(
            JsonPath::parse("$.a["),
            Err(EvalError::InvalidPath { .. })
        ));
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let input = json!({ "a": 1 });
        let out = set(&input, "$.result.inner", json!("x")).unwrap();
        assert_eq!(out, json!({ "a": 1, "result": { "inner": "x" } }));

        let replaced = set(&input, "$", json!([1])).unwrap();
        assert_eq!(replaced, json!([1]));
    }

    #[test]
    fn set_into_array_index() {
        let input = json!({ "list": [0, 0] });
        assert_eq!(
            set(&input, "$.list[1]", json!(9)).unwrap(),
            json!({ "list": [0, 9] })
        );
        assert!(set(&input, "$.list[4]", json!(9)).is_err());
    }

    #[test]
    fn merge_result_honours_discard() {
        let raw = json!({ "keep": true });
        assert_eq!(
            merge_result(&PathField::Discard, &raw, json!("ignored")).unwrap(),
            raw
        );
        assert_eq!(
            merge_result(&PathField::default(), &raw, json!("r")).unwrap(),
            json!("r")
        );
        let ctx = Value::Null;
        assert_eq!(
            select(&PathField::Discard, &Scope::new(&raw, &ctx)).unwrap(),
            json!({})
        );
    }
}
