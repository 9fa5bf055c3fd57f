//! Intrinsic functions (`States.Format(...)` and friends).
//!
//! An expression is parsed into a call tree, then evaluated with arguments
//! resolved left to right. Every function has a fixed arity except
//! `States.Format` and `States.Array`.

use base64::Engine as _;
use serde_json::Value;
use sha2::Digest;

use crate::context::Entropy;
use crate::error::EvalError;
use crate::numeric;
use crate::path::{self, Scope};

/// True when `text` looks like an intrinsic call rather than a path.
pub fn is_intrinsic(text: &str) -> bool {
    text.trim_start().starts_with("States.")
}

/// Parse and evaluate an intrinsic expression.
pub fn evaluate(
    expr: &str,
    scope: &Scope<'_>,
    entropy: &mut Entropy,
) -> Result<Value, EvalError> {
    let call = Parser::new(expr).parse_expression()?;
    eval_call(&call, scope, entropy)
}

// ── Parser ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    /// A single-quoted string. Brace escapes are kept so `States.Format`
    /// can tell `\{` from a placeholder.
    Str(String),
    Literal(Value),
    Path(String),
    Call(Call),
}

#[derive(Debug, Clone, PartialEq)]
struct Call {
    name: String,
    args: Vec<Arg>,
}

struct Parser<'a> {
    text: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Parser {
            text,
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn parse_expression(mut self) -> Result<Call, EvalError> {
        self.skip_ws();
        let call = self.parse_call()?;
        self.skip_ws();
        if self.pos != self.chars.len() {
            return Err(self.error("trailing characters after call"));
        }
        Ok(call)
    }

    fn parse_call(&mut self) -> Result<Call, EvalError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '.' || c == '_') {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        if !name.starts_with("States.") {
            return Err(self.error("expected a call starting with 'States.'"));
        }
        self.skip_ws();
        self.expect('(')?;
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(Call { name, args });
        }
        loop {
            self.skip_ws();
            args.push(self.parse_arg()?);
            self.skip_ws();
            match self.next() {
                Some(',') => continue,
                Some(')') => break,
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
        Ok(Call { name, args })
    }

    fn parse_arg(&mut self) -> Result<Arg, EvalError> {
        match self.peek() {
            Some('\'') => self.parse_string().map(Arg::Str),
            Some('$') => Ok(Arg::Path(self.take_token())),
            Some(c) if c.is_ascii_alphabetic() => {
                let save = self.pos;
                let word = self.take_token();
                match word.as_str() {
                    "true" => Ok(Arg::Literal(Value::Bool(true))),
                    "false" => Ok(Arg::Literal(Value::Bool(false))),
                    "null" => Ok(Arg::Literal(Value::Null)),
                    _ => {
                        self.pos = save;
                        self.parse_call().map(Arg::Call)
                    }
                }
            }
            Some(c) if c == '-' || c.is_ascii_digit() => {
                let token = self.take_token();
                serde_json::from_str::<Value>(&token)
                    .ok()
                    .filter(Value::is_number)
                    .map(Arg::Literal)
                    .ok_or_else(|| self.error(&format!("bad number '{}'", token)))
            }
            _ => Err(self.error("expected an argument")),
        }
    }

    /// Read up to the next top-level `,` or `)`, respecting brackets and quotes.
    fn take_token(&mut self) -> String {
        let start = self.pos;
        let mut depth = 0usize;
        let mut quote = None;
        while let Some(c) = self.peek() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '\'') | (None, '"') => quote = Some(c),
                (None, '[') | (None, '(') => depth += 1,
                (None, ']') => depth = depth.saturating_sub(1),
                (None, ')') if depth == 0 => break,
                (None, ')') => depth -= 1,
                (None, ',') if depth == 0 => break,
                _ => {}
            }
            self.pos += 1;
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .trim()
            .to_string()
    }

    fn parse_string(&mut self) -> Result<String, EvalError> {
        self.expect('\'')?;
        let mut out = String::new();
        loop {
            match self.next() {
                None => return Err(self.error("unterminated string literal")),
                Some('\'') => return Ok(out),
                Some('\\') => match self.next() {
                    Some('\'') => out.push('\''),
                    Some('\\') => out.push('\\'),
                    // Brace escapes survive for States.Format.
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                    None => return Err(self.error("unterminated escape")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, want: char) -> Result<(), EvalError> {
        if self.next() == Some(want) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", want)))
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> EvalError {
        EvalError::intrinsic(
            self.text,
            format!("{} at position {}", message, self.pos),
        )
    }
}

fn unescape_braces(s: &str) -> String {
    s.replace("\\{", "{").replace("\\}", "}")
}

// ── Evaluation ──────────────────────────────────────────────────────

fn eval_arg(arg: &Arg, scope: &Scope<'_>, entropy: &mut Entropy) -> Result<Value, EvalError> {
    match arg {
        Arg::Str(s) => Ok(Value::String(unescape_braces(s))),
        Arg::Literal(v) => Ok(v.clone()),
        Arg::Path(p) => path::resolve(p, scope),
        Arg::Call(call) => eval_call(call, scope, entropy),
    }
}

fn eval_call(call: &Call, scope: &Scope<'_>, entropy: &mut Entropy) -> Result<Value, EvalError> {
    let name = call.name.as_str();

    // Format needs the raw template to distinguish escaped braces.
    if name == "States.Format" {
        let (template, rest) = call
            .args
            .split_first()
            .ok_or_else(|| EvalError::intrinsic(name, "requires a template argument"))?;
        let template = match template {
            Arg::Str(s) => s.clone(),
            other => match eval_arg(other, scope, entropy)? {
                Value::String(s) => s,
                v => {
                    return Err(EvalError::intrinsic(
                        name,
                        format!("template must be a string, got {}", numeric::type_of(&v)),
                    ))
                }
            },
        };
        let mut values = Vec::with_capacity(rest.len());
        for arg in rest {
            values.push(eval_arg(arg, scope, entropy)?);
        }
        return format(&template, &values);
    }

    let mut args = Vec::with_capacity(call.args.len());
    for arg in &call.args {
        args.push(eval_arg(arg, scope, entropy)?);
    }

    match name {
        "States.Array" => Ok(Value::Array(args)),
        "States.StringToJson" => {
            let [s] = arity::<1>(name, args)?;
            let s = expect_str(name, &s)?;
            serde_json::from_str(s).map_err(|e| EvalError::intrinsic(name, e.to_string()))
        }
        "States.JsonToString" => {
            let [v] = arity::<1>(name, args)?;
            serde_json::to_string(&v)
                .map(Value::String)
                .map_err(|e| EvalError::intrinsic(name, e.to_string()))
        }
        "States.ArrayPartition" => {
            let [arr, size] = arity::<2>(name, args)?;
            let items = expect_array(name, &arr)?;
            let size = expect_integer(name, &size)?;
            if size <= 0 {
                return Err(EvalError::intrinsic(name, "chunk size must be positive"));
            }
            Ok(Value::Array(
                items
                    .chunks(size as usize)
                    .map(|c| Value::Array(c.to_vec()))
                    .collect(),
            ))
        }
        "States.ArrayContains" => {
            let [arr, needle] = arity::<2>(name, args)?;
            Ok(Value::Bool(expect_array(name, &arr)?.contains(&needle)))
        }
        "States.ArrayRange" => {
            let [start, end, step] = arity::<3>(name, args)?;
            let (start, end, step) = (
                expect_integer(name, &start)?,
                expect_integer(name, &end)?,
                expect_integer(name, &step)?,
            );
            if step == 0 {
                return Err(EvalError::intrinsic(name, "step must not be zero"));
            }
            let mut out = Vec::new();
            let mut i = start;
            while (step > 0 && i <= end) || (step < 0 && i >= end) {
                out.push(Value::from(i));
                if out.len() > 1000 {
                    return Err(EvalError::intrinsic(name, "range exceeds 1000 items"));
                }
                match i.checked_add(step) {
                    Some(next) => i = next,
                    None => break,
                }
            }
            Ok(Value::Array(out))
        }
        "States.ArrayGetItem" => {
            let [arr, index] = arity::<2>(name, args)?;
            let items = expect_array(name, &arr)?;
            let index = expect_integer(name, &index)?;
            usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| EvalError::intrinsic(name, format!("index {} out of bounds", index)))
        }
        "States.ArrayLength" => {
            let [arr] = arity::<1>(name, args)?;
            Ok(Value::from(expect_array(name, &arr)?.len()))
        }
        "States.ArrayUnique" => {
            let [arr] = arity::<1>(name, args)?;
            let mut out: Vec<Value> = Vec::new();
            for item in expect_array(name, &arr)? {
                if !out.contains(item) {
                    out.push(item.clone());
                }
            }
            Ok(Value::Array(out))
        }
        "States.Base64Encode" => {
            let [s] = arity::<1>(name, args)?;
            let s = expect_str(name, &s)?;
            Ok(Value::String(
                base64::engine::general_purpose::STANDARD.encode(s.as_bytes()),
            ))
        }
        "States.Base64Decode" => {
            let [s] = arity::<1>(name, args)?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(expect_str(name, &s)?)
                .map_err(|e| EvalError::intrinsic(name, e.to_string()))?;
            String::from_utf8(bytes)
                .map(Value::String)
                .map_err(|e| EvalError::intrinsic(name, e.to_string()))
        }
        "States.Hash" => {
            let [data, algorithm] = arity::<2>(name, args)?;
            let data = match &data {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            hash(name, data.as_bytes(), expect_str(name, &algorithm)?)
        }
        "States.JsonMerge" => {
            let [left, right, deep] = arity::<3>(name, args)?;
            if deep != Value::Bool(false) {
                return Err(EvalError::intrinsic(name, "only shallow merge is supported"));
            }
            match (left, right) {
                (Value::Object(mut l), Value::Object(r)) => {
                    l.extend(r);
                    Ok(Value::Object(l))
                }
                _ => Err(EvalError::intrinsic(name, "both arguments must be objects")),
            }
        }
        "States.MathRandom" => {
            let (start, end) = match args.as_slice() {
                [start, end] | [start, end, _] => {
                    (expect_integer(name, start)?, expect_integer(name, end)?)
                }
                _ => {
                    return Err(EvalError::intrinsic(
                        name,
                        format!("expected 2 or 3 arguments, got {}", args.len()),
                    ))
                }
            };
            Ok(Value::from(entropy.integer_between(start, end)))
        }
        "States.MathAdd" => {
            let [l, r] = arity::<2>(name, args)?;
            numeric::add(name, &l, &r)
        }
        "States.StringSplit" => {
            let [s, delimiters] = arity::<2>(name, args)?;
            let s = expect_str(name, &s)?;
            let delimiters: Vec<char> = expect_str(name, &delimiters)?.chars().collect();
            Ok(Value::Array(
                s.split(delimiters.as_slice())
                    .filter(|part| !part.is_empty())
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            ))
        }
        "States.UUID" => {
            arity::<0>(name, args)?;
            Ok(Value::String(entropy.uuid().to_string()))
        }
        _ => Err(EvalError::UnsupportedIntrinsic {
            name: name.to_string(),
        }),
    }
}

fn format(template: &str, values: &[Value]) -> Result<Value, EvalError> {
    const NAME: &str = "States.Format";
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    let mut next_value = values.iter();
    while let Some(c) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some('{') | Some('}')) => {
                if let Some(brace) = chars.next() {
                    out.push(brace);
                }
            }
            '{' if chars.peek() == Some(&'}') => {
                chars.next();
                let value = next_value.next().ok_or_else(|| {
                    EvalError::intrinsic(NAME, "more placeholders than arguments")
                })?;
                match value {
                    Value::String(s) => out.push_str(s),
                    Value::Number(_) | Value::Bool(_) | Value::Null => {
                        out.push_str(&value.to_string())
                    }
                    other => {
                        return Err(EvalError::intrinsic(
                            NAME,
                            format!("cannot format a {}", numeric::type_of(other)),
                        ))
                    }
                }
            }
            c => out.push(c),
        }
    }
    if next_value.next().is_some() {
        return Err(EvalError::intrinsic(NAME, "more arguments than placeholders"));
    }
    Ok(Value::String(out))
}

fn hash(name: &str, data: &[u8], algorithm: &str) -> Result<Value, EvalError> {
    let digest = match algorithm {
        "SHA-256" => sha2::Sha256::digest(data).to_vec(),
        "SHA-384" => sha2::Sha384::digest(data).to_vec(),
        "SHA-512" => sha2::Sha512::digest(data).to_vec(),
        other => {
            return Err(EvalError::intrinsic(
                name,
                format!("unsupported algorithm '{}'", other),
            ))
        }
    };
    Ok(Value::String(
        digest.iter().map(|b| format!("{:02x}", b)).collect(),
    ))
}

fn arity<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], EvalError> {
    let got = args.len();
    args.try_into().map_err(|_| {
        EvalError::intrinsic(name, format!("expected {} arguments, got {}", N, got))
    })
}

fn expect_str<'v>(name: &str, v: &'v Value) -> Result<&'v str, EvalError> {
    v.as_str().ok_or_else(|| {
        EvalError::intrinsic(name, format!("expected a string, got {}", numeric::type_of(v)))
    })
}

fn expect_array<'v>(name: &str, v: &'v Value) -> Result<&'v Vec<Value>, EvalError> {
    v.as_array().ok_or_else(|| {
        EvalError::intrinsic(name, format!("expected an array, got {}", numeric::type_of(v)))
    })
}

fn expect_integer(name: &str, v: &Value) -> Result<i64, EvalError> {
    numeric::as_integer(v).ok_or_else(|| {
        EvalError::intrinsic(name, format!("expected an integer, got {}", v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(expr: &str, input: &Value) -> Result<Value, EvalError> {
        let ctx = json!({ "Execution": { "Name": "run" } });
        let mut entropy = Entropy::new(Some(42));
        evaluate(expr, &Scope::new(input, &ctx), &mut entropy)
    }

    #[test]
    fn format_substitutes_in_order() {
        let input = json!({ "name": "Ada", "n": 3 });
        assert_eq!(
            eval("States.Format('Hello {}, you have {} items', $.name, $.n)", &input).unwrap(),
            json!("Hello Ada, you have 3 items")
        );
        assert_eq!(
            eval("States.Format('literal \\{\\} and {}', 'x')", &input).unwrap(),
            json!("literal {} and x")
        );
        assert_eq!(
            eval("States.Format('it\\'s {}', $$.Execution.Name)", &input).unwrap(),
            json!("it's run")
        );
    }

    #[test]
    fn format_rejects_argument_count_mismatch() {
        let input = json!({});
        assert!(eval("States.Format('{} {}', 'a')", &input).is_err());
        assert!(eval("States.Format('{}', 'a', 'b')", &input).is_err());
    }

    #[test]
    fn json_conversions() {
        let input = json!({ "doc": "{\"a\":[1,2]}", "obj": { "k": true } });
        assert_eq!(
            eval("States.StringToJson($.doc)", &input).unwrap(),
            json!({ "a": [1, 2] })
        );
        assert_eq!(
            eval("States.JsonToString($.obj)", &input).unwrap(),
            json!("{\"k\":true}")
        );
    }

    #[test]
    fn array_functions() {
        let input = json!({ "xs": [1, 2, 2, 3, 4] });
        assert_eq!(
            eval("States.Array(1, 'two', $.xs[0], null)", &input).unwrap(),
            json!([1, "two", 1, null])
        );
        assert_eq!(
            eval("States.ArrayPartition($.xs, 2)", &input).unwrap(),
            json!([[1, 2], [2, 3], [4]])
        );
        assert_eq!(eval("States.ArrayContains($.xs, 3)", &input).unwrap(), json!(true));
        assert_eq!(eval("States.ArrayRange(1, 9, 2)", &input).unwrap(), json!([1, 3, 5, 7, 9]));
        assert_eq!(eval("States.ArrayGetItem($.xs, 4)", &input).unwrap(), json!(4));
        assert_eq!(eval("States.ArrayLength($.xs)", &input).unwrap(), json!(5));
        assert_eq!(eval("States.ArrayUnique($.xs)", &input).unwrap(), json!([1, 2, 3, 4]));
    }

    #[test]
    fn array_range_stops_at_the_integer_limit() {
        let input = json!({});
        assert_eq!(
            eval(
                "States.ArrayRange(9223372036854775806, 9223372036854775807, 5)",
                &input
            )
            .unwrap(),
            json!([9223372036854775806_i64])
        );
        assert_eq!(
            eval(
                "States.ArrayRange(-9223372036854775807, -9223372036854775808, -3)",
                &input
            )
            .unwrap(),
            json!([-9223372036854775807_i64])
        );
    }

    #[test]
    fn nested_calls_evaluate_inner_first() {
        let input = json!({ "xs": [5, 6] });
        assert_eq!(
            eval("States.Format('len={}', States.ArrayLength($.xs))", &input).unwrap(),
            json!("len=2")
        );
    }

    #[test]
    fn encoding_and_hashing() {
        let input = json!({ "s": "hello" });
        assert_eq!(eval("States.Base64Encode($.s)", &input).unwrap(), json!("aGVsbG8="));
        assert_eq!(eval("States.Base64Decode('aGVsbG8=')", &input).unwrap(), json!("hello"));
        assert_eq!(
            eval("States.Hash($.s, 'SHA-256')", &input).unwrap(),
            json!("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
        assert!(eval("States.Hash($.s, 'MD5')", &input).is_err());
    }

    #[test]
    fn math_and_strings() {
        let input = json!({ "csv": "a,b,,c" });
        assert_eq!(eval("States.MathAdd(40, 2)", &input).unwrap(), json!(42));
        assert_eq!(
            eval("States.StringSplit($.csv, ',')", &input).unwrap(),
            json!(["a", "b", "c"])
        );
        let r = eval("States.MathRandom(1, 6)", &input).unwrap();
        let r = r.as_i64().unwrap();
        assert!((1..=6).contains(&r));
    }

    #[test]
    fn json_merge_is_shallow() {
        let input = json!({ "a": { "x": 1, "y": { "z": 1 } }, "b": { "y": { "w": 2 } } });
        assert_eq!(
            eval("States.JsonMerge($.a, $.b, false)", &input).unwrap(),
            json!({ "x": 1, "y": { "w": 2 } })
        );
        assert!(eval("States.JsonMerge($.a, $.b, true)", &input).is_err());
    }

    #[test]
    fn uuid_is_seeded() {
        let input = json!({});
        let a = eval("States.UUID()", &input).unwrap();
        let b = eval("States.UUID()", &input).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().map(str::len), Some(36));
    }

    #[test]
    fn unknown_functions_and_bad_arity() {
        let input = json!({});
        assert_eq!(
            eval("States.Nope(1)", &input).unwrap_err(),
            EvalError::UnsupportedIntrinsic {
                name: "States.Nope".to_string()
            }
        );
        assert_eq!(
            eval("States.ArrayLength()", &input).unwrap_err().error_name(),
            "States.IntrinsicFailure"
        );
    }

    #[test]
    fn missing_argument_path_is_a_runtime_error() {
        let input = json!({});
        assert_eq!(
            eval("States.ArrayLength($.missing)", &input).unwrap_err().error_name(),
            "States.Runtime"
        );
    }
}
