//! Deserialization of ASL JSON into the typed model, plus load-time
//! structural validation.
//!
//! The main entry point is [`StateMachine::from_json`]. A document that
//! parses is guaranteed to have a resolvable `StartAt` and resolvable
//! `Next`/`Default`/`Catch.Next` references in every scope.

use serde_json::Value;

use crate::types::*;
use crate::DefinitionError;

impl StateMachine {
    /// Parse and validate an ASL document from text.
    pub fn from_str_json(text: &str) -> Result<StateMachine, DefinitionError> {
        let value: Value = serde_json::from_str(text).map_err(|e| DefinitionError::Document {
            kind: "state machine".to_string(),
            message: e.to_string(),
        })?;
        StateMachine::from_json(&value)
    }

    /// Parse and validate an ASL document.
    pub fn from_json(value: &Value) -> Result<StateMachine, DefinitionError> {
        if let Some(lang) = value.get("QueryLanguage").and_then(|v| v.as_str()) {
            if lang != "JSONPath" {
                return Err(DefinitionError::UnsupportedQueryLanguage(lang.to_string()));
            }
        }
        let sm = parse_scope(value, "top-level")?;
        validate_scope(&sm, "top-level")?;
        Ok(sm)
    }
}

// ── Scope and state parsing ─────────────────────────────────────────

fn parse_scope(obj: &Value, scope: &str) -> Result<StateMachine, DefinitionError> {
    let start_at = obj
        .get("StartAt")
        .and_then(|v| v.as_str())
        .ok_or_else(|| DefinitionError::MissingField {
            scope: scope.to_string(),
            field: "StartAt".to_string(),
        })?
        .to_string();

    let states_obj = obj
        .get("States")
        .and_then(|v| v.as_object())
        .ok_or_else(|| DefinitionError::MissingField {
            scope: scope.to_string(),
            field: "States".to_string(),
        })?;

    let mut states = Vec::with_capacity(states_obj.len());
    for (name, body) in states_obj {
        states.push(parse_state(name, body)?);
    }

    let comment = opt_string(obj, "Comment");
    let timeout = obj.get("TimeoutSeconds").and_then(|v| v.as_u64());

    Ok(StateMachine::new(start_at, states)
        .with_comment(comment)
        .with_timeout(timeout))
}

fn parse_state(name: &str, body: &Value) -> Result<State, DefinitionError> {
    if !body.is_object() {
        return Err(invalid(name, "state body must be a JSON object"));
    }
    let type_name = body
        .get("Type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid(name, "missing 'Type' field"))?;

    let kind = match type_name {
        "Pass" => StateKind::Pass(PassState {
            io: parse_io(name, body)?,
            result_path: path_field(name, body, "ResultPath")?,
            parameters: body.get("Parameters").cloned(),
            result: body.get("Result").cloned(),
            transition: parse_transition(name, body)?,
        }),
        "Task" => StateKind::Task(parse_task(name, body)?),
        "Choice" => StateKind::Choice(parse_choice(name, body)?),
        "Wait" => StateKind::Wait(WaitState {
            io: parse_io(name, body)?,
            duration: parse_wait_duration(name, body)?,
            transition: parse_transition(name, body)?,
        }),
        "Succeed" => StateKind::Succeed(SucceedState {
            io: parse_io(name, body)?,
        }),
        "Fail" => StateKind::Fail(FailState {
            error: opt_string(body, "Error"),
            cause: opt_string(body, "Cause"),
            error_path: opt_string(body, "ErrorPath"),
            cause_path: opt_string(body, "CausePath"),
        }),
        "Map" => StateKind::Map(parse_map(name, body)?),
        "Parallel" => StateKind::Parallel(parse_parallel(name, body)?),
        other => {
            return Err(DefinitionError::UnsupportedType {
                state: name.to_string(),
                type_name: other.to_string(),
            })
        }
    };

    Ok(State {
        name: name.to_string(),
        comment: opt_string(body, "Comment"),
        kind,
    })
}

fn parse_task(name: &str, body: &Value) -> Result<TaskState, DefinitionError> {
    let resource = body
        .get("Resource")
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid(name, "Task state missing 'Resource'"))?
        .to_string();

    Ok(TaskState {
        io: parse_io(name, body)?,
        result_path: path_field(name, body, "ResultPath")?,
        resource,
        parameters: body.get("Parameters").cloned(),
        result_selector: body.get("ResultSelector").cloned(),
        timeout_seconds: body.get("TimeoutSeconds").and_then(|v| v.as_u64()),
        timeout_seconds_path: opt_string(body, "TimeoutSecondsPath"),
        heartbeat_seconds: body.get("HeartbeatSeconds").and_then(|v| v.as_u64()),
        retry: parse_retry(name, body)?,
        catch: parse_catch(name, body)?,
        transition: parse_transition(name, body)?,
    })
}

fn parse_choice(name: &str, body: &Value) -> Result<ChoiceState, DefinitionError> {
    let rules = body
        .get("Choices")
        .and_then(|v| v.as_array())
        .ok_or_else(|| invalid(name, "Choice state missing 'Choices' array"))?;
    if rules.is_empty() {
        return Err(invalid(name, "Choice state must have at least one rule"));
    }
    if body.get("Next").is_some() || body.get("End").is_some() {
        return Err(invalid(name, "Choice state must not carry 'Next' or 'End'"));
    }

    let mut choices = Vec::with_capacity(rules.len());
    for (i, rule) in rules.iter().enumerate() {
        let next = rule
            .get("Next")
            .and_then(|v| v.as_str())
            .ok_or_else(|| invalid(name, &format!("Choices[{}] missing 'Next'", i)))?
            .to_string();
        let condition = parse_condition(name, rule)?;
        choices.push(ChoiceRule { condition, next });
    }

    Ok(ChoiceState {
        io: parse_io(name, body)?,
        choices,
        default: opt_string(body, "Default"),
    })
}

/// Parse a (possibly nested) boolean expression.
fn parse_condition(state: &str, rule: &Value) -> Result<Condition, DefinitionError> {
    if let Some(items) = rule.get("And") {
        return Ok(Condition::And(parse_condition_list(state, items, "And")?));
    }
    if let Some(items) = rule.get("Or") {
        return Ok(Condition::Or(parse_condition_list(state, items, "Or")?));
    }
    if let Some(inner) = rule.get("Not") {
        return Ok(Condition::Not(Box::new(parse_condition(state, inner)?)));
    }

    let variable = rule
        .get("Variable")
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid(state, "choice rule missing 'Variable'"))?
        .to_string();

    let obj = rule
        .as_object()
        .ok_or_else(|| invalid(state, "choice rule must be an object"))?;
    let mut found = None;
    for (key, value) in obj {
        if let Some((comparison, is_path)) = Comparison::from_key(key) {
            if found.is_some() {
                return Err(invalid(
                    state,
                    &format!("choice rule on '{}' has more than one operator", variable),
                ));
            }
            let operand = if is_path {
                let path = value.as_str().ok_or_else(|| {
                    invalid(state, &format!("'{}' must be a path string", key))
                })?;
                Operand::Path(path.to_string())
            } else {
                check_literal(state, key, comparison, value)?;
                Operand::Literal(value.clone())
            };
            found = Some((comparison, operand));
        }
    }

    let (comparison, operand) = found.ok_or_else(|| {
        invalid(
            state,
            &format!("choice rule on '{}' has no comparison operator", variable),
        )
    })?;

    Ok(Condition::Test {
        variable,
        comparison,
        operand,
    })
}

fn parse_condition_list(
    state: &str,
    items: &Value,
    op: &str,
) -> Result<Vec<Condition>, DefinitionError> {
    let arr = items
        .as_array()
        .ok_or_else(|| invalid(state, &format!("'{}' must be an array", op)))?;
    if arr.is_empty() {
        return Err(invalid(state, &format!("'{}' must not be empty", op)));
    }
    arr.iter().map(|c| parse_condition(state, c)).collect()
}

fn check_literal(
    state: &str,
    key: &str,
    comparison: Comparison,
    value: &Value,
) -> Result<(), DefinitionError> {
    let ok = match comparison {
        Comparison::NumericEquals
        | Comparison::NumericLessThan
        | Comparison::NumericGreaterThan
        | Comparison::NumericLessThanEquals
        | Comparison::NumericGreaterThanEquals => value.is_number(),
        Comparison::BooleanEquals => value.is_boolean(),
        c if c.is_type_test() => value.is_boolean(),
        _ => value.is_string(),
    };
    if ok {
        Ok(())
    } else {
        Err(invalid(
            state,
            &format!("operator '{}' has an operand of the wrong type", key),
        ))
    }
}

fn parse_wait_duration(name: &str, body: &Value) -> Result<WaitDuration, DefinitionError> {
    let mut found = Vec::new();
    if let Some(v) = body.get("Seconds") {
        let secs = v
            .as_u64()
            .ok_or_else(|| invalid(name, "'Seconds' must be a non-negative integer"))?;
        found.push(WaitDuration::Seconds(secs));
    }
    if let Some(p) = opt_string(body, "SecondsPath") {
        found.push(WaitDuration::SecondsPath(p));
    }
    if let Some(t) = opt_string(body, "Timestamp") {
        found.push(WaitDuration::Timestamp(t));
    }
    if let Some(p) = opt_string(body, "TimestampPath") {
        found.push(WaitDuration::TimestampPath(p));
    }
    if found.len() != 1 {
        return Err(invalid(
            name,
            "Wait state needs exactly one of Seconds, SecondsPath, Timestamp, TimestampPath",
        ));
    }
    Ok(found.remove(0))
}

fn parse_map(name: &str, body: &Value) -> Result<MapState, DefinitionError> {
    let processor_json = body
        .get("ItemProcessor")
        .or_else(|| body.get("Iterator"))
        .ok_or_else(|| invalid(name, "Map state missing 'ItemProcessor'"))?;

    let processor_mode = match processor_json
        .get("ProcessorConfig")
        .and_then(|c| c.get("Mode"))
        .and_then(|m| m.as_str())
    {
        None | Some("INLINE") => ProcessorMode::Inline,
        Some("DISTRIBUTED") => ProcessorMode::Distributed,
        Some(other) => {
            return Err(invalid(
                name,
                &format!("unknown ProcessorConfig.Mode '{}'", other),
            ))
        }
    };

    let item_processor = parse_scope(processor_json, &format!("Map '{}' ItemProcessor", name))?;

    let item_batcher = body.get("ItemBatcher").map(|b| ItemBatcher {
        max_items_per_batch: b.get("MaxItemsPerBatch").and_then(|v| v.as_u64()),
        batch_input: b.get("BatchInput").cloned(),
    });
    if let Some(ItemBatcher {
        max_items_per_batch: Some(0),
        ..
    }) = item_batcher
    {
        return Err(invalid(name, "ItemBatcher.MaxItemsPerBatch must be positive"));
    }

    Ok(MapState {
        io: parse_io(name, body)?,
        result_path: path_field(name, body, "ResultPath")?,
        result_selector: body.get("ResultSelector").cloned(),
        items_path: opt_string(body, "ItemsPath"),
        item_selector: body
            .get("ItemSelector")
            .or_else(|| body.get("Parameters"))
            .cloned(),
        item_processor: Box::new(item_processor),
        processor_mode,
        max_concurrency: body.get("MaxConcurrency").and_then(|v| v.as_u64()),
        item_reader: body.get("ItemReader").cloned(),
        item_batcher,
        result_writer: body.get("ResultWriter").cloned(),
        retry: parse_retry(name, body)?,
        catch: parse_catch(name, body)?,
        transition: parse_transition(name, body)?,
    })
}

fn parse_parallel(name: &str, body: &Value) -> Result<ParallelState, DefinitionError> {
    let branches_json = body
        .get("Branches")
        .and_then(|v| v.as_array())
        .ok_or_else(|| invalid(name, "Parallel state missing 'Branches' array"))?;
    if branches_json.is_empty() {
        return Err(invalid(name, "Parallel state must have at least one branch"));
    }

    let branches = branches_json
        .iter()
        .enumerate()
        .map(|(i, b)| parse_scope(b, &format!("Parallel '{}' branch {}", name, i)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParallelState {
        io: parse_io(name, body)?,
        result_path: path_field(name, body, "ResultPath")?,
        parameters: body.get("Parameters").cloned(),
        result_selector: body.get("ResultSelector").cloned(),
        branches,
        retry: parse_retry(name, body)?,
        catch: parse_catch(name, body)?,
        transition: parse_transition(name, body)?,
    })
}

// ── Shared fields ───────────────────────────────────────────────────

fn parse_io(name: &str, body: &Value) -> Result<InputOutput, DefinitionError> {
    Ok(InputOutput {
        input_path: path_field(name, body, "InputPath")?,
        output_path: path_field(name, body, "OutputPath")?,
    })
}

fn path_field(name: &str, body: &Value, field: &str) -> Result<PathField, DefinitionError> {
    match body.get(field) {
        None => Ok(PathField::default()),
        Some(Value::Null) => Ok(PathField::Discard),
        Some(Value::String(p)) if p.starts_with('$') => Ok(PathField::Path(p.clone())),
        Some(_) => Err(invalid(
            name,
            &format!("'{}' must be a path starting with '$' or null", field),
        )),
    }
}

fn parse_transition(name: &str, body: &Value) -> Result<Transition, DefinitionError> {
    let next = body.get("Next").and_then(|v| v.as_str());
    let end = body.get("End").and_then(|v| v.as_bool()).unwrap_or(false);
    match (next, end) {
        (Some(n), false) => Ok(Transition::Next(n.to_string())),
        (None, true) => Ok(Transition::End),
        (Some(_), true) => Err(invalid(name, "state has both 'Next' and 'End'")),
        (None, false) => Err(invalid(name, "state needs either 'Next' or 'End: true'")),
    }
}

fn parse_retry(name: &str, body: &Value) -> Result<Vec<Retrier>, DefinitionError> {
    let Some(arr) = body.get("Retry") else {
        return Ok(Vec::new());
    };
    let arr = arr
        .as_array()
        .ok_or_else(|| invalid(name, "'Retry' must be an array"))?;

    let mut out = Vec::with_capacity(arr.len());
    for (i, r) in arr.iter().enumerate() {
        let defaults = Retrier::default();
        let jitter_strategy = match r.get("JitterStrategy").and_then(|v| v.as_str()) {
            None | Some("NONE") => JitterStrategy::None,
            Some("FULL") => JitterStrategy::Full,
            Some(other) => {
                return Err(invalid(
                    name,
                    &format!("Retry[{}] has unknown JitterStrategy '{}'", i, other),
                ))
            }
        };
        out.push(Retrier {
            error_equals: error_equals(name, r, &format!("Retry[{}]", i))?,
            interval_seconds: r
                .get("IntervalSeconds")
                .and_then(|v| v.as_f64())
                .unwrap_or(defaults.interval_seconds),
            max_attempts: r
                .get("MaxAttempts")
                .and_then(|v| v.as_u64())
                .map(|v| v as u32)
                .unwrap_or(defaults.max_attempts),
            backoff_rate: r
                .get("BackoffRate")
                .and_then(|v| v.as_f64())
                .unwrap_or(defaults.backoff_rate),
            max_delay_seconds: r.get("MaxDelaySeconds").and_then(|v| v.as_f64()),
            jitter_strategy,
        });
    }
    Ok(out)
}

fn parse_catch(name: &str, body: &Value) -> Result<Vec<Catcher>, DefinitionError> {
    let Some(arr) = body.get("Catch") else {
        return Ok(Vec::new());
    };
    let arr = arr
        .as_array()
        .ok_or_else(|| invalid(name, "'Catch' must be an array"))?;

    let mut out = Vec::with_capacity(arr.len());
    for (i, c) in arr.iter().enumerate() {
        let label = format!("Catch[{}]", i);
        let next = c
            .get("Next")
            .and_then(|v| v.as_str())
            .ok_or_else(|| invalid(name, &format!("{} missing 'Next'", label)))?
            .to_string();
        out.push(Catcher {
            error_equals: error_equals(name, c, &label)?,
            next,
            result_path: path_field(name, c, "ResultPath")?,
        });
    }
    Ok(out)
}

fn error_equals(name: &str, obj: &Value, label: &str) -> Result<Vec<String>, DefinitionError> {
    let list: Vec<String> = obj
        .get("ErrorEquals")
        .and_then(|v| v.as_array())
        .ok_or_else(|| invalid(name, &format!("{} missing 'ErrorEquals'", label)))?
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();
    if list.is_empty() {
        return Err(invalid(name, &format!("{} has empty 'ErrorEquals'", label)));
    }
    if list.len() > 1 && list.iter().any(|e| e == errors::ALL) {
        return Err(invalid(
            name,
            &format!("{}: 'States.ALL' must appear alone", label),
        ));
    }
    Ok(list)
}

fn opt_string(obj: &Value, field: &str) -> Option<String> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn invalid(state: &str, message: &str) -> DefinitionError {
    DefinitionError::InvalidState {
        state: state.to_string(),
        message: message.to_string(),
    }
}

// ── Validation ──────────────────────────────────────────────────────

/// Check that every reference inside `sm` resolves within `sm`, then
/// recurse into nested Map/Parallel scopes.
fn validate_scope(sm: &StateMachine, scope: &str) -> Result<(), DefinitionError> {
    if !sm.contains(&sm.start_at) {
        return Err(DefinitionError::UnknownStartAt {
            scope: scope.to_string(),
            target: sm.start_at.clone(),
        });
    }

    for state in &sm.states {
        for target in state.successors() {
            if !sm.contains(target) {
                return Err(DefinitionError::DanglingTransition {
                    scope: scope.to_string(),
                    state: state.name.clone(),
                    target: target.to_string(),
                });
            }
        }

        match &state.kind {
            StateKind::Map(map) => {
                validate_scope(
                    &map.item_processor,
                    &format!("Map '{}' ItemProcessor", state.name),
                )?;
            }
            StateKind::Parallel(par) => {
                for (i, branch) in par.branches.iter().enumerate() {
                    validate_scope(branch, &format!("Parallel '{}' branch {}", state.name, i))?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}
