//! Comparison of an execution trace against a test case's expectations.
//!
//! Every mismatch is collected; a case never stops at its first failure.

use std::cmp::Ordering;

use serde::Serialize;
use serde_json::Value;
use stepcheck_eval::numeric;
use stepcheck_eval::ExecutionTrace;

use crate::suite::{ExpectedError, MatchMode, MatchingSettings, TestCase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AssertionKind {
    Output,
    Path,
    Error,
    State,
    Map,
    Parallel,
    Timeout,
}

/// One mismatch between expected and actual.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionFailure {
    pub kind: AssertionKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
}

impl AssertionFailure {
    fn new(kind: AssertionKind, message: impl Into<String>) -> Self {
        AssertionFailure {
            kind,
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    fn compared(mut self, expected: Value, actual: Value) -> Self {
        self.expected = Some(expected);
        self.actual = Some(actual);
        self
    }

    pub(crate) fn timeout(limit_ms: u64, elapsed_ms: u64) -> Self {
        AssertionFailure::new(
            AssertionKind::Timeout,
            format!("took {}ms, limit is {}ms", elapsed_ms, limit_ms),
        )
    }
}

/// Check every expectation of `case` against `trace`.
pub fn check_case(
    case: &TestCase,
    trace: &ExecutionTrace,
    matching: &MatchingSettings,
) -> Vec<AssertionFailure> {
    let mut failures = Vec::new();

    match (&case.expected_error, &trace.error) {
        (Some(expected), Some(actual)) => {
            if let Some(failure) = error_mismatch(expected, &actual.error, actual.cause.as_deref())
            {
                failures.push(failure);
            }
        }
        (Some(expected), None) => failures.push(AssertionFailure::new(
            AssertionKind::Error,
            format!(
                "expected error '{}' but the execution succeeded",
                expected.error_type()
            ),
        )),
        (None, Some(actual)) => failures.push(AssertionFailure::new(
            AssertionKind::Error,
            match &actual.cause {
                Some(cause) => format!("execution failed with '{}': {}", actual.error, cause),
                None => format!("execution failed with '{}'", actual.error),
            },
        )),
        (None, None) => {}
    }

    if let Some(expected) = &case.expected_output {
        if !values_match(expected, &trace.output, matching.output_matching) {
            failures.push(
                AssertionFailure::new(AssertionKind::Output, "output did not match")
                    .compared(expected.clone(), trace.output.clone()),
            );
        }
    }

    if let Some(expected) = &case.expected_path {
        if !path_matches(expected, &trace.execution_path, matching.path_matching) {
            failures.push(
                AssertionFailure::new(AssertionKind::Path, "execution path did not match")
                    .compared(path_value(expected), path_value(&trace.execution_path)),
            );
        }
    }

    check_states(case, trace, matching.output_matching, &mut failures);
    check_maps(case, trace, matching.path_matching, &mut failures);
    check_parallels(case, trace, matching.path_matching, &mut failures);
    failures
}

fn error_mismatch(
    expected: &ExpectedError,
    actual: &str,
    actual_cause: Option<&str>,
) -> Option<AssertionFailure> {
    if expected.error_type() != actual {
        return Some(
            AssertionFailure::new(
                AssertionKind::Error,
                format!(
                    "expected error '{}' but got '{}'",
                    expected.error_type(),
                    actual
                ),
            )
            .compared(
                Value::String(expected.error_type().to_string()),
                Value::String(actual.to_string()),
            ),
        );
    }
    let wanted = expected.cause()?;
    if actual_cause.is_some_and(|cause| cause.contains(wanted)) {
        return None;
    }
    Some(
        AssertionFailure::new(
            AssertionKind::Error,
            format!("error cause does not contain '{}'", wanted),
        )
        .compared(
            Value::String(wanted.to_string()),
            actual_cause.map_or(Value::Null, |c| Value::String(c.to_string())),
        ),
    )
}

fn check_states(
    case: &TestCase,
    trace: &ExecutionTrace,
    mode: MatchMode,
    failures: &mut Vec<AssertionFailure>,
) {
    for expectation in &case.state_expectations {
        let Some(visit) = trace.first_visit(&expectation.state) else {
            failures.push(AssertionFailure::new(
                AssertionKind::State,
                format!("state '{}' was never executed", expectation.state),
            ));
            continue;
        };
        if let Some(expected) = &expectation.input {
            if !values_match(expected, &visit.input, mode) {
                failures.push(
                    AssertionFailure::new(
                        AssertionKind::State,
                        format!("input of state '{}' did not match", expectation.state),
                    )
                    .compared(expected.clone(), visit.input.clone()),
                );
            }
        }
        if let Some(expected) = &expectation.output {
            let actual = visit.output.clone().unwrap_or(Value::Null);
            if !values_match(expected, &actual, mode) {
                failures.push(
                    AssertionFailure::new(
                        AssertionKind::State,
                        format!("output of state '{}' did not match", expectation.state),
                    )
                    .compared(expected.clone(), actual),
                );
            }
        }
    }
}

fn check_maps(
    case: &TestCase,
    trace: &ExecutionTrace,
    mode: MatchMode,
    failures: &mut Vec<AssertionFailure>,
) {
    for expectation in &case.map_expectations {
        let Some(map) = trace.map_executions_of(&expectation.state).next() else {
            failures.push(AssertionFailure::new(
                AssertionKind::Map,
                format!("map state '{}' was never executed", expectation.state),
            ));
            continue;
        };
        check_sub_paths(
            AssertionKind::Map,
            &expectation.state,
            "iteration",
            expectation.iteration_count,
            expectation.iteration_paths.as_deref(),
            &map.iteration_paths,
            mode,
            failures,
        );
    }
}

fn check_parallels(
    case: &TestCase,
    trace: &ExecutionTrace,
    mode: MatchMode,
    failures: &mut Vec<AssertionFailure>,
) {
    for expectation in &case.parallel_expectations {
        let Some(parallel) = trace.parallel_executions_of(&expectation.state).next() else {
            failures.push(AssertionFailure::new(
                AssertionKind::Parallel,
                format!("parallel state '{}' was never executed", expectation.state),
            ));
            continue;
        };
        check_sub_paths(
            AssertionKind::Parallel,
            &expectation.state,
            "branch",
            expectation.branch_count,
            expectation.branch_paths.as_deref(),
            &parallel.branch_paths,
            mode,
            failures,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn check_sub_paths(
    kind: AssertionKind,
    state: &str,
    noun: &str,
    expected_count: Option<usize>,
    expected_paths: Option<&[Vec<String>]>,
    actual: &[Vec<String>],
    mode: MatchMode,
    failures: &mut Vec<AssertionFailure>,
) {
    if let Some(count) = expected_count {
        if count != actual.len() {
            failures.push(
                AssertionFailure::new(
                    kind,
                    format!(
                        "'{}' ran {} {}(s), expected {}",
                        state,
                        actual.len(),
                        noun,
                        count
                    ),
                )
                .compared(Value::from(count), Value::from(actual.len())),
            );
        }
    }
    if let Some(expected) = expected_paths {
        let matches = expected.len() == actual.len()
            && expected
                .iter()
                .zip(actual)
                .all(|(e, a)| path_matches(e, a, mode));
        if !matches {
            failures.push(
                AssertionFailure::new(kind, format!("{} paths of '{}' did not match", noun, state))
                    .compared(
                        Value::Array(expected.iter().map(|p| path_value(p)).collect()),
                        Value::Array(actual.iter().map(|p| path_value(p)).collect()),
                    ),
            );
        }
    }
}

fn path_value(path: &[String]) -> Value {
    Value::Array(path.iter().cloned().map(Value::String).collect())
}

// ──────────────────────────────────────────────
// Matching
// ──────────────────────────────────────────────

/// `Exact` is deep equality; `Partial` requires every expected key to match
/// and ignores extra actual keys. Numbers compare by value, so `1` matches `1.0`.
pub fn values_match(expected: &Value, actual: &Value, mode: MatchMode) -> bool {
    match (expected, actual) {
        (Value::Number(e), Value::Number(a)) => {
            numeric::compare_numbers(e, a) == Some(Ordering::Equal)
        }
        (Value::Object(e), Value::Object(a)) => {
            let sizes_ok = mode == MatchMode::Partial || e.len() == a.len();
            sizes_ok
                && e.iter().all(|(key, value)| {
                    a.get(key)
                        .is_some_and(|actual| values_match(value, actual, mode))
                })
        }
        (Value::Array(e), Value::Array(a)) => {
            e.len() == a.len() && e.iter().zip(a).all(|(e, a)| values_match(e, a, mode))
        }
        _ => expected == actual,
    }
}

/// `Exact` compares whole paths; `Partial` accepts the expected path as an
/// in-order subsequence of the actual one.
pub fn path_matches(expected: &[String], actual: &[String], mode: MatchMode) -> bool {
    match mode {
        MatchMode::Exact => expected == actual,
        MatchMode::Partial => {
            let mut remaining = actual.iter();
            expected
                .iter()
                .all(|wanted| remaining.any(|state| state == wanted))
        }
    }
}
