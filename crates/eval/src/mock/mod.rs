//! Mock Engine: deterministic stand-ins for task results.
//!
//! One engine serves one execution (or one test case). It owns the only
//! mutable state in a run: a call counter per state name, which drives
//! `stateful` rules.

mod matcher;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stepcheck_interchange::{MockBehavior, MockConfig, MockError};

pub use matcher::when_matches;

/// Error names produced by the engine itself.
pub mod mock_errors {
    pub const NO_MOCK_DEFINED: &str = "NoMockDefined";
    pub const NO_MATCHING_CONDITION: &str = "NoMatchingCondition";
    pub const RESPONSES_EXHAUSTED: &str = "MockResponsesExhausted";
}

/// What a `stateful` rule does once its responses run out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExhaustionPolicy {
    #[default]
    RepeatLast,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockOptions {
    pub exhaustion: ExhaustionPolicy,
}

/// A simulated task failure, routed through Retry/Catch by the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskError {
    pub error: String,
    pub cause: Option<String>,
}

impl TaskError {
    pub fn new(error: impl Into<String>, cause: impl Into<String>) -> Self {
        TaskError {
            error: error.into(),
            cause: Some(cause.into()),
        }
    }
}

impl From<&MockError> for TaskError {
    fn from(e: &MockError) -> Self {
        TaskError {
            error: e.error_type.clone(),
            cause: e.cause.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    Value(Value),
    Error(TaskError),
}

/// One resolution: the outcome plus the rule's simulated latency.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub outcome: MockOutcome,
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct MockEngine {
    config: MockConfig,
    options: MockOptions,
    calls: HashMap<String, usize>,
}

impl MockEngine {
    pub fn new(config: MockConfig) -> Self {
        Self::with_options(config, MockOptions::default())
    }

    pub fn with_options(config: MockConfig, options: MockOptions) -> Self {
        MockEngine {
            config,
            options,
            calls: HashMap::new(),
        }
    }

    /// An engine with no rules; every task call fails with `NoMockDefined`.
    pub fn empty() -> Self {
        Self::new(MockConfig::default())
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    pub fn has_rule(&self, state: &str) -> bool {
        self.config.rule_for(state).is_some()
    }

    /// Number of times `state` has been resolved by this engine.
    pub fn call_count(&self, state: &str) -> usize {
        self.calls.get(state).copied().unwrap_or(0)
    }

    /// Resolve the response for one call to `state` with `input`.
    pub fn resolve(&mut self, state: &str, input: &Value) -> MockResponse {
        let counter = self.calls.entry(state.to_string()).or_insert(0);
        let call_index = *counter;
        *counter += 1;

        let Some(rule) = self.config.rule_for(state) else {
            tracing::debug!(state, "no mock rule defined");
            return MockResponse {
                outcome: MockOutcome::Error(TaskError::new(
                    mock_errors::NO_MOCK_DEFINED,
                    format!("no mock is defined for state '{}'", state),
                )),
                delay_ms: None,
            };
        };

        let outcome = match &rule.behavior {
            MockBehavior::Fixed { response } => MockOutcome::Value(response.clone()),
            MockBehavior::Conditional {
                conditions,
                default,
            } => match conditions.iter().find(|c| when_matches(&c.when, input)) {
                Some(cond) => match (&cond.error, &cond.response) {
                    (Some(error), _) => MockOutcome::Error(error.into()),
                    (None, Some(response)) => MockOutcome::Value(response.clone()),
                    (None, None) => MockOutcome::Value(Value::Null),
                },
                None => match default {
                    Some(value) => MockOutcome::Value(value.clone()),
                    None => MockOutcome::Error(TaskError::new(
                        mock_errors::NO_MATCHING_CONDITION,
                        format!("no condition matched the input of state '{}'", state),
                    )),
                },
            },
            MockBehavior::Stateful { responses } => {
                match (responses.get(call_index), responses.last(), self.options.exhaustion) {
                    (Some(value), _, _) => MockOutcome::Value(value.clone()),
                    (None, Some(last), ExhaustionPolicy::RepeatLast) => {
                        MockOutcome::Value(last.clone())
                    }
                    _ => MockOutcome::Error(TaskError::new(
                        mock_errors::RESPONSES_EXHAUSTED,
                        format!(
                            "state '{}' was called {} times but only {} responses are configured",
                            state,
                            call_index + 1,
                            responses.len()
                        ),
                    )),
                }
            }
            MockBehavior::Error { error } => MockOutcome::Error(error.into()),
        };

        tracing::debug!(
            state,
            call = call_index + 1,
            failed = matches!(outcome, MockOutcome::Error(_)),
            "mock resolved"
        );
        MockResponse {
            outcome,
            delay_ms: rule.delay,
        }
    }
}
