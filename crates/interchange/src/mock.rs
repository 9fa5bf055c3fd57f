//! Mock configuration documents.
//!
//! A mock config is a flat list of rules keyed by state name. The name is
//! matched by plain equality regardless of how deeply the state is nested.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DefinitionError;

/// Top-level mock configuration: `{ "version"?, "mocks": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MockConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub mocks: Vec<MockRule>,
}

/// One rule for one state name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockRule {
    pub state: String,
    /// Simulated latency in milliseconds; compared against the Task's
    /// `TimeoutSeconds` but never actually waited on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(flatten)]
    pub behavior: MockBehavior,
}

/// The four rule kinds, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MockBehavior {
    Fixed {
        response: Value,
    },
    Conditional {
        conditions: Vec<MockCondition>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
    },
    Stateful {
        responses: Vec<Value>,
    },
    Error {
        error: MockError,
    },
}

/// One `when` clause of a conditional rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockCondition {
    pub when: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<MockError>,
}

/// A simulated task failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockError {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl MockConfig {
    /// Parse a mock config from JSON or YAML text.
    ///
    /// JSON is a subset of YAML, so one parser handles both.
    pub fn parse(text: &str) -> Result<MockConfig, DefinitionError> {
        serde_yaml_ng::from_str(text).map_err(|e| DefinitionError::Document {
            kind: "mock config".to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_json(value: &Value) -> Result<MockConfig, DefinitionError> {
        serde_json::from_value(value.clone()).map_err(|e| DefinitionError::Document {
            kind: "mock config".to_string(),
            message: e.to_string(),
        })
    }

    pub fn rule_for(&self, state: &str) -> Option<&MockRule> {
        self.mocks.iter().find(|r| r.state == state)
    }

    /// Layer `overrides` on top of this config: an override replaces the
    /// rule with the same state name, every other override is appended.
    pub fn merged_with(&self, overrides: &[MockRule]) -> MockConfig {
        let mut mocks = self.mocks.clone();
        for rule in overrides {
            match mocks.iter_mut().find(|r| r.state == rule.state) {
                Some(existing) => *existing = rule.clone(),
                None => mocks.push(rule.clone()),
            }
        }
        MockConfig {
            version: self.version.clone(),
            mocks,
        }
    }
}
