//! Execution trace: the plain-data result of one `execute` call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTrace {
    /// Final output; `null` when the execution failed.
    pub output: Value,
    /// Top-level states in visit order. Never contains nested entries.
    pub execution_path: Vec<String>,
    pub map_executions: Vec<MapExecution>,
    pub parallel_executions: Vec<ParallelExecution>,
    /// One record per state visit at any depth, outer before inner.
    pub state_executions: Vec<StateExecution>,
    /// Simulated retry delays. Informational only.
    pub retries: Vec<RetryRecord>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TraceError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapExecution {
    pub state: String,
    /// One path per item, in input order.
    pub iteration_paths: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelExecution {
    pub state: String,
    /// One path per branch, in declaration order.
    pub branch_paths: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateExecution {
    pub state: String,
    /// `""` at top level, `"Map[2]"` inside an iteration, `"Map[2]/Branches[0]"` deeper.
    pub scope: String,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRecord {
    pub state: String,
    pub scope: String,
    pub error: String,
    /// 1-based retry number for the matching retrier.
    pub attempt: u32,
    pub delay_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// The top-level state at which the execution failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl ExecutionTrace {
    pub fn error_name(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.error.as_str())
    }

    /// Every recorded execution of the named Map state, in record order.
    pub fn map_executions_of<'a>(
        &'a self,
        state: &'a str,
    ) -> impl Iterator<Item = &'a MapExecution> + 'a {
        self.map_executions.iter().filter(move |m| m.state == state)
    }

    pub fn parallel_executions_of<'a>(
        &'a self,
        state: &'a str,
    ) -> impl Iterator<Item = &'a ParallelExecution> + 'a {
        self.parallel_executions.iter().filter(move |p| p.state == state)
    }

    /// The first recorded visit of `state` at any depth.
    pub fn first_visit(&self, state: &str) -> Option<&StateExecution> {
        self.state_executions.iter().find(|s| s.state == state)
    }
}
