//! Test suite documents and their resolution into runnable form.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stepcheck_interchange::{MockConfig, MockRule, StateMachine};

use crate::error::SuiteError;

/// A test suite as authored, in JSON or YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub state_machine: DocumentRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_mock: Option<DocumentRef>,
    #[serde(default)]
    pub settings: SuiteSettings,
    #[serde(default)]
    pub assertions: MatchingSettings,
    pub test_cases: Vec<TestCase>,
}

/// A document given either as a file reference or inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentRef {
    Path(String),
    Inline(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_on_failure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<usize>,
    /// Default per-case timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Exact,
    Partial,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingSettings {
    #[serde(default)]
    pub output_matching: MatchMode,
    #[serde(default)]
    pub path_matching: MatchMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "empty_object")]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_path: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_error: Option<ExpectedError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mock_overrides: Vec<MockRule>,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub only: bool,
    /// Wall-clock budget in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub state_expectations: Vec<StateExpectation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub map_expectations: Vec<MapExpectation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parallel_expectations: Vec<ParallelExpectation>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// `"States.TaskFailed"` or `{ "type": "States.TaskFailed", "cause": "declined" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpectedError {
    Name(String),
    Detailed {
        #[serde(rename = "type")]
        error_type: String,
        /// Matched as a substring of the actual cause.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },
}

impl ExpectedError {
    pub fn error_type(&self) -> &str {
        match self {
            ExpectedError::Name(name) => name,
            ExpectedError::Detailed { error_type, .. } => error_type,
        }
    }

    pub fn cause(&self) -> Option<&str> {
        match self {
            ExpectedError::Name(_) => None,
            ExpectedError::Detailed { cause, .. } => cause.as_deref(),
        }
    }
}

/// Checked against the first recorded visit of `state` at any depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateExpectation {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

/// Checked against the first recorded execution of the Map state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapExpectation {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration_paths: Option<Vec<Vec<String>>>,
}

/// Checked against the first recorded execution of the Parallel state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelExpectation {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_paths: Option<Vec<Vec<String>>>,
}

impl TestSuite {
    /// Parse a suite from JSON or YAML text.
    pub fn parse(text: &str, origin: &str) -> Result<TestSuite, SuiteError> {
        serde_yaml_ng::from_str(text).map_err(|e| SuiteError::Parse {
            origin: origin.to_string(),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<TestSuite, SuiteError> {
        let text = read(path)?;
        TestSuite::parse(&text, &path.display().to_string())
    }

    /// Whether any case is flagged `only`.
    pub fn is_focused(&self) -> bool {
        self.test_cases.iter().any(|c| c.only)
    }

    fn check_cases(&self) -> Result<(), SuiteError> {
        let mut seen = HashSet::new();
        for case in &self.test_cases {
            if case.name.trim().is_empty() {
                return Err(SuiteError::InvalidCase {
                    case: case.name.clone(),
                    message: "name must not be empty".to_string(),
                });
            }
            if !seen.insert(case.name.as_str()) {
                return Err(SuiteError::InvalidCase {
                    case: case.name.clone(),
                    message: "duplicate test case name".to_string(),
                });
            }
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Resolution
// ──────────────────────────────────────────────

/// Where relative document references are looked up. The suite file's own
/// directory is always tried first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths {
    pub suite_dir: Option<PathBuf>,
    pub state_machines: Option<PathBuf>,
    pub mocks: Option<PathBuf>,
}

impl SearchPaths {
    pub fn for_suite_file(path: &Path) -> Self {
        SearchPaths {
            suite_dir: path.parent().map(Path::to_path_buf),
            ..SearchPaths::default()
        }
    }

    fn locate(&self, reference: &str, fallback: Option<&PathBuf>) -> PathBuf {
        let reference = Path::new(reference);
        if reference.is_absolute() {
            return reference.to_path_buf();
        }
        let candidates = self.suite_dir.iter().chain(fallback);
        for dir in candidates.clone() {
            let candidate = dir.join(reference);
            if candidate.exists() {
                return candidate;
            }
        }
        candidates
            .into_iter()
            .next()
            .map(|dir| dir.join(reference))
            .unwrap_or_else(|| reference.to_path_buf())
    }
}

/// A suite whose definition and base mock have been loaded and validated.
#[derive(Debug, Clone)]
pub struct PreparedSuite {
    pub suite: TestSuite,
    pub definition: StateMachine,
    pub base_mock: MockConfig,
}

impl PreparedSuite {
    pub fn prepare(suite: TestSuite, paths: &SearchPaths) -> Result<PreparedSuite, SuiteError> {
        suite.check_cases()?;

        let definition = match &suite.state_machine {
            DocumentRef::Path(reference) => {
                let path = paths.locate(reference, paths.state_machines.as_ref());
                StateMachine::from_str_json(&read(&path)?)?
            }
            DocumentRef::Inline(value) => StateMachine::from_json(value)?,
        };
        let base_mock = match &suite.base_mock {
            None => MockConfig::default(),
            Some(DocumentRef::Path(reference)) => {
                let path = paths.locate(reference, paths.mocks.as_ref());
                MockConfig::parse(&read(&path)?)?
            }
            Some(DocumentRef::Inline(value)) => MockConfig::from_json(value)?,
        };

        tracing::debug!(
            suite = %suite.name,
            cases = suite.test_cases.len(),
            mock_rules = base_mock.mocks.len(),
            "prepared test suite"
        );
        Ok(PreparedSuite {
            suite,
            definition,
            base_mock,
        })
    }

    /// Load a suite file and everything it references.
    pub fn load(path: &Path, paths: &SearchPaths) -> Result<PreparedSuite, SuiteError> {
        let suite = TestSuite::load(path)?;
        let mut paths = paths.clone();
        if paths.suite_dir.is_none() {
            paths.suite_dir = path.parent().map(Path::to_path_buf);
        }
        PreparedSuite::prepare(suite, &paths)
    }
}

fn read(path: &Path) -> Result<String, SuiteError> {
    std::fs::read_to_string(path).map_err(|source| SuiteError::Io {
        path: path.to_path_buf(),
        source,
    })
}
