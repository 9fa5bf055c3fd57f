//! Suite results: the plain-data contract consumed by reporters.

use serde::Serialize;
use stepcheck_coverage::CoverageReport;
use stepcheck_eval::ExecutionTrace;

use crate::assertion::AssertionFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub name: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<AssertionFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Absent for skipped cases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<ExecutionTrace>,
}

impl TestResult {
    pub(crate) fn skipped(name: &str, reason: &str) -> Self {
        TestResult {
            name: name.to_string(),
            status: TestStatus::Skipped,
            duration_ms: 0,
            failures: Vec::new(),
            skip_reason: Some(reason.to_string()),
            trace: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowestTest {
    pub name: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slowest_test: Option<SlowestTest>,
}

impl SuiteSummary {
    pub(crate) fn tally(results: &[TestResult], duration_ms: u64) -> Self {
        let count = |status: TestStatus| results.iter().filter(|r| r.status == status).count();
        let slowest_test = results
            .iter()
            .filter(|r| r.status != TestStatus::Skipped)
            .max_by_key(|r| r.duration_ms)
            .map(|r| SlowestTest {
                name: r.name.clone(),
                duration_ms: r.duration_ms,
            });
        SuiteSummary {
            total: results.len(),
            passed: count(TestStatus::Passed),
            failed: count(TestStatus::Failed),
            skipped: count(TestStatus::Skipped),
            duration_ms,
            slowest_test,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteResult {
    pub suite_name: String,
    /// In declaration order, whatever order the cases ran in.
    pub results: Vec<TestResult>,
    pub summary: SuiteSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageReport>,
}

impl SuiteResult {
    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results
            .iter()
            .filter(|r| r.status == TestStatus::Failed)
    }
}
