//! stepcheck-runner: test suites for Amazon States Language definitions.
//!
//! A [`TestSuite`] names a definition, a base mock config and a list of
//! test cases. [`PreparedSuite`] resolves and validates those documents
//! once; [`run_suite`] then executes every case against a fresh mock
//! engine, checks the trace against the case's expectations, and reduces
//! the per-case results into a [`SuiteResult`] with merged coverage.

pub mod assertion;
pub mod error;
pub mod result;
pub mod runner;
pub mod suite;

pub use assertion::{check_case, path_matches, values_match, AssertionFailure, AssertionKind};
pub use error::SuiteError;
pub use result::{SlowestTest, SuiteResult, SuiteSummary, TestResult, TestStatus};
pub use runner::{
    run_case, run_suite, run_suite_with_cancellation, CancellationFlag, CaseRun, RunOptions,
};
pub use suite::{
    DocumentRef, ExpectedError, MapExpectation, MatchMode, MatchingSettings, ParallelExpectation,
    PreparedSuite, SearchPaths, StateExpectation, SuiteSettings, TestCase, TestSuite,
};
