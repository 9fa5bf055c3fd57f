//! Suite execution.
//!
//! Cases run on blocking worker tasks, at most `max_concurrency` at a time.
//! Each case owns its mock engine and coverage tracker, so workers share
//! nothing mutable except the cancellation flag. Results are slotted back
//! into declaration order and reduced by the calling task alone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use stepcheck_coverage::CoverageTracker;
use stepcheck_eval::{execute, ExecutionOptions, MockEngine, MockOptions, DEFAULT_MAX_STEPS};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::assertion::{check_case, AssertionFailure};
use crate::error::SuiteError;
use crate::result::{SuiteResult, SuiteSummary, TestResult, TestStatus};
use crate::suite::{PreparedSuite, SuiteSettings, TestCase};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub max_concurrency: usize,
    /// Skip every case not yet started once one fails.
    pub stop_on_failure: bool,
    pub seed: Option<u64>,
    pub max_steps: usize,
    pub mock: MockOptions,
    pub coverage: bool,
    /// Per-case timeout in milliseconds, unless the case sets its own.
    pub timeout_ms: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            max_concurrency: 1,
            stop_on_failure: false,
            seed: None,
            max_steps: DEFAULT_MAX_STEPS,
            mock: MockOptions::default(),
            coverage: true,
            timeout_ms: None,
        }
    }
}

impl RunOptions {
    /// Defaults overlaid with a suite's own settings.
    pub fn for_suite(settings: &SuiteSettings) -> Self {
        RunOptions::default().with_suite_settings(settings)
    }

    /// Overlay the values a suite sets explicitly.
    pub fn with_suite_settings(mut self, settings: &SuiteSettings) -> Self {
        if let Some(max_concurrency) = settings.max_concurrency {
            self.max_concurrency = max_concurrency;
        }
        if let Some(stop_on_failure) = settings.stop_on_failure {
            self.stop_on_failure = stop_on_failure;
        }
        if settings.seed.is_some() {
            self.seed = settings.seed;
        }
        if let Some(max_steps) = settings.max_steps {
            self.max_steps = max_steps;
        }
        if settings.timeout.is_some() {
            self.timeout_ms = settings.timeout;
        }
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_stop_on_failure(mut self, stop_on_failure: bool) -> Self {
        self.stop_on_failure = stop_on_failure;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_mock_options(mut self, mock: MockOptions) -> Self {
        self.mock = mock;
        self
    }

    pub fn with_coverage(mut self, coverage: bool) -> Self {
        self.coverage = coverage;
        self
    }

    fn execution_options(&self, case: &TestCase) -> ExecutionOptions {
        ExecutionOptions::default()
            .with_max_steps(self.max_steps)
            .with_seed(self.seed)
            .with_execution_name(case.name.clone())
    }
}

/// Cooperative suite cancellation, checked only between test cases.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        CancellationFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One finished case and the coverage it contributed.
#[derive(Debug, Clone)]
pub struct CaseRun {
    pub result: TestResult,
    /// `None` for skipped cases.
    pub coverage: Option<CoverageTracker>,
}

impl CaseRun {
    fn skipped(case: &TestCase, reason: &str) -> Self {
        tracing::info!(case = %case.name, reason, "test case skipped");
        CaseRun {
            result: TestResult::skipped(&case.name, reason),
            coverage: None,
        }
    }
}

/// Run a single case against a fresh mock engine.
pub fn run_case(suite: &PreparedSuite, case: &TestCase, options: &RunOptions) -> CaseRun {
    let started = Instant::now();
    let mocks = suite.base_mock.merged_with(&case.mock_overrides);
    let mut engine = MockEngine::with_options(mocks, options.mock);
    let trace = execute(
        &suite.definition,
        case.input.clone(),
        &mut engine,
        &options.execution_options(case),
    );
    let duration_ms = elapsed_ms(started);

    let mut failures = check_case(case, &trace, &suite.suite.assertions);
    if let Some(limit) = case.timeout.or(options.timeout_ms) {
        if duration_ms > limit {
            failures.push(AssertionFailure::timeout(limit, duration_ms));
        }
    }

    let mut coverage = CoverageTracker::new(&suite.definition);
    coverage.track_trace(&trace);

    let status = if failures.is_empty() {
        TestStatus::Passed
    } else {
        TestStatus::Failed
    };
    tracing::info!(
        case = %case.name,
        ?status,
        duration_ms,
        failures = failures.len(),
        "test case finished"
    );

    CaseRun {
        result: TestResult {
            name: case.name.clone(),
            status,
            duration_ms,
            failures,
            skip_reason: None,
            trace: Some(trace),
        },
        coverage: Some(coverage),
    }
}

pub async fn run_suite(
    suite: Arc<PreparedSuite>,
    options: RunOptions,
) -> Result<SuiteResult, SuiteError> {
    run_suite_with_cancellation(suite, options, CancellationFlag::new()).await
}

/// Run every case of `suite`. Cases not yet started when `cancel` is set
/// are reported as skipped.
pub async fn run_suite_with_cancellation(
    suite: Arc<PreparedSuite>,
    options: RunOptions,
    cancel: CancellationFlag,
) -> Result<SuiteResult, SuiteError> {
    let started = Instant::now();
    let case_count = suite.suite.test_cases.len();
    let focused = suite.suite.is_focused();
    let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
    let options = Arc::new(options);

    tracing::debug!(
        suite = %suite.suite.name,
        cases = case_count,
        max_concurrency = options.max_concurrency,
        "running test suite"
    );

    let mut slots: Vec<Option<CaseRun>> = (0..case_count).map(|_| None).collect();
    let mut workers = JoinSet::new();

    for (index, case) in suite.suite.test_cases.iter().enumerate() {
        if case.skip {
            slots[index] = Some(CaseRun::skipped(case, "marked skip"));
            continue;
        }
        if focused && !case.only {
            slots[index] = Some(CaseRun::skipped(case, "not marked only"));
            continue;
        }

        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| SuiteError::Worker(e.to_string()))?;
        if cancel.is_cancelled() {
            slots[index] = Some(CaseRun::skipped(case, "cancelled"));
            continue;
        }

        let suite = Arc::clone(&suite);
        let options = Arc::clone(&options);
        let cancel = cancel.clone();
        workers.spawn_blocking(move || {
            let _permit = permit;
            let run = run_case(&suite, &suite.suite.test_cases[index], &options);
            if options.stop_on_failure && run.result.status == TestStatus::Failed {
                cancel.cancel();
            }
            (index, run)
        });
    }

    while let Some(joined) = workers.join_next().await {
        let (index, run) = joined.map_err(|e| SuiteError::Worker(e.to_string()))?;
        slots[index] = Some(run);
    }

    let mut coverage = options
        .coverage
        .then(|| CoverageTracker::new(&suite.definition));
    let mut results = Vec::with_capacity(case_count);
    for (index, slot) in slots.into_iter().enumerate() {
        let run = slot.ok_or_else(|| SuiteError::Worker(format!("no result for case {}", index)))?;
        if let (Some(total), Some(case_coverage)) = (coverage.as_mut(), run.coverage.as_ref()) {
            total.merge(case_coverage);
        }
        results.push(run.result);
    }

    let summary = SuiteSummary::tally(&results, elapsed_ms(started));
    tracing::info!(
        suite = %suite.suite.name,
        passed = summary.passed,
        failed = summary.failed,
        skipped = summary.skipped,
        duration_ms = summary.duration_ms,
        "test suite finished"
    );

    Ok(SuiteResult {
        suite_name: suite.suite.name.clone(),
        results,
        summary,
        coverage: coverage.map(|tracker| tracker.get_coverage()),
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
