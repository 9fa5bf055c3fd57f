//! Human-readable output.

use std::fmt::Write as _;

use stepcheck_coverage::{CoverageMetric, CoverageReport, NestedKind, PATH_SEPARATOR};
use stepcheck_eval::ExecutionTrace;
use stepcheck_runner::{SuiteResult, TestStatus};

use super::failure_lines;

pub(crate) fn render_suite(result: &SuiteResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", result.suite_name);
    for test in &result.results {
        match test.status {
            TestStatus::Passed => {
                let _ = writeln!(out, "  PASS  {} ({}ms)", test.name, test.duration_ms);
            }
            TestStatus::Failed => {
                let _ = writeln!(out, "  FAIL  {} ({}ms)", test.name, test.duration_ms);
                for line in failure_lines(test) {
                    let _ = writeln!(out, "        {}", line);
                }
            }
            TestStatus::Skipped => {
                let reason = test.skip_reason.as_deref().unwrap_or("skipped");
                let _ = writeln!(out, "  SKIP  {} ({})", test.name, reason);
            }
        }
    }

    let summary = &result.summary;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} tests: {} passed, {} failed, {} skipped in {}ms",
        summary.total, summary.passed, summary.failed, summary.skipped, summary.duration_ms
    );
    if let Some(slowest) = &summary.slowest_test {
        let _ = writeln!(out, "slowest: {} ({}ms)", slowest.name, slowest.duration_ms);
    }

    if let Some(coverage) = &result.coverage {
        let _ = writeln!(out);
        out.push_str(&render_coverage(coverage));
    }
    out
}

pub(crate) fn render_coverage(coverage: &CoverageReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Coverage");
    metric_row(&mut out, "  states", &coverage.states);
    metric_row(&mut out, "  branches", &coverage.branches);
    let _ = writeln!(
        out,
        "  {:<10}{} total, {} unique",
        "paths", coverage.paths.total, coverage.paths.unique
    );

    if let Some(nested) = &coverage.nested {
        for (name, container) in nested {
            let kind = match container.kind {
                NestedKind::Map => "map",
                NestedKind::Parallel => "parallel",
            };
            let _ = writeln!(
                out,
                "  {} ({}, {} execution(s))",
                name, kind, container.executions
            );
            metric_row(&mut out, "    states", &container.states);
            metric_row(&mut out, "    branches", &container.branches);
        }
    }
    out
}

fn metric_row(out: &mut String, label: &str, metric: &CoverageMetric) {
    let _ = write!(
        out,
        "{:<12}{:>4}/{:<4} {:>6.2}%",
        label, metric.covered, metric.total, metric.percentage
    );
    if !metric.uncovered.is_empty() {
        let _ = write!(out, "  uncovered: {}", metric.uncovered.join(", "));
    }
    out.push('\n');
}

pub(crate) fn render_trace(trace: &ExecutionTrace) -> String {
    let mut out = String::new();
    match &trace.error {
        None => {
            let _ = writeln!(out, "SUCCEEDED");
        }
        Some(error) => {
            let _ = write!(out, "FAILED  {}", error.error);
            if let Some(cause) = &error.cause {
                let _ = write!(out, ": {}", cause);
            }
            if let Some(state) = &error.state {
                let _ = write!(out, " (at {})", state);
            }
            out.push('\n');
        }
    }
    let _ = writeln!(out, "path: {}", trace.execution_path.join(PATH_SEPARATOR));
    for map in &trace.map_executions {
        let _ = writeln!(
            out,
            "map {}: {} iteration(s)",
            map.state,
            map.iteration_paths.len()
        );
    }
    for parallel in &trace.parallel_executions {
        let _ = writeln!(
            out,
            "parallel {}: {} branch(es)",
            parallel.state,
            parallel.branch_paths.len()
        );
    }
    for retry in &trace.retries {
        let _ = writeln!(
            out,
            "retry {} #{} after {}: {}s",
            retry.state, retry.attempt, retry.error, retry.delay_seconds
        );
    }
    if trace.success {
        let pretty = serde_json::to_string_pretty(&trace.output)
            .unwrap_or_else(|_| trace.output.to_string());
        let _ = writeln!(out, "output:\n{}", pretty);
    }
    out
}
