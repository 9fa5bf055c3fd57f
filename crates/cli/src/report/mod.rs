//! Suite and trace renderers. Pure formatting over the runner's result types.

mod junit;
mod tap;
mod text;

use clap::ValueEnum;
use serde::Serialize;
use stepcheck_runner::{SuiteResult, TestResult};

pub(crate) use text::render_trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Reporter {
    Text,
    Json,
    Junit,
    Tap,
}

pub(crate) fn render_suite(reporter: Reporter, result: &SuiteResult) -> String {
    match reporter {
        Reporter::Text => text::render_suite(result),
        Reporter::Json => to_pretty_json(result),
        Reporter::Junit => junit::render(result),
        Reporter::Tap => tap::render(result),
    }
}

pub(crate) fn to_pretty_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .map(|mut s| {
            s.push('\n');
            s
        })
        .unwrap_or_else(|e| format!("{{\"error\": \"serialization error: {}\"}}\n", e))
}

/// One line per assertion failure, with expected/actual when recorded.
pub(crate) fn failure_lines(result: &TestResult) -> Vec<String> {
    let mut lines = Vec::new();
    for failure in &result.failures {
        lines.push(failure.message.clone());
        if let Some(expected) = &failure.expected {
            lines.push(format!("  expected: {}", expected));
        }
        if let Some(actual) = &failure.actual {
            lines.push(format!("  actual:   {}", actual));
        }
    }
    lines
}
