//! TAP (Test Anything Protocol) v14 output.

use std::fmt::Write as _;

use stepcheck_runner::{SuiteResult, TestStatus};

use super::failure_lines;

pub(crate) struct Tap {
    tests: Vec<TapTest>,
}

struct TapTest {
    ok: bool,
    desc: String,
    directive: Option<String>,
    diagnostics: Option<String>,
}

impl Tap {
    pub(crate) fn new() -> Self {
        Tap { tests: Vec::new() }
    }

    pub(crate) fn ok(&mut self, desc: impl Into<String>) {
        self.tests.push(TapTest {
            ok: true,
            desc: desc.into(),
            directive: None,
            diagnostics: None,
        });
    }

    pub(crate) fn not_ok(&mut self, desc: impl Into<String>, diagnostics: impl Into<String>) {
        self.tests.push(TapTest {
            ok: false,
            desc: desc.into(),
            directive: None,
            diagnostics: Some(diagnostics.into()),
        });
    }

    pub(crate) fn skip(&mut self, desc: impl Into<String>, reason: &str) {
        self.tests.push(TapTest {
            ok: true,
            desc: desc.into(),
            directive: Some(format!("SKIP {}", reason)),
            diagnostics: None,
        });
    }

    pub(crate) fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "TAP version 14");
        let _ = writeln!(out, "1..{}", self.tests.len());
        let mut pass = 0usize;
        let mut fail = 0usize;
        for (i, t) in self.tests.iter().enumerate() {
            let n = i + 1;
            let status = if t.ok { "ok" } else { "not ok" };
            match &t.directive {
                Some(directive) => {
                    let _ = writeln!(out, "{} {} - {} # {}", status, n, t.desc, directive);
                }
                None => {
                    let _ = writeln!(out, "{} {} - {}", status, n, t.desc);
                }
            }
            if t.ok {
                pass += 1;
            } else {
                fail += 1;
            }
            if let Some(diag) = &t.diagnostics {
                for line in diag.lines() {
                    let _ = writeln!(out, "  # {}", line);
                }
            }
        }
        let _ = writeln!(out, "# tests {}", self.tests.len());
        let _ = writeln!(out, "# pass  {}", pass);
        let _ = writeln!(out, "# fail  {}", fail);
        out
    }
}

pub(crate) fn render(result: &SuiteResult) -> String {
    let mut tap = Tap::new();
    for test in &result.results {
        match test.status {
            TestStatus::Passed => tap.ok(&test.name),
            TestStatus::Failed => tap.not_ok(&test.name, failure_lines(test).join("\n")),
            TestStatus::Skipped => {
                tap.skip(&test.name, test.skip_reason.as_deref().unwrap_or("skipped"))
            }
        }
    }
    tap.render()
}
