//! JUnit XML for CI integration.

use stepcheck_runner::{SuiteResult, TestStatus};

use super::failure_lines;

pub(crate) fn render(result: &SuiteResult) -> String {
    let summary = &result.summary;
    let mut xml = String::new();

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(
        r#"<testsuite name="{}" tests="{}" failures="{}" skipped="{}" time="{}">"#,
        escape_xml(&result.suite_name),
        summary.total,
        summary.failed,
        summary.skipped,
        seconds(summary.duration_ms)
    ));
    xml.push('\n');

    for test in &result.results {
        xml.push_str(&format!(
            r#"  <testcase name="{}" classname="{}" time="{}">"#,
            escape_xml(&test.name),
            escape_xml(&result.suite_name),
            seconds(test.duration_ms)
        ));
        xml.push('\n');

        match test.status {
            TestStatus::Passed => {}
            TestStatus::Failed => {
                let headline = test
                    .failures
                    .first()
                    .map(|f| f.message.as_str())
                    .unwrap_or("failed");
                xml.push_str(&format!(
                    r#"    <failure message="{}">{}</failure>"#,
                    escape_xml(headline),
                    escape_xml(&failure_lines(test).join("\n"))
                ));
                xml.push('\n');
            }
            TestStatus::Skipped => {
                xml.push_str(&format!(
                    r#"    <skipped message="{}"/>"#,
                    escape_xml(test.skip_reason.as_deref().unwrap_or("skipped"))
                ));
                xml.push('\n');
            }
        }

        xml.push_str("  </testcase>\n");
    }

    xml.push_str("</testsuite>\n");
    xml
}

fn seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
