//! Run report generation
//!
//! Groups recorded results into one suite per source and renders them as
//! plain text, JSON, or JUnit XML.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use testrelay_core::{HostTestResult, TestOutcome, TestResultMessage};

/// Output format for run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Pretty,
    Json,
    Junit,
}

/// Results of one run, grouped by source
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub not_found: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub success: bool,
    pub suites: Vec<SuiteReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    pub duration_ms: u64,
    pub cases: Vec<CaseReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub id: String,
    pub name: String,
    pub full_name: String,
    pub outcome: TestOutcome,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<TestResultMessage>,
}

impl SuiteReport {
    fn count(&self, outcome: TestOutcome) -> usize {
        self.cases.iter().filter(|c| c.outcome == outcome).count()
    }
}

impl From<&HostTestResult> for CaseReport {
    fn from(result: &HostTestResult) -> Self {
        Self {
            id: result.test_case.id.clone(),
            name: result.display_name.clone(),
            full_name: result.test_case.fully_qualified_name.clone(),
            outcome: result.outcome,
            duration_ms: result.duration.as_millis() as u64,
            error: result.error_message.clone(),
            stack_trace: result.error_stack_trace.clone(),
            messages: result.messages.clone(),
        }
    }
}

impl RunReport {
    /// Build a report from recorded results, in the order they were recorded
    pub fn from_results(results: &[HostTestResult], duration_ms: u64) -> Self {
        let mut suites: Vec<SuiteReport> = Vec::new();

        for result in results {
            let source = result.test_case.source.clone();
            let idx = match suites.iter().position(|s| s.source == source) {
                Some(idx) => idx,
                None => {
                    suites.push(SuiteReport {
                        name: suite_name(source.as_deref()),
                        source,
                        duration_ms: 0,
                        cases: Vec::new(),
                    });
                    suites.len() - 1
                }
            };
            let case = CaseReport::from(result);
            suites[idx].duration_ms += case.duration_ms;
            suites[idx].cases.push(case);
        }

        let count = |outcome| results.iter().filter(|r| r.outcome == outcome).count();
        let failed = count(TestOutcome::Failed);
        Self {
            total: results.len(),
            passed: count(TestOutcome::Passed),
            failed,
            skipped: count(TestOutcome::Skipped),
            not_found: count(TestOutcome::NotFound),
            duration_ms,
            started_at: results.iter().map(|r| r.start_time).min(),
            success: failed == 0,
            suites,
        }
    }
}

fn suite_name(source: Option<&Path>) -> String {
    source
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown source)".to_string())
}

/// Report generator for various formats
pub struct ReportGenerator;

impl ReportGenerator {
    /// Generate report in the specified format
    pub fn generate(report: &RunReport, format: ReportFormat) -> String {
        match format {
            ReportFormat::Pretty => Self::generate_pretty(report),
            ReportFormat::Json => Self::generate_json(report),
            ReportFormat::Junit => Self::generate_junit(report),
        }
    }

    /// Generate human-readable output
    pub fn generate_pretty(report: &RunReport) -> String {
        let rule = "═".repeat(63);
        let mut output = String::new();

        output.push('\n');
        output.push_str(&rule);
        output.push_str("\n                         TEST RESULTS\n");
        output.push_str(&rule);
        output.push_str("\n\n");

        for suite in &report.suites {
            output.push_str(&format!("  {} ({} tests)\n", suite.name, suite.cases.len()));
            output.push_str(&format!("  {}\n", "─".repeat(61)));

            for case in &suite.cases {
                let icon = match case.outcome {
                    TestOutcome::Passed => "✓",
                    TestOutcome::Failed => "✗",
                    TestOutcome::Skipped => "○",
                    TestOutcome::NotFound => "?",
                };
                output.push_str(&format!(
                    "    {} {} ({}ms)\n",
                    icon, case.full_name, case.duration_ms
                ));

                if let Some(error) = &case.error {
                    for line in error.lines() {
                        output.push_str(&format!("        {}\n", line));
                    }
                }
            }
            output.push('\n');
        }

        output.push_str(&rule);
        output.push_str(&format!(
            "\n  SUMMARY: {} passed, {} failed, {} skipped, {} not found ({}ms)\n",
            report.passed, report.failed, report.skipped, report.not_found, report.duration_ms
        ));
        output.push_str(&rule);
        output.push('\n');

        if report.success {
            output.push_str("\n  ✓ All tests passed!\n\n");
        } else {
            output.push_str("\n  ✗ Some tests failed.\n\n");
        }

        output
    }

    /// Generate JSON output
    pub fn generate_json(report: &RunReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    /// Generate JUnit XML output
    pub fn generate_junit(report: &RunReport) -> String {
        let mut xml = String::new();

        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!(
            "<testsuites name=\"testrelay\" tests=\"{}\" failures=\"{}\" errors=\"0\" skipped=\"{}\" time=\"{:.3}\">\n",
            report.total,
            report.failed,
            report.skipped + report.not_found,
            seconds(report.duration_ms)
        ));

        for suite in &report.suites {
            xml.push_str(&format!(
                "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"0\" skipped=\"{}\" time=\"{:.3}\">\n",
                escape_xml(&suite.name),
                suite.cases.len(),
                suite.count(TestOutcome::Failed),
                suite.count(TestOutcome::Skipped) + suite.count(TestOutcome::NotFound),
                seconds(suite.duration_ms)
            ));

            for case in &suite.cases {
                let open = format!(
                    "    <testcase name=\"{}\" classname=\"{}\" time=\"{:.3}\"",
                    escape_xml(&case.name),
                    escape_xml(&classname(&case.full_name, &suite.name)),
                    seconds(case.duration_ms)
                );
                match case.outcome {
                    TestOutcome::Passed => {
                        xml.push_str(&open);
                        xml.push_str("/>\n");
                    }
                    TestOutcome::Failed => {
                        let error = case.error.clone().unwrap_or_default();
                        let message = error.lines().next().unwrap_or("Test failed");
                        let mut content = error.clone();
                        if let Some(trace) = &case.stack_trace {
                            content.push('\n');
                            content.push_str(trace);
                        }
                        xml.push_str(&open);
                        xml.push_str(">\n");
                        xml.push_str(&format!(
                            "      <failure message=\"{}\" type=\"TestFailure\">{}</failure>\n",
                            escape_xml(message),
                            escape_xml(&content)
                        ));
                        xml.push_str("    </testcase>\n");
                    }
                    TestOutcome::Skipped => {
                        xml.push_str(&open);
                        xml.push_str(">\n      <skipped/>\n    </testcase>\n");
                    }
                    TestOutcome::NotFound => {
                        xml.push_str(&open);
                        xml.push_str(">\n      <skipped message=\"not found\"/>\n    </testcase>\n");
                    }
                }
            }

            xml.push_str("  </testsuite>\n");
        }

        xml.push_str("</testsuites>\n");
        xml
    }

    /// Write report to file
    pub fn write_to_file(report: &RunReport, format: ReportFormat, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, Self::generate(report, format))
    }
}

fn seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

/// Dotted parent path of a test, e.g. `calc.Arith` for `calc/Arith/adds`
fn classname(full_name: &str, fallback: &str) -> String {
    match full_name.rsplit_once('/') {
        Some((parent, _)) => parent.replace('/', "."),
        None => fallback.to_string(),
    }
}

/// Escape special XML characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use testrelay_core::HostTestCase;

    fn result(full_name: &str, source: &str, outcome: TestOutcome, error: Option<&str>) -> HostTestResult {
        let case = HostTestCase::new(full_name, full_name, "executor://testrelay/adapter/v1")
            .with_source(source);
        let now = Utc::now();
        HostTestResult {
            test_case: Arc::new(case),
            display_name: full_name.rsplit('/').next().unwrap_or(full_name).to_string(),
            outcome,
            start_time: now,
            end_time: now,
            duration: Duration::from_millis(12),
            error_message: error.map(String::from),
            error_stack_trace: error.map(|_| "  0: calc::divides".to_string()),
            error_line_number: None,
            messages: Vec::new(),
        }
    }

    fn sample_report() -> RunReport {
        let results = vec![
            result("calc/Arith/adds", "bin/calc.toml", TestOutcome::Passed, None),
            result(
                "calc/Arith/divides",
                "bin/calc.toml",
                TestOutcome::Failed,
                Some("Expected <1>, got 0"),
            ),
            result("smoke/boots", "bin/smoke.yaml", TestOutcome::Skipped, None),
            result("smoke/gone", "bin/smoke.yaml", TestOutcome::NotFound, None),
        ];
        RunReport::from_results(&results, 1234)
    }

    #[test]
    fn test_suites_grouped_by_source() {
        let report = sample_report();
        let suites: Vec<(&str, usize, u64)> = report
            .suites
            .iter()
            .map(|s| (s.name.as_str(), s.cases.len(), s.duration_ms))
            .collect();
        assert_eq!(suites, vec![("calc", 2, 24), ("smoke", 2, 24)]);
        assert_eq!(
            (report.total, report.passed, report.failed, report.skipped, report.not_found),
            (4, 1, 1, 1, 1)
        );
        assert!(!report.success);
    }

    #[test]
    fn test_json_output() {
        let json = ReportGenerator::generate_json(&sample_report());

        assert!(json.contains("\"passed\": 1"));
        assert!(json.contains("\"failed\": 1"));
        assert!(json.contains("\"outcome\": \"notfound\""));
        assert!(json.contains("\"success\": false"));
    }

    #[test]
    fn test_junit_output() {
        let xml = ReportGenerator::generate_junit(&sample_report());

        assert!(xml.contains("<?xml version=\"1.0\""));
        assert!(xml.contains("tests=\"4\""));
        assert!(xml.contains("<testsuite name=\"calc\" tests=\"2\" failures=\"1\""));
        assert!(xml.contains("classname=\"calc.Arith\""));
        assert!(xml.contains("<failure message=\"Expected &lt;1&gt;, got 0\""));
        assert!(xml.contains("  0: calc::divides</failure>"));
        assert!(xml.contains("<skipped/>"));
        assert!(xml.contains("<skipped message=\"not found\"/>"));
    }

    #[test]
    fn test_pretty_output() {
        let pretty = ReportGenerator::generate_pretty(&sample_report());

        assert!(pretty.contains("TEST RESULTS"));
        assert!(pretty.contains("calc (2 tests)"));
        assert!(pretty.contains("1 passed"));
        assert!(pretty.contains("1 failed"));
        assert!(pretty.contains("Some tests failed"));
    }

    #[test]
    fn test_unknown_source_suite() {
        let mut orphan = result("x/y", "ignored", TestOutcome::Passed, None);
        Arc::make_mut(&mut orphan.test_case).source = None;
        let report = RunReport::from_results(&[orphan], 0);
        assert_eq!(report.suites[0].name, "(unknown source)");
        assert!(report.success);
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("<test>"), "&lt;test&gt;");
        assert_eq!(escape_xml("a & b"), "a &amp; b");
        assert_eq!(escape_xml("\"quoted\""), "&quot;quoted&quot;");
    }
}
