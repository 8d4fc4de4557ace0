//! Step run to host result translation

use std::sync::Arc;

use testrelay_core::engine::markup::{markers, streams, walk};
use testrelay_core::engine::{MarkupTag, StructuredLog, TagVisitor, TestDescriptor, TestStatus, TestStepRun};
use testrelay_core::{HostTestCase, HostTestResult, TestOutcome, TestResultMessage};

use crate::error::{RelayError, Result};

/// Builds host results from finished step runs
pub trait TestResultBuilder: Send + Sync {
    fn build_test_result(
        &self,
        test: &TestDescriptor,
        step_run: &TestStepRun,
        test_case: Arc<HostTestCase>,
    ) -> Result<HostTestResult>;
}

/// Default [`TestResultBuilder`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultTranslator;

impl TestResultBuilder for ResultTranslator {
    fn build_test_result(
        &self,
        test: &TestDescriptor,
        step_run: &TestStepRun,
        test_case: Arc<HostTestCase>,
    ) -> Result<HostTestResult> {
        let outcome = map_outcome(&step_run.result.status, &test.id)?;
        let log = &step_run.test_log;

        Ok(HostTestResult {
            test_case,
            display_name: test.name.clone(),
            outcome,
            start_time: step_run.start_time,
            end_time: step_run.end_time,
            duration: step_run.result.duration,
            error_message: error_message(log),
            error_stack_trace: stack_trace(log),
            error_line_number: test.code_location.as_ref().and_then(|loc| loc.line),
            messages: result_messages(log),
        })
    }
}

/// Map an engine status onto the host outcome.
///
/// The host has no inconclusive outcome, so inconclusive becomes not-found.
/// Any status outside the known four is an error.
pub fn map_outcome(status: &TestStatus, test_id: &str) -> Result<TestOutcome> {
    match status {
        TestStatus::Passed => Ok(TestOutcome::Passed),
        TestStatus::Failed => Ok(TestOutcome::Failed),
        TestStatus::Skipped => Ok(TestOutcome::Skipped),
        TestStatus::Inconclusive => Ok(TestOutcome::NotFound),
        TestStatus::Unknown(_) => Err(RelayError::UnexpectedStatus {
            test_id: test_id.to_string(),
            status: status.to_string(),
        }),
    }
}

/// Plain text of the failures stream
pub fn error_message(log: &StructuredLog) -> Option<String> {
    let text = log.get_stream(streams::FAILURES)?.to_plain_text();
    (!text.trim().is_empty()).then_some(text)
}

/// Text of every stack-trace marker in the failures stream, concatenated
pub fn stack_trace(log: &StructuredLog) -> Option<String> {
    let failures = log.get_stream(streams::FAILURES)?;
    let mut hunter = StackTraceHunter::default();
    walk(&mut hunter, &failures.body);
    (!hunter.trace.is_empty()).then_some(hunter.trace)
}

/// Collects text found inside stack-trace markers
#[derive(Debug, Default)]
struct StackTraceHunter {
    trace: String,
    depth: usize,
}

impl TagVisitor for StackTraceHunter {
    fn visit_text(&mut self, text: &str) {
        if self.depth > 0 {
            self.trace.push_str(text);
        }
    }

    fn visit_marker(&mut self, class: &str, contents: &[MarkupTag]) {
        let is_trace = class == markers::STACK_TRACE;
        if is_trace {
            self.depth += 1;
        }
        walk(self, contents);
        if is_trace {
            self.depth -= 1;
        }
    }
}

/// Host message category for an engine stream
fn message_category(stream: &str) -> Option<&'static str> {
    match stream {
        streams::CONSOLE_OUTPUT => Some(TestResultMessage::STANDARD_OUT),
        streams::CONSOLE_ERROR => Some(TestResultMessage::STANDARD_ERROR),
        streams::WARNINGS | streams::DEBUG_TRACE | streams::DEFAULT => {
            Some(TestResultMessage::ADDITIONAL_INFO)
        }
        _ => None,
    }
}

fn result_messages(log: &StructuredLog) -> Vec<TestResultMessage> {
    log.streams
        .iter()
        .filter_map(|stream| {
            let category = message_category(&stream.name)?;
            let text = stream.to_plain_text();
            (!text.is_empty()).then(|| TestResultMessage::new(category, text))
        })
        .collect()
}
