//! Console host
//!
//! The CLI plays the host platform: it supplies the message log, the
//! discovery sink, the execution recorder, and the run context the adapter
//! reports into.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use console::style;
use testrelay_core::{
    DiscoverySink, ExecutionRecorder, HostTestCase, HostTestResult, MessageLevel, MessageLogger,
    RunContext, TestOutcome,
};
use tracing::debug;

use crate::cli::output;

/// Host message log printing to stderr
#[derive(Debug, Clone, Copy)]
pub struct ConsoleLogger {
    /// Print informational messages too
    pub verbose: bool,
    /// Print nothing below error level
    pub quiet: bool,
}

impl ConsoleLogger {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    fn shows(&self, level: MessageLevel) -> bool {
        match level {
            MessageLevel::Error => true,
            MessageLevel::Warning => !self.quiet,
            MessageLevel::Informational => self.verbose && !self.quiet,
        }
    }
}

impl MessageLogger for ConsoleLogger {
    fn send_message(&self, level: MessageLevel, message: &str) {
        if self.shows(level) {
            output::message(level, message);
        }
    }
}

/// Discovery sink keeping every published case in order
#[derive(Debug, Default)]
pub struct CollectingSink {
    cases: Mutex<Vec<Arc<HostTestCase>>>,
}

impl CollectingSink {
    pub fn cases(&self) -> Vec<Arc<HostTestCase>> {
        self.cases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DiscoverySink for CollectingSink {
    fn send_test_case(&self, test_case: Arc<HostTestCase>) {
        debug!(id = %test_case.id, name = %test_case.fully_qualified_name, "test case discovered");
        self.cases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(test_case);
    }
}

/// Execution recorder that collects results and optionally prints a line
/// per finished test
#[derive(Debug)]
pub struct ConsoleRecorder {
    logger: ConsoleLogger,
    live: bool,
    results: Mutex<Vec<HostTestResult>>,
}

impl ConsoleRecorder {
    pub fn new(logger: ConsoleLogger, live: bool) -> Self {
        Self {
            logger,
            live,
            results: Mutex::new(Vec::new()),
        }
    }

    pub fn results(&self) -> Vec<HostTestResult> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn print_result(result: &HostTestResult) {
        let name = match result.outcome {
            TestOutcome::Failed => style(&result.test_case.fully_qualified_name).red(),
            _ => style(&result.test_case.fully_qualified_name),
        };
        println!(
            "  {} {} {}",
            output::outcome_icon(result.outcome),
            name,
            style(format!("({}ms)", result.duration.as_millis())).dim()
        );
        if let Some(message) = &result.error_message {
            for line in message.lines().take(5) {
                println!("      {}", style(line).red().dim());
            }
        }
    }
}

impl MessageLogger for ConsoleRecorder {
    fn send_message(&self, level: MessageLevel, message: &str) {
        self.logger.send_message(level, message);
    }
}

impl ExecutionRecorder for ConsoleRecorder {
    fn record_start(&self, test_case: &Arc<HostTestCase>) {
        debug!(id = %test_case.id, "test started");
    }

    fn record_result(&self, result: HostTestResult) {
        if self.live {
            Self::print_result(&result);
        }
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result);
    }

    fn record_end(&self, test_case: &Arc<HostTestCase>, outcome: TestOutcome) {
        debug!(id = %test_case.id, %outcome, "test ended");
    }
}

/// Run context built from command-line flags
#[derive(Debug, Clone, Copy, Default)]
pub struct CliRunContext {
    pub isolated: bool,
}

impl RunContext for CliRunContext {
    fn in_isolation(&self) -> bool {
        self.isolated
    }
}

/// Write discovered cases so a later `run --cases` can replay them
pub fn write_cases(path: &Path, cases: &[Arc<HostTestCase>]) -> anyhow::Result<()> {
    let plain: Vec<&HostTestCase> = cases.iter().map(Arc::as_ref).collect();
    let json = serde_json::to_string_pretty(&plain)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read cases written by [`write_cases`]
pub fn read_cases(path: &Path) -> anyhow::Result<Vec<Arc<HostTestCase>>> {
    let content = std::fs::read_to_string(path)?;
    let cases: Vec<HostTestCase> = serde_json::from_str(&content)?;
    Ok(cases.into_iter().map(Arc::new).collect())
}
