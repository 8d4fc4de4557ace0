//! Execution contracts: launcher, step runs, and the run-event stream

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::descriptor::TestDescriptor;
use super::filter::FilterSet;
use super::framework::{AssemblyLoader, TestFrameworkManager};
use super::markup::StructuredLog;
use crate::cancel::CancellationHandle;
use crate::error::EngineResult;

/// Status the engine assigns to a finished step
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Inconclusive,
    /// A status name this model does not know
    Unknown(String),
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => f.write_str("passed"),
            Self::Failed => f.write_str("failed"),
            Self::Skipped => f.write_str("skipped"),
            Self::Inconclusive => f.write_str("inconclusive"),
            Self::Unknown(name) => write!(f, "unknown ({})", name),
        }
    }
}

/// Outcome and timing of a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub status: TestStatus,
    /// Optional refinement such as "ignored" or "timeout"
    pub category: Option<String>,
    pub duration: Duration,
    pub assert_count: u32,
}

impl StepResult {
    pub fn new(status: TestStatus, duration: Duration) -> Self {
        Self {
            status,
            category: None,
            duration,
            assert_count: 0,
        }
    }
}

/// A unit of execution. Each test runs as one primary step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestStep {
    pub id: String,
    pub name: String,
    pub full_name: String,
    /// Identifier of the descriptor this step executes
    pub test_id: String,
    pub is_primary: bool,
    pub is_test_case: bool,
}

/// Record of one executed step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestStepRun {
    pub step: TestStep,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub result: StepResult,
    pub test_log: StructuredLog,
}

/// Raised when a step begins
#[derive(Debug, Clone)]
pub struct StepStartedEvent {
    pub test: Arc<TestDescriptor>,
    pub step_run: TestStepRun,
}

/// Raised when a step completes
#[derive(Debug, Clone)]
pub struct StepFinishedEvent {
    pub test: Arc<TestDescriptor>,
    pub step_run: TestStepRun,
}

/// Subscriber attached to a launch.
///
/// The engine calls these synchronously, in order, as steps start and finish.
/// An error aborts the run and is returned from [`TestLauncher::run`].
pub trait RunExtension: Send + Sync {
    fn on_step_started(&self, event: &StepStartedEvent) -> EngineResult<()>;

    fn on_step_finished(&self, event: &StepFinishedEvent) -> EngineResult<()>;
}

/// Totals reported by a completed launch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub inconclusive: usize,
    pub duration: Duration,
}

impl LaunchSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.inconclusive
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }

    /// Count one finished test case
    pub fn record(&mut self, status: &TestStatus) {
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed | TestStatus::Unknown(_) => self.failed += 1,
            TestStatus::Skipped => self.skipped += 1,
            TestStatus::Inconclusive => self.inconclusive += 1,
        }
    }
}

/// One configured execution of the engine
#[async_trait]
pub trait TestLauncher: Send {
    /// Add a file (or glob) naming binaries to load and run
    fn add_file_pattern(&mut self, pattern: &str);

    /// Only run tests accepted by `filter_set`
    fn set_filter_set(&mut self, filter_set: FilterSet);

    /// Run tests inside an isolated execution boundary
    fn set_isolated(&mut self, isolated: bool);

    fn add_run_extension(&mut self, extension: Arc<dyn RunExtension>);

    /// Handle that stops this launch cooperatively
    fn cancellation(&self) -> CancellationHandle;

    async fn run(&mut self) -> EngineResult<LaunchSummary>;
}

/// Entry point to an external engine's services
pub trait TestEngine: Send + Sync {
    fn framework_manager(&self) -> &dyn TestFrameworkManager;

    /// Fresh non-locking loader for one discovery request
    fn assembly_loader(&self) -> Box<dyn AssemblyLoader>;

    /// Fresh launcher for one execution request
    fn launcher(&self) -> Box<dyn TestLauncher>;
}
