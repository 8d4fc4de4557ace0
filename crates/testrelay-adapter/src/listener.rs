//! Relays engine step events to the host recorder

use std::sync::Arc;

use testrelay_core::engine::{RunExtension, StepFinishedEvent, StepStartedEvent, TestStepRun};
use testrelay_core::{EngineError, EngineResult, ExecutionRecorder};
use tracing::{debug, trace};

use crate::cases::{CachingCaseBuilder, SourceSet};
use crate::results::TestResultBuilder;

/// Run extension attached to every launch.
///
/// Only steps that represent test cases are relayed. Events are forwarded
/// synchronously in the order the engine raises them.
pub struct RunEventListener {
    recorder: Arc<dyn ExecutionRecorder>,
    cases: Arc<CachingCaseBuilder>,
    results: Arc<dyn TestResultBuilder>,
    sources: SourceSet,
}

impl RunEventListener {
    pub fn new(
        recorder: Arc<dyn ExecutionRecorder>,
        cases: Arc<CachingCaseBuilder>,
        results: Arc<dyn TestResultBuilder>,
        sources: SourceSet,
    ) -> Self {
        Self {
            recorder,
            cases,
            results,
            sources,
        }
    }

    fn is_relayed(step_run: &TestStepRun) -> bool {
        step_run.step.is_test_case
    }
}

impl RunExtension for RunEventListener {
    fn on_step_started(&self, event: &StepStartedEvent) -> EngineResult<()> {
        if !Self::is_relayed(&event.step_run) {
            trace!(step = %event.step_run.step.full_name, "ignoring container step start");
            return Ok(());
        }

        let test_case = self.cases.get_test_case(&event.test, &self.sources);
        debug!(test_id = %event.test.id, "test started");
        self.recorder.record_start(&test_case);
        Ok(())
    }

    fn on_step_finished(&self, event: &StepFinishedEvent) -> EngineResult<()> {
        if !Self::is_relayed(&event.step_run) {
            trace!(step = %event.step_run.step.full_name, "ignoring container step finish");
            return Ok(());
        }

        let test_case = self.cases.get_test_case(&event.test, &self.sources);
        let result = self
            .results
            .build_test_result(&event.test, &event.step_run, Arc::clone(&test_case))
            .map_err(EngineError::extension)?;

        debug!(test_id = %event.test.id, outcome = %result.outcome, "test finished");
        self.recorder.record_end(&test_case, result.outcome);
        self.recorder.record_result(result);
        Ok(())
    }
}
