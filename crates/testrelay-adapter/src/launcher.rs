//! Execution launcher
//!
//! Turns a host execution request into one engine launch: file patterns, an
//! optional id filter, isolation, and the run-event listener.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use testrelay_core::config::ExecutionConfig;
use testrelay_core::engine::{FilterSet, LaunchSummary, TestEngine, TestLauncher};
use testrelay_core::{
    CancellationHandle, ExecutionRecorder, HostTestCase, MessageLevel, MessageLogger, PropertyKeys,
    RunContext,
};
use tracing::{debug, info, instrument, warn};

use crate::cases::{CachingCaseBuilder, SourceSet};
use crate::error::Result;
use crate::listener::RunEventListener;
use crate::results::TestResultBuilder;

/// Runs tests through the engine and relays results to the host
pub struct ExecutionLauncher {
    engine: Arc<dyn TestEngine>,
    cases: Arc<CachingCaseBuilder>,
    results: Arc<dyn TestResultBuilder>,
    keys: PropertyKeys,
    settings: ExecutionConfig,
    /// Cancellation handles of launches in flight
    active: Mutex<Vec<CancellationHandle>>,
}

impl ExecutionLauncher {
    pub fn new(
        engine: Arc<dyn TestEngine>,
        cases: Arc<CachingCaseBuilder>,
        results: Arc<dyn TestResultBuilder>,
        keys: PropertyKeys,
        settings: ExecutionConfig,
    ) -> Self {
        Self {
            engine,
            cases,
            results,
            keys,
            settings,
            active: Mutex::new(Vec::new()),
        }
    }

    /// Run every test in `sources`
    #[instrument(skip_all, fields(sources = sources.len()))]
    pub async fn run_sources(
        &self,
        sources: SourceSet,
        context: &dyn RunContext,
        recorder: Arc<dyn ExecutionRecorder>,
    ) -> Result<LaunchSummary> {
        let mut launcher = self.engine.launcher();
        for source in sources.iter() {
            launcher.add_file_pattern(&source.to_string_lossy());
        }
        self.launch(launcher, sources, context, recorder).await
    }

    /// Run only the selected, previously discovered cases.
    ///
    /// The cases seed the identity cache first so results are reported
    /// against the exact objects the host supplied.
    #[instrument(skip_all, fields(cases = cases.len()))]
    pub async fn run_cases(
        &self,
        cases: &[Arc<HostTestCase>],
        context: &dyn RunContext,
        recorder: Arc<dyn ExecutionRecorder>,
    ) -> Result<LaunchSummary> {
        self.cases.add_test_cases(cases);

        if cases.is_empty() {
            debug!("no test cases selected");
            return Ok(LaunchSummary::default());
        }

        let patterns = self.file_patterns(cases, recorder.as_ref());
        let filter = self.build_filter(cases);
        debug!(filter = %filter, patterns = patterns.len(), "prepared selected-case launch");

        let mut launcher = self.engine.launcher();
        for pattern in &patterns {
            launcher.add_file_pattern(&pattern.to_string_lossy());
        }
        launcher.set_filter_set(filter);

        self.launch(launcher, SourceSet::new(patterns), context, recorder)
            .await
    }

    /// Filter accepting exactly the engine ids of `cases`
    pub fn build_filter(&self, cases: &[Arc<HostTestCase>]) -> FilterSet {
        let mut seen = HashSet::new();
        let ids: Vec<String> = cases
            .iter()
            .map(|case| self.cases.identity_key(case))
            .filter(|id| seen.insert(id.clone()))
            .collect();
        FilterSet::for_ids(ids)
    }

    /// Owning sources of `cases`, first occurrence order, without duplicates
    pub fn file_patterns<L>(&self, cases: &[Arc<HostTestCase>], logger: &L) -> Vec<PathBuf>
    where
        L: MessageLogger + ?Sized,
    {
        let mut seen = HashSet::new();
        let mut patterns = Vec::new();
        for case in cases {
            let source = case
                .property_str(&self.keys.source_path)
                .map(PathBuf::from)
                .or_else(|| case.source.clone());

            match source {
                Some(path) => {
                    if seen.insert(path.clone()) {
                        patterns.push(path);
                    }
                }
                None => {
                    warn!(test_id = %case.id, "test case has no source; it will not be loaded");
                    logger.send_message(
                        MessageLevel::Warning,
                        &format!("Test case {} has no source and will not be run", case.id),
                    );
                }
            }
        }
        patterns
    }

    async fn launch(
        &self,
        mut launcher: Box<dyn TestLauncher>,
        sources: SourceSet,
        context: &dyn RunContext,
        recorder: Arc<dyn ExecutionRecorder>,
    ) -> Result<LaunchSummary> {
        let isolated = context.in_isolation() || self.settings.force_isolation;
        launcher.set_isolated(isolated);
        launcher.add_run_extension(Arc::new(RunEventListener::new(
            recorder,
            Arc::clone(&self.cases),
            Arc::clone(&self.results),
            sources,
        )));

        let handle = launcher.cancellation();
        self.active().push(handle.clone());

        debug!(isolated, "starting launch");
        let outcome = launcher.run().await;
        self.active().retain(|other| !other.same_handle(&handle));

        let summary = outcome?;
        info!(
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            inconclusive = summary.inconclusive,
            duration_ms = summary.duration.as_millis() as u64,
            "launch complete"
        );
        Ok(summary)
    }

    fn active(&self) -> MutexGuard<'_, Vec<CancellationHandle>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask every running launch to stop. No-op when nothing is running.
    pub fn cancel(&self) {
        let active = std::mem::take(&mut *self.active());
        if active.is_empty() {
            debug!("cancel requested with no active launch");
            return;
        }
        info!(launches = active.len(), "cancelling launches");
        for handle in active {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::CaseTranslator;
    use crate::results::ResultTranslator;
    use crate::testing::{FakeEngine, RecordingRecorder, TestRunContext};
    use testrelay_core::engine::{TestDescriptor, TestStatus};
    use testrelay_core::{PropertyValue, TestOutcome};

    const URI: &str = "executor://x";

    fn tree() -> TestDescriptor {
        TestDescriptor::new("calc", "calc", "calc")
            .with_child(TestDescriptor::new("id1", "adds", "calc/adds").test_case())
            .with_child(TestDescriptor::new("id2", "subs", "calc/subs").test_case())
            .with_child(TestDescriptor::new("id3", "divs", "calc/divs").test_case())
    }

    fn launcher_for(engine: Arc<FakeEngine>, settings: ExecutionConfig) -> ExecutionLauncher {
        let keys = PropertyKeys::default();
        let cases = Arc::new(CachingCaseBuilder::new(
            Arc::new(CaseTranslator::new(URI, keys.clone())),
            keys.clone(),
        ));
        ExecutionLauncher::new(engine, cases, Arc::new(ResultTranslator), keys, settings)
    }

    fn host_case(id: &str, source: &str) -> Arc<HostTestCase> {
        let keys = PropertyKeys::default();
        Arc::new(
            HostTestCase::new(id, id, URI)
                .with_property(&keys.test_id, PropertyValue::Str(id.to_string()))
                .with_property(&keys.source_path, PropertyValue::Str(source.to_string())),
        )
    }

    #[test]
    fn test_filter_accepts_selected_ids_only() {
        let launcher = launcher_for(Arc::new(FakeEngine::new(tree())), ExecutionConfig::default());
        let filter = launcher.build_filter(&[host_case("id1", "a.dll"), host_case("id2", "a.dll")]);

        let accepts = |id: &str| filter.is_match(&TestDescriptor::new(id, id, id).test_case());
        assert!(accepts("id1"));
        assert!(accepts("id2"));
        assert!(!accepts("id3"));
        assert!(!accepts("id10"));
    }

    #[test]
    fn test_file_patterns_deduplicated() {
        let launcher = launcher_for(Arc::new(FakeEngine::new(tree())), ExecutionConfig::default());
        let recorder = RecordingRecorder::default();
        let orphan = Arc::new(HostTestCase::new("id9", "orphan", URI));
        let patterns = launcher.file_patterns(
            &[
                host_case("id1", "a.dll"),
                host_case("id2", "b.dll"),
                host_case("id3", "a.dll"),
                orphan,
            ],
            &recorder,
        );

        assert_eq!(patterns, vec![PathBuf::from("a.dll"), PathBuf::from("b.dll")]);
        assert_eq!(recorder.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_run_sources_without_filter() {
        let engine = Arc::new(FakeEngine::new(tree()));
        let launcher = launcher_for(Arc::clone(&engine), ExecutionConfig::default());
        let recorder = Arc::new(RecordingRecorder::default());

        let summary = launcher
            .run_sources(
                SourceSet::new(["calc.dll"]),
                &TestRunContext::default(),
                recorder.clone(),
            )
            .await
            .unwrap();

        assert_eq!(summary.passed, 3);
        let record = engine.last_launch().unwrap();
        assert_eq!(record.file_patterns, vec!["calc.dll".to_string()]);
        assert!(record.filter.is_none());
        assert_eq!(recorder.outcomes().len(), 3);
    }

    #[tokio::test]
    async fn test_run_cases_only_runs_selection() {
        let engine = Arc::new(FakeEngine::new(tree()));
        let launcher = launcher_for(Arc::clone(&engine), ExecutionConfig::default());
        let recorder = Arc::new(RecordingRecorder::default());
        let selected = vec![host_case("id1", "calc.dll"), host_case("id3", "calc.dll")];

        let summary = launcher
            .run_cases(&selected, &TestRunContext::default(), recorder.clone())
            .await
            .unwrap();

        assert_eq!(summary.total(), 2);
        let outcomes = recorder.outcomes();
        assert_eq!(outcomes.len(), 2);
        assert!(Arc::ptr_eq(&outcomes[0].0, &selected[0]));
        assert!(Arc::ptr_eq(&outcomes[1].0, &selected[1]));

        let record = engine.last_launch().unwrap();
        assert_eq!(record.file_patterns, vec!["calc.dll".to_string()]);
        assert_eq!(
            record.filter.unwrap().to_string(),
            "include Id: 'id1', 'id3'"
        );
    }

    #[tokio::test]
    async fn test_empty_selection_does_not_launch() {
        let engine = Arc::new(FakeEngine::new(tree()));
        let launcher = launcher_for(Arc::clone(&engine), ExecutionConfig::default());
        let recorder = Arc::new(RecordingRecorder::default());

        let summary = launcher
            .run_cases(&[], &TestRunContext::default(), recorder)
            .await
            .unwrap();

        assert_eq!(summary, LaunchSummary::default());
        assert!(engine.last_launch().is_none());
    }

    #[tokio::test]
    async fn test_isolation_from_context_or_config() {
        let engine = Arc::new(FakeEngine::new(tree()));
        let recorder = Arc::new(RecordingRecorder::default());

        let launcher = launcher_for(Arc::clone(&engine), ExecutionConfig::default());
        launcher
            .run_sources(
                SourceSet::new(["calc.dll"]),
                &TestRunContext { isolated: true },
                recorder.clone(),
            )
            .await
            .unwrap();
        assert!(engine.last_launch().unwrap().isolated);

        let launcher = launcher_for(
            Arc::clone(&engine),
            ExecutionConfig {
                force_isolation: true,
            },
        );
        launcher
            .run_sources(
                SourceSet::new(["calc.dll"]),
                &TestRunContext::default(),
                recorder,
            )
            .await
            .unwrap();
        assert!(engine.last_launch().unwrap().isolated);
    }

    #[tokio::test]
    async fn test_engine_error_propagates() {
        let engine = Arc::new(FakeEngine::new(tree()).with_run_error("engine crashed"));
        let launcher = launcher_for(Arc::clone(&engine), ExecutionConfig::default());
        let recorder = Arc::new(RecordingRecorder::default());

        let err = launcher
            .run_sources(
                SourceSet::new(["calc.dll"]),
                &TestRunContext::default(),
                recorder,
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("engine crashed"));
    }

    #[tokio::test]
    async fn test_unexpected_status_aborts_run() {
        let engine = Arc::new(
            FakeEngine::new(tree()).with_status("id2", TestStatus::Unknown("Errored".into())),
        );
        let launcher = launcher_for(Arc::clone(&engine), ExecutionConfig::default());
        let recorder = Arc::new(RecordingRecorder::default());

        let err = launcher
            .run_sources(
                SourceSet::new(["calc.dll"]),
                &TestRunContext::default(),
                recorder.clone(),
            )
            .await
            .unwrap_err();

        assert!(err.unexpected_status().is_some());
        let outcomes = recorder.outcomes();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].1, TestOutcome::Passed);
    }

    #[test]
    fn test_cancel_without_launch_is_noop() {
        let launcher = launcher_for(Arc::new(FakeEngine::new(tree())), ExecutionConfig::default());
        launcher.cancel();
        launcher.cancel();
    }

    #[tokio::test]
    async fn test_cancel_stops_running_launch() {
        let engine = Arc::new(FakeEngine::new(tree()).with_step_delay_ms(50));
        let launcher = Arc::new(launcher_for(Arc::clone(&engine), ExecutionConfig::default()));
        let recorder = Arc::new(RecordingRecorder::default());

        let run = {
            let launcher = Arc::clone(&launcher);
            let recorder = recorder.clone();
            tokio::spawn(async move {
                launcher
                    .run_sources(
                        SourceSet::new(["calc.dll"]),
                        &TestRunContext::default(),
                        recorder,
                    )
                    .await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        launcher.cancel();
        let summary = run.await.unwrap().unwrap();

        assert!(summary.total() < 3);
        assert!(engine.last_launch().unwrap().cancelled);
    }

    #[tokio::test]
    async fn test_cancel_reaches_launch_outliving_another() {
        let engine = Arc::new(FakeEngine::new(tree()).with_step_delay_ms(100));
        let launcher = Arc::new(launcher_for(Arc::clone(&engine), ExecutionConfig::default()));

        let long = {
            let launcher = Arc::clone(&launcher);
            tokio::spawn(async move {
                launcher
                    .run_sources(
                        SourceSet::new(["calc.dll"]),
                        &TestRunContext::default(),
                        Arc::new(RecordingRecorder::default()),
                    )
                    .await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let short = launcher
            .run_cases(
                &[host_case("id1", "calc.dll")],
                &TestRunContext::default(),
                Arc::new(RecordingRecorder::default()),
            )
            .await
            .unwrap();
        assert_eq!(short.total(), 1);

        launcher.cancel();
        let summary = long.await.unwrap().unwrap();
        assert!(summary.total() < 3);
    }
}
