//! Host-facing adapter
//!
//! The host calls discovery and execution independently, possibly in either
//! order. [`TestRelayAdapter`] owns the one identity cache both go through.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use testrelay_core::engine::{LaunchSummary, TestEngine};
use testrelay_core::{
    Config, DiscoverySink, ExecutionRecorder, HostTestCase, MessageLogger, PropertyKeys,
    RunContext,
};
use tracing::debug;

use crate::cases::{CachingCaseBuilder, CaseTranslator, SourceSet, TestCaseBuilder};
use crate::discovery::TestExplorer;
use crate::error::Result;
use crate::launcher::ExecutionLauncher;
use crate::results::{ResultTranslator, TestResultBuilder};

/// Host contract for discovering tests
pub trait TestDiscoverer: Send + Sync {
    /// Publish every test case found in `sources` to `sink`
    fn discover_tests(&self, sources: &[PathBuf], logger: &dyn MessageLogger, sink: &dyn DiscoverySink);
}

/// Host contract for running tests
#[async_trait]
pub trait TestExecutor: Send + Sync {
    /// Run every test in `sources`
    async fn run_tests(
        &self,
        sources: &[PathBuf],
        context: &dyn RunContext,
        recorder: Arc<dyn ExecutionRecorder>,
    ) -> Result<LaunchSummary>;

    /// Run previously discovered cases
    async fn run_selected_tests(
        &self,
        cases: &[Arc<HostTestCase>],
        context: &dyn RunContext,
        recorder: Arc<dyn ExecutionRecorder>,
    ) -> Result<LaunchSummary>;

    /// Stop the running launch, if any
    fn cancel(&self);
}

/// Adapter between the host platform and one external engine
pub struct TestRelayAdapter {
    config: Config,
    keys: PropertyKeys,
    cases: Arc<CachingCaseBuilder>,
    explorer: TestExplorer,
    launcher: ExecutionLauncher,
}

impl TestRelayAdapter {
    /// Adapter with the default case and result builders
    pub fn new(engine: Arc<dyn TestEngine>, config: Config) -> Self {
        let keys = PropertyKeys::from_config(&config.adapter);
        let case_builder = Arc::new(CaseTranslator::new(
            config.adapter.executor_uri.clone(),
            keys,
        ));
        Self::with_builders(engine, config, case_builder, Arc::new(ResultTranslator))
    }

    /// Adapter with caller-supplied builders
    pub fn with_builders(
        engine: Arc<dyn TestEngine>,
        config: Config,
        case_builder: Arc<dyn TestCaseBuilder>,
        result_builder: Arc<dyn TestResultBuilder>,
    ) -> Self {
        let keys = PropertyKeys::from_config(&config.adapter);
        let cases = Arc::new(CachingCaseBuilder::new(case_builder, keys.clone()));
        let explorer = TestExplorer::new(
            Arc::clone(&engine),
            Arc::clone(&cases),
            config.discovery.clone(),
        );
        let launcher = ExecutionLauncher::new(
            engine,
            Arc::clone(&cases),
            result_builder,
            keys.clone(),
            config.execution.clone(),
        );

        debug!(executor_uri = %config.adapter.executor_uri, "adapter initialized");
        Self {
            config,
            keys,
            cases,
            explorer,
            launcher,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Property handles registered for this adapter
    pub fn keys(&self) -> &PropertyKeys {
        &self.keys
    }

    /// Canonical case for an engine id, if one was discovered or seeded
    pub fn cached_case(&self, test_id: &str) -> Option<Arc<HostTestCase>> {
        self.cases.cached(test_id)
    }

    /// Discover and return the number of published cases
    pub fn discover(
        &self,
        sources: &[PathBuf],
        logger: &dyn MessageLogger,
        sink: &dyn DiscoverySink,
    ) -> usize {
        self.explorer
            .discover_tests(&SourceSet::new(sources.iter().cloned()), logger, sink)
    }
}

impl TestDiscoverer for TestRelayAdapter {
    fn discover_tests(&self, sources: &[PathBuf], logger: &dyn MessageLogger, sink: &dyn DiscoverySink) {
        self.discover(sources, logger, sink);
    }
}

#[async_trait]
impl TestExecutor for TestRelayAdapter {
    async fn run_tests(
        &self,
        sources: &[PathBuf],
        context: &dyn RunContext,
        recorder: Arc<dyn ExecutionRecorder>,
    ) -> Result<LaunchSummary> {
        self.launcher
            .run_sources(SourceSet::new(sources.iter().cloned()), context, recorder)
            .await
    }

    async fn run_selected_tests(
        &self,
        cases: &[Arc<HostTestCase>],
        context: &dyn RunContext,
        recorder: Arc<dyn ExecutionRecorder>,
    ) -> Result<LaunchSummary> {
        self.launcher.run_cases(cases, context, recorder).await
    }

    fn cancel(&self) {
        self.launcher.cancel();
    }
}
