//! Discovery pipeline
//!
//! One pass per request: load the sources, resolve a driver, explore, then
//! publish the test cases depth-first. Failures never reach the host; they are
//! logged and the request publishes nothing.

use std::collections::HashSet;
use std::sync::Arc;

use testrelay_core::config::DiscoveryConfig;
use testrelay_core::engine::{
    AssemblyInfo, EngineLogger, ExplorationMessage, ExplorationOptions, FrameworkSelector,
    LogSeverity, NullProgressMonitor, TestDescriptor, TestDriver, TestEngine,
};
use testrelay_core::{DiscoverySink, EngineResult, MessageLogger};
use tracing::{debug, info, instrument};

use crate::cases::{CachingCaseBuilder, SourceSet};
use crate::logger::FrameworkLogger;

/// Result of exploring one request
enum Exploration {
    Found(Vec<Arc<TestDescriptor>>),
    /// A suppression marker matched; publish nothing
    Suppressed { marker: String, full_name: String },
}

/// Explores sources and publishes host test cases
pub struct TestExplorer {
    engine: Arc<dyn TestEngine>,
    cases: Arc<CachingCaseBuilder>,
    settings: DiscoveryConfig,
}

impl TestExplorer {
    pub fn new(
        engine: Arc<dyn TestEngine>,
        cases: Arc<CachingCaseBuilder>,
        settings: DiscoveryConfig,
    ) -> Self {
        Self {
            engine,
            cases,
            settings,
        }
    }

    /// Discover and publish the test cases in `sources`.
    ///
    /// Returns the number of cases published. Errors are logged at error
    /// severity and yield zero.
    #[instrument(skip_all, fields(sources = sources.len()))]
    pub fn discover_tests(
        &self,
        sources: &SourceSet,
        logger: &dyn MessageLogger,
        sink: &dyn DiscoverySink,
    ) -> usize {
        let framework_logger = FrameworkLogger::new(logger);

        let tests = match self.explore(sources, &framework_logger) {
            Ok(Exploration::Found(tests)) => tests,
            Ok(Exploration::Suppressed { marker, full_name }) => {
                framework_logger.log(
                    LogSeverity::Info,
                    &format!(
                        "Skipping discovery: '{}' matches suppression marker '{}'",
                        full_name, marker
                    ),
                    None,
                );
                return 0;
            }
            Err(err) => {
                framework_logger.log_error("Exception discovering tests", &err);
                return 0;
            }
        };

        let published = self.publish(&tests, sources, sink);
        info!(published, "discovery complete");
        published
    }

    fn explore(&self, sources: &SourceSet, logger: &FrameworkLogger<'_>) -> EngineResult<Exploration> {
        let assemblies = self.load_assemblies(sources)?;
        if assemblies.is_empty() {
            debug!("no loadable sources");
            return Ok(Exploration::Found(Vec::new()));
        }

        let driver = self.resolve_driver(&assemblies, logger)?;
        debug!(framework = %driver.framework().id, "resolved test driver");

        let options = ExplorationOptions {
            include_annotations: self.settings.include_annotations,
        };
        let mut tests = Vec::new();
        let mut consumer = |message: ExplorationMessage| match message {
            ExplorationMessage::TestDiscovered(test) => {
                if test.is_test_case {
                    tests.push(test);
                }
            }
            ExplorationMessage::AnnotationDiscovered(annotation) => annotation.log(logger, true),
        };
        driver.describe(&assemblies, &options, &mut consumer, &NullProgressMonitor)?;

        if let Some((marker, full_name)) = self.suppression_match(&tests) {
            return Ok(Exploration::Suppressed { marker, full_name });
        }
        Ok(Exploration::Found(tests))
    }

    fn load_assemblies(&self, sources: &SourceSet) -> EngineResult<Vec<AssemblyInfo>> {
        let mut loader = self.engine.assembly_loader();
        for source in sources.iter() {
            if let Some(dir) = source.parent().filter(|d| !d.as_os_str().is_empty()) {
                loader.add_hint_directory(dir);
            }
        }

        let mut assemblies = Vec::with_capacity(sources.len());
        for source in sources.iter() {
            match loader.load_assembly_from(source)? {
                Some(assembly) => assemblies.push(assembly),
                None => debug!(source = %source.display(), "not a test binary"),
            }
        }
        Ok(assemblies)
    }

    /// Driver for `assemblies`, skipping frameworks the host already supports
    fn resolve_driver(
        &self,
        assemblies: &[AssemblyInfo],
        logger: &dyn EngineLogger,
    ) -> EngineResult<Arc<dyn TestDriver>> {
        let excluded = self.settings.excluded_frameworks.clone();
        let selector = FrameworkSelector::new(
            move |framework| excluded.iter().all(|id| *id != framework.id),
            self.settings.fallback,
        );
        self.engine
            .framework_manager()
            .get_test_driver(&selector, assemblies, logger)
    }

    /// First (marker, full name) pair where the full name contains a marker
    fn suppression_match(&self, tests: &[Arc<TestDescriptor>]) -> Option<(String, String)> {
        let markers = &self.settings.suppression_markers;
        tests.iter().find_map(|test| {
            markers
                .iter()
                .find(|marker| test.full_name.contains(marker.as_str()))
                .map(|marker| (marker.clone(), test.full_name.clone()))
        })
    }

    /// Publish test cases depth-first, each identifier at most once
    fn publish(&self, tests: &[Arc<TestDescriptor>], sources: &SourceSet, sink: &dyn DiscoverySink) -> usize {
        let mut seen = HashSet::new();
        let mut published = 0;

        let mut emit = |test: &TestDescriptor| {
            if test.is_test_case && seen.insert(test.id.clone()) {
                sink.send_test_case(self.cases.get_test_case(test, sources));
                published += 1;
            }
        };

        for test in tests {
            emit(test);
            for descendant in test.all_tests() {
                emit(&descendant);
            }
        }
        published
    }
}
