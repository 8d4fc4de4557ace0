//! In-memory engine and recording host doubles for adapter tests

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use testrelay_core::engine::markup::streams;
use testrelay_core::engine::{
    Annotation, AssemblyInfo, AssemblyLoader, EngineLogger, ExplorationMessage,
    ExplorationOptions, FilterSet, FrameworkHandle, FrameworkSelector, LaunchSummary,
    ProgressMonitor, RunExtension, StepFinishedEvent, StepResult, StepStartedEvent,
    StructuredLog, TestDescriptor, TestDriver, TestEngine, TestFrameworkManager, TestLauncher,
    TestStatus, TestStep, TestStepRun,
};
use testrelay_core::{
    CancellationHandle, DiscoverySink, EngineError, EngineResult, ExecutionRecorder,
    HostTestCase, HostTestResult, MessageLevel, MessageLogger, RunContext, TestOutcome,
};

/// Step run for `test` finishing with `status`
pub(crate) fn step_run(test: &TestDescriptor, status: TestStatus) -> TestStepRun {
    let now = Utc::now();
    let mut log = StructuredLog::new();
    if status == TestStatus::Failed {
        log.stream_mut(streams::FAILURES)
            .write(format!("{} failed", test.name));
    }
    TestStepRun {
        step: TestStep {
            id: format!("{}:step", test.id),
            name: test.name.clone(),
            full_name: test.full_name.clone(),
            test_id: test.id.clone(),
            is_primary: true,
            is_test_case: test.is_test_case,
        },
        start_time: now,
        end_time: now,
        result: StepResult::new(status, Duration::ZERO),
        test_log: log,
    }
}

/// What one fake launch was configured with
#[derive(Debug, Clone, Default)]
pub(crate) struct LaunchRecord {
    pub file_patterns: Vec<String>,
    pub filter: Option<FilterSet>,
    pub isolated: bool,
    pub cancelled: bool,
}

/// Engine over a fixed descriptor tree
pub(crate) struct FakeEngine {
    manager: FakeFrameworkManager,
    root: Arc<TestDescriptor>,
    unloadable: Vec<PathBuf>,
    statuses: HashMap<String, TestStatus>,
    run_error: Option<String>,
    step_delay: Duration,
    launches: Arc<Mutex<Vec<LaunchRecord>>>,
}

impl FakeEngine {
    pub fn new(root: TestDescriptor) -> Self {
        let root = Arc::new(root);
        Self {
            manager: FakeFrameworkManager {
                frameworks: vec![FrameworkHandle::new("relay", "Relay")],
                root: Arc::clone(&root),
                annotations: Vec::new(),
                accepted: Arc::new(Mutex::new(Vec::new())),
            },
            root,
            unloadable: Vec::new(),
            statuses: HashMap::new(),
            run_error: None,
            step_delay: Duration::ZERO,
            launches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_frameworks<I: IntoIterator<Item = &'static str>>(mut self, ids: I) -> Self {
        self.manager.frameworks = ids
            .into_iter()
            .map(|id| FrameworkHandle::new(id, id))
            .collect();
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.manager.annotations.push(annotation);
        self
    }

    pub fn with_unloadable(mut self, path: &str) -> Self {
        self.unloadable.push(PathBuf::from(path));
        self
    }

    pub fn with_status(mut self, test_id: &str, status: TestStatus) -> Self {
        self.statuses.insert(test_id.to_string(), status);
        self
    }

    pub fn with_run_error(mut self, message: &str) -> Self {
        self.run_error = Some(message.to_string());
        self
    }

    pub fn with_step_delay_ms(mut self, ms: u64) -> Self {
        self.step_delay = Duration::from_millis(ms);
        self
    }

    /// Framework ids the last selector accepted
    pub fn accepted_frameworks(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.manager.accepted)
    }

    pub fn last_launch(&self) -> Option<LaunchRecord> {
        self.launches.lock().unwrap().last().cloned()
    }
}

impl TestEngine for FakeEngine {
    fn framework_manager(&self) -> &dyn TestFrameworkManager {
        &self.manager
    }

    fn assembly_loader(&self) -> Box<dyn AssemblyLoader> {
        Box::new(FakeLoader {
            unloadable: self.unloadable.clone(),
            hints: Vec::new(),
        })
    }

    fn launcher(&self) -> Box<dyn TestLauncher> {
        Box::new(FakeLauncher {
            root: Arc::clone(&self.root),
            statuses: self.statuses.clone(),
            run_error: self.run_error.clone(),
            step_delay: self.step_delay,
            record: LaunchRecord::default(),
            extensions: Vec::new(),
            cancellation: CancellationHandle::new(),
            launches: Arc::clone(&self.launches),
        })
    }
}

struct FakeFrameworkManager {
    frameworks: Vec<FrameworkHandle>,
    root: Arc<TestDescriptor>,
    annotations: Vec<Annotation>,
    accepted: Arc<Mutex<Vec<String>>>,
}

impl TestFrameworkManager for FakeFrameworkManager {
    fn frameworks(&self) -> Vec<FrameworkHandle> {
        self.frameworks.clone()
    }

    fn get_test_driver(
        &self,
        selector: &FrameworkSelector,
        _assemblies: &[AssemblyInfo],
        _logger: &dyn EngineLogger,
    ) -> EngineResult<Arc<dyn TestDriver>> {
        let candidates: Vec<&FrameworkHandle> = self
            .frameworks
            .iter()
            .filter(|f| selector.accepts(f))
            .collect();
        *self.accepted.lock().unwrap() = candidates.iter().map(|f| f.id.clone()).collect();

        let framework = candidates
            .first()
            .ok_or_else(|| EngineError::driver_not_found("no framework accepted by selector"))?;
        Ok(Arc::new(FakeDriver {
            framework: (*framework).clone(),
            root: Arc::clone(&self.root),
            annotations: self.annotations.clone(),
        }))
    }
}

struct FakeDriver {
    framework: FrameworkHandle,
    root: Arc<TestDescriptor>,
    annotations: Vec<Annotation>,
}

impl TestDriver for FakeDriver {
    fn framework(&self) -> &FrameworkHandle {
        &self.framework
    }

    fn describe(
        &self,
        _assemblies: &[AssemblyInfo],
        options: &ExplorationOptions,
        consumer: &mut dyn FnMut(ExplorationMessage),
        _progress: &dyn ProgressMonitor,
    ) -> EngineResult<()> {
        if options.include_annotations {
            for annotation in &self.annotations {
                consumer(ExplorationMessage::AnnotationDiscovered(annotation.clone()));
            }
        }
        consumer(ExplorationMessage::TestDiscovered(Arc::clone(&self.root)));
        for test in self.root.all_tests() {
            consumer(ExplorationMessage::TestDiscovered(test));
        }
        Ok(())
    }
}

struct FakeLoader {
    unloadable: Vec<PathBuf>,
    hints: Vec<PathBuf>,
}

impl AssemblyLoader for FakeLoader {
    fn add_hint_directory(&mut self, dir: &Path) {
        self.hints.push(dir.to_path_buf());
    }

    fn load_assembly_from(&mut self, path: &Path) -> EngineResult<Option<AssemblyInfo>> {
        if self.unloadable.iter().any(|p| p == path) {
            return Err(EngineError::load_failed(path, "unreadable image"));
        }
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Some(AssemblyInfo::new(name, path)))
    }
}

struct FakeLauncher {
    root: Arc<TestDescriptor>,
    statuses: HashMap<String, TestStatus>,
    run_error: Option<String>,
    step_delay: Duration,
    record: LaunchRecord,
    extensions: Vec<Arc<dyn RunExtension>>,
    cancellation: CancellationHandle,
    launches: Arc<Mutex<Vec<LaunchRecord>>>,
}

impl FakeLauncher {
    async fn execute(&mut self) -> EngineResult<LaunchSummary> {
        if let Some(message) = &self.run_error {
            return Err(EngineError::Launch(message.clone()));
        }

        let mut summary = LaunchSummary::default();
        for test in self.root.all_tests() {
            if !test.is_test_case {
                continue;
            }
            if let Some(filter) = &self.record.filter {
                if !filter.is_match(&test) {
                    continue;
                }
            }
            if self.cancellation.is_cancelled() {
                self.record.cancelled = true;
                break;
            }

            let status = self
                .statuses
                .get(&test.id)
                .cloned()
                .unwrap_or(TestStatus::Passed);

            let started = StepStartedEvent {
                test: Arc::clone(&test),
                step_run: step_run(&test, TestStatus::Passed),
            };
            for extension in &self.extensions {
                extension.on_step_started(&started)?;
            }

            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }

            let finished = StepFinishedEvent {
                test: Arc::clone(&test),
                step_run: step_run(&test, status.clone()),
            };
            for extension in &self.extensions {
                extension.on_step_finished(&finished)?;
            }
            summary.record(&status);
        }
        Ok(summary)
    }
}

#[async_trait]
impl TestLauncher for FakeLauncher {
    fn add_file_pattern(&mut self, pattern: &str) {
        self.record.file_patterns.push(pattern.to_string());
    }

    fn set_filter_set(&mut self, filter_set: FilterSet) {
        self.record.filter = Some(filter_set);
    }

    fn set_isolated(&mut self, isolated: bool) {
        self.record.isolated = isolated;
    }

    fn add_run_extension(&mut self, extension: Arc<dyn RunExtension>) {
        self.extensions.push(extension);
    }

    fn cancellation(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    async fn run(&mut self) -> EngineResult<LaunchSummary> {
        let result = self.execute().await;
        self.launches.lock().unwrap().push(self.record.clone());
        result
    }
}

/// Host message log that keeps everything
#[derive(Default)]
pub(crate) struct RecordingLogger {
    messages: Mutex<Vec<(MessageLevel, String)>>,
}

impl RecordingLogger {
    pub fn messages(&self) -> Vec<(MessageLevel, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl MessageLogger for RecordingLogger {
    fn send_message(&self, level: MessageLevel, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

/// Discovery sink that keeps every published case
#[derive(Default)]
pub(crate) struct RecordingSink {
    cases: Mutex<Vec<Arc<HostTestCase>>>,
}

impl RecordingSink {
    pub fn cases(&self) -> Vec<Arc<HostTestCase>> {
        self.cases.lock().unwrap().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.cases().iter().map(|c| c.id.clone()).collect()
    }
}

impl DiscoverySink for RecordingSink {
    fn send_test_case(&self, test_case: Arc<HostTestCase>) {
        self.cases.lock().unwrap().push(test_case);
    }
}

#[derive(Debug, Clone)]
pub(crate) enum RecorderEvent {
    Start(Arc<HostTestCase>),
    End(Arc<HostTestCase>, TestOutcome),
    Result(HostTestResult),
}

/// Execution recorder that keeps every notification in order
#[derive(Default)]
pub(crate) struct RecordingRecorder {
    events: Mutex<Vec<RecorderEvent>>,
    logger: RecordingLogger,
}

impl RecordingRecorder {
    pub fn events(&self) -> Vec<RecorderEvent> {
        self.events.lock().unwrap().clone()
    }

    /// (case, outcome) for every end notification
    pub fn outcomes(&self) -> Vec<(Arc<HostTestCase>, TestOutcome)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RecorderEvent::End(case, outcome) => Some((case, outcome)),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<(MessageLevel, String)> {
        self.logger.messages()
    }
}

impl MessageLogger for RecordingRecorder {
    fn send_message(&self, level: MessageLevel, message: &str) {
        self.logger.send_message(level, message);
    }
}

impl ExecutionRecorder for RecordingRecorder {
    fn record_start(&self, test_case: &Arc<HostTestCase>) {
        self.events
            .lock()
            .unwrap()
            .push(RecorderEvent::Start(Arc::clone(test_case)));
    }

    fn record_result(&self, result: HostTestResult) {
        self.events.lock().unwrap().push(RecorderEvent::Result(result));
    }

    fn record_end(&self, test_case: &Arc<HostTestCase>, outcome: TestOutcome) {
        self.events
            .lock()
            .unwrap()
            .push(RecorderEvent::End(Arc::clone(test_case), outcome));
    }
}

#[derive(Debug, Default)]
pub(crate) struct TestRunContext {
    pub isolated: bool,
}

impl RunContext for TestRunContext {
    fn in_isolation(&self) -> bool {
        self.isolated
    }
}
