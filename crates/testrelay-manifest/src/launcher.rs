//! Manifest launcher
//!
//! Runs every selected leaf of every matched manifest as a shell command,
//! one at a time, raising step-started and step-finished events around each.
//! Fixtures and the manifest root are raised as container steps when they
//! hold at least one selected leaf.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use testrelay_core::engine::markup::{markers, streams};
use testrelay_core::engine::{
    FilterSet, LaunchSummary, MarkupStream, MarkupTag, RunExtension, StepFinishedEvent,
    StepResult, StepStartedEvent, StructuredLog, TestDescriptor, TestLauncher, TestStatus,
    TestStep, TestStepRun,
};
use testrelay_core::{CancellationHandle, EngineError, EngineResult};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::loader::load_manifest;
use crate::manifest::ManifestNode;

const BACKTRACE_HEADER: &str = "stack backtrace:";

/// [`TestLauncher`] for manifest files
#[derive(Default)]
pub struct ManifestLauncher {
    patterns: Vec<String>,
    filter: Option<FilterSet>,
    isolated: bool,
    extensions: Vec<Arc<dyn RunExtension>>,
    cancellation: CancellationHandle,
}

/// Step in the order it is raised
enum PlanItem {
    Enter(Arc<TestDescriptor>),
    Leaf(Arc<TestDescriptor>),
    Exit,
}

/// A container step that has started but not finished
struct OpenStep {
    test: Arc<TestDescriptor>,
    step: TestStep,
    start_time: DateTime<Utc>,
    started: Instant,
    failed: bool,
}

enum CommandOutcome {
    Completed(Output),
    Canceled,
    Failed(std::io::Error),
}

impl ManifestLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    fn selected(&self, test: &TestDescriptor) -> bool {
        self.filter.as_ref().map_or(true, |f| f.is_match(test))
    }

    /// Paths matched by the file patterns; a pattern matching nothing is
    /// taken as a literal path so the loader can report it
    fn expand_patterns(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for pattern in &self.patterns {
            let matched: Vec<PathBuf> = match glob::glob(pattern) {
                Ok(entries) => entries.filter_map(|e| e.ok()).collect(),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "invalid file pattern");
                    Vec::new()
                }
            };
            if matched.is_empty() {
                paths.push(PathBuf::from(pattern));
            } else {
                paths.extend(matched);
            }
        }

        let mut seen = std::collections::HashSet::new();
        paths.retain(|p| seen.insert(p.clone()));
        paths
    }

    /// Flatten the selected part of `node` into `plan`. Returns whether
    /// anything under `node` was selected.
    fn plan(&self, node: &Arc<TestDescriptor>, plan: &mut Vec<PlanItem>) -> bool {
        if node.is_test_case {
            let selected = self.selected(node);
            if selected {
                plan.push(PlanItem::Leaf(Arc::clone(node)));
            }
            return selected;
        }

        let mark = plan.len();
        plan.push(PlanItem::Enter(Arc::clone(node)));
        let mut any = false;
        for child in &node.children {
            any |= self.plan(child, plan);
        }
        if any {
            plan.push(PlanItem::Exit);
        } else {
            plan.truncate(mark);
        }
        any
    }

    fn raise_started(&self, test: &Arc<TestDescriptor>, step_run: TestStepRun) -> EngineResult<()> {
        let event = StepStartedEvent {
            test: Arc::clone(test),
            step_run,
        };
        for extension in &self.extensions {
            extension.on_step_started(&event)?;
        }
        Ok(())
    }

    fn raise_finished(&self, test: &Arc<TestDescriptor>, step_run: TestStepRun) -> EngineResult<()> {
        let event = StepFinishedEvent {
            test: Arc::clone(test),
            step_run,
        };
        for extension in &self.extensions {
            extension.on_step_finished(&event)?;
        }
        Ok(())
    }

    fn open(&self, test: &Arc<TestDescriptor>) -> EngineResult<OpenStep> {
        let step = step_for(test);
        let start_time = Utc::now();
        self.raise_started(test, pending_run(&step, start_time))?;
        Ok(OpenStep {
            test: Arc::clone(test),
            step,
            start_time,
            started: Instant::now(),
            failed: false,
        })
    }

    fn close(&self, open: OpenStep, result: StepResult) -> EngineResult<()> {
        let step_run = TestStepRun {
            step: open.step,
            start_time: open.start_time,
            end_time: Utc::now(),
            result,
            test_log: StructuredLog::new(),
        };
        self.raise_finished(&open.test, step_run)
    }

    async fn run_leaf(
        &self,
        test: &Arc<TestDescriptor>,
        node: Option<&ManifestNode>,
        dir: &Path,
    ) -> EngineResult<TestStatus> {
        let step = step_for(test);
        let start_time = Utc::now();
        self.raise_started(test, pending_run(&step, start_time))?;

        let started = Instant::now();
        let (mut result, test_log) = match node {
            Some(node) => self.execute(node, dir).await,
            None => (
                StepResult::new(TestStatus::Inconclusive, Duration::ZERO),
                StructuredLog::new(),
            ),
        };
        result.duration = started.elapsed();
        let status = result.status.clone();
        debug!(test = %test.full_name, status = %status, "test finished");

        self.raise_finished(
            test,
            TestStepRun {
                step,
                start_time,
                end_time: Utc::now(),
                result,
                test_log,
            },
        )?;
        Ok(status)
    }

    async fn execute(&self, node: &ManifestNode, dir: &Path) -> (StepResult, StructuredLog) {
        let mut log = StructuredLog::new();

        if let Some(reason) = &node.ignore {
            log.stream_mut(streams::WARNINGS)
                .write(format!("Ignored: {}", reason));
            return (categorized(TestStatus::Skipped, "ignored"), log);
        }
        let Some(command) = &node.command else {
            log.stream_mut(streams::WARNINGS)
                .write("No command declared");
            return (StepResult::new(TestStatus::Inconclusive, Duration::ZERO), log);
        };

        match run_command(command, dir, self.isolated, &self.cancellation).await {
            CommandOutcome::Completed(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stdout.is_empty() {
                    log.stream_mut(streams::CONSOLE_OUTPUT).write(stdout.to_string());
                }
                if !stderr.is_empty() {
                    log.stream_mut(streams::CONSOLE_ERROR).write(stderr.to_string());
                }

                if output.status.success() {
                    (StepResult::new(TestStatus::Passed, Duration::ZERO), log)
                } else {
                    log.streams
                        .push(failure_stream(&format!("Command {}", output.status), &stderr));
                    (StepResult::new(TestStatus::Failed, Duration::ZERO), log)
                }
            }
            CommandOutcome::Canceled => {
                log.stream_mut(streams::WARNINGS)
                    .write("Canceled while running");
                (categorized(TestStatus::Inconclusive, "canceled"), log)
            }
            CommandOutcome::Failed(e) => {
                log.streams
                    .push(failure_stream(&format!("Failed to run command: {}", e), ""));
                (StepResult::new(TestStatus::Failed, Duration::ZERO), log)
            }
        }
    }
}

#[async_trait]
impl TestLauncher for ManifestLauncher {
    fn add_file_pattern(&mut self, pattern: &str) {
        self.patterns.push(pattern.to_string());
    }

    fn set_filter_set(&mut self, filter_set: FilterSet) {
        self.filter = Some(filter_set);
    }

    fn set_isolated(&mut self, isolated: bool) {
        self.isolated = isolated;
    }

    fn add_run_extension(&mut self, extension: Arc<dyn RunExtension>) {
        self.extensions.push(extension);
    }

    fn cancellation(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    async fn run(&mut self) -> EngineResult<LaunchSummary> {
        let started = Instant::now();
        let mut summary = LaunchSummary::default();

        'sources: for path in self.expand_patterns() {
            let manifest = load_manifest(&path)?
                .ok_or_else(|| EngineError::load_failed(&path, "not a test manifest"))?;
            let root = Arc::new(manifest.to_descriptor(&path));
            let index = manifest.index(&path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));

            let mut plan = Vec::new();
            self.plan(&root, &mut plan);
            debug!(manifest = %path.display(), steps = plan.len(), "running manifest");

            let mut open: Vec<OpenStep> = Vec::new();
            for item in plan {
                match item {
                    PlanItem::Enter(test) => open.push(self.open(&test)?),
                    PlanItem::Leaf(test) => {
                        if self.cancellation.is_cancelled() {
                            info!("launch canceled");
                            self.close_canceled(open)?;
                            break 'sources;
                        }
                        let status = self.run_leaf(&test, index.get(&test.id).copied(), dir).await?;
                        summary.record(&status);
                        if status == TestStatus::Failed {
                            if let Some(parent) = open.last_mut() {
                                parent.failed = true;
                            }
                        }
                    }
                    PlanItem::Exit => {
                        let Some(step) = open.pop() else { continue };
                        let failed = step.failed;
                        let status = if failed {
                            TestStatus::Failed
                        } else {
                            TestStatus::Passed
                        };
                        let duration = step.started.elapsed();
                        self.close(step, StepResult::new(status, duration))?;
                        if failed {
                            if let Some(parent) = open.last_mut() {
                                parent.failed = true;
                            }
                        }
                    }
                }
            }
        }

        summary.duration = started.elapsed();
        info!(
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            inconclusive = summary.inconclusive,
            "launch complete"
        );
        Ok(summary)
    }
}

impl ManifestLauncher {
    /// Finish every open container, innermost first, as canceled
    fn close_canceled(&self, mut open: Vec<OpenStep>) -> EngineResult<()> {
        while let Some(step) = open.pop() {
            let mut result = categorized(TestStatus::Inconclusive, "canceled");
            result.duration = step.started.elapsed();
            self.close(step, result)?;
        }
        Ok(())
    }
}

fn step_for(test: &TestDescriptor) -> TestStep {
    TestStep {
        id: test.id.clone(),
        name: test.name.clone(),
        full_name: test.full_name.clone(),
        test_id: test.id.clone(),
        is_primary: true,
        is_test_case: test.is_test_case,
    }
}

fn pending_run(step: &TestStep, start_time: DateTime<Utc>) -> TestStepRun {
    TestStepRun {
        step: step.clone(),
        start_time,
        end_time: start_time,
        result: StepResult::new(TestStatus::Inconclusive, Duration::ZERO),
        test_log: StructuredLog::new(),
    }
}

fn categorized(status: TestStatus, category: &str) -> StepResult {
    let mut result = StepResult::new(status, Duration::ZERO);
    result.category = Some(category.to_string());
    result
}

/// Failures stream for `summary` followed by `stderr`; whatever follows a
/// backtrace header goes into a stack-trace marker
fn failure_stream(summary: &str, stderr: &str) -> MarkupStream {
    let mut stream =
        MarkupStream::new(streams::FAILURES).with_tag(MarkupTag::text(format!("{}\n", summary)));

    match stderr.find(BACKTRACE_HEADER) {
        Some(idx) => {
            let message = &stderr[..idx];
            let trace = stderr[idx + BACKTRACE_HEADER.len()..].trim_start_matches('\n');
            if !message.is_empty() {
                stream.write(message);
            }
            stream = stream.with_tag(MarkupTag::marker(
                markers::STACK_TRACE,
                vec![MarkupTag::text(trace)],
            ));
        }
        None if !stderr.is_empty() => stream.write(stderr),
        None => {}
    }
    stream
}

async fn run_command(
    command: &str,
    dir: &Path,
    isolated: bool,
    cancellation: &CancellationHandle,
) -> CommandOutcome {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if isolated {
        let path = std::env::var_os("PATH");
        cmd.env_clear();
        if let Some(path) = path {
            cmd.env("PATH", path);
        }
    }

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return CommandOutcome::Failed(e),
    };

    // Dropping the child on cancel kills it
    tokio::select! {
        output = child.wait_with_output() => match output {
            Ok(output) => CommandOutcome::Completed(output),
            Err(e) => CommandOutcome::Failed(e),
        },
        _ = cancellation.cancelled() => CommandOutcome::Canceled,
    }
}
