//! Run command - Run tests and report results

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, ValueEnum};
use console::style;
use testrelay_adapter::{TestExecutor, TestRelayAdapter};
use testrelay_core::engine::LaunchSummary;
use testrelay_core::{HostTestCase, MessageLevel, MessageLogger};
use testrelay_manifest::ManifestEngine;
use tracing::{info, warn};

use crate::cli::{output, Cli, OutputFormat};
use crate::exit_codes;
use crate::host::{self, CliRunContext, CollectingSink, ConsoleLogger, ConsoleRecorder};
use crate::report::{ReportFormat, ReportGenerator, RunReport};

/// Run tests, either whole sources or previously discovered cases
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Test sources (manifest files) to run
    pub sources: Vec<PathBuf>,

    /// Run the cases in a file written by `discover --output`
    #[arg(long, conflicts_with = "sources")]
    pub cases: Option<PathBuf>,

    /// Only run the test with this id (repeatable)
    #[arg(long = "test", value_name = "ID")]
    pub tests: Vec<String>,

    /// Output format for test results
    #[arg(long, default_value = "pretty")]
    pub reporter: ReporterArg,

    /// Output file for test results (e.g., junit.xml)
    #[arg(long)]
    pub report_file: Option<PathBuf>,

    /// Run tests in an isolated environment
    #[arg(long)]
    pub isolate: bool,
}

/// Reporter output format
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ReporterArg {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON output
    Json,
    /// JUnit XML output
    Junit,
}

impl From<ReporterArg> for ReportFormat {
    fn from(r: ReporterArg) -> Self {
        match r {
            ReporterArg::Pretty => Self::Pretty,
            ReporterArg::Json => Self::Json,
            ReporterArg::Junit => Self::Junit,
        }
    }
}

/// What the run covers
enum Selection {
    Sources(Vec<PathBuf>),
    Cases(Vec<Arc<HostTestCase>>),
}

impl RunCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<u8> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<u8> {
        let config = cli.load_config()?;
        let adapter = Arc::new(TestRelayAdapter::new(Arc::new(ManifestEngine::new()), config));
        let logger = ConsoleLogger::new(cli.verbose, cli.quiet);

        let selection = self.select(&adapter, logger)?;
        let live = cli.is_interactive_text() && self.streams_to_console();
        let recorder = Arc::new(ConsoleRecorder::new(logger, live));
        let context = CliRunContext {
            isolated: self.isolate,
        };

        if live {
            println!();
            println!("{}", style("Running tests...").bold());
            if self.isolate {
                println!("{}", output::key_value("Isolation", "enabled"));
            }
            println!();
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let signal = {
            let adapter = Arc::clone(&adapter);
            let cancelled = Arc::clone(&cancelled);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling run");
                    cancelled.store(true, Ordering::SeqCst);
                    adapter.cancel();
                }
            })
        };

        let started = Instant::now();
        let outcome = match &selection {
            Selection::Sources(sources) => {
                adapter
                    .run_tests(sources, &context, recorder.clone())
                    .await
            }
            Selection::Cases(cases) => {
                adapter
                    .run_selected_tests(cases, &context, recorder.clone())
                    .await
            }
        };
        signal.abort();
        let summary: LaunchSummary = outcome?;
        info!(
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            inconclusive = summary.inconclusive,
            "run finished"
        );

        let report = RunReport::from_results(
            &recorder.results(),
            started.elapsed().as_millis() as u64,
        );
        self.output_results(&report, cli)?;

        if cancelled.load(Ordering::SeqCst) {
            output::warning("Run cancelled");
            return Ok(exit_codes::CANCELLED);
        }
        if !report.success {
            return Ok(exit_codes::TESTS_FAILED);
        }
        Ok(exit_codes::SUCCESS)
    }

    /// Resolve what to run from the arguments
    fn select(&self, adapter: &TestRelayAdapter, logger: ConsoleLogger) -> anyhow::Result<Selection> {
        let cases = match &self.cases {
            Some(path) => host::read_cases(path)?,
            None if self.sources.is_empty() => {
                anyhow::bail!("Nothing to run: give test sources or --cases <file>")
            }
            None if self.tests.is_empty() => return Ok(Selection::Sources(self.sources.clone())),
            None => {
                let sink = CollectingSink::default();
                adapter.discover(&self.sources, &logger, &sink);
                sink.cases()
            }
        };

        if self.tests.is_empty() {
            return Ok(Selection::Cases(cases));
        }

        let keys = adapter.keys();
        let selected: Vec<Arc<HostTestCase>> = cases
            .into_iter()
            .filter(|case| {
                let test_id = case.property_str(&keys.test_id).unwrap_or(&case.id);
                self.tests.iter().any(|id| id == test_id || *id == case.id)
            })
            .collect();

        for id in &self.tests {
            let known = selected.iter().any(|case| {
                case.id == *id || case.property_str(&keys.test_id) == Some(id.as_str())
            });
            if !known {
                logger.send_message(MessageLevel::Warning, &format!("No test with id '{}'", id));
            }
        }
        Ok(Selection::Cases(selected))
    }

    /// Whether results go to the console as they arrive
    fn streams_to_console(&self) -> bool {
        matches!(self.reporter, ReporterArg::Pretty) || self.report_file.is_some()
    }

    fn output_results(&self, report: &RunReport, cli: &Cli) -> anyhow::Result<()> {
        if let Some(path) = &self.report_file {
            ReportGenerator::write_to_file(report, self.reporter.into(), path)?;
            if cli.is_interactive_text() {
                output::success(&format!(
                    "Report written to {}",
                    output::path_style().apply_to(path.display())
                ));
            }
        }

        // JSON output mode
        if cli.format == OutputFormat::Json {
            println!("{}", ReportGenerator::generate_json(report));
            return Ok(());
        }

        if self.report_file.is_none() && !matches!(self.reporter, ReporterArg::Pretty) {
            print!("{}", ReportGenerator::generate(report, self.reporter.into()));
            return Ok(());
        }

        if !cli.quiet {
            Self::print_summary(report);
        }
        Ok(())
    }

    fn print_summary(report: &RunReport) {
        println!();
        println!("{}", style("═".repeat(70)).dim());
        println!(
            "  {} {}, {} {}, {} {}, {} {} ({}ms)",
            style(report.passed).green().bold(),
            style("passed").dim(),
            style(report.failed).red().bold(),
            style("failed").dim(),
            style(report.skipped).yellow().bold(),
            style("skipped").dim(),
            style(report.not_found).bold(),
            style("not found").dim(),
            report.duration_ms
        );
        println!("{}", style("═".repeat(70)).dim());
        println!();
    }
}
