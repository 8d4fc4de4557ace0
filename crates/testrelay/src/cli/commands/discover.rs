//! Discover command - List the tests in test sources

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use console::style;
use serde::Serialize;
use testrelay_adapter::TestRelayAdapter;
use testrelay_core::HostTestCase;
use testrelay_manifest::ManifestEngine;
use tracing::info;

use crate::cli::{output, Cli, OutputFormat};
use crate::exit_codes;
use crate::host::{self, CollectingSink, ConsoleLogger};

/// List the tests in one or more test sources
#[derive(Debug, Args)]
pub struct DiscoverCommand {
    /// Test sources (manifest files)
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,

    /// Write the discovered cases to this file for a later `run --cases`
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Serialize)]
struct DiscoverOutput<'a> {
    count: usize,
    cases: Vec<&'a HostTestCase>,
}

impl DiscoverCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<u8> {
        let config = cli.load_config()?;
        let adapter = TestRelayAdapter::new(Arc::new(ManifestEngine::new()), config);

        let logger = ConsoleLogger::new(cli.verbose, cli.quiet);
        let sink = CollectingSink::default();
        let count = adapter.discover(&self.sources, &logger, &sink);
        let cases = sink.cases();
        info!(sources = self.sources.len(), count, "discovery finished");

        if let Some(path) = &self.output {
            host::write_cases(path, &cases)?;
        }

        if cli.format == OutputFormat::Json {
            let json = DiscoverOutput {
                count,
                cases: cases.iter().map(Arc::as_ref).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
            return Ok(exit_codes::SUCCESS);
        }

        if !cli.quiet {
            self.print_cases(&cases, cli.verbose);
            if let Some(path) = &self.output {
                output::success(&format!(
                    "Cases written to {}",
                    output::path_style().apply_to(path.display())
                ));
            }
        }

        Ok(exit_codes::SUCCESS)
    }

    fn print_cases(&self, cases: &[Arc<HostTestCase>], verbose: bool) {
        println!();
        println!(
            "{}",
            output::header(&format!("Discovered {} tests", cases.len()))
        );

        for case in cases {
            println!(
                "  {} {}",
                case.fully_qualified_name,
                output::id_style().apply_to(format!("[{}]", case.id))
            );
            if verbose {
                if let Some(source) = &case.source {
                    println!("{}", output::key_value("source", &source.display().to_string()));
                }
                if let (Some(file), Some(line)) = (&case.code_file_path, case.line_number) {
                    println!(
                        "{}",
                        output::key_value("declared", &format!("{}:{}", file.display(), line))
                    );
                }
            }
        }

        if cases.is_empty() {
            println!("  {}", style("(none)").dim());
        }
        println!();
    }
}
