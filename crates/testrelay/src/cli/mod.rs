//! CLI definition and command handling

pub mod commands;
pub mod output;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use testrelay_core::{load_config, load_config_or_default, Config};

use commands::{DiscoverCommand, RunCommand};

/// testrelay - Discover and run tests owned by an external test engine
#[derive(Debug, Parser)]
#[command(name = "testrelay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// Configuration file (searched upward from the working directory if omitted)
    #[arg(long, global = true, env = "TESTRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the tests in one or more test sources
    Discover(DiscoverCommand),

    /// Run tests, either whole sources or previously discovered cases
    Run(RunCommand),
}

impl Cli {
    /// Execute the CLI command, returning the process exit code
    pub fn execute(&self) -> anyhow::Result<u8> {
        // Change to specified directory if provided
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)
                .with_context(|| format!("changing to {}", dir.display()))?;
        }

        match &self.command {
            Commands::Discover(cmd) => cmd.execute(self),
            Commands::Run(cmd) => cmd.execute(self),
        }
    }

    /// Configuration from `--config`, else the nearest config file, else defaults
    pub fn load_config(&self) -> anyhow::Result<Config> {
        if let Some(path) = &self.config {
            return Ok(load_config(path)?);
        }
        let cwd = std::env::current_dir()?;
        let (config, _path) = load_config_or_default(&cwd)?;
        Ok(config)
    }

    /// Whether human-readable progress should be printed
    pub fn is_interactive_text(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Text
    }
}
