//! Output formatting utilities

use console::{style, Style, StyledObject};
use testrelay_core::{MessageLevel, TestOutcome};

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    eprintln!("{} {}", style("!").yellow().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    eprintln!("{} {}", style("→").blue(), message);
}

/// Print a host log message at its level
pub fn message(level: MessageLevel, text: &str) {
    match level {
        MessageLevel::Informational => info(text),
        MessageLevel::Warning => warning(text),
        MessageLevel::Error => error(text),
    }
}

/// Create a styled header
pub fn header(text: &str) -> String {
    style(text).bold().to_string()
}

/// Create a styled key-value line
pub fn key_value(key: &str, value: &str) -> String {
    format!("  {}: {}", style(key).dim(), value)
}

/// Icon for a test outcome
pub fn outcome_icon(outcome: TestOutcome) -> StyledObject<&'static str> {
    match outcome {
        TestOutcome::Passed => style("✓").green(),
        TestOutcome::Failed => style("✗").red(),
        TestOutcome::Skipped => style("○").yellow(),
        TestOutcome::NotFound => style("?").dim(),
    }
}

/// Style for paths
pub fn path_style() -> Style {
    Style::new().cyan()
}

/// Style for test ids
pub fn id_style() -> Style {
    Style::new().dim()
}
