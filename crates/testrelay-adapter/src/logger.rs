//! Engine log to host message bridge

use testrelay_core::engine::{EngineLogger, LogSeverity};
use testrelay_core::{MessageLevel, MessageLogger};
use tracing::{debug, error, info, warn};

/// Forwards engine log entries to the host message log.
///
/// Each entry is also mirrored to `tracing` at the matching level.
pub struct FrameworkLogger<'a> {
    host: &'a dyn MessageLogger,
}

impl<'a> FrameworkLogger<'a> {
    pub fn new(host: &'a dyn MessageLogger) -> Self {
        Self { host }
    }

    /// Host level for an engine severity
    pub fn level_for(severity: LogSeverity) -> MessageLevel {
        match severity {
            LogSeverity::Debug | LogSeverity::Info | LogSeverity::Important => {
                MessageLevel::Informational
            }
            LogSeverity::Warning => MessageLevel::Warning,
            LogSeverity::Error => MessageLevel::Error,
        }
    }

    /// Log an error and its source chain at error severity
    pub fn log_error(&self, message: &str, err: &(dyn std::error::Error + 'static)) {
        let mut details = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            details.push_str("\n  caused by: ");
            details.push_str(&cause.to_string());
            source = cause.source();
        }
        self.log(LogSeverity::Error, message, Some(&details));
    }
}

impl EngineLogger for FrameworkLogger<'_> {
    fn log(&self, severity: LogSeverity, message: &str, details: Option<&str>) {
        let text = match details {
            Some(details) if !details.is_empty() => format!("{}\n{}", message, details),
            _ => message.to_string(),
        };

        match severity {
            LogSeverity::Debug => debug!(target: "testrelay::engine", "{}", text),
            LogSeverity::Info | LogSeverity::Important => {
                info!(target: "testrelay::engine", "{}", text)
            }
            LogSeverity::Warning => warn!(target: "testrelay::engine", "{}", text),
            LogSeverity::Error => error!(target: "testrelay::engine", "{}", text),
        }

        self.host.send_message(Self::level_for(severity), &text);
    }
}
