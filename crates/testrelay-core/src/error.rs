//! Error types for testrelay

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Result type alias for calls into the external engine
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the external engine's services
#[derive(Debug, Error)]
pub enum EngineError {
    /// No test driver matched the framework selector
    #[error("No test driver found: {message}")]
    DriverNotFound { message: String },

    /// A test binary could not be loaded
    #[error("Failed to load {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Exploration of loaded binaries failed
    #[error("Exploration failed: {0}")]
    Exploration(String),

    /// The launcher failed to start or complete a run
    #[error("Launch failed: {0}")]
    Launch(String),

    /// A run extension rejected an event
    #[error("Run extension failed: {0}")]
    Extension(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Create a load failure for a binary path
    pub fn load_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::LoadFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a driver-not-found error
    pub fn driver_not_found(message: impl Into<String>) -> Self {
        Self::DriverNotFound {
            message: message.into(),
        }
    }

    /// Wrap an error raised inside a run extension callback
    pub fn extension<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Extension(Box::new(error))
    }
}
