//! Error types for the adapter

use testrelay_core::{ConfigError, EngineError};
use thiserror::Error;

/// Result type for adapter operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Adapter errors
#[derive(Debug, Error)]
pub enum RelayError {
    /// The external engine failed
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The engine reported a status the host model has no mapping for
    #[error("Unexpected test status '{status}' for test {test_id}")]
    UnexpectedStatus { test_id: String, status: String },
}

impl RelayError {
    /// Find an unexpected-status error, even when wrapped by a run extension
    pub fn unexpected_status(&self) -> Option<&RelayError> {
        match self {
            Self::UnexpectedStatus { .. } => Some(self),
            Self::Engine(EngineError::Extension(source)) => source
                .downcast_ref::<RelayError>()
                .and_then(RelayError::unexpected_status),
            _ => None,
        }
    }
}
