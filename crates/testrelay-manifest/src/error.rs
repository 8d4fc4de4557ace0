//! Manifest parse errors

use std::path::Path;

use testrelay_core::EngineError;
use thiserror::Error;

/// Why a manifest could not be read
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid test name '{name}' under '{parent}'")]
    InvalidName { name: String, parent: String },

    #[error("Duplicate test name '{name}' under '{parent}'")]
    DuplicateName { name: String, parent: String },
}

impl ManifestError {
    /// Engine load failure for the manifest at `path`
    pub fn into_load_failure(self, path: &Path) -> EngineError {
        EngineError::load_failed(path, self.to_string())
    }
}
