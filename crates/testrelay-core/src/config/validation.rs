//! Configuration validation

use std::collections::HashSet;

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_adapter(config)?;
    validate_discovery(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_adapter(config: &Config) -> Result<()> {
    let adapter = &config.adapter;

    if !adapter.executor_uri.starts_with("executor://")
        || adapter.executor_uri.len() == "executor://".len()
    {
        return Err(ConfigError::invalid(
            "adapter.executor_uri",
            "must be an executor:// URI",
        ));
    }

    let properties = [
        ("adapter.test_id_property", &adapter.test_id_property),
        ("adapter.source_path_property", &adapter.source_path_property),
        ("adapter.source_index_property", &adapter.source_index_property),
    ];

    let mut seen = HashSet::new();
    for (field, id) in properties {
        if id.trim().is_empty() {
            return Err(ConfigError::invalid(field, "property id cannot be empty"));
        }
        if !seen.insert(id.as_str()) {
            return Err(ConfigError::invalid(
                field,
                format!("property id '{}' is already used", id),
            ));
        }
    }

    Ok(())
}

fn validate_discovery(config: &Config) -> Result<()> {
    if config
        .discovery
        .suppression_markers
        .iter()
        .any(|m| m.is_empty())
    {
        return Err(ConfigError::invalid(
            "discovery.suppression_markers",
            "markers cannot be empty strings",
        ));
    }

    if config
        .discovery
        .excluded_frameworks
        .iter()
        .any(|f| f.trim().is_empty())
    {
        return Err(ConfigError::invalid(
            "discovery.excluded_frameworks",
            "framework ids cannot be empty",
        ));
    }

    Ok(())
}
