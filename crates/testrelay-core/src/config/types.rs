//! Configuration types

use serde::{Deserialize, Serialize};

use crate::engine::FallbackMode;

use super::defaults;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity and property registration
    pub adapter: AdapterConfig,
    /// Discovery pipeline behavior
    pub discovery: DiscoveryConfig,
    /// Execution launcher behavior
    pub execution: ExecutionConfig,
}

/// Adapter identity settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// URI stamped on every published test case
    pub executor_uri: String,
    /// Property id carrying the stable test identifier
    pub test_id_property: String,
    /// Property id carrying the resolved source path
    pub source_path_property: String,
    /// Property id carrying the index into the supplied sources
    pub source_index_property: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            executor_uri: defaults::DEFAULT_EXECUTOR_URI.to_string(),
            test_id_property: defaults::DEFAULT_TEST_ID_PROPERTY.to_string(),
            source_path_property: defaults::DEFAULT_SOURCE_PATH_PROPERTY.to_string(),
            source_index_property: defaults::DEFAULT_SOURCE_INDEX_PROPERTY.to_string(),
        }
    }
}

/// Discovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Framework ids the host already supports natively
    pub excluded_frameworks: Vec<String>,
    /// How to pick a driver when no framework matches exactly
    pub fallback: FallbackMode,
    /// Any discovered full name containing one of these discards the whole result
    pub suppression_markers: Vec<String>,
    /// Forward exploration annotations to the host log
    pub include_annotations: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            excluded_frameworks: defaults::DEFAULT_EXCLUDED_FRAMEWORKS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fallback: FallbackMode::Approximate,
            suppression_markers: defaults::DEFAULT_SUPPRESSION_MARKERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            include_annotations: true,
        }
    }
}

/// Execution settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Isolate test execution even when the run context does not require it
    pub force_isolation: bool,
}
