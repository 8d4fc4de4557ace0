//! Default configuration values

use super::types::Config;

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "testrelay.toml";

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "testrelay.yaml";

pub const DEFAULT_EXECUTOR_URI: &str = "executor://testrelay/adapter/v1";
pub const DEFAULT_TEST_ID_PROPERTY: &str = "TestRelay.TestId";
pub const DEFAULT_SOURCE_PATH_PROPERTY: &str = "TestRelay.SourcePath";
pub const DEFAULT_SOURCE_INDEX_PROPERTY: &str = "TestRelay.SourceIndex";

/// Frameworks with native host adapters; their drivers are never selected
pub const DEFAULT_EXCLUDED_FRAMEWORKS: &[&str] =
    &["MSTestAdapter.TestFramework", "NUnitAdapter.TestFramework"];

/// Name fragments identifying tests the host's built-in adapters also report
pub const DEFAULT_SUPPRESSION_MARKERS: &[&str] = &["NUnitTest", "XUnitTest"];

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_TOML,
        DEFAULT_CONFIG_YAML,
        ".testrelay.toml",
        ".testrelay.yaml",
    ]
}

/// Generate default configuration TOML
pub fn default_config_toml() -> String {
    toml::to_string_pretty(&Config::default()).unwrap_or_else(|_| DEFAULT_CONFIG_TEMPLATE.to_string())
}

/// Default configuration template
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# testrelay configuration

[adapter]
executor_uri = "executor://testrelay/adapter/v1"
test_id_property = "TestRelay.TestId"
source_path_property = "TestRelay.SourcePath"
source_index_property = "TestRelay.SourceIndex"

[discovery]
excluded_frameworks = ["MSTestAdapter.TestFramework", "NUnitAdapter.TestFramework"]
fallback = "approximate"
suppression_markers = ["NUnitTest", "XUnitTest"]
include_annotations = true

[execution]
force_isolation = false
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_matches_defaults() {
        let parsed: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_generated_toml_parses() {
        let parsed: Config = toml::from_str(&default_config_toml()).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
