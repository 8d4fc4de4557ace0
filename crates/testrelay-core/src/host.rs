//! Host platform model and contracts
//!
//! The host owns a flat list of test cases and receives start/result/end
//! notifications per case. Everything here is host-native: the adapter
//! produces these types, the host consumes them.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AdapterConfig;

/// A named property the host can attach to test cases.
///
/// Properties are registered once per adapter instance from configuration and
/// the resulting handles are passed to every component that reads or writes them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestProperty {
    id: String,
    label: String,
}

impl TestProperty {
    pub fn register(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// The property handles used by the adapter
#[derive(Debug, Clone)]
pub struct PropertyKeys {
    /// Stable engine identifier of the test
    pub test_id: TestProperty,
    /// Resolved owning source path
    pub source_path: TestProperty,
    /// Index into the supplied source set, when the source came from it
    pub source_index: TestProperty,
}

impl PropertyKeys {
    pub fn from_config(config: &AdapterConfig) -> Self {
        Self {
            test_id: TestProperty::register(config.test_id_property.clone(), "Test id"),
            source_path: TestProperty::register(config.source_path_property.clone(), "Source path"),
            source_index: TestProperty::register(
                config.source_index_property.clone(),
                "Source index",
            ),
        }
    }
}

impl Default for PropertyKeys {
    fn default() -> Self {
        Self::from_config(&AdapterConfig::default())
    }
}

/// Value stored under a test property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Int(i64),
    Str(String),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Str(_) => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

/// A flat, host-native test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostTestCase {
    /// Identifier, stable across discovery and execution
    pub id: String,
    /// Fully qualified (hierarchical) name
    pub fully_qualified_name: String,
    /// Name shown to the user
    pub display_name: String,
    /// Executor that owns this case
    pub executor_uri: String,
    /// Owning source (test binary), if resolved
    pub source: Option<PathBuf>,
    /// Source file declaring the test
    pub code_file_path: Option<PathBuf>,
    /// Line of the declaration in `code_file_path`
    pub line_number: Option<u32>,
    #[serde(default)]
    properties: BTreeMap<String, PropertyValue>,
}

impl HostTestCase {
    pub fn new(
        id: impl Into<String>,
        fully_qualified_name: impl Into<String>,
        executor_uri: impl Into<String>,
    ) -> Self {
        let fully_qualified_name = fully_qualified_name.into();
        Self {
            id: id.into(),
            display_name: fully_qualified_name.clone(),
            fully_qualified_name,
            executor_uri: executor_uri.into(),
            source: None,
            code_file_path: None,
            line_number: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn set_property(&mut self, property: &TestProperty, value: PropertyValue) {
        self.properties.insert(property.id().to_string(), value);
    }

    pub fn with_property(mut self, property: &TestProperty, value: PropertyValue) -> Self {
        self.set_property(property, value);
        self
    }

    pub fn property(&self, property: &TestProperty) -> Option<&PropertyValue> {
        self.properties.get(property.id())
    }

    /// String value of a property, if set and string-typed
    pub fn property_str(&self, property: &TestProperty) -> Option<&str> {
        self.property(property).and_then(PropertyValue::as_str)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Outcome of a test as the host understands it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    Passed,
    Failed,
    Skipped,
    NotFound,
}

impl TestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::NotFound => "not found",
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra text attached to a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResultMessage {
    pub category: String,
    pub text: String,
}

impl TestResultMessage {
    pub const STANDARD_OUT: &'static str = "StdOut";
    pub const STANDARD_ERROR: &'static str = "StdErr";
    pub const ADDITIONAL_INFO: &'static str = "AdditionalInfo";

    pub fn new(category: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            text: text.into(),
        }
    }
}

/// Result of one executed test case
#[derive(Debug, Clone)]
pub struct HostTestResult {
    pub test_case: Arc<HostTestCase>,
    pub display_name: String,
    pub outcome: TestOutcome,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    pub error_message: Option<String>,
    pub error_stack_trace: Option<String>,
    pub error_line_number: Option<u32>,
    pub messages: Vec<TestResultMessage>,
}

/// Severity of a message sent to the host log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageLevel {
    Informational,
    Warning,
    Error,
}

/// Host message log
pub trait MessageLogger: Send + Sync {
    fn send_message(&self, level: MessageLevel, message: &str);
}

/// Receives test cases published during discovery, one at a time
pub trait DiscoverySink: Send + Sync {
    fn send_test_case(&self, test_case: Arc<HostTestCase>);
}

/// Receives per-test notifications during execution
pub trait ExecutionRecorder: MessageLogger {
    fn record_start(&self, test_case: &Arc<HostTestCase>);

    fn record_result(&self, result: HostTestResult);

    fn record_end(&self, test_case: &Arc<HostTestCase>, outcome: TestOutcome);
}

/// Host-provided settings for an execution request
pub trait RunContext: Send + Sync {
    /// Whether tests must run in an isolated execution boundary
    fn in_isolation(&self) -> bool;
}
