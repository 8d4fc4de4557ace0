//! testrelay Core - Shared model and contracts for the test relay
//!
//! This crate defines both sides of the bridge between a host test platform
//! and an external test engine:
//!
//! - **Host side**: flat test cases, results, outcomes, and the sinks and
//!   recorders the host hands to the adapter.
//! - **Engine side**: hierarchical test descriptors, step runs, structured
//!   logs, filters, and the driver/loader/launcher services the engine exposes.
//!
//! It also carries configuration loading and the error types shared by every
//! crate in the workspace.

pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;

pub use cancel::CancellationHandle;
pub use config::{load_config, load_config_or_default, Config};
pub use error::{ConfigError, EngineError, EngineResult, Result};
pub use host::{
    DiscoverySink, ExecutionRecorder, HostTestCase, HostTestResult, MessageLevel, MessageLogger,
    PropertyKeys, PropertyValue, RunContext, TestOutcome, TestProperty, TestResultMessage,
};
