//! Exit codes for the CLI

use testrelay_adapter::RelayError;
use testrelay_core::ConfigError;

/// Success
pub const SUCCESS: u8 = 0;

/// General error
pub const ERROR: u8 = 1;

/// Configuration error
pub const CONFIG_ERROR: u8 = 2;

/// At least one test failed
pub const TESTS_FAILED: u8 = 10;

/// User cancelled
pub const CANCELLED: u8 = 130;

/// Exit code for an error that ended a command
pub fn for_error(error: &anyhow::Error) -> u8 {
    let config_error = error.chain().any(|cause| {
        cause.is::<ConfigError>()
            || matches!(cause.downcast_ref::<RelayError>(), Some(RelayError::Config(_)))
    });
    if config_error {
        CONFIG_ERROR
    } else {
        ERROR
    }
}
