//! Engine-level error types.

use thiserror::Error;

use crate::ports::StoreError;

/// Errors the engine lets through to its caller.
///
/// A rate limit rejection is not an error; it is a [`crate::Decision::Denied`].
/// Store faults only surface here when the engine runs in fail-closed mode,
/// or for administrative operations.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Rate limit store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

/// Configuration errors - fatal at startup, never raised per request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}
