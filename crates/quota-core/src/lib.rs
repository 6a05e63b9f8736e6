//! # Quota Core
//!
//! Per-principal admission control for an HTTP API.
//! This crate holds the window arithmetic, the rate limit engine and the
//! decision surface. It performs no I/O itself; counters live behind the
//! [`ports::CounterStore`] port.

pub mod config;
pub mod decision;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ports;

pub use config::{FailureMode, RateLimitSettings};
pub use domain::{Decision, Period, RateLimitExceeded, RateLimitStatus, Tier};
pub use engine::RateLimitEngine;
pub use error::{ConfigError, RateLimitError};
