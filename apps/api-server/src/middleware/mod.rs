//! Middleware modules.

pub mod caller;
pub mod error;
pub mod rate_limit;
