//! # Quota Infrastructure
//!
//! Concrete implementations of the [`quota_core::ports::CounterStore`] port.
//!
//! ## Feature Flags
//!
//! - `redis` (default) - Redis-backed counter store shared by every API instance

pub mod counter_store;
pub mod env;

// Re-exports - In-Memory
pub use counter_store::InMemoryCounterStore;

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use counter_store::{RedisConfig, RedisCounterStore};
