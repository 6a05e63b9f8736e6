//! Counter store implementations - Redis and in-memory fallback.

mod memory;

pub use memory::InMemoryCounterStore;

#[cfg(feature = "redis")]
mod config;
#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::config::RedisConfig;
#[cfg(feature = "redis")]
pub use self::redis::RedisCounterStore;
