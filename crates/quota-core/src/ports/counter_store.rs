//! Counter store port - abstraction over the shared key/value store.

use async_trait::async_trait;

/// One counter to bump as part of a guarded batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterIncrement {
    pub key: String,
    /// Expiry attached to the counter if it has none.
    pub ttl_secs: u64,
    /// The batch is refused if this counter already holds `limit` or more.
    pub limit: u64,
}

/// Result of a guarded batch increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncrementOutcome {
    /// Every counter was incremented; new values in request order.
    Applied(Vec<u64>),
    /// Counter at `index` was already at its limit; nothing was incremented.
    Rejected { index: usize, current: u64 },
}

/// Counter store trait - shared, atomic counters with expiry.
///
/// Every method is a single round trip. A batch either completes or fails as
/// a whole from the caller's point of view.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read counters without mutating them. Absent keys read as 0.
    async fn read_many(&self, keys: &[String]) -> Result<Vec<u64>, StoreError>;

    /// Atomically check every counter against its limit and, if none is
    /// exhausted, increment all of them and attach the expiry to any counter
    /// lacking one.
    async fn increment_and_expire(
        &self,
        batch: &[CounterIncrement],
    ) -> Result<IncrementOutcome, StoreError>;

    /// Delete counters, returning how many existed.
    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError>;
}

/// Counter store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),
}
