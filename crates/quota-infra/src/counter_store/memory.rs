//! In-memory counter store - used as fallback when Redis is unavailable.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use quota_core::ports::{CounterIncrement, CounterStore, IncrementOutcome, StoreError};

struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

impl CounterEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory counter store using a HashMap behind one async mutex.
///
/// Each batch runs under the lock, which gives it the same all-or-nothing
/// semantics as the Redis script.
/// Note: Counters are per-process, not shared across instances.
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, CounterEntry>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
        }
    }

    fn live_count(counters: &HashMap<String, CounterEntry>, key: &str, now: Instant) -> u64 {
        counters
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.count)
            .unwrap_or(0)
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn read_many(&self, keys: &[String]) -> Result<Vec<u64>, StoreError> {
        let counters = self.counters.lock().await;
        let now = Instant::now();
        Ok(keys
            .iter()
            .map(|key| Self::live_count(&counters, key, now))
            .collect())
    }

    async fn increment_and_expire(
        &self,
        batch: &[CounterIncrement],
    ) -> Result<IncrementOutcome, StoreError> {
        let mut counters = self.counters.lock().await;
        let now = Instant::now();

        for (index, item) in batch.iter().enumerate() {
            let current = Self::live_count(&counters, &item.key, now);
            if current >= item.limit {
                return Ok(IncrementOutcome::Rejected { index, current });
            }
        }

        // Drop stale windows while we hold the lock anyway.
        counters.retain(|_, entry| !entry.is_expired(now));

        let counts = batch
            .iter()
            .map(|item| {
                let entry = counters
                    .entry(item.key.clone())
                    .or_insert_with(|| CounterEntry {
                        count: 0,
                        expires_at: now + Duration::from_secs(item.ttl_secs),
                    });
                entry.count += 1;
                entry.count
            })
            .collect();

        Ok(IncrementOutcome::Applied(counts))
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError> {
        let mut counters = self.counters.lock().await;
        let now = Instant::now();
        let deleted = keys
            .iter()
            .filter_map(|key| counters.remove(key))
            .filter(|entry| !entry.is_expired(now))
            .count();
        Ok(deleted as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use quota_core::domain::LimitPolicy;
    use quota_core::ports::ManualClock;
    use quota_core::{Decision, Period, RateLimitEngine, RateLimitSettings, Tier};

    fn incr(key: &str, ttl_secs: u64, limit: u64) -> CounterIncrement {
        CounterIncrement {
            key: key.to_string(),
            ttl_secs,
            limit,
        }
    }

    #[tokio::test]
    async fn test_absent_keys_read_as_zero() {
        let store = InMemoryCounterStore::new();
        let counts = store.read_many(&["a".to_string(), "b".to_string()]).await.unwrap();
        assert_eq!(counts, vec![0, 0]);
    }

    #[tokio::test]
    async fn test_increment_batch() {
        let store = InMemoryCounterStore::new();
        let batch = [incr("m", 60, 5), incr("h", 3600, 50)];

        assert_eq!(
            store.increment_and_expire(&batch).await.unwrap(),
            IncrementOutcome::Applied(vec![1, 1])
        );
        assert_eq!(
            store.increment_and_expire(&batch).await.unwrap(),
            IncrementOutcome::Applied(vec![2, 2])
        );
        let counts = store.read_many(&["m".to_string(), "h".to_string()]).await.unwrap();
        assert_eq!(counts, vec![2, 2]);
    }

    #[tokio::test]
    async fn test_exhausted_counter_blocks_whole_batch() {
        let store = InMemoryCounterStore::new();
        store.increment_and_expire(&[incr("h", 3600, 1)]).await.unwrap();

        let outcome = store
            .increment_and_expire(&[incr("m", 60, 5), incr("h", 3600, 1)])
            .await
            .unwrap();
        assert_eq!(outcome, IncrementOutcome::Rejected { index: 1, current: 1 });

        // The minute counter was not touched.
        let counts = store.read_many(&["m".to_string()]).await.unwrap();
        assert_eq!(counts, vec![0]);
    }

    #[tokio::test]
    async fn test_counter_expires() {
        let store = InMemoryCounterStore::new();
        store.increment_and_expire(&[incr("k", 1, 10)]).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;

        let counts = store.read_many(&["k".to_string()]).await.unwrap();
        assert_eq!(counts, vec![0]);
        assert_eq!(
            store.increment_and_expire(&[incr("k", 1, 10)]).await.unwrap(),
            IncrementOutcome::Applied(vec![1])
        );
    }

    #[tokio::test]
    async fn test_delete_many() {
        let store = InMemoryCounterStore::new();
        store.increment_and_expire(&[incr("a", 60, 10)]).await.unwrap();

        let deleted = store
            .delete_many(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.read_many(&["a".to_string()]).await.unwrap(), vec![0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_admit_exactly_limit() {
        const LIMIT: u64 = 10;
        const REQUESTS: usize = 64;

        let store = Arc::new(InMemoryCounterStore::new());
        let settings = RateLimitSettings {
            periods: vec![Period::Minute, Period::Hour],
            limits: LimitPolicy::new()
                .with_limit(Period::Minute, LIMIT)
                .with_limit(Period::Hour, 1_000),
            ..Default::default()
        };
        // Mid-window so the test never straddles a boundary.
        let clock = Arc::new(ManualClock::at(1_700_000_030));
        let engine = Arc::new(
            RateLimitEngine::new(store.clone(), settings)
                .unwrap()
                .with_clock(clock),
        );

        let handles: Vec<_> = (0..REQUESTS)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine
                        .check_and_increment("fresh-principal", Tier::Standard)
                        .await
                        .unwrap()
                })
            })
            .collect();

        let decisions = futures::future::join_all(handles).await;
        let admitted = decisions
            .into_iter()
            .map(|d| d.unwrap())
            .filter(Decision::is_allowed)
            .count();

        assert_eq!(admitted as u64, LIMIT);

        let status = engine
            .get_status("fresh-principal", Tier::Standard)
            .await
            .unwrap();
        assert_eq!(status.period(Period::Minute).unwrap().remaining, 0);
        assert_eq!(status.period(Period::Hour).unwrap().remaining, 1_000 - LIMIT);
    }
}
