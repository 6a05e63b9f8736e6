//! Redis counter store - atomic guarded increments via a Lua script.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisResult, Script};
use tokio::sync::Semaphore;

use quota_core::ports::{CounterIncrement, CounterStore, IncrementOutcome, StoreError};

use super::config::RedisConfig;

/// Checks every counter against its limit, then increments all of them and
/// attaches the expiry to any counter without one. Runs atomically on the server.
///
/// KEYS: counter keys. ARGV: `ttl_1, limit_1, ttl_2, limit_2, ...`
/// Returns `{1, count_1, count_2, ...}` when applied and
/// `{0, index (1-based), current}` when a counter is already at its limit.
const GUARDED_INCREMENT: &str = r#"
for i, key in ipairs(KEYS) do
    local current = tonumber(redis.call('GET', key) or '0')
    local limit = tonumber(ARGV[i * 2])
    if current >= limit then
        return {0, i, current}
    end
end

local result = {1}
for i, key in ipairs(KEYS) do
    local count = redis.call('INCR', key)
    if count == 1 or redis.call('TTL', key) < 0 then
        redis.call('EXPIRE', key, tonumber(ARGV[i * 2 - 1]))
    end
    result[#result + 1] = count
end
return result
"#;

/// Redis-backed counter store shared by every API instance.
///
/// Uses a connection manager for automatic reconnection. In-flight calls are
/// bounded by `max_connections` permits, each call checking one out for its
/// duration.
pub struct RedisCounterStore {
    conn: ConnectionManager,
    config: RedisConfig,
    permits: Semaphore,
    script: Script,
}

impl RedisCounterStore {
    pub async fn new(config: RedisConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| StoreError::Unavailable("Connection timed out".to_string()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tracing::info!(
            url = %redacted(&config.url),
            max_connections = config.max_connections,
            "Connected to Redis counter store"
        );

        Ok(Self {
            conn,
            permits: Semaphore::new(config.max_connections.max(1)),
            script: Script::new(GUARDED_INCREMENT),
            config,
        })
    }

    /// Run one round trip with a checked-out permit.
    async fn call<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        bounded(
            &self.permits,
            self.config.command_timeout,
            op,
            f(self.conn.clone()),
        )
        .await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<u64>, StoreError> {
        let values: Vec<Option<u64>> = self
            .call("MGET", |mut conn| async move {
                redis::cmd("MGET").arg(keys).query_async(&mut conn).await
            })
            .await?;
        Ok(values.into_iter().map(|v| v.unwrap_or(0)).collect())
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn read_many(&self, keys: &[String]) -> Result<Vec<u64>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        // Reads are side-effect free, so one retry is safe.
        match self.mget(keys).await {
            Ok(counts) => Ok(counts),
            Err(e) => {
                tracing::warn!(error = %e, "Counter read failed, retrying once");
                self.mget(keys).await
            }
        }
    }

    async fn increment_and_expire(
        &self,
        batch: &[CounterIncrement],
    ) -> Result<IncrementOutcome, StoreError> {
        if batch.is_empty() {
            return Ok(IncrementOutcome::Applied(Vec::new()));
        }

        // Not retried: a lost reply may still have been applied.
        let reply: Vec<i64> = self
            .call("EVALSHA", |mut conn| async move {
                let mut invocation = self.script.prepare_invoke();
                for item in batch {
                    invocation.key(&item.key).arg(item.ttl_secs).arg(item.limit);
                }
                invocation.invoke_async(&mut conn).await
            })
            .await?;

        parse_increment_reply(&reply, batch.len())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }

        self.call("DEL", |mut conn| async move {
            redis::cmd("DEL").arg(keys).query_async(&mut conn).await
        })
        .await
    }
}

/// Await `command` once a permit is free. `limit` covers waiting for the
/// permit as well as the command itself.
async fn bounded<T, Fut>(
    permits: &Semaphore,
    limit: Duration,
    op: &'static str,
    command: Fut,
) -> Result<T, StoreError>
where
    Fut: Future<Output = RedisResult<T>>,
{
    let round_trip = async {
        let _permit = permits
            .acquire()
            .await
            .map_err(|_| StoreError::Unavailable("connection pool closed".to_string()))?;

        command
            .await
            .map_err(|e| StoreError::Unavailable(format!("{op} failed: {e}")))
    };

    match tokio::time::timeout(limit, round_trip).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Unavailable(format!(
            "{op} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

fn parse_increment_reply(reply: &[i64], expected: usize) -> Result<IncrementOutcome, StoreError> {
    let malformed = || StoreError::Unavailable(format!("malformed increment reply {reply:?}"));

    match reply.split_first() {
        Some((1, counts)) if counts.len() == expected => Ok(IncrementOutcome::Applied(
            counts.iter().map(|&c| c.max(0) as u64).collect(),
        )),
        Some((0, [index, current])) if *index >= 1 && (*index as usize) <= expected => {
            Ok(IncrementOutcome::Rejected {
                index: (*index - 1) as usize,
                current: (*current).max(0) as u64,
            })
        }
        _ => Err(malformed()),
    }
}

/// Hide the password part of a Redis URL for logging.
fn redacted(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
