//! Application state - shared across all handlers.

use std::sync::Arc;

use quota_core::ports::CounterStore;
use quota_core::{ConfigError, RateLimitEngine};
use quota_infra::InMemoryCounterStore;

use crate::config::AppConfig;
use crate::middleware::caller::CallerResolver;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RateLimitEngine>,
    pub resolver: CallerResolver,
    pub admin_token: Option<String>,
}

impl AppState {
    /// Build the application state around an already connected counter store.
    pub fn new(config: &AppConfig, store: Arc<dyn CounterStore>) -> Result<Self, ConfigError> {
        let engine = RateLimitEngine::new(store, config.rate_limit.clone())?;

        if config.admin_token.is_none() {
            tracing::warn!("ADMIN_TOKEN not set. Administrative routes are disabled.");
        }

        tracing::info!(
            enabled = config.rate_limit.enabled,
            periods = ?config.rate_limit.periods,
            failure_mode = %config.rate_limit.failure_mode,
            trust_identity_headers = config.trust_identity_headers,
            trust_proxy_headers = config.trust_proxy_headers,
            "Application state initialized"
        );

        Ok(Self {
            engine: Arc::new(engine),
            resolver: CallerResolver::new(config.trust_identity_headers)
                .with_trusted_proxy(config.trust_proxy_headers),
            admin_token: config.admin_token.clone(),
        })
    }
}

/// Connect the counter store, falling back to the in-memory store when Redis
/// is unreachable and the fallback is allowed.
#[cfg(feature = "redis")]
pub async fn connect_store(
    config: &AppConfig,
) -> Result<Arc<dyn CounterStore>, quota_core::ports::StoreError> {
    use quota_infra::RedisCounterStore;

    match RedisCounterStore::new(config.redis.clone()).await {
        Ok(store) => Ok(Arc::new(store)),
        Err(e) if config.redis.fallback_to_memory => {
            tracing::error!(
                error = %e,
                "Failed to connect to Redis. Using in-memory counters; limits are per instance."
            );
            Ok(Arc::new(InMemoryCounterStore::new()))
        }
        Err(e) => Err(e),
    }
}

#[cfg(not(feature = "redis"))]
pub async fn connect_store(
    _config: &AppConfig,
) -> Result<Arc<dyn CounterStore>, quota_core::ports::StoreError> {
    tracing::info!("Running without redis feature - using in-memory counter store");
    Ok(Arc::new(InMemoryCounterStore::new()))
}
