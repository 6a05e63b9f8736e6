//! Redis connection configuration.

use std::env;
use std::time::Duration;

use quota_core::ConfigError;

use crate::env::{parse_flag, parse_var};

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379/0)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Upper bound on a single store round trip
    pub command_timeout: Duration,
    /// Maximum number of in-flight store calls per process
    pub max_connections: usize,
    /// Whether to fall back to the in-memory store if Redis is unreachable at startup
    pub fallback_to_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_millis(500),
            max_connections: 10,
            fallback_to_memory: true,
        }
    }
}

impl RedisConfig {
    /// Build a URL from discrete connection parameters.
    pub fn url_from_parts(host: &str, port: u16, db: u32, password: Option<&str>) -> String {
        match password {
            Some(password) if !password.is_empty() => {
                format!("redis://:{password}@{host}:{port}/{db}")
            }
            _ => format!("redis://{host}:{port}/{db}"),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `REDIS_URL` wins; otherwise the URL is composed from `REDIS_HOST`,
    /// `REDIS_PORT`, `REDIS_DB` and `REDIS_PASSWORD`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let url = match env::var("REDIS_URL") {
            Ok(url) => url,
            Err(_) => Self::url_from_parts(
                &env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string()),
                parse_var("REDIS_PORT", 6379)?,
                parse_var("REDIS_DB", 0)?,
                env::var("REDIS_PASSWORD").ok().as_deref(),
            ),
        };

        let max_connections = parse_var("REDIS_MAX_CONNECTIONS", defaults.max_connections)?;
        if max_connections == 0 {
            return Err(ConfigError::invalid("REDIS_MAX_CONNECTIONS must be positive"));
        }

        Ok(Self {
            url,
            connect_timeout: Duration::from_secs(parse_var("REDIS_CONNECT_TIMEOUT_SECS", 5)?),
            command_timeout: Duration::from_millis(parse_var("REDIS_COMMAND_TIMEOUT_MS", 500)?),
            max_connections,
            fallback_to_memory: parse_flag(
                "REDIS_FALLBACK_TO_MEMORY",
                defaults.fallback_to_memory,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_from_parts() {
        assert_eq!(
            RedisConfig::url_from_parts("cache", 6380, 2, None),
            "redis://cache:6380/2"
        );
        assert_eq!(
            RedisConfig::url_from_parts("cache", 6380, 2, Some("s3cret")),
            "redis://:s3cret@cache:6380/2"
        );
        assert_eq!(
            RedisConfig::url_from_parts("cache", 6379, 0, Some("")),
            "redis://cache:6379/0"
        );
    }
}
