//! Application configuration loaded from environment variables.

use std::env;

use quota_core::domain::LimitPolicy;
use quota_core::{ConfigError, FailureMode, Period, RateLimitSettings};
use quota_infra::env::{parse_flag, parse_var};

#[cfg(feature = "redis")]
use quota_infra::RedisConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    #[cfg(feature = "redis")]
    pub redis: RedisConfig,
    pub rate_limit: RateLimitSettings,
    /// Take the principal from `X-User-Id`/`X-User-Tier` set by an upstream
    /// authenticator instead of the client address.
    pub trust_identity_headers: bool,
    /// Take the client address from forwarding headers set by a reverse proxy
    /// instead of the socket peer.
    pub trust_proxy_headers: bool,
    /// Bearer token for the administrative routes; unset disables them.
    pub admin_token: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 8080)?,
            #[cfg(feature = "redis")]
            redis: RedisConfig::from_env()?,
            rate_limit: rate_limit_from_env()?,
            trust_identity_headers: parse_flag("TRUST_IDENTITY_HEADERS", false)?,
            trust_proxy_headers: parse_flag("TRUST_PROXY_HEADERS", false)?,
            admin_token: env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty()),
        })
    }
}

/// Build the engine settings from `RATE_LIMIT_*` variables.
///
/// The day limit defaults to 24 times the hour limit and premium limits to
/// the engine's standard multiplier unless set explicitly.
fn rate_limit_from_env() -> Result<RateLimitSettings, ConfigError> {
    let defaults = RateLimitSettings::default();

    let periods = match env::var("RATE_LIMIT_PERIODS") {
        Ok(raw) => parse_periods(&raw)?,
        Err(_) => defaults.periods,
    };

    let per_minute: u64 = parse_var("RATE_LIMIT_PER_MINUTE", 10)?;
    let per_hour: u64 = parse_var("RATE_LIMIT_PER_HOUR", 100)?;
    let per_day: u64 = parse_var("RATE_LIMIT_PER_DAY", per_hour.saturating_mul(24))?;

    let mut limits = LimitPolicy::new()
        .with_limit(Period::Minute, per_minute)
        .with_limit(Period::Hour, per_hour)
        .with_limit(Period::Day, per_day);

    for period in Period::ALL {
        let name = format!("RATE_LIMIT_PREMIUM_PER_{}", period.as_str().to_uppercase());
        if env::var(&name).is_ok() {
            limits = limits.with_premium_limit(period, parse_var(&name, 0)?);
        }
    }

    let settings = RateLimitSettings {
        enabled: parse_flag("RATE_LIMIT_ENABLED", defaults.enabled)?,
        periods,
        limits,
        failure_mode: parse_var::<FailureMode>("RATE_LIMIT_FAILURE_MODE", defaults.failure_mode)?,
    };
    settings.validate()?;
    Ok(settings)
}

/// Parse a comma separated period list such as `minute,hour`.
fn parse_periods(raw: &str) -> Result<Vec<Period>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::parse)
        .collect()
}
