//! Rate limit settings, constructed once at startup and validated eagerly.

use std::fmt;
use std::str::FromStr;

use crate::domain::{LimitPolicy, Period, Tier};
use crate::error::ConfigError;

/// What the engine does when the counter store cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureMode {
    /// Admit the request and report the configured limits as remaining.
    #[default]
    FailOpen,
    /// Surface the store fault so the boundary answers 503.
    FailClosed,
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureMode::FailOpen => f.write_str("fail-open"),
            FailureMode::FailClosed => f.write_str("fail-closed"),
        }
    }
}

impl FromStr for FailureMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "fail-open" | "fail_open" => Ok(FailureMode::FailOpen),
            "closed" | "fail-closed" | "fail_closed" => Ok(FailureMode::FailClosed),
            other => Err(ConfigError::invalid(format!("unknown failure mode '{other}'"))),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub enabled: bool,
    /// Periods checked on every request, in reporting order.
    pub periods: Vec<Period>,
    pub limits: LimitPolicy,
    pub failure_mode: FailureMode,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            periods: vec![Period::Minute, Period::Hour],
            limits: LimitPolicy::new()
                .with_limit(Period::Minute, 10)
                .with_limit(Period::Hour, 100)
                .with_limit(Period::Day, 100 * 24),
            failure_mode: FailureMode::FailOpen,
        }
    }
}

impl RateLimitSettings {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.periods.is_empty() {
            return Err(ConfigError::invalid("no rate limit periods configured"));
        }
        for (i, period) in self.periods.iter().enumerate() {
            if self.periods[..i].contains(period) {
                return Err(ConfigError::invalid(format!(
                    "period '{period}' configured twice"
                )));
            }
            for tier in [Tier::Standard, Tier::Premium] {
                match self.limits.get(tier, *period) {
                    Some(limit) if limit > 0 => {}
                    _ => {
                        return Err(ConfigError::invalid(format!(
                            "{tier} limit for period '{period}' must be positive"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
