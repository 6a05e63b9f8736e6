//! Principal tiers and per-period limits.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Period;
use crate::error::ConfigError;

/// Quota tier of a principal, resolved by the caller before the engine runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Standard,
    Premium,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Standard => "standard",
            Tier::Premium => "premium",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "free" => Ok(Tier::Standard),
            "premium" => Ok(Tier::Premium),
            other => Err(ConfigError::invalid(format!("unknown tier '{other}'"))),
        }
    }
}

/// Multiplier applied to standard limits when no premium limit is configured.
pub const DEFAULT_PREMIUM_MULTIPLIER: u64 = 10;

/// Maximum allowed count per tier and period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimitPolicy {
    standard: BTreeMap<Period, u64>,
    premium: BTreeMap<Period, u64>,
}

impl LimitPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the standard-tier limit for a period.
    pub fn with_limit(mut self, period: Period, limit: u64) -> Self {
        self.standard.insert(period, limit);
        self
    }

    /// Set an explicit premium-tier limit for a period.
    pub fn with_premium_limit(mut self, period: Period, limit: u64) -> Self {
        self.premium.insert(period, limit);
        self
    }

    /// Limit for `(tier, period)`, or `None` if the period has no standard limit.
    pub fn get(&self, tier: Tier, period: Period) -> Option<u64> {
        let standard = *self.standard.get(&period)?;
        Some(match tier {
            Tier::Standard => standard,
            Tier::Premium => self
                .premium
                .get(&period)
                .copied()
                .unwrap_or_else(|| standard.saturating_mul(DEFAULT_PREMIUM_MULTIPLIER)),
        })
    }

    /// Limit for `(tier, period)`; an unconfigured period yields 0.
    ///
    /// Settings validation rejects configured periods without a limit, so the
    /// engine never sees the 0.
    pub fn limit_for(&self, tier: Tier, period: Period) -> u64 {
        self.get(tier, period).unwrap_or(0)
    }
}
