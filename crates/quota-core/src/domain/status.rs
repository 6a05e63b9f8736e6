//! Engine outputs: per-period status, the exceeded signal and the decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Period;

/// Quota state of one period's current window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStatus {
    pub period: Period,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

/// Quota state of a principal across every configured period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub principal: String,
    /// AND across periods.
    pub is_allowed: bool,
    /// Set when the counter store could not be reached and the figures are
    /// the configured limits rather than counts.
    pub degraded: bool,
    pub periods: Vec<PeriodStatus>,
}

impl RateLimitStatus {
    /// Allowed status carrying no period figures (rate limiting disabled).
    pub fn unlimited(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            is_allowed: true,
            degraded: false,
            periods: Vec::new(),
        }
    }

    pub fn period(&self, period: Period) -> Option<&PeriodStatus> {
        self.periods.iter().find(|p| p.period == period)
    }

    /// Minimum remaining across all periods.
    pub fn requests_remaining(&self) -> Option<u64> {
        self.periods.iter().map(|p| p.remaining).min()
    }

    /// The period reported in response headers: lowest remaining, ties going
    /// to the longer period.
    pub fn most_restrictive(&self) -> Option<&PeriodStatus> {
        self.periods.iter().min_by(|a, b| {
            a.remaining
                .cmp(&b.remaining)
                .then_with(|| b.period.duration_secs().cmp(&a.period.duration_secs()))
        })
    }
}

/// Rejection signal for a request that hit an exhausted period.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Rate limit exceeded: {limit} requests per {period}. Try again in {retry_after} seconds.")]
pub struct RateLimitExceeded {
    pub principal: String,
    pub period: Period,
    pub limit: u64,
    pub reset_at: DateTime<Utc>,
    pub retry_after: u64,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed(RateLimitStatus),
    Denied(RateLimitExceeded),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn period(period: Period, limit: u64, remaining: u64) -> PeriodStatus {
        PeriodStatus {
            period,
            limit,
            remaining,
            reset_at: Utc.timestamp_opt(3_600, 0).unwrap(),
        }
    }

    fn status(periods: Vec<PeriodStatus>) -> RateLimitStatus {
        RateLimitStatus {
            principal: "test_user".to_string(),
            is_allowed: true,
            degraded: false,
            periods,
        }
    }

    #[test]
    fn test_requests_remaining_is_minimum() {
        let s = status(vec![
            period(Period::Minute, 10, 3),
            period(Period::Hour, 100, 50),
        ]);
        assert_eq!(s.requests_remaining(), Some(3));
        assert_eq!(RateLimitStatus::unlimited("x").requests_remaining(), None);
    }

    #[test]
    fn test_most_restrictive_prefers_lowest_remaining() {
        let s = status(vec![
            period(Period::Minute, 10, 9),
            period(Period::Hour, 100, 4),
        ]);
        assert_eq!(s.most_restrictive().unwrap().period, Period::Hour);
    }

    #[test]
    fn test_most_restrictive_tie_goes_to_longer_period() {
        let s = status(vec![
            period(Period::Minute, 10, 0),
            period(Period::Hour, 10, 0),
        ]);
        assert_eq!(s.most_restrictive().unwrap().period, Period::Hour);
    }

    #[test]
    fn test_exceeded_message() {
        let exceeded = RateLimitExceeded {
            principal: "test_user".to_string(),
            period: Period::Minute,
            limit: 10,
            reset_at: Utc.timestamp_opt(60, 0).unwrap(),
            retry_after: 42,
        };
        assert_eq!(
            exceeded.to_string(),
            "Rate limit exceeded: 10 requests per minute. Try again in 42 seconds."
        );
    }
}
