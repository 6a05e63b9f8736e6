//! Window policy - maps `(principal, period, now)` to a counter key and expiry.
//!
//! Counting is fixed-window: the counter for a window lives under one key and
//! expires when the window ends. A burst straddling a boundary can see up to
//! twice the nominal limit in a short span.

use chrono::{DateTime, TimeZone, Utc};

use super::Period;

/// Prefix shared by every counter key.
pub const KEY_PREFIX: &str = "rate_limit";

/// The counting window an instant falls into for one principal and period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub period: Period,
    /// `floor(now / period_duration)`.
    pub window_id: i64,
    /// `rate_limit:{principal}:{period}:{window_id}`
    pub key: String,
    /// Start of the next window.
    pub reset_at: DateTime<Utc>,
    /// Seconds until `reset_at`, never less than 1.
    pub ttl_secs: u64,
}

impl Window {
    pub fn compute(principal: &str, period: Period, now: DateTime<Utc>) -> Self {
        let duration = period.duration_secs();
        let now_secs = now.timestamp();
        let window_id = now_secs.div_euclid(duration);
        let reset_secs = (window_id + 1) * duration;

        Self {
            period,
            window_id,
            key: counter_key(principal, period, window_id),
            reset_at: Utc
                .timestamp_opt(reset_secs, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ttl_secs: (reset_secs - now_secs).max(1) as u64,
        }
    }

    /// Whole seconds from `now` until this window resets, floored at 1.
    pub fn retry_after(&self, now: DateTime<Utc>) -> u64 {
        (self.reset_at.timestamp() - now.timestamp()).max(1) as u64
    }
}

/// Store key for a principal's counter in one window.
///
/// Period and window id are always the last two segments, so keys stay
/// distinct across periods even when the principal contains `:`.
pub fn counter_key(principal: &str, period: Period, window_id: i64) -> String {
    format!("{KEY_PREFIX}:{principal}:{}:{window_id}", period.as_str())
}
