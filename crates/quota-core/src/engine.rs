//! Rate limit engine - fixed-window admission control over a shared counter store.
//!
//! Every request reads all period counters in one round trip, rejects without
//! counting if any period is exhausted, and otherwise increments all of them in
//! one guarded atomic batch. The guard re-checks the limits inside the store,
//! so concurrent requests from any number of processes never admit more than
//! the limit. The engine keeps no counter state of its own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::config::{FailureMode, RateLimitSettings};
use crate::domain::{
    Decision, Period, PeriodStatus, RateLimitExceeded, RateLimitStatus, Tier, Window,
};
use crate::error::{ConfigError, RateLimitError};
use crate::ports::{
    Clock, CounterIncrement, CounterStore, IncrementOutcome, StoreError, SystemClock,
};

/// A period's window for this request, paired with the principal's limit.
struct Slot {
    window: Window,
    limit: u64,
}

impl Slot {
    fn status(&self, count: u64) -> PeriodStatus {
        PeriodStatus {
            period: self.window.period,
            limit: self.limit,
            remaining: self.limit.saturating_sub(count),
            reset_at: self.window.reset_at,
        }
    }

    fn exceeded(&self, principal: &str, now: DateTime<Utc>) -> RateLimitExceeded {
        RateLimitExceeded {
            principal: principal.to_string(),
            period: self.window.period,
            limit: self.limit,
            reset_at: self.window.reset_at,
            retry_after: self.window.retry_after(now),
        }
    }
}

/// Admission control engine.
pub struct RateLimitEngine {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    settings: RateLimitSettings,
}

impl RateLimitEngine {
    /// Build an engine; settings are validated here so a bad configuration
    /// fails at startup rather than per request.
    pub fn new(
        store: Arc<dyn CounterStore>,
        settings: RateLimitSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            store,
            clock: Arc::new(SystemClock),
            settings,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    fn slots(&self, principal: &str, tier: Tier, now: DateTime<Utc>) -> Vec<Slot> {
        self.settings
            .periods
            .iter()
            .map(|&period| Slot {
                window: Window::compute(principal, period, now),
                limit: self.settings.limits.limit_for(tier, period),
            })
            .collect()
    }

    /// Admit the request and count it, or deny it without counting.
    pub async fn check_and_increment(
        &self,
        principal: &str,
        tier: Tier,
    ) -> Result<Decision, RateLimitError> {
        if !self.settings.enabled {
            debug!(principal = %principal, "Rate limiting disabled");
            return Ok(Decision::Allowed(RateLimitStatus::unlimited(principal)));
        }

        let now = self.clock.now();
        let slots = self.slots(principal, tier, now);
        let keys: Vec<String> = slots.iter().map(|s| s.window.key.clone()).collect();

        let counts = match self.store.read_many(&keys).await {
            Ok(counts) => counts,
            Err(e) => return self.degrade(principal, &slots, e).map(Decision::Allowed),
        };

        // Soonest-resetting exhausted period; `min_by_key` keeps the first on ties.
        let exhausted = slots
            .iter()
            .enumerate()
            .filter(|(i, slot)| counts.get(*i).copied().unwrap_or(0) >= slot.limit)
            .map(|(_, slot)| slot)
            .min_by_key(|slot| slot.window.reset_at);

        if let Some(slot) = exhausted {
            return Ok(Decision::Denied(self.deny(principal, slot, now)));
        }

        let batch: Vec<CounterIncrement> = slots
            .iter()
            .map(|slot| CounterIncrement {
                key: slot.window.key.clone(),
                ttl_secs: slot.window.ttl_secs,
                limit: slot.limit,
            })
            .collect();

        match self.store.increment_and_expire(&batch).await {
            Ok(IncrementOutcome::Applied(new_counts)) => {
                let periods: Vec<PeriodStatus> = slots
                    .iter()
                    .enumerate()
                    .map(|(i, slot)| slot.status(new_counts.get(i).copied().unwrap_or(slot.limit)))
                    .collect();

                debug!(
                    principal = %principal,
                    remaining = ?periods.iter().map(|p| (p.period.as_str(), p.remaining)).collect::<Vec<_>>(),
                    "Rate limit counters incremented"
                );

                Ok(Decision::Allowed(RateLimitStatus {
                    principal: principal.to_string(),
                    is_allowed: true,
                    degraded: false,
                    periods,
                }))
            }
            // Another request took the last slot between our read and the increment.
            Ok(IncrementOutcome::Rejected { index, current }) => match slots.get(index) {
                Some(slot) => {
                    debug!(
                        principal = %principal,
                        period = %slot.window.period,
                        current,
                        "Limit reached concurrently"
                    );
                    Ok(Decision::Denied(self.deny(principal, slot, now)))
                }
                None => self
                    .degrade(
                        principal,
                        &slots,
                        StoreError::Unavailable(format!("store rejected unknown counter {index}")),
                    )
                    .map(Decision::Allowed),
            },
            Err(e) => self.degrade(principal, &slots, e).map(Decision::Allowed),
        }
    }

    /// Current quota state without counting a request.
    pub async fn get_status(
        &self,
        principal: &str,
        tier: Tier,
    ) -> Result<RateLimitStatus, RateLimitError> {
        if !self.settings.enabled {
            return Ok(RateLimitStatus::unlimited(principal));
        }

        let now = self.clock.now();
        let slots = self.slots(principal, tier, now);
        let keys: Vec<String> = slots.iter().map(|s| s.window.key.clone()).collect();

        let counts = match self.store.read_many(&keys).await {
            Ok(counts) => counts,
            Err(e) => return self.degrade(principal, &slots, e),
        };

        let mut is_allowed = true;
        let periods = slots
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let count = counts.get(i).copied().unwrap_or(0);
                is_allowed &= count < slot.limit;
                slot.status(count)
            })
            .collect();

        Ok(RateLimitStatus {
            principal: principal.to_string(),
            is_allowed,
            degraded: false,
            periods,
        })
    }

    /// Delete the current-window counters of every period for a principal.
    ///
    /// Returns the number of counters that existed. Store faults are always
    /// returned to the caller.
    pub async fn reset_limits(&self, principal: &str) -> Result<u64, RateLimitError> {
        let now = self.clock.now();
        let keys: Vec<String> = Period::ALL
            .iter()
            .map(|&period| Window::compute(principal, period, now).key)
            .collect();

        match self.store.delete_many(&keys).await {
            Ok(deleted) => {
                info!(principal = %principal, keys_deleted = deleted, "Rate limits reset");
                Ok(deleted)
            }
            Err(e) => {
                error!(principal = %principal, error = %e, "Failed to reset rate limits");
                Err(e.into())
            }
        }
    }

    fn deny(&self, principal: &str, slot: &Slot, now: DateTime<Utc>) -> RateLimitExceeded {
        let exceeded = slot.exceeded(principal, now);
        info!(
            principal = %principal,
            period = %exceeded.period,
            limit = exceeded.limit,
            retry_after = exceeded.retry_after,
            "Rate limit exceeded"
        );
        exceeded
    }

    /// Apply the failure mode to a store fault.
    fn degrade(
        &self,
        principal: &str,
        slots: &[Slot],
        err: StoreError,
    ) -> Result<RateLimitStatus, RateLimitError> {
        let periods: Vec<&str> = slots.iter().map(|s| s.window.period.as_str()).collect();

        match self.settings.failure_mode {
            FailureMode::FailOpen => {
                error!(
                    principal = %principal,
                    periods = ?periods,
                    error = %err,
                    failure_mode = %FailureMode::FailOpen,
                    "Rate limit store unavailable, admitting request"
                );
                Ok(RateLimitStatus {
                    principal: principal.to_string(),
                    is_allowed: true,
                    degraded: true,
                    periods: slots.iter().map(|slot| slot.status(0)).collect(),
                })
            }
            FailureMode::FailClosed => {
                error!(
                    principal = %principal,
                    periods = ?periods,
                    error = %err,
                    failure_mode = %FailureMode::FailClosed,
                    "Rate limit store unavailable, rejecting request"
                );
                Err(err.into())
            }
        }
    }
}
