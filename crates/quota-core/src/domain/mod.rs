//! Domain types - periods, windows, tiers and engine outcomes.

mod period;
mod status;
mod tier;
pub mod window;

pub use period::Period;
pub use status::{Decision, PeriodStatus, RateLimitExceeded, RateLimitStatus};
pub use tier::{DEFAULT_PREMIUM_MULTIPLIER, LimitPolicy, Tier};
pub use window::Window;
