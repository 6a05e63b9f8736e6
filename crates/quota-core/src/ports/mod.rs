//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod clock;
mod counter_store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter_store::{CounterIncrement, CounterStore, IncrementOutcome, StoreError};
