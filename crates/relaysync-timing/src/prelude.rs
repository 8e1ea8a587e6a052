//! Prelude module for common timing types.

pub use crate::MAX_BUSY_WAIT_US;
pub use crate::clock::{ManualClock, MonotonicClock, SystemClock};
pub use crate::sleep::{Sleeper, ThreadSleeper};
pub use crate::spin::BusyWait;
