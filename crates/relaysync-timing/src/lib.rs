//! Timing primitives for zero-cross synchronized relay switching.
//!
//! This crate provides the time base used by the edge handler and the worker:
//!
//! - **MonotonicClock**: microsecond time source, injectable so the switching
//!   contract can be tested without real spinning
//! - **BusyWait**: bounded spin until a delay has elapsed from an edge timestamp
//! - **Sleeper**: scheduler-based waits for the worker context
//!
//! # Edge-Context Guarantees
//!
//! - `BusyWait::wait_from` never yields to the scheduler
//! - The spin is bounded by a fixed ceiling regardless of the requested delay
//! - No heap allocations and no logging on the spin path
//!
//! # Example
//!
//! ```
//! use relaysync_timing::{BusyWait, ManualClock, MonotonicClock};
//!
//! let clock = ManualClock::with_step(10);
//! let spin = BusyWait::with_ceiling(50_000);
//!
//! let edge_us = clock.now_us();
//! let elapsed = spin.wait_from(&clock, edge_us, 8_000);
//! assert!(elapsed >= 8_000);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(unused_must_use)]

pub mod clock;
pub mod prelude;
pub mod sleep;
pub mod spin;

pub use clock::{ManualClock, MonotonicClock, SystemClock};
pub use sleep::{Sleeper, ThreadSleeper};
pub use spin::BusyWait;

/// Ceiling for any busy-wait performed from edge context (50ms).
pub const MAX_BUSY_WAIT_US: u32 = 50_000;
