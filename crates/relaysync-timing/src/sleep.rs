//! Scheduler-based waits for the worker context.

use std::time::Duration;

/// Blocking wait used by the worker between switching phases
/// (capture stabilization, inrush settle).
///
/// Never call from edge context.
pub trait Sleeper: Send + Sync {
    /// Block the calling thread for `ms` milliseconds.
    fn sleep_ms(&self, ms: u32);
}

/// Sleeper backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep_ms(&self, ms: u32) {
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(u64::from(ms)));
        }
    }
}
