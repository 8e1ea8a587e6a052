//! Monotonic microsecond clocks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic time source with microsecond resolution.
///
/// Implementations must be callable from edge (interrupt) context: no
/// blocking, no allocation.
pub trait MonotonicClock: Send + Sync {
    /// Microseconds since an arbitrary, fixed origin. Never decreases.
    fn now_us(&self) -> u64;
}

/// Clock backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is the moment of construction.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    #[inline]
    fn now_us(&self) -> u64 {
        let micros = self.epoch.elapsed().as_micros();
        u64::try_from(micros).unwrap_or(u64::MAX)
    }
}

/// Deterministic clock for hosted tests.
///
/// Every read returns the current value and then advances it by `step_us`,
/// so a busy-wait against this clock terminates after a predictable number
/// of polls without any real time passing.
#[derive(Debug)]
pub struct ManualClock {
    now_us: AtomicU64,
    step_us: u64,
}

impl ManualClock {
    /// Clock starting at zero that advances 1µs per read.
    pub fn new() -> Self {
        Self::with_step(1)
    }

    /// Clock starting at zero that advances `step_us` per read.
    ///
    /// A step of zero is promoted to one so spinning always terminates.
    pub fn with_step(step_us: u64) -> Self {
        Self {
            now_us: AtomicU64::new(0),
            step_us: step_us.max(1),
        }
    }

    /// Move the clock forward without reading it.
    pub fn advance(&self, us: u64) {
        self.now_us.fetch_add(us, Ordering::AcqRel);
    }

    /// Current value without advancing.
    pub fn peek_us(&self) -> u64 {
        self.now_us.load(Ordering::Acquire)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for ManualClock {
    #[inline]
    fn now_us(&self) -> u64 {
        self.now_us.fetch_add(self.step_us, Ordering::AcqRel)
    }
}
