//! Bounded busy-wait used by the zero-cross edge handler.
//!
//! Edge context cannot yield to a scheduler, so precise delays after a
//! zero-cross edge are produced by spinning on the clock. The spin is
//! bounded by a ceiling so a corrupt delay can never stall the edge context
//! for longer than one configured maximum.

use crate::MAX_BUSY_WAIT_US;
use crate::clock::MonotonicClock;

/// Busy-wait with a hard ceiling on the delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyWait {
    ceiling_us: u32,
}

impl BusyWait {
    /// Create a busy-wait that never spins longer than `ceiling_us`.
    pub const fn with_ceiling(ceiling_us: u32) -> Self {
        Self { ceiling_us }
    }

    /// Ceiling in microseconds.
    #[inline]
    pub fn ceiling_us(&self) -> u32 {
        self.ceiling_us
    }

    /// Delay actually honored for a requested delay.
    #[inline]
    pub fn bounded_delay_us(&self, delay_us: u32) -> u32 {
        delay_us.min(self.ceiling_us)
    }

    /// Spin until `delay_us` has elapsed since `start_us`.
    ///
    /// Returns the elapsed time observed when the spin exits, which is
    /// always `>=` the bounded delay.
    ///
    /// # RT-Safety
    ///
    /// O(delay) polls of the clock, no allocation, no blocking.
    pub fn wait_from(&self, clock: &dyn MonotonicClock, start_us: u64, delay_us: u32) -> u64 {
        let target_us = u64::from(self.bounded_delay_us(delay_us));
        loop {
            let elapsed_us = clock.now_us().saturating_sub(start_us);
            if elapsed_us >= target_us {
                return elapsed_us;
            }
            std::hint::spin_loop();
        }
    }
}

impl Default for BusyWait {
    fn default() -> Self {
        Self::with_ceiling(MAX_BUSY_WAIT_US)
    }
}
