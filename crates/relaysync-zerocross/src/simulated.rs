//! Software zero-cross source.
//!
//! Edges are either fired by hand with [`SimulatedZeroCross::fire`] or by a
//! background thread that models an AC mains signal.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use portable_atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

use crate::edge::{EdgeCallback, EdgeLevel, ZeroCrossSource};
use crate::error::{ZeroCrossError, ZeroCrossResult};

/// Supported simulated mains frequencies, in Hz.
pub const MAINS_HZ_RANGE: core::ops::RangeInclusive<u32> = 1..=1000;

/// Zero-cross source driven from software.
#[derive(Default)]
pub struct SimulatedZeroCross {
    handler: Mutex<Option<(EdgeLevel, EdgeCallback)>>,
    enable_count: AtomicU64,
    disable_count: AtomicU64,
    fired: AtomicU64,
}

impl core::fmt::Debug for SimulatedZeroCross {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatedZeroCross")
            .field("enabled", &self.enabled_level())
            .field("enable_count", &self.enable_count())
            .field("disable_count", &self.disable_count())
            .finish()
    }
}

impl SimulatedZeroCross {
    /// Create a disabled source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one edge. Returns `true` if a handler accepted it.
    pub fn fire(&self, edge: EdgeLevel) -> bool {
        let callback = {
            let guard = self.handler.lock();
            match guard.as_ref() {
                Some((level, cb)) if level.accepts(edge) => Some(Arc::clone(cb)),
                _ => None,
            }
        };
        match callback {
            Some(cb) => {
                self.fired.fetch_add(1, Ordering::Relaxed);
                cb(edge);
                true
            }
            None => false,
        }
    }

    /// Level currently enabled, if any.
    #[must_use]
    pub fn enabled_level(&self) -> Option<EdgeLevel> {
        self.handler.lock().as_ref().map(|(level, _)| *level)
    }

    /// `true` while edge events are enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled_level().is_some()
    }

    /// Number of `enable_events` calls.
    #[must_use]
    pub fn enable_count(&self) -> u64 {
        self.enable_count.load(Ordering::Relaxed)
    }

    /// Number of `disable_events` calls.
    #[must_use]
    pub fn disable_count(&self) -> u64 {
        self.disable_count.load(Ordering::Relaxed)
    }

    /// Number of edges delivered to a handler.
    #[must_use]
    pub fn fired_count(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Start a background thread that fires alternating edges every
    /// semicycle of an `hz` mains signal, starting with a rising edge.
    ///
    /// # Errors
    ///
    /// Returns [`ZeroCrossError::InvalidFrequency`] for frequencies outside
    /// [`MAINS_HZ_RANGE`], or [`ZeroCrossError::Spawn`] if the thread cannot
    /// be created.
    pub fn start_mains(self: &Arc<Self>, hz: u32) -> ZeroCrossResult<MainsHandle> {
        if !MAINS_HZ_RANGE.contains(&hz) {
            return Err(ZeroCrossError::InvalidFrequency(hz));
        }
        let semicycle_us = 500_000 / u64::from(hz);
        let running = Arc::new(AtomicBool::new(true));
        let started_at = Instant::now();

        let source = Arc::clone(self);
        let flag = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("zc-mains".to_string())
            .spawn(move || {
                // Edges are scheduled against absolute deadlines so the
                // simulated phase does not drift with sleep overshoot.
                let period = Duration::from_micros(semicycle_us);
                let mut edge = EdgeLevel::Rising;
                let mut deadline = started_at;
                while flag.load(Ordering::Acquire) {
                    deadline += period;
                    thread::sleep(deadline.saturating_duration_since(Instant::now()));
                    source.fire(edge);
                    edge = edge.toggled();
                }
                debug!("Simulated mains thread exiting");
            })
            .map_err(|e| ZeroCrossError::Spawn(e.to_string()))?;

        info!(hz, semicycle_us, "Simulated mains started");
        Ok(MainsHandle {
            running,
            thread: Some(thread),
            semicycle_us,
            started_at,
        })
    }
}

impl ZeroCrossSource for SimulatedZeroCross {
    fn enable_events(&self, level: EdgeLevel, on_edge: EdgeCallback) {
        *self.handler.lock() = Some((level, on_edge));
        self.enable_count.fetch_add(1, Ordering::Relaxed);
    }

    fn disable_events(&self, _level: EdgeLevel) {
        *self.handler.lock() = None;
        self.disable_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Running simulated mains thread. Stops on drop.
#[derive(Debug)]
pub struct MainsHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    semicycle_us: u64,
    started_at: Instant,
}

impl MainsHandle {
    /// Semicycle period in microseconds.
    #[must_use]
    pub fn semicycle_us(&self) -> u64 {
        self.semicycle_us
    }

    /// Instant of the zero-cross preceding the first fired edge. Edge `k`
    /// (1-based) is due `k` semicycles after it.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("Simulated mains thread panicked");
        }
    }
}

impl Drop for MainsHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
