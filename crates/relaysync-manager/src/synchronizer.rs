//! Zero-cross synchronized switching.
//!
//! The worker parks a [`PendingSwitch`] in a slot, marks the action pending,
//! enables edge events and blocks on the rendezvous. The first accepted edge
//! claims the action, busy-waits the configured delay from the edge
//! timestamp, commands the relay and releases the worker.
//!
//! Nothing on the edge path logs, allocates or sleeps. It takes two short
//! locks (the pending slot and the tester), which the worker never holds
//! while edge events are enabled.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use portable_atomic::{AtomicU64, Ordering};
use relaysync_timing::{BusyWait, MonotonicClock};
use relaysync_zerocross::{
    EdgeLevel, Rendezvous, SyncMetrics, SyncState, SyncStatus, ZeroCrossResult, ZeroCrossSource,
};
use tracing::{debug, error, warn};

use crate::action::RelayRequest;
use crate::hardware::Relay;

/// Observer invoked from edge context right after each synchronized switch.
pub type ZeroCrossTester = Arc<dyn Fn() + Send + Sync>;

/// The single action in flight.
pub struct PendingSwitch {
    /// Relay to command.
    pub relay: Arc<dyn Relay>,
    /// Transition to perform.
    pub request: RelayRequest,
    /// Delay from the edge to the command, in µs.
    pub delay_us: u32,
}

impl std::fmt::Debug for PendingSwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSwitch")
            .field("relay", &self.relay.id())
            .field("request", &self.request)
            .field("delay_us", &self.delay_us)
            .finish()
    }
}

/// How a synchronized switch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The relay was commanded.
    Switched,
    /// No edge arrived within the rendezvous timeout; the relay was not
    /// touched.
    TimedOut,
}

/// Arms zero-cross events and performs the edge-timed switch.
pub struct ZeroCrossSynchronizer {
    source: Option<Arc<dyn ZeroCrossSource>>,
    level: EdgeLevel,
    clock: Arc<dyn MonotonicClock>,
    spin: BusyWait,
    state: SyncState,
    rendezvous: Rendezvous,
    slot: Mutex<Option<PendingSwitch>>,
    tester: RwLock<Option<ZeroCrossTester>>,
    last_elapsed_us: AtomicU64,
}

impl std::fmt::Debug for ZeroCrossSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZeroCrossSynchronizer")
            .field("synchronized", &self.is_synchronized())
            .field("level", &self.level)
            .field("status", &self.state.status())
            .finish_non_exhaustive()
    }
}

impl ZeroCrossSynchronizer {
    /// Create a synchronizer. Without a `source` every switch runs directly
    /// on the calling thread.
    pub fn new(
        source: Option<Arc<dyn ZeroCrossSource>>,
        level: EdgeLevel,
        clock: Arc<dyn MonotonicClock>,
    ) -> Self {
        Self {
            source,
            level,
            clock,
            spin: BusyWait::default(),
            state: SyncState::new(),
            rendezvous: Rendezvous::new(),
            slot: Mutex::new(None),
            tester: RwLock::new(None),
            last_elapsed_us: AtomicU64::new(0),
        }
    }

    /// `true` if a zero-cross source is configured.
    pub fn is_synchronized(&self) -> bool {
        self.source.is_some()
    }

    /// Edge level events are armed for.
    pub fn level(&self) -> EdgeLevel {
        self.level
    }

    /// Install or clear the edge-context observer.
    pub fn attach_tester(&self, tester: Option<ZeroCrossTester>) {
        *self.tester.write() = tester;
    }

    /// Current synchronization status.
    pub fn status(&self) -> SyncStatus {
        self.state.status()
    }

    /// Synchronization counters.
    pub fn metrics(&self) -> SyncMetrics {
        self.state.metrics()
    }

    /// Edge-to-command delay observed on the last switch, in µs.
    pub fn last_elapsed_us(&self) -> u64 {
        self.last_elapsed_us.load(Ordering::Relaxed)
    }

    /// Perform one switch and block until it has happened.
    ///
    /// With a zero-cross source the switch runs in edge context; `timeout`
    /// bounds the wait for the edge (`None` waits indefinitely). Without a
    /// source the switch runs immediately on this thread.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyPending` if another switch is in flight.
    pub fn execute(
        self: &Arc<Self>,
        switch: PendingSwitch,
        timeout: Option<Duration>,
    ) -> ZeroCrossResult<SwitchOutcome> {
        // Edge events are still disabled here, so no edge can claim the
        // action before the slot is filled. A rejected call leaves the slot
        // of the action in flight alone.
        self.state.arm()?;
        *self.slot.lock() = Some(switch);

        let Some(source) = &self.source else {
            self.on_edge(EdgeLevel::Both);
            self.rendezvous.try_acquire();
            return Ok(SwitchOutcome::Switched);
        };

        debug!(level = ?self.level, "Arming zero-cross events");
        source.enable_events(self.level, self.edge_callback());

        let signalled = match timeout {
            Some(limit) => self.rendezvous.wait_timeout(limit),
            None => self.rendezvous.wait(),
        };

        source.disable_events(self.level);

        if signalled {
            return Ok(SwitchOutcome::Switched);
        }

        if self.state.cancel() {
            *self.slot.lock() = None;
            error!(?timeout, "No zero-cross edge before timeout, action abandoned");
            return Ok(SwitchOutcome::TimedOut);
        }

        // An edge claimed the action while we were disarming.
        warn!("Zero-cross edge raced the rendezvous timeout");
        self.rendezvous.wait();
        Ok(SwitchOutcome::Switched)
    }

    /// Edge handler. Runs in edge context.
    pub fn on_edge(&self, _edge: EdgeLevel) {
        let edge_us = self.clock.now_us();
        if !self.state.claim() {
            return;
        }

        if let Some(switch) = self.slot.lock().take() {
            let elapsed = self
                .spin
                .wait_from(self.clock.as_ref(), edge_us, switch.delay_us);
            match switch.request {
                RelayRequest::On => switch.relay.turn_on(),
                RelayRequest::Off => switch.relay.turn_off(),
            }
            self.last_elapsed_us.store(elapsed, Ordering::Relaxed);
        }

        if let Some(tester) = self.tester.read().as_ref() {
            tester();
        }

        if self.state.complete().is_ok() {
            self.rendezvous.release();
        }
    }

    fn edge_callback(self: &Arc<Self>) -> relaysync_zerocross::EdgeCallback {
        let weak: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |edge| {
            if let Some(sync) = weak.upgrade() {
                sync.on_edge(edge);
            }
        })
    }
}
