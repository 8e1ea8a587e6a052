//! Synchronization state shared between the worker and edge context.
//!
//! All transitions are single compare-exchange operations so they are safe
//! to call from edge (interrupt) context.

use portable_atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::{ZeroCrossError, ZeroCrossResult};

/// Synchronization status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum SyncStatus {
    /// No action pending; edges are ignored.
    #[default]
    Idle = 0,
    /// An action is armed and waiting for an edge.
    Pending = 1,
    /// An edge has claimed the action and is switching the relay.
    Switching = 2,
}

impl SyncStatus {
    /// Convert from raw u32 value.
    #[must_use]
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Pending),
            2 => Some(Self::Switching),
            _ => None,
        }
    }

    /// Convert to raw u32 value.
    #[must_use]
    pub fn to_raw(self) -> u32 {
        self as u32
    }

    /// Get the status as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Pending => "Pending",
            Self::Switching => "Switching",
        }
    }
}

impl core::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of synchronization counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncMetrics {
    /// Successful arms.
    pub arm_count: u64,
    /// Edges that claimed a pending action.
    pub switch_count: u64,
    /// Edges that found nothing pending.
    pub ignored_edges: u64,
    /// Pending actions cancelled before an edge arrived.
    pub cancel_count: u64,
}

/// Atomic pending/idle flag with counters.
#[derive(Debug, Default)]
pub struct SyncState {
    status: AtomicU32,
    arm_count: AtomicU64,
    switch_count: AtomicU64,
    ignored_edges: AtomicU64,
    cancel_count: AtomicU64,
}

impl SyncState {
    /// Create a state in `Idle`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        let raw = self.status.load(Ordering::Acquire);
        SyncStatus::from_raw(raw).unwrap_or(SyncStatus::Idle)
    }

    /// `true` while an action is armed or being switched.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status() != SyncStatus::Idle
    }

    /// Idle -> Pending. Worker context.
    ///
    /// # Errors
    ///
    /// Returns [`ZeroCrossError::AlreadyPending`] if a synchronization is
    /// already armed or switching.
    pub fn arm(&self) -> ZeroCrossResult<()> {
        match self.transition(SyncStatus::Idle, SyncStatus::Pending) {
            Ok(()) => {
                self.arm_count.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(current) => Err(ZeroCrossError::AlreadyPending(current.as_str())),
        }
    }

    /// Pending -> Switching. Edge context.
    ///
    /// Returns `false` (and counts an ignored edge) when nothing is pending.
    pub fn claim(&self) -> bool {
        if self
            .transition(SyncStatus::Pending, SyncStatus::Switching)
            .is_ok()
        {
            self.switch_count.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            self.ignored_edges.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Switching -> Idle. Edge context, after the relay was commanded.
    ///
    /// # Errors
    ///
    /// Returns an invalid transition error if the state is not `Switching`.
    pub fn complete(&self) -> ZeroCrossResult<()> {
        self.transition(SyncStatus::Switching, SyncStatus::Idle)
            .map_err(|current| ZeroCrossError::invalid_transition(current.as_str(), "Idle"))
    }

    /// Pending -> Idle without switching. Worker context.
    ///
    /// Returns `false` if an edge already claimed the action.
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .transition(SyncStatus::Pending, SyncStatus::Idle)
            .is_ok();
        if cancelled {
            self.cancel_count.fetch_add(1, Ordering::Relaxed);
        }
        cancelled
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn metrics(&self) -> SyncMetrics {
        SyncMetrics {
            arm_count: self.arm_count.load(Ordering::Relaxed),
            switch_count: self.switch_count.load(Ordering::Relaxed),
            ignored_edges: self.ignored_edges.load(Ordering::Relaxed),
            cancel_count: self.cancel_count.load(Ordering::Relaxed),
        }
    }

    fn transition(&self, from: SyncStatus, to: SyncStatus) -> Result<(), SyncStatus> {
        self.status
            .compare_exchange(from.to_raw(), to.to_raw(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|raw| SyncStatus::from_raw(raw).unwrap_or(SyncStatus::Idle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle() -> ZeroCrossResult<()> {
        let state = SyncState::new();
        assert_eq!(state.status(), SyncStatus::Idle);

        state.arm()?;
        assert!(state.is_pending());
        assert!(state.claim());
        assert_eq!(state.status(), SyncStatus::Switching);
        state.complete()?;
        assert_eq!(state.status(), SyncStatus::Idle);

        let metrics = state.metrics();
        assert_eq!(metrics.arm_count, 1);
        assert_eq!(metrics.switch_count, 1);
        Ok(())
    }

    #[test]
    fn test_double_arm_rejected() -> ZeroCrossResult<()> {
        let state = SyncState::new();
        state.arm()?;
        assert_eq!(state.arm(), Err(ZeroCrossError::AlreadyPending("Pending")));
        assert!(state.claim());
        assert_eq!(state.arm(), Err(ZeroCrossError::AlreadyPending("Switching")));
        Ok(())
    }

    #[test]
    fn test_idle_edge_ignored() {
        let state = SyncState::new();
        assert!(!state.claim());
        assert_eq!(state.metrics().ignored_edges, 1);
    }

    #[test]
    fn test_cancel_only_from_pending() -> ZeroCrossResult<()> {
        let state = SyncState::new();
        assert!(!state.cancel());
        state.arm()?;
        assert!(state.claim());
        assert!(!state.cancel());
        state.complete()?;
        state.arm()?;
        assert!(state.cancel());
        assert_eq!(state.status(), SyncStatus::Idle);
        Ok(())
    }

    #[test]
    fn test_complete_requires_switching() {
        let state = SyncState::new();
        assert!(matches!(
            state.complete(),
            Err(ZeroCrossError::InvalidTransition { from: "Idle", .. })
        ));
    }

    #[test]
    fn test_status_raw_roundtrip() {
        for status in [SyncStatus::Idle, SyncStatus::Pending, SyncStatus::Switching] {
            assert_eq!(SyncStatus::from_raw(status.to_raw()), Some(status));
        }
        assert_eq!(SyncStatus::from_raw(9), None);
    }
}
