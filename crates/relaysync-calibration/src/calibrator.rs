//! Closed-loop switching-delay calibration.
//!
//! After every switching cycle measured by a feedback device, the delta
//! window is re-derived from the measured half period and each reported
//! timing error nudges the corresponding delay by one delta.

use serde::{Deserialize, Serialize};

use crate::config::CalibrationConfig;
use crate::feedback::{FeedbackResult, FeedbackStatus};

/// Share of the measured semicycle excluded from the delta window, in percent.
///
/// The remaining 5% of a 10ms semicycle gives the 500µs default delta.
pub const DEFAULT_DELTA_PERCENT: u32 = 95;

/// Output of one calibration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// Updated config.
    pub config: CalibrationConfig,
    /// Status the update was computed from.
    pub status: FeedbackStatus,
    /// `true` if at least one delay was adjusted.
    pub adjusted: bool,
}

/// Delta window for a measured semicycle.
///
/// Returns `None` when the semicycle is too short to yield a non-zero delta.
pub fn delta_for_semicycle(t_semicycle_us: u32) -> Option<u32> {
    let delta = u64::from(100 - DEFAULT_DELTA_PERCENT) * u64::from(t_semicycle_us) / 100;
    u32::try_from(delta).ok().filter(|d| *d != 0)
}

/// Compute the config that follows `cfg` given a feedback result.
///
/// The delta is recomputed on every call. All error bits are applied in the
/// same pass using the new delta. A measurement whose semicycle would give a
/// zero delta keeps the previous delta.
pub fn calibrate(cfg: &CalibrationConfig, result: &FeedbackResult) -> Calibration {
    let mut next = *cfg;
    if let Some(delta) = delta_for_semicycle(result.t_semicycle_us) {
        next.delta_us = delta;
    }
    let delta = next.delta_us;
    let status = result.status;

    if status.contains(FeedbackStatus::TIME_ON_HIGH) {
        next.delay_on_us = next.delay_on_us.saturating_sub(delta);
    }
    if status.contains(FeedbackStatus::TIME_ON_LOW) {
        next.delay_on_us = next.delay_on_us.saturating_add(delta);
    }
    if status.contains(FeedbackStatus::TIME_OFF_HIGH) {
        next.delay_off_us = next.delay_off_us.saturating_add(delta);
    }
    if status.contains(FeedbackStatus::TIME_OFF_LOW) {
        next.delay_off_us = next.delay_off_us.saturating_sub(delta);
    }

    Calibration {
        config: next,
        status,
        adjusted: !status.is_empty(),
    }
}

/// When a calibrated config is written back to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistPolicy {
    /// Save whenever the calibrated config differs from the previous one,
    /// clean results included.
    #[default]
    OnChange,
    /// Mark the relay dirty on adjustment; save on the first clean result
    /// while dirty.
    OnConvergence,
}

impl PersistPolicy {
    /// Decide whether to persist, updating the relay's dirty marker.
    pub fn should_persist(
        self,
        previous: &CalibrationConfig,
        calibration: &Calibration,
        dirty: &mut bool,
    ) -> bool {
        let changed = *previous != calibration.config;
        match self {
            PersistPolicy::OnChange => {
                *dirty = false;
                changed
            }
            PersistPolicy::OnConvergence => {
                if calibration.adjusted {
                    *dirty = true;
                    return false;
                }
                if *dirty || changed {
                    *dirty = false;
                    return true;
                }
                false
            }
        }
    }
}
