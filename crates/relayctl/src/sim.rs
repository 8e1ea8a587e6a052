//! Simulated relays and feedback devices.
//!
//! The mains signal is modelled analytically from the instant the simulated
//! zero-cross thread started: zero-crosses fall on every multiple of the
//! semicycle. A relay's contact moves a fixed mechanical latency after the
//! command, and its feedback device reports how far that movement landed
//! from the nearest zero-cross.

use std::sync::Arc;
use std::time::{Duration, Instant};

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use parking_lot::Mutex;
use relaysync_calibration::{FeedbackResult, FeedbackStatus};
use relaysync_manager::{FeedbackDevice, Relay};
use tracing::trace;

use crate::config::SimRelayConfig;

/// Phase reference shared by every simulated device.
#[derive(Debug, Clone, Copy)]
pub struct MainsModel {
    epoch: Instant,
    semicycle_us: u64,
}

impl MainsModel {
    pub fn new(epoch: Instant, semicycle_us: u64) -> Self {
        Self {
            epoch,
            semicycle_us: semicycle_us.max(1),
        }
    }

    pub fn semicycle_us(&self) -> u64 {
        self.semicycle_us
    }

    /// Signed distance in µs from `at` to the nearest zero-cross. Positive
    /// values lie after the crossing.
    pub fn phase_error_us(&self, at: Instant) -> i64 {
        let since = u64::try_from(at.saturating_duration_since(self.epoch).as_micros())
            .unwrap_or(u64::MAX);
        let phase = since.checked_rem(self.semicycle_us).unwrap_or(0);
        let phase = i64::try_from(phase).unwrap_or(i64::MAX);
        let semicycle = i64::try_from(self.semicycle_us).unwrap_or(i64::MAX);
        if phase.saturating_mul(2) > semicycle {
            phase.saturating_sub(semicycle)
        } else {
            phase
        }
    }
}

/// Relay whose contact moves a fixed latency after each command.
#[derive(Debug)]
pub struct SimRelay {
    id: u8,
    mains: MainsModel,
    contact_on: Duration,
    contact_off: Duration,
    on: AtomicBool,
    on_error_us: AtomicI64,
    off_error_us: AtomicI64,
}

impl SimRelay {
    pub fn new(config: &SimRelayConfig, mains: MainsModel) -> Self {
        Self {
            id: config.id,
            mains,
            contact_on: Duration::from_micros(u64::from(config.contact_on_us)),
            contact_off: Duration::from_micros(u64::from(config.contact_off_us)),
            on: AtomicBool::new(false),
            on_error_us: AtomicI64::new(0),
            off_error_us: AtomicI64::new(0),
        }
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Acquire)
    }

    /// Phase error of the last contact closing.
    pub fn on_error_us(&self) -> i64 {
        self.on_error_us.load(Ordering::Acquire)
    }

    /// Phase error of the last contact opening.
    pub fn off_error_us(&self) -> i64 {
        self.off_error_us.load(Ordering::Acquire)
    }
}

impl Relay for SimRelay {
    fn id(&self) -> u8 {
        self.id
    }

    fn turn_on(&self) {
        let error = self.mains.phase_error_us(contact_instant(self.contact_on));
        self.on_error_us.store(error, Ordering::Release);
        self.on.store(true, Ordering::Release);
    }

    fn turn_off(&self) {
        let error = self.mains.phase_error_us(contact_instant(self.contact_off));
        self.off_error_us.store(error, Ordering::Release);
        self.on.store(false, Ordering::Release);
    }
}

fn contact_instant(latency: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(latency).unwrap_or(now)
}

/// Which transition the feedback device is measuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Idle,
    TurningOn,
    TurningOff,
}

/// Feedback device that reads the contact timing of one [`SimRelay`].
#[derive(Debug)]
pub struct SimFeedback {
    relay: Arc<SimRelay>,
    capture: Mutex<Capture>,
}

impl SimFeedback {
    pub fn new(relay: Arc<SimRelay>) -> Self {
        Self {
            relay,
            capture: Mutex::new(Capture::Idle),
        }
    }

    fn classify(&self, delta_us: u32) -> FeedbackResult {
        let delta = i64::from(delta_us);
        let semicycle_us = u32::try_from(self.relay.mains.semicycle_us()).unwrap_or(u32::MAX);
        let mut result = FeedbackResult {
            status: FeedbackStatus::empty(),
            t_on_us: 0,
            t_off_us: 0,
            t_semicycle_us: semicycle_us,
        };
        let capture = *self.capture.lock();
        match capture {
            Capture::TurningOn => {
                let error = self.relay.on_error_us();
                if error > delta {
                    result.status |= FeedbackStatus::TIME_ON_HIGH;
                } else if error < -delta {
                    result.status |= FeedbackStatus::TIME_ON_LOW;
                }
                result.t_on_us = u32::try_from(error.unsigned_abs()).unwrap_or(u32::MAX);
            }
            Capture::TurningOff => {
                let error = self.relay.off_error_us();
                if error < -delta {
                    result.status |= FeedbackStatus::TIME_OFF_HIGH;
                } else if error > delta {
                    result.status |= FeedbackStatus::TIME_OFF_LOW;
                }
                result.t_off_us = u32::try_from(error.unsigned_abs()).unwrap_or(u32::MAX);
            }
            Capture::Idle => return FeedbackResult::UNAVAILABLE,
        }
        result
    }
}

impl FeedbackDevice for SimFeedback {
    fn start(&self) {
        *self.capture.lock() = Capture::TurningOn;
    }

    fn resume(&self) {
        *self.capture.lock() = Capture::TurningOff;
    }

    fn pause(&self) {}

    fn stop(&self) {}

    fn result(&self, delta_us: u32) -> FeedbackResult {
        let result = self.classify(delta_us);
        trace!(relay = self.relay.id, ?result, "Simulated feedback");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEMICYCLE: u64 = 10_000;

    fn mains() -> (MainsModel, Instant) {
        let epoch = Instant::now();
        (MainsModel::new(epoch, SEMICYCLE), epoch)
    }

    #[test]
    fn phase_error_is_signed_around_crossings() {
        let (mains, epoch) = mains();
        assert_eq!(mains.phase_error_us(epoch), 0);
        assert_eq!(mains.phase_error_us(epoch + Duration::from_micros(300)), 300);
        assert_eq!(mains.phase_error_us(epoch + Duration::from_micros(9_700)), -300);
        assert_eq!(mains.phase_error_us(epoch + Duration::from_micros(25_000)), 5_000);
    }

    #[test]
    fn feedback_without_capture_is_unavailable() {
        let (mains, _) = mains();
        let relay = Arc::new(SimRelay::new(&SimRelayConfig::default(), mains));
        let feedback = SimFeedback::new(relay);
        assert_eq!(feedback.result(500), FeedbackResult::UNAVAILABLE);
    }

    #[test]
    fn late_closing_reports_time_on_high() {
        let (mains, _) = mains();
        let relay = Arc::new(SimRelay::new(&SimRelayConfig::default(), mains));
        let feedback = SimFeedback::new(Arc::clone(&relay));

        feedback.start();
        relay.on_error_us.store(2_000, Ordering::Release);
        let result = feedback.result(500);
        assert_eq!(result.status, FeedbackStatus::TIME_ON_HIGH);
        assert_eq!(result.t_on_us, 2_000);
        assert_eq!(result.t_semicycle_us, 10_000);

        relay.on_error_us.store(-2_000, Ordering::Release);
        assert_eq!(feedback.result(500).status, FeedbackStatus::TIME_ON_LOW);

        relay.on_error_us.store(400, Ordering::Release);
        assert!(feedback.result(500).status.is_clean());
    }

    #[test]
    fn early_opening_reports_time_off_high() {
        let (mains, _) = mains();
        let relay = Arc::new(SimRelay::new(&SimRelayConfig::default(), mains));
        let feedback = SimFeedback::new(Arc::clone(&relay));

        feedback.resume();
        relay.off_error_us.store(-1_000, Ordering::Release);
        assert_eq!(feedback.result(500).status, FeedbackStatus::TIME_OFF_HIGH);
        relay.off_error_us.store(1_000, Ordering::Release);
        assert_eq!(feedback.result(500).status, FeedbackStatus::TIME_OFF_LOW);
    }

    #[test]
    fn relay_tracks_contact_state() {
        let (mains, _) = mains();
        let relay = SimRelay::new(&SimRelayConfig::default(), mains);
        relay.turn_on();
        assert!(relay.is_on());
        relay.turn_off();
        assert!(!relay.is_on());
        assert_eq!(relay.id(), 0);
    }
}
