//! Ordered record of collaborator calls.

use std::sync::Arc;

use parking_lot::Mutex;
use relaysync_manager::RelayAction;
use relaysync_zerocross::EdgeLevel;

/// One observed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    /// `FeedbackDevice::start` on a relay.
    FeedbackStart(u8),
    /// `FeedbackDevice::resume`.
    FeedbackResume(u8),
    /// `FeedbackDevice::pause`.
    FeedbackPause(u8),
    /// `FeedbackDevice::stop`.
    FeedbackStop(u8),
    /// `FeedbackDevice::result` with the delta passed in.
    FeedbackRead(u8, u32),
    /// Worker sleep, in ms.
    Sleep(u32),
    /// Zero-cross events enabled.
    Arm(EdgeLevel),
    /// Zero-cross events disabled.
    Disarm(EdgeLevel),
    /// Edge delivered to the armed handler.
    Edge(EdgeLevel),
    /// `Relay::turn_on`.
    TurnOn(u8),
    /// `Relay::turn_off`.
    TurnOff(u8),
    /// Zero-cross tester invoked.
    Tester,
    /// Status notification.
    Status(RelayAction),
    /// Feedback-availability notification.
    FeedbackByte(u8),
}

/// Shared, cloneable event log.
#[derive(Debug, Clone, Default)]
pub struct EventTrace(Arc<Mutex<Vec<TraceEvent>>>);

impl EventTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: TraceEvent) {
        self.0.lock().push(event);
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// Index of the first occurrence of `event`.
    pub fn position(&self, event: TraceEvent) -> Option<usize> {
        self.0.lock().iter().position(|e| *e == event)
    }

    /// Count of events matching `pred`.
    pub fn count(&self, pred: impl Fn(&TraceEvent) -> bool) -> usize {
        self.0.lock().iter().filter(|e| pred(e)).count()
    }
}
