//! Recording mocks for the manager's collaborators.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use relaysync_calibration::FeedbackResult;
use relaysync_manager::{FeedbackDevice, Notifier, Publisher, RelayAction, Relay};
use relaysync_timing::{MonotonicClock, Sleeper};
use relaysync_zerocross::{EdgeCallback, EdgeLevel, ZeroCrossSource};

use crate::trace::{EventTrace, TraceEvent};

/// Relay that records every command.
pub struct MockRelay {
    id: u8,
    trace: EventTrace,
    clock: Option<Arc<dyn MonotonicClock>>,
    switched_at: Mutex<Vec<u64>>,
    on: Mutex<bool>,
}

impl MockRelay {
    pub fn new(id: u8, trace: &EventTrace) -> Self {
        Self {
            id,
            trace: trace.clone(),
            clock: None,
            switched_at: Mutex::new(Vec::new()),
            on: Mutex::new(false),
        }
    }

    /// Also record the clock reading at each command.
    pub fn with_clock(mut self, clock: Arc<dyn MonotonicClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn is_on(&self) -> bool {
        *self.on.lock()
    }

    /// Clock readings at each command, if a clock was attached.
    pub fn switched_at(&self) -> Vec<u64> {
        self.switched_at.lock().clone()
    }

    fn stamp(&self) {
        if let Some(clock) = &self.clock {
            self.switched_at.lock().push(clock.now_us());
        }
    }
}

impl Relay for MockRelay {
    fn id(&self) -> u8 {
        self.id
    }

    fn turn_on(&self) {
        self.stamp();
        *self.on.lock() = true;
        self.trace.record(TraceEvent::TurnOn(self.id));
    }

    fn turn_off(&self) {
        self.stamp();
        *self.on.lock() = false;
        self.trace.record(TraceEvent::TurnOff(self.id));
    }
}

/// Feedback device returning scripted results.
///
/// Results are consumed in order; once the script is empty the fallback is
/// returned.
pub struct MockFeedback {
    id: u8,
    trace: EventTrace,
    script: Mutex<VecDeque<FeedbackResult>>,
    fallback: FeedbackResult,
}

impl MockFeedback {
    pub fn new(id: u8, trace: &EventTrace) -> Self {
        Self {
            id,
            trace: trace.clone(),
            script: Mutex::new(VecDeque::new()),
            fallback: FeedbackResult::default(),
        }
    }

    /// Result returned when the script is exhausted.
    pub fn with_fallback(mut self, fallback: FeedbackResult) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_results(self, results: impl IntoIterator<Item = FeedbackResult>) -> Self {
        self.script.lock().extend(results);
        self
    }

    pub fn push_result(&self, result: FeedbackResult) {
        self.script.lock().push_back(result);
    }
}

impl FeedbackDevice for MockFeedback {
    fn start(&self) {
        self.trace.record(TraceEvent::FeedbackStart(self.id));
    }

    fn resume(&self) {
        self.trace.record(TraceEvent::FeedbackResume(self.id));
    }

    fn pause(&self) {
        self.trace.record(TraceEvent::FeedbackPause(self.id));
    }

    fn stop(&self) {
        self.trace.record(TraceEvent::FeedbackStop(self.id));
    }

    fn result(&self, delta_us: u32) -> FeedbackResult {
        self.trace.record(TraceEvent::FeedbackRead(self.id, delta_us));
        self.script.lock().pop_front().unwrap_or(self.fallback)
    }
}

/// Zero-cross source under test control.
///
/// With `auto_fire` set, enabling events delivers one edge synchronously
/// from inside `enable_events`, which is enough for the worker to proceed
/// deterministically. Otherwise edges are delivered with [`fire`](Self::fire).
pub struct MockZeroCross {
    trace: EventTrace,
    handler: Mutex<Option<(EdgeLevel, EdgeCallback)>>,
    auto_fire: Option<EdgeLevel>,
    arms: Mutex<u32>,
}

impl MockZeroCross {
    /// Source that never fires on its own.
    pub fn manual(trace: &EventTrace) -> Self {
        Self {
            trace: trace.clone(),
            handler: Mutex::new(None),
            auto_fire: None,
            arms: Mutex::new(0),
        }
    }

    /// Source that fires `edge` as soon as it is armed.
    pub fn auto_firing(trace: &EventTrace, edge: EdgeLevel) -> Self {
        Self {
            auto_fire: Some(edge),
            ..Self::manual(trace)
        }
    }

    /// Deliver `edge` to the armed handler. Returns `false` if disarmed or
    /// the level does not match.
    pub fn fire(&self, edge: EdgeLevel) -> bool {
        let callback = match self.handler.lock().as_ref() {
            Some((level, cb)) if level.accepts(edge) => Arc::clone(cb),
            _ => return false,
        };
        self.trace.record(TraceEvent::Edge(edge));
        callback(edge);
        true
    }

    pub fn is_armed(&self) -> bool {
        self.handler.lock().is_some()
    }

    pub fn arm_count(&self) -> u32 {
        *self.arms.lock()
    }
}

impl ZeroCrossSource for MockZeroCross {
    fn enable_events(&self, level: EdgeLevel, on_edge: EdgeCallback) {
        self.trace.record(TraceEvent::Arm(level));
        *self.handler.lock() = Some((level, on_edge));
        *self.arms.lock() += 1;
        if let Some(edge) = self.auto_fire {
            self.fire(edge);
        }
    }

    fn disable_events(&self, level: EdgeLevel) {
        *self.handler.lock() = None;
        self.trace.record(TraceEvent::Disarm(level));
    }
}

/// Sleeper that records instead of sleeping.
pub struct RecordingSleeper {
    trace: EventTrace,
    real: bool,
}

impl RecordingSleeper {
    pub fn new(trace: &EventTrace) -> Self {
        Self {
            trace: trace.clone(),
            real: false,
        }
    }

    /// Record and also really sleep.
    pub fn sleeping(trace: &EventTrace) -> Self {
        Self {
            trace: trace.clone(),
            real: true,
        }
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep_ms(&self, ms: u32) {
        self.trace.record(TraceEvent::Sleep(ms));
        if self.real {
            std::thread::sleep(Duration::from_millis(u64::from(ms)));
        }
    }
}

/// Sleeper that blocks until released, for holding the worker busy.
#[derive(Default)]
pub struct GateSleeper {
    open: Mutex<bool>,
    cond: Condvar,
}

impl GateSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let every current and future sleep return.
    pub fn open(&self) {
        *self.open.lock() = true;
        self.cond.notify_all();
    }
}

impl Sleeper for GateSleeper {
    fn sleep_ms(&self, _ms: u32) {
        let mut open = self.open.lock();
        while !*open {
            self.cond.wait(&mut open);
        }
    }
}

#[derive(Default)]
struct Received {
    statuses: Vec<RelayAction>,
    bytes: Vec<(u8, u8)>,
}

/// Notifier that records and lets tests wait for notifications.
pub struct RecordingNotifier {
    trace: EventTrace,
    received: Mutex<Received>,
    cond: Condvar,
}

impl RecordingNotifier {
    pub fn new(trace: &EventTrace) -> Self {
        Self {
            trace: trace.clone(),
            received: Mutex::new(Received::default()),
            cond: Condvar::new(),
        }
    }

    pub fn statuses(&self) -> Vec<RelayAction> {
        self.received.lock().statuses.clone()
    }

    /// `(relay_id, byte)` pairs.
    pub fn feedback_bytes(&self) -> Vec<(u8, u8)> {
        self.received.lock().bytes.clone()
    }

    /// Block until at least `count` status notifications arrived.
    pub fn wait_for_statuses(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut received = self.received.lock();
        while received.statuses.len() < count {
            if self.cond.wait_until(&mut received, deadline).timed_out() {
                return received.statuses.len() >= count;
            }
        }
        true
    }
}

impl Notifier for RecordingNotifier {
    fn status(&self, action: &RelayAction) {
        self.trace.record(TraceEvent::Status(*action));
        self.received.lock().statuses.push(*action);
        self.cond.notify_all();
    }

    fn feedback_available(&self, relay_id: u8, byte: u8) {
        self.trace.record(TraceEvent::FeedbackByte(byte));
        self.received.lock().bytes.push((relay_id, byte));
    }
}

/// Publisher that captures `(topic, payload)` pairs.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().clone()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, topic: &str, payload: &[u8]) {
        self.published
            .lock()
            .push((topic.to_string(), payload.to_vec()));
    }
}
