//! Convenience re-exports for tests.

pub use crate::mock::{
    GateSleeper, MockFeedback, MockRelay, MockZeroCross, RecordingNotifier, RecordingPublisher,
    RecordingSleeper,
};
pub use crate::must::{must, must_some};
pub use crate::trace::{EventTrace, TraceEvent};
