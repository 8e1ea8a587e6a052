//! Hardware collaborator traits.
//!
//! Implementations wrap the board's relay drivers and feedback capture
//! peripherals. All methods take `&self`; implementations use interior
//! mutability where they need state.

use relaysync_calibration::FeedbackResult;

/// A switchable relay.
///
/// `turn_on` and `turn_off` are called from edge context when zero-cross
/// synchronization is active and must not block.
pub trait Relay: Send + Sync {
    /// Stable identifier, used as the registry slot.
    fn id(&self) -> u8;

    /// Energize the coil.
    fn turn_on(&self);

    /// De-energize the coil.
    fn turn_off(&self);
}

/// Contact timing capture attached to one relay.
///
/// Only ever driven from the worker thread; implementations need not be
/// reentrant.
pub trait FeedbackDevice: Send + Sync {
    /// Begin a new capture ahead of a turn-on.
    fn start(&self);

    /// Continue the current capture ahead of a turn-off.
    fn resume(&self);

    /// Suspend capture after a turn-on has settled.
    fn pause(&self);

    /// End capture after a turn-off has settled.
    fn stop(&self);

    /// Timing measured over the last on/off cycle, judged against
    /// `delta_us`.
    fn result(&self, delta_us: u32) -> FeedbackResult;
}
