//! Measurements reported by a relay feedback device.

use bitflags::bitflags;

bitflags! {
    /// Timing error bits reported by a feedback device after a switching cycle.
    ///
    /// The device compares each measured delay against the configured delta
    /// window; several bits may be set at once. An empty status means the
    /// last cycle was within tolerance for both transitions.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FeedbackStatus: u8 {
        /// Contact closed later than the zero-cross window.
        const TIME_ON_HIGH  = 0b0000_0001;
        /// Contact closed earlier than the zero-cross window.
        const TIME_ON_LOW   = 0b0000_0010;
        /// Off time above the window: the contact opened ahead of the
        /// zero-cross.
        const TIME_OFF_HIGH = 0b0000_0100;
        /// Off time below the window: the contact opened after the
        /// zero-cross.
        const TIME_OFF_LOW  = 0b0000_1000;
    }
}

impl FeedbackStatus {
    /// Status reported for a relay that has no feedback device.
    pub const NO_FEEDBACK: Self = Self::all();

    /// `true` if no error bit is set.
    #[inline]
    pub fn is_clean(self) -> bool {
        self.is_empty()
    }
}

/// Result of the last measured switching cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedbackResult {
    /// Error bits.
    pub status: FeedbackStatus,
    /// Measured turn-on time in µs.
    pub t_on_us: u32,
    /// Measured turn-off time in µs.
    pub t_off_us: u32,
    /// Measured AC half period in µs.
    pub t_semicycle_us: u32,
}

impl FeedbackResult {
    /// Sentinel for relays without a feedback device: every error bit set,
    /// no measurement.
    pub const UNAVAILABLE: Self = Self {
        status: FeedbackStatus::NO_FEEDBACK,
        t_on_us: 0,
        t_off_us: 0,
        t_semicycle_us: 0,
    };
}
