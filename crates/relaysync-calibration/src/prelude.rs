//! Prelude module for common calibration types.

pub use crate::calibrator::{Calibration, DEFAULT_DELTA_PERCENT, PersistPolicy, calibrate};
pub use crate::config::{
    CalibrationConfig, DEFAULT_SWITCHING_DELAY_US, DEFAULT_SWITCHING_DELTA_US,
    MAX_SWITCHING_DELAY_US,
};
pub use crate::error::{CalibrationError, CalibrationResult, IntegrityViolation, StoreError};
pub use crate::feedback::{FeedbackResult, FeedbackStatus};
pub use crate::file::FileStore;
pub use crate::memory::MemoryStore;
pub use crate::store::{CalibrationStore, KeyValueStore, RestoreReport};
