//! Switching-delay calibration for zero-cross relay control.
//!
//! Each relay carries a [`CalibrationConfig`]: the delay from a zero-cross
//! edge to the drive command for closing and for opening the contact, plus
//! the tolerance window used to classify timing errors. This crate owns:
//!
//! - [`config`]: the config type, its range invariant and the persisted record
//! - [`feedback`]: status bits and measurements reported by a feedback device
//! - [`calibrator`]: the closed-loop delay update and the persistence policy
//! - [`store`]: key-value backed restore/repair/save of all relay configs
//! - [`memory`] / [`file`]: hosted key-value backends
//!
//! # Example
//!
//! ```
//! use relaysync_calibration::prelude::*;
//!
//! let cfg = CalibrationConfig::DEFAULT;
//! let result = FeedbackResult {
//!     status: FeedbackStatus::TIME_ON_HIGH | FeedbackStatus::TIME_OFF_LOW,
//!     t_on_us: 0,
//!     t_off_us: 0,
//!     t_semicycle_us: 10_000,
//! };
//!
//! let calibrated = calibrate(&cfg, &result);
//! assert_eq!(calibrated.config.delay_on_us, 7_500);
//! assert_eq!(calibrated.config.delay_off_us, 7_500);
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod calibrator;
pub mod config;
pub mod error;
pub mod feedback;
pub mod file;
pub mod memory;
pub mod prelude;
pub mod store;

pub use calibrator::{Calibration, DEFAULT_DELTA_PERCENT, PersistPolicy, calibrate, delta_for_semicycle};
pub use config::{
    CalibrationConfig, DEFAULT_SWITCHING_DELAY_US, DEFAULT_SWITCHING_DELTA_US,
    MAX_SWITCHING_DELAY_US, RECORD_LEN,
};
pub use error::{CalibrationError, CalibrationResult, IntegrityViolation, StoreError};
pub use feedback::{FeedbackResult, FeedbackStatus};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::{CalibrationStore, KeyValueStore, RestoreReport, config_key};
