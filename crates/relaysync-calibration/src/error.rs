//! Error types for calibration and persistence.

use thiserror::Error;

/// Failure reported by a key-value backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No value stored under the key.
    #[error("no value stored for key {0}")]
    NotFound(String),

    /// Filesystem failure.
    #[error("I/O error on key {key}: {source}")]
    Io {
        /// Key being accessed.
        key: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Reason a restored config fails the range invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IntegrityViolation {
    /// `delay_on_us` outside `[8000, 50000)`.
    #[error("delay_on_us {0} out of range")]
    DelayOnOutOfRange(u32),

    /// `delay_off_us` outside `[8000, 50000)`.
    #[error("delay_off_us {0} out of range")]
    DelayOffOutOfRange(u32),

    /// `delta_us` is zero.
    #[error("delta_us is zero")]
    ZeroDelta,
}

/// Errors raised while restoring or persisting calibration.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// Load or save failed on the key-value backend.
    #[error("persistence error on relay {index}: {source}")]
    Persistence {
        /// Relay index.
        index: usize,
        /// Backend failure.
        #[source]
        source: StoreError,
    },

    /// Restored config fails the range invariant.
    #[error("integrity error on relay {index}: {violation}")]
    Integrity {
        /// Relay index.
        index: usize,
        /// Offending field.
        violation: IntegrityViolation,
    },

    /// Persisted record could not be encoded or decoded.
    #[error("record codec error: {0}")]
    Codec(String),
}

/// Result alias for calibration operations.
pub type CalibrationResult<T> = Result<T, CalibrationError>;
