//! Error types for zero-cross synchronization.

use thiserror::Error;

/// Errors raised by the synchronization state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZeroCrossError {
    /// A synchronization is already armed or in progress.
    #[error("zero-cross synchronization already pending ({0})")]
    AlreadyPending(&'static str),

    /// State transition not allowed.
    #[error("invalid synchronization transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: &'static str,
        /// Attempted target state.
        to: &'static str,
    },

    /// Mains frequency outside the supported range.
    #[error("mains frequency {0}Hz out of range")]
    InvalidFrequency(u32),

    /// The simulated mains thread could not be spawned.
    #[error("failed to spawn mains thread: {0}")]
    Spawn(String),
}

impl ZeroCrossError {
    /// Create an invalid transition error.
    #[must_use]
    pub fn invalid_transition(from: &'static str, to: &'static str) -> Self {
        Self::InvalidTransition { from, to }
    }
}

/// Result alias for zero-cross operations.
pub type ZeroCrossResult<T> = Result<T, ZeroCrossError>;
