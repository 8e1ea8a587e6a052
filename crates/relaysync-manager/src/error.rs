//! Error types for the relay manager.

use std::time::Duration;

use relaysync_zerocross::ZeroCrossError;
use thiserror::Error;

use crate::action::RelayAction;

/// Registration rejected; the registry is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The relay's identifier is not below the registry capacity.
    #[error("relay id {id} out of range (capacity {capacity})")]
    OutOfRange {
        /// Offending identifier.
        id: u8,
        /// Registry capacity.
        capacity: usize,
    },

    /// Another relay already occupies the slot.
    #[error("relay id {0} already registered")]
    Duplicate(u8),
}

/// Malformed command payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("command payload must be {expected} bytes, got {actual}")]
pub struct MessageFormatError {
    /// Required payload length.
    pub expected: usize,
    /// Received payload length.
    pub actual: usize,
}

/// The command carried a request kind that is neither on nor off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown relay request {0:#04x}")]
pub struct UnknownRequestError(pub u8);

/// A message could not be posted to the worker queue.
///
/// The rejected message is handed back through [`into_message`](Self::into_message).
pub struct QueueFullError<M> {
    message: M,
    timeout: Duration,
    stopped: bool,
}

impl<M> QueueFullError<M> {
    pub(crate) fn timed_out(message: M, timeout: Duration) -> Self {
        Self {
            message,
            timeout,
            stopped: false,
        }
    }

    pub(crate) fn stopped(message: M) -> Self {
        Self {
            message,
            timeout: Duration::ZERO,
            stopped: true,
        }
    }

    /// The rejected message.
    pub fn message(&self) -> &M {
        &self.message
    }

    /// Take back ownership of the rejected message.
    pub fn into_message(self) -> M {
        self.message
    }

    /// `true` if the worker had already stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl<M> std::fmt::Debug for QueueFullError<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueFullError")
            .field("timeout", &self.timeout)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl<M> std::fmt::Display for QueueFullError<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.stopped {
            write!(f, "worker stopped, message rejected")
        } else {
            write!(f, "queue full, message rejected after {:?}", self.timeout)
        }
    }
}

impl<M> std::error::Error for QueueFullError<M> {}

/// Errors from [`RelayManager::on_message`](crate::RelayManager::on_message).
#[derive(Debug, Error)]
pub enum MessageError {
    /// Topic is not a command topic.
    #[error("unknown topic '{0}'")]
    UnknownTopic(String),

    /// Payload has the wrong size.
    #[error(transparent)]
    Format(#[from] MessageFormatError),

    /// Decoded command could not be queued.
    #[error(transparent)]
    Queue(#[from] QueueFullError<RelayAction>),
}

/// Reasons an action was abandoned before switching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Request kind not recognized.
    #[error(transparent)]
    UnknownRequest(#[from] UnknownRequestError),

    /// No relay registered under this id.
    #[error("no relay registered with id {0}")]
    UnknownRelay(u8),

    /// A synchronization was already in flight.
    #[error(transparent)]
    Busy(#[from] ZeroCrossError),
}

/// Invalid [`ManagerConfig`](crate::ManagerConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Relay capacity must be in `1..=256`.
    #[error("relay capacity {0} out of range 1..=256")]
    RelayCapacity(usize),

    /// Queue capacity must be non-zero.
    #[error("queue capacity must be non-zero")]
    ZeroQueueCapacity,

    /// A duration that must be positive was zero.
    #[error("{0} must be non-zero")]
    ZeroDuration(&'static str),

    /// Worker thread name is empty.
    #[error("worker name must not be empty")]
    EmptyWorkerName,
}

/// Errors starting or running the manager.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Relay registration rejected.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// Worker exited before finishing startup.
    #[error("worker stopped during startup")]
    StartupAborted,
}

/// Result alias for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_hands_back_message() {
        let err = QueueFullError::timed_out(7u32, Duration::from_millis(100));
        assert!(!err.is_stopped());
        assert_eq!(*err.message(), 7);
        assert_eq!(err.to_string(), "queue full, message rejected after 100ms");
        assert_eq!(err.into_message(), 7);
    }

    #[test]
    fn test_registration_errors_distinct() {
        let range = RegistrationError::OutOfRange { id: 9, capacity: 4 };
        let dup = RegistrationError::Duplicate(1);
        assert_ne!(range, dup);
        assert_eq!(range.to_string(), "relay id 9 out of range (capacity 4)");
    }

    #[test]
    fn test_unknown_request_display() {
        assert_eq!(
            UnknownRequestError(4).to_string(),
            "unknown relay request 0x04"
        );
    }
}
