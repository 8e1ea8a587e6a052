//! Manager configuration.

use std::time::Duration;

use relaysync_calibration::PersistPolicy;
use relaysync_zerocross::EdgeLevel;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Maximum request queue depth.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;
/// Default submission timeout in ms.
pub const DEFAULT_PUT_TIMEOUT_MS: u64 = 100;
/// Feedback capture stabilization time before switching, in ms.
pub const DEFAULT_PREVIOUS_CAPTURE_TIME_MS: u32 = 40;
/// Inrush window after a turn-on, in ms. Turn-off waits half of it.
pub const DEFAULT_MAX_CURRENT_TIME_MS: u32 = 100;
/// Default number of relay slots.
pub const DEFAULT_RELAY_CAPACITY: usize = 4;
/// Largest registry: relay ids are a single byte.
pub const MAX_RELAY_CAPACITY: usize = 256;

/// Runtime configuration of a [`RelayManager`](crate::RelayManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Number of relay slots (`N`).
    pub relay_capacity: usize,
    /// Request queue depth.
    pub queue_capacity: usize,
    /// How long a submission may block on a full queue, in ms.
    pub put_timeout_ms: u64,
    /// Feedback stabilization wait before switching, in ms.
    pub capture_time_ms: u32,
    /// Inrush window after a turn-on, in ms.
    pub inrush_time_ms: u32,
    /// Zero-cross edge(s) to synchronize on.
    pub edge_level: EdgeLevel,
    /// Upper bound on the wait for a zero-cross edge, in ms. `None` waits
    /// forever.
    pub rendezvous_timeout_ms: Option<u64>,
    /// Idle tick period of the worker, in ms.
    pub tick_ms: Option<u64>,
    /// When calibrated configs are persisted.
    pub persist_policy: PersistPolicy,
    /// Worker thread name.
    pub worker_name: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            relay_capacity: DEFAULT_RELAY_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            put_timeout_ms: DEFAULT_PUT_TIMEOUT_MS,
            capture_time_ms: DEFAULT_PREVIOUS_CAPTURE_TIME_MS,
            inrush_time_ms: DEFAULT_MAX_CURRENT_TIME_MS,
            edge_level: EdgeLevel::Both,
            rendezvous_timeout_ms: None,
            tick_ms: None,
            persist_policy: PersistPolicy::OnChange,
            worker_name: "relay-manager".to_string(),
        }
    }
}

impl ManagerConfig {
    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_RELAY_CAPACITY).contains(&self.relay_capacity) {
            return Err(ConfigError::RelayCapacity(self.relay_capacity));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.put_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("put_timeout_ms"));
        }
        if self.rendezvous_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroDuration("rendezvous_timeout_ms"));
        }
        if self.tick_ms == Some(0) {
            return Err(ConfigError::ZeroDuration("tick_ms"));
        }
        if self.worker_name.trim().is_empty() {
            return Err(ConfigError::EmptyWorkerName);
        }
        Ok(())
    }

    /// Submission timeout.
    pub fn put_timeout(&self) -> Duration {
        Duration::from_millis(self.put_timeout_ms)
    }

    /// Rendezvous timeout, if bounded.
    pub fn rendezvous_timeout(&self) -> Option<Duration> {
        self.rendezvous_timeout_ms.map(Duration::from_millis)
    }

    /// Idle tick period, if any.
    pub fn tick(&self) -> Option<Duration> {
        self.tick_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let cfg = ManagerConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.queue_capacity, 16);
        assert_eq!(cfg.put_timeout(), Duration::from_millis(100));
        assert_eq!(cfg.rendezvous_timeout(), None);
    }

    #[test]
    fn test_rejects_bad_fields() {
        let cfg = ManagerConfig {
            relay_capacity: 0,
            ..ManagerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::RelayCapacity(0)));

        let cfg = ManagerConfig {
            relay_capacity: 257,
            ..ManagerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::RelayCapacity(257)));

        let cfg = ManagerConfig {
            queue_capacity: 0,
            ..ManagerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroQueueCapacity));

        let cfg = ManagerConfig {
            rendezvous_timeout_ms: Some(0),
            ..ManagerConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ZeroDuration("rendezvous_timeout_ms"))
        );
    }
}
