//! Simulation configuration file.
//!
//! ```yaml
//! mains_hz: 50
//! synchronized: true
//! store_dir: ./relay-state
//! topic_base: relays
//! manager:
//!   relay_capacity: 2
//!   persist_policy: on_convergence
//! relays:
//!   - id: 0
//!     contact_on_us: 1500
//!     contact_off_us: 800
//!   - id: 1
//!     feedback: false
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use relaysync_manager::ManagerConfig;
use relaysync_manager::manager::DEFAULT_TOPIC_BASE;
use relaysync_zerocross::simulated::MAINS_HZ_RANGE;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// One simulated relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimRelayConfig {
    pub id: u8,
    /// Attach a simulated feedback device.
    pub feedback: bool,
    /// Mechanical latency from turn-on command to contact closing, in µs.
    pub contact_on_us: u32,
    /// Mechanical latency from turn-off command to contact opening, in µs.
    pub contact_off_us: u32,
}

impl Default for SimRelayConfig {
    fn default() -> Self {
        Self {
            id: 0,
            feedback: true,
            contact_on_us: 1_500,
            contact_off_us: 800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub manager: ManagerConfig,
    /// Simulated mains frequency in Hz.
    pub mains_hz: u32,
    /// Switch on zero-cross edges. When false every switch is immediate.
    pub synchronized: bool,
    /// Directory for persisted calibration. In-memory when unset.
    pub store_dir: Option<PathBuf>,
    /// Topic base for published results.
    pub topic_base: String,
    pub relays: Vec<SimRelayConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            mains_hz: 50,
            synchronized: true,
            store_dir: None,
            topic_base: DEFAULT_TOPIC_BASE.to_string(),
            relays: vec![
                SimRelayConfig::default(),
                SimRelayConfig {
                    id: 1,
                    contact_on_us: 1_200,
                    contact_off_us: 600,
                    ..SimRelayConfig::default()
                },
            ],
        }
    }
}

impl AppConfig {
    /// Load from `path`, or the built-in defaults when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let config = match path {
            None => Self::default(),
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|e| match e.kind() {
                    ErrorKind::NotFound => CliError::ConfigNotFound(path.to_path_buf()),
                    _ => CliError::IoError(e),
                })?;
                Self::from_yaml(&text)?
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, CliError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), CliError> {
        self.manager
            .validate()
            .map_err(|e| CliError::InvalidConfiguration(e.to_string()))?;
        if !MAINS_HZ_RANGE.contains(&self.mains_hz) {
            return Err(CliError::InvalidConfiguration(format!(
                "mains_hz {} outside {}..={}",
                self.mains_hz,
                MAINS_HZ_RANGE.start(),
                MAINS_HZ_RANGE.end()
            )));
        }
        if self.relays.is_empty() {
            return Err(CliError::InvalidConfiguration(
                "at least one relay is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaysync_calibration::PersistPolicy;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn defaults_are_valid() -> TestResult {
        let config = AppConfig::default();
        config.validate()?;
        assert_eq!(config.relays.len(), 2);
        assert!(config.synchronized);
        Ok(())
    }

    #[test]
    fn partial_yaml_fills_defaults() -> TestResult {
        let config = AppConfig::from_yaml(
            "mains_hz: 60\nmanager:\n  persist_policy: on_convergence\nrelays:\n  - id: 3\n    feedback: false\n",
        )?;
        assert_eq!(config.mains_hz, 60);
        assert_eq!(config.manager.persist_policy, PersistPolicy::OnConvergence);
        assert_eq!(config.manager.queue_capacity, 16);
        assert_eq!(config.relays.len(), 1);
        assert_eq!(
            config.relays.first().map(|r| (r.id, r.feedback, r.contact_on_us)),
            Some((3, false, 1_500))
        );
        Ok(())
    }

    #[test]
    fn rejects_bad_frequency() -> TestResult {
        let config = AppConfig::from_yaml("mains_hz: 0\n")?;
        assert!(matches!(config.validate(), Err(CliError::InvalidConfiguration(_))));
        Ok(())
    }

    #[test]
    fn rejects_bad_manager_config() -> TestResult {
        let config = AppConfig::from_yaml("manager:\n  queue_capacity: 0\n")?;
        assert!(matches!(config.validate(), Err(CliError::InvalidConfiguration(_))));
        Ok(())
    }

    #[test]
    fn missing_file_is_reported() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/relayctl.yaml")));
        assert!(matches!(result, Err(CliError::ConfigNotFound(_))));
    }
}
