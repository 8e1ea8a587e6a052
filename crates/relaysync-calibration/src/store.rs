//! Restore, repair and save of per-relay calibration.
//!
//! Restore is all-or-nothing: if any record fails to load or any restored
//! config fails the range invariant, every relay is reset to
//! [`CalibrationConfig::DEFAULT`] and the defaults are written back.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::CalibrationConfig;
use crate::error::{CalibrationError, CalibrationResult, StoreError};

/// Key-value persistence backend.
pub trait KeyValueStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the value could not be written.
    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Load the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if nothing is stored, or a backend
    /// error if the value could not be read.
    fn load(&self, key: &str) -> Result<Vec<u8>, StoreError>;
}

/// Key under which relay `index` is persisted.
pub fn config_key(index: usize) -> String {
    format!("RlyManCfg_{index}")
}

/// Outcome of [`CalibrationStore::restore`].
#[derive(Debug)]
pub enum RestoreReport {
    /// Every record loaded and passed the integrity check.
    Restored,
    /// Defaults were applied to every relay because of `cause`.
    Repaired {
        /// First failure observed.
        cause: CalibrationError,
    },
}

impl RestoreReport {
    /// `true` if the defaults were applied.
    pub fn is_repaired(&self) -> bool {
        matches!(self, RestoreReport::Repaired { .. })
    }
}

/// Calibration persistence over an injected [`KeyValueStore`].
#[derive(Clone)]
pub struct CalibrationStore {
    backend: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for CalibrationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationStore").finish_non_exhaustive()
    }
}

impl CalibrationStore {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Load every config in `configs` from the backend.
    ///
    /// On any load or integrity failure all entries are reset to defaults
    /// and persisted; the returned report carries the first failure.
    pub fn restore(&self, configs: &mut [CalibrationConfig]) -> RestoreReport {
        debug!(relays = configs.len(), "Restoring calibration");

        let mut cause = None;
        for (index, slot) in configs.iter_mut().enumerate() {
            match self.load(index) {
                Ok(cfg) => *slot = cfg,
                Err(e) => {
                    warn!(index, error = %e, "Calibration load failed");
                    if cause.is_none() {
                        cause = Some(e);
                    }
                }
            }
        }

        if cause.is_none() {
            cause = configs.iter().enumerate().find_map(|(index, cfg)| {
                cfg.check()
                    .err()
                    .map(|violation| CalibrationError::Integrity { index, violation })
            });
            if let Some(e) = &cause {
                warn!(error = %e, "Calibration integrity check failed");
            }
        }

        match cause {
            None => {
                debug!("Calibration restored, integrity OK");
                RestoreReport::Restored
            }
            Some(cause) => {
                warn!("Applying default calibration to all relays");
                self.reset_defaults(configs);
                RestoreReport::Repaired { cause }
            }
        }
    }

    /// Set every entry to [`CalibrationConfig::DEFAULT`] and persist it.
    ///
    /// Save failures are logged and do not stop the reset.
    pub fn reset_defaults(&self, configs: &mut [CalibrationConfig]) {
        for (index, slot) in configs.iter_mut().enumerate() {
            *slot = CalibrationConfig::DEFAULT;
            if let Err(e) = self.save(index, slot) {
                warn!(index, error = %e, "Failed to persist default calibration");
            }
        }
    }

    /// Persist one relay's config.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or written.
    pub fn save(&self, index: usize, cfg: &CalibrationConfig) -> CalibrationResult<()> {
        let record = cfg.to_record()?;
        self.backend
            .save(&config_key(index), &record)
            .map_err(|source| CalibrationError::Persistence { index, source })?;
        debug!(index, ?cfg, "Calibration saved");
        Ok(())
    }

    /// Load one relay's config without validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is missing, unreadable or malformed.
    pub fn load(&self, index: usize) -> CalibrationResult<CalibrationConfig> {
        let bytes = self
            .backend
            .load(&config_key(index))
            .map_err(|source| CalibrationError::Persistence { index, source })?;
        CalibrationConfig::from_record(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn test_config_key_format() {
        assert_eq!(config_key(0), "RlyManCfg_0");
        assert_eq!(config_key(12), "RlyManCfg_12");
    }

    #[test]
    fn test_restore_empty_store_repairs() {
        let backend = Arc::new(MemoryStore::new());
        let store = CalibrationStore::new(backend.clone());
        let mut configs = [CalibrationConfig::new(1, 2, 3); 3];

        let report = store.restore(&mut configs);

        assert!(report.is_repaired());
        assert!(configs.iter().all(|c| *c == CalibrationConfig::DEFAULT));
        assert_eq!(backend.len(), 3);
    }

    #[test]
    fn test_restore_valid_records() -> Result<(), Box<dyn std::error::Error>> {
        let backend = Arc::new(MemoryStore::new());
        let store = CalibrationStore::new(backend.clone());
        let stored = [
            CalibrationConfig::new(9_000, 10_000, 400),
            CalibrationConfig::new(8_000, 8_500, 500),
        ];
        for (i, cfg) in stored.iter().enumerate() {
            store.save(i, cfg)?;
        }

        let mut configs = [CalibrationConfig::DEFAULT; 2];
        let report = store.restore(&mut configs);

        assert!(!report.is_repaired());
        assert_eq!(configs, stored);
        Ok(())
    }

    #[test]
    fn test_one_invalid_record_resets_all() -> Result<(), Box<dyn std::error::Error>> {
        let backend = Arc::new(MemoryStore::new());
        let store = CalibrationStore::new(backend.clone());
        store.save(0, &CalibrationConfig::new(9_000, 9_000, 450))?;
        store.save(1, &CalibrationConfig::new(60_000, 9_000, 450))?;

        let mut configs = [CalibrationConfig::DEFAULT; 2];
        let report = store.restore(&mut configs);

        assert!(matches!(
            report,
            RestoreReport::Repaired {
                cause: CalibrationError::Integrity { index: 1, .. }
            }
        ));
        assert_eq!(configs, [CalibrationConfig::DEFAULT; 2]);
        assert_eq!(store.load(0)?, CalibrationConfig::DEFAULT);
        Ok(())
    }
}
