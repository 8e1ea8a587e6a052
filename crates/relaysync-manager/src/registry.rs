//! Fixed-capacity relay table.

use std::sync::Arc;

use relaysync_calibration::{CalibrationConfig, FeedbackResult};

use crate::error::RegistrationError;
use crate::hardware::{FeedbackDevice, Relay};

/// Hardware registered in one slot.
#[derive(Clone)]
pub struct RelayEntry {
    /// The relay.
    pub relay: Arc<dyn Relay>,
    /// Optional feedback device.
    pub feedback: Option<Arc<dyn FeedbackDevice>>,
}

impl std::fmt::Debug for RelayEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayEntry")
            .field("id", &self.relay.id())
            .field("feedback", &self.feedback.is_some())
            .finish()
    }
}

/// Relay slots indexed by relay id in `[0, capacity)`.
///
/// Every slot carries a calibration config whether or not a relay is
/// registered in it, so restore and persistence cover the full table.
#[derive(Debug)]
pub struct RelayRegistry {
    entries: Vec<Option<RelayEntry>>,
    configs: Vec<CalibrationConfig>,
    last_feedback: Vec<FeedbackResult>,
}

impl RelayRegistry {
    /// Create an empty registry with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![None; capacity],
            configs: vec![CalibrationConfig::DEFAULT; capacity],
            last_feedback: vec![FeedbackResult::UNAVAILABLE; capacity],
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of registered relays.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// `true` if no relay is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register `relay` in the slot named by its own id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::OutOfRange`] if the id is not below the
    /// capacity and [`RegistrationError::Duplicate`] if the slot is taken.
    /// The registry is unchanged on error.
    pub fn register(
        &mut self,
        relay: Arc<dyn Relay>,
        feedback: Option<Arc<dyn FeedbackDevice>>,
    ) -> Result<u8, RegistrationError> {
        let id = relay.id();
        let capacity = self.capacity();
        let slot = self
            .entries
            .get_mut(usize::from(id))
            .ok_or(RegistrationError::OutOfRange { id, capacity })?;
        if slot.is_some() {
            return Err(RegistrationError::Duplicate(id));
        }
        *slot = Some(RelayEntry { relay, feedback });
        Ok(id)
    }

    /// Entry registered under `id`.
    pub fn entry(&self, id: u8) -> Option<&RelayEntry> {
        self.entries.get(usize::from(id)).and_then(Option::as_ref)
    }

    /// Calibration config of slot `id`.
    pub fn config(&self, id: u8) -> Option<CalibrationConfig> {
        self.configs.get(usize::from(id)).copied()
    }

    /// Replace the calibration config of slot `id`.
    ///
    /// Returns `false` if `id` is out of range.
    pub fn set_config(&mut self, id: u8, cfg: CalibrationConfig) -> bool {
        match self.configs.get_mut(usize::from(id)) {
            Some(slot) => {
                *slot = cfg;
                true
            }
            None => false,
        }
    }

    /// All calibration configs, slot order.
    pub fn configs(&self) -> &[CalibrationConfig] {
        &self.configs
    }

    /// Mutable access for bulk restore.
    pub fn configs_mut(&mut self) -> &mut [CalibrationConfig] {
        &mut self.configs
    }

    /// Last feedback measurement for `id`.
    ///
    /// Relays without a feedback device, and unknown ids, report
    /// [`FeedbackResult::UNAVAILABLE`].
    pub fn feedback_result(&self, id: u8) -> FeedbackResult {
        match self.entry(id) {
            Some(entry) if entry.feedback.is_some() => self
                .last_feedback
                .get(usize::from(id))
                .copied()
                .unwrap_or(FeedbackResult::UNAVAILABLE),
            _ => FeedbackResult::UNAVAILABLE,
        }
    }

    /// Record the last feedback measurement for `id`.
    pub fn set_feedback_result(&mut self, id: u8, result: FeedbackResult) {
        if let Some(slot) = self.last_feedback.get_mut(usize::from(id)) {
            *slot = result;
        }
    }
}
