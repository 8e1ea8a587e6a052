//! Executes one switching action end to end.

use std::sync::Arc;

use parking_lot::RwLock;
use relaysync_calibration::{
    Calibration, CalibrationStore, PersistPolicy, RestoreReport, calibrate,
};
use relaysync_timing::Sleeper;
use tracing::{debug, error, info, warn};

use crate::action::{RelayAction, RelayRequest};
use crate::config::ManagerConfig;
use crate::error::ActionError;
use crate::notify::Notifier;
use crate::registry::RelayRegistry;
use crate::synchronizer::{PendingSwitch, SwitchOutcome, ZeroCrossSynchronizer};

/// Result of a processed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The relay switched and notifications were sent.
    Completed {
        /// Calibration pass, if the relay has feedback.
        calibration: Option<Calibration>,
        /// `true` if the calibrated config was written to the store.
        persisted: bool,
    },
    /// No zero-cross edge arrived in time; nothing was switched or
    /// notified.
    TimedOut,
}

/// Timing used by the coordinator, in ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTiming {
    /// Feedback stabilization before switching.
    pub capture_ms: u32,
    /// Inrush window after turn-on; turn-off settles for half.
    pub inrush_ms: u32,
}

impl ActionTiming {
    /// Wait after a switch: the full inrush window for a turn-on, half of
    /// it for a turn-off.
    pub fn settle_ms(&self, request: RelayRequest) -> u32 {
        match request {
            RelayRequest::On => self.inrush_ms,
            RelayRequest::Off => self.inrush_ms / 2,
        }
    }
}

impl From<&ManagerConfig> for ActionTiming {
    fn from(cfg: &ManagerConfig) -> Self {
        Self {
            capture_ms: cfg.capture_time_ms,
            inrush_ms: cfg.inrush_time_ms,
        }
    }
}

/// Runs actions one at a time on the worker.
pub struct ActionCoordinator {
    registry: Arc<RwLock<RelayRegistry>>,
    store: CalibrationStore,
    synchronizer: Arc<ZeroCrossSynchronizer>,
    notifier: Arc<dyn Notifier>,
    sleeper: Arc<dyn Sleeper>,
    timing: ActionTiming,
    rendezvous_timeout: Option<std::time::Duration>,
    policy: PersistPolicy,
    dirty: Vec<bool>,
}

impl std::fmt::Debug for ActionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionCoordinator")
            .field("synchronizer", &self.synchronizer)
            .field("timing", &self.timing)
            .field("rendezvous_timeout", &self.rendezvous_timeout)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ActionCoordinator {
    /// Assemble a coordinator.
    pub fn new(
        config: &ManagerConfig,
        registry: Arc<RwLock<RelayRegistry>>,
        store: CalibrationStore,
        synchronizer: Arc<ZeroCrossSynchronizer>,
        notifier: Arc<dyn Notifier>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let slots = registry.read().capacity();
        Self {
            registry,
            store,
            synchronizer,
            notifier,
            sleeper,
            timing: ActionTiming::from(config),
            rendezvous_timeout: config.rendezvous_timeout(),
            policy: config.persist_policy,
            dirty: vec![false; slots],
        }
    }

    /// Restore every slot's calibration from the store, repairing all of
    /// them with defaults if any is missing or invalid.
    pub fn restore(&mut self) -> RestoreReport {
        let mut registry = self.registry.write();
        let report = self.store.restore(registry.configs_mut());
        match &report {
            RestoreReport::Restored => info!(relays = registry.capacity(), "Calibration restored"),
            RestoreReport::Repaired { cause } => {
                warn!(error = %cause, "Calibration reset to defaults");
            }
        }
        if let Some(cfg) = registry.config(0) {
            debug!(
                delay_on_us = cfg.delay_on_us,
                delay_off_us = cfg.delay_off_us,
                delta_us = cfg.delta_us,
                "Relay 0 calibration"
            );
        }
        report
    }

    /// Run `action` to completion.
    ///
    /// # Errors
    ///
    /// Returns an error, without touching any hardware, if the request kind
    /// is unknown or no relay is registered under the id.
    pub fn handle_action(&mut self, action: RelayAction) -> Result<ActionOutcome, ActionError> {
        let request = action.request().inspect_err(|e| {
            error!(relay = action.relay_id, error = %e, "Unknown request, action dropped");
        })?;

        let (entry, cfg) = {
            let registry = self.registry.read();
            match (registry.entry(action.relay_id), registry.config(action.relay_id)) {
                (Some(entry), Some(cfg)) => (entry.clone(), cfg),
                _ => {
                    warn!(relay = action.relay_id, "No relay registered, action dropped");
                    return Err(ActionError::UnknownRelay(action.relay_id));
                }
            }
        };
        debug!(relay = action.relay_id, %request, "Starting action");

        if let Some(feedback) = &entry.feedback {
            match request {
                RelayRequest::On => {
                    debug!("Starting feedback capture");
                    feedback.start();
                }
                RelayRequest::Off => {
                    debug!("Resuming feedback capture");
                    feedback.resume();
                }
            }
            self.sleeper.sleep_ms(self.timing.capture_ms);
        }

        let delay_us = match request {
            RelayRequest::On => cfg.delay_on_us,
            RelayRequest::Off => cfg.delay_off_us,
        };
        let switch = PendingSwitch {
            relay: Arc::clone(&entry.relay),
            request,
            delay_us,
        };

        match self.synchronizer.execute(switch, self.rendezvous_timeout)? {
            SwitchOutcome::Switched => {}
            SwitchOutcome::TimedOut => {
                if let Some(feedback) = &entry.feedback {
                    feedback.stop();
                }
                error!(relay = action.relay_id, %request, "Action timed out waiting for zero-cross");
                return Ok(ActionOutcome::TimedOut);
            }
        }
        debug!(relay = action.relay_id, "Switch complete");

        self.sleeper.sleep_ms(self.timing.settle_ms(request));
        if let Some(feedback) = &entry.feedback {
            match request {
                RelayRequest::On => feedback.pause(),
                RelayRequest::Off => feedback.stop(),
            }
        }

        let mut calibration = None;
        let mut persisted = false;
        if let Some(feedback) = &entry.feedback {
            let result = feedback.result(cfg.delta_us);
            let cal = calibrate(&cfg, &result);
            debug!(
                t_on_us = result.t_on_us,
                t_off_us = result.t_off_us,
                t_semicycle_us = result.t_semicycle_us,
                delta_us = cal.config.delta_us,
                status = ?result.status,
                "Feedback check"
            );
            if cal.adjusted {
                warn!(relay = action.relay_id, status = ?result.status, "Switching delay adjusted");
            }
            {
                let mut registry = self.registry.write();
                registry.set_config(action.relay_id, cal.config);
                registry.set_feedback_result(action.relay_id, result);
            }
            persisted = self.persist(action.relay_id, &cfg, &cal);
            calibration = Some(cal);
        }

        debug!(relay = action.relay_id, "Publishing result");
        self.notifier.status(&action);
        if entry.feedback.is_some() {
            self.notifier
                .feedback_available(action.relay_id, request.feedback_byte());
        }

        Ok(ActionOutcome::Completed {
            calibration,
            persisted,
        })
    }

    fn persist(
        &mut self,
        relay_id: u8,
        previous: &relaysync_calibration::CalibrationConfig,
        cal: &Calibration,
    ) -> bool {
        let Some(dirty) = self.dirty.get_mut(usize::from(relay_id)) else {
            return false;
        };
        if !self.policy.should_persist(previous, cal, dirty) {
            return false;
        }
        match self.store.save(usize::from(relay_id), &cal.config) {
            Ok(()) => true,
            Err(e) => {
                warn!(relay = relay_id, error = %e, "Failed to persist calibration");
                false
            }
        }
    }
}
