//! The relay manager facade: builder, worker wiring and query API.

use std::sync::Arc;

use crossbeam::channel::{self, Sender};
use parking_lot::RwLock;
use portable_atomic::{AtomicU64, Ordering};
use relaysync_calibration::{
    CalibrationConfig, CalibrationStore, FeedbackResult, KeyValueStore, MemoryStore,
    RestoreReport,
};
use relaysync_timing::{MonotonicClock, Sleeper, SystemClock, ThreadSleeper};
use relaysync_zerocross::{SyncMetrics, ZeroCrossSource};
use tracing::{debug, info, warn};

use crate::action::RelayAction;
use crate::active::{ActiveObject, EventHandler, StateEvent, StateResult, WorkerConfig};
use crate::config::ManagerConfig;
use crate::coordinator::{ActionCoordinator, ActionOutcome};
use crate::error::{
    ActionError, ConfigError, ManagerError, ManagerResult, MessageError, QueueFullError,
    RegistrationError,
};
use crate::hardware::{FeedbackDevice, Relay};
use crate::notify::{LogPublisher, Notifier, TopicNotifier};
use crate::registry::RelayRegistry;
use crate::synchronizer::{ZeroCrossSynchronizer, ZeroCrossTester};

/// Root of command topics, e.g. `set/value/relays`.
pub const COMMAND_TOPIC_ROOT: &str = "set/value";

/// Publication base used when no notifier is supplied.
pub const DEFAULT_TOPIC_BASE: &str = "relays";

/// `true` if `topic` is `set/value` or below it.
pub fn is_command_topic(topic: &str) -> bool {
    topic
        .strip_prefix(COMMAND_TOPIC_ROOT)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Worker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// Accepting and executing actions.
    Ready,
}

/// Action counters.
#[derive(Debug, Default)]
pub struct ManagerStats {
    completed: AtomicU64,
    timed_out: AtomicU64,
    rejected: AtomicU64,
}

impl ManagerStats {
    /// Actions that switched a relay.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Actions abandoned for lack of a zero-cross edge.
    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Acquire)
    }

    /// Actions dropped before touching hardware.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Acquire)
    }

    /// Every action the worker has finished with.
    pub fn processed(&self) -> u64 {
        self.completed()
            .saturating_add(self.timed_out())
            .saturating_add(self.rejected())
    }
}

struct ManagerHandler {
    coordinator: ActionCoordinator,
    stats: Arc<ManagerStats>,
    ready: Option<Sender<RestoreReport>>,
}

impl EventHandler<RelayAction> for ManagerHandler {
    type State = ManagerState;

    fn initial_state(&self) -> ManagerState {
        ManagerState::Ready
    }

    fn handle(
        &mut self,
        state: ManagerState,
        event: StateEvent<RelayAction>,
    ) -> StateResult<ManagerState> {
        match (state, event) {
            (ManagerState::Ready, StateEvent::Entry) => {
                info!("Restoring relay calibration");
                let report = self.coordinator.restore();
                if let Some(ready) = self.ready.take()
                    && ready.send(report).is_err()
                {
                    warn!("Manager dropped before startup completed");
                }
                StateResult::Handled
            }
            (ManagerState::Ready, StateEvent::Message(action)) => {
                let counter = match self.coordinator.handle_action(action) {
                    Ok(ActionOutcome::Completed { .. }) => &self.stats.completed,
                    Ok(ActionOutcome::TimedOut) => &self.stats.timed_out,
                    Err(ActionError::Busy(e)) => {
                        warn!(error = %e, "Action rejected");
                        &self.stats.rejected
                    }
                    Err(_) => &self.stats.rejected,
                };
                counter.fetch_add(1, Ordering::AcqRel);
                StateResult::Handled
            }
            (ManagerState::Ready, StateEvent::Timed) => StateResult::Handled,
            (ManagerState::Ready, StateEvent::Exit) => {
                debug!("Relay manager worker exiting");
                StateResult::Handled
            }
        }
    }
}

/// Collects hardware and collaborators, then starts a [`RelayManager`].
pub struct RelayManagerBuilder {
    config: ManagerConfig,
    registry: RelayRegistry,
    store: Option<Arc<dyn KeyValueStore>>,
    zero_cross: Option<Arc<dyn ZeroCrossSource>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn MonotonicClock>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    tester: Option<ZeroCrossTester>,
}

impl std::fmt::Debug for RelayManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayManagerBuilder")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("zero_cross", &self.zero_cross.is_some())
            .finish_non_exhaustive()
    }
}

impl RelayManagerBuilder {
    /// Start from a validated config.
    ///
    /// # Errors
    ///
    /// Returns the first invalid config field.
    pub fn new(config: ManagerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = RelayRegistry::new(config.relay_capacity);
        Ok(Self {
            config,
            registry,
            store: None,
            zero_cross: None,
            notifier: None,
            clock: None,
            sleeper: None,
            tester: None,
        })
    }

    /// Register a relay and its optional feedback device.
    ///
    /// # Errors
    ///
    /// See [`RelayRegistry::register`].
    pub fn register(
        &mut self,
        relay: Arc<dyn Relay>,
        feedback: Option<Arc<dyn FeedbackDevice>>,
    ) -> Result<u8, RegistrationError> {
        let id = self.registry.register(relay, feedback)?;
        debug!(id, "Relay registered");
        Ok(id)
    }

    /// Persistence backend. Defaults to an in-memory store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Zero-cross source. Without one, switches run unsynchronized.
    #[must_use]
    pub fn zero_cross(mut self, source: Arc<dyn ZeroCrossSource>) -> Self {
        self.zero_cross = Some(source);
        self
    }

    /// Result notifier. Defaults to a [`TopicNotifier`] over the log.
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Clock used for the edge busy-wait.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn MonotonicClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sleeper used for worker waits.
    #[must_use]
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Zero-cross tester installed from the start.
    #[must_use]
    pub fn tester(mut self, tester: ZeroCrossTester) -> Self {
        self.tester = Some(tester);
        self
    }

    /// Spawn the worker and wait for calibration restore to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker cannot be spawned or dies during
    /// startup.
    pub fn start(self) -> ManagerResult<RelayManager> {
        let config = self.config;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()) as Arc<dyn MonotonicClock>);
        let sleeper = self
            .sleeper
            .unwrap_or_else(|| Arc::new(ThreadSleeper) as Arc<dyn Sleeper>);
        let notifier = self.notifier.unwrap_or_else(|| {
            Arc::new(TopicNotifier::new(LogPublisher, DEFAULT_TOPIC_BASE)) as Arc<dyn Notifier>
        });

        let synchronized = self.zero_cross.is_some();
        let synchronizer = Arc::new(ZeroCrossSynchronizer::new(
            self.zero_cross,
            config.edge_level,
            clock,
        ));
        synchronizer.attach_tester(self.tester);

        let registry = Arc::new(RwLock::new(self.registry));
        let coordinator = ActionCoordinator::new(
            &config,
            Arc::clone(&registry),
            CalibrationStore::new(store),
            Arc::clone(&synchronizer),
            notifier,
            sleeper,
        );

        let stats = Arc::new(ManagerStats::default());
        let (ready_tx, ready_rx) = channel::bounded(1);
        let handler = ManagerHandler {
            coordinator,
            stats: Arc::clone(&stats),
            ready: Some(ready_tx),
        };
        let worker = ActiveObject::spawn(
            WorkerConfig {
                name: config.worker_name.clone(),
                capacity: config.queue_capacity,
                put_timeout: config.put_timeout(),
                tick: config.tick(),
            },
            handler,
        )?;

        let restore_report = ready_rx.recv().ok().ok_or(ManagerError::StartupAborted)?;

        info!(
            relays = registry.read().len(),
            synchronized,
            policy = ?config.persist_policy,
            "Relay manager ready"
        );
        Ok(RelayManager {
            worker,
            registry,
            synchronizer,
            stats,
            restore_report,
        })
    }
}

/// Running relay manager.
pub struct RelayManager {
    worker: ActiveObject<RelayAction>,
    registry: Arc<RwLock<RelayRegistry>>,
    synchronizer: Arc<ZeroCrossSynchronizer>,
    stats: Arc<ManagerStats>,
    restore_report: RestoreReport,
}

impl std::fmt::Debug for RelayManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayManager")
            .field("worker", &self.worker)
            .field("synchronizer", &self.synchronizer)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl RelayManager {
    /// Builder for a manager with `config`.
    ///
    /// # Errors
    ///
    /// Returns the first invalid config field.
    pub fn builder(config: ManagerConfig) -> Result<RelayManagerBuilder, ConfigError> {
        RelayManagerBuilder::new(config)
    }

    /// Queue an action.
    ///
    /// # Errors
    ///
    /// If the queue stays full for the put timeout, or the worker has
    /// stopped, the action is handed back.
    pub fn submit(&self, action: RelayAction) -> Result<(), QueueFullError<RelayAction>> {
        self.worker.post(action)
    }

    /// Entry point for subscribed messages.
    ///
    /// Accepts two-byte commands on topics under `set/value`.
    ///
    /// # Errors
    ///
    /// Returns an error for other topics, wrongly sized payloads or a full
    /// queue. Nothing is queued on error.
    pub fn on_message(&self, topic: &str, payload: &[u8]) -> Result<(), MessageError> {
        if !is_command_topic(topic) {
            warn!(topic, "Unknown topic");
            return Err(MessageError::UnknownTopic(topic.to_string()));
        }
        let action = RelayAction::decode(payload).inspect_err(|e| {
            warn!(topic, error = %e, "Malformed command dropped");
        })?;
        debug!(topic, relay = action.relay_id, request = action.request, "Command received");
        self.submit(action).inspect_err(|e| {
            warn!(topic, error = %e, "Command not queued");
        })?;
        Ok(())
    }

    /// Current calibration of slot `id`.
    pub fn config(&self, id: u8) -> Option<CalibrationConfig> {
        self.registry.read().config(id)
    }

    /// Calibration of every slot.
    pub fn configs(&self) -> Vec<CalibrationConfig> {
        self.registry.read().configs().to_vec()
    }

    /// Last feedback measurement of relay `id`; all error bits set when the
    /// relay has no feedback device.
    pub fn feedback_result(&self, id: u8) -> FeedbackResult {
        self.registry.read().feedback_result(id)
    }

    /// Install an observer called from edge context after each switch.
    pub fn attach_zero_cross_tester<F>(&self, tester: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.synchronizer.attach_tester(Some(Arc::new(tester)));
    }

    /// Remove the zero-cross observer.
    pub fn detach_zero_cross_tester(&self) {
        self.synchronizer.attach_tester(None);
    }

    /// `true` if switches are synchronized to a zero-cross source.
    pub fn is_synchronized(&self) -> bool {
        self.synchronizer.is_synchronized()
    }

    /// How startup restore went.
    pub fn restore_report(&self) -> &RestoreReport {
        &self.restore_report
    }

    /// Action counters.
    pub fn stats(&self) -> &ManagerStats {
        &self.stats
    }

    /// Zero-cross synchronization counters.
    pub fn sync_metrics(&self) -> SyncMetrics {
        self.synchronizer.metrics()
    }

    /// Actions waiting in the queue.
    pub fn pending(&self) -> usize {
        self.worker.pending()
    }

    /// Finish queued actions and stop the worker.
    pub fn shutdown(&mut self) {
        if self.worker.is_running() {
            info!("Shutting down relay manager");
        }
        self.worker.shutdown();
    }
}
