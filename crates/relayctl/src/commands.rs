//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use relaysync_calibration::{
    CalibrationConfig, CalibrationStore, FileStore, KeyValueStore, MemoryStore, RestoreReport,
};
use relaysync_manager::config::{DEFAULT_RELAY_CAPACITY, MAX_RELAY_CAPACITY};
use relaysync_manager::{
    COMMAND_TOPIC_ROOT, FeedbackDevice, LogPublisher, ManagerConfig, ManagerError, Notifier,
    RelayAction, RelayManager, Relay, TopicNotifier,
};
use relaysync_zerocross::{SimulatedZeroCross, ZeroCrossSource};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::CliError;
use crate::output::{self, ConfigRow, RelayReport, SimulationReport, SyncSummary};
use crate::sim::{MainsModel, SimFeedback, SimRelay};

/// Extra time allowed per action beyond its nominal duration.
const ACTION_GRACE: Duration = Duration::from_secs(1);
/// Edge wait assumed when the config leaves it unbounded.
const UNBOUNDED_EDGE_WAIT: Duration = Duration::from_secs(1);

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Simulation config file (YAML). Built-in defaults when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// On/off cycles per relay
    #[arg(long, default_value_t = 3)]
    pub cycles: u32,

    /// Persist calibration under this directory instead of the configured one
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Switch immediately instead of waiting for zero-cross edges
    #[arg(long)]
    pub unsynchronized: bool,
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Calibration store directory
    #[arg(long)]
    pub store: PathBuf,

    /// Number of relay slots
    #[arg(long, default_value_t = DEFAULT_RELAY_CAPACITY, value_parser = parse_relay_count)]
    pub relays: usize,
}

fn parse_relay_count(s: &str) -> Result<usize, String> {
    let count: usize = s.parse().map_err(|e| format!("{e}"))?;
    if (1..=MAX_RELAY_CAPACITY).contains(&count) {
        Ok(count)
    } else {
        Err(format!("relay count must be in 1..={MAX_RELAY_CAPACITY}"))
    }
}

/// Run a simulated switching session and report the resulting calibration.
pub fn simulate(args: &SimulateArgs, json: bool) -> Result<()> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(store) = &args.store {
        config.store_dir = Some(store.clone());
    }
    if args.unsynchronized {
        config.synchronized = false;
    }

    let zero_cross = Arc::new(SimulatedZeroCross::new());
    let mut mains = zero_cross.start_mains(config.mains_hz).map_err(CliError::from)?;
    let model = MainsModel::new(mains.started_at(), mains.semicycle_us());

    let store: Arc<dyn KeyValueStore> = match &config.store_dir {
        Some(dir) => Arc::new(FileStore::open(dir).map_err(CliError::from)?),
        None => Arc::new(MemoryStore::new()),
    };
    let notifier: Arc<dyn Notifier> =
        Arc::new(TopicNotifier::new(LogPublisher, &config.topic_base));

    let mut builder = RelayManager::builder(config.manager.clone())
        .map_err(|e| CliError::from(ManagerError::from(e)))?
        .store(store)
        .notifier(notifier);
    if config.synchronized {
        builder = builder.zero_cross(Arc::clone(&zero_cross) as Arc<dyn ZeroCrossSource>);
    }

    let mut relays = Vec::with_capacity(config.relays.len());
    for relay_config in &config.relays {
        let relay = Arc::new(SimRelay::new(relay_config, model));
        let feedback = relay_config
            .feedback
            .then(|| Arc::new(SimFeedback::new(Arc::clone(&relay))) as Arc<dyn FeedbackDevice>);
        builder
            .register(Arc::clone(&relay) as Arc<dyn Relay>, feedback)
            .map_err(CliError::from)?;
        relays.push((relay_config.feedback, relay));
    }

    let mut manager = builder
        .start()
        .map_err(CliError::from)
        .context("starting relay manager")?;
    let restore_repaired = match manager.restore_report() {
        RestoreReport::Restored => None,
        RestoreReport::Repaired { cause } => Some(cause.to_string()),
    };

    let topic = format!("{COMMAND_TOPIC_ROOT}/{}", config.topic_base);
    let limit = action_limit(&config.manager);
    let mut submitted = 0u64;
    'cycles: for cycle in 0..args.cycles {
        for (_, relay) in &relays {
            let id = relay.id();
            for action in [RelayAction::on(id), RelayAction::off(id)] {
                manager
                    .on_message(&topic, &action.encode())
                    .map_err(CliError::from)
                    .with_context(|| format!("submitting {action:?} on {topic}"))?;
                submitted = submitted.saturating_add(1);
                if !wait_processed(&manager, submitted, limit) {
                    warn!(relay = id, cycle, "Action did not finish in time");
                    break 'cycles;
                }
            }
        }
        debug!(cycle, "Cycle finished");
    }

    manager.shutdown();
    mains.stop();

    let stats = manager.stats();
    let metrics = manager.sync_metrics();
    let report = SimulationReport {
        synchronized: manager.is_synchronized(),
        mains_hz: config.mains_hz,
        semicycle_us: model.semicycle_us(),
        restore_repaired,
        submitted,
        completed: stats.completed(),
        timed_out: stats.timed_out(),
        rejected: stats.rejected(),
        sync: SyncSummary {
            arm_count: metrics.arm_count,
            switch_count: metrics.switch_count,
            ignored_edges: metrics.ignored_edges,
            cancel_count: metrics.cancel_count,
        },
        relays: relays
            .iter()
            .map(|(feedback, relay)| RelayReport {
                id: relay.id(),
                feedback: *feedback,
                config: manager.config(relay.id()).unwrap_or_default(),
                last_status: manager.feedback_result(relay.id()).status.bits(),
                is_on: relay.is_on(),
            })
            .collect(),
    };
    info!(submitted, completed = report.completed, "Simulation finished");
    output::print_simulation_report(&report, json);

    let processed = stats.processed();
    if processed < submitted {
        return Err(CliError::Incomplete {
            expected: submitted,
            completed: processed,
        }
        .into());
    }
    Ok(())
}

/// Print the persisted calibration of each relay slot.
pub fn show_config(args: &StoreArgs, json: bool) -> Result<()> {
    let store = open_store(&args.store)?;
    let rows: Vec<ConfigRow> = (0..args.relays)
        .map(|index| match store.load(index) {
            Ok(cfg) => ConfigRow::loaded(index, cfg),
            Err(e) => ConfigRow::failed(index, e),
        })
        .collect();
    output::print_config_table(&rows, json);
    Ok(())
}

/// Overwrite every relay slot with the factory default.
pub fn reset_config(args: &StoreArgs, json: bool) -> Result<()> {
    let store = open_store(&args.store)?;
    let mut rows = Vec::with_capacity(args.relays);
    for index in 0..args.relays {
        store
            .save(index, &CalibrationConfig::DEFAULT)
            .map_err(CliError::from)?;
        rows.push(ConfigRow::loaded(index, CalibrationConfig::DEFAULT));
    }
    info!(relays = args.relays, store = %args.store.display(), "Calibration reset to defaults");
    output::print_config_table(&rows, json);
    Ok(())
}

/// Print the built-in simulation config as YAML.
pub fn default_config() -> Result<()> {
    let yaml = serde_yaml::to_string(&AppConfig::default()).map_err(CliError::from)?;
    print!("{yaml}");
    Ok(())
}

fn open_store(dir: &Path) -> Result<CalibrationStore, CliError> {
    if !dir.is_dir() {
        return Err(CliError::StoreNotFound(dir.to_path_buf()));
    }
    let backend: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir)?);
    Ok(CalibrationStore::new(backend))
}

/// Longest an action may take before the run is abandoned.
fn action_limit(config: &ManagerConfig) -> Duration {
    let nominal = Duration::from_millis(
        u64::from(config.capture_time_ms).saturating_add(u64::from(config.inrush_time_ms)),
    );
    nominal
        .saturating_add(config.rendezvous_timeout().unwrap_or(UNBOUNDED_EDGE_WAIT))
        .saturating_add(ACTION_GRACE)
}

fn wait_processed(manager: &RelayManager, count: u64, limit: Duration) -> bool {
    let deadline = Instant::now().checked_add(limit);
    while manager.stats().processed() < count {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_limit_covers_nominal_duration() {
        let config = ManagerConfig::default();
        assert_eq!(action_limit(&config), Duration::from_millis(140 + 1_000 + 1_000));

        let bounded = ManagerConfig {
            rendezvous_timeout_ms: Some(50),
            ..ManagerConfig::default()
        };
        assert_eq!(action_limit(&bounded), Duration::from_millis(140 + 50 + 1_000));
    }

    #[test]
    fn relay_count_is_bounded() {
        assert_eq!(parse_relay_count("4"), Ok(4));
        assert_eq!(parse_relay_count("256"), Ok(256));
        assert!(parse_relay_count("0").is_err());
        assert!(parse_relay_count("257").is_err());
        assert!(parse_relay_count("four").is_err());
    }

    #[test]
    fn missing_store_is_reported() {
        let result = open_store(Path::new("/nonexistent/relay-state"));
        assert!(matches!(result, Err(CliError::StoreNotFound(_))));
    }
}
