//! Registration, restore, messaging, queueing and persistence behavior of a
//! running manager.

use std::sync::Arc;
use std::time::{Duration, Instant};

use relaysync_calibration::{
    CalibrationConfig, FeedbackResult, FeedbackStatus, KeyValueStore, MemoryStore,
    PersistPolicy, config_key,
};
use relaysync_manager::prelude::*;
use relaysync_manager::{ManagerStats, TopicNotifier};
use relaysync_test_helpers::prelude::*;
use relaysync_timing::ManualClock;
use relaysync_zerocross::{EdgeLevel, ZeroCrossSource};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn fast_config() -> ManagerConfig {
    ManagerConfig {
        relay_capacity: 2,
        ..ManagerConfig::default()
    }
}

fn builder(trace: &EventTrace, config: ManagerConfig) -> Result<RelayManagerBuilder, ConfigError> {
    Ok(RelayManager::builder(config)?
        .clock(Arc::new(ManualClock::with_step(100)))
        .sleeper(Arc::new(RecordingSleeper::new(trace))))
}

fn wait_until(deadline: Duration, cond: impl Fn() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

fn wait_processed(stats: &ManagerStats, n: u64) -> bool {
    wait_until(Duration::from_secs(5), || stats.processed() >= n)
}

fn stored(store: &MemoryStore, index: usize) -> Option<CalibrationConfig> {
    store
        .get(&config_key(index))
        .and_then(|bytes| CalibrationConfig::from_record(&bytes).ok())
}

mod registration {
    use super::*;

    #[test]
    fn test_out_of_range_and_duplicate() -> TestResult {
        let trace = EventTrace::new();
        let mut b = builder(&trace, fast_config())?;

        assert_eq!(b.register(Arc::new(MockRelay::new(1, &trace)), None)?, 1);
        assert_eq!(
            b.register(Arc::new(MockRelay::new(2, &trace)), None),
            Err(RegistrationError::OutOfRange { id: 2, capacity: 2 })
        );
        assert_eq!(
            b.register(Arc::new(MockRelay::new(1, &trace)), None),
            Err(RegistrationError::Duplicate(1))
        );
        Ok(())
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ManagerConfig {
            queue_capacity: 0,
            ..ManagerConfig::default()
        };
        assert!(matches!(
            RelayManager::builder(config),
            Err(ConfigError::ZeroQueueCapacity)
        ));
    }

    #[test]
    fn test_action_for_unregistered_relay_dropped() -> TestResult {
        let trace = EventTrace::new();
        let notifier = Arc::new(RecordingNotifier::new(&trace));
        let mut b = builder(&trace, fast_config())?.notifier(Arc::clone(&notifier) as Arc<dyn Notifier>);
        b.register(Arc::new(MockRelay::new(0, &trace)), None)?;
        let mut manager = b.start()?;

        manager.submit(RelayAction::on(1))?;
        manager.shutdown();

        assert_eq!(manager.stats().rejected(), 1);
        assert!(notifier.statuses().is_empty());
        Ok(())
    }
}

mod restore {
    use super::*;

    #[test]
    fn test_empty_store_repaired_and_persisted() -> TestResult {
        let trace = EventTrace::new();
        let store = Arc::new(MemoryStore::new());
        let mut manager = builder(&trace, fast_config())?
            .store(Arc::clone(&store) as Arc<dyn KeyValueStore>)
            .start()?;

        assert!(manager.restore_report().is_repaired());
        assert_eq!(manager.configs(), vec![CalibrationConfig::DEFAULT; 2]);
        assert_eq!(stored(&store, 0), Some(CalibrationConfig::DEFAULT));
        assert_eq!(stored(&store, 1), Some(CalibrationConfig::DEFAULT));
        manager.shutdown();
        Ok(())
    }

    #[test]
    fn test_valid_records_restored() -> TestResult {
        let trace = EventTrace::new();
        let store = Arc::new(MemoryStore::new());
        let a = CalibrationConfig::new(9_000, 12_000, 450);
        let b = CalibrationConfig::new(8_500, 8_100, 300);
        store.insert_raw(config_key(0), a.to_record()?);
        store.insert_raw(config_key(1), b.to_record()?);

        let manager = builder(&trace, fast_config())?
            .store(Arc::clone(&store) as Arc<dyn KeyValueStore>)
            .start()?;

        assert!(!manager.restore_report().is_repaired());
        assert_eq!(manager.config(0), Some(a));
        assert_eq!(manager.config(1), Some(b));
        assert_eq!(store.save_count(), 0);
        Ok(())
    }

    #[test]
    fn test_one_invalid_record_resets_all() -> TestResult {
        let trace = EventTrace::new();
        let store = Arc::new(MemoryStore::new());
        store.insert_raw(config_key(0), CalibrationConfig::new(9_000, 9_000, 450).to_record()?);
        store.insert_raw(config_key(1), CalibrationConfig::new(60_000, 9_000, 450).to_record()?);

        let manager = builder(&trace, fast_config())?
            .store(Arc::clone(&store) as Arc<dyn KeyValueStore>)
            .start()?;

        assert!(manager.restore_report().is_repaired());
        assert!(manager.configs().iter().all(|c| *c == CalibrationConfig::DEFAULT));
        assert_eq!(stored(&store, 0), Some(CalibrationConfig::DEFAULT));
        Ok(())
    }
}

mod messages {
    use super::*;

    #[test]
    fn test_on_message_routes_commands() -> TestResult {
        let trace = EventTrace::new();
        let notifier = Arc::new(RecordingNotifier::new(&trace));
        let mut b = builder(&trace, fast_config())?.notifier(Arc::clone(&notifier) as Arc<dyn Notifier>);
        b.register(Arc::new(MockRelay::new(0, &trace)), None)?;
        let mut manager = b.start()?;

        assert!(matches!(
            manager.on_message("get/value/relays", &[0, 2]),
            Err(MessageError::UnknownTopic(_))
        ));
        assert!(matches!(
            manager.on_message("set/value/relays", &[0, 2, 0]),
            Err(MessageError::Format(_))
        ));
        manager.on_message("set/value/relays", &[0, 2])?;
        manager.on_message("set/value", &[0, 1])?;
        manager.shutdown();

        assert_eq!(
            notifier.statuses(),
            vec![RelayAction::on(0), RelayAction::off(0)]
        );
        Ok(())
    }

    #[test]
    fn test_unknown_request_touches_no_hardware() -> TestResult {
        let trace = EventTrace::new();
        let relay = Arc::new(MockRelay::new(0, &trace));
        let feedback = Arc::new(MockFeedback::new(0, &trace));
        let mut b = builder(&trace, fast_config())?;
        b.register(
            Arc::clone(&relay) as Arc<dyn Relay>,
            Some(feedback as Arc<dyn FeedbackDevice>),
        )?;
        let mut manager = b.start()?;

        manager.on_message("set/value/relays", &[0, 0x03])?;
        manager.shutdown();

        assert!(trace.is_empty());
        assert_eq!(manager.stats().rejected(), 1);
        Ok(())
    }

    #[test]
    fn test_topic_notifier_publishes_wire_payloads() -> TestResult {
        let trace = EventTrace::new();
        let publisher = Arc::new(RecordingPublisher::new());
        let notifier = TopicNotifier::new(Arc::clone(&publisher), "board/relays");
        let mut b = builder(&trace, fast_config())?.notifier(Arc::new(notifier) as Arc<dyn Notifier>);
        b.register(
            Arc::new(MockRelay::new(1, &trace)),
            Some(Arc::new(MockFeedback::new(1, &trace)) as Arc<dyn FeedbackDevice>),
        )?;
        let mut manager = b.start()?;

        manager.submit(RelayAction::on(1))?;
        manager.shutdown();

        assert_eq!(
            publisher.published(),
            vec![
                ("stat/value/board/relays".to_string(), vec![1, 0x02]),
                ("stat/fdbk/board/relays".to_string(), vec![b'1']),
            ]
        );
        Ok(())
    }
}

mod queueing {
    use super::*;

    #[test]
    fn test_overflow_hands_request_back_after_timeout() -> TestResult {
        let trace = EventTrace::new();
        let gate = Arc::new(GateSleeper::new());
        let config = ManagerConfig {
            put_timeout_ms: 30,
            ..fast_config()
        };
        let mut b = RelayManager::builder(config)?
            .clock(Arc::new(ManualClock::with_step(100)))
            .sleeper(Arc::clone(&gate) as Arc<dyn relaysync_timing::Sleeper>);
        b.register(Arc::new(MockRelay::new(0, &trace)), None)?;
        let mut manager = b.start()?;

        // The worker picks this one up and parks in the settle wait.
        manager.submit(RelayAction::on(0))?;
        assert!(wait_until(Duration::from_secs(5), || manager.pending() == 0));

        for _ in 0..16 {
            manager.submit(RelayAction::off(0))?;
        }

        let overflow = RelayAction {
            relay_id: 0,
            request: 0x02,
        };
        let started = Instant::now();
        let err = match manager.submit(overflow) {
            Err(e) => e,
            Ok(()) => return Err("17th queued request accepted".into()),
        };
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert!(!err.is_stopped());
        assert_eq!(err.into_message(), overflow);

        gate.open();
        manager.shutdown();
        assert_eq!(manager.stats().completed(), 17);
        Ok(())
    }

    #[test]
    fn test_submit_after_shutdown_returns_request() -> TestResult {
        let trace = EventTrace::new();
        let mut manager = builder(&trace, fast_config())?.start()?;
        manager.shutdown();

        match manager.submit(RelayAction::on(0)) {
            Err(e) => {
                assert!(e.is_stopped());
                assert_eq!(e.into_message(), RelayAction::on(0));
            }
            Ok(()) => return Err("submit after shutdown accepted".into()),
        }
        Ok(())
    }
}

mod liveness {
    use super::*;

    #[test]
    fn test_missing_edge_times_out_without_switching() -> TestResult {
        let trace = EventTrace::new();
        let relay = Arc::new(MockRelay::new(0, &trace));
        let zc = Arc::new(MockZeroCross::manual(&trace));
        let notifier = Arc::new(RecordingNotifier::new(&trace));
        let config = ManagerConfig {
            rendezvous_timeout_ms: Some(20),
            ..fast_config()
        };
        let mut b = builder(&trace, config)?
            .zero_cross(Arc::clone(&zc) as Arc<dyn ZeroCrossSource>)
            .notifier(Arc::clone(&notifier) as Arc<dyn Notifier>);
        b.register(
            Arc::clone(&relay) as Arc<dyn Relay>,
            Some(Arc::new(MockFeedback::new(0, &trace)) as Arc<dyn FeedbackDevice>),
        )?;
        let mut manager = b.start()?;

        manager.submit(RelayAction::on(0))?;
        assert!(wait_processed(manager.stats(), 1));

        // Late edge after disarm.
        assert!(!zc.fire(EdgeLevel::Rising));
        manager.shutdown();

        assert_eq!(
            trace.events(),
            vec![
                TraceEvent::FeedbackStart(0),
                TraceEvent::Sleep(40),
                TraceEvent::Arm(EdgeLevel::Both),
                TraceEvent::Disarm(EdgeLevel::Both),
                TraceEvent::FeedbackStop(0),
            ]
        );
        assert!(!relay.is_on());
        assert!(notifier.statuses().is_empty());
        assert_eq!(manager.stats().timed_out(), 1);
        Ok(())
    }

    #[test]
    fn test_manual_edge_completes_pending_action() -> TestResult {
        let trace = EventTrace::new();
        let relay = Arc::new(MockRelay::new(0, &trace));
        let zc = Arc::new(MockZeroCross::manual(&trace));
        let mut b = builder(&trace, fast_config())?.zero_cross(Arc::clone(&zc) as Arc<dyn ZeroCrossSource>);
        b.register(Arc::clone(&relay) as Arc<dyn Relay>, None)?;
        let mut manager = b.start()?;

        manager.submit(RelayAction::on(0))?;
        assert!(wait_until(Duration::from_secs(5), || zc.is_armed()));
        assert!(zc.fire(EdgeLevel::Falling));
        assert!(wait_processed(manager.stats(), 1));
        manager.shutdown();

        assert!(relay.is_on());
        assert_eq!(zc.arm_count(), 1);
        Ok(())
    }
}

mod persistence {
    use super::*;

    fn result(status: FeedbackStatus, t_semicycle_us: u32) -> FeedbackResult {
        FeedbackResult {
            status,
            t_on_us: 0,
            t_off_us: 0,
            t_semicycle_us,
        }
    }

    fn run(
        policy: PersistPolicy,
        results: Vec<FeedbackResult>,
    ) -> Result<(Arc<MemoryStore>, RelayManager), Box<dyn std::error::Error>> {
        let trace = EventTrace::new();
        let store = Arc::new(MemoryStore::new());
        store.insert_raw(config_key(0), CalibrationConfig::DEFAULT.to_record()?);
        store.insert_raw(config_key(1), CalibrationConfig::DEFAULT.to_record()?);

        let count = results.len();
        let config = ManagerConfig {
            persist_policy: policy,
            ..fast_config()
        };
        let mut b = builder(&trace, config)?.store(Arc::clone(&store) as Arc<dyn KeyValueStore>);
        b.register(
            Arc::new(MockRelay::new(0, &trace)),
            Some(Arc::new(MockFeedback::new(0, &trace).with_results(results)) as Arc<dyn FeedbackDevice>),
        )?;
        let mut manager = b.start()?;
        for i in 0..count {
            let action = if i % 2 == 0 {
                RelayAction::on(0)
            } else {
                RelayAction::off(0)
            };
            manager.submit(action)?;
        }
        manager.shutdown();
        Ok((store, manager))
    }

    #[test]
    fn test_on_change_saves_clean_result_that_moves_delta() -> TestResult {
        let (store, manager) = run(
            PersistPolicy::OnChange,
            vec![result(FeedbackStatus::empty(), 8_000)],
        )?;
        let expected = CalibrationConfig::new(8_000, 8_000, 400);
        assert_eq!(manager.config(0), Some(expected));
        assert_eq!(stored(&store, 0), Some(expected));
        assert_eq!(store.save_count(), 1);
        Ok(())
    }

    #[test]
    fn test_on_change_skips_identical_config() -> TestResult {
        let (store, _manager) = run(
            PersistPolicy::OnChange,
            vec![result(FeedbackStatus::empty(), 10_000)],
        )?;
        assert_eq!(store.save_count(), 0);
        Ok(())
    }

    #[test]
    fn test_on_convergence_saves_on_first_clean_result() -> TestResult {
        let (store, manager) = run(
            PersistPolicy::OnConvergence,
            vec![
                result(FeedbackStatus::TIME_ON_LOW, 10_000),
                result(FeedbackStatus::TIME_OFF_HIGH, 10_000),
                result(FeedbackStatus::empty(), 10_000),
            ],
        )?;
        let expected = CalibrationConfig::new(8_500, 8_500, 500);
        assert_eq!(manager.config(0), Some(expected));
        assert_eq!(store.save_count(), 1);
        assert_eq!(stored(&store, 0), Some(expected));
        Ok(())
    }

    #[test]
    fn test_save_failure_is_not_fatal() -> TestResult {
        let trace = EventTrace::new();
        let store = Arc::new(MemoryStore::new());
        store.insert_raw(config_key(0), CalibrationConfig::DEFAULT.to_record()?);
        store.insert_raw(config_key(1), CalibrationConfig::DEFAULT.to_record()?);
        store.set_fail_saves(true);

        let mut b = builder(&trace, fast_config())?.store(Arc::clone(&store) as Arc<dyn KeyValueStore>);
        b.register(
            Arc::new(MockRelay::new(0, &trace)),
            Some(Arc::new(
                MockFeedback::new(0, &trace)
                    .with_fallback(result(FeedbackStatus::TIME_ON_HIGH, 10_000)),
            ) as Arc<dyn FeedbackDevice>),
        )?;
        let mut manager = b.start()?;
        manager.submit(RelayAction::on(0))?;
        manager.submit(RelayAction::off(0))?;
        manager.shutdown();

        assert_eq!(manager.stats().completed(), 2);
        assert_eq!(
            manager.config(0),
            Some(CalibrationConfig::new(7_000, 8_000, 500))
        );
        assert_eq!(stored(&store, 0), Some(CalibrationConfig::DEFAULT));
        Ok(())
    }
}

mod config_file {
    use super::*;

    #[test]
    fn test_yaml_overrides_defaults() -> TestResult {
        let yaml = "
relay_capacity: 8
rendezvous_timeout_ms: 250
persist_policy: on_convergence
edge_level: rising
";
        let config: ManagerConfig = serde_yaml::from_str(yaml)?;
        assert_eq!(config.relay_capacity, 8);
        assert_eq!(config.rendezvous_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.persist_policy, PersistPolicy::OnConvergence);
        assert_eq!(config.edge_level, EdgeLevel::Rising);
        assert_eq!(config.queue_capacity, 16);
        config.validate()?;
        Ok(())
    }
}
