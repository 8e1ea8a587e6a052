//! Integration tests for calibration persistence backends.

use std::sync::Arc;

use relaysync_calibration::prelude::*;
use relaysync_calibration::{RECORD_LEN, config_key};

#[test]
fn test_file_store_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;

    {
        let store = CalibrationStore::new(Arc::new(FileStore::open(dir.path())?));
        store.save(0, &CalibrationConfig::new(9_500, 8_200, 480))?;
        store.save(1, &CalibrationConfig::new(8_000, 8_000, 500))?;
    }

    let store = CalibrationStore::new(Arc::new(FileStore::open(dir.path())?));
    let mut configs = [CalibrationConfig::DEFAULT; 2];
    let report = store.restore(&mut configs);

    assert!(!report.is_repaired());
    assert_eq!(configs[0], CalibrationConfig::new(9_500, 8_200, 480));
    Ok(())
}

#[test]
fn test_file_record_is_fixed_size() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let store = CalibrationStore::new(Arc::new(FileStore::open(dir.path())?));
    store.save(3, &CalibrationConfig::DEFAULT)?;

    let bytes = std::fs::read(dir.path().join(format!("{}.bin", config_key(3))))?;
    assert_eq!(bytes.len(), RECORD_LEN);
    Ok(())
}

#[test]
fn test_load_failure_resets_every_relay() -> Result<(), Box<dyn std::error::Error>> {
    let backend = Arc::new(MemoryStore::new());
    let store = CalibrationStore::new(backend.clone());
    store.save(0, &CalibrationConfig::new(12_000, 12_000, 600))?;
    store.save(1, &CalibrationConfig::new(12_000, 12_000, 600))?;
    // relay 2 never saved

    let mut configs = [CalibrationConfig::DEFAULT; 3];
    let report = store.restore(&mut configs);

    assert!(matches!(
        report,
        RestoreReport::Repaired {
            cause: CalibrationError::Persistence { index: 2, .. }
        }
    ));
    assert_eq!(configs, [CalibrationConfig::DEFAULT; 3]);
    for i in 0..3 {
        assert_eq!(store.load(i)?, CalibrationConfig::DEFAULT);
    }
    Ok(())
}

#[test]
fn test_corrupt_record_size_resets() {
    let backend = Arc::new(MemoryStore::new());
    backend.insert_raw(config_key(0), vec![0u8; 5]);
    let store = CalibrationStore::new(backend);

    let mut configs = [CalibrationConfig::new(1, 1, 1)];
    let report = store.restore(&mut configs);

    assert!(matches!(
        report,
        RestoreReport::Repaired {
            cause: CalibrationError::Codec(_)
        }
    ));
    assert_eq!(configs[0], CalibrationConfig::DEFAULT);
}

#[tracing_test::traced_test]
#[test]
fn test_save_failure_is_not_fatal() {
    let backend = Arc::new(MemoryStore::new());
    backend.set_fail_saves(true);
    let store = CalibrationStore::new(backend.clone());

    let mut configs = [CalibrationConfig::new(1, 1, 1); 2];
    let report = store.restore(&mut configs);

    assert!(report.is_repaired());
    assert_eq!(configs, [CalibrationConfig::DEFAULT; 2]);
    assert_eq!(backend.save_count(), 0);
    assert!(logs_contain("Failed to persist default calibration"));
}
