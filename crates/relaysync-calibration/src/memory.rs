//! In-memory key-value backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::StoreError;
use crate::store::KeyValueStore;

/// Volatile key-value store with failure injection.
///
/// Useful for hosted runs and for exercising the default-config fallback.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    save_count: AtomicU64,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `load` fail (or succeed again).
    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::Release);
    }

    /// Make every subsequent `save` fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::Release);
    }

    /// Number of successful saves since creation.
    pub fn save_count(&self) -> u64 {
        self.save_count.load(Ordering::Acquire)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Raw bytes stored under `key`.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().get(key).cloned()
    }

    /// Store raw bytes without going through the trait, bypassing failure
    /// injection and the save counter.
    pub fn insert_raw(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.entries.lock().insert(key.into(), bytes);
    }
}

impl KeyValueStore for MemoryStore {
    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::Acquire) {
            return Err(StoreError::Backend(format!("injected save failure for {key}")));
        }
        self.entries.lock().insert(key.to_string(), bytes.to_vec());
        self.save_count.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        if self.fail_loads.load(Ordering::Acquire) {
            return Err(StoreError::Backend(format!("injected load failure for {key}")));
        }
        self.entries
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}
