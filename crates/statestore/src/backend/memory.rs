//! In-memory state store for tests.

use super::{StateStore, StoreOperation};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// State store that keeps objects in memory.
///
/// Clones share the same objects, so a test can keep a handle while the
/// code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    failing: Arc<Mutex<Option<StoreOperation>>>,
    tamper: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `operation` fail.
    pub fn fail_on(&self, operation: StoreOperation) {
        *lock(&self.failing) = Some(operation);
    }

    /// Simulate a concurrent writer: every read returns `value`.
    pub fn tamper_reads(&self, value: impl Into<Vec<u8>>) {
        *lock(&self.tamper) = Some(value.into());
    }

    /// Whether an object exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        lock(&self.objects).contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.objects).is_empty()
    }

    fn check(&self, operation: StoreOperation, key: &str) -> Result<()> {
        if *lock(&self.failing) != Some(operation) {
            return Ok(());
        }

        let message = "injected failure".to_string();
        let key = key.to_string();
        Err(match operation {
            StoreOperation::Put => Error::Put { key, message },
            StoreOperation::Get => Error::Get { key, message },
            StoreOperation::Delete => Error::Delete { key, message },
        })
    }
}

// Recover from poisoning; a panicking test thread should not cascade.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl StateStore for MemoryStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.check(StoreOperation::Put, key)?;
        lock(&self.objects).insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.check(StoreOperation::Get, key)?;
        let stored = lock(&self.objects)
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))?;

        Ok(lock(&self.tamper).clone().unwrap_or(stored))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.check(StoreOperation::Delete, key)?;
        lock(&self.objects).remove(key);
        Ok(())
    }
}
