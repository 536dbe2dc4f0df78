//! In-memory store for testing.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    Result,
    store::{OptionStore, TransientStore},
    time::now_ms,
};

#[derive(Debug, Clone)]
struct TransientEntry {
    value: String,
    expires_at_ms: u64,
}

/// In-memory store backed by `HashMap`. No persistence, for tests only.
///
/// Mutating option calls are counted so no-write properties can be asserted.
pub struct MemoryStore {
    options: Mutex<HashMap<String, String>>,
    transients: Mutex<HashMap<String, TransientEntry>>,
    option_writes: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: Mutex::new(HashMap::new()),
            transients: Mutex::new(HashMap::new()),
            option_writes: AtomicUsize::new(0),
        }
    }

    /// Number of mutating option-store calls so far.
    #[must_use]
    pub fn option_writes(&self) -> usize {
        self.option_writes.load(Ordering::SeqCst)
    }

    /// Force a transient to read as expired. Test support.
    pub fn expire_transient(&self, key: &str) {
        let mut transients = self.transients.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = transients.get_mut(key) {
            entry.expires_at_ms = 0;
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OptionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let options = self.options.lock().unwrap_or_else(|e| e.into_inner());
        Ok(options.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.option_writes.fetch_add(1, Ordering::SeqCst);
        let mut options = self.options.lock().unwrap_or_else(|e| e.into_inner());
        options.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.option_writes.fetch_add(1, Ordering::SeqCst);
        let mut options = self.options.lock().unwrap_or_else(|e| e.into_inner());
        options.remove(key);
        Ok(())
    }
}

#[async_trait]
impl TransientStore for MemoryStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_ms: u64) -> Result<()> {
        let mut transients = self.transients.lock().unwrap_or_else(|e| e.into_inner());
        transients.insert(key.to_string(), TransientEntry {
            value: value.to_string(),
            expires_at_ms: now_ms().saturating_add(ttl_ms),
        });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let transients = self.transients.lock().unwrap_or_else(|e| e.into_inner());
        Ok(transients
            .get(key)
            .filter(|entry| entry.expires_at_ms > now_ms())
            .map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut transients = self.transients.lock().unwrap_or_else(|e| e.into_inner());
        transients.remove(key);
        Ok(())
    }
}
