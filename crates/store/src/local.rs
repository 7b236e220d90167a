//! In-process store backed by DashMap. Stands in for browser local storage
//! in tests and single-run simulations.

use adplace_core::{AdError, AdResult};
use dashmap::DashMap;
use std::sync::Arc;

use crate::KeyValueStore;

pub struct LocalStore {
    store: Arc<DashMap<String, String>>,
    max_entries: usize,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::with_capacity(usize::MAX)
    }

    /// Store that rejects new keys once `max_entries` are held, like a full
    /// browser quota.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Option<String> {
        self.store.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> AdResult<()> {
        if self.store.len() >= self.max_entries && !self.store.contains_key(key) {
            return Err(AdError::Storage(format!("quota exceeded writing '{key}'")));
        }
        self.store.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AdResult<()> {
        self.store.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.store.iter().map(|e| e.key().clone()).collect()
    }
}
