//! Bounded JSON-array logs (`adStats`, `userBehaviors`). Oldest entries are
//! dropped first once the cap is reached.

use adplace_core::AdResult;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::KeyValueStore;

#[derive(Clone)]
pub struct CappedLog {
    store: Arc<dyn KeyValueStore>,
    key: String,
    cap: usize,
}

impl CappedLog {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>, cap: usize) -> Self {
        Self {
            store,
            key: key.into(),
            cap,
        }
    }

    /// Entries currently stored. A malformed array reads as empty.
    pub fn entries(&self) -> Vec<Value> {
        let Some(raw) = self.store.get(&self.key) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Malformed log, treating as empty");
                Vec::new()
            }
        }
    }

    /// Append an entry and trim to the cap. Returns the stored length.
    pub fn append<T: Serialize>(&self, entry: &T) -> AdResult<usize> {
        let mut entries = self.entries();
        entries.push(serde_json::to_value(entry)?);
        if entries.len() > self.cap {
            let excess = entries.len() - self.cap;
            entries.drain(..excess);
        }
        self.store.set(&self.key, &serde_json::to_string(&entries)?)?;
        Ok(entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::LocalStore;
    use serde_json::json;

    #[test]
    fn test_cap_drops_oldest_first() {
        let log = CappedLog::new(Arc::new(LocalStore::new()), "adStats", 3);
        for i in 0..5 {
            log.append(&json!({ "n": i })).unwrap();
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["n"], 2);
        assert_eq!(entries[2]["n"], 4);
    }

    #[test]
    fn test_malformed_array_is_replaced() {
        let store = Arc::new(LocalStore::new());
        store.set("adStats", "{oops").unwrap();
        let log = CappedLog::new(store, "adStats", 100);
        assert!(log.is_empty());
        assert_eq!(log.append(&json!({ "n": 1 })).unwrap(), 1);
    }
}
