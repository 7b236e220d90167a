//! JSON-file store so consent, counters and logs survive between runs of
//! the CLI the way local storage survives page loads.
//!
//! Every write re-reads the file and applies only its own key, so processes
//! sharing one file keep each other's unrelated keys. Concurrent writers of
//! the same key still race, last write wins.

use adplace_core::AdResult;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::KeyValueStore;

pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`. A missing file starts empty; an unreadable
    /// one is logged and also starts empty.
    pub fn open(path: impl AsRef<Path>) -> AdResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = read_entries(&path)?;

        info!(path = %path.display(), keys = entries.len(), "File store opened");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Refresh from disk, apply `change`, and write the result back.
    fn update(&self, change: impl FnOnce(&mut BTreeMap<String, String>) -> bool) -> AdResult<()> {
        let mut entries = self.entries.lock();
        *entries = read_entries(&self.path)?;
        if change(&mut entries) {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> AdResult<()> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self
            .path
            .with_extension(format!("{}.tmp", std::process::id()));
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), keys = entries.len(), "File store flushed");
        Ok(())
    }
}

fn read_entries(path: &Path) -> AdResult<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let raw = std::fs::read_to_string(path)?;
    match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed store file, starting empty");
            Ok(BTreeMap::new())
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> AdResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> AdResult<()> {
        self.update(|entries| entries.remove(key).is_some())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }
}
