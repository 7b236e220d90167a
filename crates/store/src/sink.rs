//! Event sink that appends tracking events to the persisted `userBehaviors` log.

use adplace_core::event_bus::EventSink;
use adplace_core::types::BehaviorEvent;
use serde_json::json;
use tracing::{debug, warn};

use crate::log::CappedLog;

pub struct StorageSink {
    log: CappedLog,
    page: Option<String>,
}

impl StorageSink {
    pub fn new(log: CappedLog) -> Self {
        Self { log, page: None }
    }

    /// Stamp every event with the page path it was recorded on.
    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }
}

impl EventSink for StorageSink {
    fn emit(&self, event: BehaviorEvent) {
        let page = event.page.clone().or_else(|| self.page.clone());
        let entry = json!({
            "action": event.action,
            "data": event.data,
            "timestamp": event.timestamp.to_rfc3339(),
            "page": page,
        });
        match self.log.append(&entry) {
            Ok(len) => debug!(action = ?event.action, stored = len, "behaviour event recorded"),
            Err(e) => warn!(action = ?event.action, error = %e, "Failed to record behaviour event"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::keys::USER_BEHAVIORS_KEY;
    use crate::{KeyValueStore, LocalStore};
    use adplace_core::event_bus::make_event;
    use adplace_core::types::EventType;
    use std::sync::Arc;

    #[test]
    fn test_events_land_in_behaviour_log() {
        let store: Arc<dyn KeyValueStore> = Arc::new(LocalStore::new());
        let log = CappedLog::new(store.clone(), USER_BEHAVIORS_KEY, 100);
        let sink = StorageSink::new(log.clone()).with_page("/tools.html");

        sink.emit(make_event(EventType::AdConsent, json!({ "preference": "none" })));

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["action"], "ad_consent");
        assert_eq!(entries[0]["data"]["preference"], "none");
        assert_eq!(entries[0]["page"], "/tools.html");
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let store: Arc<dyn KeyValueStore> = Arc::new(LocalStore::with_capacity(0));
        let sink = StorageSink::new(CappedLog::new(store, USER_BEHAVIORS_KEY, 100));
        // Should not panic
        sink.emit(make_event(EventType::AdblockDetected, json!({})));
    }
}
