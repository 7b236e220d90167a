//! Behaviour tracking bus: trait for emitting named tracking events from
//! any part of the ad layer.
//!
//! Components accept an `Arc<dyn EventSink>`; the storage crate provides a
//! sink that appends to the persisted `userBehaviors` log.

use crate::types::{BehaviorEvent, EventType};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Trait for emitting tracking events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: BehaviorEvent);
}

/// No-op sink for tests and components that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: BehaviorEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<BehaviorEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<BehaviorEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn count_type(&self, action: EventType) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.action == action)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: BehaviorEvent) {
        self.events.lock().push(event);
    }
}

/// Convenience builder for a `BehaviorEvent` stamped with the current time.
pub fn make_event(action: EventType, data: serde_json::Value) -> BehaviorEvent {
    BehaviorEvent {
        event_id: Uuid::new_v4(),
        action,
        data,
        page: None,
        timestamp: Utc::now(),
    }
}

/// Convenience: create a no-op event bus.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
