//! Per-provider daily display counters. A new day gets a new key, so
//! counters reset implicitly; previous days' keys are left in place.

use adplace_core::clock::day_key;
use adplace_core::types::ProviderId;
use adplace_core::AdResult;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

use crate::keys::counter_key;
use crate::KeyValueStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCounter {
    pub date_key: String,
    pub count: u32,
}

#[derive(Clone)]
pub struct DailyCounterStore {
    store: Arc<dyn KeyValueStore>,
}

impl DailyCounterStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Counter for `provider` on `date`. Missing or non-numeric values read as zero.
    pub fn read(&self, provider: ProviderId, date: NaiveDate) -> DailyCounter {
        let count = self
            .store
            .get(&counter_key(provider, date))
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .unwrap_or(0);
        DailyCounter {
            date_key: day_key(date),
            count,
        }
    }

    /// Read-modify-write increment; returns the new count.
    pub fn increment(&self, provider: ProviderId, date: NaiveDate) -> AdResult<u32> {
        let next = self.read(provider, date).count.saturating_add(1);
        self.store
            .set(&counter_key(provider, date), &next.to_string())?;
        debug!(provider = %provider, count = next, "Daily counter incremented");
        Ok(next)
    }

    /// Overwrite the counter, e.g. to undo an increment whose display never ran.
    pub fn set(&self, provider: ProviderId, date: NaiveDate, count: u32) -> AdResult<()> {
        self.store
            .set(&counter_key(provider, date), &count.to_string())
    }
}
