use adplace_core::types::ConsentPreference;
use adplace_core::AdResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::keys::{CONSENT_DATE_KEY, CONSENT_KEY};
use crate::KeyValueStore;

/// Persisted consent preference and the time it was given.
#[derive(Clone)]
pub struct ConsentStore {
    store: Arc<dyn KeyValueStore>,
}

impl ConsentStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current preference; absent or unrecognised values read as `Unset`.
    pub fn preference(&self) -> ConsentPreference {
        ConsentPreference::from_stored(self.store.get(CONSENT_KEY).as_deref())
    }

    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.store.get(CONSENT_DATE_KEY)?;
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn save(&self, preference: ConsentPreference, at: DateTime<Utc>) -> AdResult<()> {
        self.store.set(CONSENT_KEY, preference.as_str())?;
        self.store.set(CONSENT_DATE_KEY, &at.to_rfc3339())?;
        info!(preference = %preference, "Consent preference saved");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::LocalStore;

    #[test]
    fn test_first_visit_is_unset() {
        let consent = ConsentStore::new(Arc::new(LocalStore::new()));
        assert_eq!(consent.preference(), ConsentPreference::Unset);
        assert!(consent.saved_at().is_none());
    }

    #[test]
    fn test_save_and_read_back() {
        let store = Arc::new(LocalStore::new());
        let consent = ConsentStore::new(store.clone());
        let at = Utc::now();
        consent.save(ConsentPreference::None, at).unwrap();

        assert_eq!(consent.preference(), ConsentPreference::None);
        assert_eq!(store.get(CONSENT_KEY).as_deref(), Some("none"));
        assert_eq!(
            consent.saved_at().unwrap().timestamp(),
            at.timestamp()
        );
    }

    #[test]
    fn test_malformed_value_reads_unset() {
        let store = Arc::new(LocalStore::new());
        store.set(CONSENT_KEY, "maybe").unwrap();
        store.set(CONSENT_DATE_KEY, "yesterday").unwrap();
        let consent = ConsentStore::new(store);
        assert_eq!(consent.preference(), ConsentPreference::Unset);
        assert!(consent.saved_at().is_none());
    }
}
