//! Consent capture: the first-visit dialog and saving the visitor's choice.

use adplace_core::event_bus::{make_event, EventSink};
use adplace_core::types::{ConsentPreference, EventType};
use adplace_core::{AdError, AdResult, Clock};
use adplace_store::ConsentStore;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::host::{OverlayKind, PageHost};

const DIALOG_MARKUP: &str = r#"<div class="consent-dialog"><div class="consent-content"><h3>Privacy and advertising</h3><p>Advertising keeps this site free. You can choose:</p><div class="consent-options"><label><input type="radio" name="ad_preference" value="personalized"> Personalized ads</label><label><input type="radio" name="ad_preference" value="non_personalized"> Non-personalized ads only</label><label><input type="radio" name="ad_preference" value="none"> No ads</label></div><div class="consent-buttons"><button data-consent="personalized">Accept and continue</button><button data-consent="none">Refuse ads</button></div></div></div>"#;

pub struct ConsentManager {
    store: ConsentStore,
    host: Arc<dyn PageHost>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl ConsentManager {
    pub fn new(
        store: ConsentStore,
        host: Arc<dyn PageHost>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            host,
            sink,
            clock,
        }
    }

    pub fn preference(&self) -> ConsentPreference {
        self.store.preference()
    }

    /// Show the consent dialog when no preference is stored yet.
    /// Returns true if the dialog is on the page afterwards.
    pub fn setup(&self) -> bool {
        if self.preference() != ConsentPreference::Unset {
            return false;
        }
        if !self.host.has_overlay(OverlayKind::ConsentDialog) {
            self.host
                .append_overlay(OverlayKind::ConsentDialog, DIALOG_MARKUP);
            info!("Consent dialog shown");
        }
        true
    }

    /// Persist an explicit choice and close the dialog.
    pub fn save(&self, preference: ConsentPreference) -> AdResult<()> {
        if preference == ConsentPreference::Unset {
            return Err(AdError::Parse(
                "unset is not a consent choice".to_string(),
            ));
        }

        let now = self.clock.now_utc();
        self.store.save(preference, now)?;
        self.host.remove_overlay(OverlayKind::ConsentDialog);

        self.sink.emit(make_event(
            EventType::AdConsent,
            json!({
                "preference": preference.as_str(),
                "timestamp": now.to_rfc3339(),
            }),
        ));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::host::InMemoryPage;
    use adplace_core::event_bus::capture_sink;
    use adplace_core::SystemClock;
    use adplace_store::LocalStore;

    fn manager(page: Arc<InMemoryPage>, sink: Arc<dyn EventSink>) -> ConsentManager {
        ConsentManager::new(
            ConsentStore::new(Arc::new(LocalStore::new())),
            page,
            sink,
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn test_first_visit_shows_dialog_once() {
        let page = Arc::new(InMemoryPage::new());
        let consent = manager(page.clone(), adplace_core::event_bus::noop_sink());
        assert!(consent.setup());
        assert!(consent.setup());
        assert!(page.overlay(OverlayKind::ConsentDialog).unwrap().contains("non_personalized"));
    }

    #[test]
    fn test_save_closes_dialog_and_tracks() {
        let page = Arc::new(InMemoryPage::new());
        let sink = capture_sink();
        let consent = manager(page.clone(), sink.clone());
        consent.setup();

        consent.save(ConsentPreference::None).unwrap();
        assert_eq!(consent.preference(), ConsentPreference::None);
        assert!(!page.has_overlay(OverlayKind::ConsentDialog));
        assert_eq!(sink.count_type(EventType::AdConsent), 1);
        assert_eq!(sink.events()[0].data["preference"], "none");

        // Stored preference suppresses the dialog
        assert!(!consent.setup());
        assert!(!page.has_overlay(OverlayKind::ConsentDialog));
    }

    #[test]
    fn test_unset_is_rejected() {
        let consent = manager(Arc::new(InMemoryPage::new()), adplace_core::event_bus::noop_sink());
        assert!(consent.save(ConsentPreference::Unset).is_err());
    }
}
