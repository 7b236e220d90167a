//! Ad-blocker detection. Informational only: never gates placement.

use adplace_core::event_bus::{make_event, EventSink};
use adplace_core::types::EventType;
use chrono::Utc;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

use crate::host::{OverlayKind, PageHost};

const PROBE_MARKUP: &str = r#"<div class="adsbox" style="position:absolute;left:-999px;width:1px;height:1px">&nbsp;</div>"#;

const NOTICE_MARKUP: &str = r#"<div class="adblock-notice"><div class="notice-content"><h4>Ad blocker detected</h4><p>This site is funded by advertising. Please consider adding it to your allow list.</p><button data-dismiss="adblock-notice">Got it</button></div></div>"#;

pub struct AdBlockDetector {
    delay: Duration,
    notice_shown: AtomicBool,
}

impl AdBlockDetector {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            notice_shown: AtomicBool::new(false),
        }
    }

    /// Append the probe, wait, and report whether it was hidden.
    pub async fn detect(&self, host: &dyn PageHost, sink: &dyn EventSink) -> bool {
        host.append_overlay(OverlayKind::AdProbe, PROBE_MARKUP);
        tokio::time::sleep(self.delay).await;

        let blocked = host.rendered_height(OverlayKind::AdProbe) == 0;
        host.remove_overlay(OverlayKind::AdProbe);

        if blocked {
            self.handle_detected(host, sink);
        }
        blocked
    }

    fn handle_detected(&self, host: &dyn PageHost, sink: &dyn EventSink) {
        if self.notice_shown.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Ad blocker detected");
        metrics::counter!("ads.adblock_detected").increment(1);

        host.append_overlay(OverlayKind::AdBlockNotice, NOTICE_MARKUP);
        sink.emit(make_event(
            EventType::AdblockDetected,
            json!({ "timestamp": Utc::now().to_rfc3339() }),
        ));
    }

    pub fn dismiss(&self, host: &dyn PageHost) {
        host.remove_overlay(OverlayKind::AdBlockNotice);
    }
}
