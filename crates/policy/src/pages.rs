//! Page entry points. Each initializes the ad layer, waits for the page to
//! settle, then fills the well-known containers that exist on the page.
//!
//! The two lists overlap; running both against one page is not idempotent
//! and the later placement wins.

use std::sync::Arc;
use std::time::Duration;

use adplace_core::types::{ProviderId, SlotRequest, SlotType};
use serde::Serialize;
use tracing::info;

use crate::manager::{AdManager, InitHandles, PlacementOutcome};

/// Containers filled by [`load_page_ads`].
pub const PAGE_AD_CONTAINERS: [(&str, SlotType); 10] = [
    ("ad-container-banner", SlotType::Banner),
    ("ad-container-sidebar", SlotType::Sidebar),
    ("adsense-banner-1", SlotType::Banner),
    ("adsense-sidebar-1", SlotType::Sidebar),
    ("adsense-sidebar-2", SlotType::Sidebar),
    ("adsense-footer", SlotType::Footer),
    ("ad-container-article-1", SlotType::Article),
    ("ad-container-article-2", SlotType::Sidebar),
    ("ad-container-player-1", SlotType::Banner),
    ("ad-container-player-2", SlotType::Sidebar),
];

/// Containers filled by [`init_tools_page_ads`].
pub const TOOLS_PAGE_AD_CONTAINERS: [(&str, SlotType); 4] = [
    ("adsense-banner-1", SlotType::Banner),
    ("adsense-sidebar-1", SlotType::Sidebar),
    ("adsense-sidebar-2", SlotType::Sidebar),
    ("adsense-footer", SlotType::Footer),
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageReport {
    pub placed: Vec<(String, ProviderId)>,
    /// Containers hidden because the visitor clicked them today.
    pub hidden: Vec<String>,
    pub unfilled: Vec<String>,
}

/// General page entry point.
pub async fn load_page_ads(manager: &Arc<AdManager>, page_type: &str) -> (PageReport, InitHandles) {
    let handles = manager.init();
    let delay = manager.config().timing.load_ads_delay_ms;
    tokio::time::sleep(Duration::from_millis(delay)).await;

    let report = fill(manager, &PAGE_AD_CONTAINERS, true);
    info!(
        page_type,
        placed = report.placed.len(),
        hidden = report.hidden.len(),
        "Page ads loaded"
    );
    (report, handles)
}

/// Tools page entry point.
pub async fn init_tools_page_ads(manager: &Arc<AdManager>) -> (PageReport, InitHandles) {
    let handles = manager.init();
    let delay = manager.config().timing.tools_page_delay_ms;
    tokio::time::sleep(Duration::from_millis(delay)).await;

    let report = fill(manager, &TOOLS_PAGE_AD_CONTAINERS, false);
    info!(placed = report.placed.len(), "Tools page ads initialized");
    (report, handles)
}

fn fill(manager: &AdManager, containers: &[(&str, SlotType)], honour_clicks: bool) -> PageReport {
    let max_ads = manager.effective_policy().max_ads_per_page();
    let mut report = PageReport::default();

    for (container_id, slot) in containers {
        if !manager.host().has_container(container_id) {
            continue;
        }
        if honour_clicks && manager.clicked_today(container_id) {
            manager.host().hide_container(container_id);
            report.hidden.push(container_id.to_string());
            continue;
        }
        if report.placed.len() >= max_ads {
            report.unfilled.push(container_id.to_string());
            continue;
        }
        let request = SlotRequest::new(*container_id, *slot);
        match manager.place(&request) {
            PlacementOutcome::Placed { provider } => {
                report.placed.push((request.container_id, provider));
            }
            PlacementOutcome::NotPlaced(_) => report.unfilled.push(request.container_id),
        }
    }
    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::host::{InMemoryPage, PageHost};
    use adplace_core::AppConfig;
    use adplace_store::LocalStore;

    fn manager(config: AppConfig, page: Arc<InMemoryPage>) -> Arc<AdManager> {
        Arc::new(AdManager::new(
            Arc::new(config),
            page,
            Arc::new(LocalStore::new()),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_page_ads_fills_present_containers() {
        let page = Arc::new(
            InMemoryPage::new()
                .with_container("ad-container-banner")
                .with_container("ad-container-article-1")
                .with_container("unrelated"),
        );
        let manager = manager(AppConfig::default(), page.clone());

        let (report, _handles) = load_page_ads(&manager, "home").await;
        assert_eq!(
            report.placed,
            vec![
                ("ad-container-banner".to_string(), ProviderId::AdSense),
                ("ad-container-article-1".to_string(), ProviderId::Fallback),
            ]
        );
        assert_eq!(page.container_html("unrelated").unwrap(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clicked_container_is_hidden() {
        let page = Arc::new(InMemoryPage::new().with_container("ad-container-banner"));
        let manager = manager(AppConfig::default(), page.clone());
        manager.record_click("home", "ad-container-banner");

        let (report, _handles) = load_page_ads(&manager, "home").await;
        assert!(report.placed.is_empty());
        assert_eq!(report.hidden, vec!["ad-container-banner".to_string()]);
        assert!(page.container("ad-container-banner").unwrap().hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_ads_per_page() {
        let mut config = AppConfig::default();
        config.ads.strategy.max_ads_per_page = 2;
        let page = Arc::new(
            TOOLS_PAGE_AD_CONTAINERS
                .iter()
                .fold(InMemoryPage::new(), |p, (id, _)| p.with_container(*id)),
        );
        let manager = manager(config, page);

        let (report, _handles) = init_tools_page_ads(&manager).await;
        assert_eq!(report.placed.len(), 2);
        assert_eq!(report.unfilled.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_points_overlap_last_write_wins() {
        let page = Arc::new(InMemoryPage::new().with_container("adsense-sidebar-1"));
        let manager = manager(AppConfig::default(), page);

        load_page_ads(&manager, "tools").await;
        init_tools_page_ads(&manager).await;
        let stats = manager.stats();
        assert_eq!(stats.active_ads, 1);
        assert_eq!(stats.placements[0].provider, ProviderId::AdSense);
    }
}
