//! Ad manager: places ads into page containers through the provider chain,
//! bootstraps ad networks, and keeps per-page placement statistics.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use adplace_core::event_bus::{make_event, noop_sink, EventSink};
use adplace_core::types::{
    ConsentPreference, EventType, PlacementRecord, ProviderId, SlotRequest, SlotType,
};
use adplace_core::{AdResult, AppConfig, Clock, SystemClock};
use adplace_store::keys::{clicked_key, AD_STATS_KEY};
use adplace_store::{CappedLog, ConsentStore, DailyCounterStore, KeyValueStore};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adblock::AdBlockDetector;
use crate::consent::ConsentManager;
use crate::creative::{default_chain, AttemptFailure, CreativeSource};
use crate::effective::EffectivePolicy;
use crate::frequency::{FrequencyGate, GateDecision};
use crate::host::{PageHost, ScriptOutcome};
use crate::rate_limit::RateLimiter;

/// All clicks on a page share one rate-limit budget.
const CLICK_LIMIT_KEY: &str = "clicks";

/// Tagged result of a placement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementOutcome {
    Placed { provider: ProviderId },
    NotPlaced(NotPlacedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotPlacedReason {
    MissingContainer,
    ConsentDenied,
    NoProvider,
}

impl PlacementOutcome {
    pub fn is_placed(&self) -> bool {
        matches!(self, PlacementOutcome::Placed { .. })
    }

    pub fn provider(&self) -> Option<ProviderId> {
        match self {
            PlacementOutcome::Placed { provider } => Some(*provider),
            PlacementOutcome::NotPlaced(_) => None,
        }
    }
}

/// Result of one frequency-gated injection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopUnderOutcome {
    Disabled,
    CapReached { shown_today: u32 },
    ScriptFailed,
    /// The display could not be counted, so it was not shown.
    CounterUnavailable,
    /// Script loaded but exposed no entry point; nothing was counted.
    NotExposed,
    Shown { shown_today: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Loaded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Recorded,
    RateLimited,
}

/// Background work started by [`AdManager::init`].
#[derive(Default)]
pub struct InitHandles {
    pub pop_under: Option<JoinHandle<PopUnderOutcome>>,
    pub adblock: Option<JoinHandle<bool>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdStats {
    pub active_ads: usize,
    pub loaded_networks: Vec<ProviderId>,
    pub user_consent: ConsentPreference,
    pub placements: Vec<PlacementRecord>,
}

pub struct AdManager {
    config: Arc<AppConfig>,
    host: Arc<dyn PageHost>,
    store: Arc<dyn KeyValueStore>,
    consent: ConsentStore,
    counters: DailyCounterStore,
    ad_stats: CappedLog,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    chain: Vec<Box<dyn CreativeSource>>,
    active_ads: DashMap<String, PlacementRecord>,
    networks: DashMap<ProviderId, NetworkStatus>,
    adblock: AdBlockDetector,
    click_limiter: RateLimiter,
    initialized: AtomicBool,
}

impl AdManager {
    pub fn new(
        config: Arc<AppConfig>,
        host: Arc<dyn PageHost>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let adblock = AdBlockDetector::new(Duration::from_millis(
            config.timing.adblock_probe_delay_ms,
        ));
        let click_limiter = RateLimiter::new(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_secs),
        );
        let ad_stats = CappedLog::new(store.clone(), AD_STATS_KEY, config.storage.ad_stats_cap);

        Self {
            consent: ConsentStore::new(store.clone()),
            counters: DailyCounterStore::new(store.clone()),
            ad_stats,
            sink: noop_sink(),
            clock: Arc::new(SystemClock),
            chain: default_chain(),
            active_ads: DashMap::new(),
            networks: DashMap::new(),
            adblock,
            click_limiter,
            initialized: AtomicBool::new(false),
            config,
            host,
            store,
        }
    }

    /// Attach the page's behaviour tracking sink.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn host(&self) -> &Arc<dyn PageHost> {
        &self.host
    }

    /// Policy for this instant: static config + stored consent + failed networks.
    pub fn effective_policy(&self) -> EffectivePolicy {
        let unavailable: BTreeSet<ProviderId> = self
            .networks
            .iter()
            .filter(|e| *e.value() == NetworkStatus::Failed)
            .map(|e| *e.key())
            .collect();
        EffectivePolicy::derive(&self.config.ads, self.consent.preference(), unavailable)
    }

    pub fn consent_manager(&self) -> ConsentManager {
        ConsentManager::new(
            self.consent.clone(),
            self.host.clone(),
            self.sink.clone(),
            self.clock.clone(),
        )
    }

    /// Record the visitor's consent choice.
    pub fn save_consent(&self, preference: ConsentPreference) -> AdResult<()> {
        self.consent_manager().save(preference)
    }

    /// Fill `container_id` with the first provider in priority order that can
    /// serve `slot`. Never fatal: every failure degrades to the next provider
    /// or to leaving the container alone.
    pub fn place_ad(&self, container_id: &str, slot: SlotType) -> PlacementOutcome {
        if !self.host.has_container(container_id) {
            warn!(container_id, "Ad container not found");
            return PlacementOutcome::NotPlaced(NotPlacedReason::MissingContainer);
        }

        let policy = self.effective_policy();
        if !policy.ads_allowed {
            metrics::counter!("ads.consent_blocked").increment(1);
            debug!(container_id, "Visitor refused ads, skipping placement");
            return PlacementOutcome::NotPlaced(NotPlacedReason::ConsentDenied);
        }

        let placed = self.chain.iter().find_map(|source| {
            match self.attempt(source.as_ref(), &policy, container_id, slot) {
                Ok(provider) => Some(provider),
                Err(failure) => {
                    debug!(
                        container_id,
                        slot = %slot,
                        provider = %source.provider(),
                        reason = %failure,
                        "Provider skipped"
                    );
                    None
                }
            }
        });

        match placed {
            Some(provider) => {
                self.track_placement(container_id, slot, provider);
                PlacementOutcome::Placed { provider }
            }
            None => {
                metrics::counter!("ads.unfilled").increment(1);
                info!(container_id, slot = %slot, "No provider could fill slot");
                PlacementOutcome::NotPlaced(NotPlacedReason::NoProvider)
            }
        }
    }

    pub fn place(&self, request: &SlotRequest) -> PlacementOutcome {
        self.place_ad(&request.container_id, request.slot_type)
    }

    fn attempt(
        &self,
        source: &dyn CreativeSource,
        policy: &EffectivePolicy,
        container_id: &str,
        slot: SlotType,
    ) -> Result<ProviderId, AttemptFailure> {
        let creative = source.build(policy, slot)?;
        let previous = self.host.container_html(container_id).unwrap_or_default();

        if !self.host.set_container_html(container_id, &creative.markup) {
            return Err(AttemptFailure::Activation("container vanished".to_string()));
        }

        if creative.needs_activation {
            if let Err(e) = self.host.activate(creative.provider, container_id) {
                warn!(container_id, provider = %creative.provider, error = %e, "Provider activation failed");
                metrics::counter!("ads.provider_errors", "provider" => creative.provider.as_str())
                    .increment(1);
                self.host.set_container_html(container_id, &previous);
                return Err(AttemptFailure::Activation(e));
            }
        }

        Ok(creative.provider)
    }

    fn track_placement(&self, container_id: &str, slot: SlotType, provider: ProviderId) {
        let record = PlacementRecord {
            container_id: container_id.to_string(),
            slot_type: slot,
            provider,
            timestamp: self.clock.now_utc(),
        };

        metrics::counter!("ads.placed", "provider" => provider.as_str()).increment(1);
        info!(container_id, slot = %slot, provider = %provider, "Ad placed");

        self.sink.emit(make_event(
            EventType::AdPlaced,
            json!({
                "containerId": container_id,
                "slotType": slot.as_str(),
                "network": provider.as_str(),
                "timestamp": record.timestamp.to_rfc3339(),
            }),
        ));
        self.active_ads.insert(container_id.to_string(), record);
    }

    /// Load ad networks, start ad-block detection and consent capture.
    /// Runs once per page; later calls return empty handles. Must be called
    /// within a Tokio runtime.
    pub fn init(self: &Arc<Self>) -> InitHandles {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return InitHandles::default();
        }

        let pop_under = self.load_networks();

        let manager = Arc::clone(self);
        let adblock = tokio::spawn(async move {
            manager
                .adblock
                .detect(manager.host.as_ref(), manager.sink.as_ref())
                .await
        });

        self.consent_manager().setup();

        InitHandles {
            pop_under,
            adblock: Some(adblock),
        }
    }

    fn load_networks(self: &Arc<Self>) -> Option<JoinHandle<PopUnderOutcome>> {
        let policy = self.effective_policy();

        if policy.is_enabled(ProviderId::AdSense) {
            self.load_network_script(ProviderId::AdSense, &policy);
        }
        if policy.is_enabled(ProviderId::Baidu) {
            // Baidu units ship their own loader inside the creative
            self.networks.insert(ProviderId::Baidu, NetworkStatus::Loaded);
            info!("Baidu union configured");
        }
        if !policy.is_enabled(ProviderId::AdSense) && !policy.is_enabled(ProviderId::Baidu) {
            self.networks.insert(ProviderId::Example, NetworkStatus::Loaded);
            info!("Example ads loaded");
        }

        if policy.is_enabled(ProviderId::PopCash) {
            let manager = Arc::clone(self);
            return Some(tokio::spawn(async move { manager.run_pop_under().await }));
        }
        None
    }

    fn load_network_script(&self, provider: ProviderId, policy: &EffectivePolicy) {
        if self.networks.contains_key(&provider) {
            return;
        }
        let Some(src) = policy
            .check(provider)
            .ok()
            .and_then(|c| c.script_src.clone())
        else {
            self.networks.insert(provider, NetworkStatus::Loaded);
            return;
        };

        match self.host.load_script(&src) {
            ScriptOutcome::Loaded => {
                self.networks.insert(provider, NetworkStatus::Loaded);
                info!(provider = %provider, "Ad network loaded");
            }
            ScriptOutcome::Failed(e) => {
                self.networks.insert(provider, NetworkStatus::Failed);
                metrics::counter!("ads.network_load_failed", "provider" => provider.as_str())
                    .increment(1);
                warn!(provider = %provider, error = %e, "Failed to load ad network");
            }
        }
    }

    /// Frequency-gated pop-under: check today's counter, wait the configured
    /// delay, re-check, inject, and count the display.
    pub async fn run_pop_under(&self) -> PopUnderOutcome {
        let policy = self.effective_policy();
        let Ok(config) = policy.check(ProviderId::PopCash) else {
            return PopUnderOutcome::Disabled;
        };
        let gate = FrequencyGate::new(
            ProviderId::PopCash,
            config.daily_frequency_cap,
            self.counters.clone(),
        );

        if let GateDecision::CapReached { shown_today } = gate.check(self.clock.today()) {
            metrics::counter!("ads.frequency_capped").increment(1);
            info!(shown_today, "Pop-under daily limit reached");
            return PopUnderOutcome::CapReached { shown_today };
        }

        tokio::time::sleep(Duration::from_millis(config.delay_ms)).await;

        // Another page may have shown it while we waited
        let today = self.clock.today();
        if let GateDecision::CapReached { shown_today } = gate.check(today) {
            metrics::counter!("ads.frequency_capped").increment(1);
            info!(shown_today, "Pop-under daily limit reached during delay");
            return PopUnderOutcome::CapReached { shown_today };
        }

        let src = config.script_src.clone().unwrap_or_default();
        if let ScriptOutcome::Failed(e) = self.host.load_script(&src) {
            warn!(error = %e, "Failed to load pop-under script");
            return PopUnderOutcome::ScriptFailed;
        }
        self.networks.insert(ProviderId::PopCash, NetworkStatus::Loaded);

        // Reserve the count before showing
        let previous = gate.check(today).shown_today();
        let shown_today = match gate.record(today) {
            Ok(count) => count,
            Err(e) => {
                metrics::counter!("ads.frequency_store_failed").increment(1);
                warn!(error = %e, "Failed to persist pop-under counter, skipping display");
                return PopUnderOutcome::CounterUnavailable;
            }
        };

        if !self.host.trigger_pop_under(&config.publisher_id) {
            debug!("Pop-under script exposed no entry point");
            if let Err(e) = gate.release(today, previous) {
                warn!(error = %e, "Failed to roll back pop-under counter");
            }
            return PopUnderOutcome::NotExposed;
        }

        self.sink.emit(make_event(
            EventType::PopcashShown,
            json!({
                "count": shown_today,
                "timestamp": self.clock.now_utc().to_rfc3339(),
            }),
        ));
        info!(shown_today, "Pop-under shown");
        PopUnderOutcome::Shown { shown_today }
    }

    /// Has the visitor clicked `container_id` today?
    pub fn clicked_today(&self, container_id: &str) -> bool {
        self.store
            .get(&clicked_key(container_id, self.clock.today()))
            .is_some()
    }

    /// Record an ad click: suppress the container for the rest of the day
    /// and append to the `adStats` log.
    pub fn record_click(&self, page_type: &str, container_id: &str) -> ClickOutcome {
        if !self.click_limiter.check(CLICK_LIMIT_KEY) {
            warn!(container_id, "Ad click rate limit exceeded");
            metrics::counter!("ads.clicks_rate_limited").increment(1);
            return ClickOutcome::RateLimited;
        }

        let now = self.clock.now_utc();
        if let Err(e) = self
            .store
            .set(&clicked_key(container_id, self.clock.today()), "true")
        {
            warn!(container_id, error = %e, "Failed to persist click marker");
        }

        let entry = json!({
            "page": page_type,
            "container": container_id,
            "timestamp": now.to_rfc3339(),
        });
        if let Err(e) = self.ad_stats.append(&entry) {
            warn!(container_id, error = %e, "Failed to append ad statistics");
        }
        self.sink.emit(make_event(EventType::AdClicked, entry));

        self.host.hide_container(container_id);
        info!(container_id, page_type, "Ad click recorded");
        ClickOutcome::Recorded
    }

    pub fn placement(&self, container_id: &str) -> Option<PlacementRecord> {
        self.active_ads.get(container_id).map(|r| r.clone())
    }

    pub fn stats(&self) -> AdStats {
        let mut placements: Vec<PlacementRecord> =
            self.active_ads.iter().map(|e| e.value().clone()).collect();
        placements.sort_by(|a, b| a.container_id.cmp(&b.container_id));

        let mut loaded_networks: Vec<ProviderId> = self
            .networks
            .iter()
            .filter(|e| *e.value() == NetworkStatus::Loaded)
            .map(|e| *e.key())
            .collect();
        loaded_networks.sort();

        AdStats {
            active_ads: placements.len(),
            loaded_networks,
            user_consent: self.consent.preference(),
            placements,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::host::{InMemoryPage, OverlayKind};
    use adplace_core::event_bus::capture_sink;
    use adplace_core::FixedClock;
    use adplace_store::keys::counter_key;
    use adplace_store::LocalStore;
    use chrono::{Local, TimeZone};

    struct Fixture {
        page: Arc<InMemoryPage>,
        store: Arc<LocalStore>,
        sink: Arc<adplace_core::event_bus::CaptureSink>,
        manager: Arc<AdManager>,
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(
            Local.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap(),
        ))
    }

    fn fixture(config: AppConfig, page: InMemoryPage) -> Fixture {
        let page = Arc::new(page);
        let store = Arc::new(LocalStore::new());
        let sink = capture_sink();
        let manager = Arc::new(
            AdManager::new(Arc::new(config), page.clone(), store.clone())
                .with_event_sink(sink.clone())
                .with_clock(clock()),
        );
        Fixture {
            page,
            store,
            sink,
            manager,
        }
    }

    fn config_with(f: impl FnOnce(&mut AppConfig)) -> AppConfig {
        let mut config = AppConfig::default();
        f(&mut config);
        config
    }

    #[test]
    fn test_missing_container_is_negative() {
        let fx = fixture(AppConfig::default(), InMemoryPage::new());
        assert_eq!(
            fx.manager.place_ad("nope", SlotType::Banner),
            PlacementOutcome::NotPlaced(NotPlacedReason::MissingContainer)
        );
        assert_eq!(fx.sink.count(), 0);
    }

    #[test]
    fn test_adsense_wins_when_enabled() {
        let fx = fixture(AppConfig::default(), InMemoryPage::new().with_container("x"));
        let outcome = fx.manager.place_ad("x", SlotType::Banner);
        assert_eq!(outcome.provider(), Some(ProviderId::AdSense));
        assert!(fx.page.container_html("x").unwrap().contains("adsbygoogle"));
        assert_eq!(
            fx.page.activations(),
            vec![(ProviderId::AdSense, "x".to_string())]
        );
        assert_eq!(fx.sink.count_type(EventType::AdPlaced), 1);
        assert_eq!(fx.sink.events()[0].data["network"], "adsense");
    }

    #[test]
    fn test_all_disabled_falls_back() {
        let config = config_with(|c| c.ads = c.ads.clone().all_disabled());
        let fx = fixture(config, InMemoryPage::new().with_container("x"));
        assert_eq!(
            fx.manager.place_ad("x", SlotType::Banner),
            PlacementOutcome::Placed {
                provider: ProviderId::Fallback
            }
        );
        assert_eq!(
            fx.manager.placement("x").unwrap().provider,
            ProviderId::Fallback
        );
    }

    #[test]
    fn test_refused_consent_leaves_container_untouched() {
        let fx = fixture(
            AppConfig::default(),
            InMemoryPage::new().with_container_html("x", "<p>keep</p>"),
        );
        fx.manager.save_consent(ConsentPreference::None).unwrap();
        assert_eq!(
            fx.manager.place_ad("x", SlotType::Banner),
            PlacementOutcome::NotPlaced(NotPlacedReason::ConsentDenied)
        );
        assert_eq!(fx.page.container_html("x").unwrap(), "<p>keep</p>");
        assert_eq!(fx.sink.count_type(EventType::AdPlaced), 0);
    }

    #[test]
    fn test_no_fallback_leaves_container_untouched() {
        let config = config_with(|c| {
            c.ads = c.ads.clone().all_disabled();
            c.ads.strategy.fallback = false;
        });
        let fx = fixture(config, InMemoryPage::new().with_container_html("x", "<p>keep</p>"));
        assert_eq!(
            fx.manager.place_ad("x", SlotType::Footer),
            PlacementOutcome::NotPlaced(NotPlacedReason::NoProvider)
        );
        assert_eq!(fx.page.container_html("x").unwrap(), "<p>keep</p>");
        assert!(fx.manager.placement("x").is_none());
    }

    #[test]
    fn test_activation_failure_restores_and_advances() {
        let config = config_with(|c| c.ads.strategy.fallback = false);
        let fx = fixture(
            config,
            InMemoryPage::new()
                .with_container_html("x", "<p>keep</p>")
                .with_failing_activation(ProviderId::AdSense),
        );
        assert_eq!(
            fx.manager.place_ad("x", SlotType::Banner),
            PlacementOutcome::NotPlaced(NotPlacedReason::NoProvider)
        );
        assert_eq!(fx.page.container_html("x").unwrap(), "<p>keep</p>");
    }

    #[test]
    fn test_baidu_fills_slot_adsense_lacks() {
        let config = config_with(|c| c.ads.baidu.enabled = true);
        let fx = fixture(config, InMemoryPage::new().with_container("x"));
        assert_eq!(
            fx.manager.place_ad("x", SlotType::Article).provider(),
            Some(ProviderId::Baidu)
        );
    }

    #[test]
    fn test_amazon_only_in_sidebar() {
        let config = config_with(|c| {
            c.ads.adsense.enabled = false;
            c.ads.amazon.enabled = true;
        });
        let fx = fixture(
            config,
            InMemoryPage::new().with_container("side").with_container("top"),
        );
        assert_eq!(
            fx.manager.place_ad("side", SlotType::Sidebar).provider(),
            Some(ProviderId::Amazon)
        );
        assert_eq!(
            fx.manager.place_ad("top", SlotType::Banner).provider(),
            Some(ProviderId::Fallback)
        );
    }

    #[test]
    fn test_last_write_wins_per_container() {
        let fx = fixture(AppConfig::default(), InMemoryPage::new().with_container("x"));
        fx.manager.place_ad("x", SlotType::Banner);
        fx.manager.place_ad("x", SlotType::Article);
        let stats = fx.manager.stats();
        assert_eq!(stats.active_ads, 1);
        assert_eq!(stats.placements[0].provider, ProviderId::Fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_network_script_is_skipped() {
        let config = AppConfig::default();
        let src = config.ads.adsense.script_src.clone().unwrap();
        let fx = fixture(
            config,
            InMemoryPage::new().with_container("x").with_failing_script(src),
        );
        let _handles = fx.manager.init();
        assert_eq!(
            fx.manager.place_ad("x", SlotType::Banner).provider(),
            Some(ProviderId::Fallback)
        );
        assert!(!fx.manager.stats().loaded_networks.contains(&ProviderId::AdSense));
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_runs_once() {
        let fx = fixture(AppConfig::default(), InMemoryPage::new().with_ad_blocker());
        let handles = fx.manager.init();
        assert!(fx.page.has_overlay(OverlayKind::ConsentDialog));
        assert!(handles.adblock.unwrap().await.unwrap());
        assert!(fx.page.has_overlay(OverlayKind::AdBlockNotice));

        let again = fx.manager.init();
        assert!(again.adblock.is_none());
        assert!(again.pop_under.is_none());
        assert_eq!(fx.page.loaded_scripts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pop_under_waits_then_counts() {
        let fx = fixture(AppConfig::default(), InMemoryPage::new());
        let handles = fx.manager.init();
        let outcome = handles.pop_under.unwrap().await.unwrap();
        assert_eq!(outcome, PopUnderOutcome::Shown { shown_today: 1 });
        assert_eq!(fx.page.pop_under_count(), 1);
        assert_eq!(
            fx.store.get(&counter_key(ProviderId::PopCash, clock().today())).as_deref(),
            Some("1")
        );
        assert_eq!(fx.sink.count_type(EventType::PopcashShown), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pop_under_cap_reached() {
        let fx = fixture(AppConfig::default(), InMemoryPage::new());
        fx.store
            .set(&counter_key(ProviderId::PopCash, clock().today()), "2")
            .unwrap();
        assert_eq!(
            fx.manager.run_pop_under().await,
            PopUnderOutcome::CapReached { shown_today: 2 }
        );
        assert_eq!(fx.page.pop_under_count(), 0);
        assert_eq!(
            fx.store.get(&counter_key(ProviderId::PopCash, clock().today())).as_deref(),
            Some("2")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pop_under_not_counted_without_entry_point() {
        let fx = fixture(AppConfig::default(), InMemoryPage::new().without_pop_under());
        assert_eq!(fx.manager.run_pop_under().await, PopUnderOutcome::NotExposed);
        // The reserved count is rolled back
        assert_eq!(
            fx.store.get(&counter_key(ProviderId::PopCash, clock().today())).as_deref(),
            Some("0")
        );
        assert_eq!(fx.page.pop_under_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pop_under_skipped_when_counter_cannot_be_stored() {
        let page = Arc::new(InMemoryPage::new());
        let manager = AdManager::new(
            Arc::new(AppConfig::default()),
            page.clone(),
            Arc::new(LocalStore::with_capacity(0)),
        )
        .with_clock(clock());

        for _ in 0..5 {
            assert_eq!(
                manager.run_pop_under().await,
                PopUnderOutcome::CounterUnavailable
            );
        }
        assert_eq!(page.pop_under_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pop_under_respects_refusal() {
        let fx = fixture(AppConfig::default(), InMemoryPage::new());
        fx.manager.save_consent(ConsentPreference::None).unwrap();
        assert_eq!(fx.manager.run_pop_under().await, PopUnderOutcome::Disabled);
    }

    #[test]
    fn test_click_suppresses_container_for_the_day() {
        let fx = fixture(AppConfig::default(), InMemoryPage::new().with_container("x"));
        assert!(!fx.manager.clicked_today("x"));
        assert_eq!(fx.manager.record_click("tools", "x"), ClickOutcome::Recorded);
        assert!(fx.manager.clicked_today("x"));
        assert!(fx.page.container("x").unwrap().hidden);

        let stats: Vec<serde_json::Value> =
            serde_json::from_str(&fx.store.get(AD_STATS_KEY).unwrap()).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0]["container"], "x");
        assert_eq!(stats[0]["page"], "tools");
    }

    #[test]
    fn test_click_rate_limit() {
        let config = config_with(|c| c.rate_limit.max_requests = 2);
        let fx = fixture(config, InMemoryPage::new().with_container("x"));
        assert_eq!(fx.manager.record_click("tools", "x"), ClickOutcome::Recorded);
        assert_eq!(fx.manager.record_click("tools", "x"), ClickOutcome::Recorded);
        assert_eq!(fx.manager.record_click("tools", "x"), ClickOutcome::RateLimited);
        assert_eq!(fx.sink.count_type(EventType::AdClicked), 2);
    }

    #[test]
    fn test_click_rate_limit_is_shared_across_containers() {
        let config = config_with(|c| c.rate_limit.max_requests = 2);
        let page = ["a", "b", "c"]
            .iter()
            .fold(InMemoryPage::new(), |p, id| p.with_container(*id));
        let fx = fixture(config, page);

        let recorded = ["a", "a", "b", "b", "c", "c"]
            .iter()
            .filter(|id| fx.manager.record_click("tools", id) == ClickOutcome::Recorded)
            .count();
        assert_eq!(recorded, 2);
        assert!(!fx.manager.clicked_today("c"));
    }
}
