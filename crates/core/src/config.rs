use serde::Deserialize;
use std::collections::BTreeMap;

use crate::types::{ProviderId, SlotType};

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `ADPLACE__`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub ads: AdConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Static provider catalogue plus display strategy. Immutable for a session.
#[derive(Debug, Clone, Deserialize)]
pub struct AdConfig {
    #[serde(default = "default_adsense")]
    pub adsense: ProviderConfig,
    #[serde(default = "default_baidu")]
    pub baidu: ProviderConfig,
    #[serde(default = "default_amazon")]
    pub amazon: ProviderConfig,
    #[serde(default = "default_popcash")]
    pub popcash: ProviderConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub enabled: bool,
    /// AdSense client id, Baidu union id, Amazon associate tag or PopCash website id.
    #[serde(default)]
    pub publisher_id: String,
    /// Creative identifier per slot category.
    #[serde(default)]
    pub slots: BTreeMap<SlotType, String>,
    #[serde(default)]
    pub daily_frequency_cap: Option<u32>,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub script_src: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl ProviderConfig {
    pub fn creative_id(&self, slot: SlotType) -> Option<&str> {
        self.slots
            .get(&slot)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_true")]
    pub rotation: bool,
    #[serde(default = "default_true")]
    pub fallback: bool,
    #[serde(default = "default_true")]
    pub respect_user_choice: bool,
    #[serde(default = "default_max_ads_per_page")]
    pub max_ads_per_page: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
    #[serde(default = "default_log_cap")]
    pub ad_stats_cap: usize,
    #[serde(default = "default_log_cap")]
    pub behaviors_cap: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_adblock_probe_delay_ms")]
    pub adblock_probe_delay_ms: u64,
    #[serde(default = "default_load_ads_delay_ms")]
    pub load_ads_delay_ms: u64,
    #[serde(default = "default_tools_page_delay_ms")]
    pub tools_page_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl AdConfig {
    pub fn provider(&self, id: ProviderId) -> Option<&ProviderConfig> {
        match id {
            ProviderId::AdSense => Some(&self.adsense),
            ProviderId::Baidu => Some(&self.baidu),
            ProviderId::Amazon => Some(&self.amazon),
            ProviderId::PopCash => Some(&self.popcash),
            ProviderId::Fallback | ProviderId::Example => None,
        }
    }

    /// Same catalogue with every slot provider switched off.
    pub fn all_disabled(mut self) -> Self {
        self.adsense.enabled = false;
        self.baidu.enabled = false;
        self.amazon.enabled = false;
        self.popcash.enabled = false;
        self
    }
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_max_ads_per_page() -> usize {
    6
}
fn default_store_path() -> String {
    "adplace-store.json".to_string()
}
fn default_log_cap() -> usize {
    100
}
fn default_adblock_probe_delay_ms() -> u64 {
    100
}
fn default_load_ads_delay_ms() -> u64 {
    1000
}
fn default_tools_page_delay_ms() -> u64 {
    2000
}
fn default_max_requests() -> usize {
    60
}
fn default_window_secs() -> u64 {
    60
}

fn slots(entries: &[(SlotType, &str)]) -> BTreeMap<SlotType, String> {
    entries
        .iter()
        .map(|(slot, id)| (*slot, id.to_string()))
        .collect()
}

fn default_adsense() -> ProviderConfig {
    ProviderConfig {
        enabled: true,
        publisher_id: "ca-pub-YOUR_ADSENSE_PUBLISHER_ID".to_string(),
        slots: slots(&[
            (SlotType::Banner, "YOUR_BANNER_SLOT_ID"),
            (SlotType::Sidebar, "YOUR_SIDEBAR_SLOT_ID"),
            (SlotType::Footer, "YOUR_FOOTER_SLOT_ID"),
        ]),
        script_src: Some(
            "https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js".to_string(),
        ),
        ..Default::default()
    }
}

fn default_baidu() -> ProviderConfig {
    ProviderConfig {
        enabled: false,
        publisher_id: "xxxxxxxxxx".to_string(),
        slots: slots(&[
            (SlotType::Banner, "xxxxxxxxxx"),
            (SlotType::Sidebar, "xxxxxxxxxx"),
            (SlotType::Article, "xxxxxxxxxx"),
        ]),
        ..Default::default()
    }
}

fn default_amazon() -> ProviderConfig {
    ProviderConfig {
        enabled: false,
        publisher_id: "your-associate-tag".to_string(),
        slots: slots(&[(SlotType::Sidebar, "your-associate-tag")]),
        region: Some("cn".to_string()),
        ..Default::default()
    }
}

fn default_popcash() -> ProviderConfig {
    ProviderConfig {
        enabled: true,
        publisher_id: "YOUR_POPCASH_WEBSITE_ID".to_string(),
        daily_frequency_cap: Some(2),
        delay_ms: 30_000,
        script_src: Some("//cdn.popcash.net/show.js".to_string()),
        ..Default::default()
    }
}

impl Default for AdConfig {
    fn default() -> Self {
        Self {
            adsense: default_adsense(),
            baidu: default_baidu(),
            amazon: default_amazon(),
            popcash: default_popcash(),
            strategy: StrategyConfig::default(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            rotation: default_true(),
            fallback: default_true(),
            respect_user_choice: default_true(),
            max_ads_per_page: default_max_ads_per_page(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            ad_stats_cap: default_log_cap(),
            behaviors_cap: default_log_cap(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            adblock_probe_delay_ms: default_adblock_probe_delay_ms(),
            load_ads_delay_ms: default_load_ads_delay_ms(),
            tools_page_delay_ms: default_tools_page_delay_ms(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file and environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            tracing::debug!(path, "Loading configuration file");
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("ADPLACE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
