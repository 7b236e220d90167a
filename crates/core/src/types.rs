use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AdError;

/// Page region category an ad container belongs to.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum SlotType {
    #[default]
    Banner,
    Sidebar,
    Footer,
    Article,
}

impl SlotType {
    pub const ALL: [SlotType; 4] = [
        SlotType::Banner,
        SlotType::Sidebar,
        SlotType::Footer,
        SlotType::Article,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotType::Banner => "banner",
            SlotType::Sidebar => "sidebar",
            SlotType::Footer => "footer",
            SlotType::Article => "article",
        }
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotType {
    type Err = AdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "banner" => Ok(SlotType::Banner),
            "sidebar" => Ok(SlotType::Sidebar),
            "footer" => Ok(SlotType::Footer),
            "article" => Ok(SlotType::Article),
            other => Err(AdError::Parse(format!("unknown slot type '{other}'"))),
        }
    }
}

/// Ad networks and content sources known to the policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    AdSense,
    Baidu,
    Amazon,
    /// Frequency-gated pop-under network; never fills a slot.
    PopCash,
    /// Static creatives shipped with the site.
    Fallback,
    /// Marker network recorded when no real network is enabled.
    Example,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::AdSense => "adsense",
            ProviderId::Baidu => "baidu",
            ProviderId::Amazon => "amazon",
            ProviderId::PopCash => "popcash",
            ProviderId::Fallback => "fallback",
            ProviderId::Example => "example",
        }
    }

    /// Prefix used for this provider's persisted daily counter.
    pub fn counter_prefix(&self) -> &'static str {
        match self {
            ProviderId::PopCash => "pop",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visitor's stored advertising preference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConsentPreference {
    Personalized,
    NonPersonalized,
    None,
    #[default]
    Unset,
}

impl ConsentPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentPreference::Personalized => "personalized",
            ConsentPreference::NonPersonalized => "non_personalized",
            ConsentPreference::None => "none",
            ConsentPreference::Unset => "unset",
        }
    }

    /// Parse a persisted value. Anything unrecognised reads as `Unset`.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("personalized") => ConsentPreference::Personalized,
            Some("non_personalized") => ConsentPreference::NonPersonalized,
            Some("none") => ConsentPreference::None,
            _ => ConsentPreference::Unset,
        }
    }

    pub fn allows_ads(&self) -> bool {
        !matches!(self, ConsentPreference::None)
    }
}

impl fmt::Display for ConsentPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsentPreference {
    type Err = AdError;

    /// Strict parse for explicit user choices; `unset` is not a choice.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match ConsentPreference::from_stored(Some(s)) {
            ConsentPreference::Unset => {
                Err(AdError::Parse(format!("unknown consent preference '{s}'")))
            }
            pref => Ok(pref),
        }
    }
}

/// A single placement attempt for one page container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRequest {
    pub container_id: String,
    pub slot_type: SlotType,
}

impl SlotRequest {
    pub fn new(container_id: impl Into<String>, slot_type: SlotType) -> Self {
        Self {
            container_id: container_id.into(),
            slot_type,
        }
    }
}

/// Outcome of a successful placement, kept for the page lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRecord {
    pub container_id: String,
    pub slot_type: SlotType,
    pub provider: ProviderId,
    pub timestamp: DateTime<Utc>,
}

/// Tracking event emitted to the page's behaviour sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorEvent {
    pub event_id: Uuid,
    pub action: EventType,
    pub data: serde_json::Value,
    pub page: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AdPlaced,
    AdConsent,
    AdblockDetected,
    PopcashShown,
    AdClicked,
}
