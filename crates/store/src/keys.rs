//! Persisted key names. Call sites build keys here, never by hand.

use adplace_core::clock::day_key;
use adplace_core::types::ProviderId;
use chrono::NaiveDate;

pub const CONSENT_KEY: &str = "ad_consent";
pub const CONSENT_DATE_KEY: &str = "ad_consent_date";
pub const AD_STATS_KEY: &str = "adStats";
pub const USER_BEHAVIORS_KEY: &str = "userBehaviors";

/// Daily display counter for `provider`, e.g. `popcount_2024-1-5`.
pub fn counter_key(provider: ProviderId, date: NaiveDate) -> String {
    format!("{}count_{}", provider.counter_prefix(), day_key(date))
}

/// Marks a container the visitor clicked on `date`.
pub fn clicked_key(container_id: &str, date: NaiveDate) -> String {
    format!("adClicked_{}_{}", day_key(date), container_id)
}
