//! Request-scoped effective policy, derived fresh for every placement from
//! the static catalogue and the visitor's current consent.

use adplace_core::config::{AdConfig, ProviderConfig};
use adplace_core::types::{ConsentPreference, ProviderId};
use std::collections::BTreeSet;

use crate::creative::AttemptFailure;

#[derive(Debug, Clone)]
pub struct EffectivePolicy {
    pub consent: ConsentPreference,
    /// False only when the visitor refused ads and the strategy honours it.
    pub ads_allowed: bool,
    pub fallback_enabled: bool,
    ads: AdConfig,
    unavailable: BTreeSet<ProviderId>,
}

impl EffectivePolicy {
    /// `unavailable` lists networks whose script failed to load on this page.
    pub fn derive(
        config: &AdConfig,
        consent: ConsentPreference,
        unavailable: BTreeSet<ProviderId>,
    ) -> Self {
        let ads_allowed = consent.allows_ads() || !config.strategy.respect_user_choice;
        let ads = if ads_allowed {
            config.clone()
        } else {
            config.clone().all_disabled()
        };

        Self {
            consent,
            ads_allowed,
            fallback_enabled: ads_allowed && config.strategy.fallback,
            ads,
            unavailable,
        }
    }

    /// The provider's configuration if it may be attempted at all.
    pub fn check(&self, provider: ProviderId) -> Result<&ProviderConfig, AttemptFailure> {
        let config = self
            .ads
            .provider(provider)
            .ok_or(AttemptFailure::Disabled)?;
        if !config.enabled {
            return Err(AttemptFailure::Disabled);
        }
        if self.unavailable.contains(&provider) {
            return Err(AttemptFailure::NetworkUnavailable);
        }
        Ok(config)
    }

    pub fn is_enabled(&self, provider: ProviderId) -> bool {
        self.check(provider).is_ok()
    }

    pub fn max_ads_per_page(&self) -> usize {
        self.ads.strategy.max_ads_per_page
    }

    pub fn ads(&self) -> &AdConfig {
        &self.ads
    }
}
