//! Creative sources: one per provider in the placement chain. Each source
//! turns (effective policy, slot type) into markup or a reason to move on.

use adplace_core::types::{ProviderId, SlotType};
use thiserror::Error;

use crate::effective::EffectivePolicy;

/// Markup ready to be written into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creative {
    pub provider: ProviderId,
    pub markup: String,
    /// Provider must be activated on the page after the markup lands.
    pub needs_activation: bool,
}

/// Why a provider could not fill a slot. Every variant advances the chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    #[error("provider disabled")]
    Disabled,
    #[error("no creative configured for {0} slots")]
    NoCreative(SlotType),
    #[error("provider does not serve {0} slots")]
    SlotNotSupported(SlotType),
    #[error("provider network failed to load")]
    NetworkUnavailable,
    #[error("activation failed: {0}")]
    Activation(String),
}

pub trait CreativeSource: Send + Sync {
    fn provider(&self) -> ProviderId;

    fn build(&self, policy: &EffectivePolicy, slot: SlotType) -> Result<Creative, AttemptFailure>;
}

/// Fixed priority order: AdSense, Baidu, Amazon (sidebar only), static fallback.
pub fn default_chain() -> Vec<Box<dyn CreativeSource>> {
    vec![
        Box::new(AdSenseSource),
        Box::new(BaiduSource),
        Box::new(AmazonSource),
        Box::new(FallbackSource),
    ]
}

pub struct AdSenseSource;

impl AdSenseSource {
    fn style(slot: SlotType) -> &'static str {
        match slot {
            SlotType::Banner => "display:block;width:728px;height:90px",
            SlotType::Sidebar => "display:block;width:160px;height:600px",
            SlotType::Footer => "display:block;width:970px;height:250px",
            SlotType::Article => "display:block",
        }
    }
}

impl CreativeSource for AdSenseSource {
    fn provider(&self) -> ProviderId {
        ProviderId::AdSense
    }

    fn build(&self, policy: &EffectivePolicy, slot: SlotType) -> Result<Creative, AttemptFailure> {
        let config = policy.check(ProviderId::AdSense)?;
        let slot_id = config
            .creative_id(slot)
            .ok_or(AttemptFailure::NoCreative(slot))?;

        let markup = format!(
            r#"<ins class="adsbygoogle" style="{style}" data-ad-client="{client}" data-ad-slot="{slot_id}" data-ad-format="auto" data-full-width-responsive="true"></ins>"#,
            style = Self::style(slot),
            client = config.publisher_id,
        );

        Ok(Creative {
            provider: ProviderId::AdSense,
            markup,
            needs_activation: true,
        })
    }
}

pub struct BaiduSource;

impl CreativeSource for BaiduSource {
    fn provider(&self) -> ProviderId {
        ProviderId::Baidu
    }

    fn build(&self, policy: &EffectivePolicy, slot: SlotType) -> Result<Creative, AttemptFailure> {
        let config = policy.check(ProviderId::Baidu)?;
        let slot_id = config
            .creative_id(slot)
            .ok_or(AttemptFailure::NoCreative(slot))?;

        let markup = format!(
            r#"<script type="text/javascript">/*{slot} ad*/ var cpro_id = "{slot_id}";</script><script type="text/javascript" src="http://cpro.baidustatic.com/cpro/ui/c.js"></script>"#,
        );

        Ok(Creative {
            provider: ProviderId::Baidu,
            markup,
            needs_activation: false,
        })
    }
}

/// Product recommendations; only ever shown in sidebar slots.
pub struct AmazonSource;

struct Product {
    title: &'static str,
    price: &'static str,
    asin: &'static str,
}

const PRODUCTS: [Product; 2] = [
    Product {
        title: "Programming for Beginners",
        price: "¥89.00",
        asin: "example",
    },
    Product {
        title: "Web Development in Practice",
        price: "¥128.00",
        asin: "example2",
    },
];

impl AmazonSource {
    fn store_domain(region: Option<&str>) -> &'static str {
        match region {
            Some("us") => "www.amazon.com",
            Some("uk") => "www.amazon.co.uk",
            Some("jp") => "www.amazon.co.jp",
            _ => "www.amazon.cn",
        }
    }
}

impl CreativeSource for AmazonSource {
    fn provider(&self) -> ProviderId {
        ProviderId::Amazon
    }

    fn build(&self, policy: &EffectivePolicy, slot: SlotType) -> Result<Creative, AttemptFailure> {
        if slot != SlotType::Sidebar {
            return Err(AttemptFailure::SlotNotSupported(slot));
        }
        let config = policy.check(ProviderId::Amazon)?;
        let tag = config
            .creative_id(slot)
            .ok_or(AttemptFailure::NoCreative(slot))?;
        let domain = Self::store_domain(config.region.as_deref());

        let items: String = PRODUCTS
            .iter()
            .map(|p| {
                format!(
                    r#"<div class="amazon-product"><img src="https://via.placeholder.com/150x200" alt="{title}"><div class="product-info"><h5>{title}</h5><span class="price">{price}</span><a href="https://{domain}/dp/{asin}?tag={tag}" target="_blank" rel="nofollow">View details</a></div></div>"#,
                    title = p.title,
                    price = p.price,
                    asin = p.asin,
                )
            })
            .collect();

        Ok(Creative {
            provider: ProviderId::Amazon,
            markup: format!(
                r#"<div class="amazon-products"><h4>Recommended books</h4>{items}</div>"#
            ),
            needs_activation: false,
        })
    }
}

/// Static creatives shipped with the site. Has markup for every slot type.
pub struct FallbackSource;

impl FallbackSource {
    pub fn markup(slot: SlotType) -> &'static str {
        match slot {
            // Footer slots reuse the banner creative
            SlotType::Banner | SlotType::Footer => {
                r#"<div class="fallback-ad banner"><a href="https://example.com/upgrade" target="_blank" class="ad-content"><div class="ad-text"><h3>Upgrade your toolbox</h3><p>Discover more powerful features</p><span class="cta">Learn more →</span></div></a></div>"#
            }
            SlotType::Sidebar => {
                r#"<div class="fallback-ad sidebar"><a href="https://example.com/premium" target="_blank" class="ad-content"><div class="ad-icon">⭐</div><h4>Premium features</h4><p>Unlock the professional toolset</p><span class="cta">Learn more</span></a></div>"#
            }
            SlotType::Article => {
                r#"<div class="fallback-ad article"><a href="https://example.com/courses" target="_blank" class="ad-content"><div class="ad-image">📖</div><div class="ad-text"><h4>Online courses</h4><p>Master the latest skills</p></div></a></div>"#
            }
        }
    }
}

impl CreativeSource for FallbackSource {
    fn provider(&self) -> ProviderId {
        ProviderId::Fallback
    }

    fn build(&self, policy: &EffectivePolicy, slot: SlotType) -> Result<Creative, AttemptFailure> {
        if !policy.fallback_enabled {
            return Err(AttemptFailure::Disabled);
        }
        Ok(Creative {
            provider: ProviderId::Fallback,
            markup: Self::markup(slot).to_string(),
            needs_activation: false,
        })
    }
}
