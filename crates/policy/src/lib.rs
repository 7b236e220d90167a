#![warn(clippy::unwrap_used)]

//! Ad placement policy: decides, per page container, which provider (if
//! any) renders an advertisement, honouring visitor consent, a daily cap on
//! the pop-under provider, and a static fallback creative.
//!
//! # Modules
//!
//! - [`manager`]: placement through the provider chain, network bootstrap, stats
//! - [`creative`]: per-provider creative sources in priority order
//! - [`effective`]: request-scoped policy derived from config and consent
//! - [`frequency`]: daily display cap
//! - [`consent`]: consent dialog and saving the visitor's choice
//! - [`adblock`]: ad-blocker probe and notice
//! - [`pages`]: page entry points over the well-known containers
//! - [`host`]: the page seam and an in-memory page

pub mod adblock;
pub mod consent;
pub mod creative;
pub mod effective;
pub mod frequency;
pub mod host;
pub mod manager;
pub mod pages;
pub mod rate_limit;

pub use effective::EffectivePolicy;
pub use host::{InMemoryPage, PageHost};
pub use manager::{AdManager, PlacementOutcome};
pub use pages::{init_tools_page_ads, load_page_ads};
