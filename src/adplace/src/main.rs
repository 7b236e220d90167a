//! adplace: runs the ad placement policy against a simulated page.
//!
//! Consent, daily counters and the tracking logs live in a JSON file so that
//! successive invocations behave like successive page loads in one browser.

use std::str::FromStr;
use std::sync::Arc;

use adplace_core::config::AppConfig;
use adplace_core::types::{ConsentPreference, SlotType};
use adplace_policy::manager::{ClickOutcome, InitHandles};
use adplace_policy::pages::{PAGE_AD_CONTAINERS, TOOLS_PAGE_AD_CONTAINERS};
use adplace_policy::{init_tools_page_ads, load_page_ads, AdManager, InMemoryPage, PlacementOutcome};
use adplace_store::keys::{AD_STATS_KEY, USER_BEHAVIORS_KEY};
use adplace_store::{CappedLog, FileStore, KeyValueStore, StorageSink};
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "adplace")]
#[command(about = "Consent-aware ad placement with provider fallback and daily caps")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(long, short)]
    config: Option<String>,

    /// Storage file (overrides config)
    #[arg(long, env = "ADPLACE__STORAGE__PATH")]
    store: Option<String>,

    /// Simulate a page with an ad blocker installed
    #[arg(long, default_value_t = false)]
    ad_blocker: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Place ads into the given containers, written as `id:slot`
    Place {
        #[arg(required = true, value_parser = parse_container)]
        containers: Vec<(String, SlotType)>,
    },
    /// Run a page entry point against its well-known containers
    Page {
        #[arg(value_enum)]
        kind: PageKind,
        /// Page type recorded with click tracking
        #[arg(long, default_value = "home")]
        page_type: String,
        /// Wait for the pop-under run instead of abandoning it on exit
        #[arg(long, default_value_t = false)]
        wait_pop_under: bool,
    },
    /// Record the visitor's consent choice
    Consent {
        /// personalized, non_personalized or none
        preference: String,
    },
    /// Record a click on an ad container
    Click {
        container: String,
        #[arg(long, default_value = "home")]
        page_type: String,
    },
    /// Print stored consent and tracking state
    Stats,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PageKind {
    Load,
    Tools,
}

#[derive(Serialize)]
struct PlaceReport {
    container: String,
    slot: SlotType,
    outcome: String,
}

fn parse_container(raw: &str) -> Result<(String, SlotType), String> {
    let (id, slot) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected id:slot, got '{raw}'"))?;
    let slot = SlotType::from_str(slot).map_err(|e| e.to_string())?;
    Ok((id.to_string(), slot))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adplace=info,adplace_policy=info,adplace_store=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(path) = cli.store {
        config.storage.path = path;
    }

    info!(
        store = %config.storage.path,
        adsense = config.ads.adsense.enabled,
        baidu = config.ads.baidu.enabled,
        amazon = config.ads.amazon.enabled,
        popcash = config.ads.popcash.enabled,
        "Configuration loaded"
    );

    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(&config.storage.path)
            .with_context(|| format!("opening store {}", config.storage.path))?,
    );
    let behaviors = CappedLog::new(
        store.clone(),
        USER_BEHAVIORS_KEY,
        config.storage.behaviors_cap,
    );
    let config = Arc::new(config);

    match cli.command {
        Command::Place { containers } => {
            let page = containers
                .iter()
                .fold(page_base(cli.ad_blocker), |page, (id, _)| page.with_container(id.clone()));
            let manager = manager(config, Arc::new(page), store, behaviors, "cli");

            let reports: Vec<PlaceReport> = containers
                .into_iter()
                .map(|(container, slot)| {
                    let outcome = match manager.place_ad(&container, slot) {
                        PlacementOutcome::Placed { provider } => {
                            provider.to_string()
                        }
                        PlacementOutcome::NotPlaced(reason) => {
                            format!("not placed: {reason:?}")
                        }
                    };
                    PlaceReport {
                        container,
                        slot,
                        outcome,
                    }
                })
                .collect();
            print_json(&reports)?;
        }
        Command::Page {
            kind,
            page_type,
            wait_pop_under,
        } => {
            let containers: &[(&str, SlotType)] = match kind {
                PageKind::Load => &PAGE_AD_CONTAINERS[..],
                PageKind::Tools => &TOOLS_PAGE_AD_CONTAINERS[..],
            };
            let page = containers
                .iter()
                .fold(page_base(cli.ad_blocker), |page, (id, _)| page.with_container(*id));
            let manager = manager(config, Arc::new(page), store, behaviors, &page_type);

            let (report, handles) = match kind {
                PageKind::Load => load_page_ads(&manager, &page_type).await,
                PageKind::Tools => init_tools_page_ads(&manager).await,
            };
            finish_background(handles, wait_pop_under).await;
            print_json(&report)?;
        }
        Command::Consent { preference } => {
            let preference = ConsentPreference::from_str(&preference)?;
            let manager = manager(
                config,
                Arc::new(page_base(cli.ad_blocker)),
                store,
                behaviors,
                "cli",
            );
            manager.save_consent(preference)?;
            info!(preference = %preference.as_str(), "Consent saved");
        }
        Command::Click {
            container,
            page_type,
        } => {
            let page = page_base(cli.ad_blocker).with_container(container.clone());
            let manager = manager(config, Arc::new(page), store, behaviors, &page_type);
            match manager.record_click(&page_type, &container) {
                ClickOutcome::Recorded => info!(container = %container, "Click recorded"),
                ClickOutcome::RateLimited => warn!(container = %container, "Click rate limited"),
            }
        }
        Command::Stats => {
            let manager = manager(
                config.clone(),
                Arc::new(page_base(cli.ad_blocker)),
                store.clone(),
                behaviors.clone(),
                "cli",
            );
            let ad_stats = CappedLog::new(store, AD_STATS_KEY, config.storage.ad_stats_cap);
            print_json(&serde_json::json!({
                "manager": manager.stats(),
                "adStats": ad_stats.entries(),
                "userBehaviors": behaviors.entries(),
            }))?;
        }
    }

    Ok(())
}

fn page_base(ad_blocker: bool) -> InMemoryPage {
    if ad_blocker {
        InMemoryPage::new().with_ad_blocker()
    } else {
        InMemoryPage::new()
    }
}

fn manager(
    config: Arc<AppConfig>,
    page: Arc<InMemoryPage>,
    store: Arc<dyn KeyValueStore>,
    behaviors: CappedLog,
    page_type: &str,
) -> Arc<AdManager> {
    let sink = StorageSink::new(behaviors).with_page(page_type);
    Arc::new(AdManager::new(config, page, store).with_event_sink(Arc::new(sink)))
}

async fn finish_background(handles: InitHandles, wait_pop_under: bool) {
    if let Some(adblock) = handles.adblock {
        match adblock.await {
            Ok(blocked) => info!(blocked, "Ad-block probe finished"),
            Err(e) => warn!(error = %e, "Ad-block probe task failed"),
        }
    }
    if let Some(pop_under) = handles.pop_under {
        if wait_pop_under {
            match pop_under.await {
                Ok(outcome) => info!(outcome = ?outcome, "Pop-under run finished"),
                Err(e) => warn!(error = %e, "Pop-under task failed"),
            }
        } else {
            pop_under.abort();
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
