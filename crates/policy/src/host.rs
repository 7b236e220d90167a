//! Page seam: everything the ad layer needs from the hosting document.
//!
//! A real deployment binds this to the browser DOM; [`InMemoryPage`] backs
//! tests and the CLI simulation.

use adplace_core::types::ProviderId;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

/// Elements the ad layer appends to the document body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OverlayKind {
    ConsentDialog,
    AdBlockNotice,
    /// Invisible `adsbox` element used to detect ad blockers.
    AdProbe,
}

/// Result of injecting a provider's external script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    Loaded,
    Failed(String),
}

pub trait PageHost: Send + Sync {
    fn has_container(&self, container_id: &str) -> bool;

    /// Current inner markup of a container.
    fn container_html(&self, container_id: &str) -> Option<String>;

    /// Replace a container's content. Returns false when the container is absent.
    fn set_container_html(&self, container_id: &str, html: &str) -> bool;

    fn hide_container(&self, container_id: &str);

    /// Run the provider's on-page activation for freshly injected markup.
    fn activate(&self, provider: ProviderId, container_id: &str) -> Result<(), String>;

    /// Inject an external script and observe its load callback.
    fn load_script(&self, src: &str) -> ScriptOutcome;

    /// Call the pop-under entry point exposed by the pop-under script.
    /// Returns false when the script did not expose it.
    fn trigger_pop_under(&self, website_id: &str) -> bool;

    fn append_overlay(&self, kind: OverlayKind, markup: &str);

    fn remove_overlay(&self, kind: OverlayKind);

    fn has_overlay(&self, kind: OverlayKind) -> bool;

    /// Rendered height in pixels of an appended overlay; zero when hidden or absent.
    fn rendered_height(&self, kind: OverlayKind) -> u32;
}

#[derive(Debug, Clone, Default)]
pub struct ContainerState {
    pub html: String,
    pub hidden: bool,
}

#[derive(Default)]
struct PageState {
    containers: BTreeMap<String, ContainerState>,
    overlays: BTreeMap<OverlayKind, String>,
    failing_scripts: BTreeSet<String>,
    failing_activations: BTreeSet<ProviderId>,
    loaded_scripts: Vec<String>,
    activations: Vec<(ProviderId, String)>,
    pop_unders: Vec<String>,
    ad_blocker: bool,
    pop_under_missing: bool,
}

/// Simulated document for tests and the CLI.
#[derive(Default)]
pub struct InMemoryPage {
    state: Mutex<PageState>,
}

impl InMemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an (empty) container.
    pub fn with_container(self, container_id: impl Into<String>) -> Self {
        self.with_container_html(container_id, "")
    }

    pub fn with_container_html(self, container_id: impl Into<String>, html: impl Into<String>) -> Self {
        self.state.lock().containers.insert(
            container_id.into(),
            ContainerState {
                html: html.into(),
                hidden: false,
            },
        );
        self
    }

    /// Hide `adsbox` elements the way blocker cosmetic filters do.
    pub fn with_ad_blocker(self) -> Self {
        self.state.lock().ad_blocker = true;
        self
    }

    pub fn with_failing_script(self, src: impl Into<String>) -> Self {
        self.state.lock().failing_scripts.insert(src.into());
        self
    }

    pub fn with_failing_activation(self, provider: ProviderId) -> Self {
        self.state.lock().failing_activations.insert(provider);
        self
    }

    /// Pop-under script loads but does not expose its entry point.
    pub fn without_pop_under(self) -> Self {
        self.state.lock().pop_under_missing = true;
        self
    }

    pub fn container(&self, container_id: &str) -> Option<ContainerState> {
        self.state.lock().containers.get(container_id).cloned()
    }

    pub fn container_ids(&self) -> Vec<String> {
        self.state.lock().containers.keys().cloned().collect()
    }

    pub fn overlay(&self, kind: OverlayKind) -> Option<String> {
        self.state.lock().overlays.get(&kind).cloned()
    }

    pub fn loaded_scripts(&self) -> Vec<String> {
        self.state.lock().loaded_scripts.clone()
    }

    pub fn activations(&self) -> Vec<(ProviderId, String)> {
        self.state.lock().activations.clone()
    }

    pub fn pop_under_count(&self) -> usize {
        self.state.lock().pop_unders.len()
    }
}

impl PageHost for InMemoryPage {
    fn has_container(&self, container_id: &str) -> bool {
        self.state.lock().containers.contains_key(container_id)
    }

    fn container_html(&self, container_id: &str) -> Option<String> {
        self.state
            .lock()
            .containers
            .get(container_id)
            .map(|c| c.html.clone())
    }

    fn set_container_html(&self, container_id: &str, html: &str) -> bool {
        match self.state.lock().containers.get_mut(container_id) {
            Some(container) => {
                container.html = html.to_string();
                true
            }
            None => false,
        }
    }

    fn hide_container(&self, container_id: &str) {
        if let Some(container) = self.state.lock().containers.get_mut(container_id) {
            container.hidden = true;
        }
    }

    fn activate(&self, provider: ProviderId, container_id: &str) -> Result<(), String> {
        let mut state = self.state.lock();
        if state.failing_activations.contains(&provider) {
            return Err(format!("{provider} activation rejected"));
        }
        state.activations.push((provider, container_id.to_string()));
        Ok(())
    }

    fn load_script(&self, src: &str) -> ScriptOutcome {
        let mut state = self.state.lock();
        if state.failing_scripts.contains(src) {
            return ScriptOutcome::Failed(format!("failed to load {src}"));
        }
        state.loaded_scripts.push(src.to_string());
        ScriptOutcome::Loaded
    }

    fn trigger_pop_under(&self, website_id: &str) -> bool {
        let mut state = self.state.lock();
        if state.pop_under_missing {
            return false;
        }
        state.pop_unders.push(website_id.to_string());
        true
    }

    fn append_overlay(&self, kind: OverlayKind, markup: &str) {
        self.state.lock().overlays.insert(kind, markup.to_string());
    }

    fn remove_overlay(&self, kind: OverlayKind) {
        self.state.lock().overlays.remove(&kind);
    }

    fn has_overlay(&self, kind: OverlayKind) -> bool {
        self.state.lock().overlays.contains_key(&kind)
    }

    fn rendered_height(&self, kind: OverlayKind) -> u32 {
        let state = self.state.lock();
        if !state.overlays.contains_key(&kind) {
            return 0;
        }
        if kind == OverlayKind::AdProbe && state.ad_blocker {
            0
        } else {
            1
        }
    }
}
