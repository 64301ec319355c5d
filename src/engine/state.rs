use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

/// Browser tab identifier. Requests not associated with a tab carry -1.
pub type TabId = i64;

/// Process-wide runtime mirror of per-website enablement, plus the
/// tab-to-hostname fallback map. Created empty at process start and
/// repopulated by state-update messages from page instances; never persisted.
/// Last write wins per hostname.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorState {
    inner: Arc<RwLock<StateInner>>,
}

#[derive(Debug, Default)]
struct StateInner {
    enabled_by_host: FxHashMap<String, bool>,
    host_by_tab: FxHashMap<TabId, String>,
}

impl CoordinatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&self, hostname: &str, enabled: bool) {
        let mut inner = self.inner.write().unwrap();
        inner.enabled_by_host.insert(hostname.to_string(), enabled);
    }

    pub fn enabled_for(&self, hostname: &str) -> Option<bool> {
        let inner = self.inner.read().unwrap();
        inner.enabled_by_host.get(hostname).copied()
    }

    /// Remembers the hostname last seen as the document origin for a tab.
    pub fn note_tab(&self, tab: TabId, hostname: &str) {
        let mut inner = self.inner.write().unwrap();
        inner.host_by_tab.insert(tab, hostname.to_string());
    }

    pub fn tab_hostname(&self, tab: TabId) -> Option<String> {
        let inner = self.inner.read().unwrap();
        inner.host_by_tab.get(&tab).cloned()
    }

    /// Resolves enablement for a request: direct entry for `hostname` first,
    /// then the tab's last-known document hostname, then enabled (fail-open).
    /// Pages register under their full hostname while the request path asks
    /// by base domain, so the direct lookup only hits when the page lives on
    /// its base domain; the tab fallback covers the rest.
    pub fn resolve_enabled(&self, hostname: &str, tab: TabId) -> bool {
        let inner = self.inner.read().unwrap();
        if let Some(&enabled) = inner.enabled_by_host.get(hostname) {
            return enabled;
        }
        if let Some(tab_host) = inner.host_by_tab.get(&tab) {
            if let Some(&enabled) = inner.enabled_by_host.get(tab_host) {
                return enabled;
            }
        }
        true
    }
}
