//! Background coordinator: the process-wide arbiter for network-level
//! blocking decisions, independent of any single page's DOM state.

use crate::engine::{base_domain, is_blocked, BlocklistManager, CoordinatorState, TabId};
use crate::storage::StoreHandle;
use tokio::sync::mpsc;
use tracing::{debug, info};
use url::Url;

/// Outcome of a sub-frame request interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDecision {
    Allow,
    Cancel,
}

impl RequestDecision {
    pub fn cancel(self) -> bool {
        matches!(self, RequestDecision::Cancel)
    }
}

/// Fire-and-forget notifications page instances send the coordinator.
#[derive(Debug)]
pub enum CoordinatorEvent {
    StateUpdate { hostname: String, enabled: bool },
    TabNavigated { tab: TabId, hostname: String },
}

#[derive(Clone)]
pub struct Coordinator {
    state: CoordinatorState,
    blocklist: BlocklistManager,
}

impl Coordinator {
    pub fn new(store: StoreHandle) -> Self {
        Self {
            state: CoordinatorState::new(),
            blocklist: BlocklistManager::new(store),
        }
    }

    pub fn state(&self) -> &CoordinatorState {
        &self.state
    }

    /// Records a page's enablement under the hostname it reported.
    /// Idempotent; last write wins.
    pub fn on_state_update(&self, hostname: &str, enabled: bool) {
        debug!("State update: {} enabled={}", hostname, enabled);
        self.state.set_enabled(hostname, enabled);
    }

    pub fn on_tab_navigated(&self, tab: TabId, hostname: &str) {
        self.state.note_tab(tab, hostname);
    }

    /// Decides whether a sub-frame request proceeds. The blocklist is read
    /// from the store on every invocation so edits apply immediately; a read
    /// failure resolves to Allow. Step order is load-bearing: enablement
    /// short-circuits before any blocklist check, and the same-document
    /// exemption is evaluated before the target check.
    pub async fn on_before_subresource_request(
        &self,
        request_url: &Url,
        document_url: &Url,
        tab: TabId,
    ) -> RequestDecision {
        let (Some(target_host), Some(document_host)) =
            (request_url.host_str(), document_url.host_str())
        else {
            return RequestDecision::Allow;
        };
        let base_document = base_domain(document_host);
        let base_target = base_domain(target_host);

        if !self.state.resolve_enabled(base_document, tab) {
            return RequestDecision::Allow;
        }

        // load() already fails open to an empty list on store errors.
        let blocked: Vec<String> = self
            .blocklist
            .load()
            .await
            .iter()
            .map(|d| d.to_ascii_lowercase())
            .collect();

        // Never block requests while the document itself sits on a
        // blocklisted domain.
        if is_blocked(base_document, &blocked) {
            return RequestDecision::Allow;
        }

        if is_blocked(base_target, &blocked) {
            info!(
                "Canceling sub-frame request to {} from {}",
                target_host, document_host
            );
            return RequestDecision::Cancel;
        }

        RequestDecision::Allow
    }

    /// Spawns the event ingress task and returns a handle page instances use
    /// to notify the coordinator.
    pub fn listen(&self) -> CoordinatorHandle {
        let (tx, mut rx) = mpsc::channel(256);
        let coordinator = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    CoordinatorEvent::StateUpdate { hostname, enabled } => {
                        coordinator.on_state_update(&hostname, enabled);
                    }
                    CoordinatorEvent::TabNavigated { tab, hostname } => {
                        coordinator.on_tab_navigated(tab, &hostname);
                    }
                }
            }
        });
        CoordinatorHandle { tx }
    }
}

/// Cheap, clonable notification channel into the coordinator. Sends are
/// fire-and-forget: a full buffer drops the update, and resolution falls
/// back to the enabled default until the next report.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordinatorEvent>,
}

impl CoordinatorHandle {
    pub fn state_update(&self, hostname: &str, enabled: bool) {
        let _ = self.tx.try_send(CoordinatorEvent::StateUpdate {
            hostname: hostname.to_string(),
            enabled,
        });
    }

    pub fn tab_navigated(&self, tab: TabId, hostname: &str) {
        let _ = self.tx.try_send(CoordinatorEvent::TabNavigated {
            tab,
            hostname: hostname.to_string(),
        });
    }
}
