//! Page filter instance: one per loaded page, owning the scan-and-remove
//! pass, the subtree-observer gate, the periodic blocklist poll, and the
//! page-scoped block counters. Instances share nothing with each other or
//! with the coordinator beyond the persistent store and message passing.

pub mod dom;

pub use dom::{EmbedElement, PageDocument, ScriptedDocument};

use crate::coordinator::CoordinatorHandle;
use crate::engine::{channel_from_src, embed_src_matches, is_blocked, load_blocklist};
use crate::messages::{PageRequest, PageResponse};
use crate::stats::BlockStats;
use crate::storage::StoreHandle;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

pub struct PageFilter {
    document: Arc<dyn PageDocument>,
    store: StoreHandle,
    coordinator: CoordinatorHandle,
    hostname: String,
    blocklist: Vec<String>,
    stats: BlockStats,
    enabled: bool,
    base_domain_ignore: bool,
    require_refresh: bool,
    observer_attached: bool,
}

impl PageFilter {
    /// Runs the initialization sequence for a freshly loaded page: load the
    /// blocklist, resolve enablement (forced off when the page itself sits
    /// on a blocklisted domain), report the result to the coordinator, run
    /// the first scan, and fold the persisted counters into any removals
    /// that happened meanwhile.
    pub async fn attach(
        document: Arc<dyn PageDocument>,
        store: StoreHandle,
        coordinator: CoordinatorHandle,
    ) -> Self {
        let hostname = document.hostname();
        let blocklist = load_blocklist(&store).await;

        let lowered: Vec<String> = blocklist.iter().map(|d| d.to_ascii_lowercase()).collect();
        let (enabled, base_domain_ignore) = if is_blocked(&hostname, &lowered) {
            (false, true)
        } else {
            let enabled_map = store.enabled_map().await.unwrap_or_else(|e| {
                warn!("Enablement read failed, defaulting open: {e:#}");
                Default::default()
            });
            (enabled_map.get(&hostname).copied().unwrap_or(true), false)
        };

        coordinator.state_update(&hostname, enabled);

        let mut filter = Self {
            document,
            store,
            coordinator,
            hostname,
            blocklist,
            stats: BlockStats::new(),
            enabled,
            base_domain_ignore,
            require_refresh: false,
            observer_attached: false,
        };

        if filter.enabled {
            filter.remove_matching_embeds().await;
        }
        filter.reconcile_stats().await;
        filter.observer_attached = filter.enabled;
        filter
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn base_domain_ignore(&self) -> bool {
        self.base_domain_ignore
    }

    pub fn stats(&self) -> &BlockStats {
        &self.stats
    }

    /// Subtree-insertion notification from the document observer. Ignored
    /// while the observer is detached (enforcement off).
    pub async fn on_nodes_added(&mut self) {
        if self.observer_attached {
            self.remove_matching_embeds().await;
        }
    }

    /// Periodic blocklist re-load. The fresh list always replaces the cached
    /// one; a length change forces an extra scan so edits made through the
    /// options surface apply without a page reload.
    pub async fn refresh_blocklist(&mut self) {
        let fresh = load_blocklist(&self.store).await;
        let changed = fresh.len() != self.blocklist.len();
        self.blocklist = fresh;
        if changed {
            debug!("Blocklist length changed, rescanning {}", self.hostname);
            if self.enabled {
                self.remove_matching_embeds().await;
            }
        }
    }

    /// Flips the persisted enablement entry for this hostname. An unset
    /// entry toggles to disabled even though the initial load treats unset
    /// as enabled; that asymmetry is long-standing observed behavior and is
    /// kept as-is.
    pub async fn toggle(&mut self) -> bool {
        let mut enabled_map = self.store.enabled_map().await.unwrap_or_else(|e| {
            warn!("Enablement read failed, toggling from empty: {e:#}");
            Default::default()
        });
        let new_state = match enabled_map.get(&self.hostname) {
            Some(current) => !current,
            None => false,
        };
        enabled_map.insert(self.hostname.clone(), new_state);
        if let Err(e) = self.store.set_enabled_map(&enabled_map).await {
            warn!("Failed to persist enablement for {}: {e:#}", self.hostname);
        }

        self.enabled = new_state;
        if new_state {
            self.remove_matching_embeds().await;
            self.observer_attached = true;
        } else {
            self.observer_attached = false;
        }
        self.coordinator.state_update(&self.hostname, new_state);
        new_state
    }

    /// Control-surface dispatch: one arm per action, every request gets
    /// exactly one response.
    pub async fn handle_request(&mut self, request: PageRequest) -> PageResponse {
        match request {
            PageRequest::GetCurrentState => PageResponse::CurrentState {
                state: self.enabled,
                refresh_required: self.require_refresh,
                base_domain_ignore: self.base_domain_ignore,
                hostname: self.hostname.clone(),
            },
            PageRequest::GetPageBlockCount => PageResponse::PageBlockCount {
                count: self.stats.page_blocks(),
            },
            PageRequest::GetLifetimeBlockCount => {
                // Re-read so increments from other pages show up.
                match self.store.lifetime_blocks().await {
                    Ok(stored) => self.stats.set_lifetime_blocks(stored),
                    Err(e) => warn!("Lifetime counter read failed: {e:#}"),
                }
                PageResponse::LifetimeBlockCount {
                    count: self.stats.lifetime_blocks(),
                }
            }
            PageRequest::GetMostBlockedChannel => {
                match self.store.channel_blocks().await {
                    Ok(stored) => self.stats.set_channel_blocks(stored),
                    Err(e) => warn!("Channel breakdown read failed: {e:#}"),
                }
                let (name, count) = match self.stats.most_blocked() {
                    Some((name, count)) => (Some(name), count),
                    None => (None, 0),
                };
                PageResponse::MostBlockedChannel { name, count }
            }
            PageRequest::ToggleEnforcement { refresh } => {
                if self.base_domain_ignore {
                    // The toggle is inert on a blocklisted page.
                    return PageResponse::Toggled { state: false };
                }
                let state = self.toggle().await;
                self.require_refresh = refresh;
                PageResponse::Toggled { state }
            }
            PageRequest::AckRefresh => {
                self.require_refresh = false;
                PageResponse::RefreshState {
                    refresh_required: false,
                }
            }
        }
    }

    /// Detaches every embed whose source contains a blocked entry. The first
    /// removal of a page load also bumps the durable counters and persists
    /// them once the initial merge has happened.
    async fn remove_matching_embeds(&mut self) {
        for embed in self.document.embeds() {
            let Some(src) = embed.source() else { continue };
            if !embed_src_matches(&src, &self.blocklist) {
                continue;
            }
            embed.detach();
            debug!("Removed embed {} on {}", src, self.hostname);
            let durable_changed = self.stats.record_removal(channel_from_src(&src));
            if durable_changed && self.stats.merged() {
                self.persist_stats().await;
            }
        }
    }

    /// Folds the persisted totals into counters accumulated before the store
    /// read resolved, then writes the merged result back.
    async fn reconcile_stats(&mut self) {
        let lifetime = self.store.lifetime_blocks().await;
        let channels = self.store.channel_blocks().await;
        match (lifetime, channels) {
            (Ok(lifetime), Ok(channels)) => {
                self.stats.merge_persisted(lifetime, channels);
                self.persist_stats().await;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Stats reconciliation read failed, keeping local counts: {e:#}");
                self.stats.mark_merged();
            }
        }
    }

    async fn persist_stats(&mut self) {
        if let Err(e) = self
            .store
            .set_lifetime_blocks(self.stats.lifetime_blocks())
            .await
        {
            warn!("Failed to persist lifetime counter: {e:#}");
        }
        if let Err(e) = self.store.set_channel_blocks(self.stats.channel_blocks()).await {
            warn!("Failed to persist channel breakdown: {e:#}");
        }
    }

    /// Moves the instance onto its own task: control-surface requests and
    /// observer notifications arrive over the returned handle, and the
    /// blocklist poll ticks at `poll_interval`.
    pub fn spawn(mut self, poll_interval: Duration) -> PageHandle {
        let (tx, mut rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut poll = tokio::time::interval(poll_interval);
            // The first tick completes immediately
            poll.tick().await;
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Some(PageEvent::Request { request, reply }) => {
                            let response = self.handle_request(request).await;
                            let _ = reply.send(response);
                        }
                        Some(PageEvent::NodesAdded) => self.on_nodes_added().await,
                        // Page unloaded: all handles dropped.
                        None => break,
                    },
                    // The poll rests while enforcement is off, like the
                    // observer.
                    _ = poll.tick(), if self.enabled => self.refresh_blocklist().await,
                }
            }
        });
        PageHandle { tx }
    }
}

enum PageEvent {
    Request {
        request: PageRequest,
        reply: oneshot::Sender<PageResponse>,
    },
    NodesAdded,
}

/// Channel into a spawned [`PageFilter`]. A failed request means the page is
/// gone; callers treat that as unknown state and keep enforcement on.
#[derive(Clone)]
pub struct PageHandle {
    tx: mpsc::Sender<PageEvent>,
}

impl PageHandle {
    pub async fn request(&self, request: PageRequest) -> Result<PageResponse> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(PageEvent::Request { request, reply })
            .await
            .ok()
            .context("page filter instance is gone")?;
        response.await.context("page filter instance is gone")
    }

    /// Observer notification; dropped silently if the instance is gone.
    pub fn nodes_added(&self) {
        let _ = self.tx.try_send(PageEvent::NodesAdded);
    }
}
