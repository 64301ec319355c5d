use crate::storage::StoreHandle;
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Built-in blocklist, used whenever no list has been stored yet.
pub const DEFAULT_DOMAINS: [&str; 3] = ["player.twitch.tv", "embed.twitch.tv", "minnit.org"];

/// Accepted entry shape: optional subdomain labels, a body of at least two
/// characters, and a 2-11 letter final label. Scheme-carrying strings are
/// rejected before the pattern runs.
const DOMAIN_PATTERN: &str = r"^([A-Za-z0-9_-]+\.)*[A-Za-z0-9][A-Za-z0-9_-]+\.[A-Za-z]{2,11}$";

pub fn default_domains() -> Vec<String> {
    DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect()
}

/// Reads the blocklist from the store. An absent key reads as the built-in
/// default list; a read failure reads as no blocklist at all (fail-open).
pub async fn load_blocklist(store: &StoreHandle) -> Vec<String> {
    match store.blocked_domains().await {
        Ok(Some(domains)) => domains,
        Ok(None) => default_domains(),
        Err(e) => {
            warn!("Blocklist read failed, treating as empty: {e:#}");
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InvalidFormat,
    AlreadyListed,
}

/// One rejected input line, reported alongside the entries that were added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedEntry {
    pub entry: String,
    pub reason: RejectReason,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AddOutcome {
    pub added: Vec<String>,
    pub rejected: Vec<RejectedEntry>,
}

/// User-facing blocklist editing: validated adds, removals, and reset to the
/// built-in defaults.
#[derive(Clone)]
pub struct BlocklistManager {
    store: StoreHandle,
    pattern: Regex,
}

impl BlocklistManager {
    pub fn new(store: StoreHandle) -> Self {
        Self {
            store,
            pattern: Regex::new(DOMAIN_PATTERN).unwrap(),
        }
    }

    pub async fn load(&self) -> Vec<String> {
        load_blocklist(&self.store).await
    }

    fn validate(&self, entry: &str) -> bool {
        !entry.contains("://") && self.pattern.is_match(entry)
    }

    /// Adds newline-separated entries. Each line is validated and
    /// duplicate-checked on its own; rejected lines do not abort the rest of
    /// the batch. Duplicate comparison is case-insensitive on the full entry:
    /// base-domain-level dedup would reject the built-in defaults, which
    /// share a base domain.
    pub async fn add(&self, input: &str) -> Result<AddOutcome> {
        let mut domains = self.load().await;
        let mut outcome = AddOutcome::default();

        for line in input.lines() {
            let entry = line.trim();
            if entry.is_empty() {
                continue;
            }
            if !self.validate(entry) {
                outcome.rejected.push(RejectedEntry {
                    entry: entry.to_string(),
                    reason: RejectReason::InvalidFormat,
                });
                continue;
            }
            let duplicate = domains.iter().any(|d| d.eq_ignore_ascii_case(entry));
            if duplicate {
                outcome.rejected.push(RejectedEntry {
                    entry: entry.to_string(),
                    reason: RejectReason::AlreadyListed,
                });
                continue;
            }
            domains.push(entry.to_string());
            outcome.added.push(entry.to_string());
        }

        if !outcome.added.is_empty() {
            self.store.set_blocked_domains(&domains).await?;
            info!(
                "Added {} blocklist entries ({} rejected)",
                outcome.added.len(),
                outcome.rejected.len()
            );
        }
        Ok(outcome)
    }

    /// Removes an exact entry. Returns whether anything was removed.
    pub async fn remove(&self, domain: &str) -> Result<bool> {
        let mut domains = self.load().await;
        let before = domains.len();
        domains.retain(|d| d != domain);
        if domains.len() == before {
            return Ok(false);
        }
        self.store.set_blocked_domains(&domains).await?;
        info!("Removed '{}' from the blocklist", domain);
        Ok(true)
    }

    pub async fn reset(&self) -> Result<()> {
        self.store.set_blocked_domains(&default_domains()).await?;
        info!("Blocklist reset to built-in defaults");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn manager() -> BlocklistManager {
        BlocklistManager::new(StoreHandle::new(Arc::new(MemoryStore::new())))
    }

    #[test]
    fn test_entry_validation() {
        let mgr = manager();
        assert!(mgr.validate("player.twitch.tv"));
        assert!(mgr.validate("sub-domain.example_site.org"));
        assert!(mgr.validate("minnit.org"));
        // No dot, scheme prefix, too-long final label, bare word.
        assert!(!mgr.validate("localhost"));
        assert!(!mgr.validate("https://player.twitch.tv"));
        assert!(!mgr.validate("example.toolongtldxxxx"));
        assert!(!mgr.validate("example.c0m"));
    }

    #[tokio::test]
    async fn test_absent_list_reads_as_defaults() {
        let mgr = manager();
        assert_eq!(mgr.load().await, default_domains());
    }

    #[tokio::test]
    async fn test_add_rejects_per_entry() {
        let mgr = manager();
        let outcome = mgr
            .add("streamable.com\nnot a domain\nPlayer.Twitch.TV\n\nclips.example.net")
            .await
            .unwrap();
        assert_eq!(outcome.added, vec!["streamable.com", "clips.example.net"]);
        assert_eq!(outcome.rejected.len(), 2);
        assert_eq!(outcome.rejected[0].reason, RejectReason::InvalidFormat);
        // Case-insensitive duplicate of a default entry.
        assert_eq!(outcome.rejected[1].reason, RejectReason::AlreadyListed);

        let stored = mgr.load().await;
        assert!(stored.contains(&"streamable.com".to_string()));
        assert!(stored.contains(&"player.twitch.tv".to_string()));
    }

    #[tokio::test]
    async fn test_remove_and_reset() {
        let mgr = manager();
        assert!(mgr.remove("minnit.org").await.unwrap());
        assert!(!mgr.remove("minnit.org").await.unwrap());
        assert!(!mgr.load().await.contains(&"minnit.org".to_string()));

        mgr.reset().await.unwrap();
        assert_eq!(mgr.load().await, default_domains());
    }
}
