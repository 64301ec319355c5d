//! Persistent store adapter.
//!
//! The browser's durable key/value storage is consumed through the
//! [`KeyValueStore`] trait; [`StoreHandle`] layers the typed keys the
//! coordinator core uses on top of it. Read-modify-write sequences on these
//! keys are not transactional; concurrent writers from different page
//! instances can race, which is accepted for best-effort statistics and
//! configuration state.

mod memory;
mod sqlite;

pub use self::memory::MemoryStore;
pub use self::sqlite::SqliteStore;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Keys the core reads and writes. UI-only keys live outside the core.
pub mod keys {
    pub const BLOCKED_DOMAINS: &str = "blocked_domains";
    pub const ENABLED: &str = "enabled";
    pub const BLOCKS_LIFETIME: &str = "blocks_lifetime";
    pub const BLOCKED_CHANNELS: &str = "blocked_channels";
}

/// Durable key/value storage contract: get returns the stored value or None
/// when the key is absent; set replaces it.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Typed view over a [`KeyValueStore`].
#[derive(Clone)]
pub struct StoreHandle {
    backend: Arc<dyn KeyValueStore>,
}

impl StoreHandle {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    async fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.backend.get(key).await? {
            Some(value) => {
                let typed = serde_json::from_value(value)
                    .with_context(|| format!("stored value for '{key}' has unexpected shape"))?;
                Ok(Some(typed))
            }
            None => Ok(None),
        }
    }

    async fn set_typed<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("failed to serialize value for '{key}'"))?;
        self.backend.set(key, value).await
    }

    /// The stored blocklist, or None when nothing has been stored yet.
    /// Callers apply the built-in default list on None.
    pub async fn blocked_domains(&self) -> Result<Option<Vec<String>>> {
        self.get_typed(keys::BLOCKED_DOMAINS).await
    }

    pub async fn set_blocked_domains(&self, domains: &[String]) -> Result<()> {
        self.set_typed(keys::BLOCKED_DOMAINS, &domains).await
    }

    /// Per-hostname enablement map; absence of the key reads as an empty map
    /// (every hostname defaults open).
    pub async fn enabled_map(&self) -> Result<FxHashMap<String, bool>> {
        Ok(self.get_typed(keys::ENABLED).await?.unwrap_or_default())
    }

    pub async fn set_enabled_map(&self, map: &FxHashMap<String, bool>) -> Result<()> {
        self.set_typed(keys::ENABLED, map).await
    }

    pub async fn lifetime_blocks(&self) -> Result<u64> {
        Ok(self.get_typed(keys::BLOCKS_LIFETIME).await?.unwrap_or(0))
    }

    pub async fn set_lifetime_blocks(&self, count: u64) -> Result<()> {
        self.set_typed(keys::BLOCKS_LIFETIME, &count).await
    }

    pub async fn channel_blocks(&self) -> Result<FxHashMap<String, u64>> {
        Ok(self
            .get_typed(keys::BLOCKED_CHANNELS)
            .await?
            .unwrap_or_default())
    }

    pub async fn set_channel_blocks(&self, map: &FxHashMap<String, u64>) -> Result<()> {
        self.set_typed(keys::BLOCKED_CHANNELS, map).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_keys_read_as_defaults() {
        let store = StoreHandle::new(Arc::new(MemoryStore::new()));
        assert_eq!(store.blocked_domains().await.unwrap(), None);
        assert!(store.enabled_map().await.unwrap().is_empty());
        assert_eq!(store.lifetime_blocks().await.unwrap(), 0);
        assert!(store.channel_blocks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_typed_roundtrip() {
        let store = StoreHandle::new(Arc::new(MemoryStore::new()));
        store
            .set_blocked_domains(&["player.twitch.tv".to_string()])
            .await
            .unwrap();
        assert_eq!(
            store.blocked_domains().await.unwrap(),
            Some(vec!["player.twitch.tv".to_string()])
        );

        let mut map = FxHashMap::default();
        map.insert("www.example.com".to_string(), false);
        store.set_enabled_map(&map).await.unwrap();
        assert_eq!(
            store.enabled_map().await.unwrap().get("www.example.com"),
            Some(&false)
        );
    }

    #[tokio::test]
    async fn test_malformed_stored_value_is_an_error() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .set(keys::BLOCKS_LIFETIME, Value::String("not a number".into()))
            .await
            .unwrap();
        let store = StoreHandle::new(backend);
        assert!(store.lifetime_blocks().await.is_err());
    }
}
