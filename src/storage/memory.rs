use super::KeyValueStore;
use anyhow::Result;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::RwLock;

/// In-memory backend, used by the tests and when running without a data
/// directory. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<FxHashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let values = self.values.read().unwrap();
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut values = self.values.write().unwrap();
        values.insert(key.to_string(), value);
        Ok(())
    }
}
