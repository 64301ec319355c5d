use super::KeyValueStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::sync::Mutex;
use tracing::info;

/// SQLite-backed key/value storage. Values are stored as JSON text so the
/// schema never changes when a key's shape does.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open storage database at {path}"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        info!("Storage database initialized at {}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock().unwrap();
        let text: Option<String> = conn
            .prepare_cached("SELECT value FROM kv_store WHERE key = ?1")?
            .query_row(params![key], |row| row.get(0))
            .optional()
            .with_context(|| format!("failed to read key '{key}'"))?;
        match text {
            Some(text) => {
                let value = serde_json::from_str(&text)
                    .with_context(|| format!("stored value for '{key}' is not valid JSON"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.prepare_cached(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )?
        .execute(params![key, value.to_string()])
        .with_context(|| format!("failed to write key '{key}'"))?;
        Ok(())
    }
}
