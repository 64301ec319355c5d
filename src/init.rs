//! Initialization helpers for the application startup.

use crate::config::Config;
use crate::storage::{MemoryStore, SqliteStore, StoreHandle};
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::info;

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Opens the configured storage backend.
pub fn init_store(config: &Config) -> Result<StoreHandle> {
    match config.storage.backend.as_str() {
        "sqlite" => {
            let store = SqliteStore::open(&config.storage.sqlite_path)?;
            Ok(StoreHandle::new(Arc::new(store)))
        }
        "memory" => {
            info!("Using in-memory storage; state will not survive a restart");
            Ok(StoreHandle::new(Arc::new(MemoryStore::new())))
        }
        other => bail!("Unknown storage backend '{other}'"),
    }
}
