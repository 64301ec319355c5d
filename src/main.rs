use anyhow::Result;
use tokio::signal;
use tracing::info;

use embedguard::config::Config;
use embedguard::coordinator::Coordinator;
use embedguard::engine::BlocklistManager;
use embedguard::host;
use embedguard::init::{init_store, setup_logging};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let config_path = std::env::args().nth(1).unwrap_or("config.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    // 2. Setup Logging
    setup_logging(&config);
    info!("Starting embedguard...");

    if !std::path::Path::new(&config_path).exists() {
        info!("Config file not found, using defaults.");
    }

    // 3. Init Storage
    let store = init_store(&config)?;

    // 4. Blocklist Manager & Coordinator
    let blocklist = BlocklistManager::new(store.clone());
    let coordinator = Coordinator::new(store);

    // 5. Serve the native-messaging port on stdio
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    info!("Serving native-messaging frames on stdio");

    tokio::select! {
        result = host::serve(coordinator, blocklist, stdin, stdout) => {
            result?;
            info!("Messaging peer closed the port.");
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    Ok(())
}
