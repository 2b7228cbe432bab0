//! Gambit Session Coordinator
//!
//! Binary entry point: initializes logging, reads configuration from the
//! environment, and runs the WebSocket coordinator. The stand-in rules
//! engine accepts every move; deployments embedding this crate inject a
//! real one through [`gambit::RulesEngine`].

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use gambit::{CoordinatorServer, PassthroughRules, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = ServerConfig::from_env();
    info!("Gambit Coordinator v{}", VERSION);
    info!("Bind address: {}", config.bind_addr);
    info!("Connection limit: {}", config.max_connections);

    let server = CoordinatorServer::new(config, Arc::new(PassthroughRules));
    server.run().await.context("Coordinator server failed")?;

    Ok(())
}
