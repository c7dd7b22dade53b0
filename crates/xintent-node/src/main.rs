//! xintent node binary.
//!
//! Usage:
//!     xintent-node --chain-id 1 --listen 0.0.0.0:3000

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xintent_node::{run_node, NodeConfig};
use xintent_relay::MessageBus;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = NodeConfig::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(chain_id = config.chain_id, "xintent node starting");
    tracing::info!("  Admin: {}", config.admin);
    tracing::info!("  Operator: {}", config.operator);

    // Standalone nodes have no peers on the in-memory bus.
    run_node(config, MessageBus::new()).await
}
