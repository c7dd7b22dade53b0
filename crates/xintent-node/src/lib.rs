//! # xintent Node
//!
//! One chain's node: the intent manager and settlement reconciler over the
//! escrow ledger, agent registry and relay, plus the background engine and
//! the HTTP/WebSocket API.

pub mod api;
pub mod chain;
pub mod config;
pub mod engine;
pub mod proxy;
pub mod reconciler;
pub mod state;

pub use chain::{ChainConfig, ChainState, RemoteAnnouncement};
pub use config::NodeConfig;
pub use engine::Engine;
pub use proxy::{ExecutionProxy, ExecutionRequest, SwapRecord};
pub use reconciler::{CrossChainDeposit, InboundOutcome, Settlement};
pub use state::AppState;

use tokio::net::TcpListener;
use tracing::info;
use xintent_core::Role;
use xintent_relay::MessageBus;

/// Build the chain from `config`, start its engine on `bus` and serve the
/// API until the server stops.
pub async fn run_node(config: NodeConfig, bus: MessageBus) -> anyhow::Result<()> {
    let chain_config = config.chain_config();
    chain_config.params.validate()?;
    let admin = chain_config.admin;
    let mut chain = ChainState::new(chain_config);
    chain.grant_role(admin, Role::Executor, config.operator)?;
    chain.drain_events();

    let state = AppState::new(chain, config.operator, bus.clone());
    let inbox = bus.register(config.chain_id).await;
    let engine = Engine::new(state.clone(), inbox, config.sweep_interval());
    tokio::spawn(engine.run());

    let app = api::router(state);
    info!(chain_id = config.chain_id, "listening on http://{}", config.listen);
    let listener = TcpListener::bind(config.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
