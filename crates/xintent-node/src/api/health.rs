//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use xintent_core::ChainId;

use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub chain_id: ChainId,
    pub pending_outbound: usize,
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let pending_outbound = state.read(|chain| chain.relay().pending()).await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        chain_id: state.chain_id,
        pending_outbound,
    })
}
