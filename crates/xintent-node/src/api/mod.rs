//! HTTP and WebSocket API.

pub mod admin;
pub mod agent;
pub mod escrow;
pub mod health;
pub mod intent;
pub mod ws;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use xintent_core::{Address, ErrorCategory, XIntentError};

use crate::state::AppState;

/// Header carrying the verified address of the caller.
pub const CALLER_HEADER: &str = "x-caller-address";

/// Error half of every handler result.
pub type ApiError = (StatusCode, String);

pub type ApiResult<T> = Result<T, ApiError>;

/// Map a protocol error to a response.
pub fn reject(err: XIntentError) -> ApiError {
    let status = match err.category() {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::Authorization => StatusCode::FORBIDDEN,
        ErrorCategory::Phase => StatusCode::CONFLICT,
        ErrorCategory::CrossChain => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::Transient => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Address of the account making the request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Address);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts.headers.get(CALLER_HEADER).ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                format!("missing {} header", CALLER_HEADER),
            )
        })?;
        let text = value
            .to_str()
            .map_err(|_| (StatusCode::BAD_REQUEST, format!("invalid {} header", CALLER_HEADER)))?;
        text.parse().map(Caller).map_err(reject)
    }
}

/// Create the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        // Intents
        .route("/api/v1/intents", post(intent::create_intent).get(intent::list_intents))
        .route("/api/v1/intents/:id", get(intent::get_intent).delete(intent::cancel_intent))
        .route("/api/v1/intents/:id/bidding", post(intent::start_bidding))
        .route(
            "/api/v1/intents/:id/proposals",
            post(intent::submit_proposal).get(intent::list_proposals),
        )
        .route("/api/v1/intents/:id/select", post(intent::select_agent))
        .route("/api/v1/intents/:id/quote", post(intent::quote_dispatch))
        .route("/api/v1/intents/:id/dispatch", post(intent::dispatch))
        .route("/api/v1/intents/:id/confirm", post(intent::confirm_local_execution))
        .route("/api/v1/intents/:id/expire", post(intent::expire_intent))
        .route("/api/v1/confirmations", post(intent::push_confirmation))
        .route("/api/v1/announcements", get(intent::list_announcements))
        // Agents
        .route("/api/v1/agents", post(agent::register_agent))
        .route("/api/v1/registry/sync", post(agent::sync_registration))
        .route("/api/v1/agents/:id", get(agent::get_agent))
        .route("/api/v1/agents/:id/stake", post(agent::increase_stake))
        .route("/api/v1/agents/:id/slash", post(agent::slash_agent))
        .route("/api/v1/agents/:id/chains/:chain_id", get(agent::verify_on_chain))
        // Escrow
        .route("/api/v1/escrows/:id", get(escrow::get_escrow))
        .route("/api/v1/cross-chain-escrows", post(escrow::lock_cross_chain_escrow))
        .route("/api/v1/cross-chain-escrows/:correlation_id", get(escrow::get_cross_chain_escrow))
        .route(
            "/api/v1/cross-chain-escrows/:correlation_id/release",
            post(escrow::release_cross_chain_escrow),
        )
        .route(
            "/api/v1/cross-chain-escrows/:correlation_id/refund",
            post(escrow::refund_cross_chain_escrow),
        )
        .route("/api/v1/balances/:account/:token", get(escrow::balance))
        // Administration
        .route("/api/v1/roles", post(admin::grant_role))
        .route("/api/v1/roles/revoke", post(admin::revoke_role))
        .route("/api/v1/relay/peers", post(admin::set_peer))
        .route("/api/v1/relay/selectors", post(admin::add_chain_selector))
        .route("/api/v1/relay/selectors/:selector", delete(admin::remove_chain_selector))
        .route("/api/v1/registry/chains", post(admin::set_chain_registry))
        .route("/api/v1/proxy/slippage", put(admin::set_slippage))
        .route("/api/v1/proxy/staleness", put(admin::set_staleness))
        .route("/api/v1/prices/:token", get(admin::latest_price))
        // Event stream
        .route("/ws/events", get(ws::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
