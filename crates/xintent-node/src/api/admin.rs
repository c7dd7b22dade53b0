//! Administrative endpoints: roles, relay routes and proxy settings.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use xintent_core::{Address, ChainId, Role, Token};
use xintent_state::PriceReading;

use super::{reject, ApiResult, Caller};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
    pub account: Address,
}

#[derive(Debug, Deserialize)]
pub struct PeerRequest {
    pub eid: u32,
    pub chain_id: ChainId,
    pub peer: Address,
}

#[derive(Debug, Deserialize)]
pub struct SelectorRequest {
    pub selector: u64,
    pub chain_id: ChainId,
    /// Only accept messages from this sender, if set.
    pub sender: Option<Address>,
}

#[derive(Debug, Deserialize)]
pub struct ChainRegistryRequest {
    pub chain_id: ChainId,
    pub registry: Address,
}

#[derive(Debug, Deserialize)]
pub struct SlippageRequest {
    pub bps: u16,
}

#[derive(Debug, Deserialize)]
pub struct StalenessRequest {
    pub token: Token,
    pub seconds: i64,
}

#[derive(Debug, Serialize)]
pub struct ProxySettings {
    pub slippage_bps: u16,
}

pub async fn grant_role(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<RoleRequest>,
) -> ApiResult<StatusCode> {
    state
        .transact(|chain| chain.grant_role(caller, req.role, req.account))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn revoke_role(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<RoleRequest>,
) -> ApiResult<StatusCode> {
    state
        .transact(|chain| chain.revoke_role(caller, req.role, req.account))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_peer(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<PeerRequest>,
) -> ApiResult<StatusCode> {
    state
        .transact(|chain| chain.relay_mut().set_peer(caller, req.eid, req.chain_id, req.peer))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_chain_selector(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<SelectorRequest>,
) -> ApiResult<StatusCode> {
    state
        .transact(|chain| {
            chain
                .relay_mut()
                .add_chain_selector(caller, req.selector, req.chain_id, req.sender)
        })
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_chain_selector(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(selector): Path<u64>,
) -> ApiResult<StatusCode> {
    let removed = state
        .transact(|chain| chain.relay_mut().remove_chain_selector(caller, selector))
        .await
        .map_err(reject)?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("chain selector {} not allowed", selector)))
    }
}

pub async fn set_chain_registry(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<ChainRegistryRequest>,
) -> ApiResult<StatusCode> {
    state
        .transact(|chain| {
            chain
                .registry_mut()
                .set_chain_registry_address(caller, req.chain_id, req.registry)
        })
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_slippage(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<SlippageRequest>,
) -> ApiResult<Json<ProxySettings>> {
    state
        .transact(|chain| {
            let proxy = chain.proxy_mut();
            proxy.set_default_slippage_tolerance(caller, req.bps)?;
            Ok(ProxySettings {
                slippage_bps: proxy.default_slippage_tolerance(),
            })
        })
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn set_staleness(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<StalenessRequest>,
) -> ApiResult<StatusCode> {
    state
        .transact(|chain| {
            chain
                .proxy_mut()
                .set_price_staleness_threshold(caller, req.token, req.seconds)
        })
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Latest price for `token`, refused when older than its threshold.
pub async fn latest_price(
    State(state): State<AppState>,
    Path(token): Path<Token>,
) -> ApiResult<Json<PriceReading>> {
    let reading = state.prices.latest_price(token).await.map_err(reject)?;
    state
        .read(|chain| chain.proxy().check_price(token, reading, Utc::now()))
        .await
        .map(Json)
        .map_err(reject)
}
