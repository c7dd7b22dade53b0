//! Escrow queries.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use xintent_core::{
    Address, Amount, ChainId, CorrelationId, EscrowId, IntentId, Token, XIntentError,
};
use xintent_ledger::{CrossChainEscrow, EscrowRecord, Payout};

use super::{reject, ApiResult, Caller};
use crate::reconciler::CrossChainDeposit;
use crate::state::AppState;

/// Request to lock value for an intent created on another chain.
#[derive(Debug, Deserialize)]
pub struct LockCrossChainRequest {
    pub correlation_id: CorrelationId,
    pub beneficiary: Address,
    #[serde(default)]
    pub token: Token,
    pub amount: Amount,
    pub intent_id: IntentId,
    pub src_chain_id: ChainId,
    /// Value attached to the call; must equal `amount`.
    pub value: Amount,
}

#[derive(Debug, Deserialize)]
pub struct ReleaseCrossChainRequest {
    pub intent_id: IntentId,
    pub src_chain_id: ChainId,
    pub beneficiary: Address,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account: Address,
    pub token: Token,
    pub amount: Amount,
    /// Value of `token` still locked on this chain.
    pub locked_total: Amount,
}

pub async fn get_escrow(
    State(state): State<AppState>,
    Path(id): Path<EscrowId>,
) -> ApiResult<Json<EscrowRecord>> {
    state
        .read(|chain| chain.escrow().get_escrow(id).cloned())
        .await
        .map(Json)
        .ok_or_else(|| reject(XIntentError::not_found("escrow", id)))
}

pub async fn get_cross_chain_escrow(
    State(state): State<AppState>,
    Path(correlation_id): Path<CorrelationId>,
) -> ApiResult<Json<CrossChainEscrow>> {
    state
        .read(|chain| chain.escrow().get_cross_chain_escrow(&correlation_id).cloned())
        .await
        .map(Json)
        .ok_or_else(|| reject(XIntentError::not_found("cross-chain escrow", correlation_id)))
}

pub async fn lock_cross_chain_escrow(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<LockCrossChainRequest>,
) -> ApiResult<(StatusCode, Json<CrossChainEscrow>)> {
    let correlation_id = req.correlation_id;
    let deposit = CrossChainDeposit {
        correlation_id,
        beneficiary: req.beneficiary,
        token: req.token,
        amount: req.amount,
        intent_id: req.intent_id,
        src_chain_id: req.src_chain_id,
    };
    let escrow = state
        .transact(|chain| {
            chain.lock_cross_chain_escrow(caller, deposit, req.value, Utc::now())?;
            chain
                .escrow()
                .get_cross_chain_escrow(&correlation_id)
                .cloned()
                .ok_or_else(|| XIntentError::not_found("cross-chain escrow", correlation_id))
        })
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(escrow)))
}

pub async fn release_cross_chain_escrow(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(correlation_id): Path<CorrelationId>,
    Json(req): Json<ReleaseCrossChainRequest>,
) -> ApiResult<Json<Payout>> {
    state
        .transact(|chain| {
            chain.release_cross_chain_escrow(
                caller,
                correlation_id,
                req.intent_id,
                req.src_chain_id,
                req.beneficiary,
            )
        })
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn refund_cross_chain_escrow(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(correlation_id): Path<CorrelationId>,
) -> ApiResult<Json<Payout>> {
    state
        .transact(|chain| chain.refund_cross_chain_escrow(caller, correlation_id))
        .await
        .map(Json)
        .map_err(reject)
}

/// Amount paid out to an account.
pub async fn balance(
    State(state): State<AppState>,
    Path((account, token)): Path<(Address, Token)>,
) -> Json<BalanceResponse> {
    let (amount, locked_total) = state
        .read(|chain| {
            let escrow = chain.escrow();
            (escrow.balance_of(account, token), escrow.locked_total(token))
        })
        .await;
    Json(BalanceResponse {
        account,
        token,
        amount,
        locked_total,
    })
}
