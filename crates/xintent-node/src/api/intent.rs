//! Intent API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xintent_core::{
    Amount, ContentId, CorrelationId, ExecutionOutcome, Intent, IntentDraft, IntentId,
    IntentStatus, Proposal, ProposalDraft, ProposalId, Route, Token,
};
use xintent_relay::{Fee, SendOptions, SentMessage};

use super::{reject, ApiResult, Caller};
use crate::chain::RemoteAnnouncement;
use crate::reconciler::Settlement;
use crate::state::AppState;

/// Request to create an intent.
#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub spec: String,

    /// Pointer to the full spec; derived from `spec` when absent.
    pub content_ref: Option<ContentId>,

    pub deadline: Option<DateTime<Utc>>,

    /// Escrowed token; native when absent.
    #[serde(default)]
    pub token: Token,

    /// Value attached to the call.
    pub value: Amount,
}

#[derive(Debug, Serialize)]
pub struct CreateIntentResponse {
    pub id: IntentId,
    pub status: IntentStatus,
    pub content_ref: ContentId,
}

#[derive(Debug, Deserialize)]
pub struct ProposalRequest {
    pub agent_id: u64,
    pub strategy: String,
    pub bid_fee: Amount,
    pub expected_return: u64,
    pub estimated_duration_secs: u64,
    pub proof_ref: ContentId,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub proposal_id: ProposalId,
}

#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    pub route: Route,
    pub gas_limit: Option<u64>,
    #[serde(default)]
    pub value: Amount,
}

impl DispatchRequest {
    fn options(&self) -> SendOptions {
        match self.gas_limit {
            Some(gas_limit) => SendOptions { gas_limit },
            None => SendOptions::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PushConfirmationRequest {
    pub correlation_id: CorrelationId,
    pub outcome: ExecutionOutcome,
}

/// Create an intent, escrowing the attached value.
pub async fn create_intent(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<CreateIntentRequest>,
) -> ApiResult<(StatusCode, Json<CreateIntentResponse>)> {
    let draft = IntentDraft {
        spec: req.spec,
        content_ref: req.content_ref.unwrap_or_default(),
        deadline: req.deadline,
        token: req.token,
    };
    let id = state
        .create_intent(caller, draft, req.value, Utc::now())
        .await
        .map_err(reject)?;
    let intent = state
        .read(|chain| chain.intent(id).cloned())
        .await
        .map_err(reject)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateIntentResponse {
            id,
            status: intent.status,
            content_ref: intent.content_ref,
        }),
    ))
}

pub async fn list_intents(State(state): State<AppState>) -> Json<Vec<Intent>> {
    Json(state.read(|chain| chain.intents().cloned().collect()).await)
}

pub async fn get_intent(
    State(state): State<AppState>,
    Path(id): Path<IntentId>,
) -> ApiResult<Json<Intent>> {
    state
        .read(|chain| chain.intent(id).cloned())
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn start_bidding(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<IntentId>,
) -> ApiResult<StatusCode> {
    state
        .transact(|chain| chain.start_bidding(caller, id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_proposal(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<IntentId>,
    Json(req): Json<ProposalRequest>,
) -> ApiResult<(StatusCode, Json<Proposal>)> {
    let draft = ProposalDraft {
        intent_id: id,
        agent_id: req.agent_id,
        strategy: req.strategy,
        bid_fee: req.bid_fee,
        expected_return: req.expected_return,
        estimated_duration_secs: req.estimated_duration_secs,
        proof_ref: req.proof_ref,
    };
    let proposal = state
        .transact(|chain| {
            let proposal_id = chain.submit_proposal(caller, draft, Utc::now())?;
            chain.proposal(proposal_id).cloned()
        })
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(proposal)))
}

pub async fn list_proposals(
    State(state): State<AppState>,
    Path(id): Path<IntentId>,
) -> ApiResult<Json<Vec<Proposal>>> {
    state
        .read(|chain| -> xintent_core::Result<Vec<Proposal>> {
            chain.intent(id)?;
            Ok(chain.proposals_for(id).into_iter().cloned().collect())
        })
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn select_agent(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<IntentId>,
    Json(req): Json<SelectRequest>,
) -> ApiResult<Json<Intent>> {
    state
        .transact(|chain| {
            chain.select_agent(caller, id, req.proposal_id)?;
            chain.intent(id).cloned()
        })
        .await
        .map(Json)
        .map_err(reject)
}

/// Fee the dispatch would cost along the requested route.
pub async fn quote_dispatch(
    State(state): State<AppState>,
    Path(id): Path<IntentId>,
    Json(req): Json<DispatchRequest>,
) -> ApiResult<Json<Fee>> {
    let options = req.options();
    state
        .read(|chain| chain.quote_dispatch(id, &req.route, &options))
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn dispatch(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<IntentId>,
    Json(req): Json<DispatchRequest>,
) -> ApiResult<(StatusCode, Json<SentMessage>)> {
    let options = req.options();
    let sent = state
        .transact(|chain| chain.dispatch(caller, id, &req.route, &options, req.value, Utc::now()))
        .await
        .map_err(reject)?;
    state.flush_outbox().await;
    Ok((StatusCode::ACCEPTED, Json(sent)))
}

pub async fn cancel_intent(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<IntentId>,
) -> ApiResult<StatusCode> {
    state
        .transact(|chain| chain.cancel_intent(caller, id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Executor report for an intent executed on this chain.
pub async fn confirm_local_execution(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<IntentId>,
    Json(outcome): Json<ExecutionOutcome>,
) -> ApiResult<Json<Settlement>> {
    state
        .confirm_local_execution(caller, id, outcome, Utc::now())
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn expire_intent(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<IntentId>,
) -> ApiResult<Json<Settlement>> {
    state
        .expire_intent(caller, id, Utc::now())
        .await
        .map(Json)
        .map_err(reject)
}

/// Oracle or executor push of a verified remote result.
pub async fn push_confirmation(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<PushConfirmationRequest>,
) -> ApiResult<Json<Settlement>> {
    state
        .push_confirmation(caller, req.correlation_id, req.outcome, Utc::now())
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn list_announcements(State(state): State<AppState>) -> Json<Vec<RemoteAnnouncement>> {
    Json(state.read(|chain| chain.announcements().to_vec()).await)
}
