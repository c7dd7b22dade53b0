//! Agent registry endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use xintent_core::{AgentId, Amount, ChainId, XIntentError};
use xintent_ledger::{Agent, AgentSyncData};

use super::{reject, ApiResult, Caller};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterAgentRequest {
    pub display_name: String,
    pub specialization: String,
    /// Stake attached to the registration.
    pub stake: Amount,
}

#[derive(Debug, Deserialize)]
pub struct StakeRequest {
    pub amount: Amount,
}

#[derive(Debug, Deserialize)]
pub struct SlashRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ChainVerification {
    pub agent_id: AgentId,
    pub chain_id: ChainId,
    pub registered: bool,
}

fn agent(state: &crate::chain::ChainState, id: AgentId) -> xintent_core::Result<Agent> {
    state
        .registry()
        .get_agent(id)
        .cloned()
        .ok_or_else(|| XIntentError::not_found("agent", id))
}

pub async fn register_agent(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<RegisterAgentRequest>,
) -> ApiResult<(StatusCode, Json<Agent>)> {
    let registered = state
        .transact(|chain| {
            let id = chain.registry_mut().register_agent(
                caller,
                &req.display_name,
                &req.specialization,
                req.stake,
                Utc::now(),
            )?;
            agent(chain, id)
        })
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(registered)))
}

pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
) -> ApiResult<Json<Agent>> {
    state
        .read(|chain| agent(chain, id))
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn increase_stake(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<AgentId>,
    Json(req): Json<StakeRequest>,
) -> ApiResult<Json<Agent>> {
    state
        .transact(|chain| {
            chain.registry_mut().increase_stake(caller, id, req.amount)?;
            agent(chain, id)
        })
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn slash_agent(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<AgentId>,
    Json(req): Json<SlashRequest>,
) -> ApiResult<Json<Agent>> {
    state
        .transact(|chain| {
            chain.registry_mut().slash_agent(caller, id, &req.reason)?;
            agent(chain, id)
        })
        .await
        .map(Json)
        .map_err(reject)
}

/// Import an agent exported by another chain's registry.
pub async fn sync_registration(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(data): Json<AgentSyncData>,
) -> ApiResult<Json<Agent>> {
    state
        .transact(|chain| {
            let id = chain
                .registry_mut()
                .sync_cross_chain_registration(caller, data, Utc::now())?;
            agent(chain, id)
        })
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn verify_on_chain(
    State(state): State<AppState>,
    Path((agent_id, chain_id)): Path<(AgentId, ChainId)>,
) -> Json<ChainVerification> {
    let registered = state
        .read(|chain| chain.registry().verify_agent_on_chain(agent_id, chain_id))
        .await;
    Json(ChainVerification {
        agent_id,
        chain_id,
        registered,
    })
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use xintent_core::identity::cross_chain_identity;
    use xintent_core::{Address, UNIT};

    use crate::api::tests::{app, call};
    use crate::chain::tests::{ADMIN, AGENT_OWNER};

    #[tokio::test]
    async fn test_register_stake_and_slash() {
        let (_, router) = app();
        let register = json!({
            "display_name": "agent.eth",
            "specialization": "arbitrage",
            "stake": UNIT as u64,
        });

        let (status, agent) = call(&router, "POST", "/api/v1/agents", Some(AGENT_OWNER), Some(register.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(agent["id"], 1);
        assert_eq!(agent["reputation"], 1000);

        let (status, _) = call(&router, "POST", "/api/v1/agents", Some(AGENT_OWNER), Some(register)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, agent) = call(
            &router,
            "POST",
            "/api/v1/agents/1/stake",
            Some(AGENT_OWNER),
            Some(json!({ "amount": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(agent["stake"], UNIT as u64 + 5);

        let slash = json!({ "reason": "missed execution" });
        let (status, _) = call(&router, "POST", "/api/v1/agents/1/slash", Some(AGENT_OWNER), Some(slash.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (_, agent) = call(&router, "POST", "/api/v1/agents/1/slash", Some(ADMIN), Some(slash)).await;
        assert_eq!(agent["reputation"], 900);
        assert_eq!(agent["slash_count"], 1);

        let (status, _) = call(&router, "GET", "/api/v1/agents/7", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sync_and_verify_chain() {
        let (_, router) = app();
        let owner = Address::repeat_byte(0x42);
        let identity = cross_chain_identity(&owner, "remote.eth", 8453);
        let data = json!({
            "owner": owner,
            "display_name": "remote.eth",
            "specialization": "bridging",
            "reputation": 1200,
            "source_chain_id": 8453,
            "cross_chain_identity": identity,
        });

        let (status, _) = call(&router, "POST", "/api/v1/registry/sync", Some(owner), Some(data.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, agent) = call(&router, "POST", "/api/v1/registry/sync", Some(ADMIN), Some(data.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(agent["stake"], 0);
        let id = agent["id"].as_u64().unwrap();

        let (_, verified) = call(&router, "GET", &format!("/api/v1/agents/{}/chains/8453", id), None, None).await;
        assert_eq!(verified["registered"], true);
        let (_, verified) = call(&router, "GET", &format!("/api/v1/agents/{}/chains/10", id), None, None).await;
        assert_eq!(verified["registered"], false);

        let mut forged = data;
        forged["source_chain_id"] = json!(10);
        let (status, _) = call(&router, "POST", "/api/v1/registry/sync", Some(ADMIN), Some(forged)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
