//! Agent registry: identity, stake and reputation bookkeeping.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use xintent_core::identity::cross_chain_identity;
use xintent_core::{
    Address, AgentId, Amount, ChainId, Journal, LedgerEvent, ProtocolParams, Result, XIntentError,
    H256,
};

/// A registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub owner: Address,
    pub display_name: String,
    pub specialization: String,
    /// Locally held stake; zero for agents synced from another chain.
    pub stake: Amount,
    pub reputation: u64,
    pub slash_count: u32,
    pub cross_chain_identity: H256,
    /// Chain the identity was derived on.
    pub source_chain_id: ChainId,
    pub registered_chains: BTreeSet<ChainId>,
    pub registered_at: DateTime<Utc>,
}

/// Agent record as exported by its source chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSyncData {
    pub owner: Address,
    pub display_name: String,
    pub specialization: String,
    pub reputation: u64,
    pub source_chain_id: ChainId,
    pub cross_chain_identity: H256,
}

/// Registry for one chain.
///
/// Owners map to at most one agent. Agents synced from other chains are
/// keyed by their cross-chain identity and only claim the owner slot when
/// it is free.
#[derive(Debug)]
pub struct AgentRegistry {
    admin: Address,
    chain_id: ChainId,
    min_stake: Amount,
    baseline_reputation: u64,
    slash_penalty: u64,
    next_id: AgentId,
    agents: BTreeMap<AgentId, Agent>,
    by_owner: HashMap<Address, AgentId>,
    by_identity: HashMap<H256, AgentId>,
    chain_registries: HashMap<ChainId, Address>,
    journal: Journal,
}

impl AgentRegistry {
    pub fn new(admin: Address, chain_id: ChainId, params: &ProtocolParams) -> Self {
        Self {
            admin,
            chain_id,
            min_stake: params.min_stake,
            baseline_reputation: params.baseline_reputation,
            slash_penalty: params.slash_penalty,
            next_id: 1,
            agents: BTreeMap::new(),
            by_owner: HashMap::new(),
            by_identity: HashMap::new(),
            chain_registries: HashMap::new(),
            journal: Journal::new(),
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn min_stake(&self) -> Amount {
        self.min_stake
    }

    fn ensure_admin(&self, caller: Address) -> Result<()> {
        if caller != self.admin {
            return Err(XIntentError::unauthorized(caller, "registry owner"));
        }
        Ok(())
    }

    pub fn register_agent(
        &mut self,
        caller: Address,
        display_name: &str,
        specialization: &str,
        stake: Amount,
        now: DateTime<Utc>,
    ) -> Result<AgentId> {
        if display_name.trim().is_empty() {
            return Err(XIntentError::EmptyAgentName);
        }
        if stake < self.min_stake {
            return Err(XIntentError::StakeBelowMinimum {
                stake,
                minimum: self.min_stake,
            });
        }
        if let Some(&agent_id) = self.by_owner.get(&caller) {
            return Err(XIntentError::AgentAlreadyRegistered {
                owner: caller,
                agent_id,
            });
        }

        let identity = cross_chain_identity(&caller, display_name, self.chain_id);
        if let Some(&agent_id) = self.by_identity.get(&identity) {
            return Err(XIntentError::AgentAlreadyRegistered {
                owner: caller,
                agent_id,
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        let agent = Agent {
            id,
            owner: caller,
            display_name: display_name.to_string(),
            specialization: specialization.to_string(),
            stake,
            reputation: self.baseline_reputation,
            slash_count: 0,
            cross_chain_identity: identity,
            source_chain_id: self.chain_id,
            registered_chains: BTreeSet::from([self.chain_id]),
            registered_at: now,
        };

        self.journal.record(LedgerEvent::AgentRegistered {
            agent_id: id,
            owner: caller,
            display_name: agent.display_name.clone(),
            stake,
            cross_chain_identity: identity,
        });
        info!(agent_id = id, owner = %caller, identity = %identity, "agent registered");

        self.by_owner.insert(caller, id);
        self.by_identity.insert(identity, id);
        self.agents.insert(id, agent);
        Ok(id)
    }

    pub fn increase_stake(&mut self, caller: Address, agent_id: AgentId, amount: Amount) -> Result<Amount> {
        if amount == 0 {
            return Err(XIntentError::ZeroAmount);
        }
        let agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or_else(|| XIntentError::not_found("agent", agent_id))?;
        if agent.owner != caller {
            return Err(XIntentError::unauthorized(caller, "agent owner"));
        }
        let total = agent
            .stake
            .checked_add(amount)
            .ok_or_else(|| XIntentError::InvalidParameter("stake overflow".to_string()))?;

        agent.stake = total;
        self.journal.record(LedgerEvent::StakeIncreased {
            agent_id,
            amount,
            total,
        });
        Ok(total)
    }

    /// Apply the fixed penalty. Reputation is clamped at zero; the slash
    /// count increments regardless.
    pub fn slash_agent(&mut self, caller: Address, agent_id: AgentId, reason: &str) -> Result<u64> {
        self.ensure_admin(caller)?;
        let agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or_else(|| XIntentError::not_found("agent", agent_id))?;

        agent.reputation = agent.reputation.saturating_sub(self.slash_penalty);
        agent.slash_count = agent.slash_count.saturating_add(1);
        self.journal.record(LedgerEvent::AgentSlashed {
            agent_id,
            reason: reason.to_string(),
            reputation: agent.reputation,
            slash_count: agent.slash_count,
        });
        info!(agent_id, reputation = agent.reputation, reason, "agent slashed");
        Ok(agent.reputation)
    }

    /// Import an agent registered on another chain. Re-syncing the same
    /// identity updates the existing record.
    pub fn sync_cross_chain_registration(
        &mut self,
        caller: Address,
        data: AgentSyncData,
        now: DateTime<Utc>,
    ) -> Result<AgentId> {
        self.ensure_admin(caller)?;
        if data.display_name.trim().is_empty() {
            return Err(XIntentError::EmptyAgentName);
        }
        let derived = cross_chain_identity(&data.owner, &data.display_name, data.source_chain_id);
        if derived != data.cross_chain_identity {
            return Err(XIntentError::IdentityMismatch {
                presented: data.cross_chain_identity,
                derived,
            });
        }

        let chains = [data.source_chain_id, self.chain_id];
        let agent_id = match self.by_identity.get(&data.cross_chain_identity) {
            Some(&id) => {
                let agent = self
                    .agents
                    .get_mut(&id)
                    .ok_or_else(|| XIntentError::Internal(format!("identity index points at missing agent {}", id)))?;
                agent.specialization = data.specialization;
                agent.reputation = data.reputation;
                agent.registered_chains.extend(chains);
                id
            }
            None => {
                let id = self.next_id;
                self.next_id += 1;
                self.agents.insert(
                    id,
                    Agent {
                        id,
                        owner: data.owner,
                        display_name: data.display_name,
                        specialization: data.specialization,
                        stake: 0,
                        reputation: data.reputation,
                        slash_count: 0,
                        cross_chain_identity: data.cross_chain_identity,
                        source_chain_id: data.source_chain_id,
                        registered_chains: BTreeSet::from(chains),
                        registered_at: now,
                    },
                );
                self.by_identity.insert(data.cross_chain_identity, id);
                self.by_owner.entry(data.owner).or_insert(id);
                id
            }
        };

        self.journal.record(LedgerEvent::CrossChainRegistrationSynced {
            agent_id,
            src_chain_id: data.source_chain_id,
            cross_chain_identity: data.cross_chain_identity,
        });
        info!(agent_id, src_chain_id = data.source_chain_id, "cross-chain registration synced");
        Ok(agent_id)
    }

    /// True iff the agent's identity is registered on `chain_id`.
    pub fn verify_agent_on_chain(&self, agent_id: AgentId, chain_id: ChainId) -> bool {
        self.agents
            .get(&agent_id)
            .is_some_and(|agent| agent.registered_chains.contains(&chain_id))
    }

    pub fn set_chain_registry_address(
        &mut self,
        caller: Address,
        chain_id: ChainId,
        registry: Address,
    ) -> Result<()> {
        self.ensure_admin(caller)?;
        self.chain_registries.insert(chain_id, registry);
        Ok(())
    }

    pub fn chain_registry_address(&self, chain_id: ChainId) -> Option<Address> {
        self.chain_registries.get(&chain_id).copied()
    }

    pub fn get_agent(&self, agent_id: AgentId) -> Option<&Agent> {
        self.agents.get(&agent_id)
    }

    pub fn get_agent_by_identity(&self, identity: &H256) -> Option<&Agent> {
        self.by_identity
            .get(identity)
            .and_then(|id| self.agents.get(id))
    }

    pub fn agent_of(&self, owner: Address) -> Option<&Agent> {
        self.by_owner.get(&owner).and_then(|id| self.agents.get(id))
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        self.journal.drain()
    }
}
