//! One chain's state: the intent manager over the escrow ledger, agent
//! registry and relay.
//!
//! Every method is one transaction. Each validates everything it needs
//! before mutating, so an `Err` leaves the chain untouched.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use xintent_core::{
    Address, Amount, ChainId, ContentId, CorrelationId, CrossChainRef, DispatchAction, Intent,
    IntentDraft, IntentId, IntentStatus, Journal, LedgerEvent, MessageAction, MessagePayload,
    Proposal, ProposalDraft, ProposalId, ProtocolParams, Result, Role, Route, XIntentError,
};
use xintent_ledger::{AccessControl, AgentRegistry, EscrowLedger};
use xintent_relay::{Fee, Relay, SendOptions, SentMessage};
use xintent_state::PriceGuard;

use crate::proxy::ExecutionProxy;

/// Static identity of a chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: ChainId,
    /// Address the chain's contracts act as (escrow releaser, relay sender).
    pub address: Address,
    pub admin: Address,
    pub endpoint_id: u32,
    pub chain_selector: u64,
    pub params: ProtocolParams,
}

/// An intent announced to this chain by another chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAnnouncement {
    pub source_chain: ChainId,
    pub intent_id: IntentId,
    pub spec: String,
    pub correlation_id: CorrelationId,
    pub received_at: DateTime<Utc>,
}

pub struct ChainState {
    pub(crate) config: ChainConfig,
    pub(crate) access: AccessControl,
    pub(crate) intents: BTreeMap<IntentId, Intent>,
    pub(crate) proposals: BTreeMap<ProposalId, Proposal>,
    pub(crate) intent_proposals: HashMap<IntentId, Vec<ProposalId>>,
    /// Outbound correlation id → originating intent.
    pub(crate) correlations: HashMap<CorrelationId, IntentId>,
    pub(crate) announcements: Vec<RemoteAnnouncement>,
    next_intent_id: IntentId,
    next_proposal_id: ProposalId,
    pub(crate) escrow: EscrowLedger,
    pub(crate) registry: AgentRegistry,
    pub(crate) relay: Relay,
    pub(crate) proxy: ExecutionProxy,
    pub(crate) journal: Journal,
}

impl ChainState {
    pub fn new(config: ChainConfig) -> Self {
        let escrow = EscrowLedger::with_releasers(config.admin, [config.address]);
        let registry = AgentRegistry::new(config.admin, config.chain_id, &config.params);
        let relay = Relay::new(
            config.chain_id,
            config.address,
            config.admin,
            config.endpoint_id,
            config.chain_selector,
        );
        let proxy = ExecutionProxy::new(
            config.admin,
            PriceGuard::new(config.params.default_price_staleness_secs),
            config.params.default_slippage_bps,
            config.params.max_slippage_bps,
        );

        Self {
            access: AccessControl::new(config.admin),
            intents: BTreeMap::new(),
            proposals: BTreeMap::new(),
            intent_proposals: HashMap::new(),
            correlations: HashMap::new(),
            announcements: Vec::new(),
            next_intent_id: 0,
            next_proposal_id: 0,
            escrow,
            registry,
            relay,
            proxy,
            journal: Journal::new(),
            config,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.config.chain_id
    }

    pub fn address(&self) -> Address {
        self.config.address
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.config.params
    }

    pub fn escrow(&self) -> &EscrowLedger {
        &self.escrow
    }

    pub fn escrow_mut(&mut self) -> &mut EscrowLedger {
        &mut self.escrow
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut AgentRegistry {
        &mut self.registry
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    pub fn relay_mut(&mut self) -> &mut Relay {
        &mut self.relay
    }

    pub fn proxy(&self) -> &ExecutionProxy {
        &self.proxy
    }

    pub fn proxy_mut(&mut self) -> &mut ExecutionProxy {
        &mut self.proxy
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn grant_role(&mut self, caller: Address, role: Role, account: Address) -> Result<()> {
        self.access.grant(caller, role, account, &mut self.journal)
    }

    pub fn revoke_role(&mut self, caller: Address, role: Role, account: Address) -> Result<()> {
        self.access.revoke(caller, role, account, &mut self.journal)
    }

    pub fn intent(&self, id: IntentId) -> Result<&Intent> {
        self.intents
            .get(&id)
            .ok_or_else(|| XIntentError::not_found("intent", id))
    }

    pub(crate) fn intent_mut(&mut self, id: IntentId) -> Result<&mut Intent> {
        self.intents
            .get_mut(&id)
            .ok_or_else(|| XIntentError::not_found("intent", id))
    }

    pub fn intents(&self) -> impl Iterator<Item = &Intent> {
        self.intents.values()
    }

    pub fn proposal(&self, id: ProposalId) -> Result<&Proposal> {
        self.proposals
            .get(&id)
            .ok_or_else(|| XIntentError::not_found("proposal", id))
    }

    pub fn proposals_for(&self, intent_id: IntentId) -> Vec<&Proposal> {
        self.intent_proposals
            .get(&intent_id)
            .map(|ids| ids.iter().filter_map(|id| self.proposals.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn announcements(&self) -> &[RemoteAnnouncement] {
        &self.announcements
    }

    /// Intent that dispatched `correlation_id`, if any.
    pub fn intent_for_correlation(&self, correlation_id: &CorrelationId) -> Option<IntentId> {
        self.correlations.get(correlation_id).copied()
    }

    /// Validate the draft in a fixed order, then lock `attached` in a new
    /// escrow.
    pub fn create_intent(
        &mut self,
        caller: Address,
        draft: IntentDraft,
        attached: Amount,
        now: DateTime<Utc>,
    ) -> Result<IntentId> {
        draft.validate(attached, now, &self.config.params)?;
        let deadline = draft
            .deadline
            .ok_or_else(|| XIntentError::Internal("validated draft without deadline".to_string()))?;

        let id = self.next_intent_id;
        let escrow_id = self
            .escrow
            .create_escrow(caller, None, id, draft.token, attached, now)?;
        self.next_intent_id += 1;

        self.intents.insert(
            id,
            Intent {
                id,
                creator: caller,
                spec: draft.spec,
                content_ref: draft.content_ref,
                amount: attached,
                token: draft.token,
                deadline,
                status: IntentStatus::Created,
                selected_proposal_id: None,
                cross_chain_refs: Vec::new(),
                escrow_id,
                created_at: now,
                receipt_ref: None,
            },
        );
        self.journal.record(LedgerEvent::IntentCreated {
            intent_id: id,
            creator: caller,
            amount: attached,
            token: draft.token,
        });
        info!(intent_id = id, creator = %caller, amount = attached, "intent created");
        Ok(id)
    }

    pub fn start_bidding(&mut self, caller: Address, intent_id: IntentId) -> Result<()> {
        let intent = self.intent_mut(intent_id)?;
        intent.ensure_creator(caller)?;
        intent.start_bidding()?;
        self.journal.record(LedgerEvent::BiddingStarted { intent_id });
        info!(intent_id, "bidding started");
        Ok(())
    }

    /// Accept a bid from the owner of a registered agent while the intent is
    /// in Bidding and not past its deadline.
    pub fn submit_proposal(
        &mut self,
        caller: Address,
        draft: ProposalDraft,
        now: DateTime<Utc>,
    ) -> Result<ProposalId> {
        let intent = self.intent(draft.intent_id)?;
        intent.ensure_status(IntentStatus::Bidding)?;
        if intent.is_expired(now) {
            return Err(XIntentError::IntentExpired {
                intent_id: intent.id,
            });
        }
        let agent = self
            .registry
            .get_agent(draft.agent_id)
            .ok_or_else(|| XIntentError::not_found("agent", draft.agent_id))?;
        if agent.owner != caller {
            return Err(XIntentError::unauthorized(caller, "agent owner"));
        }

        let id = self.next_proposal_id;
        self.next_proposal_id += 1;
        let proposal = Proposal {
            id,
            intent_id: draft.intent_id,
            agent_id: draft.agent_id,
            strategy: draft.strategy,
            bid_fee: draft.bid_fee,
            expected_return: draft.expected_return,
            estimated_duration_secs: draft.estimated_duration_secs,
            proof_ref: draft.proof_ref,
            submitted_by: caller,
            submitted_at: now,
        };
        self.intent_proposals
            .entry(proposal.intent_id)
            .or_default()
            .push(id);
        self.journal.record(LedgerEvent::ProposalSubmitted {
            intent_id: proposal.intent_id,
            proposal_id: id,
            agent_id: proposal.agent_id,
        });
        self.proposals.insert(id, proposal);
        Ok(id)
    }

    /// Fix the winning proposal and assign the escrow to its agent's owner.
    pub fn select_agent(
        &mut self,
        caller: Address,
        intent_id: IntentId,
        proposal_id: ProposalId,
    ) -> Result<()> {
        let intent = self.intent(intent_id)?;
        intent.ensure_creator(caller)?;
        intent.ensure_status(IntentStatus::Bidding)?;
        let escrow_id = intent.escrow_id;

        let proposal = self.proposal(proposal_id)?;
        if proposal.intent_id != intent_id {
            return Err(XIntentError::InvalidParameter(format!(
                "proposal {} belongs to intent {}, not {}",
                proposal_id, proposal.intent_id, intent_id
            )));
        }
        let agent_id = proposal.agent_id;
        let beneficiary = self
            .registry
            .get_agent(agent_id)
            .map(|agent| agent.owner)
            .ok_or_else(|| XIntentError::not_found("agent", agent_id))?;

        let address = self.config.address;
        self.escrow
            .assign_beneficiary(address, escrow_id, beneficiary)?;
        self.intent_mut(intent_id)?.select(proposal_id)?;
        self.journal.record(LedgerEvent::AgentSelected {
            intent_id,
            proposal_id,
            agent_id,
        });
        info!(intent_id, proposal_id, agent_id, "agent selected");
        Ok(())
    }

    /// Message the current phase asks to dispatch: an announcement while
    /// bidding, an execution request once an agent is selected.
    fn dispatch_payload(&self, intent: &Intent) -> Result<(DispatchAction, MessagePayload)> {
        match intent.status {
            IntentStatus::Bidding => Ok((
                DispatchAction::Announce,
                MessagePayload::new(
                    intent.id,
                    MessageAction::Announce {
                        spec: intent.spec.clone(),
                    },
                ),
            )),
            IntentStatus::Executing => {
                let proposal_id = intent.selected_proposal_id.ok_or_else(|| {
                    XIntentError::Internal(format!("intent {} executing without selection", intent.id))
                })?;
                let proposal = self.proposal(proposal_id)?;
                Ok((
                    DispatchAction::Execute,
                    MessagePayload::new(
                        intent.id,
                        MessageAction::Execute {
                            token: intent.token,
                            amount: intent.amount,
                            agent_id: proposal.agent_id,
                        },
                    ),
                ))
            }
            status => Err(XIntentError::wrong_phase(
                format!("intent {}", intent.id),
                "bidding or executing",
                status,
            )),
        }
    }

    pub fn quote_dispatch(&self, intent_id: IntentId, route: &Route, options: &SendOptions) -> Result<Fee> {
        let intent = self.intent(intent_id)?;
        let (_, payload) = self.dispatch_payload(intent)?;
        self.relay.quote(route, &payload, options)
    }

    /// Send the intent's current-phase message along `route`. Allowed for
    /// the creator and for executors.
    pub fn dispatch(
        &mut self,
        caller: Address,
        intent_id: IntentId,
        route: &Route,
        options: &SendOptions,
        attached: Amount,
        now: DateTime<Utc>,
    ) -> Result<SentMessage> {
        let intent = self.intent(intent_id)?;
        if caller != intent.creator && !self.access.has_role(Role::Executor, caller) {
            return Err(XIntentError::unauthorized(caller, "intent creator or executor"));
        }
        intent.ensure_not_finalized()?;
        let (action, payload) = self.dispatch_payload(intent)?;

        let sent = self.relay.send(route, &payload, options, attached)?;
        self.correlations.insert(sent.correlation_id, intent_id);
        self.intent_mut(intent_id)?.cross_chain_refs.push(CrossChainRef {
            correlation_id: sent.correlation_id,
            destination_chain: sent.destination_chain,
            transport: sent.transport,
            action,
            dispatched_at: now,
        });
        self.journal.record(LedgerEvent::IntentDispatched {
            intent_id,
            correlation_id: sent.correlation_id,
            action,
        });
        Ok(sent)
    }

    /// Creator-only. Refunds the escrow from any non-terminal state.
    pub fn cancel_intent(&mut self, caller: Address, intent_id: IntentId) -> Result<()> {
        let intent = self.intent(intent_id)?;
        intent.ensure_creator(caller)?;
        intent.ensure_not_finalized()?;
        let escrow_id = intent.escrow_id;

        let address = self.config.address;
        let chain_id = self.chain_id();
        self.escrow.refund_escrow(address, escrow_id, chain_id)?;
        self.intent_mut(intent_id)?.cancel()?;
        self.journal
            .record(LedgerEvent::IntentCancelled { intent_id });
        info!(intent_id, "intent cancelled");
        Ok(())
    }

    /// Attach the settlement receipt written to the content store.
    pub fn record_receipt(&mut self, intent_id: IntentId, receipt: ContentId) -> Result<()> {
        self.intent_mut(intent_id)?.receipt_ref = Some(receipt);
        Ok(())
    }

    /// Events of the last transaction, in component order.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        let mut events = self.journal.drain();
        events.extend(self.registry.drain_events());
        events.extend(self.escrow.drain_events());
        events.extend(self.relay.drain_events());
        events
    }
}
