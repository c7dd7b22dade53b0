//! Auditable events emitted by a chain's ledgers.

use serde::{Deserialize, Serialize};

use crate::envelope::TransportKind;
use crate::intent::DispatchAction;
use crate::types::{
    Address, AgentId, Amount, ChainId, CorrelationId, EscrowId, IntentId, ProposalId, Role, Token,
    H256,
};

/// Event types recorded by the escrow ledger, agent registry, relay and
/// intent manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    IntentCreated {
        intent_id: IntentId,
        creator: Address,
        amount: Amount,
        token: Token,
    },
    BiddingStarted {
        intent_id: IntentId,
    },
    ProposalSubmitted {
        intent_id: IntentId,
        proposal_id: ProposalId,
        agent_id: AgentId,
    },
    AgentSelected {
        intent_id: IntentId,
        proposal_id: ProposalId,
        agent_id: AgentId,
    },
    IntentDispatched {
        intent_id: IntentId,
        correlation_id: CorrelationId,
        action: DispatchAction,
    },
    IntentCompleted {
        intent_id: IntentId,
    },
    IntentCancelled {
        intent_id: IntentId,
    },
    IntentFailed {
        intent_id: IntentId,
        reason: String,
    },
    EscrowCreated {
        escrow_id: EscrowId,
        intent_id: IntentId,
        amount: Amount,
    },
    BeneficiaryAssigned {
        escrow_id: EscrowId,
        beneficiary: Address,
    },
    EscrowReleased {
        escrow_id: EscrowId,
        intent_id: IntentId,
        /// Chain whose confirmation settled the escrow.
        src_chain_id: ChainId,
        beneficiary: Address,
        amount: Amount,
    },
    EscrowRefunded {
        escrow_id: EscrowId,
        intent_id: IntentId,
        src_chain_id: ChainId,
        depositor: Address,
        amount: Amount,
    },
    CrossChainEscrowCreated {
        correlation_id: CorrelationId,
        intent_id: IntentId,
        src_chain_id: ChainId,
        amount: Amount,
    },
    CrossChainEscrowReleased {
        intent_id: IntentId,
        src_chain_id: ChainId,
        correlation_id: CorrelationId,
        beneficiary: Address,
        amount: Amount,
    },
    CrossChainEscrowRefunded {
        correlation_id: CorrelationId,
        intent_id: IntentId,
        amount: Amount,
    },
    /// Settlement tag tying a payout to the intent and confirming chain.
    IntentSettled {
        intent_id: IntentId,
        src_chain_id: ChainId,
        success: bool,
    },
    AgentRegistered {
        agent_id: AgentId,
        owner: Address,
        display_name: String,
        stake: Amount,
        cross_chain_identity: H256,
    },
    StakeIncreased {
        agent_id: AgentId,
        amount: Amount,
        total: Amount,
    },
    AgentSlashed {
        agent_id: AgentId,
        reason: String,
        reputation: u64,
        slash_count: u32,
    },
    CrossChainRegistrationSynced {
        agent_id: AgentId,
        src_chain_id: ChainId,
        cross_chain_identity: H256,
    },
    CrossChainMessageSent {
        intent_id: IntentId,
        correlation_id: CorrelationId,
        destination_chain: ChainId,
        transport: TransportKind,
        fee: Amount,
    },
    CrossChainMessageReceived {
        correlation_id: CorrelationId,
        source_chain: ChainId,
        transport: TransportKind,
    },
    RoleGranted {
        role: Role,
        account: Address,
    },
    RoleRevoked {
        role: Role,
        account: Address,
    },
}

impl LedgerEvent {
    /// Intent this event concerns, if any.
    pub fn intent_id(&self) -> Option<IntentId> {
        use LedgerEvent::*;
        match self {
            IntentCreated { intent_id, .. }
            | BiddingStarted { intent_id }
            | ProposalSubmitted { intent_id, .. }
            | AgentSelected { intent_id, .. }
            | IntentDispatched { intent_id, .. }
            | IntentCompleted { intent_id }
            | IntentCancelled { intent_id }
            | IntentFailed { intent_id, .. }
            | EscrowCreated { intent_id, .. }
            | EscrowReleased { intent_id, .. }
            | EscrowRefunded { intent_id, .. }
            | CrossChainEscrowCreated { intent_id, .. }
            | CrossChainEscrowReleased { intent_id, .. }
            | CrossChainEscrowRefunded { intent_id, .. }
            | IntentSettled { intent_id, .. }
            | CrossChainMessageSent { intent_id, .. } => Some(*intent_id),
            _ => None,
        }
    }

    /// Snake-case event name, as serialized in the `type` tag.
    pub fn name(&self) -> &'static str {
        use LedgerEvent::*;
        match self {
            IntentCreated { .. } => "intent_created",
            BiddingStarted { .. } => "bidding_started",
            ProposalSubmitted { .. } => "proposal_submitted",
            AgentSelected { .. } => "agent_selected",
            IntentDispatched { .. } => "intent_dispatched",
            IntentCompleted { .. } => "intent_completed",
            IntentCancelled { .. } => "intent_cancelled",
            IntentFailed { .. } => "intent_failed",
            EscrowCreated { .. } => "escrow_created",
            BeneficiaryAssigned { .. } => "beneficiary_assigned",
            EscrowReleased { .. } => "escrow_released",
            EscrowRefunded { .. } => "escrow_refunded",
            CrossChainEscrowCreated { .. } => "cross_chain_escrow_created",
            CrossChainEscrowReleased { .. } => "cross_chain_escrow_released",
            CrossChainEscrowRefunded { .. } => "cross_chain_escrow_refunded",
            IntentSettled { .. } => "intent_settled",
            AgentRegistered { .. } => "agent_registered",
            StakeIncreased { .. } => "stake_increased",
            AgentSlashed { .. } => "agent_slashed",
            CrossChainRegistrationSynced { .. } => "cross_chain_registration_synced",
            CrossChainMessageSent { .. } => "cross_chain_message_sent",
            CrossChainMessageReceived { .. } => "cross_chain_message_received",
            RoleGranted { .. } => "role_granted",
            RoleRevoked { .. } => "role_revoked",
        }
    }
}

/// Append-only event buffer owned by a ledger component; drained after
/// each committed transaction.
#[derive(Debug, Default, Clone)]
pub struct Journal {
    events: Vec<LedgerEvent>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LedgerEvent> {
        self.events.iter()
    }
}
