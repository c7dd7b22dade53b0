//! Error types for the protocol.

use thiserror::Error;

use crate::types::{Address, Amount, ChainId, CorrelationId, IntentId, IntentStatus, H256};

/// Broad class of an error, used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or out-of-range input.
    Validation,
    /// Caller lacks the required capability.
    Authorization,
    /// Operation invalid for the current lifecycle phase.
    Phase,
    /// Inconsistent cross-chain data (source chain, peer, correlation).
    CrossChain,
    /// An external collaborator is unavailable.
    Transient,
    /// Referenced record does not exist.
    NotFound,
    /// Invariant broken inside the node.
    Internal,
}

/// Main error type for protocol operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XIntentError {
    #[error("Intent spec cannot be empty")]
    EmptyIntentSpec,

    #[error("Invalid deadline {deadline}: must be at or after {earliest}")]
    InvalidDeadline { deadline: i64, earliest: i64 },

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Agent display name cannot be empty")]
    EmptyAgentName,

    #[error("Stake {stake} is below the minimum of {minimum}")]
    StakeBelowMinimum { stake: Amount, minimum: Amount },

    #[error("Attached value {attached} does not match declared amount {declared}")]
    AmountMismatch { declared: Amount, attached: Amount },

    #[error("Owner {owner} already has agent {agent_id}")]
    AgentAlreadyRegistered { owner: Address, agent_id: u64 },

    #[error("Cross-chain identity {presented} does not match derived identity {derived}")]
    IdentityMismatch { presented: H256, derived: H256 },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Caller {caller} is not authorized: requires {required}")]
    Unauthorized { caller: Address, required: String },

    #[error("Wrong phase for {resource}: expected {expected}, found {actual}")]
    WrongPhase {
        resource: String,
        expected: String,
        actual: String,
    },

    #[error("Intent {intent_id} is already finalized ({status})")]
    AlreadyFinalized {
        intent_id: IntentId,
        status: IntentStatus,
    },

    #[error("Intent {intent_id} passed its deadline")]
    IntentExpired { intent_id: IntentId },

    #[error("Intent {intent_id} has not reached its deadline")]
    DeadlineNotReached { intent_id: IntentId },

    #[error("Source chain mismatch: escrow bound to {expected}, presented {presented}")]
    SourceChainMismatch { expected: ChainId, presented: ChainId },

    #[error("Unknown correlation id {0}")]
    UnknownCorrelation(CorrelationId),

    #[error("No peer configured on {transport} transport for destination {destination}")]
    PeerNotSet { transport: String, destination: String },

    #[error("Sender {sender} is not the configured peer {expected}")]
    PeerMismatch { expected: Address, sender: Address },

    #[error("Chain selector {0} is not supported")]
    UnsupportedChainSelector(u64),

    #[error("Envelope addressed to chain {destination}, this is chain {local}")]
    WrongDestination { destination: ChainId, local: ChainId },

    #[error("Envelope addressed to endpoint {dst_eid}, local endpoint is {local_eid}")]
    WrongEndpoint { dst_eid: u32, local_eid: u32 },

    #[error("Insufficient fee: required {required}, provided {provided}")]
    InsufficientFee { required: Amount, provided: Amount },

    #[error("Price unavailable for token {token}: {reason}")]
    PriceUnavailable { token: Address, reason: String },

    #[error("Inbox of chain {0} is full")]
    InboxFull(ChainId),

    #[error("Content store error: {0}")]
    ContentStore(String),

    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl XIntentError {
    /// Classifies the error.
    pub fn category(&self) -> ErrorCategory {
        use XIntentError::*;
        match self {
            EmptyIntentSpec
            | InvalidDeadline { .. }
            | ZeroAmount
            | EmptyAgentName
            | StakeBelowMinimum { .. }
            | AmountMismatch { .. }
            | AgentAlreadyRegistered { .. }
            | IdentityMismatch { .. }
            | InvalidPayload(_)
            | InvalidParameter(_)
            | SerializationError(_) => ErrorCategory::Validation,
            Unauthorized { .. } => ErrorCategory::Authorization,
            WrongPhase { .. }
            | AlreadyFinalized { .. }
            | IntentExpired { .. }
            | DeadlineNotReached { .. } => ErrorCategory::Phase,
            SourceChainMismatch { .. }
            | UnknownCorrelation(_)
            | PeerNotSet { .. }
            | PeerMismatch { .. }
            | UnsupportedChainSelector(_)
            | WrongDestination { .. }
            | WrongEndpoint { .. }
            | InsufficientFee { .. } => ErrorCategory::CrossChain,
            PriceUnavailable { .. } | InboxFull(_) | ContentStore(_) => ErrorCategory::Transient,
            NotFound { .. } => ErrorCategory::NotFound,
            Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Returns true if retrying later may succeed.
    pub fn is_recoverable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    pub fn not_found(resource_type: &str, id: impl ToString) -> Self {
        XIntentError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    pub fn unauthorized(caller: Address, required: impl Into<String>) -> Self {
        XIntentError::Unauthorized {
            caller,
            required: required.into(),
        }
    }

    pub fn wrong_phase(
        resource: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        XIntentError::WrongPhase {
            resource: resource.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Convenience Result type for protocol operations.
pub type Result<T> = std::result::Result<T, XIntentError>;

impl From<serde_json::Error> for XIntentError {
    fn from(err: serde_json::Error) -> Self {
        XIntentError::SerializationError(err.to_string())
    }
}
