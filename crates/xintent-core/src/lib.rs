//! # xintent Core
//!
//! Core primitives and types for cross-chain intent coordination.
//!
//! This crate provides the fundamental building blocks:
//! - [`Intent`] and [`Proposal`] - the bidding lifecycle and its state machine
//! - [`Envelope`] and [`MessagePayload`] - normalized cross-chain messages
//! - [`identity`] - deterministic cross-chain identifiers
//! - [`XIntentError`] - protocol error taxonomy

pub mod envelope;
pub mod error;
pub mod event;
pub mod identity;
pub mod intent;
pub mod params;
pub mod types;

// Re-exports for convenience
pub use envelope::{
    Envelope, ExecutionOutcome, MessageAction, MessagePayload, Route, TransportKind, TransportMeta,
};
pub use error::{ErrorCategory, Result, XIntentError};
pub use event::{Journal, LedgerEvent};
pub use intent::{
    CrossChainRef, DispatchAction, Intent, IntentBuilder, IntentDraft, Proposal, ProposalDraft,
};
pub use params::{ProtocolParams, BPS_DENOMINATOR, MAX_WINDOW_SECS, UNIT};
pub use types::*;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::envelope::{Envelope, ExecutionOutcome, MessageAction, MessagePayload, Route};
    pub use crate::error::{Result, XIntentError};
    pub use crate::intent::{Intent, IntentBuilder, IntentDraft, Proposal, ProposalDraft};
    pub use crate::params::ProtocolParams;
    pub use crate::types::{Address, Amount, ChainId, IntentId, IntentStatus, H256};
}
