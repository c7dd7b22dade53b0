//! # xintent Ledger
//!
//! Per-chain custody and bookkeeping: value escrow, agent identity and
//! reputation, and role-based capabilities.

pub mod access;
pub mod escrow;
pub mod registry;

pub use access::AccessControl;
pub use escrow::{CrossChainEscrow, EscrowLedger, EscrowRecord, EscrowStatus, Payout};
pub use registry::{Agent, AgentRegistry, AgentSyncData};
