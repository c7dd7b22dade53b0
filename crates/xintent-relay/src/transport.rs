//! The transport capability shared by both message-passing systems.

use serde::{Deserialize, Serialize};
use xintent_core::{Amount, ChainId, Envelope, Result, Route, TransportKind, TransportMeta, XIntentError};

/// Per-send execution options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOptions {
    /// Gas budget requested for the destination-side handler.
    pub gas_limit: u64,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self { gas_limit: 200_000 }
    }
}

/// Fee constants of one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub base_fee: Amount,
    pub per_byte_fee: Amount,
    /// Charged per unit of `SendOptions::gas_limit`; zero when the transport
    /// does not price gas.
    pub per_gas_fee: Amount,
}

impl FeeSchedule {
    /// Default schedule for the generic endpoint transport.
    pub fn generic_endpoint() -> Self {
        Self {
            base_fee: 100_000_000_000_000,
            per_byte_fee: 1_000_000_000,
            per_gas_fee: 10_000_000,
        }
    }

    /// Default schedule for the chain-selector transport.
    pub fn chain_selector() -> Self {
        Self {
            base_fee: 200_000_000_000_000,
            per_byte_fee: 2_000_000_000,
            per_gas_fee: 0,
        }
    }

    /// Fee for a payload of `payload_len` bytes.
    pub fn fee_for(&self, payload_len: usize, options: &SendOptions) -> Result<Amount> {
        let overflow = || XIntentError::InvalidParameter("fee overflow".to_string());
        let bytes = self
            .per_byte_fee
            .checked_mul(payload_len as Amount)
            .ok_or_else(overflow)?;
        let gas = self
            .per_gas_fee
            .checked_mul(options.gas_limit as Amount)
            .ok_or_else(overflow)?;
        self.base_fee
            .checked_add(bytes)
            .and_then(|fee| fee.checked_add(gas))
            .ok_or_else(overflow)
    }
}

/// A fee quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub transport: TransportKind,
    pub native_fee: Amount,
}

/// Where a route leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub destination_chain: ChainId,
    pub meta: TransportMeta,
}

/// A cross-chain message-passing system.
///
/// Implementations hold their own addressing tables; the relay decides
/// which one to use from the route's variant.
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Map a route to its destination chain and envelope metadata. Fails
    /// when the destination is not configured.
    fn resolve(&self, route: &Route) -> Result<Resolved>;

    fn quote(&self, route: &Route, payload_len: usize, options: &SendOptions) -> Result<Fee>;

    /// Check that an inbound envelope was sent by the configured
    /// counterpart on its source chain.
    fn verify_inbound(&self, envelope: &Envelope) -> Result<()>;
}
