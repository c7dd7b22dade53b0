//! Common types used across the protocol.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::XIntentError;

/// Identifier of a chain (EVM-style chain id).
pub type ChainId = u64;

/// Value in base units of a token.
pub type Amount = u128;

/// Chain-scoped, monotonically assigned intent id.
pub type IntentId = u64;

/// Chain-scoped proposal id.
pub type ProposalId = u64;

/// Chain-scoped agent id.
pub type AgentId = u64;

/// Chain-scoped local escrow id.
pub type EscrowId = u64;

/// Correlates an outbound dispatch with its inbound confirmation.
pub type CorrelationId = H256;

/// Pointer into the content-addressed store.
pub type ContentId = H256;

/// Token denomination. [`Address::ZERO`] denotes the chain's native token.
pub type Token = Address;

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

/// A 32-byte opaque value (hashes, correlation ids, content ids).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct H256(pub [u8; 32]);

impl Address {
    /// The zero address, used as the native token.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Address with every byte set to `byte`.
    pub const fn repeat_byte(byte: u8) -> Self {
        Address([byte; 20])
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl H256 {
    pub const ZERO: H256 = H256([0u8; 32]);

    pub const fn repeat_byte(byte: u8) -> Self {
        H256([byte; 32])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

fn parse_fixed<const N: usize>(s: &str) -> Result<[u8; N], XIntentError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped)
        .map_err(|e| XIntentError::InvalidParameter(format!("invalid hex '{}': {}", s, e)))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        XIntentError::InvalidParameter(format!("expected {} bytes, got {}", N, b.len()))
    })
}

macro_rules! impl_hex_type {
    ($ty:ident, $len:expr) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self, f)
            }
        }

        impl FromStr for $ty {
            type Err = XIntentError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_fixed::<$len>(s).map($ty)
            }
        }

        impl From<[u8; $len]> for $ty {
            fn from(bytes: [u8; $len]) -> Self {
                $ty(bytes)
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

impl_hex_type!(Address, 20);
impl_hex_type!(H256, 32);

/// Status of an Intent in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    /// Funds escrowed, bidding not yet open.
    Created,
    /// Agents may submit proposals.
    Bidding,
    /// A proposal has been selected and execution is under way.
    Executing,
    /// Execution confirmed and escrow released to the agent.
    Completed,
    /// Cancelled by the creator; escrow refunded.
    Cancelled,
    /// Remote failure or expiry; escrow refunded.
    Failed,
}

impl IntentStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IntentStatus::Completed | IntentStatus::Cancelled | IntentStatus::Failed
        )
    }

    /// Returns true if the intent can still be resolved.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntentStatus::Created => "created",
            IntentStatus::Bidding => "bidding",
            IntentStatus::Executing => "executing",
            IntentStatus::Completed => "completed",
            IntentStatus::Cancelled => "cancelled",
            IntentStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Capabilities granted by a chain's admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May dispatch, report local execution and sweep expired intents.
    Executor,
    /// May push verified off-chain execution results.
    Oracle,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Executor => f.write_str("executor"),
            Role::Oracle => f.write_str("oracle"),
        }
    }
}
