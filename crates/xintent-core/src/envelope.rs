//! Cross-chain message envelope and payload codec.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XIntentError};
use crate::types::{Address, AgentId, Amount, ChainId, ContentId, CorrelationId, IntentId, Token, H256};

/// Current payload codec version.
pub const PAYLOAD_VERSION: u8 = 1;

const TAG_ANNOUNCE: u8 = 0;
const TAG_EXECUTE: u8 = 1;
const TAG_CONFIRM_OK: u8 = 2;
const TAG_CONFIRM_FAILED: u8 = 3;

/// The two message-passing systems a relay can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Endpoint-id addressed transport with per-destination peers.
    GenericEndpoint,
    /// Chain-selector addressed transport with an allowlist.
    ChainSelector,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::GenericEndpoint => f.write_str("generic_endpoint"),
            TransportKind::ChainSelector => f.write_str("chain_selector"),
        }
    }
}

/// Destination addressing chosen by a sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum Route {
    GenericEndpoint { dst_eid: u32 },
    ChainSelector { dest_selector: u64 },
}

impl Route {
    pub fn kind(&self) -> TransportKind {
        match self {
            Route::GenericEndpoint { .. } => TransportKind::GenericEndpoint,
            Route::ChainSelector { .. } => TransportKind::ChainSelector,
        }
    }
}

/// Transport-specific addressing carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum TransportMeta {
    GenericEndpoint { src_eid: u32, dst_eid: u32 },
    ChainSelector { source_selector: u64, dest_selector: u64 },
}

impl TransportMeta {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportMeta::GenericEndpoint { .. } => TransportKind::GenericEndpoint,
            TransportMeta::ChainSelector { .. } => TransportKind::ChainSelector,
        }
    }

    /// Route that answers this message over the same transport.
    pub fn reply_route(&self) -> Route {
        match *self {
            TransportMeta::GenericEndpoint { src_eid, .. } => {
                Route::GenericEndpoint { dst_eid: src_eid }
            }
            TransportMeta::ChainSelector {
                source_selector, ..
            } => Route::ChainSelector {
                dest_selector: source_selector,
            },
        }
    }
}

/// A message in flight between two chains, normalized across transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub correlation_id: CorrelationId,
    pub source_chain: ChainId,
    pub destination_chain: ChainId,
    /// Contract on the source chain that sent the message.
    pub sender: Address,
    pub meta: TransportMeta,
    /// Encoded [`MessagePayload`].
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn transport(&self) -> TransportKind {
        self.meta.kind()
    }

    pub fn decode_payload(&self) -> Result<MessagePayload> {
        MessagePayload::decode(&self.payload)
    }
}

/// Result of a remote execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Succeeded { result_ref: ContentId },
    Failed { reason: String },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Succeeded { .. })
    }
}

/// What the receiving chain is asked to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MessageAction {
    /// Intent is open for bidding on the source chain.
    Announce { spec: String },
    /// Execute the selected strategy on the destination chain.
    Execute {
        token: Token,
        amount: Amount,
        agent_id: AgentId,
    },
    /// Answer to an earlier Execute.
    Confirm(ExecutionOutcome),
}

/// Decoded payload of an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub intent_id: IntentId,
    pub action: MessageAction,
}

impl MessagePayload {
    pub fn new(intent_id: IntentId, action: MessageAction) -> Self {
        Self { intent_id, action }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.push(PAYLOAD_VERSION);
        let tag = match &self.action {
            MessageAction::Announce { .. } => TAG_ANNOUNCE,
            MessageAction::Execute { .. } => TAG_EXECUTE,
            MessageAction::Confirm(ExecutionOutcome::Succeeded { .. }) => TAG_CONFIRM_OK,
            MessageAction::Confirm(ExecutionOutcome::Failed { .. }) => TAG_CONFIRM_FAILED,
        };
        out.push(tag);
        out.extend_from_slice(&self.intent_id.to_be_bytes());

        match &self.action {
            MessageAction::Announce { spec } => put_str(&mut out, spec),
            MessageAction::Execute {
                token,
                amount,
                agent_id,
            } => {
                out.extend_from_slice(token.as_bytes());
                out.extend_from_slice(&amount.to_be_bytes());
                out.extend_from_slice(&agent_id.to_be_bytes());
            }
            MessageAction::Confirm(ExecutionOutcome::Succeeded { result_ref }) => {
                out.extend_from_slice(result_ref.as_bytes());
            }
            MessageAction::Confirm(ExecutionOutcome::Failed { reason }) => put_str(&mut out, reason),
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader { bytes, pos: 0 };

        let version = reader.take::<1>()?[0];
        if version != PAYLOAD_VERSION {
            return Err(XIntentError::InvalidPayload(format!(
                "unsupported version {}",
                version
            )));
        }
        let tag = reader.take::<1>()?[0];
        let intent_id = u64::from_be_bytes(reader.take::<8>()?);

        let action = match tag {
            TAG_ANNOUNCE => MessageAction::Announce {
                spec: reader.string()?,
            },
            TAG_EXECUTE => MessageAction::Execute {
                token: Address(reader.take::<20>()?),
                amount: u128::from_be_bytes(reader.take::<16>()?),
                agent_id: u64::from_be_bytes(reader.take::<8>()?),
            },
            TAG_CONFIRM_OK => MessageAction::Confirm(ExecutionOutcome::Succeeded {
                result_ref: H256(reader.take::<32>()?),
            }),
            TAG_CONFIRM_FAILED => MessageAction::Confirm(ExecutionOutcome::Failed {
                reason: reader.string()?,
            }),
            other => {
                return Err(XIntentError::InvalidPayload(format!(
                    "unknown action tag {}",
                    other
                )))
            }
        };

        if reader.pos != bytes.len() {
            return Err(XIntentError::InvalidPayload(format!(
                "{} trailing bytes",
                bytes.len() - reader.pos
            )));
        }

        Ok(Self { intent_id, action })
    }
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        let slice = self.bytes.get(self.pos..end).ok_or_else(|| {
            XIntentError::InvalidPayload(format!("truncated at byte {}", self.pos))
        })?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(slice);
        self.pos = end;
        Ok(buf)
    }

    fn string(&mut self) -> Result<String> {
        let len = u32::from_be_bytes(self.take::<4>()?) as usize;
        let end = self.pos + len;
        let slice = self.bytes.get(self.pos..end).ok_or_else(|| {
            XIntentError::InvalidPayload(format!("string of {} bytes truncated", len))
        })?;
        let s = std::str::from_utf8(slice)
            .map_err(|e| XIntentError::InvalidPayload(e.to_string()))?
            .to_string();
        self.pos = end;
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_layout() {
        let payload = MessagePayload::new(
            7,
            MessageAction::Execute {
                token: Address::ZERO,
                amount: 1_000,
                agent_id: 3,
            },
        );
        let bytes = payload.encode();

        assert_eq!(bytes.len(), 1 + 1 + 8 + 20 + 16 + 8);
        assert_eq!(bytes[0], PAYLOAD_VERSION);
        assert_eq!(bytes[1], TAG_EXECUTE);
        assert_eq!(&bytes[2..10], &7u64.to_be_bytes());
        assert_eq!(MessagePayload::decode(&bytes).unwrap(), payload);
    }

    #[test]
    fn test_failure_confirmation_carries_reason() {
        let payload = MessagePayload::new(
            1,
            MessageAction::Confirm(ExecutionOutcome::Failed {
                reason: "price stale".to_string(),
            }),
        );
        let decoded = MessagePayload::decode(&payload.encode()).unwrap();
        match decoded.action {
            MessageAction::Confirm(ExecutionOutcome::Failed { reason }) => {
                assert_eq!(reason, "price stale")
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        let good = MessagePayload::new(1, MessageAction::Announce { spec: "x".into() }).encode();

        let mut wrong_version = good.clone();
        wrong_version[0] = 9;
        assert!(matches!(
            MessagePayload::decode(&wrong_version),
            Err(XIntentError::InvalidPayload(_))
        ));

        assert!(MessagePayload::decode(&good[..good.len() - 1]).is_err());

        let mut trailing = good.clone();
        trailing.push(0);
        assert!(MessagePayload::decode(&trailing).is_err());

        let mut bad_tag = good;
        bad_tag[1] = 42;
        assert!(MessagePayload::decode(&bad_tag).is_err());
    }

    #[test]
    fn test_reply_route_points_back_to_source() {
        let meta = TransportMeta::GenericEndpoint {
            src_eid: 30101,
            dst_eid: 30110,
        };
        assert_eq!(meta.reply_route(), Route::GenericEndpoint { dst_eid: 30101 });

        let meta = TransportMeta::ChainSelector {
            source_selector: 1,
            dest_selector: 2,
        };
        assert_eq!(meta.reply_route(), Route::ChainSelector { dest_selector: 1 });
    }
}
