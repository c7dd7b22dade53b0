//! # xintent Relay
//!
//! Cross-chain message relay. Two transports (an endpoint-id addressed
//! generic transport and a chain-selector addressed transport) sit behind
//! one send/receive contract, and every message is normalized into an
//! [`Envelope`](xintent_core::Envelope).

pub mod bus;
pub mod endpoint;
pub mod relay;
pub mod selector;
pub mod transport;

pub use bus::{MessageBus, Undelivered};
pub use endpoint::{EndpointTransport, Peer};
pub use relay::{Inbound, Relay, SentMessage};
pub use selector::{AllowedChain, SelectorTransport};
pub use transport::{Fee, FeeSchedule, Resolved, SendOptions, Transport};
