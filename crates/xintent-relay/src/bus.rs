//! In-memory delivery network between chains.
//!
//! Each chain registers once and receives its inbound envelopes on an mpsc
//! channel. Delivery order across chains is not coordinated, and a sender
//! may deliver the same envelope more than once.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::warn;
use xintent_core::{ChainId, Envelope, XIntentError};

const CHANNEL_CAPACITY: usize = 256;

/// An envelope the bus could not hand over, returned to the sender.
#[derive(Debug)]
pub struct Undelivered {
    pub envelope: Envelope,
    pub error: XIntentError,
}

#[derive(Clone)]
pub struct MessageBus {
    routes: Arc<RwLock<HashMap<ChainId, mpsc::Sender<Envelope>>>>,
    capacity: usize,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus whose per-chain inboxes hold at most `capacity` envelopes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            routes: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Attach `chain_id` to the bus, replacing any earlier registration.
    pub async fn register(&self, chain_id: ChainId) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.routes.write().await.insert(chain_id, tx);
        rx
    }

    pub async fn is_registered(&self, chain_id: ChainId) -> bool {
        self.routes.read().await.contains_key(&chain_id)
    }

    /// Hand `envelope` to its destination chain without waiting. A full,
    /// closed or unknown inbox returns the envelope to the caller.
    pub async fn deliver(&self, envelope: Envelope) -> Result<(), Undelivered> {
        let destination = envelope.destination_chain;
        let Some(tx) = self.routes.read().await.get(&destination).cloned() else {
            return Err(Undelivered {
                envelope,
                error: XIntentError::not_found("chain", destination),
            });
        };

        tx.try_send(envelope).map_err(|err| match err {
            TrySendError::Full(envelope) => Undelivered {
                envelope,
                error: XIntentError::InboxFull(destination),
            },
            TrySendError::Closed(envelope) => {
                warn!(destination, "destination chain stopped receiving");
                Undelivered {
                    envelope,
                    error: XIntentError::Internal(format!("chain {} inbox closed", destination)),
                }
            }
        })
    }
}
