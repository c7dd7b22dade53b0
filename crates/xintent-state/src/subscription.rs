//! Ledger event subscriptions.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;
use xintent_core::{ChainId, IntentId, LedgerEvent};

/// An event as published by a chain after a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub chain_id: ChainId,
    pub event: LedgerEvent,
}

/// Filter for subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only events concerning this intent.
    pub intent_id: Option<IntentId>,

    /// Only these event names (the serialized `type` tag).
    pub names: Option<Vec<String>>,
}

impl EventFilter {
    pub fn intent(intent_id: IntentId) -> Self {
        Self {
            intent_id: Some(intent_id),
            ..Default::default()
        }
    }

    pub fn names(names: Vec<String>) -> Self {
        Self {
            names: Some(names),
            ..Default::default()
        }
    }

    pub fn matches(&self, event: &LedgerEvent) -> bool {
        if let Some(intent_id) = self.intent_id {
            if event.intent_id() != Some(intent_id) {
                return false;
            }
        }

        if let Some(ref names) = self.names {
            let name = event.name();
            if !names.iter().any(|n| n.as_str() == name) {
                return false;
            }
        }

        true
    }
}

/// A subscription to ledger events.
pub struct EventSubscription {
    pub id: Uuid,
    pub filter: EventFilter,
    pub receiver: broadcast::Receiver<ChainEvent>,
}

impl EventSubscription {
    /// Next event passing the filter. `None` once the manager is gone;
    /// lagged events are skipped.
    pub async fn next(&mut self) -> Option<ChainEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event.event) => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Fan-out of committed ledger events.
#[derive(Clone)]
pub struct SubscriptionManager {
    sender: broadcast::Sender<ChainEvent>,
    subscriptions: Arc<RwLock<HashMap<Uuid, EventFilter>>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn subscribe(&self, filter: EventFilter) -> EventSubscription {
        let id = Uuid::new_v4();
        let receiver = self.sender.subscribe();
        self.subscriptions.write().await.insert(id, filter.clone());
        EventSubscription {
            id,
            filter,
            receiver,
        }
    }

    pub async fn unsubscribe(&self, id: Uuid) {
        self.subscriptions.write().await.remove(&id);
    }

    /// Publish events in commit order. Subscribers filter locally.
    pub fn publish(&self, chain_id: ChainId, events: Vec<LedgerEvent>) {
        for event in events {
            // No receivers is fine.
            let _ = self.sender.send(ChainEvent { chain_id, event });
        }
    }

    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
