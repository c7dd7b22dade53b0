//! Application state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use xintent_core::identity::content_id;
use xintent_core::{
    Address, Amount, ChainId, ContentId, CorrelationId, Envelope, ExecutionOutcome, IntentDraft, IntentId,
    MessageAction, Result,
};
use xintent_relay::{MessageBus, Undelivered};
use xintent_state::{ContentStore, InMemoryContentStore, InMemoryPriceFeed, PriceFeed, SubscriptionManager};

use crate::chain::ChainState;
use crate::reconciler::{InboundOutcome, Settlement};

/// Shared application state of one chain node.
#[derive(Clone)]
pub struct AppState {
    /// The chain ledger. Every write is one atomic transaction.
    pub chain: Arc<RwLock<ChainState>>,

    pub chain_id: ChainId,

    /// Blob store for intent specs, execution reports and receipts.
    pub content: Arc<dyn ContentStore>,

    pub prices: Arc<dyn PriceFeed>,

    /// Committed ledger events.
    pub events: SubscriptionManager,

    /// Delivery network to other chains.
    pub bus: MessageBus,

    /// Account the engine acts as when sweeping expired intents.
    pub operator: Address,
}

impl AppState {
    /// State with in-memory collaborators.
    pub fn new(chain: ChainState, operator: Address, bus: MessageBus) -> Self {
        Self::with_collaborators(
            chain,
            operator,
            bus,
            Arc::new(InMemoryContentStore::new()),
            Arc::new(InMemoryPriceFeed::new()),
        )
    }

    pub fn with_collaborators(
        chain: ChainState,
        operator: Address,
        bus: MessageBus,
        content: Arc<dyn ContentStore>,
        prices: Arc<dyn PriceFeed>,
    ) -> Self {
        let chain_id = chain.chain_id();
        Self {
            chain: Arc::new(RwLock::new(chain)),
            chain_id,
            content,
            prices,
            events: SubscriptionManager::new(),
            bus,
            operator,
        }
    }

    /// Run `f` as one transaction and publish the events it committed.
    pub async fn transact<T>(&self, f: impl FnOnce(&mut ChainState) -> Result<T>) -> Result<T> {
        let (result, events) = {
            let mut chain = self.chain.write().await;
            let result = f(&mut chain);
            (result, chain.drain_events())
        };
        self.events.publish(self.chain_id, events);
        result
    }

    /// Read a view of the chain.
    pub async fn read<T>(&self, f: impl FnOnce(&ChainState) -> T) -> T {
        let chain = self.chain.read().await;
        f(&chain)
    }

    /// Store `bytes`, logging instead of failing when the store is down.
    async fn archive(&self, what: &str, bytes: Vec<u8>) -> Option<ContentId> {
        match self.content.put(bytes).await {
            Ok(id) => {
                debug!(what, content_id = %id, "archived");
                Some(id)
            }
            Err(e) => {
                warn!(what, error = %e, "archive write failed");
                None
            }
        }
    }

    /// Create an intent. A draft without a content reference gets the
    /// content id of its spec, and the spec is archived.
    pub async fn create_intent(
        &self,
        caller: Address,
        mut draft: IntentDraft,
        attached: Amount,
        now: DateTime<Utc>,
    ) -> Result<IntentId> {
        if draft.content_ref == ContentId::ZERO && !draft.spec.is_empty() {
            let bytes = draft.spec.clone().into_bytes();
            draft.content_ref = content_id(&bytes);
            self.archive("intent spec", bytes).await;
        }
        self.transact(|chain| chain.create_intent(caller, draft, attached, now))
            .await
    }

    /// Handle an envelope delivered by the bus.
    pub async fn process_inbound(&self, envelope: Envelope, now: DateTime<Utc>) -> Result<InboundOutcome> {
        let price = match envelope.decode_payload() {
            Ok(payload) => match payload.action {
                MessageAction::Execute { token, .. } => Some(self.prices.latest_price(token).await),
                _ => None,
            },
            // Decoding again inside the transaction reports the error.
            Err(_) => None,
        };

        let outcome = self
            .transact(|chain| chain.handle_inbound(&envelope, price, now))
            .await?;

        match &outcome {
            InboundOutcome::Executed { report, .. } => {
                self.archive("execution report", report.clone()).await;
            }
            InboundOutcome::Settled(settlement) => self.write_receipt(settlement).await,
            _ => {}
        }
        Ok(outcome)
    }

    /// Archive a settlement receipt and link it to the intent.
    pub async fn write_receipt(&self, settlement: &Settlement) {
        let bytes = match serde_json::to_vec(settlement) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(intent_id = settlement.intent_id, error = %e, "receipt encoding failed");
                return;
            }
        };
        let Some(receipt) = self.archive("settlement receipt", bytes).await else {
            return;
        };
        let intent_id = settlement.intent_id;
        if let Err(e) = self
            .transact(|chain| chain.record_receipt(intent_id, receipt))
            .await
        {
            warn!(intent_id, error = %e, "receipt not recorded");
        }
    }

    pub async fn push_confirmation(
        &self,
        caller: Address,
        correlation_id: CorrelationId,
        outcome: ExecutionOutcome,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        let settlement = self
            .transact(|chain| chain.push_confirmation(caller, correlation_id, outcome, now))
            .await?;
        self.write_receipt(&settlement).await;
        Ok(settlement)
    }

    pub async fn confirm_local_execution(
        &self,
        caller: Address,
        intent_id: IntentId,
        outcome: ExecutionOutcome,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        let settlement = self
            .transact(|chain| chain.confirm_local_execution(caller, intent_id, outcome, now))
            .await?;
        self.write_receipt(&settlement).await;
        Ok(settlement)
    }

    pub async fn expire_intent(
        &self,
        caller: Address,
        intent_id: IntentId,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        let settlement = self
            .transact(|chain| chain.expire_intent(caller, intent_id, now))
            .await?;
        self.write_receipt(&settlement).await;
        Ok(settlement)
    }

    /// Hand queued outbound envelopes to the bus without waiting on any
    /// inbox. Refused envelopes go back to the outbox for the next flush.
    /// Returns how many were delivered.
    pub async fn flush_outbox(&self) -> usize {
        let envelopes = self.chain.write().await.relay_mut().drain_outbox();
        let mut delivered = 0;
        let mut refused = Vec::new();
        for envelope in envelopes {
            match self.bus.deliver(envelope).await {
                Ok(()) => delivered += 1,
                Err(Undelivered { envelope, error }) => {
                    warn!(
                        correlation_id = %envelope.correlation_id,
                        destination = envelope.destination_chain,
                        error = %error,
                        "envelope not delivered, requeued"
                    );
                    refused.push(envelope);
                }
            }
        }
        if !refused.is_empty() {
            self.chain.write().await.relay_mut().requeue(refused);
        }
        delivered
    }

    /// Fail every intent past its deadline, acting as the operator.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let expired = self.read(|chain| chain.expired_intents(now)).await;
        let mut swept = 0;
        for intent_id in expired {
            match self.expire_intent(self.operator, intent_id, now).await {
                Ok(_) => swept += 1,
                Err(e) => warn!(intent_id, error = %e, "expiry sweep failed"),
            }
        }
        if swept > 0 {
            info!(swept, "expired intents failed");
        }
        swept
    }
}
