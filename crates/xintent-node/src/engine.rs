//! Background engine of a chain node.

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};
use xintent_core::Envelope;

use crate::reconciler::InboundOutcome;
use crate::state::AppState;

/// Delivers inbound envelopes to the chain, forwards its outbound ones and
/// sweeps expired intents.
pub struct Engine {
    state: AppState,
    inbox: mpsc::Receiver<Envelope>,
    sweep_interval: Duration,
}

impl Engine {
    pub fn new(state: AppState, inbox: mpsc::Receiver<Envelope>, sweep_interval: Duration) -> Self {
        Self {
            state,
            inbox,
            sweep_interval,
        }
    }

    /// Run until the inbox closes.
    pub async fn run(mut self) {
        info!(chain_id = self.state.chain_id, "engine started");
        let mut sweep = interval(self.sweep_interval);

        loop {
            tokio::select! {
                received = self.inbox.recv() => {
                    let Some(envelope) = received else {
                        info!(chain_id = self.state.chain_id, "inbox closed, engine stopping");
                        break;
                    };
                    self.handle(envelope).await;
                    self.state.flush_outbox().await;
                }
                _ = sweep.tick() => {
                    self.state.flush_outbox().await;
                    self.state.sweep_expired(Utc::now()).await;
                }
            }
        }
    }

    async fn handle(&self, envelope: Envelope) {
        let correlation_id = envelope.correlation_id;
        let source_chain = envelope.source_chain;

        match self.state.process_inbound(envelope, Utc::now()).await {
            Ok(InboundOutcome::Duplicate) => {
                debug!(correlation_id = %correlation_id, "duplicate envelope ignored");
            }
            Ok(InboundOutcome::Announced(_)) => {
                info!(correlation_id = %correlation_id, source_chain, "announcement recorded");
            }
            Ok(InboundOutcome::Executed { swap, .. }) => {
                info!(correlation_id = %correlation_id, swap_id = swap.id, "executed for remote intent");
            }
            Ok(InboundOutcome::ExecutionRefused { intent_id, reason }) => {
                info!(correlation_id = %correlation_id, intent_id, %reason, "remote execution refused");
            }
            Ok(InboundOutcome::Settled(settlement)) => {
                info!(
                    correlation_id = %correlation_id,
                    intent_id = settlement.intent_id,
                    status = %settlement.status,
                    "intent settled"
                );
            }
            Err(e) => {
                error!(correlation_id = %correlation_id, source_chain, error = %e, "inbound envelope rejected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;
    use tokio::time::timeout;
    use xintent_core::{
        Address, ChainId, Intent, IntentStatus, LedgerEvent, Route, H256, UNIT,
    };
    use xintent_relay::{MessageBus, SendOptions};
    use xintent_state::{EventFilter, InMemoryContentStore, InMemoryPriceFeed, PriceReading};

    use crate::chain::tests::{chain, contract, proposal, ADMIN, AGENT_OWNER, EXECUTOR, USER};

    async fn node(
        chain_id: ChainId,
        peer: ChainId,
        bus: &MessageBus,
        prices: InMemoryPriceFeed,
    ) -> (AppState, Engine) {
        let mut state = chain(chain_id);
        state
            .relay_mut()
            .set_peer(ADMIN, 30_100 + peer as u32, peer, contract(peer))
            .unwrap();
        let inbox = bus.register(chain_id).await;
        let app = AppState::with_collaborators(
            state,
            EXECUTOR,
            bus.clone(),
            Arc::new(InMemoryContentStore::new()),
            Arc::new(prices),
        );
        let engine = Engine::new(app.clone(), inbox, Duration::from_secs(3_600));
        (app, engine)
    }

    #[tokio::test]
    async fn test_two_nodes_settle_over_bus() {
        let bus = MessageBus::new();
        let remote_prices = InMemoryPriceFeed::new();
        remote_prices
            .set_price(
                Address::ZERO,
                PriceReading {
                    price: 3_000 * 100_000_000,
                    decimals: 8,
                    updated_at: Utc::now(),
                },
            )
            .await;

        let (one, one_engine) = node(1, 2, &bus, InMemoryPriceFeed::new()).await;
        let (two, two_engine) = node(2, 1, &bus, remote_prices).await;
        tokio::spawn(one_engine.run());
        tokio::spawn(two_engine.run());

        let mut settled = one
            .events
            .subscribe(EventFilter::names(vec!["intent_settled".to_string()]))
            .await;

        let now = Utc::now();
        let draft = Intent::builder()
            .spec("Get 5% yield on stablecoins")
            .content_ref(H256::repeat_byte(0x99))
            .deadline(now + ChronoDuration::days(1))
            .build();
        let intent_id = one.create_intent(USER, draft, UNIT, now).await.unwrap();
        one.transact(|chain| {
            let agent_id = chain
                .registry_mut()
                .register_agent(AGENT_OWNER, "agent.eth", "yield-farming", UNIT, now)?;
            chain.start_bidding(USER, intent_id)?;
            let pid = chain.submit_proposal(AGENT_OWNER, proposal(intent_id, agent_id), now)?;
            chain.select_agent(USER, intent_id, pid)?;
            chain.dispatch(
                USER,
                intent_id,
                &Route::GenericEndpoint { dst_eid: 30_102 },
                &SendOptions::default(),
                UNIT,
                now,
            )
        })
        .await
        .unwrap();
        assert_eq!(one.flush_outbox().await, 1);

        let event = timeout(Duration::from_secs(5), settled.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event.event,
            LedgerEvent::IntentSettled {
                intent_id,
                src_chain_id: 2,
                success: true
            }
        );

        // The receipt is linked right after the settlement commits.
        let mut linked = None;
        for _ in 0..50 {
            linked = one
                .read(|chain| chain.intent(intent_id).ok().and_then(|i| i.receipt_ref))
                .await;
            if linked.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(linked.is_some());

        one.read(|chain| {
            assert_eq!(chain.intent(intent_id).unwrap().status, IntentStatus::Completed);
            assert_eq!(chain.escrow().balance_of(AGENT_OWNER, Address::ZERO), UNIT);
        })
        .await;
        two.read(|chain| assert_eq!(chain.proxy().swaps().count(), 1)).await;
    }

    #[tokio::test]
    async fn test_missing_price_fails_intent_over_bus() {
        let bus = MessageBus::new();
        let (one, one_engine) = node(1, 2, &bus, InMemoryPriceFeed::new()).await;
        let (_two, two_engine) = node(2, 1, &bus, InMemoryPriceFeed::new()).await;
        tokio::spawn(one_engine.run());
        tokio::spawn(two_engine.run());

        let mut failed = one
            .events
            .subscribe(EventFilter::names(vec!["intent_failed".to_string()]))
            .await;

        let now = Utc::now();
        let draft = Intent::builder()
            .spec("Swap 1 ETH for USDC")
            .deadline(now + ChronoDuration::days(1))
            .build();
        let intent_id = one.create_intent(USER, draft, UNIT, now).await.unwrap();
        one.transact(|chain| {
            let agent_id = chain
                .registry_mut()
                .register_agent(AGENT_OWNER, "agent.eth", "swaps", UNIT, now)?;
            chain.start_bidding(USER, intent_id)?;
            let pid = chain.submit_proposal(AGENT_OWNER, proposal(intent_id, agent_id), now)?;
            chain.select_agent(USER, intent_id, pid)?;
            chain.dispatch(
                EXECUTOR,
                intent_id,
                &Route::GenericEndpoint { dst_eid: 30_102 },
                &SendOptions::default(),
                UNIT,
                now,
            )
        })
        .await
        .unwrap();
        one.flush_outbox().await;

        let event = timeout(Duration::from_secs(5), failed.next())
            .await
            .unwrap()
            .unwrap();
        match event.event {
            LedgerEvent::IntentFailed { reason, .. } => assert!(reason.contains("no feed configured")),
            other => panic!("unexpected event {:?}", other),
        }
        one.read(|chain| assert_eq!(chain.escrow().balance_of(USER, Address::ZERO), UNIT))
            .await;
    }

    #[tokio::test]
    async fn test_engine_stops_when_inbox_closes() {
        let bus = MessageBus::new();
        let (_one, engine) = node(1, 2, &bus, InMemoryPriceFeed::new()).await;
        let handle = tokio::spawn(engine.run());

        // Re-registering drops the engine's sender.
        let _replacement = bus.register(1).await;
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
