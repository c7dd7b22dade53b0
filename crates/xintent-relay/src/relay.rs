//! The relay: one send/receive contract over both transports.
//!
//! Sends are fire-and-forget: an accepted envelope lands in the outbox and
//! is picked up later by whatever carries messages between chains. Receipt
//! is split in two steps so that the caller decides when a correlation id
//! counts as consumed: [`Relay::check_inbound`] validates and detects
//! redelivery, [`Relay::mark_consumed`] records the id once the handler
//! has succeeded.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use xintent_core::identity::correlation_id;
use xintent_core::{
    Address, Amount, ChainId, CorrelationId, Envelope, IntentId, Journal, LedgerEvent,
    MessagePayload, Result, Route, TransportKind, XIntentError,
};

use crate::endpoint::{EndpointTransport, Peer};
use crate::selector::{AllowedChain, SelectorTransport};
use crate::transport::{Fee, FeeSchedule, SendOptions, Transport};

/// Outcome of an accepted send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub correlation_id: CorrelationId,
    pub destination_chain: ChainId,
    pub transport: TransportKind,
    pub fee: Amount,
}

/// Classification of an inbound envelope that passed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    Fresh,
    /// Already consumed; must not produce any effect.
    Duplicate,
}

#[derive(Debug)]
pub struct Relay {
    chain_id: ChainId,
    /// Address this relay sends from; peers on other chains pin it.
    address: Address,
    admin: Address,
    endpoint: EndpointTransport,
    selector: SelectorTransport,
    nonce: u64,
    outbox: VecDeque<Envelope>,
    consumed: HashSet<CorrelationId>,
    journal: Journal,
}

impl Relay {
    pub fn new(
        chain_id: ChainId,
        address: Address,
        admin: Address,
        local_eid: u32,
        local_selector: u64,
    ) -> Self {
        Self::with_fees(
            chain_id,
            address,
            admin,
            EndpointTransport::new(local_eid, FeeSchedule::generic_endpoint()),
            SelectorTransport::new(local_selector, FeeSchedule::chain_selector()),
        )
    }

    pub fn with_fees(
        chain_id: ChainId,
        address: Address,
        admin: Address,
        endpoint: EndpointTransport,
        selector: SelectorTransport,
    ) -> Self {
        Self {
            chain_id,
            address,
            admin,
            endpoint,
            selector,
            nonce: 1,
            outbox: VecDeque::new(),
            consumed: HashSet::new(),
            journal: Journal::new(),
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn endpoint(&self) -> &EndpointTransport {
        &self.endpoint
    }

    pub fn selector(&self) -> &SelectorTransport {
        &self.selector
    }

    fn transport(&self, kind: TransportKind) -> &dyn Transport {
        match kind {
            TransportKind::GenericEndpoint => &self.endpoint,
            TransportKind::ChainSelector => &self.selector,
        }
    }

    fn ensure_admin(&self, caller: Address) -> Result<()> {
        if caller != self.admin {
            return Err(XIntentError::unauthorized(caller, "relay owner"));
        }
        Ok(())
    }

    pub fn set_peer(&mut self, caller: Address, eid: u32, chain_id: ChainId, peer: Address) -> Result<()> {
        self.ensure_admin(caller)?;
        self.endpoint.set_peer(eid, Peer { chain_id, address: peer });
        info!(eid, chain_id, peer = %peer, "peer set");
        Ok(())
    }

    pub fn add_chain_selector(
        &mut self,
        caller: Address,
        selector: u64,
        chain_id: ChainId,
        sender: Option<Address>,
    ) -> Result<()> {
        self.ensure_admin(caller)?;
        self.selector
            .add_chain_selector(selector, AllowedChain { chain_id, sender });
        info!(selector, chain_id, "chain selector allowed");
        Ok(())
    }

    pub fn remove_chain_selector(&mut self, caller: Address, selector: u64) -> Result<bool> {
        self.ensure_admin(caller)?;
        Ok(self.selector.remove_chain_selector(selector))
    }

    /// Fee for sending `payload` along `route`.
    pub fn quote(&self, route: &Route, payload: &MessagePayload, options: &SendOptions) -> Result<Fee> {
        self.transport(route.kind())
            .quote(route, payload.encode().len(), options)
    }

    /// Queue a new outbound message with a fresh correlation id.
    pub fn send(
        &mut self,
        route: &Route,
        payload: &MessagePayload,
        options: &SendOptions,
        attached: Amount,
    ) -> Result<SentMessage> {
        let transport = self.transport(route.kind());
        let resolved = transport.resolve(route)?;
        let correlation = correlation_id(
            self.chain_id,
            payload.intent_id,
            resolved.destination_chain,
            self.nonce,
        );
        let sent = self.enqueue(route, payload, options, attached, correlation)?;
        self.nonce += 1;
        Ok(sent)
    }

    /// Answer `inbound` over the transport it arrived on, reusing its
    /// correlation id.
    pub fn send_reply(
        &mut self,
        inbound: &Envelope,
        payload: &MessagePayload,
        options: &SendOptions,
        attached: Amount,
    ) -> Result<SentMessage> {
        let route = inbound.meta.reply_route();
        self.enqueue(&route, payload, options, attached, inbound.correlation_id)
    }

    fn enqueue(
        &mut self,
        route: &Route,
        payload: &MessagePayload,
        options: &SendOptions,
        attached: Amount,
        correlation: CorrelationId,
    ) -> Result<SentMessage> {
        let transport = self.transport(route.kind());
        let resolved = transport.resolve(route)?;
        let bytes = payload.encode();
        let fee = transport.quote(route, bytes.len(), options)?;
        if attached < fee.native_fee {
            return Err(XIntentError::InsufficientFee {
                required: fee.native_fee,
                provided: attached,
            });
        }

        let envelope = Envelope {
            correlation_id: correlation,
            source_chain: self.chain_id,
            destination_chain: resolved.destination_chain,
            sender: self.address,
            meta: resolved.meta,
            payload: bytes,
        };
        self.outbox.push_back(envelope);
        self.journal.record(LedgerEvent::CrossChainMessageSent {
            intent_id: payload.intent_id,
            correlation_id: correlation,
            destination_chain: resolved.destination_chain,
            transport: fee.transport,
            fee: fee.native_fee,
        });
        info!(
            intent_id = payload.intent_id,
            correlation_id = %correlation,
            destination = resolved.destination_chain,
            transport = %fee.transport,
            "cross-chain message queued"
        );

        Ok(SentMessage {
            correlation_id: correlation,
            destination_chain: resolved.destination_chain,
            transport: fee.transport,
            fee: fee.native_fee,
        })
    }

    /// Validate an inbound envelope: addressed here, from the configured
    /// counterpart, and not yet consumed.
    pub fn check_inbound(&self, envelope: &Envelope) -> Result<Inbound> {
        if envelope.destination_chain != self.chain_id {
            return Err(XIntentError::WrongDestination {
                destination: envelope.destination_chain,
                local: self.chain_id,
            });
        }
        self.transport(envelope.transport()).verify_inbound(envelope)?;

        if self.consumed.contains(&envelope.correlation_id) {
            debug!(correlation_id = %envelope.correlation_id, "duplicate delivery");
            return Ok(Inbound::Duplicate);
        }
        Ok(Inbound::Fresh)
    }

    /// Record that `envelope` has been handled. Returns false if it was
    /// already consumed.
    pub fn mark_consumed(&mut self, envelope: &Envelope) -> bool {
        if !self.consumed.insert(envelope.correlation_id) {
            return false;
        }
        self.journal.record(LedgerEvent::CrossChainMessageReceived {
            correlation_id: envelope.correlation_id,
            source_chain: envelope.source_chain,
            transport: envelope.transport(),
        });
        true
    }

    pub fn is_consumed(&self, correlation_id: &CorrelationId) -> bool {
        self.consumed.contains(correlation_id)
    }

    /// Next nonce to be used by [`Relay::send`].
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Correlation id the next send of `intent_id` to `destination` would get.
    pub fn peek_correlation_id(&self, intent_id: IntentId, destination: ChainId) -> CorrelationId {
        correlation_id(self.chain_id, intent_id, destination, self.nonce)
    }

    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    pub fn drain_outbox(&mut self) -> Vec<Envelope> {
        self.outbox.drain(..).collect()
    }

    /// Put envelopes the network refused back at the head of the outbox,
    /// ahead of anything queued since they were drained.
    pub fn requeue(&mut self, envelopes: Vec<Envelope>) {
        for envelope in envelopes.into_iter().rev() {
            self.outbox.push_front(envelope);
        }
    }

    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        self.journal.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xintent_core::{MessageAction, TransportMeta, H256};

    const ADMIN: Address = Address::repeat_byte(0xaa);
    const RELAY_1: Address = Address::repeat_byte(0x01);
    const RELAY_2: Address = Address::repeat_byte(0x02);
    const SELECTOR_1: u64 = 5009297550715157269;
    const SELECTOR_2: u64 = 16015286601757825753;

    fn pair() -> (Relay, Relay) {
        let mut one = Relay::new(1, RELAY_1, ADMIN, 101, SELECTOR_1);
        let mut two = Relay::new(2, RELAY_2, ADMIN, 102, SELECTOR_2);
        one.set_peer(ADMIN, 102, 2, RELAY_2).unwrap();
        two.set_peer(ADMIN, 101, 1, RELAY_1).unwrap();
        one.add_chain_selector(ADMIN, SELECTOR_2, 2, Some(RELAY_2)).unwrap();
        two.add_chain_selector(ADMIN, SELECTOR_1, 1, Some(RELAY_1)).unwrap();
        (one, two)
    }

    fn announce(intent_id: IntentId) -> MessagePayload {
        MessagePayload::new(
            intent_id,
            MessageAction::Announce {
                spec: "Execute cross-chain swap".to_string(),
            },
        )
    }

    #[test]
    fn test_send_assigns_sequential_correlation_ids() {
        let (mut one, _) = pair();
        let route = Route::GenericEndpoint { dst_eid: 102 };
        let options = SendOptions::default();
        let fee = one.quote(&route, &announce(0), &options).unwrap();

        let expected = one.peek_correlation_id(0, 2);
        let first = one.send(&route, &announce(0), &options, fee.native_fee).unwrap();
        let second = one.send(&route, &announce(0), &options, fee.native_fee).unwrap();

        assert_eq!(first.correlation_id, expected);
        assert_eq!(first.correlation_id, correlation_id(1, 0, 2, 1));
        assert_eq!(second.correlation_id, correlation_id(1, 0, 2, 2));
        assert_eq!(first.destination_chain, 2);
        assert_eq!(one.pending(), 2);
    }

    #[test]
    fn test_requeue_keeps_refused_envelopes_first() {
        let (mut one, _) = pair();
        let route = Route::GenericEndpoint { dst_eid: 102 };
        for intent_id in 0..2 {
            one.send(&route, &announce(intent_id), &SendOptions::default(), u128::MAX)
                .unwrap();
        }
        let refused = one.drain_outbox();
        one.send(&route, &announce(2), &SendOptions::default(), u128::MAX)
            .unwrap();

        one.requeue(refused);
        let order: Vec<_> = one
            .drain_outbox()
            .iter()
            .map(|e| e.decode_payload().unwrap().intent_id)
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_insufficient_fee_queues_nothing() {
        let (mut one, _) = pair();
        let route = Route::ChainSelector { dest_selector: SELECTOR_2 };
        let options = SendOptions::default();
        let fee = one.quote(&route, &announce(0), &options).unwrap();

        let err = one
            .send(&route, &announce(0), &options, fee.native_fee - 1)
            .unwrap_err();
        assert_eq!(
            err,
            XIntentError::InsufficientFee {
                required: fee.native_fee,
                provided: fee.native_fee - 1,
            }
        );
        assert_eq!(one.pending(), 0);
        assert_eq!(one.nonce(), 1);
        assert!(one.drain_events().is_empty());
    }

    #[test]
    fn test_send_without_peer_fails() {
        let mut relay = Relay::new(1, RELAY_1, ADMIN, 101, SELECTOR_1);
        let err = relay
            .send(
                &Route::GenericEndpoint { dst_eid: 102 },
                &announce(0),
                &SendOptions::default(),
                u128::MAX,
            )
            .unwrap_err();
        assert!(matches!(err, XIntentError::PeerNotSet { .. }));
    }

    #[test]
    fn test_receive_is_idempotent() {
        let (mut one, mut two) = pair();
        for route in [
            Route::GenericEndpoint { dst_eid: 102 },
            Route::ChainSelector { dest_selector: SELECTOR_2 },
        ] {
            one.send(&route, &announce(3), &SendOptions::default(), u128::MAX)
                .unwrap();
        }

        for envelope in one.drain_outbox() {
            assert_eq!(two.check_inbound(&envelope).unwrap(), Inbound::Fresh);
            assert!(two.mark_consumed(&envelope));
            assert_eq!(two.check_inbound(&envelope).unwrap(), Inbound::Duplicate);
            assert!(!two.mark_consumed(&envelope));
            assert_eq!(envelope.decode_payload().unwrap(), announce(3));
        }
        assert_eq!(two.drain_events().len(), 2);
    }

    #[test]
    fn test_reply_reuses_correlation_id() {
        let (mut one, mut two) = pair();
        one.send(
            &Route::ChainSelector { dest_selector: SELECTOR_2 },
            &announce(3),
            &SendOptions::default(),
            u128::MAX,
        )
        .unwrap();
        let request = one.drain_outbox().remove(0);

        two.send_reply(&request, &announce(3), &SendOptions::default(), u128::MAX)
            .unwrap();
        let reply = two.drain_outbox().remove(0);
        assert_eq!(reply.correlation_id, request.correlation_id);
        assert_eq!(reply.destination_chain, 1);
        assert_eq!(
            reply.meta,
            TransportMeta::ChainSelector {
                source_selector: SELECTOR_2,
                dest_selector: SELECTOR_1,
            }
        );
        assert_eq!(one.check_inbound(&reply).unwrap(), Inbound::Fresh);
    }

    #[test]
    fn test_inbound_rejections() {
        let (_, two) = pair();
        let mut envelope = Envelope {
            correlation_id: H256::repeat_byte(5),
            source_chain: 1,
            destination_chain: 3,
            sender: RELAY_1,
            meta: TransportMeta::GenericEndpoint { src_eid: 101, dst_eid: 102 },
            payload: announce(0).encode(),
        };
        assert_eq!(
            two.check_inbound(&envelope),
            Err(XIntentError::WrongDestination { destination: 3, local: 2 })
        );

        envelope.destination_chain = 2;
        envelope.sender = Address::repeat_byte(0x99);
        assert!(matches!(
            two.check_inbound(&envelope),
            Err(XIntentError::PeerMismatch { .. })
        ));
    }

    #[test]
    fn test_only_admin_configures() {
        let mut relay = Relay::new(1, RELAY_1, ADMIN, 101, SELECTOR_1);
        assert!(relay.set_peer(RELAY_2, 102, 2, RELAY_2).is_err());
        assert!(relay.add_chain_selector(RELAY_2, SELECTOR_2, 2, None).is_err());
        assert!(relay.endpoint().peer(102).is_none());
        assert!(!relay.selector().is_supported(SELECTOR_2));
    }
}
