//! Settlement reconciler and inbound message handling.
//!
//! Confirmations reach an intent by its correlation id, over either
//! transport or pushed by an executor/oracle. Every settlement path checks
//! the intent and escrow state before mutating, so of two racing
//! resolutions exactly one applies and the other is rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use xintent_core::identity::content_id;
use xintent_core::{
    Address, Amount, ChainId, ContentId, CorrelationId, DispatchAction, Envelope,
    ExecutionOutcome, IntentId, IntentStatus, LedgerEvent, MessageAction, MessagePayload, Result,
    Role, Token, XIntentError,
};
use xintent_ledger::Payout;
use xintent_relay::{Inbound, SendOptions};
use xintent_state::PriceReading;

use crate::chain::{ChainState, RemoteAnnouncement};
use crate::proxy::{ExecutionRequest, SwapRecord};

/// Result of resolving an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub intent_id: IntentId,
    pub status: IntentStatus,
    /// Chain whose confirmation (or local decision) settled the intent.
    pub src_chain_id: ChainId,
    pub correlation_id: Option<CorrelationId>,
    pub outcome: ExecutionOutcome,
    pub payout: Payout,
    pub settled_at: DateTime<Utc>,
}

/// What handling an inbound envelope did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Already consumed; nothing happened.
    Duplicate,
    Announced(RemoteAnnouncement),
    /// Executed on this chain and confirmed back to the source.
    Executed {
        swap: SwapRecord,
        /// Serialized execution report and its content id.
        report: Vec<u8>,
        report_ref: ContentId,
    },
    /// Execution was refused and a failure confirmation sent back.
    ExecutionRefused { intent_id: IntentId, reason: String },
    Settled(Settlement),
}

/// Value an executor locks on this chain for an intent created elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossChainDeposit {
    pub correlation_id: CorrelationId,
    pub beneficiary: Address,
    pub token: Token,
    pub amount: Amount,
    pub intent_id: IntentId,
    /// Chain the intent originated on; release must present it again.
    pub src_chain_id: ChainId,
}

#[derive(Serialize)]
struct ExecutionReport<'a> {
    chain_id: ChainId,
    swap: &'a SwapRecord,
}

impl ChainState {
    fn ensure_settler(&self, caller: Address) -> Result<()> {
        self.access.ensure_any(caller, &[Role::Executor, Role::Oracle])
    }

    /// Handle a delivered envelope. `price` is the reading fetched for the
    /// token of an Execute request, if the payload carries one.
    ///
    /// The correlation id is consumed only when handling succeeds;
    /// redelivery of a consumed id returns [`InboundOutcome::Duplicate`].
    pub fn handle_inbound(
        &mut self,
        envelope: &Envelope,
        price: Option<Result<PriceReading>>,
        now: DateTime<Utc>,
    ) -> Result<InboundOutcome> {
        if self.relay.check_inbound(envelope)? == Inbound::Duplicate {
            return Ok(InboundOutcome::Duplicate);
        }
        let payload = envelope.decode_payload()?;

        let outcome = match payload.action {
            MessageAction::Announce { spec } => {
                let announcement = RemoteAnnouncement {
                    source_chain: envelope.source_chain,
                    intent_id: payload.intent_id,
                    spec,
                    correlation_id: envelope.correlation_id,
                    received_at: now,
                };
                self.announcements.push(announcement.clone());
                info!(
                    source_chain = envelope.source_chain,
                    intent_id = payload.intent_id,
                    "remote intent announced"
                );
                InboundOutcome::Announced(announcement)
            }
            MessageAction::Execute {
                token,
                amount,
                agent_id,
            } => {
                let request = ExecutionRequest {
                    intent_id: payload.intent_id,
                    source_chain: envelope.source_chain,
                    correlation_id: envelope.correlation_id,
                    agent_id,
                    token,
                    amount,
                };
                let price = price.unwrap_or_else(|| {
                    Err(XIntentError::PriceUnavailable {
                        token,
                        reason: "no reading supplied".to_string(),
                    })
                });
                self.execute_remote(envelope, &request, price, now)?
            }
            MessageAction::Confirm(outcome) => {
                let settlement = self.settle_correlation(
                    &envelope.correlation_id,
                    envelope.source_chain,
                    outcome,
                    now,
                )?;
                InboundOutcome::Settled(settlement)
            }
        };

        self.relay.mark_consumed(envelope);
        Ok(outcome)
    }

    /// Run an Execute request and queue the confirmation back to its source.
    fn execute_remote(
        &mut self,
        envelope: &Envelope,
        request: &ExecutionRequest,
        price: Result<PriceReading>,
        now: DateTime<Utc>,
    ) -> Result<InboundOutcome> {
        let options = SendOptions::default();
        match self.proxy.prepare(request, price, now) {
            Ok(swap) => {
                let report = serde_json::to_vec(&ExecutionReport {
                    chain_id: self.chain_id(),
                    swap: &swap,
                })?;
                let report_ref = content_id(&report);
                self.reply(
                    envelope,
                    request.intent_id,
                    ExecutionOutcome::Succeeded {
                        result_ref: report_ref,
                    },
                    &options,
                )?;
                let id = self.proxy.commit(swap);
                let swap = self
                    .proxy
                    .get_swap(id)
                    .cloned()
                    .ok_or_else(|| XIntentError::Internal(format!("swap {} not recorded", id)))?;
                info!(
                    intent_id = request.intent_id,
                    source_chain = request.source_chain,
                    swap_id = id,
                    "remote execution completed"
                );
                Ok(InboundOutcome::Executed {
                    swap,
                    report,
                    report_ref,
                })
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(intent_id = request.intent_id, %reason, "remote execution refused");
                self.reply(
                    envelope,
                    request.intent_id,
                    ExecutionOutcome::Failed {
                        reason: reason.clone(),
                    },
                    &options,
                )?;
                Ok(InboundOutcome::ExecutionRefused {
                    intent_id: request.intent_id,
                    reason,
                })
            }
        }
    }

    fn reply(
        &mut self,
        envelope: &Envelope,
        intent_id: IntentId,
        outcome: ExecutionOutcome,
        options: &SendOptions,
    ) -> Result<()> {
        let payload = MessagePayload::new(intent_id, MessageAction::Confirm(outcome));
        let fee = self
            .relay
            .quote(&envelope.meta.reply_route(), &payload, options)?;
        self.relay
            .send_reply(envelope, &payload, options, fee.native_fee)?;
        Ok(())
    }

    /// Executor or oracle push of a verified off-chain result.
    pub fn push_confirmation(
        &mut self,
        caller: Address,
        correlation_id: CorrelationId,
        outcome: ExecutionOutcome,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        self.ensure_settler(caller)?;
        let intent_id = self
            .intent_for_correlation(&correlation_id)
            .ok_or(XIntentError::UnknownCorrelation(correlation_id))?;
        let destination = self
            .intent(intent_id)?
            .cross_chain_ref(&correlation_id)
            .map(|r| r.destination_chain)
            .ok_or(XIntentError::UnknownCorrelation(correlation_id))?;
        self.settle_correlation(&correlation_id, destination, outcome, now)
    }

    /// Executor report for an intent executed without a cross-chain
    /// dispatch.
    pub fn confirm_local_execution(
        &mut self,
        caller: Address,
        intent_id: IntentId,
        outcome: ExecutionOutcome,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        self.ensure_settler(caller)?;
        let chain_id = self.chain_id();
        self.settle(intent_id, chain_id, None, outcome, now)
    }

    /// Fail an intent whose deadline passed without resolution.
    pub fn expire_intent(
        &mut self,
        caller: Address,
        intent_id: IntentId,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        self.ensure_settler(caller)?;
        let intent = self.intent(intent_id)?;
        intent.ensure_not_finalized()?;
        if !intent.is_expired(now) {
            return Err(XIntentError::DeadlineNotReached { intent_id });
        }
        let chain_id = self.chain_id();
        self.settle(
            intent_id,
            chain_id,
            None,
            ExecutionOutcome::Failed {
                reason: "deadline passed".to_string(),
            },
            now,
        )
    }

    /// Lock `attached` for a remote intent. The caller is the depositor.
    pub fn lock_cross_chain_escrow(
        &mut self,
        caller: Address,
        deposit: CrossChainDeposit,
        attached: Amount,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_settler(caller)?;
        let address = self.address();
        self.escrow.create_cross_chain_escrow(
            address,
            caller,
            deposit.correlation_id,
            deposit.beneficiary,
            deposit.token,
            deposit.amount,
            deposit.intent_id,
            deposit.src_chain_id,
            attached,
            now,
        )?;
        info!(
            correlation_id = %deposit.correlation_id,
            intent_id = deposit.intent_id,
            src_chain_id = deposit.src_chain_id,
            "cross-chain escrow locked"
        );
        Ok(())
    }

    /// Pay a cross-chain escrow to its beneficiary. Fails with
    /// `SourceChainMismatch`, leaving the escrow locked, unless
    /// `src_chain_id` is the chain it was locked for.
    pub fn release_cross_chain_escrow(
        &mut self,
        caller: Address,
        correlation_id: CorrelationId,
        intent_id: IntentId,
        src_chain_id: ChainId,
        beneficiary: Address,
    ) -> Result<Payout> {
        self.ensure_settler(caller)?;
        let address = self.address();
        let payout = self.escrow.release_cross_chain_escrow(
            address,
            correlation_id,
            intent_id,
            src_chain_id,
            beneficiary,
        )?;
        info!(correlation_id = %correlation_id, intent_id, src_chain_id, "cross-chain escrow released");
        Ok(payout)
    }

    pub fn refund_cross_chain_escrow(
        &mut self,
        caller: Address,
        correlation_id: CorrelationId,
    ) -> Result<Payout> {
        self.ensure_settler(caller)?;
        let address = self.address();
        let payout = self.escrow.refund_cross_chain_escrow(address, correlation_id)?;
        info!(correlation_id = %correlation_id, to = %payout.to, "cross-chain escrow refunded");
        Ok(payout)
    }

    /// Non-terminal intents past their deadline.
    pub fn expired_intents(&self, now: DateTime<Utc>) -> Vec<IntentId> {
        self.intents
            .values()
            .filter(|intent| !intent.status.is_terminal() && intent.is_expired(now))
            .map(|intent| intent.id)
            .collect()
    }

    fn settle_correlation(
        &mut self,
        correlation_id: &CorrelationId,
        src_chain_id: ChainId,
        outcome: ExecutionOutcome,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        let intent_id = self
            .intent_for_correlation(correlation_id)
            .ok_or(XIntentError::UnknownCorrelation(*correlation_id))?;
        let dispatch = self
            .intent(intent_id)?
            .cross_chain_ref(correlation_id)
            .cloned()
            .ok_or(XIntentError::UnknownCorrelation(*correlation_id))?;

        if dispatch.destination_chain != src_chain_id {
            return Err(XIntentError::SourceChainMismatch {
                expected: dispatch.destination_chain,
                presented: src_chain_id,
            });
        }
        if dispatch.action != DispatchAction::Execute {
            return Err(XIntentError::wrong_phase(
                format!("dispatch {}", correlation_id),
                "execute",
                "announce",
            ));
        }
        self.settle(intent_id, src_chain_id, Some(*correlation_id), outcome, now)
    }

    /// Apply an outcome: release to the agent on success, refund the
    /// creator on failure.
    fn settle(
        &mut self,
        intent_id: IntentId,
        src_chain_id: ChainId,
        correlation_id: Option<CorrelationId>,
        outcome: ExecutionOutcome,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        let intent = self.intent(intent_id)?;
        intent.ensure_not_finalized()?;
        if outcome.is_success() {
            intent.ensure_status(IntentStatus::Executing)?;
        }
        let escrow_id = intent.escrow_id;
        let address = self.address();

        let payout = match &outcome {
            ExecutionOutcome::Succeeded { .. } => {
                let payout = self.escrow.release_escrow(address, escrow_id, src_chain_id)?;
                self.intent_mut(intent_id)?.complete()?;
                self.journal
                    .record(LedgerEvent::IntentCompleted { intent_id });
                payout
            }
            ExecutionOutcome::Failed { reason } => {
                let payout = self.escrow.refund_escrow(address, escrow_id, src_chain_id)?;
                self.intent_mut(intent_id)?.fail()?;
                self.journal.record(LedgerEvent::IntentFailed {
                    intent_id,
                    reason: reason.clone(),
                });
                payout
            }
        };
        self.journal.record(LedgerEvent::IntentSettled {
            intent_id,
            src_chain_id,
            success: outcome.is_success(),
        });

        let status = self.intent(intent_id)?.status;
        info!(intent_id, src_chain_id, %status, "intent settled");
        if let Some(correlation_id) = correlation_id {
            debug!(intent_id, correlation_id = %correlation_id, "settled by confirmation");
        }
        Ok(Settlement {
            intent_id,
            status,
            src_chain_id,
            correlation_id,
            outcome,
            payout,
            settled_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::tests::*;
    use chrono::Duration;
    use xintent_core::{Route, H256, UNIT};
    use xintent_ledger::EscrowStatus;

    const ORACLE: Address = Address::repeat_byte(0x0e);
    const TOKEN: Address = Address::ZERO;

    /// Chains 1 and 2, peered on both transports.
    fn linked() -> (ChainState, ChainState) {
        let mut one = chain(1);
        let mut two = chain(2);
        one.relay_mut().set_peer(ADMIN, 30_102, 2, contract(2)).unwrap();
        two.relay_mut().set_peer(ADMIN, 30_101, 1, contract(1)).unwrap();
        one.relay_mut().add_chain_selector(ADMIN, 1_002, 2, Some(contract(2))).unwrap();
        two.relay_mut().add_chain_selector(ADMIN, 1_001, 1, Some(contract(1))).unwrap();
        one.grant_role(ADMIN, Role::Oracle, ORACLE).unwrap();
        (one, two)
    }

    fn fresh_price() -> Option<Result<PriceReading>> {
        Some(Ok(PriceReading {
            price: 100_000_000,
            decimals: 8,
            updated_at: now(),
        }))
    }

    /// Intent 0 on chain 1 in Executing with an Execute dispatched to chain 2.
    fn executing(one: &mut ChainState, route: Route) -> (IntentId, Envelope) {
        let agent_id = one
            .registry_mut()
            .register_agent(AGENT_OWNER, "agent.eth", "yield-farming", 10 * UNIT, now())
            .unwrap();
        let intent_id = one
            .create_intent(USER, draft("Get 5% yield on stablecoins"), UNIT, now())
            .unwrap();
        one.start_bidding(USER, intent_id).unwrap();
        let pid = one
            .submit_proposal(AGENT_OWNER, proposal(intent_id, agent_id), now())
            .unwrap();
        one.select_agent(USER, intent_id, pid).unwrap();

        one.dispatch(USER, intent_id, &route, &SendOptions::default(), UNIT, now())
            .unwrap();
        let mut outbox = one.relay_mut().drain_outbox();
        assert_eq!(outbox.len(), 1);
        (intent_id, outbox.remove(0))
    }

    fn escrow_status(chain: &ChainState, intent_id: IntentId) -> EscrowStatus {
        let escrow_id = chain.intent(intent_id).unwrap().escrow_id;
        chain.escrow().get_escrow(escrow_id).unwrap().status
    }

    #[test]
    fn test_end_to_end_settlement() {
        let (mut one, mut two) = linked();
        let (intent_id, request) = executing(&mut one, Route::GenericEndpoint { dst_eid: 30_102 });
        assert_eq!(request.destination_chain, 2);

        let outcome = two.handle_inbound(&request, fresh_price(), now()).unwrap();
        let report_ref = match outcome {
            InboundOutcome::Executed { report, report_ref, .. } => {
                assert_eq!(content_id(&report), report_ref);
                report_ref
            }
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(two.proxy().swaps().count(), 1);

        let confirmation = two.relay_mut().drain_outbox().remove(0);
        assert_eq!(confirmation.correlation_id, request.correlation_id);
        let settled = one.handle_inbound(&confirmation, None, now()).unwrap();
        match settled {
            InboundOutcome::Settled(settlement) => {
                assert_eq!(settlement.src_chain_id, 2);
                assert_eq!(settlement.payout.to, AGENT_OWNER);
                assert_eq!(settlement.payout.amount, UNIT);
                assert_eq!(
                    settlement.outcome,
                    ExecutionOutcome::Succeeded { result_ref: report_ref }
                );
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        assert_eq!(one.intent(intent_id).unwrap().status, IntentStatus::Completed);
        assert_eq!(escrow_status(&one, intent_id), EscrowStatus::Released);
        assert_eq!(one.escrow().balance_of(AGENT_OWNER, TOKEN), UNIT);
        let agent = one.registry().get_agent(1).unwrap();
        assert_eq!(agent.reputation, 1000);
        assert_eq!(agent.slash_count, 0);

        let escrow_id = one.intent(intent_id).unwrap().escrow_id;
        let events = one.drain_events();
        assert!(events.contains(&LedgerEvent::EscrowReleased {
            escrow_id,
            intent_id,
            src_chain_id: 2,
            beneficiary: AGENT_OWNER,
            amount: UNIT,
        }));
        assert!(events.contains(&LedgerEvent::IntentSettled {
            intent_id,
            src_chain_id: 2,
            success: true,
        }));
    }

    #[test]
    fn test_out_of_range_staleness_leaves_execution_working() {
        let (mut one, mut two) = linked();
        let (_, request) = executing(&mut one, Route::GenericEndpoint { dst_eid: 30_102 });

        assert!(matches!(
            two.proxy_mut().set_price_staleness_threshold(ADMIN, TOKEN, i64::MAX),
            Err(XIntentError::InvalidParameter(_))
        ));
        assert!(matches!(
            two.handle_inbound(&request, fresh_price(), now()).unwrap(),
            InboundOutcome::Executed { .. }
        ));
    }

    #[test]
    fn test_redelivery_settles_once() {
        let (mut one, mut two) = linked();
        let (intent_id, request) = executing(&mut one, Route::ChainSelector { dest_selector: 1_002 });

        two.handle_inbound(&request, fresh_price(), now()).unwrap();
        assert_eq!(
            two.handle_inbound(&request, fresh_price(), now()).unwrap(),
            InboundOutcome::Duplicate
        );
        assert_eq!(two.proxy().swaps().count(), 1);
        let replies = two.relay_mut().drain_outbox();
        assert_eq!(replies.len(), 1);

        let confirmation = &replies[0];
        assert!(matches!(
            one.handle_inbound(confirmation, None, now()).unwrap(),
            InboundOutcome::Settled(_)
        ));
        one.drain_events();
        assert_eq!(
            one.handle_inbound(confirmation, None, now()).unwrap(),
            InboundOutcome::Duplicate
        );
        assert!(one.drain_events().is_empty());
        assert_eq!(one.escrow().balance_of(AGENT_OWNER, TOKEN), UNIT);
        assert_eq!(one.intent(intent_id).unwrap().status, IntentStatus::Completed);
    }

    #[test]
    fn test_stale_price_confirms_failure_and_refunds() {
        let (mut one, mut two) = linked();
        let (intent_id, request) = executing(&mut one, Route::GenericEndpoint { dst_eid: 30_102 });

        let stale = Some(Ok(PriceReading {
            price: 100_000_000,
            decimals: 8,
            updated_at: now() - Duration::hours(2),
        }));
        assert!(matches!(
            two.handle_inbound(&request, stale, now()).unwrap(),
            InboundOutcome::ExecutionRefused { .. }
        ));
        assert_eq!(two.proxy().swaps().count(), 0);

        let confirmation = two.relay_mut().drain_outbox().remove(0);
        one.handle_inbound(&confirmation, None, now()).unwrap();
        assert_eq!(one.intent(intent_id).unwrap().status, IntentStatus::Failed);
        assert_eq!(escrow_status(&one, intent_id), EscrowStatus::Refunded);
        assert_eq!(one.escrow().balance_of(USER, TOKEN), UNIT);
    }

    #[test]
    fn test_oracle_push_then_reconfirmation_rejected() {
        let (mut one, _) = linked();
        let (intent_id, request) = executing(&mut one, Route::GenericEndpoint { dst_eid: 30_102 });
        let ok = ExecutionOutcome::Succeeded {
            result_ref: H256::repeat_byte(3),
        };

        assert!(matches!(
            one.push_confirmation(USER, request.correlation_id, ok.clone(), now()),
            Err(XIntentError::Unauthorized { .. })
        ));
        let settlement = one
            .push_confirmation(ORACLE, request.correlation_id, ok.clone(), now())
            .unwrap();
        assert_eq!(settlement.src_chain_id, 2);

        assert_eq!(
            one.push_confirmation(EXECUTOR, request.correlation_id, ok, now()),
            Err(XIntentError::AlreadyFinalized {
                intent_id,
                status: IntentStatus::Completed
            })
        );
        assert_eq!(one.escrow().balance_of(AGENT_OWNER, TOKEN), UNIT);
    }

    #[test]
    fn test_settlement_loses_race_to_cancel() {
        let (mut one, mut two) = linked();
        let (intent_id, request) = executing(&mut one, Route::GenericEndpoint { dst_eid: 30_102 });
        two.handle_inbound(&request, fresh_price(), now()).unwrap();
        let confirmation = two.relay_mut().drain_outbox().remove(0);

        one.cancel_intent(USER, intent_id).unwrap();
        one.drain_events();

        assert!(matches!(
            one.handle_inbound(&confirmation, None, now()),
            Err(XIntentError::AlreadyFinalized { .. })
        ));
        assert!(!one.relay().is_consumed(&confirmation.correlation_id));
        assert!(one.drain_events().is_empty());
        assert_eq!(one.intent(intent_id).unwrap().status, IntentStatus::Cancelled);
        assert_eq!(escrow_status(&one, intent_id), EscrowStatus::Refunded);
        assert_eq!(one.escrow().balance_of(AGENT_OWNER, TOKEN), 0);
    }

    #[test]
    fn test_confirmation_from_wrong_chain() {
        let (mut one, mut two) = linked();
        let mut three = chain(3);
        three.relay_mut().set_peer(ADMIN, 30_101, 1, contract(1)).unwrap();
        one.relay_mut().set_peer(ADMIN, 30_103, 3, contract(3)).unwrap();

        let (intent_id, request) = executing(&mut one, Route::GenericEndpoint { dst_eid: 30_102 });
        two.handle_inbound(&request, fresh_price(), now()).unwrap();

        // Chain 3 answers a correlation id it was never sent.
        let forged = Envelope {
            correlation_id: request.correlation_id,
            source_chain: 3,
            destination_chain: 1,
            sender: contract(3),
            meta: xintent_core::TransportMeta::GenericEndpoint {
                src_eid: 30_103,
                dst_eid: 30_101,
            },
            payload: MessagePayload::new(
                intent_id,
                MessageAction::Confirm(ExecutionOutcome::Succeeded {
                    result_ref: H256::ZERO,
                }),
            )
            .encode(),
        };
        assert_eq!(
            one.handle_inbound(&forged, None, now()),
            Err(XIntentError::SourceChainMismatch {
                expected: 2,
                presented: 3
            })
        );
        assert_eq!(escrow_status(&one, intent_id), EscrowStatus::Locked);
    }

    #[test]
    fn test_announce_is_recorded_but_cannot_settle() {
        let (mut one, mut two) = linked();
        let intent_id = one
            .create_intent(USER, draft("Execute cross-chain swap"), UNIT, now())
            .unwrap();
        one.start_bidding(USER, intent_id).unwrap();
        one.dispatch(
            USER,
            intent_id,
            &Route::GenericEndpoint { dst_eid: 30_102 },
            &SendOptions::default(),
            UNIT,
            now(),
        )
        .unwrap();
        let announce = one.relay_mut().drain_outbox().remove(0);

        match two.handle_inbound(&announce, None, now()).unwrap() {
            InboundOutcome::Announced(a) => {
                assert_eq!(a.source_chain, 1);
                assert_eq!(a.spec, "Execute cross-chain swap");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(two.announcements().len(), 1);

        let err = one
            .push_confirmation(
                EXECUTOR,
                announce.correlation_id,
                ExecutionOutcome::Failed {
                    reason: "n/a".to_string(),
                },
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, XIntentError::WrongPhase { .. }));
        assert_eq!(one.intent(intent_id).unwrap().status, IntentStatus::Bidding);
    }

    #[test]
    fn test_unknown_correlation() {
        let (mut one, _) = linked();
        let unknown = H256::repeat_byte(0x42);
        assert_eq!(
            one.push_confirmation(
                ORACLE,
                unknown,
                ExecutionOutcome::Failed {
                    reason: "x".to_string()
                },
                now()
            ),
            Err(XIntentError::UnknownCorrelation(unknown))
        );
    }

    fn deposit(correlation_id: CorrelationId) -> CrossChainDeposit {
        CrossChainDeposit {
            correlation_id,
            beneficiary: AGENT_OWNER,
            token: TOKEN,
            amount: UNIT,
            intent_id: 7,
            src_chain_id: 2,
        }
    }

    #[test]
    fn test_cross_chain_escrow_release_checks_source_chain() {
        let (mut one, _) = linked();
        let correlation = H256::repeat_byte(0x5c);

        assert!(matches!(
            one.lock_cross_chain_escrow(USER, deposit(correlation), UNIT, now()),
            Err(XIntentError::Unauthorized { .. })
        ));
        assert_eq!(
            one.lock_cross_chain_escrow(EXECUTOR, deposit(correlation), UNIT - 1, now()),
            Err(XIntentError::AmountMismatch {
                declared: UNIT,
                attached: UNIT - 1
            })
        );
        one.lock_cross_chain_escrow(EXECUTOR, deposit(correlation), UNIT, now())
            .unwrap();
        one.drain_events();

        assert_eq!(
            one.release_cross_chain_escrow(ORACLE, correlation, 7, 3, AGENT_OWNER),
            Err(XIntentError::SourceChainMismatch {
                expected: 2,
                presented: 3
            })
        );
        assert_eq!(
            one.escrow().get_cross_chain_escrow(&correlation).unwrap().status,
            EscrowStatus::Locked
        );
        assert!(one.drain_events().is_empty());

        let payout = one
            .release_cross_chain_escrow(ORACLE, correlation, 7, 2, AGENT_OWNER)
            .unwrap();
        assert_eq!(payout.to, AGENT_OWNER);
        assert_eq!(one.escrow().balance_of(AGENT_OWNER, TOKEN), UNIT);
        assert!(one
            .drain_events()
            .contains(&LedgerEvent::CrossChainEscrowReleased {
                intent_id: 7,
                src_chain_id: 2,
                correlation_id: correlation,
                beneficiary: AGENT_OWNER,
                amount: UNIT,
            }));
        assert!(matches!(
            one.refund_cross_chain_escrow(EXECUTOR, correlation),
            Err(XIntentError::WrongPhase { .. })
        ));
    }

    #[test]
    fn test_cross_chain_escrow_refunds_depositor() {
        let (mut one, _) = linked();
        let correlation = H256::repeat_byte(0x5d);
        one.lock_cross_chain_escrow(EXECUTOR, deposit(correlation), UNIT, now())
            .unwrap();

        assert!(matches!(
            one.refund_cross_chain_escrow(USER, correlation),
            Err(XIntentError::Unauthorized { .. })
        ));
        let payout = one.refund_cross_chain_escrow(ORACLE, correlation).unwrap();
        assert_eq!(payout.to, EXECUTOR);
        assert_eq!(one.escrow().balance_of(EXECUTOR, TOKEN), UNIT);
        assert_eq!(
            one.escrow().get_cross_chain_escrow(&correlation).unwrap().status,
            EscrowStatus::Refunded
        );
    }

    #[test]
    fn test_expiry() {
        let (mut chain, intent_id, _) = bidding_chain(1);
        chain.grant_role(ADMIN, Role::Oracle, ORACLE).unwrap();

        assert_eq!(
            chain.expire_intent(EXECUTOR, intent_id, now()),
            Err(XIntentError::DeadlineNotReached { intent_id })
        );
        let later = now() + Duration::days(2);
        assert_eq!(chain.expired_intents(later), vec![intent_id]);
        assert!(matches!(
            chain.expire_intent(USER, intent_id, later),
            Err(XIntentError::Unauthorized { .. })
        ));

        let settlement = chain.expire_intent(ORACLE, intent_id, later).unwrap();
        assert_eq!(settlement.status, IntentStatus::Failed);
        assert_eq!(settlement.payout.to, USER);
        assert_eq!(escrow_status(&chain, intent_id), EscrowStatus::Refunded);
        assert!(chain.expired_intents(later).is_empty());

        assert!(matches!(
            chain.expire_intent(ORACLE, intent_id, later),
            Err(XIntentError::AlreadyFinalized { .. })
        ));
        assert!(matches!(
            chain.cancel_intent(USER, intent_id),
            Err(XIntentError::AlreadyFinalized { .. })
        ));
    }

    #[test]
    fn test_local_execution() {
        let (mut chain, intent_id, agent_id) = bidding_chain(1);
        let pid = chain
            .submit_proposal(AGENT_OWNER, proposal(intent_id, agent_id), now())
            .unwrap();
        let ok = ExecutionOutcome::Succeeded {
            result_ref: H256::repeat_byte(7),
        };

        // Not yet executing.
        let other = chain.create_intent(USER, draft("x"), UNIT, now()).unwrap();
        assert!(matches!(
            chain.confirm_local_execution(EXECUTOR, other, ok.clone(), now()),
            Err(XIntentError::WrongPhase { .. })
        ));

        chain.select_agent(USER, intent_id, pid).unwrap();
        let settlement = chain
            .confirm_local_execution(EXECUTOR, intent_id, ok, now())
            .unwrap();
        assert_eq!(settlement.src_chain_id, 1);
        assert_eq!(settlement.correlation_id, None);
        assert_eq!(chain.intent(intent_id).unwrap().status, IntentStatus::Completed);
    }
}
