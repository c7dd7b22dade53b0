//! Intent and proposal types.
//!
//! An Intent is a user's declared goal with escrowed funds and a deadline.
//! Its status only moves forward; `Cancelled` and `Failed` are reachable
//! from every non-terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::envelope::TransportKind;
use crate::error::{Result, XIntentError};
use crate::params::ProtocolParams;
use crate::types::{
    Address, AgentId, Amount, ChainId, ContentId, CorrelationId, EscrowId, IntentId, IntentStatus,
    ProposalId, Token,
};

/// What an outbound dispatch asked the destination to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchAction {
    /// Broadcast of an intent open for bidding.
    Announce,
    /// Request to execute the selected proposal.
    Execute,
}

/// Record of one outbound cross-chain dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossChainRef {
    pub correlation_id: CorrelationId,
    pub destination_chain: ChainId,
    pub transport: TransportKind,
    pub action: DispatchAction,
    pub dispatched_at: DateTime<Utc>,
}

/// A user-declared goal tracked on its origin chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub id: IntentId,
    pub creator: Address,
    /// Free-text or structured goal description.
    pub spec: String,
    /// Audit trail pointer in the content store.
    pub content_ref: ContentId,
    pub amount: Amount,
    pub token: Token,
    pub deadline: DateTime<Utc>,
    pub status: IntentStatus,
    pub selected_proposal_id: Option<ProposalId>,
    pub cross_chain_refs: Vec<CrossChainRef>,
    /// Local escrow holding `amount`.
    pub escrow_id: EscrowId,
    pub created_at: DateTime<Utc>,
    /// Settlement receipt written to the content store, when available.
    pub receipt_ref: Option<ContentId>,
}

/// Unvalidated input for creating an intent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentDraft {
    pub spec: String,
    pub content_ref: ContentId,
    pub deadline: Option<DateTime<Utc>>,
    pub token: Token,
}

/// Builder for [`IntentDraft`].
#[derive(Debug, Default)]
pub struct IntentBuilder {
    draft: IntentDraft,
}

impl IntentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the goal description.
    pub fn spec(mut self, spec: impl Into<String>) -> Self {
        self.draft.spec = spec.into();
        self
    }

    /// Set the content-store pointer.
    pub fn content_ref(mut self, content_ref: ContentId) -> Self {
        self.draft.content_ref = content_ref;
        self
    }

    /// Set the absolute deadline.
    pub fn deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.draft.deadline = Some(deadline);
        self
    }

    /// Set the escrowed token (defaults to native).
    pub fn token(mut self, token: Token) -> Self {
        self.draft.token = token;
        self
    }

    pub fn build(self) -> IntentDraft {
        self.draft
    }
}

impl IntentDraft {
    /// Validate in a fixed order: spec, then deadline, then amount.
    pub fn validate(&self, amount: Amount, now: DateTime<Utc>, params: &ProtocolParams) -> Result<()> {
        if self.spec.trim().is_empty() {
            return Err(XIntentError::EmptyIntentSpec);
        }

        let earliest = now
            .checked_add_signed(params.min_deadline_horizon()?)
            .ok_or_else(|| XIntentError::InvalidParameter("deadline horizon overflows".to_string()))?;
        match self.deadline {
            Some(deadline) if deadline >= earliest => {}
            other => {
                return Err(XIntentError::InvalidDeadline {
                    deadline: other.map_or(0, |d| d.timestamp()),
                    earliest: earliest.timestamp(),
                })
            }
        }

        if amount == 0 {
            return Err(XIntentError::ZeroAmount);
        }

        Ok(())
    }
}

impl Intent {
    /// Create a new IntentBuilder.
    pub fn builder() -> IntentBuilder {
        IntentBuilder::new()
    }

    fn resource(&self) -> String {
        format!("intent {}", self.id)
    }

    /// Returns true once `now` is past the deadline.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }

    pub fn ensure_creator(&self, caller: Address) -> Result<()> {
        if caller != self.creator {
            return Err(XIntentError::unauthorized(caller, "intent creator"));
        }
        Ok(())
    }

    pub fn ensure_status(&self, expected: IntentStatus) -> Result<()> {
        if self.status != expected {
            return Err(XIntentError::wrong_phase(self.resource(), expected, self.status));
        }
        Ok(())
    }

    pub fn ensure_not_finalized(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(XIntentError::AlreadyFinalized {
                intent_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    /// Created → Bidding.
    pub fn start_bidding(&mut self) -> Result<()> {
        self.ensure_status(IntentStatus::Created)?;
        self.status = IntentStatus::Bidding;
        Ok(())
    }

    /// Bidding → Executing, fixing the selected proposal.
    pub fn select(&mut self, proposal_id: ProposalId) -> Result<()> {
        self.ensure_status(IntentStatus::Bidding)?;
        if self.selected_proposal_id.is_some() {
            return Err(XIntentError::wrong_phase(self.resource(), "no selection", "selected"));
        }
        self.selected_proposal_id = Some(proposal_id);
        self.status = IntentStatus::Executing;
        Ok(())
    }

    /// Executing → Completed.
    pub fn complete(&mut self) -> Result<()> {
        self.ensure_not_finalized()?;
        self.ensure_status(IntentStatus::Executing)?;
        self.status = IntentStatus::Completed;
        Ok(())
    }

    /// Any non-terminal → Cancelled.
    pub fn cancel(&mut self) -> Result<()> {
        self.ensure_not_finalized()?;
        self.status = IntentStatus::Cancelled;
        Ok(())
    }

    /// Any non-terminal → Failed.
    pub fn fail(&mut self) -> Result<()> {
        self.ensure_not_finalized()?;
        self.status = IntentStatus::Failed;
        Ok(())
    }

    /// The reference recorded for `correlation_id`, if this intent owns it.
    pub fn cross_chain_ref(&self, correlation_id: &CorrelationId) -> Option<&CrossChainRef> {
        self.cross_chain_refs
            .iter()
            .find(|r| &r.correlation_id == correlation_id)
    }
}

/// An agent's bid to fulfil an intent. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub intent_id: IntentId,
    pub agent_id: AgentId,
    pub strategy: String,
    pub bid_fee: Amount,
    /// Expected return, e.g. an APY in percent.
    pub expected_return: u64,
    /// Estimated duration in seconds.
    pub estimated_duration_secs: u64,
    pub proof_ref: ContentId,
    pub submitted_by: Address,
    pub submitted_at: DateTime<Utc>,
}

/// Input for submitting a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub intent_id: IntentId,
    pub agent_id: AgentId,
    pub strategy: String,
    pub bid_fee: Amount,
    pub expected_return: u64,
    pub estimated_duration_secs: u64,
    pub proof_ref: ContentId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::H256;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn intent(status: IntentStatus) -> Intent {
        Intent {
            id: 0,
            creator: Address::repeat_byte(1),
            spec: "Get 5% yield on stablecoins".to_string(),
            content_ref: H256::repeat_byte(9),
            amount: 10,
            token: Address::ZERO,
            deadline: now() + Duration::days(1),
            status,
            selected_proposal_id: None,
            cross_chain_refs: Vec::new(),
            escrow_id: 0,
            created_at: now(),
            receipt_ref: None,
        }
    }

    #[test]
    fn test_validation_order() {
        let params = ProtocolParams::default();

        // Empty spec wins over a bad deadline and a zero amount.
        let draft = Intent::builder().spec("  ").deadline(now()).build();
        assert_eq!(draft.validate(0, now(), &params), Err(XIntentError::EmptyIntentSpec));

        // Deadline is checked before the amount.
        let draft = Intent::builder()
            .spec("swap")
            .deadline(now() + Duration::minutes(30))
            .build();
        assert!(matches!(
            draft.validate(0, now(), &params),
            Err(XIntentError::InvalidDeadline { .. })
        ));

        let draft = Intent::builder().spec("swap").build();
        assert!(matches!(
            draft.validate(5, now(), &params),
            Err(XIntentError::InvalidDeadline { deadline: 0, .. })
        ));

        let draft = Intent::builder()
            .spec("swap")
            .deadline(now() + Duration::hours(1))
            .build();
        assert_eq!(draft.validate(0, now(), &params), Err(XIntentError::ZeroAmount));
        assert!(draft.validate(1, now(), &params).is_ok());
    }

    #[test]
    fn test_forward_transitions() {
        let mut intent = intent(IntentStatus::Created);
        intent.start_bidding().unwrap();
        assert!(intent.start_bidding().is_err());

        intent.select(3).unwrap();
        assert_eq!(intent.status, IntentStatus::Executing);
        assert_eq!(intent.selected_proposal_id, Some(3));
        assert!(intent.select(4).is_err());
        assert_eq!(intent.selected_proposal_id, Some(3));

        intent.complete().unwrap();
        assert_eq!(
            intent.cancel(),
            Err(XIntentError::AlreadyFinalized {
                intent_id: 0,
                status: IntentStatus::Completed
            })
        );
    }

    #[test]
    fn test_complete_requires_executing() {
        let mut intent = intent(IntentStatus::Bidding);
        let err = intent.complete().unwrap_err();
        assert_eq!(
            err,
            XIntentError::wrong_phase("intent 0", IntentStatus::Executing, IntentStatus::Bidding)
        );
    }

    #[test]
    fn test_terminal_from_any_active_state() {
        for status in [IntentStatus::Created, IntentStatus::Bidding, IntentStatus::Executing] {
            let mut a = intent(status);
            a.cancel().unwrap();
            assert!(a.fail().is_err());

            let mut b = intent(status);
            b.fail().unwrap();
            assert!(b.cancel().is_err());
        }
    }

    #[test]
    fn test_expiry() {
        let intent = intent(IntentStatus::Bidding);
        assert!(!intent.is_expired(now()));
        assert!(intent.is_expired(now() + Duration::days(2)));
    }
}
