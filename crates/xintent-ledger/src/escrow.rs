//! Escrow ledger: per-chain custody of intent funds.
//!
//! Records come in two flavors. Local escrows are keyed by a sequential id
//! and back an intent created on this chain. Cross-chain escrows are keyed
//! by a correlation id and bound to the chain the funds originated from;
//! releasing one must present that same source chain.
//!
//! Every record moves exactly once from `Locked` to `Released` or
//! `Refunded`, and its amount never changes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use xintent_core::{
    Address, Amount, ChainId, CorrelationId, EscrowId, IntentId, Journal, LedgerEvent, Result,
    Token, XIntentError,
};

/// Lifecycle of an escrow record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    Locked,
    Released,
    Refunded,
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscrowStatus::Locked => f.write_str("locked"),
            EscrowStatus::Released => f.write_str("released"),
            EscrowStatus::Refunded => f.write_str("refunded"),
        }
    }
}

/// A local escrow backing one intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    pub id: EscrowId,
    /// Receives the funds on refund.
    pub depositor: Address,
    /// Receives the funds on release; assigned at most once.
    pub beneficiary: Option<Address>,
    pub token: Token,
    pub amount: Amount,
    pub intent_id: IntentId,
    pub status: EscrowStatus,
    pub created_at: DateTime<Utc>,
}

/// An escrow bound to a remote source chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossChainEscrow {
    pub correlation_id: CorrelationId,
    pub depositor: Address,
    pub beneficiary: Address,
    pub token: Token,
    pub amount: Amount,
    pub intent_id: IntentId,
    pub src_chain_id: ChainId,
    pub status: EscrowStatus,
    pub created_at: DateTime<Utc>,
}

/// Funds moved out of custody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub to: Address,
    pub token: Token,
    pub amount: Amount,
}

/// Custody ledger with an explicit releaser capability list.
#[derive(Debug)]
pub struct EscrowLedger {
    admin: Address,
    releasers: HashSet<Address>,
    next_id: EscrowId,
    local: BTreeMap<EscrowId, EscrowRecord>,
    cross_chain: HashMap<CorrelationId, CrossChainEscrow>,
    /// Paid-out balances per (account, token).
    balances: HashMap<(Address, Token), Amount>,
    journal: Journal,
}

impl EscrowLedger {
    pub fn new(admin: Address) -> Self {
        Self {
            admin,
            releasers: HashSet::new(),
            next_id: 0,
            local: BTreeMap::new(),
            cross_chain: HashMap::new(),
            balances: HashMap::new(),
            journal: Journal::new(),
        }
    }

    /// Ledger whose releaser list starts with `releasers`.
    pub fn with_releasers(admin: Address, releasers: impl IntoIterator<Item = Address>) -> Self {
        let mut ledger = Self::new(admin);
        ledger.releasers.extend(releasers);
        ledger
    }

    pub fn add_authorized_releaser(&mut self, caller: Address, releaser: Address) -> Result<()> {
        self.ensure_admin(caller)?;
        self.releasers.insert(releaser);
        Ok(())
    }

    pub fn remove_authorized_releaser(&mut self, caller: Address, releaser: Address) -> Result<()> {
        self.ensure_admin(caller)?;
        self.releasers.remove(&releaser);
        Ok(())
    }

    pub fn is_authorized_releaser(&self, account: Address) -> bool {
        self.releasers.contains(&account)
    }

    fn ensure_admin(&self, caller: Address) -> Result<()> {
        if caller != self.admin {
            return Err(XIntentError::unauthorized(caller, "escrow admin"));
        }
        Ok(())
    }

    fn ensure_releaser(&self, caller: Address) -> Result<()> {
        if !self.releasers.contains(&caller) {
            return Err(XIntentError::unauthorized(caller, "authorized releaser"));
        }
        Ok(())
    }

    /// Lock `attached` for `intent_id`. Zero-value escrows are rejected.
    pub fn create_escrow(
        &mut self,
        depositor: Address,
        beneficiary: Option<Address>,
        intent_id: IntentId,
        token: Token,
        attached: Amount,
        now: DateTime<Utc>,
    ) -> Result<EscrowId> {
        if attached == 0 {
            return Err(XIntentError::ZeroAmount);
        }

        let id = self.next_id;
        self.next_id += 1;
        self.local.insert(
            id,
            EscrowRecord {
                id,
                depositor,
                beneficiary,
                token,
                amount: attached,
                intent_id,
                status: EscrowStatus::Locked,
                created_at: now,
            },
        );
        self.journal.record(LedgerEvent::EscrowCreated {
            escrow_id: id,
            intent_id,
            amount: attached,
        });
        Ok(id)
    }

    /// Assign the recipient of a locked escrow that has none yet.
    pub fn assign_beneficiary(
        &mut self,
        caller: Address,
        id: EscrowId,
        beneficiary: Address,
    ) -> Result<()> {
        self.ensure_releaser(caller)?;
        let record = self
            .local
            .get_mut(&id)
            .ok_or_else(|| XIntentError::not_found("escrow", id))?;
        ensure_locked(&format!("escrow {}", id), record.status)?;
        if let Some(existing) = record.beneficiary {
            return Err(XIntentError::wrong_phase(
                format!("escrow {} beneficiary", id),
                "unassigned",
                existing,
            ));
        }
        record.beneficiary = Some(beneficiary);
        self.journal.record(LedgerEvent::BeneficiaryAssigned {
            escrow_id: id,
            beneficiary,
        });
        Ok(())
    }

    /// Pay a locked escrow to its beneficiary. `src_chain_id` names the
    /// chain whose confirmation settled it.
    pub fn release_escrow(
        &mut self,
        caller: Address,
        id: EscrowId,
        src_chain_id: ChainId,
    ) -> Result<Payout> {
        self.ensure_releaser(caller)?;
        let record = self
            .local
            .get_mut(&id)
            .ok_or_else(|| XIntentError::not_found("escrow", id))?;
        ensure_locked(&format!("escrow {}", id), record.status)?;
        let beneficiary = record.beneficiary.ok_or_else(|| {
            XIntentError::wrong_phase(format!("escrow {} beneficiary", id), "assigned", "unassigned")
        })?;

        record.status = EscrowStatus::Released;
        let payout = Payout {
            to: beneficiary,
            token: record.token,
            amount: record.amount,
        };
        self.journal.record(LedgerEvent::EscrowReleased {
            escrow_id: id,
            intent_id: record.intent_id,
            src_chain_id,
            beneficiary,
            amount: record.amount,
        });
        info!(escrow_id = id, to = %beneficiary, amount = record.amount, "escrow released");
        self.credit(&payout);
        Ok(payout)
    }

    /// Return a locked escrow to its depositor.
    pub fn refund_escrow(
        &mut self,
        caller: Address,
        id: EscrowId,
        src_chain_id: ChainId,
    ) -> Result<Payout> {
        self.ensure_releaser(caller)?;
        let record = self
            .local
            .get_mut(&id)
            .ok_or_else(|| XIntentError::not_found("escrow", id))?;
        ensure_locked(&format!("escrow {}", id), record.status)?;

        record.status = EscrowStatus::Refunded;
        let payout = Payout {
            to: record.depositor,
            token: record.token,
            amount: record.amount,
        };
        self.journal.record(LedgerEvent::EscrowRefunded {
            escrow_id: id,
            intent_id: record.intent_id,
            src_chain_id,
            depositor: record.depositor,
            amount: record.amount,
        });
        info!(escrow_id = id, to = %record.depositor, amount = record.amount, "escrow refunded");
        self.credit(&payout);
        Ok(payout)
    }

    /// Lock value that arrived for a remote intent. `depositor` receives
    /// the funds on refund.
    #[allow(clippy::too_many_arguments)]
    pub fn create_cross_chain_escrow(
        &mut self,
        caller: Address,
        depositor: Address,
        correlation_id: CorrelationId,
        beneficiary: Address,
        token: Token,
        amount: Amount,
        intent_id: IntentId,
        src_chain_id: ChainId,
        attached: Amount,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_releaser(caller)?;
        if amount == 0 {
            return Err(XIntentError::ZeroAmount);
        }
        if attached != amount {
            return Err(XIntentError::AmountMismatch {
                declared: amount,
                attached,
            });
        }
        if self.cross_chain.contains_key(&correlation_id) {
            return Err(XIntentError::InvalidParameter(format!(
                "cross-chain escrow {} already exists",
                correlation_id
            )));
        }

        self.cross_chain.insert(
            correlation_id,
            CrossChainEscrow {
                correlation_id,
                depositor,
                beneficiary,
                token,
                amount,
                intent_id,
                src_chain_id,
                status: EscrowStatus::Locked,
                created_at: now,
            },
        );
        self.journal.record(LedgerEvent::CrossChainEscrowCreated {
            correlation_id,
            intent_id,
            src_chain_id,
            amount,
        });
        Ok(())
    }

    /// Release a cross-chain escrow. The presented source chain, intent and
    /// beneficiary must all match the record.
    pub fn release_cross_chain_escrow(
        &mut self,
        caller: Address,
        correlation_id: CorrelationId,
        intent_id: IntentId,
        src_chain_id: ChainId,
        beneficiary: Address,
    ) -> Result<Payout> {
        self.ensure_releaser(caller)?;
        let record = self
            .cross_chain
            .get_mut(&correlation_id)
            .ok_or(XIntentError::UnknownCorrelation(correlation_id))?;
        ensure_locked(&format!("cross-chain escrow {}", correlation_id), record.status)?;
        if record.src_chain_id != src_chain_id {
            return Err(XIntentError::SourceChainMismatch {
                expected: record.src_chain_id,
                presented: src_chain_id,
            });
        }
        if record.intent_id != intent_id {
            return Err(XIntentError::InvalidParameter(format!(
                "escrow {} belongs to intent {}, not {}",
                correlation_id, record.intent_id, intent_id
            )));
        }
        if record.beneficiary != beneficiary {
            return Err(XIntentError::InvalidParameter(format!(
                "beneficiary {} does not match escrow {}",
                beneficiary, correlation_id
            )));
        }

        record.status = EscrowStatus::Released;
        let payout = Payout {
            to: beneficiary,
            token: record.token,
            amount: record.amount,
        };
        self.journal.record(LedgerEvent::CrossChainEscrowReleased {
            intent_id,
            src_chain_id,
            correlation_id,
            beneficiary,
            amount: record.amount,
        });
        self.credit(&payout);
        Ok(payout)
    }

    pub fn refund_cross_chain_escrow(
        &mut self,
        caller: Address,
        correlation_id: CorrelationId,
    ) -> Result<Payout> {
        self.ensure_releaser(caller)?;
        let record = self
            .cross_chain
            .get_mut(&correlation_id)
            .ok_or(XIntentError::UnknownCorrelation(correlation_id))?;
        ensure_locked(&format!("cross-chain escrow {}", correlation_id), record.status)?;

        record.status = EscrowStatus::Refunded;
        let payout = Payout {
            to: record.depositor,
            token: record.token,
            amount: record.amount,
        };
        self.journal.record(LedgerEvent::CrossChainEscrowRefunded {
            correlation_id,
            intent_id: record.intent_id,
            amount: record.amount,
        });
        self.credit(&payout);
        Ok(payout)
    }

    fn credit(&mut self, payout: &Payout) {
        let balance = self.balances.entry((payout.to, payout.token)).or_insert(0);
        *balance = balance.saturating_add(payout.amount);
    }

    pub fn get_escrow(&self, id: EscrowId) -> Option<&EscrowRecord> {
        self.local.get(&id)
    }

    pub fn get_cross_chain_escrow(&self, correlation_id: &CorrelationId) -> Option<&CrossChainEscrow> {
        self.cross_chain.get(correlation_id)
    }

    /// Total paid out to `account` in `token`.
    pub fn balance_of(&self, account: Address, token: Token) -> Amount {
        self.balances.get(&(account, token)).copied().unwrap_or(0)
    }

    /// Value currently held in locked records for `token`.
    pub fn locked_total(&self, token: Token) -> Amount {
        let local = self
            .local
            .values()
            .filter(|r| r.token == token && r.status == EscrowStatus::Locked)
            .map(|r| r.amount);
        let remote = self
            .cross_chain
            .values()
            .filter(|r| r.token == token && r.status == EscrowStatus::Locked)
            .map(|r| r.amount);
        local.chain(remote).sum()
    }

    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        self.journal.drain()
    }
}

fn ensure_locked(resource: &str, status: EscrowStatus) -> Result<()> {
    if status != EscrowStatus::Locked {
        return Err(XIntentError::wrong_phase(resource, EscrowStatus::Locked, status));
    }
    Ok(())
}
