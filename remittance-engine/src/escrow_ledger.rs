//! Escrow Ledger - deposit records and their state transitions
//!
//! The ledger owns every [`DepositRecord`], keyed by commitment. Records are
//! never removed: a withdrawn or refunded commitment stays resolvable as a
//! terminal, zero-value record so it can never be replayed.
//!
//! Releasing funds is split in two phases. `settle_withdrawal` and
//! `settle_refund` mutate the record first (terminal state, zero balance)
//! and hand back a [`Release`] describing the payout. The caller then moves
//! the value on the host ledger. Any call that reaches the ledger between
//! the two phases, including one triggered by the payout itself, already
//! sees the terminal record.

use crate::{
    commitment::commit,
    error::EscrowError,
    expiry::ExpiryPolicy,
    models::{
        Amount, Commitment, DepositRecord, DepositState, DepositView, Identity, LogicalTime,
        Secret,
    },
    verifier::is_authorized,
    EscrowResult,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Payout owed after a record has been closed
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a release must be paid out or restored"]
pub struct Release {
    pub commitment: Commitment,
    pub beneficiary: Identity,
    pub amount: Amount,
    pub kind: DepositState,
    prior: DepositRecord,
}

#[derive(Default)]
pub struct EscrowLedger {
    records: HashMap<Commitment, DepositRecord>,
}

impl EscrowLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a deposit and build its record without storing it.
    pub fn prepare_deposit(
        &self,
        commitment: Commitment,
        depositor: Identity,
        gross_amount: Amount,
        fee: Amount,
        expiry_offset: u64,
        now: LogicalTime,
    ) -> EscrowResult<DepositRecord> {
        if gross_amount <= fee {
            return Err(EscrowError::InsufficientAmount {
                gross: gross_amount,
                fee,
            });
        }

        if expiry_offset == 0 {
            return Err(EscrowError::invalid_expiry("expiry offset must be positive"));
        }

        let expiry = now.checked_add(expiry_offset).ok_or_else(|| {
            EscrowError::invalid_expiry(format!("{now} + {expiry_offset} overflows"))
        })?;

        if self.records.contains_key(&commitment) {
            return Err(EscrowError::DuplicateCommitment(commitment));
        }

        Ok(DepositRecord::new(
            commitment,
            depositor,
            gross_amount - fee,
            expiry,
        ))
    }

    /// Store a prepared record. Returns the net amount escrowed.
    pub fn insert(&mut self, record: DepositRecord) -> EscrowResult<Amount> {
        if self.records.contains_key(&record.commitment) {
            return Err(EscrowError::DuplicateCommitment(record.commitment));
        }
        Ok(self.store(record))
    }

    /// Store a record already validated by `prepare_deposit`.
    pub(crate) fn store(&mut self, record: DepositRecord) -> Amount {
        info!(
            commitment = %record.commitment,
            depositor = %record.depositor,
            net_amount = %record.net_amount,
            expiry = %record.expiry,
            "deposit recorded"
        );

        let net = record.net_amount;
        self.records.insert(record.commitment, record);
        net
    }

    /// Validate and store a deposit in one step
    pub fn create_deposit(
        &mut self,
        commitment: Commitment,
        depositor: Identity,
        gross_amount: Amount,
        fee: Amount,
        expiry_offset: u64,
        now: LogicalTime,
    ) -> EscrowResult<Amount> {
        let record =
            self.prepare_deposit(commitment, depositor, gross_amount, fee, expiry_offset, now)?;
        self.insert(record)
    }

    /// Close the deposit opened by `(recipient, secret)` for withdrawal.
    pub fn settle_withdrawal(
        &mut self,
        recipient: &Identity,
        secret: &Secret,
        now: LogicalTime,
    ) -> EscrowResult<Release> {
        // Only the matching (recipient, secret) pair can name an existing record.
        let commitment = commit(recipient, secret);
        let record = self.active_record_mut(&commitment)?;

        if !ExpiryPolicy::can_withdraw(now, record.expiry) {
            warn!(commitment = %commitment, now = %now, expiry = %record.expiry, "withdrawal after expiry");
            return Err(EscrowError::Expired {
                now,
                expiry: record.expiry,
            });
        }

        let prior = record.clone();
        let amount = record.close(DepositState::Withdrawn)?;

        debug!(commitment = %commitment, recipient = %recipient, amount = %amount, "withdrawal settled");

        Ok(Release {
            commitment,
            beneficiary: *recipient,
            amount,
            kind: DepositState::Withdrawn,
            prior,
        })
    }

    /// Close an expired deposit for refund to its depositor.
    pub fn settle_refund(
        &mut self,
        caller: &Identity,
        commitment: &Commitment,
        now: LogicalTime,
    ) -> EscrowResult<Release> {
        let record = self.active_record_mut(commitment)?;

        if !ExpiryPolicy::can_refund(now, record.expiry) {
            return Err(EscrowError::NotExpired {
                now,
                expiry: record.expiry,
            });
        }

        if record.depositor != *caller {
            warn!(commitment = %commitment, caller = %caller, "refund by non-depositor");
            return Err(EscrowError::NotDepositor);
        }

        let prior = record.clone();
        let amount = record.close(DepositState::Refunded)?;

        debug!(commitment = %commitment, depositor = %caller, amount = %amount, "refund settled");

        Ok(Release {
            commitment: *commitment,
            beneficiary: *caller,
            amount,
            kind: DepositState::Refunded,
            prior,
        })
    }

    /// Undo a settlement whose payout could not be made
    pub fn restore(&mut self, release: Release) {
        warn!(commitment = %release.commitment, "restoring deposit after failed payout");
        self.records.insert(release.commitment, release.prior);
    }

    /// Whether `(identity, secret)` opens the active deposit stored under `commitment`
    pub fn authorizes(&self, commitment: &Commitment, identity: &Identity, secret: &Secret) -> bool {
        self.records.get(commitment).is_some_and(|record| {
            record.state.is_active() && is_authorized(identity, secret, &record.commitment)
        })
    }

    pub fn record(&self, commitment: &Commitment) -> Option<&DepositRecord> {
        self.records.get(commitment)
    }

    /// `(depositor, expiry, net_amount)`; all zero for unknown commitments
    pub fn view(&self, commitment: &Commitment) -> DepositView {
        self.records
            .get(commitment)
            .map(DepositView::from)
            .unwrap_or_default()
    }

    /// Sum of net amounts still owed to recipients or depositors
    pub fn active_liabilities(&self) -> Amount {
        self.records
            .values()
            .filter(|r| r.state.is_active())
            .map(|r| r.net_amount)
            .fold(0, Amount::saturating_add)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn active_record_mut(&mut self, commitment: &Commitment) -> EscrowResult<&mut DepositRecord> {
        match self.records.get_mut(commitment) {
            Some(record) if record.state.is_active() => Ok(record),
            _ => Err(EscrowError::UnknownCommitment),
        }
    }
}
