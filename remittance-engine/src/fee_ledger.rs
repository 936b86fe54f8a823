//! Fee Ledger - operator fee accrual and withdrawal
//!
//! Every successful deposit credits the fixed fee to the single operator
//! account. Only the operator can drain it, and only all at once.

use crate::{
    error::EscrowError,
    models::{Amount, FeeAccount, Identity},
    EscrowResult,
};
use tracing::debug;

pub struct FeeLedger {
    account: FeeAccount,
}

impl FeeLedger {
    pub fn new(operator: Identity) -> Self {
        Self {
            account: FeeAccount::new(operator),
        }
    }

    pub fn operator(&self) -> Identity {
        self.account.owner
    }

    /// Accrued fee for `owner`; zero for anyone but the operator
    pub fn balance_of(&self, owner: &Identity) -> Amount {
        if *owner == self.account.owner {
            self.account.accrued_fee
        } else {
            0
        }
    }

    /// Reject a credit that would overflow, without applying it
    pub fn check_credit(&self, amount: Amount) -> EscrowResult<()> {
        self.account
            .accrued_fee
            .checked_add(amount)
            .map(|_| ())
            .ok_or_else(|| EscrowError::overflow("accrued fee"))
    }

    /// Credit a deposit fee to the operator account
    pub fn credit_fee(&mut self, owner: &Identity, amount: Amount) -> EscrowResult<()> {
        if *owner != self.account.owner {
            return Err(EscrowError::NotOperator);
        }
        self.check_credit(amount)?;
        self.accrue(amount);
        Ok(())
    }

    /// Credit the operator after `check_credit` has passed
    pub(crate) fn accrue(&mut self, amount: Amount) {
        self.account.accrued_fee = self.account.accrued_fee.saturating_add(amount);
        debug!(operator = %self.account.owner, fee = %amount, accrued = %self.account.accrued_fee, "fee credited");
    }

    /// Zero the operator's balance and return what was accrued
    pub fn withdraw_fee(&mut self, caller: &Identity) -> EscrowResult<Amount> {
        if *caller != self.account.owner {
            return Err(EscrowError::NotOperator);
        }
        if self.account.accrued_fee == 0 {
            return Err(EscrowError::NoFeeDue);
        }
        Ok(std::mem::take(&mut self.account.accrued_fee))
    }

    /// Put back a withdrawn amount whose payout failed
    pub(crate) fn restore(&mut self, amount: Amount) {
        self.account.accrued_fee = self.account.accrued_fee.saturating_add(amount);
    }
}
