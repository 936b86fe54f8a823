//! Host ledger custody - atomic value transfer between accounts and escrow
//!
//! The engine never holds value itself. It asks its host ledger to move
//! value between a caller's account and the escrow pool through the
//! [`ValueTransfer`] trait. A transfer either fully succeeds or fails without
//! effect. [`InMemoryLedger`] is a reference host used in tests and
//! simulations.

use crate::models::{Amount, Identity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Where value sits on the host ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Custody {
    /// An ordinary account owned by an identity
    Account(Identity),
    /// The pool held on behalf of the escrow engine
    Escrow,
}

/// Errors reported by the host ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: Amount, requested: Amount },

    #[error("balance overflow")]
    Overflow,

    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// Atomic value transfer offered by the host ledger
pub trait ValueTransfer {
    /// Move `amount` from `from` to `to`, all or nothing.
    fn transfer(&mut self, from: Custody, to: Custody, amount: Amount) -> Result<(), TransferError>;

    /// Value currently held in escrow custody
    fn escrow_balance(&self) -> Amount;
}

/// In-memory host ledger with per-account balances and one escrow pool
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    accounts: HashMap<Identity, Amount>,
    escrow: Amount,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account out of thin air (genesis allocation)
    pub fn mint(&mut self, to: Identity, amount: Amount) -> Result<(), TransferError> {
        let balance = self.accounts.entry(to).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(TransferError::Overflow)?;
        Ok(())
    }

    pub fn balance_of(&self, identity: &Identity) -> Amount {
        self.accounts.get(identity).copied().unwrap_or(0)
    }

    fn balance(&self, custody: Custody) -> Amount {
        match custody {
            Custody::Account(identity) => self.balance_of(&identity),
            Custody::Escrow => self.escrow,
        }
    }

    fn slot(&mut self, custody: Custody) -> &mut Amount {
        match custody {
            Custody::Account(identity) => self.accounts.entry(identity).or_insert(0),
            Custody::Escrow => &mut self.escrow,
        }
    }
}

impl ValueTransfer for InMemoryLedger {
    fn transfer(&mut self, from: Custody, to: Custody, amount: Amount) -> Result<(), TransferError> {
        let available = self.balance(from);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                available,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        // Check the credit side before touching either balance.
        let credited = self
            .balance(to)
            .checked_add(amount)
            .ok_or(TransferError::Overflow)?;

        *self.slot(from) = available - amount;
        *self.slot(to) = credited;

        debug!(?from, ?to, amount = %amount, "host transfer");
        Ok(())
    }

    fn escrow_balance(&self) -> Amount {
        self.escrow
    }
}
