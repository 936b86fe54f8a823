//! Error types for the remittance escrow
//!
//! Every variant describes a rejected operation. The engine never leaves
//! partial state behind: when an operation returns one of these errors the
//! deposit records, fee balances and host custody are exactly as they were
//! before the call.

use crate::custody::TransferError;
use crate::models::{Amount, Commitment, LogicalTime};
use thiserror::Error;

/// Main error type for escrow operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    /// Deposited gross value does not exceed the per-deposit fee
    #[error("Insufficient amount: deposit of {gross} does not exceed fee {fee}")]
    InsufficientAmount { gross: Amount, fee: Amount },

    /// Commitment already references a deposit record
    #[error("Duplicate commitment: {0}")]
    DuplicateCommitment(Commitment),

    /// No active deposit exists for the commitment (never existed or already consumed)
    #[error("Unknown commitment")]
    UnknownCommitment,

    /// Withdrawal attempted at or after the deadline
    #[error("Deposit expired at {expiry} (now {now})")]
    Expired { now: LogicalTime, expiry: LogicalTime },

    /// Refund attempted before the deadline
    #[error("Deposit does not expire until {expiry} (now {now})")]
    NotExpired { now: LogicalTime, expiry: LogicalTime },

    /// Refund attempted by someone other than the original depositor
    #[error("Caller is not the depositor")]
    NotDepositor,

    /// Fee withdrawal attempted with a zero balance
    #[error("No fee due")]
    NoFeeDue,

    /// Fee withdrawal attempted by someone other than the operator
    #[error("Caller is not the operator")]
    NotOperator,

    /// Expiry offset is zero or overflows the logical clock
    #[error("Invalid expiry: {0}")]
    InvalidExpiry(String),

    /// Balance arithmetic would overflow
    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    /// Host ledger refused the value transfer
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EscrowError {
    /// Create an invalid expiry error
    pub fn invalid_expiry<S: Into<String>>(msg: S) -> Self {
        Self::InvalidExpiry(msg.into())
    }

    /// Create an arithmetic overflow error
    pub fn overflow<S: Into<String>>(msg: S) -> Self {
        Self::ArithmeticOverflow(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

impl From<serde_json::Error> for EscrowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for EscrowError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
