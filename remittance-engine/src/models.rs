//! Core data models for the remittance escrow
//!
//! Identities, secrets, commitments, logical time and the deposit record
//! state machine shared by every component.

use crate::{EscrowError, EscrowResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Value in the host ledger's smallest unit
pub type Amount = u128;

/// Byte length of an account identity
pub const IDENTITY_LEN: usize = 20;

/// Byte length of a commitment digest
pub const COMMITMENT_LEN: usize = 32;

/// Errors parsing hex-encoded identities and commitments
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing 0x prefix")]
    MissingPrefix,

    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseError> {
    let digits = s.strip_prefix("0x").ok_or(ParseError::MissingPrefix)?;
    let bytes = hex::decode(digits).map_err(|e| ParseError::Hex(e.to_string()))?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| ParseError::Length {
        expected: N,
        actual,
    })
}

/// Authenticated account identity as supplied by the host ledger
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity([u8; IDENTITY_LEN]);

impl Identity {
    /// The all-zero identity, reported for deposits that never existed
    pub const ZERO: Identity = Identity([0u8; IDENTITY_LEN]);

    pub const fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}

impl FromStr for Identity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<IDENTITY_LEN>(s).map(Self)
    }
}

impl TryFrom<String> for Identity {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.to_string()
    }
}

/// Shared secret known to the depositor and the intended recipient.
///
/// Opaque bytes; never logged and wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(Vec<u8>);

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        bool::from(self.0.as_slice().ct_eq(other.0.as_slice()))
    }
}

impl Eq for Secret {}

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl From<&[u8]> for Secret {
    fn from(value: &[u8]) -> Self {
        Self::new(value)
    }
}

impl From<Vec<u8>> for Secret {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

/// Digest binding a recipient identity to a secret; the escrow lookup key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Commitment([u8; COMMITMENT_LEN]);

impl Commitment {
    pub const fn from_bytes(bytes: [u8; COMMITMENT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; COMMITMENT_LEN] {
        &self.0
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({self})")
    }
}

impl FromStr for Commitment {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<COMMITMENT_LEN>(s).map(Self)
    }
}

impl TryFrom<String> for Commitment {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Commitment> for String {
    fn from(commitment: Commitment) -> Self {
        commitment.to_string()
    }
}

/// Monotonic logical time (block height or host clock) supplied per call
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LogicalTime(pub u64);

impl LogicalTime {
    pub const ZERO: LogicalTime = LogicalTime(0);

    /// Absolute deadline `offset` ticks after `self`
    pub fn checked_add(self, offset: u64) -> Option<LogicalTime> {
        self.0.checked_add(offset).map(LogicalTime)
    }
}

impl fmt::Display for LogicalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deposit state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositState {
    /// Funds held, claimable by the recipient until expiry
    Active,
    /// Funds released to the recipient
    Withdrawn,
    /// Funds returned to the depositor after expiry
    Refunded,
}

impl DepositState {
    /// Check if this is a terminal state (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Withdrawn | Self::Refunded)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// A single escrowed deposit, keyed by its commitment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub commitment: Commitment,
    pub depositor: Identity,
    pub net_amount: Amount,
    pub expiry: LogicalTime,
    pub state: DepositState,
}

impl DepositRecord {
    /// Create a new active deposit
    pub fn new(
        commitment: Commitment,
        depositor: Identity,
        net_amount: Amount,
        expiry: LogicalTime,
    ) -> Self {
        Self {
            commitment,
            depositor,
            net_amount,
            expiry,
            state: DepositState::Active,
        }
    }

    /// Validate a state transition.
    ///
    /// Only `Active -> Withdrawn` and `Active -> Refunded` are accepted.
    /// Anything leaving a terminal state is reported the same way as a
    /// missing record, so a consumed commitment is indistinguishable from
    /// one that never existed.
    pub fn validate_transition(&self, to_state: DepositState) -> EscrowResult<()> {
        match (self.state, to_state) {
            (DepositState::Active, DepositState::Withdrawn)
            | (DepositState::Active, DepositState::Refunded) => Ok(()),
            _ => Err(EscrowError::UnknownCommitment),
        }
    }

    /// Move to a terminal state, zeroing the balance. Returns the released amount.
    pub(crate) fn close(&mut self, to_state: DepositState) -> EscrowResult<Amount> {
        self.validate_transition(to_state)?;
        let amount = self.net_amount;
        self.net_amount = 0;
        self.state = to_state;
        Ok(amount)
    }
}

/// Read-only projection of a deposit: `(depositor, expiry, net_amount)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DepositView {
    pub depositor: Identity,
    pub expiry: LogicalTime,
    pub net_amount: Amount,
}

impl From<&DepositRecord> for DepositView {
    fn from(record: &DepositRecord) -> Self {
        Self {
            depositor: record.depositor,
            expiry: record.expiry,
            net_amount: record.net_amount,
        }
    }
}

/// Fees accrued by the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeAccount {
    pub owner: Identity,
    pub accrued_fee: Amount,
}

impl FeeAccount {
    pub fn new(owner: Identity) -> Self {
        Self {
            owner,
            accrued_fee: 0,
        }
    }
}
