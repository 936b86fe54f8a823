//! Trust-minimized remittance escrow engine
//!
//! A depositor locks funds against a commitment binding a recipient
//! identity to a shared secret. The recipient claims them by revealing the
//! secret before expiry; afterwards only the depositor can reclaim them. The
//! operator keeps a fixed fee from every deposit.
//!
//! - [`commitment`] derives commitments from identity and secret
//! - [`escrow_ledger`] owns deposit records and their state machine
//! - [`fee_ledger`] accrues operator fees
//! - [`verifier`] authorizes withdrawals by preimage
//! - [`expiry`] decides who may act on a deposit at a given time
//! - [`engine`] ties them to a host ledger's value transfers
//! - [`service`] serializes concurrent callers onto one engine

pub mod commitment;
pub mod config;
pub mod custody;
pub mod engine;
pub mod error;
pub mod escrow_ledger;
pub mod events;
pub mod expiry;
pub mod fee_ledger;
pub mod models;
pub mod service;
pub mod telemetry;
pub mod verifier;

pub use crate::config::EngineConfig;
pub use engine::{CallContext, RemittanceEngine, Solvency};
pub use error::EscrowError;
pub use events::{EscrowEvent, Receipt};
pub use models::{Amount, Commitment, DepositState, DepositView, Identity, LogicalTime, Secret};
pub use service::EscrowService;

/// Result type alias for escrow operations
pub type EscrowResult<T> = Result<T, EscrowError>;
