//! Escrow Service - serialized access to a shared engine
//!
//! Many tasks may submit operations at once; the service runs them one at a
//! time against a single [`RemittanceEngine`], the way a host ledger orders
//! transactions. Two concurrent withdrawals of one commitment are therefore
//! ordered, and the second always sees the terminal record left by the first.
//!
//! The service also keeps the audit trail of every event emitted.

use crate::{
    commitment::commit,
    custody::{InMemoryLedger, ValueTransfer},
    engine::{CallContext, RemittanceEngine, Solvency},
    events::{EscrowEvent, Receipt},
    models::{Amount, Commitment, DepositView, Identity, Secret},
    EscrowResult,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

struct ServiceState<H> {
    engine: RemittanceEngine<H>,
    audit: Vec<EscrowEvent>,
}

impl<H> ServiceState<H> {
    fn record(&mut self, receipt: Receipt<Amount>) -> Amount {
        for event in &receipt.events {
            debug!(topic = event.topic(), amount = %event.amount(), "event recorded");
        }
        self.audit.extend(receipt.events);
        receipt.value
    }
}

/// Cloneable handle to a serialized engine
pub struct EscrowService<H = InMemoryLedger> {
    state: Arc<Mutex<ServiceState<H>>>,
}

impl<H> Clone for EscrowService<H> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<H: ValueTransfer> EscrowService<H> {
    pub fn new(engine: RemittanceEngine<H>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServiceState {
                engine,
                audit: Vec::new(),
            })),
        }
    }

    /// Pure; needs no access to engine state
    pub fn generate_commitment(recipient: &Identity, secret: &Secret) -> Commitment {
        commit(recipient, secret)
    }

    pub async fn deposit(
        &self,
        ctx: CallContext,
        value: Amount,
        commitment: Commitment,
        expiry_offset: u64,
    ) -> EscrowResult<Amount> {
        let mut state = self.state.lock().await;
        let receipt = state
            .engine
            .deposit(&ctx, value, commitment, expiry_offset)?;
        Ok(state.record(receipt))
    }

    pub async fn withdraw_funds(&self, ctx: CallContext, secret: &Secret) -> EscrowResult<Amount> {
        let mut state = self.state.lock().await;
        let receipt = state.engine.withdraw_funds(&ctx, secret)?;
        Ok(state.record(receipt))
    }

    pub async fn refund(&self, ctx: CallContext, commitment: &Commitment) -> EscrowResult<Amount> {
        let mut state = self.state.lock().await;
        let receipt = state.engine.refund(&ctx, commitment)?;
        Ok(state.record(receipt))
    }

    pub async fn withdraw_fee(&self, ctx: CallContext) -> EscrowResult<Amount> {
        let mut state = self.state.lock().await;
        let receipt = state.engine.withdraw_fee(&ctx)?;
        Ok(state.record(receipt))
    }

    pub async fn fee_balance_of(&self, owner: &Identity) -> Amount {
        self.state.lock().await.engine.fee_balance_of(owner)
    }

    pub async fn deposit_record_of(&self, commitment: &Commitment) -> DepositView {
        self.state.lock().await.engine.deposit_record_of(commitment)
    }

    pub async fn solvency(&self) -> Solvency {
        self.state.lock().await.engine.solvency()
    }

    /// Run a read-only closure against the engine
    pub async fn inspect<R>(&self, f: impl FnOnce(&RemittanceEngine<H>) -> R) -> R {
        f(&self.state.lock().await.engine)
    }

    /// Every event emitted so far, in order
    pub async fn events(&self) -> Vec<EscrowEvent> {
        self.state.lock().await.audit.clone()
    }

    /// Audit trail as a JSON array
    pub async fn events_json(&self) -> EscrowResult<String> {
        let state = self.state.lock().await;
        Ok(serde_json::to_string(&state.audit)?)
    }
}
