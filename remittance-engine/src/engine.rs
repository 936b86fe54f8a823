//! Remittance Engine - caller-facing escrow operations
//!
//! Owns the escrow ledger, the fee ledger and the host custody collaborator.
//! Every mutating operation is atomic: it either completes in full (state
//! change plus value transfer) or returns an error with nothing changed.
//! Payouts follow the ledger's settle-then-transfer order; if the host
//! refuses the transfer the settlement is rolled back.

use crate::{
    commitment::commit,
    config::EngineConfig,
    custody::{Custody, InMemoryLedger, ValueTransfer},
    escrow_ledger::{EscrowLedger, Release},
    events::{EscrowEvent, Receipt},
    expiry::ExpiryPolicy,
    fee_ledger::FeeLedger,
    models::{Amount, Commitment, DepositRecord, DepositView, Identity, LogicalTime, Secret},
    EscrowResult,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Authenticated caller and current logical time, as supplied by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Identity,
    pub now: LogicalTime,
}

impl CallContext {
    pub fn new(caller: Identity, now: LogicalTime) -> Self {
        Self { caller, now }
    }
}

/// Escrow custody compared against what the engine owes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solvency {
    /// Value the host holds in escrow custody
    pub held: Amount,
    /// Active net amounts plus accrued operator fees
    pub owed: Amount,
}

impl Solvency {
    pub fn is_solvent(&self) -> bool {
        self.held >= self.owed
    }
}

/// Main escrow engine
pub struct RemittanceEngine<H = InMemoryLedger> {
    config: EngineConfig,
    escrow: EscrowLedger,
    fees: FeeLedger,
    host: H,
}

impl<H: ValueTransfer> RemittanceEngine<H> {
    /// Create a new engine; the fee and operator are fixed from here on
    pub fn new(config: EngineConfig, host: H) -> Self {
        info!(operator = %config.operator, fee = %config.fee, "initializing remittance engine");

        Self {
            fees: FeeLedger::new(config.operator),
            escrow: EscrowLedger::new(),
            config,
            host,
        }
    }

    pub fn operator(&self) -> Identity {
        self.config.operator
    }

    pub fn fee(&self) -> Amount {
        self.config.fee
    }

    /// Commitment a depositor should lock funds against for `recipient`
    pub fn generate_commitment(&self, recipient: &Identity, secret: &Secret) -> Commitment {
        commit(recipient, secret)
    }

    /// Escrow `value` sent by the caller under `commitment`.
    ///
    /// Returns the net amount held for the recipient.
    pub fn deposit(
        &mut self,
        ctx: &CallContext,
        value: Amount,
        commitment: Commitment,
        expiry_offset: u64,
    ) -> EscrowResult<Receipt<Amount>> {
        let fee = self.config.fee;

        let record = self.escrow.prepare_deposit(
            commitment,
            ctx.caller,
            value,
            fee,
            expiry_offset,
            ctx.now,
        )?;
        self.fees.check_credit(fee)?;

        self.host
            .transfer(Custody::Account(ctx.caller), Custody::Escrow, value)?;

        // Value has moved; nothing below may fail.
        let expiry = record.expiry;
        let net = self.escrow.store(record);
        self.fees.accrue(fee);

        info!(
            commitment = %commitment,
            depositor = %ctx.caller,
            gross = %value,
            net = %net,
            expiry = %expiry,
            "deposit accepted"
        );

        Ok(Receipt::new(
            net,
            vec![
                EscrowEvent::FeeCharged {
                    sender: ctx.caller,
                    fee,
                },
                EscrowEvent::Deposited {
                    commitment,
                    depositor: ctx.caller,
                    amount: net,
                    gross: value,
                    expiry,
                },
            ],
        ))
    }

    /// Withdraw the deposit bound to the caller's identity and `secret`
    pub fn withdraw_funds(
        &mut self,
        ctx: &CallContext,
        secret: &Secret,
    ) -> EscrowResult<Receipt<Amount>> {
        let release = self.escrow.settle_withdrawal(&ctx.caller, secret, ctx.now)?;
        let (commitment, amount) = (release.commitment, release.amount);
        self.pay_out(release)?;

        info!(commitment = %commitment, recipient = %ctx.caller, amount = %amount, "funds withdrawn");

        Ok(Receipt::new(
            amount,
            vec![EscrowEvent::Withdrawn {
                recipient: ctx.caller,
                commitment,
                amount,
            }],
        ))
    }

    /// Return an expired deposit's net amount to its depositor
    pub fn refund(
        &mut self,
        ctx: &CallContext,
        commitment: &Commitment,
    ) -> EscrowResult<Receipt<Amount>> {
        let release = self.escrow.settle_refund(&ctx.caller, commitment, ctx.now)?;
        let amount = release.amount;
        self.pay_out(release)?;

        info!(commitment = %commitment, depositor = %ctx.caller, amount = %amount, "deposit refunded");

        Ok(Receipt::new(
            amount,
            vec![EscrowEvent::Refunded {
                depositor: ctx.caller,
                commitment: *commitment,
                amount,
            }],
        ))
    }

    /// Whether the caller could withdraw `commitment` with `secret` right now
    pub fn can_withdraw(&self, ctx: &CallContext, commitment: &Commitment, secret: &Secret) -> bool {
        self.escrow.authorizes(commitment, &ctx.caller, secret)
            && self
                .escrow
                .record(commitment)
                .is_some_and(|record| ExpiryPolicy::can_withdraw(ctx.now, record.expiry))
    }

    pub fn fee_balance_of(&self, owner: &Identity) -> Amount {
        self.fees.balance_of(owner)
    }

    /// Pay the operator everything accrued so far
    pub fn withdraw_fee(&mut self, ctx: &CallContext) -> EscrowResult<Receipt<Amount>> {
        let amount = self.fees.withdraw_fee(&ctx.caller)?;

        if let Err(err) = self
            .host
            .transfer(Custody::Escrow, Custody::Account(ctx.caller), amount)
        {
            warn!(operator = %ctx.caller, amount = %amount, error = %err, "fee payout failed");
            self.fees.restore(amount);
            return Err(err.into());
        }

        info!(operator = %ctx.caller, amount = %amount, "fees withdrawn");

        Ok(Receipt::new(
            amount,
            vec![EscrowEvent::FeeWithdrawn {
                operator: ctx.caller,
                amount,
            }],
        ))
    }

    /// `(depositor, expiry, net_amount)` for a commitment
    pub fn deposit_record_of(&self, commitment: &Commitment) -> DepositView {
        self.escrow.view(commitment)
    }

    pub fn record(&self, commitment: &Commitment) -> Option<&DepositRecord> {
        self.escrow.record(commitment)
    }

    pub fn solvency(&self) -> Solvency {
        let owed = self
            .escrow
            .active_liabilities()
            .saturating_add(self.fees.balance_of(&self.config.operator));
        Solvency {
            held: self.host.escrow_balance(),
            owed,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    fn pay_out(&mut self, release: Release) -> EscrowResult<()> {
        match self.host.transfer(
            Custody::Escrow,
            Custody::Account(release.beneficiary),
            release.amount,
        ) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(commitment = %release.commitment, error = %err, "payout failed");
                self.escrow.restore(release);
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::TransferError;
    use crate::error::EscrowError;
    use crate::models::{DepositState, IDENTITY_LEN};

    const FEE: Amount = 1_000_000;
    const GROSS: Amount = 100_000_000_000_000_000;
    const EXPIRE_PERIOD: u64 = 600;

    fn operator() -> Identity {
        let mut bytes = [0; IDENTITY_LEN];
        bytes[IDENTITY_LEN - 1] = 0xaa;
        Identity::from_bytes(bytes)
    }

    fn depositor() -> Identity {
        Identity::from_bytes([1; IDENTITY_LEN])
    }

    fn shop() -> Identity {
        Identity::from_bytes([2; IDENTITY_LEN])
    }

    fn at(caller: Identity, now: u64) -> CallContext {
        CallContext::new(caller, LogicalTime(now))
    }

    fn engine() -> RemittanceEngine {
        let mut host = InMemoryLedger::new();
        host.mint(depositor(), GROSS * 10).unwrap();
        RemittanceEngine::new(EngineConfig::new(operator(), FEE), host)
    }

    /// Host that refuses every payout out of escrow
    struct FrozenPayouts(InMemoryLedger);

    impl ValueTransfer for FrozenPayouts {
        fn transfer(
            &mut self,
            from: Custody,
            to: Custody,
            amount: Amount,
        ) -> Result<(), TransferError> {
            if from == Custody::Escrow {
                return Err(TransferError::Rejected("payouts frozen".to_string()));
            }
            self.0.transfer(from, to, amount)
        }

        fn escrow_balance(&self) -> Amount {
            self.0.escrow_balance()
        }
    }

    #[test]
    fn test_deposit_splits_fee_and_net() {
        let mut engine = engine();
        let commitment = engine.generate_commitment(&shop(), &Secret::from("0xaaaaaa"));

        let receipt = engine
            .deposit(&at(depositor(), 0), GROSS, commitment, EXPIRE_PERIOD)
            .unwrap();

        assert_eq!(receipt.value, GROSS - FEE);
        assert_eq!(engine.fee_balance_of(&operator()), FEE);
        assert_eq!(engine.deposit_record_of(&commitment).net_amount, GROSS - FEE);
        assert_eq!(engine.host().escrow_balance(), GROSS);
        assert_eq!(engine.host().balance_of(&depositor()), GROSS * 9);
        assert_eq!(
            receipt.events[0],
            EscrowEvent::FeeCharged {
                sender: depositor(),
                fee: FEE
            }
        );
        assert_eq!(receipt.events[1].amount(), GROSS - FEE);
    }

    #[test]
    fn test_rejected_deposit_changes_nothing() {
        let mut engine = engine();
        let commitment = engine.generate_commitment(&shop(), &Secret::from("0xaaaaaa"));

        assert_eq!(
            engine.deposit(&at(depositor(), 0), 0, commitment, EXPIRE_PERIOD),
            Err(EscrowError::InsufficientAmount { gross: 0, fee: FEE })
        );
        assert_eq!(engine.fee_balance_of(&operator()), 0);
        assert!(engine.record(&commitment).is_none());
        assert_eq!(engine.host().escrow_balance(), 0);
    }

    #[test]
    fn test_unfunded_depositor_is_rejected_by_host() {
        let mut engine = engine();
        let pauper = Identity::from_bytes([7; IDENTITY_LEN]);
        let commitment = engine.generate_commitment(&shop(), &Secret::from("0xaaaaaa"));

        assert!(matches!(
            engine.deposit(&at(pauper, 0), GROSS, commitment, EXPIRE_PERIOD),
            Err(EscrowError::Transfer(TransferError::InsufficientFunds { .. }))
        ));
        assert!(engine.record(&commitment).is_none());
        assert_eq!(engine.fee_balance_of(&operator()), 0);
    }

    #[test]
    fn test_withdraw_pays_recipient_once() {
        let mut engine = engine();
        let secret = Secret::from("0xaaaaaa");
        let commitment = engine.generate_commitment(&shop(), &secret);
        engine
            .deposit(&at(depositor(), 0), GROSS, commitment, EXPIRE_PERIOD)
            .unwrap();

        let receipt = engine.withdraw_funds(&at(shop(), 10), &secret).unwrap();
        assert_eq!(receipt.value, GROSS - FEE);
        assert_eq!(engine.host().balance_of(&shop()), GROSS - FEE);
        assert_eq!(engine.deposit_record_of(&commitment).net_amount, 0);

        assert_eq!(
            engine.withdraw_funds(&at(shop(), 11), &secret),
            Err(EscrowError::UnknownCommitment)
        );
        assert_eq!(
            engine.refund(&at(depositor(), 1_000), &commitment),
            Err(EscrowError::UnknownCommitment)
        );
    }

    #[test]
    fn test_refund_returns_net_and_keeps_fee() {
        let mut engine = engine();
        let commitment = engine.generate_commitment(&shop(), &Secret::from("0xaaaaaa"));
        engine
            .deposit(&at(depositor(), 0), GROSS, commitment, EXPIRE_PERIOD)
            .unwrap();

        assert!(matches!(
            engine.refund(&at(depositor(), EXPIRE_PERIOD - 1), &commitment),
            Err(EscrowError::NotExpired { .. })
        ));

        let receipt = engine
            .refund(&at(depositor(), EXPIRE_PERIOD), &commitment)
            .unwrap();
        assert_eq!(receipt.value, GROSS - FEE);
        assert_eq!(engine.host().balance_of(&depositor()), GROSS * 10 - FEE);
        assert_eq!(engine.fee_balance_of(&operator()), FEE);
        assert_eq!(engine.record(&commitment).unwrap().state, DepositState::Refunded);
    }

    #[test]
    fn test_failed_payout_rolls_back_withdrawal() {
        let mut host = InMemoryLedger::new();
        host.mint(depositor(), GROSS).unwrap();
        let mut engine =
            RemittanceEngine::new(EngineConfig::new(operator(), FEE), FrozenPayouts(host));
        let secret = Secret::from("0xaaaaaa");
        let commitment = engine.generate_commitment(&shop(), &secret);
        engine
            .deposit(&at(depositor(), 0), GROSS, commitment, EXPIRE_PERIOD)
            .unwrap();

        assert!(matches!(
            engine.withdraw_funds(&at(shop(), 1), &secret),
            Err(EscrowError::Transfer(TransferError::Rejected(_)))
        ));
        let record = engine.record(&commitment).unwrap();
        assert_eq!(record.state, DepositState::Active);
        assert_eq!(record.net_amount, GROSS - FEE);

        assert!(engine
            .refund(&at(depositor(), EXPIRE_PERIOD), &commitment)
            .is_err());
        assert!(engine.record(&commitment).unwrap().state.is_active());

        assert!(engine.withdraw_fee(&at(operator(), 1)).is_err());
        assert_eq!(engine.fee_balance_of(&operator()), FEE);
    }

    #[test]
    fn test_withdraw_fee() {
        let mut engine = engine();
        let commitment = engine.generate_commitment(&shop(), &Secret::from("0xaaaaaa"));
        engine
            .deposit(&at(depositor(), 0), GROSS, commitment, EXPIRE_PERIOD)
            .unwrap();

        assert_eq!(
            engine.withdraw_fee(&at(depositor(), 1)),
            Err(EscrowError::NotOperator)
        );

        let receipt = engine.withdraw_fee(&at(operator(), 1)).unwrap();
        assert_eq!(receipt.value, FEE);
        assert_eq!(engine.host().balance_of(&operator()), FEE);
        assert_eq!(engine.fee_balance_of(&operator()), 0);
        assert_eq!(
            engine.withdraw_fee(&at(operator(), 2)),
            Err(EscrowError::NoFeeDue)
        );
    }

    #[test]
    fn test_zero_fee_rejects_only_empty_deposits() {
        let mut host = InMemoryLedger::new();
        host.mint(depositor(), 10).unwrap();
        let mut engine = RemittanceEngine::new(EngineConfig::new(operator(), 0), host);
        let commitment = engine.generate_commitment(&shop(), &Secret::from("0xaaaaaa"));

        assert_eq!(
            engine.deposit(&at(depositor(), 0), 0, commitment, EXPIRE_PERIOD),
            Err(EscrowError::InsufficientAmount { gross: 0, fee: 0 })
        );

        let receipt = engine
            .deposit(&at(depositor(), 0), 1, commitment, EXPIRE_PERIOD)
            .unwrap();
        assert_eq!(receipt.value, 1);
        assert_eq!(engine.deposit_record_of(&commitment).net_amount, 1);
        assert_eq!(engine.fee_balance_of(&operator()), 0);

        assert_eq!(
            engine.withdraw_fee(&at(operator(), 1)),
            Err(EscrowError::NoFeeDue)
        );
        assert!(engine.solvency().is_solvent());
    }

    #[test]
    fn test_fee_overflow_is_rejected_before_value_moves() {
        let fee = Amount::MAX / 2 + 1;
        let second = Identity::from_bytes([4; IDENTITY_LEN]);
        let mut host = InMemoryLedger::new();
        host.mint(depositor(), fee + 1).unwrap();
        host.mint(second, fee + 1).unwrap();
        let mut engine = RemittanceEngine::new(EngineConfig::new(operator(), fee), host);

        let first = engine.generate_commitment(&shop(), &Secret::from("first"));
        engine
            .deposit(&at(depositor(), 0), fee + 1, first, EXPIRE_PERIOD)
            .unwrap();
        let held = engine.host().escrow_balance();

        let next = engine.generate_commitment(&shop(), &Secret::from("second"));
        assert!(matches!(
            engine.deposit(&at(second, 0), fee + 1, next, EXPIRE_PERIOD),
            Err(EscrowError::ArithmeticOverflow(_))
        ));
        assert_eq!(engine.host().balance_of(&second), fee + 1);
        assert_eq!(engine.host().escrow_balance(), held);
        assert!(engine.record(&next).is_none());
        assert_eq!(engine.fee_balance_of(&operator()), fee);
    }

    #[test]
    fn test_can_withdraw_matches_withdraw_outcome() {
        let mut engine = engine();
        let secret = Secret::from("0xaaaaaa");
        let commitment = engine.generate_commitment(&shop(), &secret);
        engine
            .deposit(&at(depositor(), 0), GROSS, commitment, EXPIRE_PERIOD)
            .unwrap();

        assert!(engine.can_withdraw(&at(shop(), 1), &commitment, &secret));
        assert!(!engine.can_withdraw(&at(depositor(), 1), &commitment, &secret));
        assert!(!engine.can_withdraw(&at(shop(), 1), &commitment, &Secret::from("guess")));
        assert!(!engine.can_withdraw(&at(shop(), EXPIRE_PERIOD), &commitment, &secret));

        engine.withdraw_funds(&at(shop(), 1), &secret).unwrap();
        assert!(!engine.can_withdraw(&at(shop(), 2), &commitment, &secret));
    }

    #[test]
    fn test_solvency_tracks_custody() {
        let mut engine = engine();
        let secret = Secret::from("0xaaaaaa");
        let commitment = engine.generate_commitment(&shop(), &secret);
        engine
            .deposit(&at(depositor(), 0), GROSS, commitment, EXPIRE_PERIOD)
            .unwrap();

        let solvency = engine.solvency();
        assert_eq!(solvency.held, solvency.owed);

        engine.withdraw_funds(&at(shop(), 1), &secret).unwrap();
        engine.withdraw_fee(&at(operator(), 1)).unwrap();
        assert_eq!(engine.solvency(), Solvency { held: 0, owed: 0 });
        assert!(engine.solvency().is_solvent());
    }
}
