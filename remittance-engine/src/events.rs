//! Domain events emitted by escrow operations
//!
//! Events are plain data returned with each operation's result. Hosts decide
//! how to publish them; the engine only reports what happened.

use crate::models::{Amount, Commitment, Identity, LogicalTime};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EscrowEvent {
    /// Fee retained from a deposit
    FeeCharged { sender: Identity, fee: Amount },
    /// Deposit escrowed; `amount` is the net value owed to the recipient
    Deposited {
        commitment: Commitment,
        depositor: Identity,
        amount: Amount,
        gross: Amount,
        expiry: LogicalTime,
    },
    /// Recipient withdrew the escrowed value
    Withdrawn {
        recipient: Identity,
        commitment: Commitment,
        amount: Amount,
    },
    /// Depositor reclaimed an expired deposit
    Refunded {
        depositor: Identity,
        commitment: Commitment,
        amount: Amount,
    },
    /// Operator drained accrued fees
    FeeWithdrawn { operator: Identity, amount: Amount },
}

impl EscrowEvent {
    /// Stable dotted topic, e.g. `deposit.created`
    pub fn topic(&self) -> &'static str {
        match self {
            Self::FeeCharged { .. } => "fee.charged",
            Self::Deposited { .. } => "deposit.created",
            Self::Withdrawn { .. } => "deposit.withdrawn",
            Self::Refunded { .. } => "deposit.refunded",
            Self::FeeWithdrawn { .. } => "fee.withdrawn",
        }
    }

    /// Value moved by the event
    pub fn amount(&self) -> Amount {
        match self {
            Self::FeeCharged { fee, .. } => *fee,
            Self::Deposited { amount, .. }
            | Self::Withdrawn { amount, .. }
            | Self::Refunded { amount, .. }
            | Self::FeeWithdrawn { amount, .. } => *amount,
        }
    }
}

/// Operation result with the events it emitted, in emission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt<T> {
    pub value: T,
    pub events: Vec<EscrowEvent>,
}

impl<T> Receipt<T> {
    pub fn new(value: T, events: Vec<EscrowEvent>) -> Self {
        Self { value, events }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IDENTITY_LEN;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = EscrowEvent::FeeWithdrawn {
            operator: Identity::from_bytes([9; IDENTITY_LEN]),
            amount: 1_000_000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "fee_withdrawn");
        assert_eq!(json["amount"], 1_000_000);
        assert_eq!(event.topic(), "fee.withdrawn");
    }
}
