//! Expiry policy
//!
//! A deposit is claimable by the recipient strictly before its expiry and
//! reclaimable by the depositor from the expiry onwards. `now == expiry`
//! belongs to the depositor.

use crate::models::LogicalTime;
use serde::{Deserialize, Serialize};

/// Who may act on an active deposit at a given time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Window {
    /// Recipient may withdraw; refund not yet possible
    Claimable,
    /// Recipient window closed; depositor may refund
    Reclaimable,
}

pub struct ExpiryPolicy;

impl ExpiryPolicy {
    pub fn is_expired(now: LogicalTime, expiry: LogicalTime) -> bool {
        now >= expiry
    }

    pub fn window(now: LogicalTime, expiry: LogicalTime) -> Window {
        if Self::is_expired(now, expiry) {
            Window::Reclaimable
        } else {
            Window::Claimable
        }
    }

    pub fn can_withdraw(now: LogicalTime, expiry: LogicalTime) -> bool {
        Self::window(now, expiry) == Window::Claimable
    }

    pub fn can_refund(now: LogicalTime, expiry: LogicalTime) -> bool {
        Self::window(now, expiry) == Window::Reclaimable
    }
}
