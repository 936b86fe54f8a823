//! Authorization by preimage
//!
//! Whoever can reproduce the stored commitment from an identity and a secret
//! is authorized to withdraw under that identity. There is no other check.

use crate::commitment::commit;
use crate::models::{Commitment, Identity, Secret};
use subtle::ConstantTimeEq;

/// Check whether `(identity, secret)` opens `stored`.
///
/// The digests are compared in constant time.
pub fn is_authorized(identity: &Identity, secret: &Secret, stored: &Commitment) -> bool {
    let recomputed = commit(identity, secret);
    bool::from(recomputed.as_bytes().ct_eq(stored.as_bytes()))
}
