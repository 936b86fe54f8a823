//! Commitment generation
//!
//! A commitment is `SHA-256(DOMAIN_TAG || identity || secret)`. The identity
//! is fixed length, so the encoding is unambiguous: no other
//! `(identity, secret)` pair serializes to the same preimage.

use crate::models::{Commitment, Identity, Secret};
use sha2::{Digest, Sha256};

/// Domain separation tag prefixed to every commitment preimage
pub const DOMAIN_TAG: &[u8] = b"remittance.commitment.v1";

/// Derive the commitment binding `recipient` to `secret`.
pub fn commit(recipient: &Identity, secret: &Secret) -> Commitment {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_TAG);
    hasher.update(recipient.as_bytes());
    hasher.update(secret.as_bytes());
    Commitment::from_bytes(hasher.finalize().into())
}
