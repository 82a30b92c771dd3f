//! Round attestations.
//!
//! An [`Attestation`] is a round plus the publisher's EIP-712 signature over
//! it. The digest is recomputable from the round alone, so the same
//! attestation verifies on every destination that shares the
//! [`AttestationDomain`].

pub mod digest;
pub mod payload;
pub mod signer;

use alloy::primitives::{Signature, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    types::Round,
};

pub use digest::{recover_publisher, round_digest, struct_hash, AttestationDomain, RoundData};
pub use payload::{decode_payload, encode_payload};
pub use signer::AttestationSigner;

/// Split ECDSA signature in the `(v, r, s)` form verifiers consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationSignature {
    /// Recovery id, 27 or 28.
    pub v: u8,
    /// Signature `r`.
    pub r: B256,
    /// Signature `s`.
    pub s: B256,
}

impl AttestationSignature {
    /// Convert an alloy signature, using the legacy `27 + parity` recovery id.
    pub fn from_signature(signature: &Signature) -> Self {
        Self {
            v: 27 + u8::from(signature.v()),
            r: B256::new(signature.r().to_be_bytes()),
            s: B256::new(signature.s().to_be_bytes()),
        }
    }

    /// Rebuild the alloy signature. Accepts `v` as 27/28 or 0/1.
    pub fn to_signature(&self) -> Result<Signature> {
        let parity = match self.v {
            27 | 0 => false,
            28 | 1 => true,
            other => {
                return Err(AppError::InvalidSignature(format!("invalid recovery id {}", other)))
            }
        };
        Ok(Signature::new(U256::from_be_bytes(self.r.0), U256::from_be_bytes(self.s.0), parity))
    }
}

/// Signed, portable proof of one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// The attested round, verbatim.
    pub round: Round,
    /// Publisher signature over `digest`.
    pub signature: AttestationSignature,
    /// Digest the publisher signed.
    pub digest: B256,
}

impl Attestation {
    /// Round id carried by this attestation.
    pub fn round_id(&self) -> u64 {
        self.round.round_id
    }
}
