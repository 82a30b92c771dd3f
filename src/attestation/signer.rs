//! Attestation signer.

use alloy::primitives::Address;

use super::{round_digest, Attestation, AttestationDomain, AttestationSignature};
use crate::{
    error::{AppError, Result},
    ethereum::PublisherWallet,
    services::PublisherRegistry,
    types::Round,
};

/// Signs rounds with the publisher key under a fixed EIP-712 domain.
///
/// Holds no mutable state; concurrent use over different rounds is safe.
#[derive(Debug, Clone)]
pub struct AttestationSigner {
    wallet: Option<PublisherWallet>,
    domain: AttestationDomain,
}

impl AttestationSigner {
    /// Create a signer. `wallet` may be absent, in which case signing fails
    /// with [`AppError::MissingKey`].
    pub fn new(wallet: Option<PublisherWallet>, domain: AttestationDomain) -> Self {
        Self { wallet, domain }
    }

    /// Publisher address, if a key is configured.
    pub fn address(&self) -> Option<Address> {
        self.wallet.as_ref().map(PublisherWallet::address)
    }

    /// The domain every digest is computed under.
    pub fn domain(&self) -> &AttestationDomain {
        &self.domain
    }

    /// Sign `round`.
    pub fn sign(&self, round: &Round) -> Result<Attestation> {
        let wallet = self.wallet.as_ref().ok_or(AppError::MissingKey)?;

        let digest = round_digest(round, &self.domain);
        let signature = wallet.sign_digest(&digest)?;

        tracing::info!(
            round_id = round.round_id,
            digest = %digest,
            publisher = %wallet.address(),
            "Signed round"
        );

        Ok(Attestation {
            round: *round,
            signature: AttestationSignature::from_signature(&signature),
            digest,
        })
    }

    /// Sign `round` on behalf of the origin, which only endorses rounds signed
    /// by one of its authorized publishers.
    pub async fn sign_authorized(
        &self,
        round: &Round,
        publishers: &PublisherRegistry,
    ) -> Result<Attestation> {
        let address = self.address().ok_or(AppError::MissingKey)?;
        if !publishers.is_authorized(address).await {
            return Err(AppError::UnauthorizedSigner(address));
        }
        self.sign(round)
    }
}
