//! Publisher wallet.

use alloy::{
    network::EthereumWallet,
    primitives::{Address, Signature, B256},
    signers::{local::PrivateKeySigner, SignerSync},
};

use crate::error::{AppError, Result};

/// Publisher key used to sign attestations and pay for transactions.
#[derive(Clone)]
pub struct PublisherWallet {
    /// The local signer.
    signer: PrivateKeySigner,
    /// Publisher address.
    address: Address,
}

impl PublisherWallet {
    /// Create a wallet from a private key string.
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        // Remove 0x prefix if present
        let key = private_key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);

        let signer: PrivateKeySigner =
            key.parse().map_err(|e: alloy::signers::local::LocalSignerError| {
                AppError::Wallet(e.to_string())
            })?;

        let address = signer.address();

        tracing::info!(address = %address, "Publisher wallet initialized");

        Ok(Self { signer, address })
    }

    /// Generate a throwaway publisher key.
    pub fn random() -> Self {
        let signer = PrivateKeySigner::random();
        let address = signer.address();
        Self { signer, address }
    }

    /// Get the publisher address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte prehashed digest.
    pub fn sign_digest(&self, digest: &B256) -> Result<Signature> {
        Ok(self.signer.sign_hash_sync(digest)?)
    }

    /// Wallet for transaction-sending providers.
    pub fn ethereum_wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

impl std::fmt::Debug for PublisherWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherWallet").field("address", &self.address).finish()
    }
}
