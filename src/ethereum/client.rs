//! Ethereum RPC client.

use alloy::{
    network::Ethereum,
    primitives::{Address, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::{
    error::{AppError, Result},
    ethereum::PublisherWallet,
};

/// Type alias for the type-erased HTTP provider.
pub type HttpProvider = DynProvider<Ethereum>;

/// Ethereum RPC client wrapper with lazy initialization.
///
/// When built with a wallet the provider signs and fills transactions sent
/// through contract bindings; otherwise it is read-only.
#[derive(Clone)]
pub struct EthereumClient {
    /// The underlying provider.
    provider: Arc<HttpProvider>,
    /// RPC URL for logging.
    rpc_url: String,
    /// Sender address when a wallet is attached.
    sender: Option<Address>,
    /// Lazily initialized chain ID.
    chain_id: Arc<OnceCell<u64>>,
}

impl EthereumClient {
    /// Create a client, optionally signing with `wallet`.
    ///
    /// Note: This does NOT make any network calls. The connection is
    /// established lazily when the first operation is performed.
    pub fn new(rpc_url: &str, wallet: Option<&PublisherWallet>) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid RPC URL: {}", rpc_url)))?;

        let provider = match wallet {
            Some(wallet) => {
                ProviderBuilder::new().wallet(wallet.ethereum_wallet()).connect_http(url).erased()
            }
            None => ProviderBuilder::new().connect_http(url).erased(),
        };

        tracing::info!(
            rpc_url = %rpc_url,
            signing = wallet.is_some(),
            "Ethereum client created (lazy initialization)"
        );

        Ok(Self {
            provider: Arc::new(provider),
            rpc_url: rpc_url.to_string(),
            sender: wallet.map(PublisherWallet::address),
            chain_id: Arc::new(OnceCell::new()),
        })
    }

    /// Get the chain ID (fetches from network on first call).
    pub async fn chain_id(&self) -> Result<u64> {
        self.chain_id
            .get_or_try_init(|| async {
                let chain_id = self.provider.get_chain_id().await?;
                tracing::info!(chain_id = chain_id, rpc_url = %self.rpc_url, "Connected to Ethereum node");
                Ok(chain_id)
            })
            .await
            .copied()
    }

    /// Get the underlying provider.
    pub fn provider(&self) -> &HttpProvider {
        &self.provider
    }

    /// Address transactions are sent from, if a wallet is attached.
    pub fn sender(&self) -> Option<Address> {
        self.sender
    }

    /// Native balance of the sender, zero for read-only clients.
    pub async fn sender_balance(&self) -> Result<U256> {
        match self.sender {
            Some(address) => Ok(self.provider.get_balance(address).await?),
            None => Ok(U256::ZERO),
        }
    }

    /// Get the current block timestamp.
    pub async fn get_block_timestamp(&self) -> Result<u64> {
        let block = self
            .provider
            .get_block_by_number(alloy::eips::BlockNumberOrTag::Latest)
            .await?
            .ok_or_else(|| AppError::Rpc("Failed to get latest block".into()))?;
        Ok(block.header.timestamp)
    }

    /// Fail with a wallet error unless a signer is attached.
    pub fn require_sender(&self) -> Result<Address> {
        self.sender.ok_or_else(|| AppError::Wallet("client has no signing wallet".into()))
    }
}
