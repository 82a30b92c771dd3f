//! Pyth pull-oracle source.
//!
//! Pyth prices are pulled from Hermes and must be pushed on chain with a
//! fee-paying `updatePriceFeeds` before they count. The fee is checked
//! against a ceiling before anything is paid.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use super::{ensure_recent, SourceAdapter};
use crate::{
    error::{AppError, Result},
    ethereum::{contracts::pyth::IPyth, EthereumClient},
    types::{current_timestamp, normalize_price, Price, SourceId},
};

/// Default update fee ceiling (1 gwei).
pub const DEFAULT_FEE_CEILING_WEI: u64 = 1_000_000_000;

/// Latest Hermes price plus the signed update blobs that prove it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythQuote {
    /// Signed price mantissa.
    pub price: i128,
    /// Decimal exponent of `price`.
    pub expo: i32,
    /// Unix seconds the price was published.
    pub publish_time: u64,
    /// Update data accepted by `updatePriceFeeds`.
    pub update_data: Vec<Bytes>,
}

/// Access to Hermes and the on-chain Pyth contract.
#[async_trait]
pub trait PythUpstream: Send + Sync {
    /// Latest price and its update data.
    async fn latest_update(&self) -> Result<PythQuote>;

    /// Fee charged to submit `update_data`.
    async fn update_fee(&self, update_data: &[Bytes]) -> Result<U256>;

    /// Submit `update_data`, paying `fee`.
    async fn submit_update(&self, update_data: Vec<Bytes>, fee: U256) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct HermesResponse {
    binary: HermesBinary,
    parsed: Vec<HermesParsed>,
}

#[derive(Debug, Deserialize)]
struct HermesBinary {
    data: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct HermesParsed {
    id: String,
    price: HermesPrice,
}

#[derive(Debug, Deserialize)]
struct HermesPrice {
    price: String,
    expo: i32,
    publish_time: u64,
}

impl HermesResponse {
    fn into_quote(self, price_id: B256) -> Result<PythQuote> {
        let wanted = alloy::hex::encode(price_id);
        let parsed = self
            .parsed
            .into_iter()
            .find(|p| p.id.trim_start_matches("0x").eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| AppError::Parse(format!("Hermes response lacks price id {}", price_id)))?;

        let price = parsed
            .price
            .price
            .parse::<i128>()
            .map_err(|e| AppError::Parse(format!("Invalid Pyth price: {}", e)))?;

        let update_data = self
            .binary
            .data
            .iter()
            .map(|blob| alloy::hex::decode(blob).map(Bytes::from))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(PythQuote {
            price,
            expo: parsed.price.expo,
            publish_time: parsed.price.publish_time,
            update_data,
        })
    }
}

/// Hermes HTTP client paired with the Pyth contract on the origin chain.
pub struct HermesPyth {
    http: reqwest::Client,
    hermes_url: String,
    price_id: B256,
    client: EthereumClient,
    pyth: Address,
}

impl HermesPyth {
    /// Create an upstream for `price_id`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        hermes_url: impl Into<String>,
        price_id: B256,
        client: EthereumClient,
        pyth: Address,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, hermes_url: hermes_url.into(), price_id, client, pyth })
    }
}

#[async_trait]
impl PythUpstream for HermesPyth {
    async fn latest_update(&self) -> Result<PythQuote> {
        let url = format!("{}/v2/updates/price/latest", self.hermes_url.trim_end_matches('/'));

        let response = self
            .http
            .get(&url)
            .query(&[("ids[]", self.price_id.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Http(format!("Hermes returned status: {}", response.status())));
        }

        let body: HermesResponse = response
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("Failed to parse Hermes response: {}", e)))?;

        body.into_quote(self.price_id)
    }

    async fn update_fee(&self, update_data: &[Bytes]) -> Result<U256> {
        let pyth = IPyth::new(self.pyth, self.client.provider().clone());
        Ok(pyth.getUpdateFee(update_data.to_vec()).call().await?)
    }

    async fn submit_update(&self, update_data: Vec<Bytes>, fee: U256) -> Result<()> {
        self.client.require_sender()?;

        let pyth = IPyth::new(self.pyth, self.client.provider().clone());
        let receipt =
            pyth.updatePriceFeeds(update_data).value(fee).send().await?.get_receipt().await?;

        if !receipt.status() {
            return Err(AppError::Rpc(format!(
                "updatePriceFeeds reverted in {}",
                receipt.transaction_hash
            )));
        }

        info!(tx = %receipt.transaction_hash, fee = %fee, "Pyth price feeds updated");
        Ok(())
    }
}

/// Adapter for the Pyth pull oracle.
pub struct PythAdapter {
    upstream: Arc<dyn PythUpstream>,
    fee_ceiling: U256,
    max_age: u64,
}

impl PythAdapter {
    /// Create an adapter refusing to pay more than `fee_ceiling` per update.
    pub fn new(upstream: Arc<dyn PythUpstream>, fee_ceiling: U256, max_age: u64) -> Self {
        Self { upstream, fee_ceiling, max_age }
    }
}

#[async_trait]
impl SourceAdapter for PythAdapter {
    fn source_id(&self) -> SourceId {
        SourceId::Pyth
    }

    async fn fetch(&self) -> Result<Price> {
        let source = SourceId::Pyth;

        let quote = self.upstream.latest_update().await.map_err(|e| e.for_source(source))?;
        let now = current_timestamp();

        ensure_recent(source, quote.publish_time, now, self.max_age)?;
        let value = normalize_price(quote.price, quote.expo).map_err(|e| e.for_source(source))?;

        let fee =
            self.upstream.update_fee(&quote.update_data).await.map_err(|e| e.for_source(source))?;
        if fee > self.fee_ceiling {
            warn!(fee = %fee, ceiling = %self.fee_ceiling, "Pyth update fee above threshold");
            return Err(AppError::FeeAboveThreshold {
                source_id: source,
                fee,
                ceiling: self.fee_ceiling,
            });
        }

        self.upstream
            .submit_update(quote.update_data, fee)
            .await
            .map_err(|e| e.for_source(source))?;

        Ok(Price { source_id: source, value, observed_at: now, published_at: quote.publish_time })
    }
}
