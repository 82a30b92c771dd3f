//! Redstone data service source.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{ensure_recent, SourceAdapter};
use crate::{
    error::{AppError, Result},
    types::{current_timestamp, fixed_from_decimal, Price, SourceId},
};

/// One Redstone quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedstoneQuote {
    /// Quoted value.
    pub value: Decimal,
    /// Unix milliseconds reported by the service.
    pub timestamp_ms: u64,
}

/// Access to the Redstone price service.
#[async_trait]
pub trait RedstoneUpstream: Send + Sync {
    /// Latest quote for the configured symbol.
    async fn latest(&self) -> Result<RedstoneQuote>;
}

/// Entry of the `/prices` response.
#[derive(Debug, Deserialize)]
struct RedstonePriceEntry {
    symbol: String,
    value: serde_json::Number,
    timestamp: u64,
}

/// Redstone HTTP API client.
pub struct RedstoneApi {
    http: reqwest::Client,
    base_url: String,
    symbol: String,
}

impl RedstoneApi {
    /// Create a client for `symbol` at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>, symbol: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, base_url: base_url.into(), symbol: symbol.into() })
    }
}

#[async_trait]
impl RedstoneUpstream for RedstoneApi {
    async fn latest(&self) -> Result<RedstoneQuote> {
        let url = format!("{}/prices", self.base_url.trim_end_matches('/'));

        let response = self
            .http
            .get(&url)
            .query(&[("symbol", self.symbol.as_str()), ("provider", "redstone"), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Http(format!(
                "Redstone API returned status: {}",
                response.status()
            )));
        }

        let entries: Vec<RedstonePriceEntry> = response
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("Failed to parse Redstone response: {}", e)))?;

        let entry = entries
            .into_iter()
            .find(|e| e.symbol.eq_ignore_ascii_case(&self.symbol))
            .ok_or_else(|| AppError::Parse(format!("No Redstone price for {}", self.symbol)))?;

        Ok(RedstoneQuote { value: parse_decimal(&entry.value)?, timestamp_ms: entry.timestamp })
    }
}

/// JSON numbers may arrive in scientific notation.
fn parse_decimal(number: &serde_json::Number) -> Result<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| AppError::Parse(format!("Invalid Redstone value {}: {}", text, e)))
}

/// Adapter for the Redstone data service.
pub struct RedstoneAdapter {
    upstream: Arc<dyn RedstoneUpstream>,
    max_age: u64,
}

impl RedstoneAdapter {
    /// Create an adapter rejecting quotes older than `max_age` seconds.
    pub fn new(upstream: Arc<dyn RedstoneUpstream>, max_age: u64) -> Self {
        Self { upstream, max_age }
    }
}

#[async_trait]
impl SourceAdapter for RedstoneAdapter {
    fn source_id(&self) -> SourceId {
        SourceId::Redstone
    }

    async fn fetch(&self) -> Result<Price> {
        let quote = self.upstream.latest().await.map_err(|e| e.for_source(SourceId::Redstone))?;
        let now = current_timestamp();
        let published_at = quote.timestamp_ms / 1000;

        ensure_recent(SourceId::Redstone, published_at, now, self.max_age)?;

        let value = fixed_from_decimal(quote.value).map_err(|e| e.for_source(SourceId::Redstone))?;

        Ok(Price { source_id: SourceId::Redstone, value, observed_at: now, published_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticQuote(RedstoneQuote);

    #[async_trait]
    impl RedstoneUpstream for StaticQuote {
        async fn latest(&self) -> Result<RedstoneQuote> {
            Ok(self.0)
        }
    }

    fn adapter(value: &str, timestamp_ms: u64) -> RedstoneAdapter {
        let quote = RedstoneQuote { value: Decimal::from_str(value).unwrap(), timestamp_ms };
        RedstoneAdapter::new(Arc::new(StaticQuote(quote)), 600)
    }

    #[tokio::test]
    async fn test_fetch_scales_decimal_to_fixed_point() {
        let now_ms = current_timestamp() * 1000;
        let price = adapter("0.0584213", now_ms).fetch().await.unwrap();

        assert_eq!(price.value, 5_842_130);
        assert_eq!(price.published_at, now_ms / 1000);
    }

    #[tokio::test]
    async fn test_fetch_truncates_extra_precision() {
        let now_ms = current_timestamp() * 1000;
        let price = adapter("0.123456789999", now_ms).fetch().await.unwrap();
        assert_eq!(price.value, 12_345_678);
    }

    #[tokio::test]
    async fn test_fetch_rejects_stale_quote() {
        let old_ms = (current_timestamp() - 3600) * 1000;
        let result = adapter("0.05", old_ms).fetch().await;
        assert!(matches!(result, Err(AppError::StaleData { source_id: SourceId::Redstone, .. })));
    }

    #[test]
    fn test_parse_decimal_accepts_scientific_notation() {
        let plain: serde_json::Number = serde_json::from_str("0.0584").unwrap();
        assert_eq!(parse_decimal(&plain).unwrap(), Decimal::from_str("0.0584").unwrap());

        let sci: serde_json::Number = serde_json::from_str("5.84e-2").unwrap();
        assert_eq!(parse_decimal(&sci).unwrap(), Decimal::from_str("0.0584").unwrap());
    }

    #[test]
    fn test_price_entry_deserializes() {
        let json = r#"[{"symbol":"MXN","value":0.0584,"timestamp":1700000000000,"provider":"x"}]"#;
        let entries: Vec<RedstonePriceEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries[0].symbol, "MXN");
        assert_eq!(entries[0].timestamp, 1_700_000_000_000);
    }
}
