//! Chainlink aggregator feed source.

use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;

use super::{ensure_recent, SourceAdapter};
use crate::{
    attestation::digest::i256_to_i128,
    error::{AppError, Result},
    ethereum::{contracts::chainlink::IAggregatorV3, EthereumClient},
    types::{current_timestamp, normalize_price, Price, SourceId},
};

/// Raw `latestRoundData` answer plus the feed's decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedRound {
    /// Feed round id.
    pub round_id: u128,
    /// Raw answer in feed decimals.
    pub answer: i128,
    /// Unix seconds of the last update.
    pub updated_at: u64,
    /// Round in which the answer was computed.
    pub answered_in_round: u128,
    /// Feed decimals.
    pub decimals: u8,
}

/// Read access to a Chainlink-style feed.
#[async_trait]
pub trait ChainlinkFeed: Send + Sync {
    /// Latest round reported by the feed.
    async fn latest_round(&self) -> Result<FeedRound>;
}

/// Feed read through an `AggregatorV3Interface` contract.
pub struct OnChainFeed {
    client: EthereumClient,
    feed: Address,
}

impl OnChainFeed {
    /// Create a feed reader for the contract at `feed`.
    pub fn new(client: EthereumClient, feed: Address) -> Self {
        Self { client, feed }
    }
}

#[async_trait]
impl ChainlinkFeed for OnChainFeed {
    async fn latest_round(&self) -> Result<FeedRound> {
        let contract = IAggregatorV3::new(self.feed, self.client.provider().clone());

        let round_data = contract.latestRoundData().call().await?;
        let decimals = contract.decimals().call().await?;

        let updated_at = u64::try_from(round_data.updatedAt).map_err(|_| {
            AppError::NumericOverflow(format!("updatedAt {} out of range", round_data.updatedAt))
        })?;

        Ok(FeedRound {
            round_id: round_data.roundId.to::<u128>(),
            answer: i256_to_i128(round_data.answer)?,
            updated_at,
            answered_in_round: round_data.answeredInRound.to::<u128>(),
            decimals,
        })
    }
}

/// Adapter for a Chainlink-style feed.
pub struct ChainlinkAdapter {
    feed: Arc<dyn ChainlinkFeed>,
    max_age: u64,
}

impl ChainlinkAdapter {
    /// Create an adapter rejecting answers older than `max_age` seconds.
    pub fn new(feed: Arc<dyn ChainlinkFeed>, max_age: u64) -> Self {
        Self { feed, max_age }
    }
}

#[async_trait]
impl SourceAdapter for ChainlinkAdapter {
    fn source_id(&self) -> SourceId {
        SourceId::Chainlink
    }

    async fn fetch(&self) -> Result<Price> {
        let round =
            self.feed.latest_round().await.map_err(|e| e.for_source(SourceId::Chainlink))?;
        let now = current_timestamp();

        if round.answered_in_round < round.round_id {
            return Err(AppError::StaleData {
                source_id: SourceId::Chainlink,
                reason: format!(
                    "answered in round {} before round {}",
                    round.answered_in_round, round.round_id
                ),
            });
        }
        ensure_recent(SourceId::Chainlink, round.updated_at, now, self.max_age)?;

        let value = normalize_price(round.answer, -i32::from(round.decimals))
            .map_err(|e| e.for_source(SourceId::Chainlink))?;

        tracing::debug!(
            feed_round = %round.round_id,
            answer = %round.answer,
            decimals = round.decimals,
            "Read Chainlink round"
        );

        Ok(Price {
            source_id: SourceId::Chainlink,
            value,
            observed_at: now,
            published_at: round.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticFeed(FeedRound);

    #[async_trait]
    impl ChainlinkFeed for StaticFeed {
        async fn latest_round(&self) -> Result<FeedRound> {
            Ok(self.0)
        }
    }

    fn feed_round(answer: i128, decimals: u8, updated_at: u64) -> FeedRound {
        FeedRound { round_id: 10, answer, updated_at, answered_in_round: 10, decimals }
    }

    fn adapter(round: FeedRound) -> ChainlinkAdapter {
        ChainlinkAdapter::new(Arc::new(StaticFeed(round)), 3600)
    }

    #[tokio::test]
    async fn test_fetch_normalizes_feed_decimals() {
        let now = current_timestamp();

        let price = adapter(feed_round(5_432_100, 8, now)).fetch().await.unwrap();
        assert_eq!(price.value, 5_432_100);
        assert_eq!(price.source_id, SourceId::Chainlink);
        assert_eq!(price.published_at, now);

        let price = adapter(feed_round(54_321_000_000_000_000, 18, now)).fetch().await.unwrap();
        assert_eq!(price.value, 5_432_100);
    }

    #[tokio::test]
    async fn test_fetch_rejects_old_answer() {
        let old = current_timestamp() - 7200;
        let result = adapter(feed_round(1, 8, old)).fetch().await;
        assert!(matches!(result, Err(AppError::StaleData { source_id: SourceId::Chainlink, .. })));
    }

    #[tokio::test]
    async fn test_fetch_rejects_carried_over_answer() {
        let mut round = feed_round(1, 8, current_timestamp());
        round.answered_in_round = 9;

        let result = adapter(round).fetch().await;
        assert!(matches!(result, Err(AppError::StaleData { .. })));
    }

    #[tokio::test]
    async fn test_fetch_keeps_negative_answer() {
        let price = adapter(feed_round(-250, 8, current_timestamp())).fetch().await.unwrap();
        assert_eq!(price.value, -250);
    }
}
