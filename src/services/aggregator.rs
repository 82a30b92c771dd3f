//! Round aggregation service.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    error::{AppError, Result},
    services::RoundLedger,
    sources::PriceBoard,
    types::{format_fixed, Round, SourceId},
};

/// Combines stored per-source prices into the next origin round.
///
/// The plain mean has no outlier rejection: every configured source is
/// trusted equally.
pub struct Aggregator {
    board: Arc<PriceBoard>,
    ledger: Arc<RoundLedger>,
    sources: Vec<SourceId>,
    max_age: u64,
}

impl Aggregator {
    /// Create an aggregator over `sources`, writing rounds to `ledger`.
    pub fn new(
        board: Arc<PriceBoard>,
        ledger: Arc<RoundLedger>,
        sources: Vec<SourceId>,
        max_age: u64,
    ) -> Self {
        Self { board, ledger, sources, max_age }
    }

    /// Origin ledger.
    pub fn ledger(&self) -> &Arc<RoundLedger> {
        &self.ledger
    }

    /// Aggregate the fresh prices at `now` into a new round.
    ///
    /// # Errors
    /// `NoFreshSources` when no configured source has a fresh price; the
    /// previous round stays canonical.
    pub async fn aggregate_and_publish_round(&self, now: u64) -> Result<Round> {
        let fresh = self.board.fresh(&self.sources, now, self.max_age).await;
        if fresh.is_empty() {
            warn!(configured = self.sources.len(), "No fresh prices to aggregate");
            return Err(AppError::NoFreshSources);
        }

        let values: Vec<i128> = fresh.iter().map(|p| p.value).collect();
        let answer = mean(&values)?;

        let round = self.ledger.commit_next(answer, now).await?;

        info!(
            round_id = round.round_id,
            answer = %format_fixed(round.answer),
            sources = fresh.len(),
            "Published round"
        );
        Ok(round)
    }

    /// Most recent fully formed round.
    pub async fn latest_round_data(&self) -> Option<Round> {
        self.ledger.latest().await
    }
}

/// Arithmetic mean, truncating toward zero.
pub fn mean(values: &[i128]) -> Result<i128> {
    if values.is_empty() {
        return Err(AppError::NoFreshSources);
    }

    let sum = values
        .iter()
        .try_fold(0i128, |acc, v| acc.checked_add(*v))
        .ok_or_else(|| AppError::NumericOverflow("price sum overflows i128".into()))?;

    Ok(sum / values.len() as i128)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Price;

    const NOW: u64 = 1_700_000_000;

    fn price(source_id: SourceId, value: i128, observed_at: u64) -> Price {
        Price { source_id, value, observed_at, published_at: observed_at }
    }

    async fn aggregator(prices: &[Price]) -> Aggregator {
        let board = Arc::new(PriceBoard::new());
        for p in prices {
            board.store(*p).await;
        }
        Aggregator::new(board, Arc::new(RoundLedger::new(1)), SourceId::ALL.to_vec(), 3600)
    }

    #[test]
    fn test_mean_truncates_toward_zero() {
        assert_eq!(mean(&[10_000_000_000, 10_000_000_200, 9_999_999_800]).unwrap(), 10_000_000_000);
        assert_eq!(mean(&[1, 2]).unwrap(), 1);
        assert_eq!(mean(&[-1, -2]).unwrap(), -1);
        assert_eq!(mean(&[0]).unwrap(), 0);
    }

    #[test]
    fn test_mean_overflow_is_reported() {
        assert!(matches!(mean(&[i128::MAX, 1]), Err(AppError::NumericOverflow(_))));
        assert!(matches!(mean(&[]), Err(AppError::NoFreshSources)));
    }

    #[tokio::test]
    async fn test_three_sources_average() {
        let agg = aggregator(&[
            price(SourceId::Redstone, 10_000_000_000, NOW),
            price(SourceId::Pyth, 10_000_000_200, NOW),
            price(SourceId::Chainlink, 9_999_999_800, NOW),
        ])
        .await;

        let round = agg.aggregate_and_publish_round(NOW).await.unwrap();

        assert_eq!(round.answer, 10_000_000_000);
        assert_eq!(round.round_id, 1);
        assert_eq!(round.answered_in_round, 1);
        assert_eq!(round.started_at, NOW);
        assert_eq!(round.updated_at, NOW);
    }

    #[tokio::test]
    async fn test_single_fresh_source_is_enough() {
        let agg = aggregator(&[
            price(SourceId::Redstone, 5_800_000, NOW - 10_000),
            price(SourceId::Pyth, 5_842_130, NOW - 5),
            price(SourceId::Chainlink, 5_900_000, NOW - 7_200),
        ])
        .await;

        let round = agg.aggregate_and_publish_round(NOW).await.unwrap();
        assert_eq!(round.answer, 5_842_130);
    }

    #[tokio::test]
    async fn test_no_fresh_sources_keeps_previous_round() {
        let agg = aggregator(&[price(SourceId::Pyth, 5_842_130, NOW)]).await;
        let first = agg.aggregate_and_publish_round(NOW).await.unwrap();

        let later = NOW + 86_400;
        let result = agg.aggregate_and_publish_round(later).await;

        assert!(matches!(result, Err(AppError::NoFreshSources)));
        assert_eq!(agg.latest_round_data().await, Some(first));
    }

    #[tokio::test]
    async fn test_rounds_increase_by_one() {
        let agg = aggregator(&[price(SourceId::Redstone, 100, NOW)]).await;
        assert!(agg.latest_round_data().await.is_none());

        for expected in 1..=5u64 {
            let round = agg.aggregate_and_publish_round(NOW).await.unwrap();
            assert_eq!(round.round_id, expected);
            assert_eq!(round.answered_in_round, round.round_id);
        }
    }

    #[tokio::test]
    async fn test_unconfigured_source_is_ignored() {
        let board = Arc::new(PriceBoard::new());
        board.store(price(SourceId::Redstone, 100, NOW)).await;
        board.store(price(SourceId::Pyth, 300, NOW)).await;

        let agg = Aggregator::new(board, Arc::new(RoundLedger::new(1)), vec![SourceId::Pyth], 60);
        assert_eq!(agg.aggregate_and_publish_round(NOW).await.unwrap().answer, 300);
    }

    #[tokio::test]
    async fn test_concurrent_aggregations_serialize() {
        let agg = Arc::new(aggregator(&[price(SourceId::Redstone, 100, NOW)]).await);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let agg = agg.clone();
                tokio::spawn(async move { agg.aggregate_and_publish_round(NOW).await.unwrap() })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().round_id);
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
    }
}
