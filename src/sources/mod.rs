//! Upstream price sources.
//!
//! Each oracle sits behind a [`SourceAdapter`] that fetches one price,
//! normalizes it to 8 decimals and knows nothing about aggregation. Results
//! land in the shared [`PriceBoard`], one slot per source.

pub mod chainlink;
pub mod pyth;
pub mod redstone;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    error::{AppError, Result},
    types::{format_fixed, Price, SourceId},
};

pub use chainlink::{ChainlinkAdapter, ChainlinkFeed, FeedRound, OnChainFeed};
pub use pyth::{HermesPyth, PythAdapter, PythQuote, PythUpstream};
pub use redstone::{RedstoneAdapter, RedstoneApi, RedstoneQuote, RedstoneUpstream};

/// Default bound on a single fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum age of an upstream answer (24 hours).
pub const DEFAULT_MAX_AGE_SECS: u64 = 86400;

/// Uniform interface to one upstream oracle.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which slot this adapter writes.
    fn source_id(&self) -> SourceId;

    /// Fetch and normalize the current upstream price.
    ///
    /// # Errors
    /// `SourceUnavailable`, `StaleData` or `FeeAboveThreshold`.
    async fn fetch(&self) -> Result<Price>;
}

/// Fail with `StaleData` if `published_at` is older than `max_age` at `now`.
pub(crate) fn ensure_recent(
    source_id: SourceId,
    published_at: u64,
    now: u64,
    max_age: u64,
) -> Result<()> {
    let age = now.saturating_sub(published_at);
    if age > max_age {
        return Err(AppError::StaleData {
            source_id,
            reason: format!("published {}s ago, max age {}s", age, max_age),
        });
    }
    Ok(())
}

// ============================================================================
// Price Board
// ============================================================================

/// Latest price per source. Slots are overwritten, never removed.
#[derive(Debug, Default)]
pub struct PriceBoard {
    prices: RwLock<HashMap<SourceId, Price>>,
}

impl PriceBoard {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot for `price.source_id`.
    pub async fn store(&self, price: Price) {
        self.prices.write().await.insert(price.source_id, price);
    }

    /// Latest stored price for `source_id`.
    pub async fn get(&self, source_id: SourceId) -> Option<Price> {
        self.prices.read().await.get(&source_id).copied()
    }

    /// Stored prices among `sources` observed at most `max_age` seconds before `now`.
    pub async fn fresh(&self, sources: &[SourceId], now: u64, max_age: u64) -> Vec<Price> {
        let guard = self.prices.read().await;
        sources
            .iter()
            .filter_map(|id| guard.get(id))
            .filter(|price| now.saturating_sub(price.observed_at) <= max_age)
            .copied()
            .collect()
    }
}

// ============================================================================
// Source Set
// ============================================================================

/// Outcome of refreshing every source once.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Prices stored this round, in completion order.
    pub fetched: Vec<Price>,
    /// Sources that were skipped and why.
    pub failed: Vec<(SourceId, AppError)>,
}

impl FetchReport {
    /// Ids of the sources that produced a price.
    pub fn succeeded(&self) -> Vec<SourceId> {
        self.fetched.iter().map(|p| p.source_id).collect()
    }
}

/// The configured adapters and the board they write to.
pub struct SourceSet {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    board: Arc<PriceBoard>,
    fetch_timeout: Duration,
}

impl SourceSet {
    /// Create an empty set writing to `board`.
    pub fn new(board: Arc<PriceBoard>, fetch_timeout: Duration) -> Self {
        Self { adapters: Vec::new(), board, fetch_timeout }
    }

    /// Add an adapter.
    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Ids of every configured source.
    pub fn source_ids(&self) -> Vec<SourceId> {
        self.adapters.iter().map(|a| a.source_id()).collect()
    }

    /// Shared board.
    pub fn board(&self) -> &Arc<PriceBoard> {
        &self.board
    }

    /// Fetch every source in parallel, each bounded by the fetch timeout.
    ///
    /// Successful prices are stored before this returns. Failures are
    /// reported, never propagated.
    pub async fn refresh_all(&self) -> FetchReport {
        let handles: Vec<_> = self
            .adapters
            .iter()
            .map(|adapter| {
                let adapter = adapter.clone();
                let board = self.board.clone();
                let timeout = self.fetch_timeout;
                let source_id = adapter.source_id();
                let handle =
                    tokio::spawn(async move { fetch_and_store(adapter, board, timeout).await });
                (source_id, handle)
            })
            .collect();

        let mut report = FetchReport::default();
        for (source_id, handle) in handles {
            let result = handle.await.unwrap_or_else(|e| {
                Err(AppError::SourceUnavailable { source_id, reason: format!("task failed: {}", e) })
            });

            match result {
                Ok(price) => report.fetched.push(price),
                Err(err) => {
                    warn!(source = %source_id, reason = %err, "Skipping source this cycle");
                    report.failed.push((source_id, err));
                }
            }
        }

        info!(
            fetched = report.fetched.len(),
            failed = report.failed.len(),
            "Price sources refreshed"
        );
        report
    }
}

async fn fetch_and_store(
    adapter: Arc<dyn SourceAdapter>,
    board: Arc<PriceBoard>,
    timeout: Duration,
) -> Result<Price> {
    let source_id = adapter.source_id();

    let price = match tokio::time::timeout(timeout, adapter.fetch()).await {
        Ok(result) => result.map_err(|e| e.for_source(source_id))?,
        Err(_) => {
            return Err(AppError::StaleData {
                source_id,
                reason: format!("fetch timed out after {}s", timeout.as_secs()),
            })
        }
    };

    board.store(price).await;
    debug!(source = %source_id, price = %format_fixed(price.value), "Stored price");
    Ok(price)
}
