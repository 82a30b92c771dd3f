//! Round state per domain.
//!
//! A [`RoundLedger`] is the only mutation surface for a domain's latest
//! round. Every write happens under the ledger's write lock, so the
//! monotonicity check and the overwrite are one atomic step.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    error::{AppError, Result},
    types::{DomainId, Round},
};

/// Latest round for one domain, optionally persisted as a JSON snapshot.
#[derive(Debug)]
pub struct RoundLedger {
    domain_id: DomainId,
    latest: RwLock<Option<Round>>,
    snapshot: Option<PathBuf>,
}

impl RoundLedger {
    /// Create an empty in-memory ledger.
    pub fn new(domain_id: DomainId) -> Self {
        Self { domain_id, latest: RwLock::new(None), snapshot: None }
    }

    /// Create a ledger backed by a snapshot file, loading it if it exists.
    pub async fn with_snapshot(domain_id: DomainId, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let latest = load_snapshot(&path).await?;

        if let Some(round) = &latest {
            info!(
                domain = domain_id,
                round_id = round.round_id,
                path = %path.display(),
                "Loaded round snapshot"
            );
        }

        Ok(Self { domain_id, latest: RwLock::new(latest), snapshot: Some(path) })
    }

    /// Domain this ledger belongs to.
    pub fn domain_id(&self) -> DomainId {
        self.domain_id
    }

    /// Most recent round, if any. Never a partially written one.
    pub async fn latest(&self) -> Option<Round> {
        *self.latest.read().await
    }

    /// Id of the most recent round, 0 when empty.
    pub async fn latest_round_id(&self) -> u64 {
        self.latest().await.map_or(0, |r| r.round_id)
    }

    /// Append the round following the current one with `answer` at `now`.
    pub async fn commit_next(&self, answer: i128, now: u64) -> Result<Round> {
        let mut guard = self.latest.write().await;
        let round = Round::next_after(guard.as_ref(), answer, now);

        self.persist(&round).await?;
        *guard = Some(round);

        debug!(domain = self.domain_id, round_id = round.round_id, "Committed next round");
        Ok(round)
    }

    /// Overwrite the stored round with `round` if it is strictly newer.
    pub async fn advance_to(&self, round: Round) -> Result<Round> {
        let mut guard = self.latest.write().await;
        let current = guard.as_ref().map_or(0, |r| r.round_id);

        if round.round_id <= current {
            return Err(AppError::StaleRound { incoming: round.round_id, current });
        }

        self.persist(&round).await?;
        *guard = Some(round);

        debug!(domain = self.domain_id, round_id = round.round_id, "Advanced to round");
        Ok(round)
    }

    /// Write the snapshot before the in-memory state changes; a failed write
    /// leaves the previous round canonical.
    async fn persist(&self, round: &Round) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(round)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

async fn load_snapshot(path: &Path) -> Result<Option<Round>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Ledgers keyed by domain.
#[derive(Debug, Default)]
pub struct RoundStore {
    ledgers: RwLock<HashMap<DomainId, Arc<RoundLedger>>>,
}

impl RoundStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an existing ledger, replacing any previous one for its domain.
    pub async fn insert(&self, ledger: Arc<RoundLedger>) {
        self.ledgers.write().await.insert(ledger.domain_id(), ledger);
    }

    /// Ledger for `domain_id`, created empty on first use.
    pub async fn ledger(&self, domain_id: DomainId) -> Arc<RoundLedger> {
        if let Some(ledger) = self.ledgers.read().await.get(&domain_id) {
            return ledger.clone();
        }

        let mut guard = self.ledgers.write().await;
        guard.entry(domain_id).or_insert_with(|| Arc::new(RoundLedger::new(domain_id))).clone()
    }

    /// Latest round of every known domain.
    pub async fn snapshot(&self) -> Vec<(DomainId, Option<Round>)> {
        let ledgers: Vec<Arc<RoundLedger>> = self.ledgers.read().await.values().cloned().collect();

        let mut out = Vec::with_capacity(ledgers.len());
        for ledger in ledgers {
            out.push((ledger.domain_id(), ledger.latest().await));
        }
        out.sort_by_key(|(domain, _)| *domain);
        out
    }
}
