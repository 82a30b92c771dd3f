//! One publication cycle: fetch, aggregate, sign, relay.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    attestation::{Attestation, AttestationSigner},
    bridge::RelayReceipt,
    error::{AppError, Result},
    services::{Aggregator, Destination, PublisherRegistry, Relay},
    sources::SourceSet,
    types::{current_timestamp, DomainId, Round, SourceId},
};

/// Relay result for one destination.
#[derive(Debug)]
pub struct RelayOutcome {
    /// Destination name.
    pub destination: String,
    /// Destination domain.
    pub domain_id: DomainId,
    /// Receipt, or why the relay was aborted.
    pub result: std::result::Result<RelayReceipt, AppError>,
}

/// What one cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Sources that produced a price.
    pub fetched: Vec<SourceId>,
    /// Sources skipped this cycle.
    pub skipped: Vec<(SourceId, AppError)>,
    /// Round produced, if aggregation succeeded.
    pub round: Option<Round>,
    /// Attestation produced, if signing succeeded.
    pub attestation: Option<Attestation>,
    /// Per-destination relay results.
    pub relays: Vec<RelayOutcome>,
    /// Error that stopped the cycle before relaying.
    pub halted: Option<AppError>,
}

impl CycleReport {
    /// Number of destinations the attestation was submitted to.
    pub fn relayed(&self) -> usize {
        self.relays.iter().filter(|r| r.result.is_ok()).count()
    }
}

/// Wires sources, aggregator, signer and relay into one cycle.
pub struct Pipeline {
    sources: SourceSet,
    aggregator: Aggregator,
    signer: AttestationSigner,
    origin_publishers: Arc<PublisherRegistry>,
    relay: Relay,
    destinations: Vec<Destination>,
    running: Mutex<()>,
}

impl Pipeline {
    /// Create a pipeline.
    pub fn new(
        sources: SourceSet,
        aggregator: Aggregator,
        signer: AttestationSigner,
        origin_publishers: Arc<PublisherRegistry>,
        relay: Relay,
        destinations: Vec<Destination>,
    ) -> Self {
        Self {
            sources,
            aggregator,
            signer,
            origin_publishers,
            relay,
            destinations,
            running: Mutex::new(()),
        }
    }

    /// Origin aggregator.
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Configured destinations.
    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    /// Run one cycle.
    ///
    /// Stage failures are recorded in the report, not returned.
    ///
    /// # Errors
    /// `CycleInProgress` if another cycle is still running.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _running = self.running.try_lock().map_err(|_| AppError::CycleInProgress)?;

        info!("Starting cycle");
        let mut report = CycleReport::default();

        let fetch = self.sources.refresh_all().await;
        report.fetched = fetch.succeeded();
        report.skipped = fetch.failed;

        let round = match self.aggregator.aggregate_and_publish_round(current_timestamp()).await {
            Ok(round) => round,
            Err(err) => {
                error!(reason = %err, "Aggregation failed, keeping previous round");
                report.halted = Some(err);
                return Ok(report);
            }
        };
        report.round = Some(round);

        let attestation = match self.signer.sign_authorized(&round, &self.origin_publishers).await {
            Ok(attestation) => attestation,
            Err(err) => {
                error!(round_id = round.round_id, reason = %err, "Signing failed, nothing relayed");
                report.halted = Some(err);
                return Ok(report);
            }
        };
        report.attestation = Some(attestation);

        for destination in &self.destinations {
            let result = self.relay.relay(&attestation, destination).await;
            if let Err(err) = &result {
                warn!(
                    round_id = round.round_id,
                    destination = %destination.name,
                    reason = %err,
                    "Relay aborted"
                );
            }
            report.relays.push(RelayOutcome {
                destination: destination.name.clone(),
                domain_id: destination.domain_id,
                result,
            });
        }

        info!(
            round_id = round.round_id,
            answer = %round.formatted_answer(),
            sources = report.fetched.len(),
            relayed = report.relayed(),
            destinations = self.destinations.len(),
            "Cycle complete"
        );
        Ok(report)
    }
}
