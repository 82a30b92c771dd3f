//! Destination-side attestation verification and application.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    attestation::{decode_payload, recover_publisher, Attestation, AttestationDomain},
    bridge::ApplyCostEstimator,
    error::{AppError, Result},
    services::{PublisherRegistry, RoundLedger},
    types::{DomainId, Round},
};

/// Gas-equivalent cost of one verified application: signature recovery plus
/// one round overwrite.
pub const APPLY_GAS_COST: u64 = 120_000;

/// Lifecycle of one attestation at a destination, keyed by digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationState {
    /// Not seen yet.
    Idle,
    /// Signature and authorization are being checked.
    Verifying,
    /// Verified; the round is being written.
    Applying,
    /// The round is the destination's latest (or was, before a newer one).
    Applied,
    /// Rejected with the given reason. Nothing was written.
    Rejected(String),
}

impl ApplicationState {
    /// Whether no further transition is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationState::Applied | ApplicationState::Rejected(_))
    }
}

/// Verifies inbound attestations and mirrors their rounds locally.
///
/// Applications are serialized, so the state of a digest is only ever moved
/// by one delivery at a time. States are tracked for the current round and
/// anything newer; older digests are forgotten once a round is applied.
pub struct DestinationApplier {
    domain_id: DomainId,
    attestation_domain: AttestationDomain,
    ledger: Arc<RoundLedger>,
    publishers: Arc<PublisherRegistry>,
    states: RwLock<HashMap<B256, (u64, ApplicationState)>>,
    applying: Mutex<()>,
}

impl DestinationApplier {
    /// Create an applier writing to `ledger`, trusting `publishers`.
    pub fn new(
        attestation_domain: AttestationDomain,
        ledger: Arc<RoundLedger>,
        publishers: Arc<PublisherRegistry>,
    ) -> Self {
        Self {
            domain_id: ledger.domain_id(),
            attestation_domain,
            ledger,
            publishers,
            states: RwLock::new(HashMap::new()),
            applying: Mutex::new(()),
        }
    }

    /// Domain this applier serves.
    pub fn domain_id(&self) -> DomainId {
        self.domain_id
    }

    /// Local publisher registry.
    pub fn publishers(&self) -> &Arc<PublisherRegistry> {
        &self.publishers
    }

    /// Latest mirrored round.
    pub async fn latest_round_data(&self) -> Option<Round> {
        self.ledger.latest().await
    }

    /// State of the attestation with `digest`.
    ///
    /// Digests of rounds older than the latest applied one read as `Idle`.
    pub async fn state_of(&self, digest: &B256) -> ApplicationState {
        let states = self.states.read().await;
        states.get(digest).map_or(ApplicationState::Idle, |(_, state)| state.clone())
    }

    /// Number of digests whose state is tracked.
    pub async fn tracked(&self) -> usize {
        self.states.read().await.len()
    }

    /// Decode a bridge payload and apply it.
    pub async fn receive(&self, payload: &[u8]) -> Result<Round> {
        let attestation = decode_payload(payload, &self.attestation_domain)?;
        self.apply(&attestation).await
    }

    /// Verify `attestation` and overwrite the local round with it.
    ///
    /// # Errors
    /// `InvalidSignature`, `UnauthorizedPublisher` or `StaleRound`; the local
    /// round is untouched on any error.
    pub async fn apply(&self, attestation: &Attestation) -> Result<Round> {
        let _applying = self.applying.lock().await;
        self.transition(attestation, ApplicationState::Verifying).await;

        let outcome = match self.verify(attestation).await {
            Ok(publisher) => {
                self.transition(attestation, ApplicationState::Applying).await;
                self.ledger.advance_to(attestation.round).await.map(|round| (round, publisher))
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok((round, publisher)) => {
                self.transition(attestation, ApplicationState::Applied).await;
                self.prune_before(round.round_id).await;
                info!(
                    destination = self.domain_id,
                    round_id = round.round_id,
                    publisher = %publisher,
                    "Applied attestation"
                );
                Ok(round)
            }
            Err(err) => {
                self.transition(attestation, ApplicationState::Rejected(err.to_string())).await;
                warn!(
                    destination = self.domain_id,
                    round_id = attestation.round_id(),
                    reason = %err,
                    "Rejected attestation"
                );
                Err(err)
            }
        }
    }

    /// Check signature and publisher; returns the recovered publisher.
    async fn verify(&self, attestation: &Attestation) -> Result<Address> {
        let signature = attestation.signature.to_signature()?;
        let (digest, publisher) =
            recover_publisher(&attestation.round, &signature, &self.attestation_domain)?;

        if digest != attestation.digest {
            return Err(AppError::InvalidSignature(format!(
                "digest mismatch: claimed {}, computed {}",
                attestation.digest, digest
            )));
        }

        if !self.publishers.is_authorized(publisher).await {
            return Err(AppError::UnauthorizedPublisher(publisher));
        }

        Ok(publisher)
    }

    /// `Applied` is final: a duplicate delivery never moves it.
    async fn transition(&self, attestation: &Attestation, state: ApplicationState) {
        let mut states = self.states.write().await;
        match states.get(&attestation.digest) {
            Some((_, ApplicationState::Applied)) => {}
            _ => {
                states.insert(attestation.digest, (attestation.round_id(), state));
            }
        }
    }

    async fn prune_before(&self, round_id: u64) {
        self.states.write().await.retain(|_, (id, _)| *id >= round_id);
    }

    /// Consume bridge payloads until the channel closes.
    pub fn spawn_consumer(self: Arc<Self>, mut rx: mpsc::Receiver<Bytes>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                // Outcome is logged by apply.
                if let Err(err) = self.receive(&payload).await {
                    if !err.is_verification_level() {
                        warn!(destination = self.domain_id, reason = %err, "Undecodable payload");
                    }
                }
            }
            info!(destination = self.domain_id, "Bridge channel closed");
        })
    }
}

#[async_trait]
impl ApplyCostEstimator for DestinationApplier {
    /// Dry run of [`DestinationApplier::apply`].
    async fn estimate_apply_cost(&self, attestation: &Attestation) -> Result<u64> {
        self.verify(attestation).await?;

        let current = self.ledger.latest_round_id().await;
        if attestation.round_id() <= current {
            return Err(AppError::StaleRound { incoming: attestation.round_id(), current });
        }
        Ok(APPLY_GAS_COST)
    }
}
