//! Cross-domain messaging.
//!
//! The relay hands a [`RelayJob`] to a [`Bridge`] and returns; destinations
//! consume delivered payloads on their own schedule.

pub mod connext;
pub mod local;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::{attestation::Attestation, error::Result, types::DomainId};

pub use connext::{BulletinGasEstimator, ConnextBridge};
pub use local::LocalBridge;

/// One relay attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayJob {
    /// Attestation being delivered.
    pub attestation: Attestation,
    /// Domain the attestation is sent from.
    pub origin_domain: DomainId,
    /// Domain the attestation is sent to.
    pub destination_domain: DomainId,
    /// Relayer fee paid for delivery.
    pub estimated_fee: U256,
}

/// Acknowledgement that the bridge accepted a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReceipt {
    /// Destination domain.
    pub destination_domain: DomainId,
    /// Relayed round id.
    pub round_id: u64,
    /// Fee paid.
    pub fee: U256,
    /// Bridge message reference (transaction hash or local message id).
    pub reference: B256,
}

/// Generic cross-domain messaging bridge.
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Quote the relayer fee for delivering a message whose execution costs
    /// `apply_cost` gas at the destination.
    async fn estimate_fee(
        &self,
        origin: DomainId,
        destination: DomainId,
        apply_cost: u64,
    ) -> Result<U256>;

    /// Funds available to pay relayer fees.
    async fn fee_budget(&self) -> Result<U256>;

    /// Submit `job` to `recipient` on the destination domain. Does not wait
    /// for delivery.
    async fn send(&self, job: &RelayJob, recipient: Address) -> Result<RelayReceipt>;
}

/// Estimates what applying an attestation costs at a destination.
#[async_trait]
pub trait ApplyCostEstimator: Send + Sync {
    /// Gas-equivalent cost of applying `attestation`, without mutating state.
    async fn estimate_apply_cost(&self, attestation: &Attestation) -> Result<u64>;
}
