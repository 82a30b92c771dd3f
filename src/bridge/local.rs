//! In-process bridge.
//!
//! Routes payloads over tokio channels to destination appliers running in
//! the same process. Used for local runs and tests.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

use super::{Bridge, RelayJob, RelayReceipt};
use crate::{
    attestation::encode_payload,
    error::{AppError, Result},
    services::DestinationApplier,
    types::DomainId,
};

/// Capacity of each destination's inbound queue.
const CHANNEL_CAPACITY: usize = 64;

/// Channel-backed bridge with a flat per-gas relayer fee.
pub struct LocalBridge {
    routes: RwLock<HashMap<DomainId, mpsc::Sender<Bytes>>>,
    fee_per_gas: U256,
    budget: Mutex<U256>,
}

impl LocalBridge {
    /// Create a bridge charging `fee_per_gas` per unit of apply cost and
    /// holding `budget` for fees.
    pub fn new(fee_per_gas: U256, budget: U256) -> Self {
        Self { routes: RwLock::new(HashMap::new()), fee_per_gas, budget: Mutex::new(budget) }
    }

    /// Route messages for the applier's domain to it, consuming on a new task.
    pub async fn connect(&self, applier: Arc<DestinationApplier>) -> JoinHandle<()> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.routes.write().await.insert(applier.domain_id(), tx);
        applier.spawn_consumer(rx)
    }

    /// Drop every route, letting the consumers drain and exit.
    pub async fn disconnect_all(&self) {
        self.routes.write().await.clear();
    }

    /// Replace the fee budget.
    pub async fn set_budget(&self, budget: U256) {
        *self.budget.lock().await = budget;
    }
}

#[async_trait]
impl Bridge for LocalBridge {
    async fn estimate_fee(
        &self,
        _origin: DomainId,
        destination: DomainId,
        apply_cost: u64,
    ) -> Result<U256> {
        if !self.routes.read().await.contains_key(&destination) {
            return Err(AppError::UnknownDomain(destination));
        }
        Ok(self.fee_per_gas.saturating_mul(U256::from(apply_cost)))
    }

    async fn fee_budget(&self) -> Result<U256> {
        Ok(*self.budget.lock().await)
    }

    async fn send(&self, job: &RelayJob, recipient: Address) -> Result<RelayReceipt> {
        let sender = self
            .routes
            .read()
            .await
            .get(&job.destination_domain)
            .cloned()
            .ok_or(AppError::UnknownDomain(job.destination_domain))?;

        let mut budget = self.budget.lock().await;
        let remaining = budget.checked_sub(job.estimated_fee).ok_or(AppError::InsufficientFee {
            required: job.estimated_fee,
            available: *budget,
        })?;

        sender.try_send(encode_payload(&job.attestation)).map_err(|e| {
            AppError::Transport(format!("domain {} queue: {}", job.destination_domain, e))
        })?;
        *budget = remaining;
        drop(budget);

        debug!(
            destination = job.destination_domain,
            recipient = %recipient,
            round_id = job.attestation.round_id(),
            "Queued attestation"
        );

        Ok(RelayReceipt {
            destination_domain: job.destination_domain,
            round_id: job.attestation.round_id(),
            fee: job.estimated_fee,
            reference: job.attestation.digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        attestation::{AttestationDomain, AttestationSigner},
        ethereum::PublisherWallet,
        services::{PublisherRegistry, RoundLedger},
        types::Round,
    };

    const DEST: DomainId = 1869640809;

    fn domain() -> AttestationDomain {
        AttestationDomain::new("PriceBulletin", "1", 100, Address::repeat_byte(0x42))
    }

    async fn connected(bridge: &LocalBridge, wallet: &PublisherWallet) -> Arc<DestinationApplier> {
        let registry = PublisherRegistry::with_publishers(Address::ZERO, [wallet.address()]);
        let applier = Arc::new(DestinationApplier::new(
            domain(),
            Arc::new(RoundLedger::new(DEST)),
            Arc::new(registry),
        ));
        bridge.connect(applier.clone()).await;
        applier
    }

    fn job(wallet: &PublisherWallet, round_id: u64, fee: u64) -> RelayJob {
        let signer = AttestationSigner::new(Some(wallet.clone()), domain());
        let round = Round::next_after(None, 5_842_130, 1_700_000_000);
        let round = Round { round_id, answered_in_round: round_id, ..round };
        RelayJob {
            attestation: signer.sign(&round).unwrap(),
            origin_domain: 6778479,
            destination_domain: DEST,
            estimated_fee: U256::from(fee),
        }
    }

    #[tokio::test]
    async fn test_estimate_requires_route() {
        let bridge = LocalBridge::new(U256::from(2), U256::from(1_000));
        assert!(matches!(
            bridge.estimate_fee(6778479, DEST, 10).await,
            Err(AppError::UnknownDomain(DEST))
        ));

        connected(&bridge, &PublisherWallet::random()).await;
        assert_eq!(bridge.estimate_fee(6778479, DEST, 10).await.unwrap(), U256::from(20));
    }

    #[tokio::test]
    async fn test_send_delivers_and_charges_budget() {
        let wallet = PublisherWallet::random();
        let bridge = LocalBridge::new(U256::from(1), U256::from(1_000));
        let applier = connected(&bridge, &wallet).await;

        let receipt = bridge.send(&job(&wallet, 1, 400), Address::ZERO).await.unwrap();
        assert_eq!(receipt.round_id, 1);
        assert_eq!(bridge.fee_budget().await.unwrap(), U256::from(600));

        // Delivery is asynchronous.
        for _ in 0..100 {
            if applier.latest_round_data().await.is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(applier.latest_round_data().await.map(|r| r.round_id), Some(1));
    }

    #[tokio::test]
    async fn test_send_over_budget_keeps_budget() {
        let wallet = PublisherWallet::random();
        let bridge = LocalBridge::new(U256::from(1), U256::from(100));
        connected(&bridge, &wallet).await;

        let result = bridge.send(&job(&wallet, 1, 400), Address::ZERO).await;
        assert!(matches!(result, Err(AppError::InsufficientFee { .. })));
        assert_eq!(bridge.fee_budget().await.unwrap(), U256::from(100));
    }
}
