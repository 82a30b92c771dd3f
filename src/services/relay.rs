//! Attestation relay.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tracing::{info, warn};

use crate::{
    attestation::Attestation,
    bridge::{ApplyCostEstimator, Bridge, RelayJob, RelayReceipt},
    error::{AppError, Result},
    types::DomainId,
};

/// One configured relay target.
#[derive(Clone)]
pub struct Destination {
    /// Human-readable chain name.
    pub name: String,
    /// Bridge domain id.
    pub domain_id: DomainId,
    /// Contract (or applier) the message is addressed to.
    pub recipient: Address,
    /// Dry run of the apply path at this destination.
    pub estimator: Arc<dyn ApplyCostEstimator>,
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Destination")
            .field("name", &self.name)
            .field("domain_id", &self.domain_id)
            .field("recipient", &self.recipient)
            .finish()
    }
}

/// Submits attestations to destinations through a bridge.
pub struct Relay {
    bridge: Arc<dyn Bridge>,
    origin_domain: DomainId,
    fee_cap: Option<U256>,
}

impl Relay {
    /// Create a relay from `origin_domain`. `fee_cap` bounds any single fee.
    pub fn new(bridge: Arc<dyn Bridge>, origin_domain: DomainId, fee_cap: Option<U256>) -> Self {
        Self { bridge, origin_domain, fee_cap }
    }

    /// Origin domain.
    pub fn origin_domain(&self) -> DomainId {
        self.origin_domain
    }

    /// Estimate, fund and submit `attestation` to `destination`.
    ///
    /// # Errors
    /// `FeeEstimationFailed` when the cost or fee cannot be determined,
    /// `InsufficientFee` when the quote exceeds the available funds.
    pub async fn relay(
        &self,
        attestation: &Attestation,
        destination: &Destination,
    ) -> Result<RelayReceipt> {
        let apply_cost =
            destination.estimator.estimate_apply_cost(attestation).await.map_err(|e| {
                AppError::FeeEstimationFailed(format!("apply cost at {}: {}", destination.name, e))
            })?;

        let fee = self
            .bridge
            .estimate_fee(self.origin_domain, destination.domain_id, apply_cost)
            .await
            .map_err(|e| AppError::FeeEstimationFailed(format!("relayer fee: {}", e)))?;
        if fee.is_zero() {
            return Err(AppError::FeeEstimationFailed("relayer fee quote is zero".into()));
        }

        let available = self.available_funds().await?;
        if fee > available {
            warn!(
                destination = %destination.name,
                round_id = attestation.round_id(),
                fee = %fee,
                available = %available,
                "Relayer fee exceeds available funds"
            );
            return Err(AppError::InsufficientFee { required: fee, available });
        }

        let job = RelayJob {
            attestation: *attestation,
            origin_domain: self.origin_domain,
            destination_domain: destination.domain_id,
            estimated_fee: fee,
        };
        let receipt = self.bridge.send(&job, destination.recipient).await?;

        info!(
            destination = %destination.name,
            round_id = receipt.round_id,
            apply_cost,
            fee = %fee,
            reference = %receipt.reference,
            "Relayed attestation"
        );
        Ok(receipt)
    }

    /// Bridge budget, capped by the configured ceiling.
    async fn available_funds(&self) -> Result<U256> {
        let budget = self.bridge.fee_budget().await?;
        Ok(match self.fee_cap {
            Some(cap) => budget.min(cap),
            None => budget,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        attestation::{AttestationDomain, AttestationSigner},
        ethereum::PublisherWallet,
        types::Round,
    };
    use alloy::primitives::B256;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const ORIGIN: DomainId = 6778479;
    const DEST: DomainId = 1869640809;

    struct MockBridge {
        quote: Result<U256>,
        budget: U256,
        sent: Mutex<Vec<RelayJob>>,
    }

    impl MockBridge {
        fn new(quote: Result<U256>, budget: u64) -> Arc<Self> {
            Arc::new(Self { quote, budget: U256::from(budget), sent: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl Bridge for MockBridge {
        async fn estimate_fee(&self, _: DomainId, _: DomainId, _: u64) -> Result<U256> {
            match &self.quote {
                Ok(fee) => Ok(*fee),
                Err(e) => Err(AppError::Http(e.to_string())),
            }
        }

        async fn fee_budget(&self) -> Result<U256> {
            Ok(self.budget)
        }

        async fn send(&self, job: &RelayJob, _recipient: Address) -> Result<RelayReceipt> {
            self.sent.lock().unwrap().push(job.clone());
            Ok(RelayReceipt {
                destination_domain: job.destination_domain,
                round_id: job.attestation.round_id(),
                fee: job.estimated_fee,
                reference: B256::ZERO,
            })
        }
    }

    struct FixedCost(Option<u64>);

    #[async_trait]
    impl ApplyCostEstimator for FixedCost {
        async fn estimate_apply_cost(&self, attestation: &Attestation) -> Result<u64> {
            self.0.ok_or(AppError::StaleRound { incoming: attestation.round_id(), current: 9 })
        }
    }

    fn destination(cost: Option<u64>) -> Destination {
        Destination {
            name: "optimism".into(),
            domain_id: DEST,
            recipient: Address::repeat_byte(0x94),
            estimator: Arc::new(FixedCost(cost)),
        }
    }

    fn attestation() -> Attestation {
        let domain = AttestationDomain::new("PriceBulletin", "1", 100, Address::ZERO);
        let signer = AttestationSigner::new(Some(PublisherWallet::random()), domain);
        signer.sign(&Round::next_after(None, 5_842_130, 1_700_000_000)).unwrap()
    }

    #[tokio::test]
    async fn test_relay_submits_job_with_quoted_fee() {
        let bridge = MockBridge::new(Ok(U256::from(500)), 1_000);
        let relay = Relay::new(bridge.clone(), ORIGIN, None);
        let attestation = attestation();

        let receipt = relay.relay(&attestation, &destination(Some(120_000))).await.unwrap();

        assert_eq!(receipt.fee, U256::from(500));
        let sent = bridge.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].origin_domain, ORIGIN);
        assert_eq!(sent[0].destination_domain, DEST);
        assert_eq!(sent[0].attestation, attestation);
    }

    #[tokio::test]
    async fn test_failed_quote_is_estimation_failure() {
        let bridge = MockBridge::new(Err(AppError::Http("502".into())), 1_000);
        let relay = Relay::new(bridge.clone(), ORIGIN, None);

        let result = relay.relay(&attestation(), &destination(Some(1))).await;
        assert!(matches!(result, Err(AppError::FeeEstimationFailed(_))));
        assert!(bridge.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_quote_is_estimation_failure() {
        let relay = Relay::new(MockBridge::new(Ok(U256::ZERO), 1_000), ORIGIN, None);
        let result = relay.relay(&attestation(), &destination(Some(1))).await;
        assert!(matches!(result, Err(AppError::FeeEstimationFailed(_))));
    }

    #[tokio::test]
    async fn test_failed_cost_estimate_is_estimation_failure() {
        let relay = Relay::new(MockBridge::new(Ok(U256::from(1)), 1_000), ORIGIN, None);
        let result = relay.relay(&attestation(), &destination(None)).await;
        assert!(matches!(result, Err(AppError::FeeEstimationFailed(_))));
    }

    #[tokio::test]
    async fn test_quote_above_budget_is_insufficient() {
        let bridge = MockBridge::new(Ok(U256::from(2_000)), 1_000);
        let relay = Relay::new(bridge.clone(), ORIGIN, None);

        let result = relay.relay(&attestation(), &destination(Some(1))).await;

        assert!(matches!(
            result,
            Err(AppError::InsufficientFee { required, available })
                if required == U256::from(2_000) && available == U256::from(1_000)
        ));
        assert!(bridge.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fee_cap_limits_budget() {
        let relay = Relay::new(MockBridge::new(Ok(U256::from(500)), 1_000), ORIGIN, Some(U256::from(400)));

        let result = relay.relay(&attestation(), &destination(Some(1))).await;
        assert!(matches!(
            result,
            Err(AppError::InsufficientFee { available, .. }) if available == U256::from(400)
        ));
    }
}
