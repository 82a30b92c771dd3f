//! Common utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{address, Address, Bytes, U256};
use async_trait::async_trait;

use price_bulletin::{
    attestation::{AttestationDomain, AttestationSigner},
    bridge::LocalBridge,
    ethereum::PublisherWallet,
    services::{
        Aggregator, Destination, DestinationApplier, Pipeline, PublisherRegistry, Relay,
        RoundLedger,
    },
    sources::{PriceBoard, PythQuote, PythUpstream, SourceAdapter, SourceSet, DEFAULT_MAX_AGE_SECS},
    types::{current_timestamp, DomainId, Price, Round, SourceId},
    AppError, BulletinNode, Config, Result, AGGREGATOR_ADDRESS, GNOSIS_DOMAIN_ID,
};

pub const OPTIMISM: DomainId = 1869640809;
pub const ARBITRUM: DomainId = 1634886255;

/// Registry owner used by every harness registry.
pub const OWNER: Address = address!("0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a");

/// Source returning a fixed value after an optional delay.
pub struct StaticSource {
    id: SourceId,
    value: i128,
    delay: Duration,
}

impl StaticSource {
    pub fn new(id: SourceId, value: i128) -> Arc<Self> {
        Arc::new(Self { id, value, delay: Duration::ZERO })
    }

    pub fn slow(id: SourceId, value: i128, delay: Duration) -> Arc<Self> {
        Arc::new(Self { id, value, delay })
    }
}

#[async_trait]
impl SourceAdapter for StaticSource {
    fn source_id(&self) -> SourceId {
        self.id
    }

    async fn fetch(&self) -> Result<Price> {
        tokio::time::sleep(self.delay).await;
        let now = current_timestamp();
        Ok(Price { source_id: self.id, value: self.value, observed_at: now, published_at: now })
    }
}

/// Source whose upstream is always down.
pub struct FailingSource(pub SourceId);

#[async_trait]
impl SourceAdapter for FailingSource {
    fn source_id(&self) -> SourceId {
        self.0
    }

    async fn fetch(&self) -> Result<Price> {
        Err(AppError::SourceUnavailable { source_id: self.0, reason: "connection refused".into() })
    }
}

/// Pyth upstream with a fixed quote and update fee, recording payments.
pub struct StaticPyth {
    price: i128,
    fee: U256,
    pub paid: Mutex<Vec<U256>>,
}

impl StaticPyth {
    pub fn new(price: i128, fee: u64) -> Arc<Self> {
        Arc::new(Self { price, fee: U256::from(fee), paid: Mutex::new(Vec::new()) })
    }
}

#[async_trait]
impl PythUpstream for StaticPyth {
    async fn latest_update(&self) -> Result<PythQuote> {
        Ok(PythQuote {
            price: self.price,
            expo: -8,
            publish_time: current_timestamp(),
            update_data: vec![Bytes::from_static(&[0x50, 0x4e, 0x41, 0x55])],
        })
    }

    async fn update_fee(&self, _update_data: &[Bytes]) -> Result<U256> {
        Ok(self.fee)
    }

    async fn submit_update(&self, _update_data: Vec<Bytes>, fee: U256) -> Result<()> {
        self.paid.lock().unwrap().push(fee);
        Ok(())
    }
}

/// Origin pipeline relaying over a [`LocalBridge`] to in-process destinations.
pub struct Harness {
    pub pipeline: Arc<Pipeline>,
    pub origin: Arc<RoundLedger>,
    pub bridge: Arc<LocalBridge>,
    pub appliers: Vec<Arc<DestinationApplier>>,
    pub signer: AttestationSigner,
    pub domain: AttestationDomain,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            sources: Vec::new(),
            destinations: Vec::new(),
            budget: U256::MAX,
            with_key: true,
        }
    }

    /// Publisher address, if the harness signs.
    pub fn publisher(&self) -> Option<Address> {
        self.signer.address()
    }

    pub fn applier(&self, domain_id: DomainId) -> &Arc<DestinationApplier> {
        self.appliers.iter().find(|a| a.domain_id() == domain_id).unwrap()
    }
}

pub struct HarnessBuilder {
    sources: Vec<Arc<dyn SourceAdapter>>,
    destinations: Vec<(&'static str, DomainId, bool)>,
    budget: U256,
    with_key: bool,
}

impl HarnessBuilder {
    pub fn source(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.sources.push(adapter);
        self
    }

    /// Destination whose registry authorizes the harness publisher.
    pub fn destination(mut self, name: &'static str, domain_id: DomainId) -> Self {
        self.destinations.push((name, domain_id, true));
        self
    }

    /// Destination whose registry does not know the harness publisher.
    pub fn unauthorized_destination(mut self, name: &'static str, domain_id: DomainId) -> Self {
        self.destinations.push((name, domain_id, false));
        self
    }

    pub fn budget(mut self, budget: u64) -> Self {
        self.budget = U256::from(budget);
        self
    }

    pub fn without_key(mut self) -> Self {
        self.with_key = false;
        self
    }

    pub async fn build(self) -> Harness {
        let wallet = self.with_key.then(PublisherWallet::random);
        let publisher = wallet.as_ref().map(PublisherWallet::address);

        let domain = AttestationDomain::new("PriceBulletin", "1", 100, AGGREGATOR_ADDRESS);
        let signer = AttestationSigner::new(wallet, domain.clone());

        let board = Arc::new(PriceBoard::new());
        let sources = self
            .sources
            .into_iter()
            .fold(SourceSet::new(board.clone(), Duration::from_secs(5)), |set, adapter| {
                set.with_adapter(adapter)
            });

        let origin = Arc::new(RoundLedger::new(GNOSIS_DOMAIN_ID));
        let aggregator =
            Aggregator::new(board, origin.clone(), sources.source_ids(), DEFAULT_MAX_AGE_SECS);

        let bridge = Arc::new(LocalBridge::new(U256::from(1), self.budget));
        let mut appliers = Vec::new();
        let mut destinations = Vec::new();
        for (name, domain_id, authorized) in self.destinations {
            let publishers = match (authorized, publisher) {
                (true, Some(p)) => PublisherRegistry::with_publishers(OWNER, [p]),
                _ => PublisherRegistry::new(OWNER),
            };
            let applier = Arc::new(DestinationApplier::new(
                domain.clone(),
                Arc::new(RoundLedger::new(domain_id)),
                Arc::new(publishers),
            ));
            bridge.connect(applier.clone()).await;
            destinations.push(Destination {
                name: name.to_string(),
                domain_id,
                recipient: Address::repeat_byte(0x94),
                estimator: applier.clone(),
            });
            appliers.push(applier);
        }

        let origin_publishers = Arc::new(PublisherRegistry::with_publishers(OWNER, publisher));
        let relay = Relay::new(bridge.clone(), GNOSIS_DOMAIN_ID, None);
        let pipeline = Pipeline::new(
            sources,
            aggregator,
            signer.clone(),
            origin_publishers,
            relay,
            destinations,
        );

        Harness { pipeline: Arc::new(pipeline), origin, bridge, appliers, signer, domain }
    }
}

/// Wait until `applier` mirrors `round_id`, panicking after two seconds.
pub async fn wait_for_round(applier: &DestinationApplier, round_id: u64) -> Round {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(round) = applier.latest_round_data().await {
                if round.round_id >= round_id {
                    return round;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("destination did not apply the round in time")
}

/// Helper to create a node from environment variables.
pub async fn create_test_node() -> Option<BulletinNode> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let rpc_url = std::env::var("ORIGIN_RPC_URL").ok()?;
    let private_key = std::env::var("PUBLISHER_PRIVATE_KEY").ok()?;

    if rpc_url.is_empty() || private_key.is_empty() {
        return None;
    }

    let mut config = Config::from_lookup(|key: &str| match key {
        "BRIDGE_MODE" => Some("local".to_string()),
        _ => std::env::var(key).ok(),
    })
    .ok()?;
    config.log_level = "warn".to_string();

    BulletinNode::new(config).await.ok()
}

/// Skip test if the node cannot be created (missing env vars).
#[macro_export]
macro_rules! skip_if_no_node {
    () => {
        match common::create_test_node().await {
            Some(node) => node,
            None => {
                eprintln!("Skipping test: ORIGIN_RPC_URL or PUBLISHER_PRIVATE_KEY not set");
                return;
            }
        }
    };
}
