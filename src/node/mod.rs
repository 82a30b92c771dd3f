//! Publisher node wiring.
//!
//! Builds the publication pipeline and its schedule from [`Config`].

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tokio::task::JoinHandle;

use crate::{
    attestation::{AttestationDomain, AttestationSigner},
    bridge::{Bridge, BulletinGasEstimator, ConnextBridge, LocalBridge},
    config::{BridgeMode, Config},
    error::{AppError, Result},
    ethereum::{EthereumClient, PublisherWallet},
    services::{
        Aggregator, Destination, DestinationApplier, Pipeline, PublisherRegistry, Relay,
        RoundLedger, RoundStore, Schedule, Scheduler,
    },
    sources::{
        ChainlinkAdapter, HermesPyth, OnChainFeed, PriceBoard, PythAdapter, RedstoneAdapter,
        RedstoneApi, SourceSet,
    },
};

/// Relayer fee per unit of apply cost charged by the in-process bridge.
const LOCAL_FEE_PER_GAS: u64 = 1;

/// A configured publisher: pipeline, schedule and round state.
pub struct BulletinNode {
    pipeline: Arc<Pipeline>,
    schedule: Schedule,
    rounds: Arc<RoundStore>,
    consumers: Vec<JoinHandle<()>>,
}

impl BulletinNode {
    /// Build a node from configuration.
    ///
    /// Note: no network calls are made here. RPC and HTTP connections are
    /// established on the first cycle.
    pub async fn new(config: Config) -> Result<Self> {
        tracing::info!("Initializing price bulletin node");

        let wallet =
            config.private_key.as_deref().map(PublisherWallet::from_private_key).transpose()?;
        let publisher = wallet.as_ref().map(PublisherWallet::address);
        if publisher.is_none() {
            tracing::warn!("PUBLISHER_PRIVATE_KEY not set, rounds will not be signed");
        }

        // Origin client signs Pyth updates and bridge calls
        let client = EthereumClient::new(&config.origin_rpc_url, wallet.as_ref())?;

        let board = Arc::new(PriceBoard::new());
        let sources = build_sources(&config, &client, board.clone())?;

        let rounds = Arc::new(RoundStore::new());
        let origin_ledger = match &config.round_state_path {
            Some(path) => RoundLedger::with_snapshot(config.origin_domain, path.clone()).await?,
            None => RoundLedger::new(config.origin_domain),
        };
        let origin_ledger = Arc::new(origin_ledger);
        rounds.insert(origin_ledger.clone()).await;

        let aggregator =
            Aggregator::new(board, origin_ledger, sources.source_ids(), config.source_max_age);

        let attestation_domain = AttestationDomain::new(
            config.attestation_domain_name.clone(),
            config.attestation_domain_version.clone(),
            config.origin_chain_id,
            config.aggregator_address,
        );

        let owner = config.owner_address.or(publisher).unwrap_or(Address::ZERO);
        let origin_publishers = Arc::new(PublisherRegistry::with_publishers(owner, publisher));

        let mut consumers = Vec::new();
        let (bridge, destinations): (Arc<dyn Bridge>, Vec<Destination>) = match config.bridge_mode {
            BridgeMode::Connext => {
                let bridge = ConnextBridge::new(
                    client.clone(),
                    config.connext_address,
                    config.connext_sdk_url.clone(),
                )?;
                (Arc::new(bridge) as Arc<dyn Bridge>, connext_destinations(&config, publisher)?)
            }
            BridgeMode::Local => {
                let budget = config.relay_fee_cap.unwrap_or(U256::MAX);
                let bridge = Arc::new(LocalBridge::new(U256::from(LOCAL_FEE_PER_GAS), budget));

                let mut destinations = Vec::with_capacity(config.destinations.len());
                for network in &config.destinations {
                    let applier = Arc::new(DestinationApplier::new(
                        attestation_domain.clone(),
                        rounds.ledger(network.domain_id).await,
                        Arc::new(PublisherRegistry::with_publishers(owner, publisher)),
                    ));
                    consumers.push(bridge.connect(applier.clone()).await);
                    destinations.push(Destination {
                        name: network.name.to_string(),
                        domain_id: network.domain_id,
                        recipient: config.bulletin_address,
                        estimator: applier,
                    });
                }
                (bridge as Arc<dyn Bridge>, destinations)
            }
        };

        let relay = Relay::new(bridge, config.origin_domain, config.relay_fee_cap);
        let signer = AttestationSigner::new(wallet, attestation_domain);
        let schedule = Schedule::parse(&config.schedule_timezone, &config.schedule_times)?;

        tracing::info!(
            sources = ?sources.source_ids(),
            destinations = destinations.len(),
            bridge = ?config.bridge_mode,
            "Price bulletin node initialized successfully"
        );

        let pipeline =
            Pipeline::new(sources, aggregator, signer, origin_publishers, relay, destinations);

        Ok(Self { pipeline: Arc::new(pipeline), schedule, rounds, consumers })
    }

    /// The publication pipeline.
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// The publication schedule.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Round state for the origin and in-process destinations.
    pub fn rounds(&self) -> &Arc<RoundStore> {
        &self.rounds
    }

    /// Run on schedule until Ctrl-C.
    pub async fn run(self) {
        Scheduler::new(self.schedule.clone(), self.pipeline.clone()).run().await;

        for (domain_id, round) in self.rounds.snapshot().await {
            match round {
                Some(round) => tracing::info!(domain_id, round = %round, "Final round"),
                None => tracing::info!(domain_id, "No round published"),
            }
        }

        for consumer in self.consumers {
            consumer.abort();
        }
    }
}

fn build_sources(
    config: &Config,
    client: &EthereumClient,
    board: Arc<PriceBoard>,
) -> Result<SourceSet> {
    let redstone = RedstoneApi::new(config.redstone_url.clone(), config.redstone_symbol.clone())?;
    let pyth = HermesPyth::new(
        config.hermes_url.clone(),
        config.pyth_price_id,
        client.clone(),
        config.pyth_address,
    )?;

    let mut sources = SourceSet::new(board, config.fetch_timeout)
        .with_adapter(Arc::new(RedstoneAdapter::new(Arc::new(redstone), config.source_max_age)))
        .with_adapter(Arc::new(PythAdapter::new(
            Arc::new(pyth),
            config.pyth_fee_ceiling,
            config.source_max_age,
        )));

    match config.chainlink_feed {
        Some(feed) => {
            let feed = OnChainFeed::new(client.clone(), feed);
            sources = sources.with_adapter(Arc::new(ChainlinkAdapter::new(
                Arc::new(feed),
                config.source_max_age,
            )));
        }
        None => tracing::warn!("CHAINLINK_FEED not set, Chainlink source disabled"),
    }

    Ok(sources)
}

fn connext_destinations(config: &Config, publisher: Option<Address>) -> Result<Vec<Destination>> {
    config
        .destinations
        .iter()
        .map(|network| {
            let rpc_url = config.destination_rpc_url(network.domain_id).ok_or_else(|| {
                AppError::Config(format!("No RPC URL for destination {}", network.name))
            })?;
            let estimator = BulletinGasEstimator::new(
                EthereumClient::new(rpc_url, None)?,
                config.bulletin_address,
                network.connext,
                config.origin_domain,
                publisher.unwrap_or(Address::ZERO),
            );
            Ok(Destination {
                name: network.name.to_string(),
                domain_id: network.domain_id,
                recipient: config.bulletin_address,
                estimator: Arc::new(estimator),
            })
        })
        .collect()
}
