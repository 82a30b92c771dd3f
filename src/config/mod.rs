//! Configuration management module.
//!
//! Handles loading configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};

use crate::{
    error::AppError,
    ethereum::constants::{
        network_by_domain, network_by_name, BridgeNetwork, AGGREGATOR_ADDRESS,
        ATTESTATION_DOMAIN_NAME, ATTESTATION_DOMAIN_VERSION, BULLETIN_ADDRESS, CONNEXT_SDK_URL,
        DEFAULT_ORIGIN_CHAIN_ID, GNOSIS_DOMAIN_ID, HERMES_URL, PYTH_GNOSIS_ADDRESS,
        PYTH_MXN_USD_PRICE_ID, REDSTONE_SYMBOL, REDSTONE_URL,
    },
    services::scheduler::{DEFAULT_SCHEDULE_TIMES, DEFAULT_SCHEDULE_TIMEZONE},
    sources::{pyth::DEFAULT_FEE_CEILING_WEI, DEFAULT_MAX_AGE_SECS},
    types::DomainId,
};

/// How attestations reach destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    /// `xcall` through the Connext core on the origin chain.
    Connext,
    /// In-process destinations fed over channels.
    Local,
}

impl FromStr for BridgeMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "connext" => Ok(BridgeMode::Connext),
            "local" => Ok(BridgeMode::Local),
            other => Err(AppError::Config(format!("Invalid BRIDGE_MODE: {}", other))),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Origin chain JSON-RPC endpoint URL.
    pub origin_rpc_url: String,
    /// Publisher private key (hex). Signing fails without it.
    pub private_key: Option<String>,
    /// Owner of the publisher registries (default: the publisher).
    pub owner_address: Option<Address>,
    /// Logging level (default: info).
    pub log_level: String,
    /// Origin chain id, part of the EIP-712 domain.
    pub origin_chain_id: u64,
    /// Origin bridge domain.
    pub origin_domain: DomainId,
    /// Origin aggregator, the EIP-712 verifying contract.
    pub aggregator_address: Address,
    /// Bulletin address on every destination.
    pub bulletin_address: Address,
    /// Relay targets.
    pub destinations: Vec<BridgeNetwork>,
    /// RPC endpoint per destination domain (`RPC_<NAME>`).
    pub destination_rpc_urls: Vec<(DomainId, String)>,
    /// Bridge implementation.
    pub bridge_mode: BridgeMode,
    /// EIP-712 domain name.
    pub attestation_domain_name: String,
    /// EIP-712 domain version.
    pub attestation_domain_version: String,
    /// Highest Pyth update fee paid, in wei.
    pub pyth_fee_ceiling: U256,
    /// Maximum age of a source price, in seconds.
    pub source_max_age: u64,
    /// Bound on a single source fetch.
    pub fetch_timeout: Duration,
    /// Highest relayer fee paid per destination, in wei.
    pub relay_fee_cap: Option<U256>,
    /// IANA time zone of the schedule.
    pub schedule_timezone: String,
    /// Comma-separated `HH:MM` schedule slots.
    pub schedule_times: String,
    /// JSON snapshot of the origin round.
    pub round_state_path: Option<PathBuf>,
    /// Chainlink feed; the Chainlink source is disabled when unset.
    pub chainlink_feed: Option<Address>,
    /// Pyth contract on the origin chain.
    pub pyth_address: Address,
    /// Pyth price feed id.
    pub pyth_price_id: B256,
    /// Hermes base URL.
    pub hermes_url: String,
    /// Redstone API base URL.
    pub redstone_url: String,
    /// Redstone symbol.
    pub redstone_symbol: String,
    /// Connext core on the origin chain.
    pub connext_address: Address,
    /// Connext SDK server base URL.
    pub connext_sdk_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `ORIGIN_RPC_URL`: origin chain JSON-RPC endpoint
    /// - `RPC_<NAME>` for every destination when `BRIDGE_MODE=connext`
    ///
    /// Everything else has a default; see the field docs.
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let origin_rpc_url = get("ORIGIN_RPC_URL")
            .ok_or_else(|| AppError::Config("ORIGIN_RPC_URL environment variable not set".into()))?;

        let origin_domain = parse_or(&get, "ORIGIN_DOMAIN", GNOSIS_DOMAIN_ID)?;
        let bridge_mode = parse_or(&get, "BRIDGE_MODE", BridgeMode::Connext)?;

        let destinations = parse_destinations(
            get("DESTINATIONS").as_deref().unwrap_or("optimism"),
            origin_domain,
        )?;

        let mut destination_rpc_urls = Vec::new();
        for network in &destinations {
            let key = format!("RPC_{}", network.name.to_uppercase());
            match get(&key) {
                Some(url) => destination_rpc_urls.push((network.domain_id, url)),
                None if bridge_mode == BridgeMode::Connext => {
                    return Err(AppError::Config(format!("{} environment variable not set", key)))
                }
                None => {}
            }
        }

        let default_connext =
            network_by_domain(origin_domain).map(|n| n.connext).unwrap_or(Address::ZERO);

        Ok(Self {
            origin_rpc_url,
            private_key: get("PUBLISHER_PRIVATE_KEY"),
            owner_address: get("OWNER_ADDRESS").map(|v| parse_value("OWNER_ADDRESS", &v)).transpose()?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            origin_chain_id: parse_or(&get, "ORIGIN_CHAIN_ID", DEFAULT_ORIGIN_CHAIN_ID)?,
            origin_domain,
            aggregator_address: parse_or(&get, "AGGREGATOR_ADDRESS", AGGREGATOR_ADDRESS)?,
            bulletin_address: parse_or(&get, "BULLETIN_ADDRESS", BULLETIN_ADDRESS)?,
            destinations,
            destination_rpc_urls,
            bridge_mode,
            attestation_domain_name: get("ATTESTATION_DOMAIN_NAME")
                .unwrap_or_else(|| ATTESTATION_DOMAIN_NAME.to_string()),
            attestation_domain_version: get("ATTESTATION_DOMAIN_VERSION")
                .unwrap_or_else(|| ATTESTATION_DOMAIN_VERSION.to_string()),
            pyth_fee_ceiling: parse_or(
                &get,
                "PYTH_FEE_CEILING_WEI",
                U256::from(DEFAULT_FEE_CEILING_WEI),
            )?,
            source_max_age: parse_or(&get, "SOURCE_MAX_AGE_SECS", DEFAULT_MAX_AGE_SECS)?,
            fetch_timeout: Duration::from_secs(parse_or(&get, "FETCH_TIMEOUT_SECS", 30u64)?),
            relay_fee_cap: get("RELAY_FEE_CAP_WEI")
                .map(|v| parse_value("RELAY_FEE_CAP_WEI", &v))
                .transpose()?,
            schedule_timezone: get("SCHEDULE_TIMEZONE")
                .unwrap_or_else(|| DEFAULT_SCHEDULE_TIMEZONE.to_string()),
            schedule_times: get("SCHEDULE_TIMES")
                .unwrap_or_else(|| DEFAULT_SCHEDULE_TIMES.to_string()),
            round_state_path: get("ROUND_STATE_PATH").map(PathBuf::from),
            chainlink_feed: get("CHAINLINK_FEED")
                .map(|v| parse_value("CHAINLINK_FEED", &v))
                .transpose()?,
            pyth_address: parse_or(&get, "PYTH_ADDRESS", PYTH_GNOSIS_ADDRESS)?,
            pyth_price_id: parse_or(&get, "PYTH_PRICE_ID", PYTH_MXN_USD_PRICE_ID)?,
            hermes_url: get("HERMES_URL").unwrap_or_else(|| HERMES_URL.to_string()),
            redstone_url: get("REDSTONE_URL").unwrap_or_else(|| REDSTONE_URL.to_string()),
            redstone_symbol: get("REDSTONE_SYMBOL").unwrap_or_else(|| REDSTONE_SYMBOL.to_string()),
            connext_address: parse_or(&get, "CONNEXT_ADDRESS", default_connext)?,
            connext_sdk_url: get("CONNEXT_SDK_URL").unwrap_or_else(|| CONNEXT_SDK_URL.to_string()),
        })
    }

    /// RPC URL configured for `domain_id`.
    pub fn destination_rpc_url(&self, domain_id: DomainId) -> Option<&str> {
        self.destination_rpc_urls.iter().find(|(d, _)| *d == domain_id).map(|(_, url)| url.as_str())
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e)))
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(value) => parse_value(key, &value),
        None => Ok(default),
    }
}

/// Parse comma-separated network names, rejecting unknown names and the origin.
fn parse_destinations(list: &str, origin_domain: DomainId) -> Result<Vec<BridgeNetwork>, AppError> {
    let mut networks: Vec<BridgeNetwork> = Vec::new();

    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let network = network_by_name(name)
            .ok_or_else(|| AppError::Config(format!("Unknown destination network: {}", name)))?;
        if network.domain_id == origin_domain {
            return Err(AppError::Config(format!("Destination {} is the origin", name)));
        }
        if !networks.contains(&network) {
            networks.push(network);
        }
    }

    Ok(networks)
}
