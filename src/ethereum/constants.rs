//! Network constants.
//!
//! Contains chain IDs, bridge domain IDs and deployed contract addresses.

use alloy::primitives::{address, b256, Address, B256};

use crate::types::DomainId;

// ============================================================================
// Chain IDs
// ============================================================================

/// Gnosis chain ID. The origin aggregator lives here.
pub const GNOSIS_CHAIN_ID: u64 = 100;

/// Default origin chain ID.
pub const DEFAULT_ORIGIN_CHAIN_ID: u64 = GNOSIS_CHAIN_ID;

// ============================================================================
// Deployed Contracts
// ============================================================================

/// Origin aggregator address on Gnosis. Used as the EIP-712 verifying contract.
pub const AGGREGATOR_ADDRESS: Address = address!("8f78dc290e1701EC664909410661DC17E9c7b62b");

/// Price bulletin address, identical on every destination chain.
pub const BULLETIN_ADDRESS: Address = address!("94C82325a2B26f27AEb08B936331c8485a988634");

/// Pyth contract on Gnosis.
pub const PYTH_GNOSIS_ADDRESS: Address = address!("2880aB155794e7179c9eE2e38200202908C17B43");

/// Pyth MXN/USD price feed id.
pub const PYTH_MXN_USD_PRICE_ID: B256 =
    b256!("e13b1c1ffb32f34e1be9545583f01ef385fde7f42ee66049d30570dc866b77ca");

// ============================================================================
// Off-chain Services
// ============================================================================

/// Pyth Hermes price service.
pub const HERMES_URL: &str = "https://hermes.pyth.network";

/// Redstone price API.
pub const REDSTONE_URL: &str = "https://api.redstone.finance";

/// Redstone symbol of the tracked pair.
pub const REDSTONE_SYMBOL: &str = "MXN";

/// Connext SDK server used for relayer fee quotes.
pub const CONNEXT_SDK_URL: &str = "https://sdk-server.mainnet.connext.ninja";

// ============================================================================
// EIP-712 Domain
// ============================================================================

/// Default EIP-712 domain name.
pub const ATTESTATION_DOMAIN_NAME: &str = "PriceBulletin";

/// Default EIP-712 domain version.
pub const ATTESTATION_DOMAIN_VERSION: &str = "1";

// ============================================================================
// Bridge Domains
// ============================================================================

/// A chain reachable through the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeNetwork {
    /// Short chain name used in configuration.
    pub name: &'static str,
    /// Bridge domain identifier.
    pub domain_id: DomainId,
    /// Bridge core contract on that chain.
    pub connext: Address,
}

/// Chains with a deployed bridge core.
pub const BRIDGE_NETWORKS: [BridgeNetwork; 6] = [
    BridgeNetwork {
        name: "ethereum",
        domain_id: 6648936,
        connext: address!("8898B472C54c31894e3B9bb83cEA802a5d0e63C6"),
    },
    BridgeNetwork {
        name: "polygon",
        domain_id: 1886350457,
        connext: address!("11984dc4465481512eb5b777E44061C158CF2259"),
    },
    BridgeNetwork {
        name: "arbitrum",
        domain_id: 1634886255,
        connext: address!("EE9deC2712cCE65174B561151701Bf54b99C24C8"),
    },
    BridgeNetwork {
        name: "optimism",
        domain_id: 1869640809,
        connext: address!("8f7492DE823025b4CfaAB1D34c58963F2af5DEDA"),
    },
    BridgeNetwork {
        name: "gnosis",
        domain_id: 6778479,
        connext: address!("5bB83e95f63217CDa6aE3D181BA580Ef377D2109"),
    },
    BridgeNetwork {
        name: "binance",
        domain_id: 6450786,
        connext: address!("Cd401c10afa37d641d2F594852DA94C700e4F2CE"),
    },
];

/// Domain of the origin chain.
pub const GNOSIS_DOMAIN_ID: DomainId = 6778479;

/// Look up a bridge network by name (case-insensitive).
pub fn network_by_name(name: &str) -> Option<BridgeNetwork> {
    let name = name.trim().to_lowercase();
    BRIDGE_NETWORKS.iter().find(|n| n.name == name).copied()
}

/// Look up a bridge network by domain id.
pub fn network_by_domain(domain_id: DomainId) -> Option<BridgeNetwork> {
    BRIDGE_NETWORKS.iter().find(|n| n.domain_id == domain_id).copied()
}
