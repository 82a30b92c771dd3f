//! Connext-style bridge.
//!
//! Messages are submitted with `xcall` on the origin chain's Connext core,
//! paying the relayer fee as value. Fee quotes come from the Connext SDK
//! server; destination cost is an `estimateGas` of the bulletin's `xReceive`.

use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApplyCostEstimator, Bridge, RelayJob, RelayReceipt};
use crate::{
    attestation::{encode_payload, Attestation},
    error::{AppError, Result},
    ethereum::{
        contracts::{bulletin::IPriceBulletin, connext::IConnext},
        EthereumClient,
    },
    types::DomainId,
};

/// Request body of the SDK server's `/estimateRelayerFee`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayerFeeRequest {
    origin_domain: String,
    destination_domain: String,
    call_data_gas_amount: String,
}

/// Ethers-style BigNumber returned by the SDK server.
#[derive(Debug, Deserialize)]
struct BigNumberResponse {
    hex: String,
}

/// Bridge submitting through the Connext core on the origin chain.
pub struct ConnextBridge {
    client: EthereumClient,
    connext: Address,
    http: reqwest::Client,
    sdk_url: String,
}

impl ConnextBridge {
    /// Create a bridge sending through `connext` with quotes from `sdk_url`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(client: EthereumClient, connext: Address, sdk_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, connext, http, sdk_url: sdk_url.into() })
    }
}

#[async_trait]
impl Bridge for ConnextBridge {
    async fn estimate_fee(
        &self,
        origin: DomainId,
        destination: DomainId,
        apply_cost: u64,
    ) -> Result<U256> {
        let url = format!("{}/estimateRelayerFee", self.sdk_url.trim_end_matches('/'));
        let body = RelayerFeeRequest {
            origin_domain: origin.to_string(),
            destination_domain: destination.to_string(),
            call_data_gas_amount: apply_cost.to_string(),
        };

        let response = self.http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Http(format!(
                "Relayer fee endpoint returned status: {}",
                response.status()
            )));
        }

        let fee: BigNumberResponse = response
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("Failed to parse relayer fee: {}", e)))?;

        parse_big_number(&fee.hex)
    }

    async fn fee_budget(&self) -> Result<U256> {
        self.client.sender_balance().await
    }

    async fn send(&self, job: &RelayJob, recipient: Address) -> Result<RelayReceipt> {
        let sender = self.client.require_sender()?;
        let connext = IConnext::new(self.connext, self.client.provider().clone());

        let receipt = connext
            .xcall(
                job.destination_domain,
                recipient,
                Address::ZERO,
                sender,
                U256::ZERO,
                U256::ZERO,
                encode_payload(&job.attestation),
            )
            .value(job.estimated_fee)
            .send()
            .await?
            .get_receipt()
            .await?;

        if !receipt.status() {
            return Err(AppError::Rpc(format!("xcall reverted in {}", receipt.transaction_hash)));
        }

        info!(
            destination = job.destination_domain,
            round_id = job.attestation.round_id(),
            tx = %receipt.transaction_hash,
            fee = %job.estimated_fee,
            "Submitted xcall"
        );

        Ok(RelayReceipt {
            destination_domain: job.destination_domain,
            round_id: job.attestation.round_id(),
            fee: job.estimated_fee,
            reference: receipt.transaction_hash,
        })
    }
}

fn parse_big_number(hex: &str) -> Result<U256> {
    hex.parse::<U256>().map_err(|e| AppError::Parse(format!("Invalid fee {}: {}", hex, e)))
}

/// Apply cost read from the destination bulletin via `estimateGas`.
pub struct BulletinGasEstimator {
    client: EthereumClient,
    bulletin: Address,
    destination_connext: Address,
    origin_domain: DomainId,
    origin_sender: Address,
}

impl BulletinGasEstimator {
    /// Create an estimator against `bulletin`, simulating delivery by
    /// `destination_connext` of a message from `origin_sender` on `origin_domain`.
    pub fn new(
        client: EthereumClient,
        bulletin: Address,
        destination_connext: Address,
        origin_domain: DomainId,
        origin_sender: Address,
    ) -> Self {
        Self { client, bulletin, destination_connext, origin_domain, origin_sender }
    }
}

#[async_trait]
impl ApplyCostEstimator for BulletinGasEstimator {
    async fn estimate_apply_cost(&self, attestation: &Attestation) -> Result<u64> {
        let bulletin = IPriceBulletin::new(self.bulletin, self.client.provider().clone());

        let gas = bulletin
            .xReceive(
                B256::ZERO,
                U256::ZERO,
                Address::ZERO,
                self.origin_sender,
                self.origin_domain,
                encode_payload(attestation),
            )
            .from(self.destination_connext)
            .estimate_gas()
            .await?;

        Ok(gas)
    }
}
