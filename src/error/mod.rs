//! Error types and handling module.
//!
//! Defines all application-specific error types and conversions.

use alloy::primitives::{Address, U256};
use thiserror::Error;

use crate::types::SourceId;

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ethereum RPC errors.
    #[error("Ethereum RPC error: {0}")]
    Rpc(String),

    /// Transport errors.
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP errors from off-chain price services.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Wallet-related errors.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Numeric overflow during conversion.
    #[error("Numeric overflow: {0}")]
    NumericOverflow(String),

    /// Pending transaction error.
    #[error("Pending transaction error: {0}")]
    PendingTransaction(String),

    /// Filesystem errors (round snapshots).
    #[error("IO error: {0}")]
    Io(String),

    /// Attestation payload could not be encoded or decoded.
    #[error("Payload error: {0}")]
    Payload(String),

    // ------------------------------------------------------------------
    // Source level
    // ------------------------------------------------------------------
    /// The upstream oracle could not be reached or returned garbage.
    #[error("Source {source_id} unavailable: {reason}")]
    SourceUnavailable { source_id: SourceId, reason: String },

    /// The upstream answer is older than the allowed age, or timed out.
    #[error("Stale data from {source_id}: {reason}")]
    StaleData { source_id: SourceId, reason: String },

    /// The paid update costs more than the configured ceiling.
    #[error("Update fee for {source_id} above threshold: fee {fee}, ceiling {ceiling}")]
    FeeAboveThreshold { source_id: SourceId, fee: U256, ceiling: U256 },

    /// No configured source has a fresh price.
    #[error("No fresh price sources available")]
    NoFreshSources,

    // ------------------------------------------------------------------
    // Signing level
    // ------------------------------------------------------------------
    /// No publisher key configured.
    #[error("No publisher signing key configured")]
    MissingKey,

    /// The signer is not an authorized publisher at the origin.
    #[error("Signer {0} is not an authorized publisher")]
    UnauthorizedSigner(Address),

    /// The signing backend failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    // ------------------------------------------------------------------
    // Verification level
    // ------------------------------------------------------------------
    /// Signature is malformed or does not match the recomputed digest.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Recovered signer is not trusted at this destination.
    #[error("Unauthorized publisher: {0}")]
    UnauthorizedPublisher(Address),

    /// Incoming round is not newer than the stored round.
    #[error("Stale round: incoming {incoming}, current {current}")]
    StaleRound { incoming: u64, current: u64 },

    // ------------------------------------------------------------------
    // Relay level
    // ------------------------------------------------------------------
    /// Cost or relayer fee could not be estimated.
    #[error("Fee estimation failed: {0}")]
    FeeEstimationFailed(String),

    /// Not enough funds to pay the quoted relayer fee.
    #[error("Insufficient fee: required {required}, available {available}")]
    InsufficientFee { required: U256, available: U256 },

    // ------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------
    /// Caller is not the owner of a publisher registry.
    #[error("Caller {0} is not the owner")]
    NotOwner(Address),

    /// A previous cycle is still running.
    #[error("A cycle is already in progress")]
    CycleInProgress,

    /// Destination domain is not known.
    #[error("Unknown domain: {0}")]
    UnknownDomain(u32),
}

impl AppError {
    /// Errors that only disqualify one source for the current cycle.
    pub fn is_source_level(&self) -> bool {
        matches!(
            self,
            AppError::SourceUnavailable { .. }
                | AppError::StaleData { .. }
                | AppError::FeeAboveThreshold { .. }
        )
    }

    /// Errors that reject one attestation at a destination.
    pub fn is_verification_level(&self) -> bool {
        matches!(
            self,
            AppError::InvalidSignature(_)
                | AppError::UnauthorizedPublisher(_)
                | AppError::StaleRound { .. }
        )
    }

    /// Turn an infrastructure failure into `SourceUnavailable` for `source_id`.
    ///
    /// Source-level errors pass through untouched.
    pub fn for_source(self, source_id: SourceId) -> Self {
        if self.is_source_level() {
            self
        } else {
            AppError::SourceUnavailable { source_id, reason: self.to_string() }
        }
    }
}

impl From<alloy::transports::TransportError> for AppError {
    fn from(err: alloy::transports::TransportError) -> Self {
        AppError::Transport(err.to_string())
    }
}

impl From<alloy::contract::Error> for AppError {
    fn from(err: alloy::contract::Error) -> Self {
        AppError::Rpc(err.to_string())
    }
}

impl From<alloy::providers::PendingTransactionError> for AppError {
    fn from(err: alloy::providers::PendingTransactionError) -> Self {
        AppError::PendingTransaction(err.to_string())
    }
}

impl From<alloy::signers::local::LocalSignerError> for AppError {
    fn from(err: alloy::signers::local::LocalSignerError) -> Self {
        AppError::Wallet(err.to_string())
    }
}

impl From<alloy::signers::Error> for AppError {
    fn from(err: alloy::signers::Error) -> Self {
        AppError::Signing(err.to_string())
    }
}

impl From<alloy::hex::FromHexError> for AppError {
    fn from(err: alloy::hex::FromHexError) -> Self {
        AppError::Parse(err.to_string())
    }
}

impl From<alloy::sol_types::Error> for AppError {
    fn from(err: alloy::sol_types::Error) -> Self {
        AppError::Payload(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(err: std::num::ParseIntError) -> Self {
        AppError::Parse(err.to_string())
    }
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;
