//! Price Bulletin Library
//!
//! Publishes an MXN/USD reference price aggregated from several oracle
//! sources, signs each round as EIP-712 typed data and relays it to
//! bulletin mirrors on other chains.
//!
//! # Features
//!
//! - **Sources**: Chainlink, Pyth (paying the on-chain update fee) and Redstone
//! - **Aggregation**: arithmetic mean of fresh prices into monotonic rounds
//! - **Attestation**: EIP-712 signatures checked against a publisher registry
//! - **Relay**: Connext `xcall` or an in-process bridge, with fee estimation
//! - **Scheduling**: fixed business-day times in a configurable time zone
//!
//! # Example
//!
//! ```rust,ignore
//! use price_bulletin::{BulletinNode, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let node = BulletinNode::new(config).await?;
//!     let report = node.pipeline().run_cycle().await?;
//!     println!("relayed to {} destinations", report.relayed());
//!     Ok(())
//! }
//! ```

pub mod attestation;
pub mod bridge;
pub mod config;
pub mod error;
pub mod ethereum;
pub mod node;
pub mod services;
pub mod sources;
pub mod types;

pub use config::{BridgeMode, Config};
pub use error::{AppError, Result};
pub use ethereum::constants::*;
pub use node::BulletinNode;
