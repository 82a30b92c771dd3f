//! Ethereum interaction module.
//!
//! Contains the Ethereum client, publisher wallet, network constants and
//! contract bindings.

pub mod client;
pub mod constants;
pub mod contracts;
pub mod wallet;

pub use client::{EthereumClient, HttpProvider};
pub use wallet::PublisherWallet;
