//! Smart contract bindings.

pub mod bulletin;
pub mod chainlink;
pub mod connext;
pub mod pyth;
