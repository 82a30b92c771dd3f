//! Price-related types and fixed-point helpers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Number of decimals used by every price in the system.
pub const PRICE_DECIMALS: u32 = 8;

/// Upstream oracle a price was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// Redstone data service.
    Redstone,
    /// Pyth pull oracle.
    Pyth,
    /// Chainlink aggregator feed.
    Chainlink,
}

impl SourceId {
    /// All known sources, in fetch order.
    pub const ALL: [SourceId; 3] = [SourceId::Redstone, SourceId::Pyth, SourceId::Chainlink];

    /// Lowercase name used in logs and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Redstone => "redstone",
            SourceId::Pyth => "pyth",
            SourceId::Chainlink => "chainlink",
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redstone" => Ok(SourceId::Redstone),
            "pyth" => Ok(SourceId::Pyth),
            "chainlink" => Ok(SourceId::Chainlink),
            _ => Err(format!("Invalid price source: {}", s)),
        }
    }
}

/// One source's observation, normalized to [`PRICE_DECIMALS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Source the price was read from.
    pub source_id: SourceId,
    /// Fixed-point value, 1e8 scale.
    pub value: i128,
    /// Unix seconds when this process fetched the value.
    pub observed_at: u64,
    /// Unix seconds reported by the upstream for the value.
    pub published_at: u64,
}

impl Price {
    /// Seconds elapsed since the fetch, saturating at zero.
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.observed_at)
    }
}

/// Rescale `mantissa * 10^expo` to the system's 8-decimal fixed point.
///
/// Scaling up overflows into [`AppError::NumericOverflow`]; scaling down
/// truncates toward zero.
pub fn normalize_price(mantissa: i128, expo: i32) -> Result<i128> {
    let shift = expo + PRICE_DECIMALS as i32;

    if shift >= 0 {
        10i128
            .checked_pow(shift as u32)
            .and_then(|factor| mantissa.checked_mul(factor))
            .ok_or_else(|| {
                AppError::NumericOverflow(format!("{}e{} does not fit 1e8 scale", mantissa, expo))
            })
    } else {
        // A divisor beyond i128 range always truncates to zero.
        match 10i128.checked_pow(shift.unsigned_abs()) {
            Some(factor) => Ok(mantissa / factor),
            None => Ok(0),
        }
    }
}

/// Convert a decimal quote to 8-decimal fixed point.
pub fn fixed_from_decimal(value: Decimal) -> Result<i128> {
    normalize_price(value.mantissa(), -(value.scale() as i32))
}

/// Render a fixed-point value as a human-readable decimal string.
pub fn format_fixed(value: i128) -> String {
    match Decimal::try_from_i128_with_scale(value, PRICE_DECIMALS) {
        Ok(decimal) => decimal.to_string(),
        Err(_) => format!("{}e-{}", value, PRICE_DECIMALS),
    }
}

/// Current Unix timestamp in seconds.
/// Returns 0 if system time is before Unix epoch (should never happen in practice).
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
