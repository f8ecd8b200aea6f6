//! Trading fee structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fee represents the maker/taker rates for a pair on a venue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    /// Maker fee (for orders that add liquidity), expressed as a decimal rate.
    #[serde(default)]
    pub maker: Decimal,
    /// Taker fee (for orders that remove liquidity), expressed as a decimal rate.
    #[serde(default)]
    pub taker: Decimal,
}

impl Fee {
    /// Creates a new Fee.
    pub fn new(maker: Decimal, taker: Decimal) -> Self {
        Self { maker, taker }
    }
}
