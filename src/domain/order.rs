//! Canonical order records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OrderSide represents the direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// OrderType represents the venue's order execution style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

/// OrderStatus is the canonical order lifecycle state (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// First sighting of a brand new order.
    Created,
    /// Open and resting, seen again after creation.
    Normal,
    /// Completely filled.
    Finished,
    /// Cancelled with zero fill.
    Canceled,
    /// Cancelled with partial fill.
    #[serde(rename = "partial canceled")]
    PartialCanceled,
}

/// Order represents a trading order on a venue, normalised to the canonical
/// schema. Invariant: `filled_amount + left_amount == amount`; `filled_price`
/// is only meaningful once `filled_amount > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub side: OrderSide,
    pub create_time: i64,
    pub update_time: i64,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub filled_price: Option<Decimal>,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default)]
    pub filled_amount: Decimal,
    #[serde(default)]
    pub left_amount: Decimal,
    pub status: OrderStatus,
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default)]
    pub fee_currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_to_spec_vocabulary() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::PartialCanceled).unwrap(),
            "\"partial canceled\""
        );
        assert_eq!(
            serde_json::to_string(&OrderStatus::Finished).unwrap(),
            "\"finished\""
        );
    }
}
