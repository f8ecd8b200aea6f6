//! Order book data structures.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// OrderBook holds price -> size for both sides of one (venue, pair) book.
/// Price and size are kept as exchange-precision strings (spec.md §3); a
/// size of `"0"` means the level is absent and must not appear in the map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    #[serde(default)]
    pub asks: BTreeMap<String, String>,
    #[serde(default)]
    pub bids: BTreeMap<String, String>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts or removes one side's levels in place. A size of `"0"`
    /// removes the key; any other size upserts it.
    pub fn apply_levels(side: &mut BTreeMap<String, String>, levels: &[(String, String)]) {
        for (price, size) in levels {
            if size == "0" {
                side.remove(price);
            } else {
                side.insert(price.clone(), size.clone());
            }
        }
    }

    /// Replaces this side wholesale from a snapshot, dropping any `"0"`-size
    /// levels a venue might (incorrectly) include in a snapshot payload.
    pub fn replace_levels(side: &mut BTreeMap<String, String>, levels: &[(String, String)]) {
        side.clear();
        for (price, size) in levels {
            if size != "0" {
                side.insert(price.clone(), size.clone());
            }
        }
    }
}

/// OrderBookCache is the reconciler's in-memory view of one (venue, pair)
/// book: the current book plus the sequence number it was last updated to.
/// Never serialised to the KV store directly.
#[derive(Debug, Clone, Default)]
pub struct OrderBookCache {
    pub book: OrderBook,
    pub last_seq: i64,
}

impl OrderBookCache {
    pub fn new(book: OrderBook, last_seq: i64) -> Self {
        Self { book, last_seq }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_levels_removes_zero_size() {
        let mut side = BTreeMap::new();
        side.insert("1.00".to_string(), "5".to_string());
        OrderBook::apply_levels(
            &mut side,
            &[
                ("1.00".to_string(), "0".to_string()),
                ("1.02".to_string(), "4".to_string()),
            ],
        );
        assert_eq!(side.get("1.00"), None);
        assert_eq!(side.get("1.02"), Some(&"4".to_string()));
    }

    #[test]
    fn replace_levels_drops_existing_state() {
        let mut side = BTreeMap::new();
        side.insert("9.99".to_string(), "1".to_string());
        OrderBook::replace_levels(&mut side, &[("1.00".to_string(), "5".to_string())]);
        assert_eq!(side.len(), 1);
        assert_eq!(side.get("1.00"), Some(&"5".to_string()));
    }
}
