//! KV store key-path encoding (spec.md §3, §4.2).

use serde::{Deserialize, Serialize};

/// Region groups a record type in the KV store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Balance,
    Fee,
    Order,
    OrderBook,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Balance => "Balance",
            Region::Fee => "Fee",
            Region::Order => "Order",
            Region::OrderBook => "OrderBook",
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// KVKey pairs a region with its dotted key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KvKey {
    pub region: Region,
    pub key: String,
}

impl KvKey {
    pub fn new(region: Region, parts: &[&str]) -> Self {
        Self {
            region,
            key: key_path(parts),
        }
    }
}

/// Joins path segments with `.`, per spec.md §4.2: `KeyPath([a,b,c]) = a.b.c`.
pub fn key_path(parts: &[&str]) -> String {
    parts.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_path_joins_with_dot() {
        assert_eq!(key_path(&["okx", "BTC/USDT", "123"]), "okx.BTC/USDT.123");
    }

    #[test]
    fn region_display_matches_kv_layout() {
        assert_eq!(Region::OrderBook.to_string(), "OrderBook");
    }
}
