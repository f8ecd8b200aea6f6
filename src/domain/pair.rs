//! Canonical trading pair symbol.

use std::fmt;

use serde::{Deserialize, Serialize};

/// CanonicalPair is an internal `BASE/QUOTE` symbol. Each venue adapter
/// provides a total bijection between this form and its own wire form
/// (spec.md §3, §4.7).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalPair(String);

impl CanonicalPair {
    /// Builds a CanonicalPair from an already-canonical `"BASE/QUOTE"` string.
    /// Does not validate the separator; callers that parse untrusted venue
    /// input should go through a venue-specific `symbol_to_pair` instead.
    pub fn new(pair: impl Into<String>) -> Self {
        Self(pair.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CanonicalPair {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CanonicalPair {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
