//! Account balance records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance represents free/used/total quantities of one currency on one venue.
///
/// Invariant: `total == free + used`. Callers that only observe two of the
/// three fields should use [`Balance::from_free_used`] or
/// [`Balance::from_total_free`] to derive the third rather than constructing
/// this struct directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(default)]
    pub free: Decimal,
    #[serde(default)]
    pub used: Decimal,
    #[serde(default)]
    pub total: Decimal,
}

impl Balance {
    /// Derives a Balance from a venue payload that reports `free` and `used`.
    pub fn from_free_used(free: Decimal, used: Decimal) -> Self {
        Self {
            free,
            used,
            total: free + used,
        }
    }

    /// Derives a Balance from a venue payload that reports `total` and `free`.
    /// The venue's `total` wins; `used` is backed out.
    pub fn from_total_free(total: Decimal, free: Decimal) -> Self {
        Self {
            free,
            used: total - free,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_free_used_derives_total() {
        let b = Balance::from_free_used(Decimal::new(10, 0), Decimal::new(3, 0));
        assert_eq!(b.total, Decimal::new(13, 0));
    }

    #[test]
    fn from_total_free_derives_used() {
        let b = Balance::from_total_free(Decimal::new(13, 0), Decimal::new(10, 0));
        assert_eq!(b.used, Decimal::new(3, 0));
        assert_eq!(b.free, Decimal::new(10, 0));
    }
}
