//! Venue adapters: symbol translation, subscription, authentication, payload
//! decoding, and bootstrap, one module per supported venue (spec.md §4.7).
//! Generalises the teacher's `Exchange` trait (`exchanges::mod::Exchange`)
//! down to the market-data-only surface this system needs — order
//! placement, cancellation and trade reporting are dropped, not
//! generalised, since they are Non-goals.

mod error;
pub mod gateio;
pub mod okx;

pub use error::VenueError;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{OrderStatus, Region};
use crate::kv::KvStore;

/// One rendezvous event handed from a dispatcher's message handler back to
/// the adapter's `start()` path (spec.md §4.6, §4.7, §9 "channel-based
/// rendezvous for login"). `start()` awaits `LoginOk`/`LoginRejected` with a
/// bounded timeout before proceeding to subscribe.
#[derive(Debug, Clone)]
pub enum AckEvent {
    LoginOk,
    LoginRejected(String),
}

/// Every supported venue implements this lifecycle (spec.md §4.8 drives a
/// `Synchroniser` generic over this trait rather than duplicating the
/// start/stop/watchdog contract per venue).
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Venue name, used for KV key paths and log fields.
    fn name(&self) -> &str;

    /// Opens streams, authenticates, subscribes, and runs bootstrap.
    /// Any failure here must leave no dangling connected session (spec.md
    /// §4.8: "partial state must be closed on failure").
    async fn start(&self) -> Result<(), VenueError>;

    /// Idempotent: closes every streaming session, returns the first error
    /// encountered if any (spec.md §4.8).
    async fn stop(&self) -> Result<(), VenueError>;

    /// True while every streaming session this venue owns is still reading
    /// and sending. The watchdog polls this to detect degraded links.
    fn sessions_alive(&self) -> bool;
}

/// Derives the canonical order status from a venue's cancel flag and fill
/// amounts (spec.md §4.7's mapping table, factored out since both OKX and
/// Gate.io reduce to the same finished/canceled/partial-canceled arithmetic
/// once their own state vocab is normalised to "canceled or not").
pub fn status_for_fill(canceled: bool, filled_amount: Decimal, amount: Decimal) -> OrderStatus {
    if canceled {
        if filled_amount.is_zero() {
            OrderStatus::Canceled
        } else {
            OrderStatus::PartialCanceled
        }
    } else if amount > Decimal::ZERO && filled_amount >= amount {
        OrderStatus::Finished
    } else {
        OrderStatus::Normal
    }
}

/// Resolves the canonical status for a still-open (non-terminal) order by
/// checking whether it has been seen before (spec.md §4.7's table: "created"
/// on first sighting, "normal" thereafter). Terminal states (finished,
/// canceled, partial canceled) never need this distinction.
pub async fn resolve_order_status(
    kv: &dyn KvStore,
    key: &str,
    canceled: bool,
    filled_amount: Decimal,
    amount: Decimal,
) -> OrderStatus {
    let status = status_for_fill(canceled, filled_amount, amount);
    if status == OrderStatus::Normal && kv.get(Region::Order, key).await.is_err() {
        OrderStatus::Created
    } else {
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKvStore;

    #[test]
    fn s4_canceled_partial_fill_maps_to_partial_canceled() {
        let status = status_for_fill(true, Decimal::new(2, 0), Decimal::new(5, 0));
        assert_eq!(status, OrderStatus::PartialCanceled);
    }

    #[test]
    fn canceled_zero_fill_maps_to_canceled() {
        let status = status_for_fill(true, Decimal::ZERO, Decimal::new(5, 0));
        assert_eq!(status, OrderStatus::Canceled);
    }

    #[test]
    fn fully_filled_maps_to_finished() {
        let status = status_for_fill(false, Decimal::new(5, 0), Decimal::new(5, 0));
        assert_eq!(status, OrderStatus::Finished);
    }

    #[test]
    fn resting_order_maps_to_normal() {
        let status = status_for_fill(false, Decimal::new(1, 0), Decimal::new(5, 0));
        assert_eq!(status, OrderStatus::Normal);
    }

    #[tokio::test]
    async fn first_sighting_of_a_resting_order_is_created() {
        let kv = InMemoryKvStore::new();
        let status =
            resolve_order_status(&kv, "okx.BTC/USDT.1", false, Decimal::ZERO, Decimal::new(5, 0))
                .await;
        assert_eq!(status, OrderStatus::Created);
    }

    #[tokio::test]
    async fn known_resting_order_is_normal() {
        let kv = InMemoryKvStore::new();
        kv.set(Region::Order, "okx.BTC/USDT.1", "{}".to_string())
            .await
            .unwrap();
        let status =
            resolve_order_status(&kv, "okx.BTC/USDT.1", false, Decimal::ZERO, Decimal::new(5, 0))
                .await;
        assert_eq!(status, OrderStatus::Normal);
    }
}
