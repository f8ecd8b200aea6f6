//! Order-book reconciler: snapshot + delta merge with gap detection and
//! resync (spec.md §4.5). Grounded on the original Go
//! `exchange.updateOrderBook`/`gateioCacheOrderBook` pair (full-replace vs.
//! incremental merge) and the teacher's `OrderBook`/upsert-by-key shape
//! (`domain::orderbook`), generalised to own one `OrderBookCache` per
//! (venue, pair) and to gate incremental merges on the sequence-gap check.

mod error;

pub use error::ReconcileError;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{CanonicalPair, KvKey, OrderBook, OrderBookCache, Region};
use crate::kv::KvStore;

/// A full order-book replacement carrying a sequence anchor (spec.md §4.5).
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub seq: i64,
    pub asks: Vec<(String, String)>,
    pub bids: Vec<(String, String)>,
}

/// An incremental update, optionally carrying a `[first_seq, last_seq]` range.
#[derive(Debug, Clone)]
pub struct Delta {
    pub first_seq: i64,
    pub last_seq: i64,
    pub asks: Vec<(String, String)>,
    pub bids: Vec<(String, String)>,
}

/// Outcome of [`OrderBookReconciler::apply_delta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The delta was merged in and written through.
    Applied,
    /// The delta was already reflected in the cache; no-op (spec.md §4.5).
    Dropped,
    /// A gap was detected and a resync was triggered and completed.
    Resynced,
}

/// Fetches a fresh snapshot on a sequence gap (spec.md §4.5's resync path).
/// Implemented by each venue adapter on top of its [`crate::rest::RestClient`].
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch_snapshot(&self, pair: &CanonicalPair) -> Result<Snapshot, ReconcileError>;
}

/// Owns one [`OrderBookCache`] per (implicit venue, pair) and is the single
/// writer of each (spec.md §4.5: the dispatcher serialises calls per venue,
/// so no additional lock is required per pair; the `Mutex` here only
/// protects the map's shape, not cross-call ordering).
pub struct OrderBookReconciler {
    venue: String,
    kv: Arc<dyn KvStore>,
    fetcher: Arc<dyn SnapshotFetcher>,
    caches: Mutex<HashMap<CanonicalPair, OrderBookCache>>,
}

impl OrderBookReconciler {
    pub fn new(venue: impl Into<String>, kv: Arc<dyn KvStore>, fetcher: Arc<dyn SnapshotFetcher>) -> Self {
        Self {
            venue: venue.into(),
            kv,
            fetcher,
            caches: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the cached book wholesale and writes through to the KV store.
    /// Used for bootstrap and for any venue-indicated snapshot event.
    pub async fn full_replace(
        &self,
        pair: &CanonicalPair,
        snapshot: Snapshot,
    ) -> Result<(), ReconcileError> {
        let mut book = OrderBook::new();
        OrderBook::replace_levels(&mut book.asks, &snapshot.asks);
        OrderBook::replace_levels(&mut book.bids, &snapshot.bids);

        let cache = OrderBookCache::new(book, snapshot.seq);
        self.write_through(pair, &cache).await?;

        self.caches.lock().await.insert(pair.clone(), cache);
        Ok(())
    }

    /// Merges a delta per the gap-detection rule (spec.md §4.5):
    ///
    /// - `cached.last_seq + 1` within `[first_seq, last_seq]` → apply.
    /// - `cached.last_seq + 1 > last_seq` → drop (already applied).
    /// - otherwise → gap: invalidate, resync via the snapshot fetcher, then
    ///   apply the resulting snapshot with [`Self::full_replace`].
    pub async fn apply_delta(
        &self,
        pair: &CanonicalPair,
        delta: Delta,
    ) -> Result<ApplyOutcome, ReconcileError> {
        let next = {
            let caches = self.caches.lock().await;
            caches.get(pair).map(|c| c.last_seq + 1)
        };

        let next = match next {
            Some(next) => next,
            None => delta.first_seq, // no cache yet: treat this delta as the baseline anchor
        };

        if next >= delta.first_seq && next <= delta.last_seq {
            let mut caches = self.caches.lock().await;
            let cache = caches.entry(pair.clone()).or_insert_with(|| {
                OrderBookCache::new(OrderBook::new(), delta.first_seq - 1)
            });
            OrderBook::apply_levels(&mut cache.book.asks, &delta.asks);
            OrderBook::apply_levels(&mut cache.book.bids, &delta.bids);
            cache.last_seq = delta.last_seq;
            let snapshot_for_write = cache.clone();
            drop(caches);
            self.write_through(pair, &snapshot_for_write).await?;
            return Ok(ApplyOutcome::Applied);
        }

        if next > delta.last_seq {
            debug!(venue = %self.venue, pair = %pair, "stale delta dropped");
            return Ok(ApplyOutcome::Dropped);
        }

        warn!(venue = %self.venue, pair = %pair, next, first_seq = delta.first_seq, "sequence gap detected, resyncing");
        self.caches.lock().await.remove(pair);
        let snapshot = self.fetcher.fetch_snapshot(pair).await?;
        self.full_replace(pair, snapshot).await?;
        Ok(ApplyOutcome::Resynced)
    }

    /// Venues that publish `snapshot`/`update` action tags instead of
    /// sequence numbers (e.g. OKX's `books50-l2-tbt`) degenerate to
    /// always-apply: no gap is detectable without sequence numbers, so the
    /// invariant weakens to "apply in arrival order" (spec.md §4.5, last
    /// paragraph; §9 documents this as an accepted weaker invariant).
    pub async fn apply_update_untracked(
        &self,
        pair: &CanonicalPair,
        asks: &[(String, String)],
        bids: &[(String, String)],
    ) -> Result<(), ReconcileError> {
        let mut caches = self.caches.lock().await;
        let cache = caches
            .entry(pair.clone())
            .or_insert_with(|| OrderBookCache::new(OrderBook::new(), 0));
        OrderBook::apply_levels(&mut cache.book.asks, asks);
        OrderBook::apply_levels(&mut cache.book.bids, bids);
        let snapshot_for_write = cache.clone();
        drop(caches);
        self.write_through(pair, &snapshot_for_write).await
    }

    async fn write_through(
        &self,
        pair: &CanonicalPair,
        cache: &OrderBookCache,
    ) -> Result<(), ReconcileError> {
        let key = KvKey::new(Region::OrderBook, &[&self.venue, pair.as_str()]);
        let value = serde_json::to_string(&cache.book)
            .expect("OrderBook serialisation is infallible for its own field types");
        self.kv.set(Region::OrderBook, &key.key, value).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKvStore;

    struct StubFetcher {
        snapshot: Snapshot,
    }

    #[async_trait]
    impl SnapshotFetcher for StubFetcher {
        async fn fetch_snapshot(&self, _pair: &CanonicalPair) -> Result<Snapshot, ReconcileError> {
            Ok(self.snapshot.clone())
        }
    }

    fn levels(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(p, s)| (p.to_string(), s.to_string())).collect()
    }

    async fn reconciler_with_bootstrap(
        seq: i64,
        asks: &[(&str, &str)],
        bids: &[(&str, &str)],
    ) -> (OrderBookReconciler, CanonicalPair, Arc<InMemoryKvStore>) {
        let kv = Arc::new(InMemoryKvStore::new());
        let fetcher = Arc::new(StubFetcher {
            snapshot: Snapshot { seq: 0, asks: vec![], bids: vec![] },
        });
        let reconciler = OrderBookReconciler::new("okx", kv.clone(), fetcher);
        let pair = CanonicalPair::new("BTC/USDT");
        reconciler
            .full_replace(&pair, Snapshot { seq, asks: levels(asks), bids: levels(bids) })
            .await
            .unwrap();
        (reconciler, pair, kv)
    }

    #[tokio::test]
    async fn s1_delta_applies_and_removes_zero_levels() {
        let (reconciler, pair, kv) = reconciler_with_bootstrap(
            100,
            &[("1.00", "5"), ("1.01", "3")],
            &[("0.99", "2")],
        )
        .await;

        let outcome = reconciler
            .apply_delta(
                &pair,
                Delta {
                    first_seq: 101,
                    last_seq: 101,
                    asks: levels(&[("1.01", "0"), ("1.02", "4")]),
                    bids: vec![],
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Applied);

        let key = KvKey::new(Region::OrderBook, &["okx", "BTC/USDT"]);
        let stored: OrderBook =
            serde_json::from_str(&kv.get(Region::OrderBook, &key.key).await.unwrap()).unwrap();

        assert_eq!(stored.asks.get("1.00"), Some(&"5".to_string()));
        assert_eq!(stored.asks.get("1.02"), Some(&"4".to_string()));
        assert!(!stored.asks.contains_key("1.01"));
        assert_eq!(stored.bids.get("0.99"), Some(&"2".to_string()));
    }

    #[tokio::test]
    async fn s2_gap_triggers_resync() {
        let kv = Arc::new(InMemoryKvStore::new());
        let fetcher = Arc::new(StubFetcher {
            snapshot: Snapshot {
                seq: 200,
                asks: levels(&[("2.00", "1")]),
                bids: levels(&[("1.99", "1")]),
            },
        });
        let reconciler = OrderBookReconciler::new("okx", kv.clone(), fetcher);
        let pair = CanonicalPair::new("BTC/USDT");
        reconciler
            .full_replace(&pair, Snapshot { seq: 100, asks: levels(&[("1.00", "5")]), bids: vec![] })
            .await
            .unwrap();

        let outcome = reconciler
            .apply_delta(
                &pair,
                Delta { first_seq: 105, last_seq: 106, asks: vec![], bids: vec![] },
            )
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Resynced);

        let key = KvKey::new(Region::OrderBook, &["okx", "BTC/USDT"]);
        let stored: OrderBook =
            serde_json::from_str(&kv.get(Region::OrderBook, &key.key).await.unwrap()).unwrap();
        assert_eq!(stored.asks.get("2.00"), Some(&"1".to_string()));
        assert!(!stored.asks.contains_key("1.00"));
    }

    #[tokio::test]
    async fn s3_stale_delta_is_dropped_without_kv_write() {
        let (reconciler, pair, kv) = reconciler_with_bootstrap(200, &[("1.00", "5")], &[]).await;
        let key = KvKey::new(Region::OrderBook, &["okx", "BTC/USDT"]);
        let before = kv.get(Region::OrderBook, &key.key).await.unwrap();

        let outcome = reconciler
            .apply_delta(&pair, Delta { first_seq: 150, last_seq: 199, asks: vec![], bids: vec![] })
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Dropped);
        let after = kv.get(Region::OrderBook, &key.key).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn monotonic_deltas_never_resync() {
        let (reconciler, pair, _kv) = reconciler_with_bootstrap(0, &[], &[]).await;

        for seq in 1..=10 {
            let outcome = reconciler
                .apply_delta(
                    &pair,
                    Delta {
                        first_seq: seq,
                        last_seq: seq,
                        asks: levels(&[("1.00", &seq.to_string())]),
                        bids: vec![],
                    },
                )
                .await
                .unwrap();
            assert_eq!(outcome, ApplyOutcome::Applied);
        }
    }
}
