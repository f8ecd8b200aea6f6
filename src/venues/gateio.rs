//! Gate.io venue adapter (spec.md §4.7, §6).
//!
//! One streaming session carries market data, order events and balance
//! events together; there is no separate login step, instead every outbound
//! frame carries its own `auth` block (HMAC-SHA512 over
//! `channel=..&event=..&time=..`, spec.md §6). The `spot.order_book_update`
//! channel ships `[U, u]` sequence ranges, so unlike OKX this venue's
//! reconciler gap-detection and resync path are both genuinely exercised.
//! Grounded on the complete `exchange.Gateio` reference implementation.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use hex::encode as hex_encode;
use hmac::{Hmac, Mac};
use reqwest::Method;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha512};
use tracing::{debug, warn};

use crate::config::{Config, ExchangeSettings};
use crate::domain::{Balance, CanonicalPair, Fee, KvKey, Order, OrderSide, OrderType, Region};
use crate::kv::KvStore;
use crate::reconcile::{Delta, OrderBookReconciler, ReconcileError, Snapshot, SnapshotFetcher};
use crate::rest::{RestClient, SignContext, SignedHeaders, Signer};
use crate::stream::{StreamClient, StreamOptions};

use super::{VenueAdapter, VenueError};

const WS_URL: &str = "wss://api.gateio.ws/ws/v4/";
const REST_BASE_URL: &str = "https://api.gateio.ws/api/v4";

fn canonical_to_symbol(pair: &CanonicalPair) -> String {
    pair.as_str().replace('/', "_")
}

/// Reverse half of the canonical/venue bijection (spec.md §4.7); production
/// decoding resolves wire symbols via `pair_of` instead, so this is only
/// exercised by the round-trip test below.
#[cfg(test)]
fn symbol_to_canonical(symbol: &str) -> CanonicalPair {
    CanonicalPair::new(symbol.replace('_', "/"))
}

fn parse_decimal(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap_or(Decimal::ZERO)
}

fn rows_to_levels(rows: Vec<Vec<String>>) -> Vec<(String, String)> {
    rows.into_iter()
        .filter_map(|row| {
            let mut it = row.into_iter();
            Some((it.next()?, it.next()?))
        })
        .collect()
}

/// Signs Gate.io REST calls (spec.md §6):
/// `hex(HMAC-SHA512(method\npath\nquery\nhex(SHA512(body))\ntimestamp))`.
struct GateioRestSigner {
    api_key: String,
    secret: String,
}

impl Signer for GateioRestSigner {
    fn sign(&self, ctx: &SignContext) -> SignedHeaders {
        let timestamp = ctx.now.timestamp().to_string();
        let hashed_body = hex_encode(sha2::Sha512::digest(ctx.body.as_bytes()));
        let prehash = format!(
            "{}\n{}\n{}\n{}\n{}",
            ctx.method, ctx.path, ctx.query, hashed_body, timestamp
        );

        let mut mac = Hmac::<Sha512>::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts a key of any length");
        mac.update(prehash.as_bytes());
        let signature = hex_encode(mac.finalize().into_bytes());

        SignedHeaders(vec![
            ("KEY".into(), self.api_key.clone()),
            ("SIGN".into(), signature),
            ("Timestamp".into(), timestamp),
        ])
    }
}

/// Fetches an order-book snapshot over REST, both for the initial bootstrap
/// and for the reconciler's gap-triggered resync (spec.md §4.5) — unlike
/// OKX, this venue's sequence ranges make both paths reachable in practice.
struct GateioSnapshotFetcher {
    rest: Arc<RestClient>,
}

#[async_trait]
impl SnapshotFetcher for GateioSnapshotFetcher {
    async fn fetch_snapshot(&self, pair: &CanonicalPair) -> Result<Snapshot, ReconcileError> {
        let currency_pair = canonical_to_symbol(pair);
        let body = self
            .rest
            .call(
                Method::GET,
                "/spot/order_book",
                &[
                    ("currency_pair", currency_pair.as_str()),
                    ("limit", "100"),
                    ("with_id", "true"),
                ],
                None,
            )
            .await
            .map_err(|e| ReconcileError::SnapshotFetch(e.to_string()))?;

        let parsed: GateioOrderBookRestResponse = serde_json::from_slice(&body)
            .map_err(|e| ReconcileError::SnapshotFetch(e.to_string()))?;

        Ok(Snapshot {
            seq: parsed.id,
            asks: rows_to_levels(parsed.asks),
            bids: rows_to_levels(parsed.bids),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GateioOrderBookRestResponse {
    id: i64,
    #[serde(default)]
    asks: Vec<Vec<String>>,
    #[serde(default)]
    bids: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct GateioOrderBookWsResult {
    result: GateioOrderBookWsInner,
}

#[derive(Debug, Deserialize)]
struct GateioOrderBookWsInner {
    #[serde(rename = "s")]
    currency_pair: String,
    #[serde(rename = "U")]
    first_update: i64,
    #[serde(rename = "u")]
    last_update: i64,
    #[serde(default, rename = "a")]
    asks: Vec<Vec<String>>,
    #[serde(default, rename = "b")]
    bids: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct GateioOrderWsResult {
    #[serde(default)]
    result: Vec<GateioOrderWsItem>,
}

#[derive(Debug, Deserialize)]
struct GateioOrderWsItem {
    id: String,
    create_time: String,
    update_time: String,
    price: String,
    amount: String,
    side: String,
    #[serde(rename = "type")]
    order_type: String,
    left: String,
    #[serde(default)]
    filled_total: String,
    #[serde(default)]
    fee: String,
    #[serde(default)]
    fee_currency: String,
    event: String,
    currency_pair: String,
}

#[derive(Debug, Deserialize)]
struct GateioBalanceWsResult {
    #[serde(default)]
    result: Vec<GateioBalanceWsItem>,
}

#[derive(Debug, Deserialize)]
struct GateioBalanceWsItem {
    currency: String,
    available: String,
    total: String,
}

#[derive(Debug, Deserialize)]
struct GateioFeeRestResponse {
    taker_fee: String,
    maker_fee: String,
}

#[derive(Debug, Deserialize)]
struct GateioAccountRestEntry {
    currency: String,
    available: String,
    locked: String,
}

/// State shared between the single streaming session's message handler and
/// the adapter itself.
struct GateioShared {
    venue: String,
    kv: Arc<dyn KvStore>,
    reconciler: Arc<OrderBookReconciler>,
    pair_of: HashMap<String, CanonicalPair>,
}

impl GateioShared {
    async fn dispatch(&self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                debug!(venue = %self.venue, error = %e, "dropping undecodable frame");
                return;
            }
        };

        let Some(channel) = value.get("channel").and_then(Value::as_str) else { return };
        let event = value.get("event").and_then(Value::as_str).unwrap_or("");

        match (channel, event) {
            ("spot.order_book_update", "subscribe") => {
                debug!(venue = %self.venue, "order book channel subscribed");
            }
            ("spot.order_book_update", "update") => self.handle_orderbook_update(text).await,
            ("spot.orders", "subscribe") => debug!(venue = %self.venue, "orders channel subscribed"),
            ("spot.orders", "update") => self.handle_orders(text).await,
            ("spot.balances", "subscribe") => {
                debug!(venue = %self.venue, "balances channel subscribed")
            }
            ("spot.balances", "update") => self.handle_balances(text).await,
            _ => {}
        }
    }

    async fn handle_orderbook_update(&self, text: &str) {
        let parsed: GateioOrderBookWsResult = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                debug!(venue = %self.venue, error = %e, "undecodable order book frame");
                return;
            }
        };
        let result = parsed.result;
        let Some(pair) = self.pair_of.get(&result.currency_pair).cloned() else { return };

        let delta = Delta {
            first_seq: result.first_update,
            last_seq: result.last_update,
            asks: rows_to_levels(result.asks),
            bids: rows_to_levels(result.bids),
        };
        if let Err(e) = self.reconciler.apply_delta(&pair, delta).await {
            warn!(venue = %self.venue, pair = %pair, error = %e, "orderbook reconcile failed");
        }
    }

    async fn handle_orders(&self, text: &str) {
        let parsed: GateioOrderWsResult = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                debug!(venue = %self.venue, error = %e, "undecodable order frame");
                return;
            }
        };

        for item in parsed.result {
            self.handle_order(item).await;
        }
    }

    async fn handle_order(&self, item: GateioOrderWsItem) {
        let Some(pair) = self.pair_of.get(&item.currency_pair).cloned() else { return };

        let side = match item.side.as_str() {
            "sell" => OrderSide::Sell,
            _ => OrderSide::Buy,
        };
        let order_type = match item.order_type.as_str() {
            "market" => OrderType::Market,
            _ => OrderType::Limit,
        };

        let amount = parse_decimal(&item.amount);
        let left = parse_decimal(&item.left);
        let filled_amount = amount - left;
        let price = parse_decimal(&item.price);

        let key = KvKey::new(Region::Order, &[&self.venue, pair.as_str(), &item.id]);

        // Gate.io only ever reports "finished"/"canceled"/"partial canceled"
        // on the terminal "finish" event; "put" and "update" both always
        // mean "resting", distinguished only by first sighting.
        let (status, filled_price, fee, fee_currency) = if item.event == "finish" {
            let canceled = left != Decimal::ZERO;
            let status = super::status_for_fill(canceled, filled_amount, amount);
            let filled_price = (filled_amount > Decimal::ZERO)
                .then(|| parse_decimal(&item.filled_total) / filled_amount);
            (status, filled_price, parse_decimal(&item.fee).abs(), item.fee_currency.clone())
        } else {
            let status = if self.kv.get(Region::Order, &key.key).await.is_err() {
                crate::domain::OrderStatus::Created
            } else {
                crate::domain::OrderStatus::Normal
            };
            (status, None, Decimal::ZERO, String::new())
        };

        let order = Order {
            id: item.id.clone(),
            order_type,
            side,
            create_time: item.create_time.parse().unwrap_or(0),
            update_time: item.update_time.parse().unwrap_or(0),
            price,
            filled_price,
            amount,
            filled_amount,
            left_amount: left,
            status,
            fee,
            fee_currency,
        };

        if let Ok(value) = serde_json::to_string(&order) {
            if let Err(e) = self.kv.set(Region::Order, &key.key, value).await {
                warn!(venue = %self.venue, order = %item.id, error = %e, "failed to write order");
            }
        }
    }

    async fn handle_balances(&self, text: &str) {
        let parsed: GateioBalanceWsResult = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                debug!(venue = %self.venue, error = %e, "undecodable balance frame");
                return;
            }
        };

        for item in parsed.result {
            let total = parse_decimal(&item.total);
            let free = parse_decimal(&item.available);
            let balance = Balance::from_total_free(total, free);
            let key = KvKey::new(Region::Balance, &[&self.venue, &item.currency]);
            if let Ok(value) = serde_json::to_string(&balance) {
                if let Err(e) = self.kv.set(Region::Balance, &key.key, value).await {
                    warn!(venue = %self.venue, currency = %item.currency, error = %e, "failed to write balance");
                }
            }
        }
    }
}

/// Gate.io venue adapter (spec.md §4.7, §6).
pub struct GateioAdapter {
    shared: Arc<GateioShared>,
    pairs: Vec<CanonicalPair>,
    api_key: String,
    secret: String,
    stream: StreamClient,
    rest: Arc<RestClient>,
}

impl GateioAdapter {
    pub fn new(
        config: &Config,
        settings: &ExchangeSettings,
        kv: Arc<dyn KvStore>,
    ) -> Result<Self, VenueError> {
        let api_key = Config::credential(settings, "gateio", "apiKey")
            .map_err(|e| VenueError::MissingCredential(e.to_string()))?
            .to_string();
        let secret = Config::credential(settings, "gateio", "secret")
            .map_err(|e| VenueError::MissingCredential(e.to_string()))?
            .to_string();

        let pairs = config.pairs();
        let pair_of = pairs
            .iter()
            .map(|p| (canonical_to_symbol(p), p.clone()))
            .collect();

        let rest = Arc::new(RestClient::new(
            REST_BASE_URL,
            Arc::new(GateioRestSigner { api_key: api_key.clone(), secret: secret.clone() }),
        ));

        let reconciler = Arc::new(OrderBookReconciler::new(
            "gateio",
            kv.clone(),
            Arc::new(GateioSnapshotFetcher { rest: rest.clone() }),
        ));

        let shared = Arc::new(GateioShared { venue: "gateio".to_string(), kv, reconciler, pair_of });

        let dispatch_shared = Arc::clone(&shared);
        let (raw_tx, mut raw_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(text) = raw_rx.recv().await {
                dispatch_shared.dispatch(&text).await;
            }
        });
        let stream = StreamClient::new(StreamOptions::new(Arc::new(move |text| {
            let _ = raw_tx.send(text);
        })));

        Ok(Self { shared, pairs, api_key, secret, stream, rest })
    }

    fn ws_auth(&self, channel: &str, event: &str, timestamp: i64) -> Value {
        let prehash = format!("channel={channel}&event={event}&time={timestamp}");
        let mut mac = Hmac::<Sha512>::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts a key of any length");
        mac.update(prehash.as_bytes());
        let sign = hex_encode(mac.finalize().into_bytes());

        json!({ "method": "api_key", "KEY": self.api_key, "SIGN": sign })
    }

    async fn send_authed(
        &self,
        channel: &str,
        event: &str,
        payload: Option<Value>,
    ) -> Result<(), VenueError> {
        let timestamp = chrono::Utc::now().timestamp();
        let mut frame = json!({
            "time": timestamp,
            "channel": channel,
            "event": event,
            "auth": self.ws_auth(channel, event, timestamp),
        });
        if let Some(payload) = payload {
            frame["payload"] = payload;
        }
        self.stream
            .send_text(frame.to_string())
            .await
            .map_err(|e| VenueError::Subscription(e.to_string()))
    }

    async fn subscribe(&self) -> Result<(), VenueError> {
        for pair in &self.pairs {
            let currency_pair = canonical_to_symbol(pair);
            self.send_authed(
                "spot.order_book_update",
                "subscribe",
                Some(json!([currency_pair, "100ms"])),
            )
            .await?;
        }

        let currency_pairs: Vec<String> =
            self.pairs.iter().map(canonical_to_symbol).collect();
        self.send_authed("spot.orders", "subscribe", Some(json!(currency_pairs))).await?;

        self.send_authed("spot.balances", "subscribe", None).await?;

        Ok(())
    }

    async fn bootstrap(&self) -> Result<(), VenueError> {
        let body = self.rest.call(Method::GET, "/wallet/fee", &[], None).await?;
        let parsed: GateioFeeRestResponse =
            serde_json::from_slice(&body).map_err(crate::rest::RestError::from)?;
        let fee = Fee::new(parse_decimal(&parsed.maker_fee), parse_decimal(&parsed.taker_fee));
        for pair in &self.pairs {
            let key = KvKey::new(Region::Fee, &["gateio", pair.as_str()]);
            let value = serde_json::to_string(&fee)
                .expect("Fee serialisation is infallible for its own field types");
            self.shared.kv.set(Region::Fee, &key.key, value).await?;
        }

        let body = self.rest.call(Method::GET, "/spot/accounts", &[], None).await?;
        let accounts: Vec<GateioAccountRestEntry> =
            serde_json::from_slice(&body).map_err(crate::rest::RestError::from)?;
        for account in accounts {
            let balance =
                Balance::from_free_used(parse_decimal(&account.available), parse_decimal(&account.locked));
            let key = KvKey::new(Region::Balance, &["gateio", &account.currency]);
            let value = serde_json::to_string(&balance)
                .expect("Balance serialisation is infallible for its own field types");
            self.shared.kv.set(Region::Balance, &key.key, value).await?;
        }

        for pair in &self.pairs {
            let snapshot = GateioSnapshotFetcher { rest: self.rest.clone() }
                .fetch_snapshot(pair)
                .await?;
            self.shared.reconciler.full_replace(pair, snapshot).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl VenueAdapter for GateioAdapter {
    fn name(&self) -> &str {
        "gateio"
    }

    async fn start(&self) -> Result<(), VenueError> {
        self.stream.connect(WS_URL).await?;
        if let Err(e) = self.subscribe().await {
            let _ = self.stream.close().await;
            return Err(e);
        }
        if let Err(e) = self.bootstrap().await {
            let _ = self.stream.close().await;
            return Err(e);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), VenueError> {
        self.stream.close().await.map_err(VenueError::from)
    }

    fn sessions_alive(&self) -> bool {
        self.stream.is_reading() && self.stream.is_sending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_to_symbol_round_trips() {
        let pair = CanonicalPair::new("BTC/USDT");
        let symbol = canonical_to_symbol(&pair);
        assert_eq!(symbol, "BTC_USDT");
        assert_eq!(symbol_to_canonical(&symbol), pair);
    }

    #[test]
    fn rows_to_levels_takes_first_two_columns() {
        let rows = vec![vec!["1.00".to_string(), "5".to_string(), "ignored".to_string()]];
        assert_eq!(rows_to_levels(rows), vec![("1.00".to_string(), "5".to_string())]);
    }
}
