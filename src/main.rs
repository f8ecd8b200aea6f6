//! Process entry point (spec.md §4.9/§7, SPEC_FULL.md §4.10): loads the
//! configuration document, builds one [`Synchroniser`] per configured
//! venue, runs until SIGINT/SIGTERM, and joins all venues on shutdown.
//! Grounded on the original Go `cmd/market-update/main.go` (fixed
//! `configs/config.yaml` path, one goroutine per venue, block forever on an
//! empty channel) generalised to `tokio::join!` over the per-venue
//! watchdog-driven shutdown this crate implements instead.

mod config;
mod domain;
mod error;
mod kv;
mod logging;
mod reconcile;
mod rest;
mod stream;
mod synchroniser;
mod venues;

use std::sync::Arc;

use tracing::{error, info};

use config::Config;
use error::MarketsyncError;
use kv::{KvStore, RedisKvStore};
use synchroniser::Synchroniser;
use venues::gateio::GateioAdapter;
use venues::okx::OkxAdapter;

/// Conventional configuration path (spec.md §6; matches the original Go
/// source's `configs/config.yaml`).
const CONFIG_PATH: &str = "configs/config.yaml";

/// Default Redis address (matches the original Go source's
/// `redis.Options{Addr: "localhost:6379"}`); overridable for deployments
/// that run Redis elsewhere.
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

#[tokio::main]
async fn main() -> Result<(), MarketsyncError> {
    let config = Config::load(CONFIG_PATH)?;
    let _log_guard = logging::init(&config.log);

    let redis_url = std::env::var("MARKETSYNC_REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string());
    let kv: Arc<dyn KvStore> = Arc::new(RedisKvStore::connect(&redis_url).await?);

    let mut synchronisers = Vec::new();

    if let Ok(settings) = config.exchange_settings("okx") {
        let adapter = OkxAdapter::new(&config, settings, kv.clone())?;
        synchronisers.push(Synchroniser::new(Arc::new(adapter)));
    }

    if let Ok(settings) = config.exchange_settings("gateio") {
        let adapter = GateioAdapter::new(&config, settings, kv.clone())?;
        synchronisers.push(Synchroniser::new(Arc::new(adapter)));
    }

    if synchronisers.is_empty() {
        error!("no configured venues matched a known adapter (okx, gateio)");
        return Ok(());
    }

    for sync in &synchronisers {
        sync.start().await?;
    }

    info!(venues = synchronisers.len(), "marketsync running");

    // Each synchroniser's own watchdog observes SIGINT/SIGTERM and degraded
    // links and drives its own shutdown (spec.md §4.8); `main` simply waits
    // for every venue to report itself no longer running before exiting.
    loop {
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        let mut any_running = false;
        for sync in &synchronisers {
            if sync.is_running().await {
                any_running = true;
            }
        }
        if !any_running {
            break;
        }
    }

    info!("all venues stopped, exiting");
    Ok(())
}
