//! Abstract namespaced key-value store (spec.md §4.1).
//!
//! Three operations: `get`, `set`, `delete`, keyed by `(region, key)` with
//! opaque string values. Two implementations live behind the trait: an
//! in-memory store for tests and a Redis-backed store for production,
//! mirroring the original `database.Connector` interface and its
//! `InternalConnector`/`RedisConnector` implementations.

mod memory;
mod redis_store;

pub use memory::InMemoryKvStore;
pub use redis_store::RedisKvStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Region;

/// KvError represents errors surfaced from Get/Set/Delete.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("key not found: {region}/{key}")]
    NotFound { region: Region, key: String },

    #[error("kv backend error: {0}")]
    Backend(String),
}

/// KvStore is the abstract namespaced key-value interface all canonical
/// records are published through. Operations are independently atomic;
/// there is no multi-key transaction (spec.md §4.1).
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, region: Region, key: &str) -> Result<String, KvError>;
    async fn set(&self, region: Region, key: &str, value: String) -> Result<(), KvError>;
    async fn delete(&self, region: Region, key: &str) -> Result<(), KvError>;
}
