//! Redis-backed KvStore. Grounded on the original Go implementation's
//! `database.NewRedisConnector(&redis.Options{...})` (see
//! `examples/original_source/cmd/market-update/main.go`): each region maps
//! to one outer hash, and `key` maps to a field within it (`HSET region key
//! value`). Atomicity of single-key HSET/HGET/HDEL is inherited from Redis
//! itself, per spec.md §4.1.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::domain::Region;

use super::{KvError, KvStore};

pub struct RedisKvStore {
    conn: ConnectionManager,
}

impl RedisKvStore {
    /// Connects to a Redis server at `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(url).map_err(|e| KvError::Backend(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| KvError::Backend(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, region: Region, key: &str) -> Result<String, KvError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .hget(region.as_str(), key)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))?;
        value.ok_or_else(|| KvError::NotFound {
            region,
            key: key.to_string(),
        })
    }

    async fn set(&self, region: Region, key: &str, value: String) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(region.as_str(), key, value)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn delete(&self, region: Region, key: &str) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .hdel(region.as_str(), key)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))?;
        if removed == 0 {
            return Err(KvError::NotFound {
                region,
                key: key.to_string(),
            });
        }
        Ok(())
    }
}
