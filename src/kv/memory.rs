//! In-memory KvStore, used in tests. Grounded on the original Go
//! `InternalConnector` (nested `map[string]map[string]string`), guarded here
//! by a `std::sync::Mutex` per spec.md §5's concurrency requirement.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::Region;

use super::{KvError, KvStore};

#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    storage: Mutex<HashMap<Region, HashMap<String, String>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, region: Region, key: &str) -> Result<String, KvError> {
        let storage = self.storage.lock().expect("kv mutex poisoned");
        storage
            .get(&region)
            .and_then(|table| table.get(key))
            .cloned()
            .ok_or_else(|| KvError::NotFound {
                region,
                key: key.to_string(),
            })
    }

    async fn set(&self, region: Region, key: &str, value: String) -> Result<(), KvError> {
        let mut storage = self.storage.lock().expect("kv mutex poisoned");
        storage
            .entry(region)
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, region: Region, key: &str) -> Result<(), KvError> {
        let mut storage = self.storage.lock().expect("kv mutex poisoned");
        match storage.get_mut(&region).and_then(|table| table.remove(key)) {
            Some(_) => Ok(()),
            None => Err(KvError::NotFound {
                region,
                key: key.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let kv = InMemoryKvStore::new();
        kv.set(Region::Balance, "okx.BTC", "1".to_string())
            .await
            .unwrap();
        assert_eq!(kv.get(Region::Balance, "okx.BTC").await.unwrap(), "1");
    }

    #[tokio::test]
    async fn get_missing_key_errors() {
        let kv = InMemoryKvStore::new();
        assert!(matches!(
            kv.get(Region::Fee, "missing").await,
            Err(KvError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let kv = InMemoryKvStore::new();
        kv.set(Region::Order, "a.b.1", "x".to_string()).await.unwrap();
        kv.delete(Region::Order, "a.b.1").await.unwrap();
        assert!(kv.get(Region::Order, "a.b.1").await.is_err());
    }

    #[tokio::test]
    async fn regions_are_independent_namespaces() {
        let kv = InMemoryKvStore::new();
        kv.set(Region::Balance, "k", "balance-value".to_string())
            .await
            .unwrap();
        assert!(kv.get(Region::Fee, "k").await.is_err());
    }
}
