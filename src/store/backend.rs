use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use crate::error::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable key-value backend behind every store
///
/// Values are opaque serialized documents grouped into named collections.
/// Implementations:
/// - `MemoryBackend`: process-local, for tests and throwaway sessions
/// - `FileBackend`: one JSON file per key, survives restarts
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Create a new key; fails with `Conflict` if it already exists
    async fn insert(&self, collection: &str, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Overwrite an existing key; fails with `NotFound` if it is absent
    async fn replace(&self, collection: &str, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Create or overwrite
    async fn put(&self, collection: &str, key: &str, value: Vec<u8>) -> StoreResult<()>;

    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Every entry of a collection, ordered by key
    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;

    /// Returns whether the key existed
    async fn delete(&self, collection: &str, key: &str) -> StoreResult<bool>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// In-memory backend
#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Backend for MemoryBackend {
    async fn insert(&self, collection: &str, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.to_string()).or_default();

        if entries.contains_key(key) {
            return Err(StoreError::Conflict {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }

        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn replace(&self, collection: &str, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let mut collections = self.collections.write().await;

        match collections
            .get_mut(collection)
            .and_then(|entries| entries.get_mut(key))
        {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StoreError::not_found(collection, key)),
        }
    }

    async fn put(&self, collection: &str, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, collection: &str, key: &str) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .map(|entries| entries.remove(key).is_some())
            .unwrap_or(false))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
