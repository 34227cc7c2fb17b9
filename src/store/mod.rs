//! Persistent stores
//!
//! - `RecordingStore`: recorded phrases and their metadata
//! - `SessionLogStore`: practice sessions and the practice records derived from them
//! - `QueueStore`: the training queue, persisted apart from recordings
//!
//! All three sit on a shared `Backend` handed in by the caller.

mod backend;
mod file;
mod queue;
mod recordings;
mod sessions;

pub use backend::{Backend, MemoryBackend, StoreResult};
pub use file::FileBackend;
pub use queue::QueueStore;
pub use recordings::RecordingStore;
pub use sessions::SessionLogStore;

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Typed view over one backend collection
pub(crate) struct Collection<T> {
    backend: Arc<dyn Backend>,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            name: self.name,
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> Collection<T> {
    pub(crate) fn new(backend: Arc<dyn Backend>, name: &'static str) -> Self {
        Self {
            backend,
            name,
            _marker: PhantomData,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) async fn insert(&self, key: &str, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.backend.insert(self.name, key, bytes).await
    }

    pub(crate) async fn replace(&self, key: &str, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.backend.replace(self.name, key, bytes).await
    }

    pub(crate) async fn put(&self, key: &str, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.backend.put(self.name, key, bytes).await
    }

    pub(crate) async fn get(&self, key: &str) -> StoreResult<Option<T>> {
        match self.backend.get(self.name, key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn list(&self) -> StoreResult<Vec<T>> {
        self.backend
            .list(self.name)
            .await?
            .into_iter()
            .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(Into::into))
            .collect()
    }

    pub(crate) async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.backend.delete(self.name, key).await
    }
}
