use std::sync::Arc;

use tracing::debug;

use super::backend::{Backend, StoreResult};
use super::Collection;
use crate::training::TrainingQueue;

const QUEUE: &str = "queue";
const QUEUE_KEY: &str = "training";

/// Persists the training queue so it survives restarts
#[derive(Clone)]
pub struct QueueStore {
    queue: Collection<TrainingQueue>,
}

impl QueueStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            queue: Collection::new(backend, QUEUE),
        }
    }

    /// The saved queue, or an empty one if none was ever saved
    pub async fn load(&self) -> StoreResult<TrainingQueue> {
        Ok(self.queue.get(QUEUE_KEY).await?.unwrap_or_default())
    }

    pub async fn save(&self, queue: &TrainingQueue) -> StoreResult<()> {
        self.queue.put(QUEUE_KEY, queue).await?;
        debug!("Saved training queue ({} items)", queue.len());
        Ok(())
    }
}
