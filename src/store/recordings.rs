use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::backend::{Backend, StoreResult};
use super::Collection;
use crate::audio::ClipInfo;
use crate::error::StoreError;
use crate::models::{
    NewRecording, PlaybackSettings, Recording, RecordingSummary, DEFAULT_CATEGORIES,
    DEFAULT_CATEGORY,
};

const RECORDINGS: &str = "recordings";
const CATEGORIES: &str = "categories";
const CATEGORIES_KEY: &str = "all";

/// Durable keyed storage of recorded phrases
#[derive(Clone)]
pub struct RecordingStore {
    recordings: Collection<Recording>,
    categories: Collection<Vec<String>>,
    /// The category list is one shared document; edits to it are serialised
    categories_lock: Arc<Mutex<()>>,
}

impl RecordingStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            recordings: Collection::new(Arc::clone(&backend), RECORDINGS),
            categories: Collection::new(backend, CATEGORIES),
            categories_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Store a new recording under a freshly allocated id
    pub async fn save(&self, new: NewRecording) -> StoreResult<String> {
        let id = format!("recording-{}", Uuid::new_v4());

        let duration_millis = ClipInfo::probe(&new.audio)
            .map(|clip| clip.duration_millis)
            .unwrap_or(0);

        let recording = Recording {
            id: id.clone(),
            name: new.name,
            category: new.category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            audio: new.audio,
            settings: new.settings.unwrap_or_default().clamped(),
            duration_millis,
            created_at: Utc::now(),
            play_count: 0,
            last_played: None,
        };

        self.recordings.insert(&id, &recording).await?;

        info!(
            "Saved recording {} \"{}\" ({} bytes, {}ms)",
            id,
            recording.name,
            recording.audio.len(),
            duration_millis
        );

        Ok(id)
    }

    pub async fn get(&self, id: &str) -> StoreResult<Recording> {
        self.find(id)
            .await?
            .ok_or_else(|| StoreError::not_found(self.recordings.name(), id))
    }

    /// Like `get`, with a missing id reported as `None`
    pub async fn find(&self, id: &str) -> StoreResult<Option<Recording>> {
        self.recordings.get(id).await
    }

    pub async fn list(&self) -> StoreResult<Vec<Recording>> {
        self.recordings.list().await
    }

    pub async fn summaries(&self) -> StoreResult<Vec<RecordingSummary>> {
        Ok(self.list().await?.iter().map(RecordingSummary::from).collect())
    }

    pub async fn ids(&self) -> StoreResult<Vec<String>> {
        Ok(self.list().await?.into_iter().map(|r| r.id).collect())
    }

    pub async fn list_by_category(&self, category: &str) -> StoreResult<Vec<Recording>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|recording| recording.category == category)
            .collect())
    }

    /// Remove a recording. Practice history referencing it is left untouched.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        if self.recordings.delete(id).await? {
            info!("Deleted recording {}", id);
            Ok(())
        } else {
            Err(StoreError::not_found(self.recordings.name(), id))
        }
    }

    /// Delete every listed id; unknown ids are ignored. Returns how many were removed.
    pub async fn delete_many(&self, ids: &[String]) -> StoreResult<usize> {
        let mut removed = 0;
        for id in ids {
            if self.recordings.delete(id).await? {
                removed += 1;
            }
        }

        info!("Batch delete removed {} of {} recordings", removed, ids.len());
        Ok(removed)
    }

    pub async fn rename(&self, id: &str, name: &str) -> StoreResult<Recording> {
        let name = name.to_string();
        self.update(id, move |recording| recording.name = name).await
    }

    pub async fn update_category(&self, id: &str, category: &str) -> StoreResult<Recording> {
        let category = category.to_string();
        self.update(id, move |recording| recording.category = category)
            .await
    }

    pub async fn update_settings(
        &self,
        id: &str,
        settings: PlaybackSettings,
    ) -> StoreResult<Recording> {
        self.update(id, move |recording| recording.settings = settings.clamped())
            .await
    }

    /// Bump the play counter after a successful playback
    pub async fn mark_played(&self, id: &str, at: DateTime<Utc>) -> StoreResult<Recording> {
        self.update(id, move |recording| {
            recording.play_count += 1;
            recording.last_played = Some(at);
        })
        .await
    }

    /// Read-modify-write of the whole record. The write refuses to recreate
    /// a record deleted in between.
    async fn update<F>(&self, id: &str, apply: F) -> StoreResult<Recording>
    where
        F: FnOnce(&mut Recording) + Send,
    {
        let mut recording = self.get(id).await?;
        apply(&mut recording);
        self.recordings.replace(id, &recording).await?;

        debug!("Updated recording {}", id);
        Ok(recording)
    }

    pub async fn categories(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .categories
            .get(CATEGORIES_KEY)
            .await?
            .unwrap_or_else(|| DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()))
    }

    /// Returns false if the category was already known
    pub async fn add_category(&self, category: &str) -> StoreResult<bool> {
        let _guard = self.categories_lock.lock().await;
        let mut categories = self.categories().await?;

        if categories.iter().any(|c| c == category) {
            return Ok(false);
        }

        categories.push(category.to_string());
        self.categories.put(CATEGORIES_KEY, &categories).await?;

        info!("Added category \"{}\"", category);
        Ok(true)
    }
}
