use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::audio::{CaptureConfig, Player};
use crate::config::Config;
use crate::models::PlaybackSettings;
use crate::stats::StatisticsAggregator;
use crate::store::{Backend, QueueStore, RecordingStore, SessionLogStore, StoreResult};
use crate::training::{RunReport, TrainingQueue, TrainingScheduler};

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub recordings: RecordingStore,
    pub sessions: SessionLogStore,
    pub queue_store: QueueStore,
    /// In-memory copy of the persisted queue; the lock serialises edits
    pub queue: Arc<Mutex<TrainingQueue>>,
    pub scheduler: Arc<TrainingScheduler>,
    pub stats: StatisticsAggregator,
    /// Report of the most recently finished run
    pub last_run: Arc<RwLock<Option<RunReport>>>,
    pub default_settings: PlaybackSettings,
    pub capture: CaptureConfig,
}

impl AppState {
    pub async fn open(
        backend: Arc<dyn Backend>,
        player: Arc<dyn Player>,
        config: &Config,
    ) -> StoreResult<Self> {
        let recordings = RecordingStore::new(Arc::clone(&backend));
        let sessions = SessionLogStore::new(Arc::clone(&backend));
        let queue_store = QueueStore::new(backend);
        let queue = queue_store.load().await?;

        // Practice records lost to an interrupted commit are rebuilt from their sessions
        sessions.repair_practice_records().await?;

        let scheduler = TrainingScheduler::new(recordings.clone(), sessions.clone(), player)
            .with_defaults(config.training.options());

        Ok(Self {
            stats: StatisticsAggregator::new(recordings.clone(), sessions.clone()),
            recordings,
            sessions,
            queue_store,
            queue: Arc::new(Mutex::new(queue)),
            scheduler: Arc::new(scheduler),
            last_run: Arc::new(RwLock::new(None)),
            default_settings: config.playback.settings(),
            capture: config.capture.capture_config(),
        })
    }
}
