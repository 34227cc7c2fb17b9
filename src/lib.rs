pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod stats;
pub mod store;
pub mod training;

pub use audio::{AudioFrame, CaptureConfig, ClipInfo, Player, Recorder, TimedPlayer, WavRecorder};
pub use config::Config;
pub use error::{CaptureError, PlaybackError, QueueError, StoreError, TrainingError};
pub use http::{create_router, AppState};
pub use models::{
    NewRecording, PendingSession, PlaybackSettings, PracticeRecord, PracticeSession, Recording,
    RecordingSummary,
};
pub use stats::{Statistics, StatisticsAggregator};
pub use store::{
    Backend, FileBackend, MemoryBackend, QueueStore, RecordingStore, SessionLogStore,
};
pub use training::{
    RunHandle, RunReport, SchedulerState, Termination, TrainingEvent, TrainingOptions,
    TrainingQueue, TrainingScheduler, TrainingStatus,
};
