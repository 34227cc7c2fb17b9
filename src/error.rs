use thiserror::Error;

use crate::models::PendingSession;

/// Failures raised by the persistent stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} `{key}` not found")]
    NotFound { collection: String, key: String },

    #[error("{collection} `{key}` already exists")]
    Conflict { collection: String, key: String },

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(collection: &str, key: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failures of ordered-list operations on the training queue
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Failures reported by the training scheduler
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("training queue is empty")]
    EmptyQueue,

    #[error("a training run is already active")]
    AlreadyRunning,

    #[error("invalid training options: {0}")]
    InvalidOptions(String),

    /// The run is over but its session could not be persisted. The pending
    /// session can be handed back to the session log to retry the commit.
    #[error("failed to record session for run {}: {reason}", session.run_id)]
    StoreWriteFailure {
        session: PendingSession,
        reason: String,
    },

    #[error("training run ended without reporting an outcome")]
    RunAborted,

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A single item failed to play
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("cannot decode audio: {0}")]
    Decode(String),

    #[error("output device failure: {0}")]
    Device(String),
}

/// Failures of a capture device
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture already in progress")]
    AlreadyCapturing,

    #[error("no capture in progress")]
    NotCapturing,

    #[error("failed to encode captured audio: {0}")]
    Encode(String),
}
