use serde::Serialize;
use uuid::Uuid;

use crate::models::PracticeSession;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Completed,
    Stopped,
}

/// Progress notifications published by the scheduler
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrainingEvent {
    Started {
        run_id: Uuid,
        queue_len: usize,
        repetitions: u32,
    },
    RepetitionStarted {
        run_id: Uuid,
        repetition: u32,
        order: Vec<String>,
    },
    ItemStarted {
        run_id: Uuid,
        repetition: u32,
        index: usize,
        recording_id: String,
    },
    ItemSkipped {
        run_id: Uuid,
        recording_id: String,
    },
    PlaybackFailed {
        run_id: Uuid,
        recording_id: String,
        error: String,
    },
    Waiting {
        run_id: Uuid,
        interval_ms: u64,
    },
    StopRequested {
        run_id: Uuid,
    },
    Finished {
        run_id: Uuid,
        termination: Termination,
        session: Option<PracticeSession>,
        error: Option<String>,
    },
}

impl TrainingEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            Self::Started { run_id, .. }
            | Self::RepetitionStarted { run_id, .. }
            | Self::ItemStarted { run_id, .. }
            | Self::ItemSkipped { run_id, .. }
            | Self::PlaybackFailed { run_id, .. }
            | Self::Waiting { run_id, .. }
            | Self::StopRequested { run_id }
            | Self::Finished { run_id, .. } => *run_id,
        }
    }
}
