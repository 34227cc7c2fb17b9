//! Persisted record shapes
//!
//! Field names serialise in camelCase so that any UI layer built against the
//! stored documents sees `createdAt`, `durationMillis`, `recordingIds` and so on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CATEGORY: &str = "Phrases";

pub const DEFAULT_CATEGORIES: [&str; 4] = ["Greetings", "Commands", "Phrases", "Songs"];

/// Per-recording playback settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Volume level (0.0 to 1.0)
    pub volume: f32,
    /// Pitch multiplier (0.5 to 2.0)
    pub pitch: f32,
    /// Playback rate (0.5 to 2.0)
    pub rate: f32,
}

impl PlaybackSettings {
    /// Clamp every field into its supported range
    pub fn clamped(self) -> Self {
        Self {
            volume: clamp_or(self.volume, 0.0, 1.0, 1.0),
            pitch: clamp_or(self.pitch, 0.5, 2.0, 1.0),
            rate: clamp_or(self.rate, 0.5, 2.0, 1.0),
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pitch: 1.0,
            rate: 1.0,
        }
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

/// A recorded phrase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub id: String,
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(with = "audio_base64")]
    pub audio: Vec<u8>,
    #[serde(default)]
    pub settings: PlaybackSettings,
    /// Clip length probed from the payload; 0 when unknown
    #[serde(default)]
    pub duration_millis: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub play_count: u32,
    #[serde(default)]
    pub last_played: Option<DateTime<Utc>>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// Input for `RecordingStore::save`
#[derive(Debug, Clone)]
pub struct NewRecording {
    pub name: String,
    pub audio: Vec<u8>,
    pub category: Option<String>,
    pub settings: Option<PlaybackSettings>,
}

impl NewRecording {
    pub fn new(name: impl Into<String>, audio: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            audio,
            category: None,
            settings: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_settings(mut self, settings: PlaybackSettings) -> Self {
        self.settings = Some(settings);
        self
    }
}

/// Recording metadata without the audio payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    pub id: String,
    pub name: String,
    pub category: String,
    pub settings: PlaybackSettings,
    pub duration_millis: u64,
    pub created_at: DateTime<Utc>,
    pub play_count: u32,
    pub last_played: Option<DateTime<Utc>>,
    pub size_bytes: usize,
}

impl From<&Recording> for RecordingSummary {
    fn from(recording: &Recording) -> Self {
        Self {
            id: recording.id.clone(),
            name: recording.name.clone(),
            category: recording.category.clone(),
            settings: recording.settings,
            duration_millis: recording.duration_millis,
            created_at: recording.created_at,
            play_count: recording.play_count,
            last_played: recording.last_played,
            size_bytes: recording.audio.len(),
        }
    }
}

/// A completed or stopped training run, written once and never updated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSession {
    pub id: String,
    /// When the run started
    pub timestamp: DateTime<Utc>,
    pub duration_millis: u64,
    /// The queue snapshot the run was started with, never a shuffled order
    pub recording_ids: Vec<String>,
}

/// A session that has ended but has not been written yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSession {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub duration_millis: u64,
    pub recording_ids: Vec<String>,
}

impl PendingSession {
    /// Session ids derive from the run id so that a retried commit of the
    /// same run lands on the same row.
    pub fn session_id(&self) -> String {
        format!("session-{}", self.run_id)
    }

    pub fn to_session(&self) -> PracticeSession {
        PracticeSession {
            id: self.session_id(),
            timestamp: self.timestamp,
            duration_millis: self.duration_millis,
            recording_ids: self.recording_ids.clone(),
        }
    }
}

/// A share of one session's duration attributed to one queued recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeRecord {
    pub session_id: String,
    pub recording_id: String,
    pub timestamp: DateTime<Utc>,
    pub duration_millis: u64,
}

impl PracticeSession {
    /// One entry per id in the snapshot, each getting `duration / len`
    pub fn practice_records(&self) -> Vec<PracticeRecord> {
        if self.recording_ids.is_empty() {
            return Vec::new();
        }

        let share = self.duration_millis / self.recording_ids.len() as u64;

        self.recording_ids
            .iter()
            .map(|recording_id| PracticeRecord {
                session_id: self.id.clone(),
                recording_id: recording_id.clone(),
                timestamp: self.timestamp,
                duration_millis: share,
            })
            .collect()
    }
}

mod audio_base64 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
