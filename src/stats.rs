use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{PracticeRecord, PracticeSession, Recording};
use crate::store::{RecordingStore, SessionLogStore, StoreResult};

/// `lastPracticeDate` when no session was ever recorded
pub const NEVER: &str = "Never";

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Summary of the practice history
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_phrases: usize,
    pub total_sessions: usize,
    pub total_time_minutes: f64,
    pub average_session_length_minutes: f64,
    pub average_phrases_per_session: f64,
    /// Date of the latest session, or `"Never"`
    pub last_practice_date: String,
    pub last_practice_at: Option<DateTime<Utc>>,
    /// Newest first
    pub recent_activity: Vec<ActivityEntry>,
    pub phrases: Vec<PhraseStats>,
}

impl Statistics {
    /// Keep only the `limit` most recent activity entries
    pub fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_activity.truncate(limit);
        self
    }
}

/// One line of recent activity
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

/// Practice totals for one recording id
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseStats {
    pub recording_id: String,
    /// `None` once the recording has been deleted
    pub name: Option<String>,
    pub times_practiced: usize,
    pub total_practice_minutes: f64,
    pub play_count: u32,
}

/// Computes `Statistics` from the stores on every call
#[derive(Clone)]
pub struct StatisticsAggregator {
    recordings: RecordingStore,
    sessions: SessionLogStore,
}

impl StatisticsAggregator {
    pub fn new(recordings: RecordingStore, sessions: SessionLogStore) -> Self {
        Self {
            recordings,
            sessions,
        }
    }

    pub async fn compute(&self) -> StoreResult<Statistics> {
        let recordings = self.recordings.list().await?;
        let sessions = self.sessions.all_sessions().await?;
        let practice = self.sessions.all_practice_records().await?;

        Ok(summarize(&recordings, &sessions, &practice))
    }
}

/// Pure summary over store contents
pub fn summarize(
    recordings: &[Recording],
    sessions: &[PracticeSession],
    practice: &[PracticeRecord],
) -> Statistics {
    let total_sessions = sessions.len();
    let total_millis: u64 = sessions.iter().map(|s| s.duration_millis).sum();
    let total_phrases_practiced: usize = sessions.iter().map(|s| s.recording_ids.len()).sum();

    let total_time_minutes = total_millis as f64 / MILLIS_PER_MINUTE;

    let (average_session_length_minutes, average_phrases_per_session) = if total_sessions == 0 {
        (0.0, 0.0)
    } else {
        (
            total_time_minutes / total_sessions as f64,
            total_phrases_practiced as f64 / total_sessions as f64,
        )
    };

    let last_practice_at = sessions.iter().map(|s| s.timestamp).max();
    let last_practice_date = last_practice_at
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| NEVER.to_string());

    let mut ordered: Vec<&PracticeSession> = sessions.iter().collect();
    ordered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));

    let recent_activity = ordered
        .into_iter()
        .map(|session| ActivityEntry {
            session_id: session.id.clone(),
            timestamp: session.timestamp,
            description: describe(session),
        })
        .collect();

    Statistics {
        total_phrases: recordings.len(),
        total_sessions,
        total_time_minutes,
        average_session_length_minutes,
        average_phrases_per_session,
        last_practice_date,
        last_practice_at,
        recent_activity,
        phrases: phrase_breakdown(recordings, practice),
    }
}

fn describe(session: &PracticeSession) -> String {
    let count = session.recording_ids.len();
    let noun = if count == 1 { "phrase" } else { "phrases" };

    format!(
        "{}: practiced {} {} for {:.1} minutes",
        session.timestamp.format("%Y-%m-%d %H:%M"),
        count,
        noun,
        session.duration_millis as f64 / MILLIS_PER_MINUTE
    )
}

fn phrase_breakdown(recordings: &[Recording], practice: &[PracticeRecord]) -> Vec<PhraseStats> {
    let mut by_id: BTreeMap<&str, PhraseStats> = recordings
        .iter()
        .map(|recording| {
            (
                recording.id.as_str(),
                PhraseStats {
                    recording_id: recording.id.clone(),
                    name: Some(recording.name.clone()),
                    times_practiced: 0,
                    total_practice_minutes: 0.0,
                    play_count: recording.play_count,
                },
            )
        })
        .collect();

    for record in practice {
        let entry = by_id
            .entry(record.recording_id.as_str())
            .or_insert_with(|| PhraseStats {
                recording_id: record.recording_id.clone(),
                name: None,
                times_practiced: 0,
                total_practice_minutes: 0.0,
                play_count: 0,
            });

        entry.times_practiced += 1;
        entry.total_practice_minutes += record.duration_millis as f64 / MILLIS_PER_MINUTE;
    }

    let mut phrases: Vec<PhraseStats> = by_id.into_values().collect();
    phrases.sort_by(|a, b| {
        b.times_practiced
            .cmp(&a.times_practiced)
            .then_with(|| a.recording_id.cmp(&b.recording_id))
    });
    phrases
}
