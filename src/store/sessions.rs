use std::sync::Arc;

use tracing::{info, warn};

use super::backend::{Backend, StoreResult};
use super::Collection;
use crate::error::StoreError;
use crate::models::{PendingSession, PracticeRecord, PracticeSession};

const SESSIONS: &str = "sessions";
const PRACTICE: &str = "practice";

/// Durable log of practice sessions
///
/// Session rows are authoritative. Practice records are a derived cache,
/// kept as one document per session so a session's entries are written all
/// together or not at all; `repair_practice_records` regenerates any that
/// are missing.
#[derive(Clone)]
pub struct SessionLogStore {
    sessions: Collection<PracticeSession>,
    practice: Collection<Vec<PracticeRecord>>,
}

impl SessionLogStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            sessions: Collection::new(Arc::clone(&backend), SESSIONS),
            practice: Collection::new(backend, PRACTICE),
        }
    }

    /// Write a session row. Writing an identical row twice is accepted and
    /// returns the same id; a different row under an existing id is a conflict.
    pub async fn record_session(&self, session: &PracticeSession) -> StoreResult<String> {
        match self.sessions.insert(&session.id, session).await {
            Ok(()) => {
                info!(
                    "Recorded session {} ({}ms, {} phrases)",
                    session.id,
                    session.duration_millis,
                    session.recording_ids.len()
                );
                Ok(session.id.clone())
            }
            Err(StoreError::Conflict { collection, key }) => {
                match self.sessions.get(&session.id).await? {
                    Some(existing) if existing == *session => {
                        info!("Session {} already recorded", session.id);
                        Ok(session.id.clone())
                    }
                    _ => Err(StoreError::Conflict { collection, key }),
                }
            }
            Err(e) => Err(e),
        }
    }

    pub async fn record_practice_entries(
        &self,
        session_id: &str,
        entries: &[PracticeRecord],
    ) -> StoreResult<()> {
        self.practice.put(session_id, &entries.to_vec()).await
    }

    /// Write a finished run: the session row, then its practice records.
    /// A failure on the practice records is logged and left for repair.
    pub async fn commit(&self, pending: &PendingSession) -> StoreResult<PracticeSession> {
        let session = pending.to_session();
        self.record_session(&session).await?;

        if let Err(e) = self
            .record_practice_entries(&session.id, &session.practice_records())
            .await
        {
            warn!(
                "Session {} recorded without practice records: {}",
                session.id, e
            );
        }

        Ok(session)
    }

    pub async fn get_session(&self, id: &str) -> StoreResult<PracticeSession> {
        self.sessions
            .get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(SESSIONS, id))
    }

    pub async fn all_sessions(&self) -> StoreResult<Vec<PracticeSession>> {
        self.sessions.list().await
    }

    pub async fn all_practice_records(&self) -> StoreResult<Vec<PracticeRecord>> {
        Ok(self.practice.list().await?.into_iter().flatten().collect())
    }

    /// Regenerate practice records for sessions that lack them.
    /// Returns the number of sessions repaired.
    pub async fn repair_practice_records(&self) -> StoreResult<usize> {
        let mut repaired = 0;

        for session in self.all_sessions().await? {
            if self.practice.get(&session.id).await?.is_some() {
                continue;
            }

            self.record_practice_entries(&session.id, &session.practice_records())
                .await?;
            repaired += 1;
        }

        if repaired > 0 {
            info!("Repaired practice records for {} sessions", repaired);
        }

        Ok(repaired)
    }
}
