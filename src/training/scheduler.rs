use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use super::events::{Termination, TrainingEvent};
use super::options::TrainingOptions;
use crate::audio::Player;
use crate::error::TrainingError;
use crate::models::{PendingSession, PracticeSession};
use crate::store::{RecordingStore, SessionLogStore};

const EVENT_CAPACITY: usize = 256;

/// Externally observable scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    /// Stop requested, waiting for the run loop to reach a checkpoint
    Stopping,
}

/// Snapshot of the scheduler for status queries
#[derive(Debug, Clone, Serialize)]
pub struct TrainingStatus {
    pub state: SchedulerState,
    pub run_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub repetitions_total: u32,
    pub repetitions_completed: u32,
    pub interval_ms: u64,
    pub random_order: bool,
    pub queue_len: usize,
    pub current_item: Option<String>,
}

/// Final account of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub termination: Termination,
    /// What was (or should have been) written to the session log
    pub pending: PendingSession,
    pub session: Option<PracticeSession>,
    pub commit_error: Option<String>,
    pub repetitions_completed: u32,
    pub plays: usize,
    pub skipped: usize,
    pub playback_failures: usize,
}

/// Handle on a started run
pub struct RunHandle {
    run_id: Uuid,
    outcome: watch::Receiver<Option<RunReport>>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Wait for the run to end and return its report, even if the commit failed
    pub async fn report(mut self) -> Result<RunReport, TrainingError> {
        let report = self
            .outcome
            .wait_for(|outcome| outcome.is_some())
            .await
            .map_err(|_| TrainingError::RunAborted)?
            .clone();

        report.ok_or(TrainingError::RunAborted)
    }

    /// Wait for the run to end. A failed commit surfaces as `StoreWriteFailure`.
    pub async fn wait(self) -> Result<RunReport, TrainingError> {
        let report = self.report().await?;

        match report.commit_error {
            Some(reason) => Err(TrainingError::StoreWriteFailure {
                session: report.pending,
                reason,
            }),
            None => Ok(report),
        }
    }
}

struct RunParams {
    repetitions: u32,
    interval: Duration,
}

/// State shared between the scheduler and one run loop
struct RunShared {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    snapshot: Vec<String>,
    random_order: bool,
    params: Mutex<RunParams>,
    cancel: CancellationToken,
    /// Set by `stop` before the token is cancelled
    cancelled_at: Mutex<Option<DateTime<Utc>>>,
    current_repetition: AtomicU32,
    repetitions_completed: AtomicU32,
    current_item: Mutex<Option<String>>,
    committed: AtomicBool,
}

struct ActiveRun {
    shared: Arc<RunShared>,
    outcome: watch::Receiver<Option<RunReport>>,
}

/// Plays the training queue in timed repetitions and logs each run as a
/// practice session
///
/// At most one run is active at a time. Stopping is cooperative: the run loop
/// notices the request before the next repetition, before the next item, or
/// when about to wait out an interval. A playback in progress always runs to
/// its end.
pub struct TrainingScheduler {
    recordings: RecordingStore,
    sessions: SessionLogStore,
    player: Arc<dyn Player>,
    clock: Arc<dyn Clock>,
    defaults: Mutex<TrainingOptions>,
    active: Arc<Mutex<Option<ActiveRun>>>,
    single_play: Arc<AtomicBool>,
    events: broadcast::Sender<TrainingEvent>,
}

impl TrainingScheduler {
    pub fn new(
        recordings: RecordingStore,
        sessions: SessionLogStore,
        player: Arc<dyn Player>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            recordings,
            sessions,
            player,
            clock: Arc::new(SystemClock),
            defaults: Mutex::new(TrainingOptions::default()),
            active: Arc::new(Mutex::new(None)),
            single_play: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Options used by `start_with_defaults`
    pub fn with_defaults(mut self, defaults: TrainingOptions) -> Self {
        self.defaults = Mutex::new(defaults);
        self
    }

    /// Receive progress events for every subsequent run
    pub fn subscribe(&self) -> broadcast::Receiver<TrainingEvent> {
        self.events.subscribe()
    }

    pub async fn defaults(&self) -> TrainingOptions {
        *self.defaults.lock().await
    }

    pub async fn start_with_defaults(&self, snapshot: Vec<String>) -> Result<RunHandle, TrainingError> {
        let options = self.defaults().await;
        self.start(snapshot, options).await
    }

    /// Begin a run over `snapshot`
    pub async fn start(
        &self,
        snapshot: Vec<String>,
        options: TrainingOptions,
    ) -> Result<RunHandle, TrainingError> {
        if snapshot.is_empty() {
            warn!("Refusing to start training: queue is empty");
            return Err(TrainingError::EmptyQueue);
        }
        options.validate()?;

        let mut active = self.active.lock().await;
        if active.is_some() || self.single_play.load(Ordering::SeqCst) {
            warn!("Refusing to start training: a run is already active");
            return Err(TrainingError::AlreadyRunning);
        }

        let shared = Arc::new(RunShared {
            run_id: Uuid::new_v4(),
            started_at: self.clock.now(),
            snapshot,
            random_order: options.random_order,
            params: Mutex::new(RunParams {
                repetitions: options.repetitions,
                interval: options.interval,
            }),
            cancel: CancellationToken::new(),
            cancelled_at: Mutex::new(None),
            current_repetition: AtomicU32::new(0),
            repetitions_completed: AtomicU32::new(0),
            current_item: Mutex::new(None),
            committed: AtomicBool::new(false),
        });

        let run_id = shared.run_id;
        let (outcome_tx, outcome_rx) = watch::channel(None);

        info!(
            "Starting training run {}: {} phrases x {} repetitions, interval {}ms, random order {}",
            run_id,
            shared.snapshot.len(),
            options.repetitions,
            options.interval.as_millis(),
            options.random_order
        );

        let _ = self.events.send(TrainingEvent::Started {
            run_id,
            queue_len: shared.snapshot.len(),
            repetitions: options.repetitions,
        });

        let run_loop = RunLoop {
            recordings: self.recordings.clone(),
            sessions: self.sessions.clone(),
            player: Arc::clone(&self.player),
            clock: Arc::clone(&self.clock),
            events: self.events.clone(),
            shared: Arc::clone(&shared),
            active: Arc::clone(&self.active),
        };

        // The loop releases the active slot when done, which needs this lock,
        // so it cannot finish before the slot is filled below. The outer task
        // frees the slot if the loop panics.
        let slot = Arc::clone(&self.active);
        tokio::spawn(async move {
            if let Err(e) = tokio::spawn(run_loop.run(outcome_tx)).await {
                error!("Training run {} aborted: {}", run_id, e);
                release_slot(&slot, run_id).await;
            }
        });

        *active = Some(ActiveRun {
            shared,
            outcome: outcome_rx.clone(),
        });

        Ok(RunHandle {
            run_id,
            outcome: outcome_rx,
        })
    }

    /// Request cancellation of the active run and return immediately.
    /// Returns false if there was nothing to stop.
    pub async fn stop(&self) -> bool {
        let active = self.active.lock().await;

        let Some(run) = active.as_ref() else {
            debug!("Stop requested while idle");
            return false;
        };

        if !run.shared.cancel.is_cancelled() {
            *run.shared.cancelled_at.lock().await = Some(self.clock.now());
            run.shared.cancel.cancel();

            info!("Stop requested for training run {}", run.shared.run_id);
            let _ = self.events.send(TrainingEvent::StopRequested {
                run_id: run.shared.run_id,
            });
        }

        true
    }

    /// Stop and wait for the run's terminal commit. `None` if idle.
    pub async fn stop_and_wait(&self) -> Option<Result<RunReport, TrainingError>> {
        let handle = {
            let active = self.active.lock().await;
            active.as_ref().map(|run| RunHandle {
                run_id: run.shared.run_id,
                outcome: run.outcome.clone(),
            })
        }?;

        self.stop().await;
        Some(handle.wait().await)
    }

    /// Change the repetition count of the active run (from its next
    /// repetition boundary on) and of future runs
    pub async fn set_repetitions(&self, repetitions: u32) -> Result<(), TrainingError> {
        if repetitions == 0 {
            return Err(TrainingError::InvalidOptions(
                "repetitions must be at least 1".to_string(),
            ));
        }

        self.defaults.lock().await.repetitions = repetitions;

        let active = self.active.lock().await;
        if let Some(run) = active.as_ref() {
            // Never cut below the repetition already in progress
            let in_progress = run.shared.current_repetition.load(Ordering::SeqCst) + 1;
            let applied = repetitions.max(in_progress);
            run.shared.params.lock().await.repetitions = applied;

            info!("Run {} repetitions set to {}", run.shared.run_id, applied);
        }

        Ok(())
    }

    /// Change the interval of the active run (from its next wait on) and of future runs
    pub async fn set_interval(&self, interval: Duration) {
        self.defaults.lock().await.interval = interval;

        let active = self.active.lock().await;
        if let Some(run) = active.as_ref() {
            run.shared.params.lock().await.interval = interval;
            info!(
                "Run {} interval set to {}ms",
                run.shared.run_id,
                interval.as_millis()
            );
        }
    }

    pub async fn state(&self) -> SchedulerState {
        let active = self.active.lock().await;
        match active.as_ref() {
            None => SchedulerState::Idle,
            Some(run) if run.shared.cancel.is_cancelled() => SchedulerState::Stopping,
            Some(_) => SchedulerState::Running,
        }
    }

    /// True while a run is active and no stop was requested
    pub async fn is_running(&self) -> bool {
        self.state().await == SchedulerState::Running
    }

    pub async fn status(&self) -> TrainingStatus {
        let active = self.active.lock().await;

        match active.as_ref() {
            Some(run) => {
                let shared = &run.shared;
                let params = shared.params.lock().await;
                let state = if shared.cancel.is_cancelled() {
                    SchedulerState::Stopping
                } else {
                    SchedulerState::Running
                };

                TrainingStatus {
                    state,
                    run_id: Some(shared.run_id),
                    started_at: Some(shared.started_at),
                    repetitions_total: params.repetitions,
                    repetitions_completed: shared.repetitions_completed.load(Ordering::SeqCst),
                    interval_ms: params.interval.as_millis() as u64,
                    random_order: shared.random_order,
                    queue_len: shared.snapshot.len(),
                    current_item: shared.current_item.lock().await.clone(),
                }
            }
            None => {
                let defaults = self.defaults.lock().await;
                TrainingStatus {
                    state: SchedulerState::Idle,
                    run_id: None,
                    started_at: None,
                    repetitions_total: defaults.repetitions,
                    repetitions_completed: 0,
                    interval_ms: defaults.interval.as_millis() as u64,
                    random_order: defaults.random_order,
                    queue_len: 0,
                    current_item: None,
                }
            }
        }
    }

    /// Play one recording outside of a run
    pub async fn play_once(&self, recording_id: &str) -> Result<(), TrainingError> {
        {
            let active = self.active.lock().await;
            if active.is_some() || self.single_play.swap(true, Ordering::SeqCst) {
                return Err(TrainingError::AlreadyRunning);
            }
        }

        // Cleared on drop, so a cancelled caller cannot leave the flag set
        let _single_play = SinglePlayGuard(Arc::clone(&self.single_play));

        let recording = self.recordings.get(recording_id).await?;
        self.player
            .play(&recording.audio, &recording.settings)
            .await?;
        self.recordings
            .mark_played(recording_id, self.clock.now())
            .await?;

        Ok(())
    }
}

struct SinglePlayGuard(Arc<AtomicBool>);

impl Drop for SinglePlayGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Tally {
    plays: usize,
    skipped: usize,
    playback_failures: usize,
}

/// Everything one spawned run owns
struct RunLoop {
    recordings: RecordingStore,
    sessions: SessionLogStore,
    player: Arc<dyn Player>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<TrainingEvent>,
    shared: Arc<RunShared>,
    active: Arc<Mutex<Option<ActiveRun>>>,
}

impl RunLoop {
    async fn run(self, outcome_tx: watch::Sender<Option<RunReport>>) {
        let mut tally = Tally::default();

        self.play_all(&mut tally).await;
        let report = self.finish(tally).await;
        self.release().await;

        self.emit(TrainingEvent::Finished {
            run_id: report.run_id,
            termination: report.termination,
            session: report.session.clone(),
            error: report.commit_error.clone(),
        });

        outcome_tx.send_replace(Some(report));
    }

    async fn play_all(&self, tally: &mut Tally) {
        let shared = &self.shared;
        let run_id = shared.run_id;
        let mut repetition: u32 = 0;

        loop {
            if shared.cancel.is_cancelled() {
                info!("Run {} stopped before repetition {}", run_id, repetition + 1);
                return;
            }

            let total = shared.params.lock().await.repetitions;
            if repetition >= total {
                return;
            }

            shared.current_repetition.store(repetition, Ordering::SeqCst);

            let order = draw_order(&shared.snapshot, shared.random_order);
            info!(
                "Run {} repetition {}/{} ({} phrases)",
                run_id,
                repetition + 1,
                total,
                order.len()
            );
            self.emit(TrainingEvent::RepetitionStarted {
                run_id,
                repetition,
                order: order.clone(),
            });

            for (index, recording_id) in order.iter().enumerate() {
                if shared.cancel.is_cancelled() {
                    info!("Run {} stopped before item {}", run_id, index + 1);
                    return;
                }

                if !self.play_item(repetition, index, recording_id, tally).await {
                    continue;
                }

                let (repetitions, interval) = {
                    let params = shared.params.lock().await;
                    (params.repetitions, params.interval)
                };

                let last = index + 1 == order.len() && repetition + 1 >= repetitions;
                if last || interval.is_zero() {
                    continue;
                }

                if shared.cancel.is_cancelled() {
                    info!("Run {} stopped before interval wait", run_id);
                    return;
                }

                debug!("Run {} waiting {}ms", run_id, interval.as_millis());
                self.emit(TrainingEvent::Waiting {
                    run_id,
                    interval_ms: interval.as_millis() as u64,
                });
                tokio::time::sleep(interval).await;
            }

            repetition += 1;
            shared
                .repetitions_completed
                .store(repetition, Ordering::SeqCst);
        }
    }

    /// Returns false when the item was skipped
    async fn play_item(
        &self,
        repetition: u32,
        index: usize,
        recording_id: &str,
        tally: &mut Tally,
    ) -> bool {
        let run_id = self.shared.run_id;

        let recording = match self.recordings.find(recording_id).await {
            Ok(Some(recording)) => recording,
            Ok(None) => {
                info!("Run {} skipping missing recording {}", run_id, recording_id);
                self.skip(recording_id, tally);
                return false;
            }
            Err(e) => {
                warn!(
                    "Run {} skipping unreadable recording {}: {}",
                    run_id, recording_id, e
                );
                self.skip(recording_id, tally);
                return false;
            }
        };

        *self.shared.current_item.lock().await = Some(recording_id.to_string());
        self.emit(TrainingEvent::ItemStarted {
            run_id,
            repetition,
            index,
            recording_id: recording_id.to_string(),
        });

        match self
            .player
            .play(&recording.audio, &recording.settings)
            .await
        {
            Ok(()) => {
                tally.plays += 1;
                if let Err(e) = self
                    .recordings
                    .mark_played(recording_id, self.clock.now())
                    .await
                {
                    warn!("Failed to update play count of {}: {}", recording_id, e);
                }
            }
            Err(e) => {
                warn!(
                    "Run {} playback of {} failed on {}: {}",
                    run_id,
                    recording_id,
                    self.player.name(),
                    e
                );
                tally.playback_failures += 1;
                self.emit(TrainingEvent::PlaybackFailed {
                    run_id,
                    recording_id: recording_id.to_string(),
                    error: e.to_string(),
                });
            }
        }

        *self.shared.current_item.lock().await = None;
        true
    }

    fn skip(&self, recording_id: &str, tally: &mut Tally) {
        tally.skipped += 1;
        self.emit(TrainingEvent::ItemSkipped {
            run_id: self.shared.run_id,
            recording_id: recording_id.to_string(),
        });
    }

    /// Build and commit the session for this run, exactly once
    async fn finish(&self, tally: Tally) -> RunReport {
        let shared = &self.shared;
        let cancelled_at = *shared.cancelled_at.lock().await;

        let (termination, ended_at) = match cancelled_at {
            Some(at) => (Termination::Stopped, at),
            None => (Termination::Completed, self.clock.now()),
        };

        let duration_millis = (ended_at - shared.started_at).num_milliseconds().max(1) as u64;

        let pending = PendingSession {
            run_id: shared.run_id,
            timestamp: shared.started_at,
            duration_millis,
            recording_ids: shared.snapshot.clone(),
        };

        let (session, commit_error) = if shared.committed.swap(true, Ordering::SeqCst) {
            warn!("Run {} already committed", shared.run_id);
            (None, None)
        } else {
            match self.sessions.commit(&pending).await {
                Ok(session) => (Some(session), None),
                Err(e) => {
                    error!("Failed to record session for run {}: {}", shared.run_id, e);
                    (None, Some(e.to_string()))
                }
            }
        };

        info!(
            "Training run {} {:?} after {}ms: {} played, {} skipped, {} failed",
            shared.run_id,
            termination,
            duration_millis,
            tally.plays,
            tally.skipped,
            tally.playback_failures
        );

        RunReport {
            run_id: shared.run_id,
            termination,
            pending,
            session,
            commit_error,
            repetitions_completed: shared.repetitions_completed.load(Ordering::SeqCst),
            plays: tally.plays,
            skipped: tally.skipped,
            playback_failures: tally.playback_failures,
        }
    }

    async fn release(&self) {
        release_slot(&self.active, self.shared.run_id).await;
    }

    fn emit(&self, event: TrainingEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Empty the active slot if it still holds `run_id`
async fn release_slot(active: &Mutex<Option<ActiveRun>>, run_id: Uuid) {
    let mut active = active.lock().await;
    if active.as_ref().map(|run| run.shared.run_id) == Some(run_id) {
        *active = None;
    }
}

/// The snapshot itself, or a fresh permutation of it
fn draw_order(snapshot: &[String], random_order: bool) -> Vec<String> {
    let mut order = snapshot.to_vec();
    if random_order {
        order.shuffle(&mut rand::thread_rng());
    }
    order
}
