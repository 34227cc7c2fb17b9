// Integration tests for the training scheduler
//
// Time is paused, so playback and interval waits advance instantly while
// keeping exact timestamps. The scripted player logs which payload was
// played and when.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use parrot_talk::training::Clock;
use parrot_talk::{
    Backend, MemoryBackend, NewRecording, PlaybackError, PlaybackSettings, Player,
    RecordingStore, SchedulerState, SessionLogStore, StoreError, Termination, TrainingError,
    TrainingEvent, TrainingOptions, TrainingScheduler,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

const CLIP: Duration = Duration::from_millis(500);

/// Plays for a fixed time and logs payloads; payloads listed in `fail_on`
/// report an error instead, those in `panic_on` panic mid-playback
struct ScriptedPlayer {
    plays: Mutex<Vec<(String, Instant)>>,
    fail_on: Vec<String>,
    panic_on: Vec<String>,
}

impl ScriptedPlayer {
    fn new() -> Self {
        Self::failing_on(&[])
    }

    fn failing_on(names: &[&str]) -> Self {
        Self {
            plays: Mutex::new(Vec::new()),
            fail_on: names.iter().map(|n| n.to_string()).collect(),
            panic_on: Vec::new(),
        }
    }

    fn panicking_on(names: &[&str]) -> Self {
        Self {
            panic_on: names.iter().map(|n| n.to_string()).collect(),
            ..Self::new()
        }
    }

    fn played(&self) -> Vec<String> {
        self.plays
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn starts(&self) -> Vec<Instant> {
        self.plays.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait::async_trait]
impl Player for ScriptedPlayer {
    async fn play(&self, audio: &[u8], _settings: &PlaybackSettings) -> Result<(), PlaybackError> {
        let name = String::from_utf8_lossy(audio).to_string();
        self.plays.lock().unwrap().push((name.clone(), Instant::now()));

        tokio::time::sleep(CLIP).await;

        if self.panic_on.contains(&name) {
            panic!("output device vanished while playing {}", name);
        }
        if self.fail_on.contains(&name) {
            return Err(PlaybackError::Device(format!("cannot play {}", name)));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Wall clock driven by tokio's paused time
struct PausedClock {
    base: DateTime<Utc>,
    origin: Instant,
}

impl PausedClock {
    fn new() -> Self {
        Self {
            base: Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap(),
            origin: Instant::now(),
        }
    }
}

impl Clock for PausedClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + chrono::Duration::from_std(self.origin.elapsed()).unwrap()
    }
}

/// Memory backend whose session writes can be switched off
struct FlakyBackend {
    inner: MemoryBackend,
    fail_sessions: AtomicBool,
}

impl FlakyBackend {
    fn check(&self, collection: &str) -> Result<(), StoreError> {
        if collection == "sessions" && self.fail_sessions.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Backend for FlakyBackend {
    async fn insert(&self, collection: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.check(collection)?;
        self.inner.insert(collection, key, value).await
    }

    async fn replace(&self, collection: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.check(collection)?;
        self.inner.replace(collection, key, value).await
    }

    async fn put(&self, collection: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.check(collection)?;
        self.inner.put(collection, key, value).await
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.get(collection, key).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        self.inner.list(collection).await
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        self.inner.delete(collection, key).await
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

struct Fixture {
    recordings: RecordingStore,
    sessions: SessionLogStore,
    player: Arc<ScriptedPlayer>,
    scheduler: Arc<TrainingScheduler>,
}

impl Fixture {
    fn new() -> Self {
        Self::with(Arc::new(MemoryBackend::new()), ScriptedPlayer::new())
    }

    fn with(backend: Arc<dyn Backend>, player: ScriptedPlayer) -> Self {
        let recordings = RecordingStore::new(backend.clone());
        let sessions = SessionLogStore::new(backend);
        let player = Arc::new(player);
        let scheduler = TrainingScheduler::new(recordings.clone(), sessions.clone(), player.clone())
            .with_clock(Arc::new(PausedClock::new()));

        Self {
            recordings,
            sessions,
            player,
            scheduler: Arc::new(scheduler),
        }
    }

    /// Save one recording per name; the payload is the name itself
    async fn save(&self, names: &[&str]) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for name in names {
            ids.push(
                self.recordings
                    .save(NewRecording::new(*name, name.as_bytes().to_vec()))
                    .await?,
            );
        }
        Ok(ids)
    }
}

fn options(repetitions: u32, interval_ms: u64, random_order: bool) -> TrainingOptions {
    TrainingOptions::new(repetitions, Duration::from_millis(interval_ms), random_order)
}

fn assert_near(actual: Duration, expected: Duration) {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        diff <= Duration::from_millis(5),
        "expected ~{:?}, got {:?}",
        expected,
        actual
    );
}

#[tokio::test(start_paused = true)]
async fn test_plays_queue_in_order_with_intervals() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A", "B", "C"]).await?;

    let started = Instant::now();
    let handle = fx.scheduler.start(ids.clone(), options(2, 1000, false)).await?;
    let report = handle.wait().await?;
    let elapsed = started.elapsed();

    assert_eq!(fx.player.played(), vec!["A", "B", "C", "A", "B", "C"]);

    // Each start is one clip plus one interval after the previous
    let starts = fx.player.starts();
    for pair in starts.windows(2) {
        assert_near(pair[1] - pair[0], CLIP + Duration::from_millis(1000));
    }

    // No interval after the final item
    assert_near(elapsed, CLIP * 6 + Duration::from_millis(1000) * 5);

    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(report.plays, 6);
    assert_eq!(report.repetitions_completed, 2);

    let session = report.session.expect("session committed");
    assert_eq!(session.recording_ids, ids);
    assert!((7995..=8005).contains(&session.duration_millis));

    assert_eq!(fx.sessions.all_sessions().await?, vec![session]);
    assert_eq!(fx.scheduler.state().await, SchedulerState::Idle);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_plays_back_to_back() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A", "B"]).await?;

    fx.scheduler
        .start(ids, options(1, 0, false))
        .await?
        .wait()
        .await?;

    let starts = fx.player.starts();
    assert_near(starts[1] - starts[0], CLIP);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_empty_queue_is_rejected() -> Result<()> {
    let fx = Fixture::new();

    let err = fx
        .scheduler
        .start(Vec::new(), options(1, 1000, false))
        .await
        .err()
        .expect("empty queue must be rejected");

    assert!(matches!(err, TrainingError::EmptyQueue));
    assert_eq!(fx.scheduler.state().await, SchedulerState::Idle);
    assert!(fx.sessions.all_sessions().await?.is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_zero_repetitions_is_rejected() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A"]).await?;

    let err = fx
        .scheduler
        .start(ids, options(0, 1000, false))
        .await
        .err()
        .expect("zero repetitions must be rejected");

    assert!(matches!(err, TrainingError::InvalidOptions(_)));
    assert!(!fx.scheduler.is_running().await);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_rejected_while_running() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A", "B"]).await?;

    let first = fx.scheduler.start(ids.clone(), options(1, 1000, false)).await?;

    let err = fx
        .scheduler
        .start(ids.clone(), options(3, 0, true))
        .await
        .err()
        .expect("second start must be rejected");
    assert!(matches!(err, TrainingError::AlreadyRunning));

    // The first run is unaffected
    let report = first.wait().await?;
    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(fx.player.played(), vec!["A", "B"]);
    assert_eq!(fx.sessions.all_sessions().await?.len(), 1);

    // Idle again, so a new run may start
    fx.scheduler.start(ids, options(1, 0, false)).await?.wait().await?;
    assert_eq!(fx.sessions.all_sessions().await?.len(), 2);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_random_order_draws_a_permutation_per_repetition() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A", "B", "C", "D"]).await?;
    let mut events = fx.scheduler.subscribe();

    let report = fx
        .scheduler
        .start(ids.clone(), options(3, 0, true))
        .await?
        .wait()
        .await?;

    let mut sorted_ids = ids.clone();
    sorted_ids.sort();

    let mut orders = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let TrainingEvent::RepetitionStarted { order, .. } = event {
            orders.push(order);
        }
    }

    assert_eq!(orders.len(), 3);
    for order in &orders {
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, sorted_ids);
    }

    let played = fx.player.played();
    assert_eq!(played.len(), 12);
    for chunk in played.chunks(4) {
        let mut chunk = chunk.to_vec();
        chunk.sort();
        assert_eq!(chunk, vec!["A", "B", "C", "D"]);
    }

    // The log keeps the snapshot order, not a shuffled one
    assert_eq!(report.session.expect("session").recording_ids, ids);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_commits_one_session_with_elapsed_duration() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A", "B", "C"]).await?;

    let handle = fx.scheduler.start(ids.clone(), options(5, 1000, false)).await?;

    // A plays 0-500ms, waits until 1500ms; B plays 1500-2000ms
    tokio::time::sleep(Duration::from_millis(1700)).await;
    assert_eq!(fx.scheduler.state().await, SchedulerState::Running);

    assert!(fx.scheduler.stop().await);
    assert_eq!(fx.scheduler.state().await, SchedulerState::Stopping);

    let report = handle.wait().await?;

    assert_eq!(report.termination, Termination::Stopped);
    // The in-flight playback of B ran to its end, nothing after it
    assert_eq!(fx.player.played(), vec!["A", "B"]);

    let sessions = fx.sessions.all_sessions().await?;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].recording_ids, ids);
    assert!(
        (1695..=1705).contains(&sessions[0].duration_millis),
        "duration {}",
        sessions[0].duration_millis
    );

    // Stopping again is a harmless no-op
    assert!(!fx.scheduler.stop().await);
    assert_eq!(fx.scheduler.state().await, SchedulerState::Idle);
    assert_eq!(fx.sessions.all_sessions().await?.len(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_final_item_commits_once() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A", "B"]).await?;

    let handle = fx.scheduler.start(ids.clone(), options(1, 1000, false)).await?;

    // A plays 0-500ms, waits until 1500ms; B, the last item, plays 1500-2000ms.
    // The stop lands while the run is about to complete on its own.
    tokio::time::sleep(Duration::from_millis(1800)).await;
    assert!(fx.scheduler.stop().await);

    let report = handle.wait().await?;

    assert_eq!(report.termination, Termination::Stopped);
    assert_eq!(fx.player.played(), vec!["A", "B"]);
    assert!(report.session.is_some());

    let sessions = fx.sessions.all_sessions().await?;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].recording_ids, ids);
    assert!(
        (1795..=1805).contains(&sessions[0].duration_millis),
        "duration {}",
        sessions[0].duration_millis
    );
    assert_eq!(fx.sessions.all_practice_records().await?.len(), 2);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_immediate_stop_still_records_nonzero_duration() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A"]).await?;

    let handle = fx.scheduler.start(ids, options(3, 1000, false)).await?;
    fx.scheduler.stop().await;
    let report = handle.wait().await?;

    let session = report.session.expect("session");
    assert!(session.duration_millis >= 1);
    assert_eq!(fx.sessions.all_sessions().await?.len(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_and_wait_returns_report() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A", "B"]).await?;

    assert!(fx.scheduler.stop_and_wait().await.is_none());

    fx.scheduler.start(ids, options(10, 1000, false)).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let report = fx
        .scheduler
        .stop_and_wait()
        .await
        .expect("run was active")?;

    assert_eq!(report.termination, Termination::Stopped);
    assert_eq!(report.plays, 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_deleted_recording_is_skipped() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A", "B", "C"]).await?;

    fx.recordings.delete(&ids[1]).await?;

    let started = Instant::now();
    let report = fx
        .scheduler
        .start(ids.clone(), options(1, 1000, false))
        .await?
        .wait()
        .await?;

    assert_eq!(fx.player.played(), vec!["A", "C"]);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.plays, 2);

    // A skipped item adds no interval of its own
    assert_near(started.elapsed(), CLIP * 2 + Duration::from_millis(1000));

    // The snapshot, including the deleted id, is what gets logged
    assert_eq!(report.session.expect("session").recording_ids, ids);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_playback_failure_does_not_abort_run() -> Result<()> {
    let fx = Fixture::with(
        Arc::new(MemoryBackend::new()),
        ScriptedPlayer::failing_on(&["B"]),
    );
    let ids = fx.save(&["A", "B", "C"]).await?;
    let mut events = fx.scheduler.subscribe();

    let report = fx
        .scheduler
        .start(ids.clone(), options(1, 200, false))
        .await?
        .wait()
        .await?;

    assert_eq!(fx.player.played(), vec!["A", "B", "C"]);
    assert_eq!(report.plays, 2);
    assert_eq!(report.playback_failures, 1);
    assert_eq!(report.termination, Termination::Completed);
    assert!(report.session.is_some());

    let mut failed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let TrainingEvent::PlaybackFailed { recording_id, .. } = event {
            failed.push(recording_id);
        }
    }
    assert_eq!(failed, vec![ids[1].clone()]);

    // Only successful plays count
    assert_eq!(fx.recordings.get(&ids[0]).await?.play_count, 1);
    assert_eq!(fx.recordings.get(&ids[1]).await?.play_count, 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_store_write_failure_is_surfaced_and_retryable() -> Result<()> {
    let backend = Arc::new(FlakyBackend {
        inner: MemoryBackend::new(),
        fail_sessions: AtomicBool::new(false),
    });
    let fx = Fixture::with(backend.clone(), ScriptedPlayer::new());
    let ids = fx.save(&["A", "B"]).await?;

    backend.fail_sessions.store(true, Ordering::SeqCst);

    let err = fx
        .scheduler
        .start(ids.clone(), options(1, 0, false))
        .await?
        .wait()
        .await
        .err()
        .expect("commit must fail");

    let pending = match err {
        TrainingError::StoreWriteFailure { session, .. } => session,
        other => panic!("unexpected error: {:?}", other),
    };

    // The run is over regardless
    assert_eq!(fx.scheduler.state().await, SchedulerState::Idle);
    assert!(fx.sessions.all_sessions().await?.is_empty());

    backend.fail_sessions.store(false, Ordering::SeqCst);

    let session = fx.sessions.commit(&pending).await?;
    assert_eq!(session.recording_ids, ids);
    assert_eq!(session.id, format!("session-{}", pending.run_id));

    // Retrying the same run again does not duplicate it
    fx.sessions.commit(&pending).await?;
    assert_eq!(fx.sessions.all_sessions().await?.len(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_set_repetitions_applies_at_next_boundary() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A", "B"]).await?;

    let handle = fx.scheduler.start(ids, options(1, 1000, false)).await?;

    // A is playing; extend the run before the first repetition ends
    tokio::time::sleep(Duration::from_millis(100)).await;
    fx.scheduler.set_repetitions(2).await?;
    assert_eq!(fx.scheduler.status().await.repetitions_total, 2);

    let report = handle.wait().await?;
    assert_eq!(report.repetitions_completed, 2);
    assert_eq!(fx.player.played(), vec!["A", "B", "A", "B"]);

    assert!(matches!(
        fx.scheduler.set_repetitions(0).await,
        Err(TrainingError::InvalidOptions(_))
    ));
    assert_eq!(fx.scheduler.defaults().await.repetitions, 2);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_set_repetitions_never_cuts_current_repetition() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A", "B"]).await?;

    let handle = fx.scheduler.start(ids, options(3, 0, false)).await?;

    // Second repetition in progress
    tokio::time::sleep(Duration::from_millis(1200)).await;
    fx.scheduler.set_repetitions(1).await?;

    let report = handle.wait().await?;
    assert_eq!(report.repetitions_completed, 2);
    assert_eq!(fx.player.played().len(), 4);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_set_interval_takes_effect_on_next_wait() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A", "B", "C"]).await?;

    let handle = fx.scheduler.start(ids, options(1, 1000, false)).await?;

    // During A's playback
    tokio::time::sleep(Duration::from_millis(100)).await;
    fx.scheduler.set_interval(Duration::from_millis(200)).await;
    handle.wait().await?;

    let starts = fx.player.starts();
    assert_near(starts[1] - starts[0], CLIP + Duration::from_millis(200));
    assert_near(starts[2] - starts[1], CLIP + Duration::from_millis(200));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_status_reports_progress() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A", "B"]).await?;

    let idle = fx.scheduler.status().await;
    assert_eq!(idle.state, SchedulerState::Idle);
    assert!(idle.run_id.is_none());

    let handle = fx.scheduler.start(ids.clone(), options(2, 1000, false)).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let status = fx.scheduler.status().await;
    assert_eq!(status.state, SchedulerState::Running);
    assert_eq!(status.run_id, Some(handle.run_id()));
    assert_eq!(status.queue_len, 2);
    assert_eq!(status.repetitions_total, 2);
    assert_eq!(status.repetitions_completed, 0);
    assert_eq!(status.current_item.as_deref(), Some(ids[0].as_str()));

    fx.scheduler.stop().await;
    handle.wait().await?;

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_play_once_is_exclusive_with_runs() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A", "B"]).await?;

    fx.scheduler.play_once(&ids[0]).await?;
    assert_eq!(fx.player.played(), vec!["A"]);
    assert_eq!(fx.recordings.get(&ids[0]).await?.play_count, 1);

    assert!(matches!(
        fx.scheduler.play_once("recording-missing").await,
        Err(TrainingError::Store(StoreError::NotFound { .. }))
    ));

    let handle = fx.scheduler.start(ids.clone(), options(1, 0, false)).await?;
    assert!(matches!(
        fx.scheduler.play_once(&ids[1]).await,
        Err(TrainingError::AlreadyRunning)
    ));
    handle.wait().await?;

    // No session is logged for a single play
    assert_eq!(fx.sessions.all_sessions().await?.len(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_events_bracket_the_run() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A"]).await?;
    let mut events = fx.scheduler.subscribe();

    let handle = fx.scheduler.start(ids, options(1, 0, false)).await?;
    let run_id = handle.run_id();
    handle.wait().await?;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.run_id(), run_id);
        seen.push(event);
    }

    assert!(matches!(seen.first(), Some(TrainingEvent::Started { queue_len: 1, .. })));
    match seen.last() {
        Some(TrainingEvent::Finished {
            termination,
            session,
            error,
            ..
        }) => {
            assert_eq!(*termination, Termination::Completed);
            assert!(session.is_some());
            assert!(error.is_none());
        }
        other => panic!("unexpected last event: {:?}", other),
    }

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_play_once_frees_the_player() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.save(&["A"]).await?;

    // The caller goes away halfway through the clip
    let abandoned =
        tokio::time::timeout(Duration::from_millis(100), fx.scheduler.play_once(&ids[0])).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_secs(10)).await;

    let report = fx
        .scheduler
        .start(ids.clone(), options(1, 0, false))
        .await?
        .wait()
        .await?;
    assert_eq!(report.plays, 1);

    fx.scheduler.play_once(&ids[0]).await?;
    assert_eq!(fx.player.played(), vec!["A", "A", "A"]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_panicking_player_releases_the_scheduler() -> Result<()> {
    let fx = Fixture::with(
        Arc::new(MemoryBackend::new()),
        ScriptedPlayer::panicking_on(&["A"]),
    );
    let ids = fx.save(&["A", "B"]).await?;

    let err = fx
        .scheduler
        .start(vec![ids[0].clone()], options(1, 0, false))
        .await?
        .wait()
        .await
        .err()
        .expect("panicked run has no report");
    assert!(matches!(err, TrainingError::RunAborted));

    // The slot is freed by the supervising task; give it a turn
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fx.scheduler.state().await, SchedulerState::Idle);

    let report = fx
        .scheduler
        .start(vec![ids[1].clone()], options(1, 0, false))
        .await?
        .wait()
        .await?;
    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(fx.sessions.all_sessions().await?.len(), 1);

    Ok(())
}
