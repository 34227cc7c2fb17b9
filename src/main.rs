use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parrot_talk::{
    create_router, AppState, Backend, Config, FileBackend, NewRecording, QueueStore,
    RecordingStore, SessionLogStore, StatisticsAggregator, TimedPlayer, TrainingError,
    TrainingEvent, TrainingOptions, TrainingScheduler,
};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "parrot-talk")]
#[command(about = "Record short phrases and train on them in timed sessions")]
struct Args {
    /// Config file path (extension optional)
    #[arg(short, long, default_value = "config/parrot-talk")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,

    /// Save a WAV file as a phrase
    Import {
        /// Phrase name
        name: String,

        /// WAV file to import
        path: PathBuf,

        /// Category (default: Phrases)
        #[arg(long)]
        category: Option<String>,

        /// Also append the phrase to the training queue
        #[arg(long)]
        queue: bool,
    },

    /// Play the saved training queue; Ctrl-C stops after the current phrase
    Train {
        #[arg(short, long)]
        repetitions: Option<u32>,

        /// Pause between phrases in milliseconds
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Shuffle the queue for every repetition
        #[arg(short, long)]
        shuffle: bool,
    },

    /// Print practice statistics
    Stats {
        /// Number of recent sessions to list
        #[arg(short, long, default_value = "5")]
        recent: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let cfg = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("{:#}; using built-in defaults", e);
            Config::default()
        }
    };

    let data_dir = cfg.storage.data_path();
    let backend: Arc<dyn Backend> = Arc::new(
        FileBackend::open(&data_dir)
            .await
            .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?,
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&cfg, backend).await,
        Command::Import {
            name,
            path,
            category,
            queue,
        } => import(&cfg, backend, name, path, category, queue).await,
        Command::Train {
            repetitions,
            interval_ms,
            shuffle,
        } => train(&cfg, backend, repetitions, interval_ms, shuffle).await,
        Command::Stats { recent } => stats(backend, recent).await,
    }
}

async fn serve(cfg: &Config, backend: Arc<dyn Backend>) -> Result<()> {
    let player = Arc::new(TimedPlayer::new(cfg.playback.fallback_clip()));
    let state = AppState::open(backend, player, cfg)
        .await
        .context("Failed to load stores")?;
    let scheduler = Arc::clone(&state.scheduler);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("{} listening on {}", cfg.service.name, addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    // Let an active run land its session before exiting
    if let Some(Err(e)) = scheduler.stop_and_wait().await {
        warn!("Final training run was not recorded: {}", e);
    }

    Ok(())
}

async fn import(
    cfg: &Config,
    backend: Arc<dyn Backend>,
    name: String,
    path: PathBuf,
    category: Option<String>,
    queue: bool,
) -> Result<()> {
    let audio = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let recordings = RecordingStore::new(Arc::clone(&backend));

    let mut new = NewRecording::new(name, audio).with_settings(cfg.playback.settings());
    if let Some(category) = category {
        recordings.add_category(&category).await?;
        new = new.with_category(category);
    }

    let id = recordings.save(new).await?;
    println!("Saved {}", id);

    if queue {
        let queue_store = QueueStore::new(backend);
        let mut training_queue = queue_store.load().await?;
        training_queue.append(id);
        queue_store.save(&training_queue).await?;
        println!("Queue now holds {} phrases", training_queue.len());
    }

    Ok(())
}

async fn train(
    cfg: &Config,
    backend: Arc<dyn Backend>,
    repetitions: Option<u32>,
    interval_ms: Option<u64>,
    shuffle: bool,
) -> Result<()> {
    let recordings = RecordingStore::new(Arc::clone(&backend));
    let sessions = SessionLogStore::new(Arc::clone(&backend));
    let queue = QueueStore::new(backend).load().await?;

    let defaults = cfg.training.options();
    let options = TrainingOptions::new(
        repetitions.unwrap_or(defaults.repetitions),
        interval_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.interval),
        shuffle || defaults.random_order,
    );

    let player = Arc::new(TimedPlayer::new(cfg.playback.fallback_clip()));
    let scheduler = Arc::new(TrainingScheduler::new(
        recordings,
        sessions.clone(),
        player,
    ));

    let mut events = scheduler.subscribe();
    let handle = scheduler.start(queue.snapshot(), options).await?;

    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(TrainingEvent::RepetitionStarted { repetition, .. }) => {
                    println!("Repetition {}", repetition + 1)
                }
                Ok(TrainingEvent::ItemStarted { recording_id, .. }) => {
                    println!("  > {}", recording_id)
                }
                Ok(TrainingEvent::ItemSkipped { recording_id, .. }) => {
                    println!("  - {} (missing)", recording_id)
                }
                Ok(TrainingEvent::Finished { .. }) => break,
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let stopper = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("Stopping after the current phrase...");
                scheduler.stop().await;
            }
        })
    };

    let outcome = handle.wait().await;
    stopper.abort();
    let _ = printer.await;

    let report = match outcome {
        Ok(report) => report,
        Err(TrainingError::StoreWriteFailure { session, reason }) => {
            warn!("Session not recorded ({}), retrying once", reason);
            let session = sessions
                .commit(&session)
                .await
                .context("Failed to record session")?;
            println!("Recorded {}", session.id);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "{:?}: {} played, {} skipped, {} failed, {:.1}s",
        report.termination,
        report.plays,
        report.skipped,
        report.playback_failures,
        report.pending.duration_millis as f64 / 1000.0
    );

    Ok(())
}

async fn stats(backend: Arc<dyn Backend>, recent: usize) -> Result<()> {
    let aggregator = StatisticsAggregator::new(
        RecordingStore::new(Arc::clone(&backend)),
        SessionLogStore::new(backend),
    );

    let stats = aggregator.compute().await?.with_recent_limit(recent);

    println!("Phrases:               {}", stats.total_phrases);
    println!("Sessions:              {}", stats.total_sessions);
    println!("Total time:            {:.1} min", stats.total_time_minutes);
    println!(
        "Average session:       {:.1} min",
        stats.average_session_length_minutes
    );
    println!(
        "Average phrases/session: {:.1}",
        stats.average_phrases_per_session
    );
    println!("Last practice:         {}", stats.last_practice_date);

    if !stats.recent_activity.is_empty() {
        println!();
        println!("Recent activity:");
        for entry in &stats.recent_activity {
            println!("  {}", entry.description);
        }
    }

    Ok(())
}
