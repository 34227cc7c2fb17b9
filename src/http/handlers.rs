use super::state::AppState;
use crate::audio::{AudioFrame, ClipInfo, Recorder, WavRecorder};
use crate::error::{CaptureError, QueueError, StoreError, TrainingError};
use crate::models::{NewRecording, PlaybackSettings, PracticeSession, RecordingSummary};
use crate::stats::Statistics;
use crate::training::{RunReport, TrainingOptions, TrainingQueue, TrainingStatus};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by every handler, rendered as `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed: {}", self.message);
        }

        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match &e {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::Conflict { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<TrainingError> for ApiError {
    fn from(e: TrainingError) -> Self {
        match e {
            TrainingError::Store(e) => e.into(),
            TrainingError::EmptyQueue | TrainingError::InvalidOptions(_) => {
                Self::bad_request(e.to_string())
            }
            TrainingError::AlreadyRunning => Self::new(StatusCode::CONFLICT, e.to_string()),
            _ => Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl From<CaptureError> for ApiError {
    fn from(e: CaptureError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListRecordingsQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecordingRequest {
    pub name: String,
    pub category: Option<String>,
    /// Base64-encoded audio payload
    pub audio: String,
    pub settings: Option<PlaybackSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PcmUploadQuery {
    pub name: String,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecordingRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub settings: Option<PlaybackSettings>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRecordingsRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteRecordingsResponse {
    pub removed: usize,
}

#[derive(Debug, Deserialize)]
pub struct AddCategoryRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct AddCategoryResponse {
    pub added: bool,
    pub categories: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct QueueItem {
    pub index: usize,
    pub recording_id: String,
    /// `None` when the recording no longer exists
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub items: Vec<QueueItem>,
}

#[derive(Debug, Deserialize)]
pub struct AppendRequest {
    pub recording_id: String,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovePosition {
    Before,
    After,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub from: usize,
    pub to: usize,
    pub position: MovePosition,
}

#[derive(Debug, Serialize)]
pub struct PruneResponse {
    pub removed: usize,
    pub queue: QueueResponse,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartTrainingRequest {
    pub repetitions: Option<u32>,
    pub interval_ms: Option<u64>,
    pub random_order: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct StartTrainingResponse {
    pub run_id: Uuid,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopTrainingResponse {
    pub stopping: bool,
    pub status: TrainingStatus,
}

#[derive(Debug, Serialize)]
pub struct TrainingStatusResponse {
    pub status: TrainingStatus,
    pub last_run: Option<RunReport>,
}

#[derive(Debug, Deserialize)]
pub struct TrainingParamsRequest {
    pub repetitions: Option<u32>,
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Keep only this many recent activity entries
    pub recent: Option<usize>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /recordings
pub async fn list_recordings(
    State(state): State<AppState>,
    Query(query): Query<ListRecordingsQuery>,
) -> ApiResult<Json<Vec<RecordingSummary>>> {
    let recordings = match query.category {
        Some(category) => state.recordings.list_by_category(&category).await?,
        None => state.recordings.list().await?,
    };

    Ok(Json(recordings.iter().map(RecordingSummary::from).collect()))
}

/// POST /recordings
/// Save a phrase from a base64 payload
pub async fn create_recording(
    State(state): State<AppState>,
    Json(req): Json<CreateRecordingRequest>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let audio = base64::engine::general_purpose::STANDARD
        .decode(req.audio.as_bytes())
        .map_err(|e| ApiError::bad_request(format!("Invalid audio payload: {}", e)))?;

    let id = save_phrase(&state, &req.name, req.category, req.settings, audio).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// POST /recordings/pcm?name=...
/// Save a phrase from raw 16-bit little-endian PCM in the configured capture format
pub async fn upload_pcm(
    State(state): State<AppState>,
    Query(query): Query<PcmUploadQuery>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    if body.len() % 2 != 0 {
        return Err(ApiError::bad_request("PCM body must hold 16-bit samples"));
    }

    let samples: Vec<i16> = body
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let mut recorder = WavRecorder::new(state.capture.clone());
    recorder.start_capture().await?;

    if let Some(frame_tx) = recorder.frame_sender() {
        let frame = AudioFrame {
            samples,
            sample_rate: state.capture.sample_rate,
            channels: state.capture.channels,
            timestamp_ms: 0,
        };
        if let Err(e) = frame_tx.send(frame).await {
            warn!("Capture closed before upload was delivered: {}", e);
        }
    }

    let audio = recorder.stop_capture().await?;

    let id = save_phrase(&state, &query.name, query.category, None, audio).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn save_phrase(
    state: &AppState,
    name: &str,
    category: Option<String>,
    settings: Option<PlaybackSettings>,
    audio: Vec<u8>,
) -> ApiResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Please enter a phrase name"));
    }
    if audio.is_empty() {
        return Err(ApiError::bad_request("Audio payload is empty"));
    }

    let mut new = NewRecording::new(name, audio)
        .with_settings(settings.unwrap_or(state.default_settings));
    if let Some(category) = category {
        state.recordings.add_category(&category).await?;
        new = new.with_category(category);
    }

    Ok(state.recordings.save(new).await?)
}

/// GET /recordings/:id
pub async fn get_recording(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RecordingSummary>> {
    let recording = state.recordings.get(&id).await?;
    Ok(Json(RecordingSummary::from(&recording)))
}

/// GET /recordings/:id/audio
pub async fn get_recording_audio(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let recording = state.recordings.get(&id).await?;

    let content_type = if ClipInfo::probe(&recording.audio).is_some() {
        "audio/wav"
    } else {
        "application/octet-stream"
    };

    Ok(([(header::CONTENT_TYPE, content_type)], recording.audio).into_response())
}

/// PATCH /recordings/:id
/// Rename, recategorise or change playback settings
pub async fn update_recording(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRecordingRequest>,
) -> ApiResult<Json<RecordingSummary>> {
    let mut recording = state.recordings.get(&id).await?;

    if let Some(name) = req.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::bad_request("Please enter a phrase name"));
        }
        recording = state.recordings.rename(&id, name).await?;
    }

    if let Some(category) = req.category {
        state.recordings.add_category(&category).await?;
        recording = state.recordings.update_category(&id, &category).await?;
    }

    if let Some(settings) = req.settings {
        recording = state.recordings.update_settings(&id, settings).await?;
    }

    Ok(Json(RecordingSummary::from(&recording)))
}

/// DELETE /recordings/:id
pub async fn delete_recording(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.recordings.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /recordings/delete
/// Batch delete; unknown ids are ignored
pub async fn delete_recordings(
    State(state): State<AppState>,
    Json(req): Json<DeleteRecordingsRequest>,
) -> ApiResult<Json<DeleteRecordingsResponse>> {
    let removed = state.recordings.delete_many(&req.ids).await?;
    Ok(Json(DeleteRecordingsResponse { removed }))
}

/// POST /recordings/:id/play
/// Play one phrase outside of a training run
pub async fn play_recording(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RecordingSummary>> {
    state.scheduler.play_once(&id).await?;
    let recording = state.recordings.get(&id).await?;
    Ok(Json(RecordingSummary::from(&recording)))
}

/// GET /categories
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.recordings.categories().await?))
}

/// POST /categories
pub async fn add_category(
    State(state): State<AppState>,
    Json(req): Json<AddCategoryRequest>,
) -> ApiResult<Json<AddCategoryResponse>> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Category name is empty"));
    }

    let added = state.recordings.add_category(name).await?;
    let categories = state.recordings.categories().await?;
    Ok(Json(AddCategoryResponse { added, categories }))
}

/// GET /queue
pub async fn get_queue(State(state): State<AppState>) -> ApiResult<Json<QueueResponse>> {
    let queue = state.queue.lock().await.clone();
    Ok(Json(describe_queue(&state, &queue).await?))
}

/// POST /queue
pub async fn append_to_queue(
    State(state): State<AppState>,
    Json(req): Json<AppendRequest>,
) -> ApiResult<Json<QueueResponse>> {
    let unique = req.unique;
    let recording_id = req.recording_id;

    let queue = edit_queue(&state, move |queue| {
        if unique {
            queue.append_unique(recording_id);
        } else {
            queue.append(recording_id);
        }
        Ok(())
    })
    .await?
    .1;

    Ok(Json(describe_queue(&state, &queue).await?))
}

/// DELETE /queue/:index
pub async fn remove_queue_item(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> ApiResult<Json<QueueResponse>> {
    let (removed, queue) = edit_queue(&state, move |queue| queue.remove_at(index)).await?;
    info!("Removed {} from training queue", removed);
    Ok(Json(describe_queue(&state, &queue).await?))
}

/// POST /queue/move
pub async fn move_queue_item(
    State(state): State<AppState>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<Json<QueueResponse>> {
    let queue = edit_queue(&state, move |queue| match req.position {
        MovePosition::Before => queue.move_before(req.from, req.to),
        MovePosition::After => queue.move_after(req.from, req.to),
    })
    .await?
    .1;

    Ok(Json(describe_queue(&state, &queue).await?))
}

/// DELETE /queue
pub async fn clear_queue(State(state): State<AppState>) -> ApiResult<Json<QueueResponse>> {
    let queue = edit_queue(&state, |queue| {
        queue.clear();
        Ok(())
    })
    .await?
    .1;

    Ok(Json(describe_queue(&state, &queue).await?))
}

/// POST /queue/prune
/// Drop queue entries whose recording no longer exists
pub async fn prune_queue(State(state): State<AppState>) -> ApiResult<Json<PruneResponse>> {
    let existing = state.recordings.ids().await?;
    let (removed, queue) = edit_queue(&state, move |queue| Ok(queue.prune(&existing))).await?;

    Ok(Json(PruneResponse {
        removed,
        queue: describe_queue(&state, &queue).await?,
    }))
}

/// Apply an edit to a copy of the queue, persist it, then publish it
async fn edit_queue<T, F>(state: &AppState, edit: F) -> ApiResult<(T, TrainingQueue)>
where
    F: FnOnce(&mut TrainingQueue) -> Result<T, QueueError> + Send,
{
    let mut queue = state.queue.lock().await;

    let mut edited = queue.clone();
    let value = edit(&mut edited)?;

    state.queue_store.save(&edited).await?;
    *queue = edited.clone();

    Ok((value, edited))
}

async fn describe_queue(state: &AppState, queue: &TrainingQueue) -> ApiResult<QueueResponse> {
    let names: HashMap<String, String> = state
        .recordings
        .list()
        .await?
        .into_iter()
        .map(|recording| (recording.id, recording.name))
        .collect();

    let items = queue
        .ids()
        .iter()
        .enumerate()
        .map(|(index, id)| QueueItem {
            index,
            recording_id: id.clone(),
            name: names.get(id).cloned(),
        })
        .collect();

    Ok(QueueResponse { items })
}

/// POST /training/start
/// Start a run over the current queue; omitted fields fall back to the defaults
pub async fn start_training(
    State(state): State<AppState>,
    Json(req): Json<StartTrainingRequest>,
) -> ApiResult<Json<StartTrainingResponse>> {
    let snapshot = state.queue.lock().await.snapshot();
    let defaults = state.scheduler.defaults().await;

    let options = TrainingOptions::new(
        req.repetitions.unwrap_or(defaults.repetitions),
        req.interval_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.interval),
        req.random_order.unwrap_or(defaults.random_order),
    );

    let handle = state.scheduler.start(snapshot, options).await?;
    let run_id = handle.run_id();

    // Keep the outcome so status can report it and a failed commit can be retried
    let last_run = Arc::clone(&state.last_run);
    tokio::spawn(async move {
        match handle.report().await {
            Ok(report) => {
                if let Some(e) = &report.commit_error {
                    error!("Training run {} was not recorded: {}", run_id, e);
                }
                *last_run.write().await = Some(report);
            }
            Err(e) => error!("Training run {} ended abnormally: {}", run_id, e),
        }
    });

    Ok(Json(StartTrainingResponse {
        run_id,
        status: "running".to_string(),
        message: format!("Training run {} started", run_id),
    }))
}

/// POST /training/stop
/// Request a stop; the run commits its session at its next checkpoint
pub async fn stop_training(State(state): State<AppState>) -> Json<StopTrainingResponse> {
    let stopping = state.scheduler.stop().await;
    let status = state.scheduler.status().await;
    Json(StopTrainingResponse { stopping, status })
}

/// GET /training/status
pub async fn training_status(State(state): State<AppState>) -> Json<TrainingStatusResponse> {
    let status = state.scheduler.status().await;
    let last_run = state.last_run.read().await.clone();
    Json(TrainingStatusResponse { status, last_run })
}

/// POST /training/retry
/// Retry the session commit of the last run if it failed
pub async fn retry_commit(State(state): State<AppState>) -> ApiResult<Json<PracticeSession>> {
    let mut last_run = state.last_run.write().await;

    let Some(report) = last_run.as_mut().filter(|r| r.commit_error.is_some()) else {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "No failed session commit to retry",
        ));
    };

    let session = state.sessions.commit(&report.pending).await?;
    info!("Recorded session {} on retry", session.id);

    report.session = Some(session.clone());
    report.commit_error = None;

    Ok(Json(session))
}

/// PATCH /training/params
/// Adjust repetitions or interval of the active run and of future runs
pub async fn update_training_params(
    State(state): State<AppState>,
    Json(req): Json<TrainingParamsRequest>,
) -> ApiResult<Json<TrainingStatus>> {
    if let Some(repetitions) = req.repetitions {
        state.scheduler.set_repetitions(repetitions).await?;
    }
    if let Some(interval_ms) = req.interval_ms {
        state
            .scheduler
            .set_interval(Duration::from_millis(interval_ms))
            .await;
    }

    Ok(Json(state.scheduler.status().await))
}

/// GET /stats
pub async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<Statistics>> {
    let mut stats = state.stats.compute().await?;
    if let Some(recent) = query.recent {
        stats = stats.with_recent_limit(recent);
    }
    Ok(Json(stats))
}
