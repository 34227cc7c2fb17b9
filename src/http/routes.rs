use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recordings
        .route(
            "/recordings",
            get(handlers::list_recordings).post(handlers::create_recording),
        )
        .route("/recordings/pcm", post(handlers::upload_pcm))
        .route("/recordings/delete", post(handlers::delete_recordings))
        .route(
            "/recordings/:id",
            get(handlers::get_recording)
                .patch(handlers::update_recording)
                .delete(handlers::delete_recording),
        )
        .route("/recordings/:id/audio", get(handlers::get_recording_audio))
        .route("/recordings/:id/play", post(handlers::play_recording))
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::add_category),
        )
        // Training queue
        .route(
            "/queue",
            get(handlers::get_queue)
                .post(handlers::append_to_queue)
                .delete(handlers::clear_queue),
        )
        .route("/queue/move", post(handlers::move_queue_item))
        .route("/queue/prune", post(handlers::prune_queue))
        .route(
            "/queue/:index",
            axum::routing::delete(handlers::remove_queue_item),
        )
        // Training control
        .route("/training/start", post(handlers::start_training))
        .route("/training/stop", post(handlers::stop_training))
        .route("/training/retry", post(handlers::retry_commit))
        .route("/training/status", get(handlers::training_status))
        .route(
            "/training/params",
            axum::routing::patch(handlers::update_training_params),
        )
        // Statistics
        .route("/stats", get(handlers::get_stats))
        // Request logging and permissive CORS for a browser UI
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
