//! HTTP API server for a UI layer
//!
//! This module provides a REST API over the stores and the scheduler:
//! - /recordings - Save, list, rename, delete and play phrases
//! - /queue - Edit the training queue
//! - /training/* - Start, stop and inspect training runs
//! - /stats - Practice statistics
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
