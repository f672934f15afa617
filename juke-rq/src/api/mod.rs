//! REST API implementation for the request gateway

pub mod handlers;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::moderation::ModerationClient;
use crate::pipeline::SubmissionPipeline;
use crate::spotify::SpotifyClient;
use juke_common::Settings;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Spotify client, used directly by the search and setup endpoints
    pub spotify: Arc<SpotifyClient>,
    /// Submission pipeline
    pub pipeline: Arc<SubmissionPipeline>,
}

impl AppState {
    /// Build the state from validated settings
    pub fn new(settings: Settings) -> Self {
        let spotify = Arc::new(SpotifyClient::new(settings.spotify.clone()));
        let moderation = Arc::new(ModerationClient::new(settings.moderation.clone()));
        let pipeline = Arc::new(SubmissionPipeline::new(
            spotify.clone(),
            moderation,
            settings.spotify.public_playlist_id,
            settings.spotify.audit_playlist_id,
        ));
        Self { spotify, pipeline }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(health_check))
        // API v1 routes
        .nest(
            "/api/v1",
            Router::new()
                // Submission endpoint
                .route("/requests", post(handlers::submit_request))
                // Catalog search passthrough
                .route("/search", get(handlers::search))
                // One-time setup: authorization-code exchange
                .route("/auth/token", post(handlers::exchange_code)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "juke-rq",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
