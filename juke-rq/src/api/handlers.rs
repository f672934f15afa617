//! HTTP request handlers
//!
//! Maps submission pipeline outcomes and failures onto response codes:
//! 200 success, 400 missing input, 405 duplicate or rejected by
//! moderation, otherwise the upstream write status when available or 500.
//! Internal failure details are logged, never returned to the caller.

use crate::api::AppState;
use crate::error::Error;
use crate::pipeline::{SongRequest, SubmissionOutcome};
use crate::spotify::TokenGrant;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub track_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub song: String,
    #[serde(default)]
    pub artist: String,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeCodeRequest {
    pub code: String,
}

// ============================================================================
// Submission Endpoint
// ============================================================================

/// POST /api/v1/requests - Submit a track for the shared playlist
pub async fn submit_request(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    if req.track_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Track ID is required" })),
        );
    }

    let request = SongRequest {
        track_id: req.track_id,
        title: req.title,
        artist: req.artist,
    };
    info!(track_id = %request.track_id, title = %request.title, artist = %request.artist, "Song request received");

    match state.pipeline.process(&request).await {
        Ok(SubmissionOutcome::Added { confirmation }) => (
            StatusCode::OK,
            Json(json!({
                "message": "Song added to playlist successfully!",
                "data": confirmation,
            })),
        ),
        Ok(SubmissionOutcome::Duplicate) => (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(json!({ "message": "Song already requested!" })),
        ),
        Ok(SubmissionOutcome::Rejected { evaluation, issues }) => (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(json!({
                "message": format!(
                    "Song not added to playlist, decision: {} for reasons: {}",
                    evaluation.as_str(),
                    issues.join(", ")
                ),
                "evaluation": evaluation,
                "issues": issues,
            })),
        ),
        Err(err) => failure_response(err),
    }
}

/// Map a pipeline failure to a terminal response without leaking internals
fn failure_response(err: Error) -> (StatusCode, Json<serde_json::Value>) {
    error!("Submission pipeline failed: {}", err);
    match err {
        Error::PlaylistWrite { status, .. } => {
            let status = status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                Json(json!({ "message": "Failed to add song to playlist." })),
            )
        }
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "An unexpected error occurred" })),
        ),
    }
}

// ============================================================================
// Search Endpoint
// ============================================================================

/// GET /api/v1/search - Catalog search passthrough
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> (StatusCode, Json<serde_json::Value>) {
    if params.song.trim().is_empty() && params.artist.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Song or artist is required" })),
        );
    }

    let result = async {
        let token = state.spotify.refresh_access_token().await?;
        state
            .spotify
            .search_tracks(&token, &params.song, &params.artist)
            .await
    }
    .await;

    match result {
        Ok(body) => (StatusCode::OK, Json(body)),
        Err(err) => {
            error!("Catalog search failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "An error occurred" })),
            )
        }
    }
}

// ============================================================================
// Setup Endpoint
// ============================================================================

/// POST /api/v1/auth/token - One-time authorization-code exchange
///
/// Used once at setup to mint the long-lived refresh token; the grant is
/// returned for the operator to store in the configuration.
pub async fn exchange_code(
    State(state): State<AppState>,
    Json(req): Json<ExchangeCodeRequest>,
) -> Result<Json<TokenGrant>, (StatusCode, Json<serde_json::Value>)> {
    match state.spotify.exchange_authorization_code(&req.code).await {
        Ok(grant) => Ok(Json(grant)),
        Err(err) => {
            error!("Authorization code exchange failed: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Failed to fetch tokens." })),
            ))
        }
    }
}
