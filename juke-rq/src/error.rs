//! Error types for juke-rq
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Components fail fast; the handler layer classifies the
//! failure and always produces a terminal response.

use thiserror::Error;

/// Main error type for the request gateway
#[derive(Error, Debug)]
pub enum Error {
    /// Access-token refresh rejected by the accounts service; carries the
    /// upstream's raw error body for diagnostics
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// Audit playlist listing could not be fetched
    #[error("Playlist read failed: {0}")]
    PlaylistRead(String),

    /// Content-classification call failed or returned output that does
    /// not match the verdict schema
    #[error("Moderation service error: {0}")]
    Moderation(String),

    /// A playlist append was rejected upstream; keeps the upstream status
    /// so the response can mirror it
    #[error("Playlist write failed: {body}")]
    PlaylistWrite { status: Option<u16>, body: String },

    /// Catalog search failed
    #[error("Catalog search failed: {0}")]
    Search(String),
}

/// Convenience Result type using juke-rq Error
pub type Result<T> = std::result::Result<T, Error>;
