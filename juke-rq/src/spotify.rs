//! Spotify Web API client
//!
//! Covers the three upstream concerns of the request gateway:
//! - Access-token refresh (one fresh token per submission, never cached)
//! - Playlist reads and appends for the public and audit playlists
//! - Catalog search, passed through unmodified
//!
//! Also carries the one-time authorization-code exchange used at setup to
//! mint the long-lived refresh token.
//!
//! # API Reference
//! - Accounts service: https://accounts.spotify.com/api/token
//! - Web API: https://api.spotify.com/v1

use crate::error::{Error, Result};
use base64::Engine;
use juke_common::config::SpotifySettings;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Accounts service token endpoint
const ACCOUNTS_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Web API base URL
const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Default timeout for Spotify API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum number of tracks returned by a catalog search
const SEARCH_RESULT_LIMIT: &str = "10";

/// Short-lived opaque bearer token
///
/// Obtained per pipeline run and treated as exhausted afterwards; never
/// persisted, no expiry tracking.
#[derive(Debug, Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub(crate) fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    fn secret(&self) -> &str {
        &self.0
    }
}

/// The `spotify:track:` URI form of a track identifier
///
/// Used both for playlist membership comparison and for appends.
pub fn track_uri(track_id: &str) -> String {
    format!("spotify:track:{}", track_id)
}

/// Spotify Web API client
///
/// Holds the application identity plus the stored refresh token. All
/// playlist operations take the access token explicitly so each
/// submission's fresh token threads through its whole pipeline run.
pub struct SpotifyClient {
    /// HTTP client for API requests
    http_client: Client,
    /// Application identity and stored refresh token
    credentials: SpotifySettings,
}

impl SpotifyClient {
    /// Create a new Spotify client
    pub fn new(credentials: SpotifySettings) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            credentials,
        }
    }

    /// Exchange the stored refresh token for a fresh access token
    ///
    /// Called once per submission; tokens are never reused across runs.
    ///
    /// # Errors
    /// Returns [`Error::TokenRefresh`] carrying the upstream error body if
    /// the accounts service rejects the exchange. Not retried.
    pub async fn refresh_access_token(&self) -> Result<AccessToken> {
        debug!("Refreshing Spotify access token");

        let response = self
            .http_client
            .post(ACCOUNTS_TOKEN_URL)
            .header(reqwest::header::AUTHORIZATION, self.basic_auth())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.credentials.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::TokenRefresh(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenRefresh(format!(
                "accounts service returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::TokenRefresh(format!("Failed to parse token response: {}", e)))?;

        Ok(AccessToken(token.access_token))
    }

    /// One-time authorization-code exchange
    ///
    /// Used at setup to mint the long-lived refresh token; the full grant
    /// is returned so the operator can store it in the configuration.
    pub async fn exchange_authorization_code(&self, code: &str) -> Result<TokenGrant> {
        debug!("Exchanging authorization code for tokens");

        let response = self
            .http_client
            .post(ACCOUNTS_TOKEN_URL)
            .header(reqwest::header::AUTHORIZATION, self.basic_auth())
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::TokenRefresh(format!("code exchange request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenRefresh(format!(
                "code exchange returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::TokenRefresh(format!("Failed to parse token grant: {}", e)))
    }

    /// List the track URIs currently in a playlist
    ///
    /// Single page fetch; playlists larger than one page are only
    /// partially scanned (known limitation for large audit playlists).
    ///
    /// # Errors
    /// Returns [`Error::PlaylistRead`] on any transport, status, or parse
    /// failure.
    pub async fn playlist_track_uris(
        &self,
        token: &AccessToken,
        playlist_id: &str,
    ) -> Result<Vec<String>> {
        debug!(playlist_id = %playlist_id, "Fetching playlist track listing");

        let url = format!("{}/playlists/{}", API_BASE_URL, playlist_id);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| Error::PlaylistRead(format!("playlist fetch failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::PlaylistRead(format!(
                "playlist service returned {}: {}",
                status, body
            )));
        }

        let playlist: PlaylistResponse = response
            .json()
            .await
            .map_err(|e| Error::PlaylistRead(format!("Failed to parse playlist response: {}", e)))?;

        Ok(playlist.track_uris())
    }

    /// Append a track to a playlist
    ///
    /// Returns the upstream confirmation body (snapshot id) on success.
    ///
    /// # Errors
    /// Returns [`Error::PlaylistWrite`] keeping the upstream status code
    /// when the append is rejected.
    pub async fn add_track_to_playlist(
        &self,
        token: &AccessToken,
        playlist_id: &str,
        track_id: &str,
    ) -> Result<serde_json::Value> {
        debug!(playlist_id = %playlist_id, track_id = %track_id, "Appending track to playlist");

        let url = format!("{}/playlists/{}/tracks", API_BASE_URL, playlist_id);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token.secret())
            .json(&serde_json::json!({ "uris": [track_uri(track_id)] }))
            .send()
            .await
            .map_err(|e| Error::PlaylistWrite {
                status: None,
                body: format!("append request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::PlaylistWrite {
                status: Some(status),
                body,
            });
        }

        response.json().await.map_err(|e| Error::PlaylistWrite {
            status: None,
            body: format!("Failed to parse append response: {}", e),
        })
    }

    /// Free-text catalog search
    ///
    /// Returns the catalog's raw search response, passed through
    /// unmodified for the client to render.
    pub async fn search_tracks(
        &self,
        token: &AccessToken,
        song: &str,
        artist: &str,
    ) -> Result<serde_json::Value> {
        let query = build_search_query(song, artist);
        debug!(query = %query, "Searching catalog");

        let response = self
            .http_client
            .get(format!("{}/search", API_BASE_URL))
            .bearer_auth(token.secret())
            .query(&[
                ("q", query.as_str()),
                ("type", "track"),
                ("limit", SEARCH_RESULT_LIMIT),
            ])
            .send()
            .await
            .map_err(|e| Error::Search(format!("search request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Search(format!(
                "search service returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Search(format!("Failed to parse search response: {}", e)))
    }

    /// Basic authorization header value for the accounts service
    fn basic_auth(&self) -> String {
        let raw = format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        );
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

/// Build the field-qualified search query string
fn build_search_query(song: &str, artist: &str) -> String {
    format!("track:{} artist:{}", song, artist)
}

// ============================================================================
// Spotify API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Full token grant from the authorization-code exchange
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    tracks: PlaylistTracks,
}

impl PlaylistResponse {
    /// URIs of all playable entries; local or removed entries carry a
    /// null track and are skipped
    fn track_uris(self) -> Vec<String> {
        self.tracks
            .items
            .into_iter()
            .filter_map(|item| item.track)
            .map(|track| track.uri)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistTracks {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<PlaylistTrack>,
}

#[derive(Debug, Deserialize)]
struct PlaylistTrack {
    uri: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> SpotifyClient {
        SpotifyClient::new(SpotifySettings {
            client_id: "my-client-id".to_string(),
            client_secret: "my-secret".to_string(),
            refresh_token: "rtok".to_string(),
            redirect_uri: "http://127.0.0.1:5750/callback".to_string(),
            public_playlist_id: "pub".to_string(),
            audit_playlist_id: "audit".to_string(),
        })
    }

    #[test]
    fn test_track_uri_format() {
        assert_eq!(track_uri("abc123"), "spotify:track:abc123");
    }

    #[test]
    fn test_basic_auth_encoding() {
        let header = test_client().basic_auth();
        let encoded = header.strip_prefix("Basic ").expect("Basic prefix");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .expect("valid base64");
        assert_eq!(decoded, b"my-client-id:my-secret");
    }

    #[test]
    fn test_search_query_building() {
        assert_eq!(
            build_search_query("Happy", "Pharrell Williams"),
            "track:Happy artist:Pharrell Williams"
        );
    }

    #[test]
    fn test_token_response_parse() {
        let json = r#"{"access_token": "tok", "token_type": "Bearer", "expires_in": 3600}"#;
        let token: TokenResponse = serde_json::from_str(json).expect("valid token response");
        assert_eq!(token.access_token, "tok");
    }

    #[test]
    fn test_token_grant_parse() {
        let json = r#"{
            "access_token": "tok",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "rtok",
            "scope": "playlist-modify-public"
        }"#;
        let grant: TokenGrant = serde_json::from_str(json).expect("valid grant");
        assert_eq!(grant.refresh_token.as_deref(), Some("rtok"));
        assert_eq!(grant.expires_in, 3600);
    }

    #[test]
    fn test_playlist_uri_extraction_skips_null_tracks() {
        let json = r#"{
            "tracks": {
                "items": [
                    { "track": { "uri": "spotify:track:abc123" } },
                    { "track": null },
                    { "track": { "uri": "spotify:track:xyz999" } }
                ]
            }
        }"#;
        let playlist: PlaylistResponse = serde_json::from_str(json).expect("valid playlist");
        assert_eq!(
            playlist.track_uris(),
            vec!["spotify:track:abc123", "spotify:track:xyz999"]
        );
    }

    #[test]
    fn test_playlist_with_no_items() {
        let json = r#"{ "tracks": {} }"#;
        let playlist: PlaylistResponse = serde_json::from_str(json).expect("valid playlist");
        assert!(playlist.track_uris().is_empty());
    }
}
