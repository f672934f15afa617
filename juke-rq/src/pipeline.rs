//! Submission pipeline
//!
//! Sequences a song request through credential refresh, duplicate check,
//! content moderation, and conditional playlist writes. Each submission
//! is one sequential chain of upstream calls; nothing is retried and no
//! state survives between submissions (the two external playlists hold
//! all durable state).
//!
//! Two concurrent first-time submissions of the same track can both pass
//! the duplicate check and both write. The playlists offer no
//! compare-and-append primitive, so the race is accepted and eventual
//! duplicates are tolerated.

use crate::error::Result;
use crate::moderation::{Evaluation, ModerationClient, SongEvaluation};
use crate::spotify::{track_uri, AccessToken, SpotifyClient};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Playlist operations the pipeline needs from the catalog service
#[async_trait]
pub trait PlaylistService: Send + Sync {
    async fn refresh_access_token(&self) -> Result<AccessToken>;

    async fn playlist_track_uris(
        &self,
        token: &AccessToken,
        playlist_id: &str,
    ) -> Result<Vec<String>>;

    async fn add_track_to_playlist(
        &self,
        token: &AccessToken,
        playlist_id: &str,
        track_id: &str,
    ) -> Result<serde_json::Value>;
}

/// Content gate deciding whether a track may reach the public playlist
#[async_trait]
pub trait ContentScreen: Send + Sync {
    async fn evaluate(&self, title: &str, artist: &str) -> Result<SongEvaluation>;
}

#[async_trait]
impl PlaylistService for SpotifyClient {
    async fn refresh_access_token(&self) -> Result<AccessToken> {
        SpotifyClient::refresh_access_token(self).await
    }

    async fn playlist_track_uris(
        &self,
        token: &AccessToken,
        playlist_id: &str,
    ) -> Result<Vec<String>> {
        SpotifyClient::playlist_track_uris(self, token, playlist_id).await
    }

    async fn add_track_to_playlist(
        &self,
        token: &AccessToken,
        playlist_id: &str,
        track_id: &str,
    ) -> Result<serde_json::Value> {
        SpotifyClient::add_track_to_playlist(self, token, playlist_id, track_id).await
    }
}

#[async_trait]
impl ContentScreen for ModerationClient {
    async fn evaluate(&self, title: &str, artist: &str) -> Result<SongEvaluation> {
        ModerationClient::evaluate(self, title, artist).await
    }
}

/// A walk-up user's song request, immutable once received
#[derive(Debug, Clone)]
pub struct SongRequest {
    /// Opaque catalog track identifier
    pub track_id: String,
    pub title: String,
    pub artist: String,
}

/// Terminal outcome of one submission
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// Approved and appended to both playlists; carries the public
    /// playlist's write confirmation
    Added { confirmation: serde_json::Value },
    /// Already present in the audit playlist; nothing written, moderation
    /// never consulted
    Duplicate,
    /// Declined by moderation; recorded in the audit playlist only
    Rejected {
        evaluation: Evaluation,
        issues: Vec<String>,
    },
}

/// Orchestrates one submission at a time
///
/// Every submission mints its own access token; approved tracks are
/// written to the public playlist first, then to the audit playlist, and
/// both writes are required for a successful outcome. The two writes are
/// independent upstream calls and are not transactional.
pub struct SubmissionPipeline {
    playlists: Arc<dyn PlaylistService>,
    screen: Arc<dyn ContentScreen>,
    public_playlist_id: String,
    audit_playlist_id: String,
}

impl SubmissionPipeline {
    pub fn new(
        playlists: Arc<dyn PlaylistService>,
        screen: Arc<dyn ContentScreen>,
        public_playlist_id: String,
        audit_playlist_id: String,
    ) -> Self {
        Self {
            playlists,
            screen,
            public_playlist_id,
            audit_playlist_id,
        }
    }

    /// Run one submission to its terminal outcome
    ///
    /// The caller validates the track identifier; every failure here is
    /// terminal for the submission and maps to an error response.
    pub async fn process(&self, request: &SongRequest) -> Result<SubmissionOutcome> {
        let token = self.playlists.refresh_access_token().await?;

        let existing = self
            .playlists
            .playlist_track_uris(&token, &self.audit_playlist_id)
            .await?;
        let uri = track_uri(&request.track_id);
        if existing.iter().any(|u| u == &uri) {
            info!(track_id = %request.track_id, "Duplicate submission, skipping moderation");
            return Ok(SubmissionOutcome::Duplicate);
        }

        let verdict = self
            .screen
            .evaluate(&request.title, &request.artist)
            .await?;

        if verdict.evaluation.is_approved() {
            // Public write first so its confirmation becomes the response;
            // the audit write must also succeed for an approved outcome.
            let confirmation = self
                .playlists
                .add_track_to_playlist(&token, &self.public_playlist_id, &request.track_id)
                .await?;
            self.playlists
                .add_track_to_playlist(&token, &self.audit_playlist_id, &request.track_id)
                .await?;

            info!(track_id = %request.track_id, "Track approved and added to public playlist");
            Ok(SubmissionOutcome::Added { confirmation })
        } else {
            self.playlists
                .add_track_to_playlist(&token, &self.audit_playlist_id, &request.track_id)
                .await?;

            info!(
                track_id = %request.track_id,
                evaluation = verdict.evaluation.as_str(),
                "Track rejected by moderation"
            );
            Ok(SubmissionOutcome::Rejected {
                evaluation: verdict.evaluation,
                issues: verdict.issues,
            })
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const PUBLIC: &str = "public-playlist";
    const AUDIT: &str = "audit-playlist";

    #[derive(Default)]
    struct FakePlaylists {
        existing: Vec<String>,
        fail_token: bool,
        fail_write_status: Option<u16>,
        list_calls: AtomicUsize,
        appended: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl PlaylistService for FakePlaylists {
        async fn refresh_access_token(&self) -> Result<AccessToken> {
            if self.fail_token {
                return Err(Error::TokenRefresh("invalid_client".to_string()));
            }
            Ok(AccessToken::new("test-token"))
        }

        async fn playlist_track_uris(
            &self,
            _token: &AccessToken,
            _playlist_id: &str,
        ) -> Result<Vec<String>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.existing.clone())
        }

        async fn add_track_to_playlist(
            &self,
            _token: &AccessToken,
            playlist_id: &str,
            track_id: &str,
        ) -> Result<serde_json::Value> {
            if let Some(status) = self.fail_write_status {
                return Err(Error::PlaylistWrite {
                    status: Some(status),
                    body: "forbidden".to_string(),
                });
            }
            self.appended
                .lock()
                .unwrap()
                .push((playlist_id.to_string(), track_id.to_string()));
            Ok(serde_json::json!({ "snapshot_id": "snap-1" }))
        }
    }

    struct FakeScreen {
        verdict: Evaluation,
        issues: Vec<String>,
        calls: AtomicUsize,
    }

    impl FakeScreen {
        fn returning(verdict: Evaluation, issues: &[&str]) -> Self {
            Self {
                verdict,
                issues: issues.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ContentScreen for FakeScreen {
        async fn evaluate(&self, title: &str, artist: &str) -> Result<SongEvaluation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SongEvaluation {
                evaluation: self.verdict,
                reasoning: "test verdict".to_string(),
                issues: self.issues.clone(),
                song_title: title.to_string(),
                artist: artist.to_string(),
            })
        }
    }

    fn pipeline(
        playlists: Arc<FakePlaylists>,
        screen: Arc<FakeScreen>,
    ) -> SubmissionPipeline {
        SubmissionPipeline::new(playlists, screen, PUBLIC.to_string(), AUDIT.to_string())
    }

    fn request(track_id: &str) -> SongRequest {
        SongRequest {
            track_id: track_id.to_string(),
            title: "Happy".to_string(),
            artist: "Pharrell Williams".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_short_circuits_without_moderation_or_writes() {
        let playlists = Arc::new(FakePlaylists {
            existing: vec![track_uri("abc123")],
            ..Default::default()
        });
        let screen = Arc::new(FakeScreen::returning(Evaluation::Appropriate, &[]));

        let outcome = pipeline(playlists.clone(), screen.clone())
            .process(&request("abc123"))
            .await
            .unwrap();

        assert!(matches!(outcome, SubmissionOutcome::Duplicate));
        assert_eq!(screen.calls.load(Ordering::SeqCst), 0);
        assert!(playlists.appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_approved_track_written_to_both_playlists() {
        let playlists = Arc::new(FakePlaylists::default());
        let screen = Arc::new(FakeScreen::returning(Evaluation::Appropriate, &[]));

        let outcome = pipeline(playlists.clone(), screen.clone())
            .process(&request("abc123"))
            .await
            .unwrap();

        match outcome {
            SubmissionOutcome::Added { confirmation } => {
                assert_eq!(confirmation["snapshot_id"], "snap-1");
            }
            other => panic!("Expected Added, got {:?}", other),
        }
        // Public write first, then audit
        assert_eq!(
            *playlists.appended.lock().unwrap(),
            vec![
                (PUBLIC.to_string(), "abc123".to_string()),
                (AUDIT.to_string(), "abc123".to_string()),
            ]
        );
        assert_eq!(screen.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_track_written_to_audit_only() {
        let playlists = Arc::new(FakePlaylists::default());
        let screen = Arc::new(FakeScreen::returning(
            Evaluation::Inappropriate,
            &["suggestive violence"],
        ));

        let outcome = pipeline(playlists.clone(), screen.clone())
            .process(&request("xyz999"))
            .await
            .unwrap();

        match outcome {
            SubmissionOutcome::Rejected { evaluation, issues } => {
                assert_eq!(evaluation, Evaluation::Inappropriate);
                assert_eq!(issues, vec!["suggestive violence"]);
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
        assert_eq!(
            *playlists.appended.lock().unwrap(),
            vec![(AUDIT.to_string(), "xyz999".to_string())]
        );
    }

    #[tokio::test]
    async fn test_every_non_appropriate_category_is_rejected() {
        for verdict in [
            Evaluation::LikelyAppropriate,
            Evaluation::LikelyInappropriate,
            Evaluation::Inappropriate,
        ] {
            let playlists = Arc::new(FakePlaylists::default());
            let screen = Arc::new(FakeScreen::returning(verdict, &[]));

            let outcome = pipeline(playlists.clone(), screen)
                .process(&request("abc123"))
                .await
                .unwrap();

            assert!(
                matches!(outcome, SubmissionOutcome::Rejected { .. }),
                "{:?} must not reach the public playlist",
                verdict
            );
            assert_eq!(
                *playlists.appended.lock().unwrap(),
                vec![(AUDIT.to_string(), "abc123".to_string())]
            );
        }
    }

    #[tokio::test]
    async fn test_token_failure_aborts_before_any_read_or_write() {
        let playlists = Arc::new(FakePlaylists {
            fail_token: true,
            ..Default::default()
        });
        let screen = Arc::new(FakeScreen::returning(Evaluation::Appropriate, &[]));

        let err = pipeline(playlists.clone(), screen.clone())
            .process(&request("abc123"))
            .await
            .expect_err("token failure must be terminal");

        assert!(matches!(err, Error::TokenRefresh(_)));
        assert_eq!(playlists.list_calls.load(Ordering::SeqCst), 0);
        assert_eq!(screen.calls.load(Ordering::SeqCst), 0);
        assert!(playlists.appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_surfaces_upstream_status() {
        let playlists = Arc::new(FakePlaylists {
            fail_write_status: Some(403),
            ..Default::default()
        });
        let screen = Arc::new(FakeScreen::returning(Evaluation::Appropriate, &[]));

        let err = pipeline(playlists, screen)
            .process(&request("abc123"))
            .await
            .expect_err("write failure must be terminal");

        match err {
            Error::PlaylistWrite { status, .. } => assert_eq!(status, Some(403)),
            other => panic!("Expected PlaylistWrite, got {:?}", other),
        }
    }
}
