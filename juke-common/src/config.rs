//! Configuration loading and resolution
//!
//! Settings are resolved once at process start and are immutable for the
//! process lifetime. Config file path resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `JUKE_CONFIG` environment variable
//! 3. Platform config directory (e.g. `~/.config/juke/juke-rq.toml`)
//!
//! Individual fields may additionally be overridden by `JUKE_*` environment
//! variables, which take priority over values from the TOML file.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default model for the content-classification service
pub const DEFAULT_MODERATION_MODEL: &str = "gemini-2.5-flash";

/// Immutable process-wide settings, shared via `Arc`
///
/// Absence of a required field is a startup-time configuration fault
/// surfaced by [`Settings::validate`], never a per-request fault.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub spotify: SpotifySettings,
    pub moderation: ModerationSettings,
}

/// Spotify application identity and playlist targets
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpotifySettings {
    /// OAuth client ID of the registered application
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Long-lived refresh token minted once at setup time
    pub refresh_token: String,
    /// Redirect URI registered for the one-time authorization-code exchange
    pub redirect_uri: String,
    /// Playlist that receives approved tracks
    pub public_playlist_id: String,
    /// Append-only playlist recording every submission; also the
    /// duplicate-check source of truth
    pub audit_playlist_id: String,
}

/// Content-classification service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModerationSettings {
    /// API key for the classification service
    pub api_key: String,
    /// Model identifier
    pub model: String,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODERATION_MODEL.to_string(),
        }
    }
}

impl Settings {
    /// Resolve settings from config file and environment
    ///
    /// Missing config file is not an error; all fields can come from the
    /// environment. Validation of required fields is a separate step so
    /// callers that only need a subset (e.g. the setup-time token
    /// exchange) can still construct settings.
    pub fn resolve(cli_config: Option<&Path>) -> Result<Settings> {
        let mut settings = match config_file_path(cli_config) {
            Some(path) if path.exists() => Settings::from_file(&path)?,
            Some(path) => {
                info!(
                    "No config file at {}, using environment variables only",
                    path.display()
                );
                Settings::default()
            }
            None => Settings::default(),
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Settings> {
        let content = std::fs::read_to_string(path)?;
        let settings = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        info!("Configuration loaded from {}", path.display());
        Ok(settings)
    }

    /// Apply `JUKE_*` environment variable overrides (env wins over TOML)
    fn apply_env_overrides(&mut self) {
        override_from_env(&mut self.spotify.client_id, "JUKE_SPOTIFY_CLIENT_ID");
        override_from_env(&mut self.spotify.client_secret, "JUKE_SPOTIFY_CLIENT_SECRET");
        override_from_env(&mut self.spotify.refresh_token, "JUKE_SPOTIFY_REFRESH_TOKEN");
        override_from_env(&mut self.spotify.redirect_uri, "JUKE_SPOTIFY_REDIRECT_URI");
        override_from_env(
            &mut self.spotify.public_playlist_id,
            "JUKE_SPOTIFY_PUBLIC_PLAYLIST_ID",
        );
        override_from_env(
            &mut self.spotify.audit_playlist_id,
            "JUKE_SPOTIFY_AUDIT_PLAYLIST_ID",
        );
        override_from_env(&mut self.moderation.api_key, "JUKE_MODERATION_API_KEY");
        override_from_env(&mut self.moderation.model, "JUKE_MODERATION_MODEL");
    }

    /// Validate that all required fields are present
    ///
    /// Reports every missing field at once so an operator can fix the
    /// configuration in a single pass.
    pub fn validate(&self) -> Result<()> {
        let required = [
            (&self.spotify.client_id, "spotify.client_id"),
            (&self.spotify.client_secret, "spotify.client_secret"),
            (&self.spotify.refresh_token, "spotify.refresh_token"),
            (&self.spotify.public_playlist_id, "spotify.public_playlist_id"),
            (&self.spotify.audit_playlist_id, "spotify.audit_playlist_id"),
            (&self.moderation.api_key, "moderation.api_key"),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(value, _)| value.trim().is_empty())
            .map(|(_, name)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "Missing required settings: {}. Please configure using one of:\n\
                 1. TOML config: ~/.config/juke/juke-rq.toml\n\
                 2. Environment: the matching JUKE_* variables (e.g. JUKE_SPOTIFY_CLIENT_ID)",
                missing.join(", ")
            )))
        }
    }
}

/// Replace `value` with the environment variable when set and non-empty
fn override_from_env(value: &mut String, var: &str) {
    if let Ok(env_value) = std::env::var(var) {
        if !env_value.trim().is_empty() {
            if !value.trim().is_empty() {
                warn!("{} overrides value from config file", var);
            }
            *value = env_value;
        }
    }
}

/// Resolve config file path following CLI → ENV → platform default priority
pub fn config_file_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var("JUKE_CONFIG") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    dirs::config_dir().map(|d| d.join("juke").join("juke-rq.toml"))
}
