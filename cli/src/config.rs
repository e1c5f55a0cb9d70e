//! Centralized configuration management.
//!
//! All environment variables are read once at startup through this module,
//! after an optional `.env` file has been loaded.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Jellyfin base URL (required)
    pub jellyfin_url: String,
    /// Jellyfin API key (required)
    pub jellyfin_api_key: String,
    /// Jellyfin user; the first listed user when unset
    pub jellyfin_user_id: Option<String>,
    /// Spotify client credentials; playlist generation is unavailable without them
    pub spotify: Option<SpotifyCredentials>,
    /// SSH access to the media server; playlist-file cleanup is unavailable without it
    pub ssh: Option<SshConfig>,
    /// Music library root on the media server (default: "/music")
    pub music_path: String,
    /// Similarity threshold for duplicate grouping (default: 0.85)
    pub duplicate_threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SshConfig {
    pub host: String,
    pub user: String,
    /// default: 22
    pub port: u16,
    pub key_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let jellyfin_url = var("JELLYFIN_URL").context("Missing required JELLYFIN_URL env var")?;
        let jellyfin_api_key =
            var("JELLYFIN_API_KEY").context("Missing required JELLYFIN_API_KEY env var")?;

        let spotify = match (var("SPOTIFY_CLIENT_ID"), var("SPOTIFY_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyCredentials {
                client_id,
                client_secret,
            }),
            (None, None) => None,
            _ => bail!("SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set together"),
        };

        let ssh = match (var("SSH_HOST"), var("SSH_USER")) {
            (Some(host), Some(user)) => Some(SshConfig {
                host,
                user,
                port: match var("SSH_PORT") {
                    Some(port) => port
                        .parse()
                        .with_context(|| format!("SSH_PORT is not a port number: {port}"))?,
                    None => 22,
                },
                key_path: var("SSH_KEY").map(PathBuf::from),
            }),
            (None, None) => None,
            _ => bail!("SSH_HOST and SSH_USER must be set together"),
        };

        let duplicate_threshold = match var("DUPLICATE_THRESHOLD") {
            Some(value) => {
                let threshold: f64 = value
                    .parse()
                    .with_context(|| format!("DUPLICATE_THRESHOLD is not a number: {value}"))?;
                if !(0.0..=1.0).contains(&threshold) {
                    bail!("DUPLICATE_THRESHOLD must be within 0.0..=1.0, got {threshold}");
                }
                threshold
            }
            None => jellytidy::grouping::DEFAULT_THRESHOLD,
        };

        Ok(Self {
            jellyfin_url,
            jellyfin_api_key,
            jellyfin_user_id: var("JELLYFIN_USER_ID"),
            spotify,
            ssh,
            music_path: var("MUSIC_PATH").unwrap_or_else(|| "/music".to_string()),
            duplicate_threshold,
        })
    }
}
