//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

/// Connection settings for the remote audio store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the REST API, without a trailing slash.
    pub base_url: String,
    /// Seconds to wait for any single remote call before treating it as
    /// failed.
    pub timeout_secs: u64,
    /// Bearer token. When `None` the token file from [`AppPaths`] is used.
    pub token: Option<String>,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Changes to [`ApiConfig`] requested from the command line. `None` leaves
/// a field as it is.
#[derive(Debug, Clone, Default)]
pub struct ApiEdit {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    /// `Some("")` removes a stored token.
    pub token: Option<String>,
}

impl ApiEdit {
    pub fn is_empty(&self) -> bool {
        self.base_url.is_none() && self.timeout_secs.is_none() && self.token.is_none()
    }
}

impl ApiConfig {
    pub fn apply(&mut self, edit: ApiEdit) {
        if let Some(url) = edit.base_url {
            self.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(secs) = edit.timeout_secs {
            self.timeout_secs = secs.max(1);
        }
        if let Some(token) = edit.token {
            let token = token.trim();
            self.token = (!token.is_empty()).then(|| token.to_string());
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".into(),
            timeout_secs: 30,
            token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RecorderConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Encodings tried in order; the first one the capture backend supports
    /// wins. When none is supported the recording is tagged "unspecified".
    pub mime_candidates: Vec<String>,
    /// Interval between chunk collections, in milliseconds.
    pub chunk_interval_ms: u64,
    /// Hard cap on recording length; ticks past this are ignored.
    pub max_recording_secs: u64,
}

impl RecorderConfig {
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms.max(1))
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            mime_candidates: vec![
                "audio/webm;codecs=opus".into(),
                "audio/webm".into(),
                "audio/ogg;codecs=opus".into(),
                "audio/mp4".into(),
                "audio/wav".into(),
            ],
            chunk_interval_ms: 1_000,
            max_recording_secs: 600,
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Playlist behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Chain straight into the next source when one ends.
    pub autoplay_next: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            autoplay_next: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use talenta_audio::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// println!("{}", config.api.base_url);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote store connection.
    pub api: ApiConfig,
    /// Microphone capture.
    pub recorder: RecorderConfig,
    /// Playlist behaviour.
    pub playback: PlaybackConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet so
    /// callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
