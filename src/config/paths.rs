//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + bearer token):
//!   Windows: %APPDATA%\talenta-audio\
//!   macOS:   ~/Library/Application Support/talenta-audio/
//!   Linux:   ~/.config/talenta-audio/
//!
//! Data dir (local copies of recordings):
//!   Windows: %LOCALAPPDATA%\talenta-audio\
//!   macOS:   ~/Library/Application Support/talenta-audio/
//!   Linux:   ~/.local/share/talenta-audio/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and `token`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Full path to the stored bearer token.
    pub token_file: PathBuf,
    /// Directory where finalized recordings are kept until uploaded.
    pub recordings_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "talenta-audio";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            token_file: config_dir.join("token"),
            recordings_dir: data_dir.join("recordings"),
            config_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
