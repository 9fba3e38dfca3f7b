//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\image-to-story\
//!   macOS:   ~/Library/Application Support/image-to-story/
//!   Linux:   ~/.config/image-to-story/
//!
//! Data dir (hub model cache):
//!   Windows: %LOCALAPPDATA%\image-to-story\models\
//!   macOS:   ~/Library/Application Support/image-to-story/models/
//!   Linux:   ~/.local/share/image-to-story/models/
//!
//! Exported narrations go to the user's download directory, or the current
//! directory when the platform has none.

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Cache directory handed to the hub client for model weights.
    pub models_dir: PathBuf,
    /// Where "Download Audio" writes the narration.
    pub download_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "image-to-story";

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

        let download_dir = dirs::download_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            models_dir: data_dir.join("models"),
            download_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
