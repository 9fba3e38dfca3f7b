//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// CaptionerConfig
// ---------------------------------------------------------------------------

/// Settings for the image-captioning model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionerConfig {
    /// Hub repository of the BLIP captioning weights.
    pub model_id: String,
    /// Repository revision holding `model.safetensors`.
    pub revision: String,
    /// Upper bound on caption length in tokens.
    pub max_caption_tokens: usize,
}

impl Default for CaptionerConfig {
    fn default() -> Self {
        Self {
            model_id: "Salesforce/blip-image-captioning-large".into(),
            revision: "refs/pr/18".into(),
            max_caption_tokens: 40,
        }
    }
}

// ---------------------------------------------------------------------------
// StoryWriterConfig
// ---------------------------------------------------------------------------

/// Settings for the story text-generation model.
///
/// Sampling temperature, top-p and repetition penalty are fixed constants in
/// [`crate::story`] and deliberately not configurable here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryWriterConfig {
    /// Hub repository of the causal language model.
    pub model_id: String,
    /// Repository revision.
    pub revision: String,
    /// Default length budget in generated tokens.
    pub max_new_tokens: usize,
    /// Fixed sampling seed.  `None` draws a fresh seed for every story.
    pub seed: Option<u64>,
}

impl Default for StoryWriterConfig {
    fn default() -> Self {
        Self {
            model_id: "Qwen/Qwen2-0.5B".into(),
            revision: "main".into(),
            max_new_tokens: crate::story::DEFAULT_MAX_NEW_TOKENS,
            seed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// NarratorConfig
// ---------------------------------------------------------------------------

/// Settings for the remote speech-synthesis step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    /// Speech-synthesis endpoint receiving `{"inputs": "<text>"}`.
    pub endpoint_url: String,
    /// Bearer token used when `HUGGINGFACE_API_TOKEN` is not set.
    pub api_token: Option<String>,
    /// Character budget of the single truncated retry.
    pub truncate_chars: usize,
    /// Per-request timeout.  `None` keeps the HTTP client default.
    pub timeout_secs: Option<u64>,
    /// File name the narration is written to.
    pub output_file: String,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            endpoint_url:
                "https://api-inference.huggingface.co/models/espnet/kan-bayashi_ljspeech_vits"
                    .into(),
            api_token: None,
            truncate_chars: crate::narrate::DEFAULT_TRUNCATE_CHARS,
            timeout_secs: None,
            output_file: "model_result.flac".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// egui window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Initial inner window size `(width, height)` in points.
    pub window_size: (f32, f32),
    /// File name offered by "Download Audio".
    pub download_file_name: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_size: (640.0, 720.0),
            download_file_name: "story_narration.flac".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use image_to_story::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// println!("{}", config.narrator.endpoint_url);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Image-captioning model settings.
    pub captioner: CaptionerConfig,
    /// Story-generation model settings.
    pub story_writer: StoryWriterConfig,
    /// Speech-synthesis settings.
    pub narrator: NarratorConfig,
    /// Window settings.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
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
    pub fn save_to(&self, path: &Path) -> Result<()> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.captioner.model_id, loaded.captioner.model_id);
        assert_eq!(original.captioner.revision, loaded.captioner.revision);
        assert_eq!(original.story_writer.model_id, loaded.story_writer.model_id);
        assert_eq!(
            original.story_writer.max_new_tokens,
            loaded.story_writer.max_new_tokens
        );
        assert_eq!(original.story_writer.seed, loaded.story_writer.seed);
        assert_eq!(original.narrator.endpoint_url, loaded.narrator.endpoint_url);
        assert_eq!(original.narrator.api_token, loaded.narrator.api_token);
        assert_eq!(original.narrator.truncate_chars, loaded.narrator.truncate_chars);
        assert_eq!(original.narrator.timeout_secs, loaded.narrator.timeout_secs);
        assert_eq!(original.ui.window_size, loaded.ui.window_size);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");

        assert_eq!(config.story_writer.max_new_tokens, 500);
        assert_eq!(config.narrator.output_file, "model_result.flac");
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.captioner.model_id, "Salesforce/blip-image-captioning-large");
        assert_eq!(cfg.story_writer.max_new_tokens, 500);
        assert!(cfg.story_writer.seed.is_none());
        assert_eq!(cfg.narrator.truncate_chars, 150);
        assert!(cfg.narrator.timeout_secs.is_none());
        assert!(cfg.narrator.api_token.is_none());
        assert!(cfg
            .narrator
            .endpoint_url
            .ends_with("espnet/kan-bayashi_ljspeech_vits"));
        assert_eq!(cfg.ui.download_file_name, "story_narration.flac");
    }

    /// Sections missing from a hand-edited file fall back to their defaults.
    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[story_writer]\nseed = 42\n").expect("write");

        let cfg = AppConfig::load_from(&path).expect("load");

        assert_eq!(cfg.story_writer.seed, Some(42));
        assert_eq!(cfg.story_writer.max_new_tokens, 500);
        assert_eq!(cfg.narrator.truncate_chars, 150);
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.story_writer.seed = Some(7);
        cfg.story_writer.max_new_tokens = 120;
        cfg.narrator.api_token = Some("hf_test".into());
        cfg.narrator.timeout_secs = Some(30);
        cfg.narrator.endpoint_url = "http://localhost:8080/tts".into();

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.story_writer.seed, Some(7));
        assert_eq!(loaded.story_writer.max_new_tokens, 120);
        assert_eq!(loaded.narrator.api_token.as_deref(), Some("hf_test"));
        assert_eq!(loaded.narrator.timeout_secs, Some(30));
        assert_eq!(loaded.narrator.endpoint_url, "http://localhost:8080/tts");
    }
}
