//! Configuration module for Image-to-Story.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each pipeline
//! stage, `AppPaths` for cross-platform directories, TOML persistence via
//! `AppConfig::load` / `AppConfig::save`, and the startup-resolved
//! [`Credential`] for the speech endpoint.

pub mod credential;
pub mod paths;
pub mod settings;

pub use credential::{Credential, CredentialError, TOKEN_ENV_VAR};
pub use paths::AppPaths;
pub use settings::{AppConfig, CaptionerConfig, NarratorConfig, StoryWriterConfig, UiConfig};
