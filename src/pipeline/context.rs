//! [`InferenceContext`]: the loaded models plus the three stage operations.
//!
//! Built once in `main`, shared behind an `Arc`, and torn down with
//! [`InferenceContext::shutdown`] at exit.  Each stage stays independently
//! callable; the orchestrator chains them.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use crate::caption::{BlipCaptioner, CaptionError, Captioner};
use crate::config::{AppConfig, AppPaths, Credential};
use crate::hub;
use crate::narrate::{HttpSpeechEndpoint, NarrateError, Narrator, RetryPolicy};
use crate::story::{CandleStoryWriter, FallbackStoryWriter, StoryWriter};

/// Models and clients for one process.
pub struct InferenceContext {
    captioner: Arc<dyn Captioner>,
    writer: FallbackStoryWriter,
    narrator: Narrator,
    max_new_tokens: usize,
}

impl InferenceContext {
    /// Assemble a context from already-built components.
    pub fn new(
        captioner: Arc<dyn Captioner>,
        writer: Arc<dyn StoryWriter>,
        narrator: Narrator,
        max_new_tokens: usize,
    ) -> Self {
        Self {
            captioner,
            writer: FallbackStoryWriter::new(writer),
            narrator,
            max_new_tokens,
        }
    }

    /// Download (or reuse cached) weights and build every stage.
    ///
    /// Blocking; call before the UI starts.  `credential` must already be
    /// resolved so a missing token fails before any model is fetched.
    pub fn load(
        config: &AppConfig,
        credential: Credential,
        paths: &AppPaths,
    ) -> anyhow::Result<Self> {
        let (device, dtype) = hub::select_device();
        log::info!("pipeline: using device {device:?} ({dtype:?})");

        let captioner = BlipCaptioner::load(&config.captioner, &paths.models_dir, &device)
            .context("loading captioning model")?;
        let writer =
            CandleStoryWriter::load(&config.story_writer, &paths.models_dir, &device, dtype)
                .context("loading story model")?;

        let endpoint = HttpSpeechEndpoint::from_config(&config.narrator, credential);
        let narrator = Narrator::new(
            Arc::new(endpoint),
            RetryPolicy::full_then_truncated(config.narrator.truncate_chars),
        );

        Ok(Self::new(
            Arc::new(captioner),
            Arc::new(writer),
            narrator,
            config.story_writer.max_new_tokens,
        ))
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    /// Caption the image at `image_path`.
    ///
    /// A missing file is [`CaptionError::NotFound`] before the model is
    /// touched.  Every other failure, including an empty caption, is
    /// [`CaptionError::GenerationFailed`].
    pub fn image_to_text(&self, image_path: &Path) -> Result<String, CaptionError> {
        if !image_path.exists() {
            return Err(CaptionError::NotFound(image_path.to_path_buf()));
        }

        let caption = match self.captioner.caption(image_path) {
            Ok(text) => text,
            Err(e @ CaptionError::GenerationFailed(_)) => return Err(e),
            Err(e) => return Err(CaptionError::GenerationFailed(e.to_string())),
        };

        let caption = caption.trim();
        if caption.is_empty() {
            return Err(CaptionError::GenerationFailed(
                "model produced an empty caption".into(),
            ));
        }
        log::debug!("pipeline: caption = {caption:?}");
        Ok(caption.to_string())
    }

    /// Extend `caption` into a story.  Never fails; `""` means no story.
    ///
    /// `max_new_tokens` defaults to the configured budget.
    pub fn text_to_story(&self, caption: &str, max_new_tokens: Option<usize>) -> String {
        let budget = max_new_tokens.unwrap_or(self.max_new_tokens);
        let story = self.writer.write(caption, budget);
        log::debug!("pipeline: story has {} chars", story.chars().count());
        story
    }

    /// Narrate `story` into `output`.
    ///
    /// Only a blank story is an error; every other failure is `Ok(false)`.
    pub async fn story_to_audio(&self, story: &str, output: &Path) -> Result<bool, NarrateError> {
        self.narrator.narrate(story, output).await
    }

    /// Release the models.
    pub fn shutdown(self) {
        log::info!("pipeline: releasing models");
        drop(self);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
