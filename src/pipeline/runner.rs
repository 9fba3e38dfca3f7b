//! Pipeline orchestrator: drives caption → story → narration per command.
//!
//! [`PipelineOrchestrator`] receives [`PipelineCommand`]s over a
//! `tokio::sync::mpsc` channel and reports [`PipelineEvent`]s back to the UI.
//!
//! # Pipeline flow
//!
//! ```text
//! PipelineCommand::Generate
//!   └─▶ stage upload → spawn_blocking(image_to_text)      [Captioning]
//!         └─▶ spawn_blocking(text_to_story)               [WritingStory]
//!               ├─ ""    → Failed("no story produced")
//!               └─ story → story_to_audio → read back     [Narrating]
//!                            ├─ false → Failed("no audio produced")
//!                            └─ bytes → Audio             [Done]
//!
//! PipelineCommand::RegenerateAudio
//!   └─▶ story_to_audio → read back                       [Narrating]
//! ```
//!
//! Both model stages are blocking and run on `spawn_blocking`; one command
//! finishes before the next is received.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::caption::CaptionError;
use crate::narrate::NarrateError;
use crate::upload::{AudioScratch, StagedImage, UploadError};

use super::context::InferenceContext;
use super::state::{PipelineEvent, PipelineState};

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Why a command stopped early.  The `Display` text is what the UI shows.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The captioning stage failed.
    #[error("no caption produced: {0}")]
    Caption(#[from] CaptionError),

    /// The story stage degraded to an empty story.
    #[error("no story produced")]
    NoStory,

    /// The narrator returned `false`.
    #[error("no audio produced")]
    NoAudio,

    /// Staging the upload or reading the audio back failed.
    #[error("{0}")]
    Upload(#[from] UploadError),

    /// Internal / unexpected error (e.g. tokio join failure).
    #[error("internal error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Where an uploaded image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// A file picked or typed by the user.
    Path(PathBuf),
    /// Bytes dropped onto the window without a backing file.
    Bytes { bytes: Arc<[u8]>, suffix: String },
}

/// Commands sent from the UI thread to the orchestrator.
#[derive(Debug, Clone)]
pub enum PipelineCommand {
    /// Run all three stages on an image.
    Generate(ImageSource),
    /// Narrate an existing story again.
    RegenerateAudio { story: String },
}

// ---------------------------------------------------------------------------
// Stage helpers
// ---------------------------------------------------------------------------

async fn caption_stage(ctx: &Arc<InferenceContext>, image: &Path) -> Result<String, PipelineError> {
    let ctx = Arc::clone(ctx);
    let image = image.to_path_buf();
    tokio::task::spawn_blocking(move || ctx.image_to_text(&image))
        .await
        .map_err(|e| PipelineError::Internal(e.to_string()))?
        .map_err(PipelineError::from)
}

/// Returns the story, possibly empty.
async fn story_stage(ctx: &Arc<InferenceContext>, caption: &str) -> Result<String, PipelineError> {
    let ctx = Arc::clone(ctx);
    let caption = caption.to_string();
    tokio::task::spawn_blocking(move || ctx.text_to_story(&caption, None))
        .await
        .map_err(|e| PipelineError::Internal(e.to_string()))
}

async fn audio_stage(
    ctx: &InferenceContext,
    story: &str,
    output: &Path,
) -> Result<(), PipelineError> {
    match ctx.story_to_audio(story, output).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(PipelineError::NoAudio),
        Err(NarrateError::EmptyInput) => Err(PipelineError::NoStory),
        Err(e) => {
            log::error!("pipeline: narration failed: {e}");
            Err(PipelineError::NoAudio)
        }
    }
}

// ---------------------------------------------------------------------------
// Headless single run
// ---------------------------------------------------------------------------

/// Result of [`run_once`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub caption: String,
    /// Empty when the story stage degraded.
    pub story: String,
    /// `true` when `output` holds the narration.
    pub audio_written: bool,
}

/// Caption, write and narrate one image without any UI.
///
/// Only a captioning failure is an error: an empty story skips narration and
/// a failed narration leaves `audio_written == false`.
pub async fn run_once(
    ctx: &Arc<InferenceContext>,
    image: &Path,
    output: &Path,
) -> Result<RunReport, PipelineError> {
    let caption = caption_stage(ctx, image).await?;
    let story = story_stage(ctx, &caption).await?;

    let audio_written = if story.trim().is_empty() {
        log::warn!("pipeline: empty story, skipping narration");
        false
    } else {
        audio_stage(ctx, &story, output).await.is_ok()
    };

    Ok(RunReport {
        caption,
        story,
        audio_written,
    })
}

// ---------------------------------------------------------------------------
// PipelineOrchestrator
// ---------------------------------------------------------------------------

/// Drives the pipeline for the UI.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use image_to_story::pipeline::{InferenceContext, PipelineOrchestrator};
///
/// # async fn example(ctx: Arc<InferenceContext>) {
/// let (command_tx, command_rx) = mpsc::channel(16);
/// let (event_tx, mut event_rx) = mpsc::channel(32);
/// let orchestrator = PipelineOrchestrator::new(ctx, event_tx, "model_result.flac");
/// tokio::spawn(orchestrator.run(command_rx));
/// # drop(command_tx);
/// # while let Some(_event) = event_rx.recv().await {}
/// # }
/// ```
pub struct PipelineOrchestrator {
    ctx: Arc<InferenceContext>,
    events: mpsc::Sender<PipelineEvent>,
    audio_file_name: String,
}

impl PipelineOrchestrator {
    /// * `ctx`            : loaded models and narrator.
    /// * `events`         : progress and results for the UI.
    /// * `audio_file_name`: name of the narrator's scratch output file.
    pub fn new(
        ctx: Arc<InferenceContext>,
        events: mpsc::Sender<PipelineEvent>,
        audio_file_name: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            events,
            audio_file_name: audio_file_name.into(),
        }
    }

    /// Run until `commands` is closed.
    pub async fn run(self, mut commands: mpsc::Receiver<PipelineCommand>) {
        while let Some(command) = commands.recv().await {
            let result = match command {
                PipelineCommand::Generate(source) => self.handle_generate(source).await,
                PipelineCommand::RegenerateAudio { story } => self.handle_narrate(&story).await,
            };

            match result {
                Ok(()) => self.emit(PipelineEvent::Progress(PipelineState::Done)).await,
                Err(e) => {
                    log::error!("pipeline error: {e}");
                    self.emit(PipelineEvent::Failed(e.to_string())).await;
                }
            }
        }

        log::info!("pipeline: command channel closed, orchestrator shutting down");
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    async fn handle_generate(&self, source: ImageSource) -> Result<(), PipelineError> {
        self.emit(PipelineEvent::Progress(PipelineState::Captioning)).await;

        let staged = match source {
            ImageSource::Path(path) => StagedImage::from_path(&path),
            ImageSource::Bytes { bytes, suffix } => StagedImage::from_bytes(&bytes, &suffix),
        }
        .map_err(|e| match e {
            UploadError::Missing(path) => PipelineError::Caption(CaptionError::NotFound(path)),
            other => PipelineError::Upload(other),
        })?;

        let caption = caption_stage(&self.ctx, staged.path()).await?;
        self.emit(PipelineEvent::Caption(caption.clone())).await;

        self.emit(PipelineEvent::Progress(PipelineState::WritingStory)).await;
        let story = story_stage(&self.ctx, &caption).await?;
        if story.trim().is_empty() {
            return Err(PipelineError::NoStory);
        }
        self.emit(PipelineEvent::Story(story.clone())).await;

        self.handle_narrate(&story).await
    }

    async fn handle_narrate(&self, story: &str) -> Result<(), PipelineError> {
        self.emit(PipelineEvent::Progress(PipelineState::Narrating)).await;

        let scratch = AudioScratch::new(&self.audio_file_name)?;
        audio_stage(&self.ctx, story, &scratch.path()).await?;
        let audio = scratch.read_audio()?;
        log::debug!("pipeline: narration is {} bytes", audio.len());

        self.emit(PipelineEvent::Audio(audio)).await;
        Ok(())
    }

    async fn emit(&self, event: PipelineEvent) {
        if self.events.send(event).await.is_err() {
            log::debug!("pipeline: event receiver dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
