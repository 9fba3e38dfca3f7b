//! Pipeline module: the three stages and the orchestrator that chains them.
//!
//! # Architecture
//!
//! ```text
//! PipelineCommand (mpsc)
//!        │
//!        ▼
//! PipelineOrchestrator::run()  ← async tokio task
//!        │
//!        ├─ Generate
//!        │     ├─ StagedImage (temp file)
//!        │     ├─ spawn_blocking(image_to_text)   → Captioning
//!        │     ├─ spawn_blocking(text_to_story)   → WritingStory
//!        │     └─ story_to_audio → AudioScratch   → Narrating
//!        │
//!        └─ RegenerateAudio
//!              └─ story_to_audio → AudioScratch   → Narrating
//!
//! PipelineEvent (mpsc) ───▶ AppState::apply() in the egui update loop
//! ```
//!
//! The stages live on [`InferenceContext`], built once at startup:
//!
//! * [`InferenceContext::image_to_text`] raises on any failure.
//! * [`InferenceContext::text_to_story`] degrades to `""`.
//! * [`InferenceContext::story_to_audio`] degrades to `false`.

pub mod context;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use context::InferenceContext;
pub use runner::{
    run_once, ImageSource, PipelineCommand, PipelineError, PipelineOrchestrator, RunReport,
};
pub use state::{AppState, PipelineEvent, PipelineState};
