//! Pipeline state machine and the UI-side view of one session.
//!
//! [`PipelineState`] is what the orchestrator reports as it moves through the
//! stages.  [`AppState`] folds the orchestrator's [`PipelineEvent`]s into the
//! caption, story and audio the window displays.

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// Stages of an image-to-story run.
///
/// ```text
/// Idle ──Generate──▶ Captioning ──▶ WritingStory ──▶ Narrating ──▶ Done
/// Idle ──RegenerateAudio──────────────────────────▶ Narrating ──▶ Done
/// any stage ──failure──▶ Error
/// Done / Error ──next command──▶ Captioning | Narrating
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Nothing has run yet.
    #[default]
    Idle,
    /// The captioning model is looking at the image.
    Captioning,
    /// The story model is extending the caption.
    WritingStory,
    /// The remote endpoint is synthesizing speech.
    Narrating,
    /// The last command finished and its audio is available.
    Done,
    /// The last command stopped early; see the error message.
    Error,
}

impl PipelineState {
    /// `true` while a command is being processed.
    ///
    /// ```
    /// use image_to_story::pipeline::PipelineState;
    ///
    /// assert!(!PipelineState::Idle.is_busy());
    /// assert!(PipelineState::Captioning.is_busy());
    /// assert!(PipelineState::WritingStory.is_busy());
    /// assert!(PipelineState::Narrating.is_busy());
    /// assert!(!PipelineState::Done.is_busy());
    /// assert!(!PipelineState::Error.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelineState::Captioning | PipelineState::WritingStory | PipelineState::Narrating
        )
    }

    /// Short status line for the UI.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Ready",
            PipelineState::Captioning => "Captioning image...",
            PipelineState::WritingStory => "Writing story...",
            PipelineState::Narrating => "Generating audio...",
            PipelineState::Done => "Done",
            PipelineState::Error => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineEvent
// ---------------------------------------------------------------------------

/// Progress and results sent from the orchestrator to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A stage started, or the command finished (`Done`).
    Progress(PipelineState),
    /// The caption of the current image.
    Caption(String),
    /// The generated story.
    Story(String),
    /// Narration audio, read back from the scratch file.
    Audio(Vec<u8>),
    /// The command stopped; the message is shown verbatim.
    Failed(String),
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Everything the window shows about the current session.
#[derive(Debug, Default)]
pub struct AppState {
    pub pipeline: PipelineState,
    pub caption: Option<String>,
    pub story: Option<String>,
    /// In-memory narration; its temp file is already gone.
    pub audio: Option<Vec<u8>>,
    pub error_message: Option<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one orchestrator event into the view.
    pub fn apply(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Progress(PipelineState::Captioning) => {
                // A new image: drop everything from the previous run.
                self.caption = None;
                self.story = None;
                self.audio = None;
                self.error_message = None;
                self.pipeline = PipelineState::Captioning;
            }
            PipelineEvent::Progress(PipelineState::Narrating) => {
                self.audio = None;
                self.error_message = None;
                self.pipeline = PipelineState::Narrating;
            }
            PipelineEvent::Progress(state) => self.pipeline = state,
            PipelineEvent::Caption(caption) => self.caption = Some(caption),
            PipelineEvent::Story(story) => self.story = Some(story),
            PipelineEvent::Audio(audio) => self.audio = Some(audio),
            PipelineEvent::Failed(message) => {
                self.pipeline = PipelineState::Error;
                self.error_message = Some(message);
            }
        }
    }

    /// A non-empty story exists and nothing is running.
    pub fn can_regenerate_audio(&self) -> bool {
        !self.pipeline.is_busy()
            && self
                .story
                .as_deref()
                .is_some_and(|story| !story.trim().is_empty())
    }

    pub fn can_download(&self) -> bool {
        !self.pipeline.is_busy() && self.audio.as_ref().is_some_and(|a| !a.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- PipelineState ---

    #[test]
    fn only_running_stages_are_busy() {
        let busy: Vec<_> = [
            PipelineState::Idle,
            PipelineState::Captioning,
            PipelineState::WritingStory,
            PipelineState::Narrating,
            PipelineState::Done,
            PipelineState::Error,
        ]
        .into_iter()
        .filter(PipelineState::is_busy)
        .collect();
        assert_eq!(
            busy,
            vec![
                PipelineState::Captioning,
                PipelineState::WritingStory,
                PipelineState::Narrating
            ]
        );
    }

    #[test]
    fn default_state_is_idle() {
        assert_eq!(PipelineState::default(), PipelineState::Idle);
        assert_eq!(PipelineState::Idle.label(), "Ready");
    }

    // ---- AppState::apply ---

    fn finished_run() -> AppState {
        let mut state = AppState::new();
        for event in [
            PipelineEvent::Progress(PipelineState::Captioning),
            PipelineEvent::Caption("a forest with tall trees".into()),
            PipelineEvent::Progress(PipelineState::WritingStory),
            PipelineEvent::Story("a forest with tall trees and a fox.".into()),
            PipelineEvent::Progress(PipelineState::Narrating),
            PipelineEvent::Audio(b"fLaC".to_vec()),
            PipelineEvent::Progress(PipelineState::Done),
        ] {
            state.apply(event);
        }
        state
    }

    #[test]
    fn full_run_populates_every_field() {
        let state = finished_run();
        assert_eq!(state.pipeline, PipelineState::Done);
        assert_eq!(state.caption.as_deref(), Some("a forest with tall trees"));
        assert!(state.story.is_some());
        assert_eq!(state.audio.as_deref(), Some(&b"fLaC"[..]));
        assert!(state.can_regenerate_audio());
        assert!(state.can_download());
    }

    #[test]
    fn new_generate_clears_previous_results() {
        let mut state = finished_run();
        state.apply(PipelineEvent::Progress(PipelineState::Captioning));
        assert!(state.caption.is_none());
        assert!(state.story.is_none());
        assert!(state.audio.is_none());
        assert!(!state.can_download());
    }

    #[test]
    fn regenerate_keeps_story_but_drops_audio() {
        let mut state = finished_run();
        state.apply(PipelineEvent::Progress(PipelineState::Narrating));
        assert!(state.story.is_some());
        assert!(state.audio.is_none());
        assert!(!state.can_regenerate_audio());
    }

    #[test]
    fn failure_sets_error_message() {
        let mut state = AppState::new();
        state.apply(PipelineEvent::Progress(PipelineState::Captioning));
        state.apply(PipelineEvent::Failed("no caption produced".into()));
        assert_eq!(state.pipeline, PipelineState::Error);
        assert_eq!(state.error_message.as_deref(), Some("no caption produced"));
        assert!(!state.can_regenerate_audio());
    }

    #[test]
    fn blank_story_cannot_be_regenerated() {
        let mut state = AppState::new();
        state.apply(PipelineEvent::Story("  ".into()));
        assert!(!state.can_regenerate_audio());
    }
}
