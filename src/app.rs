//! Image-to-story window: egui/eframe application.
//!
//! # Architecture
//!
//! [`StoryApp`] is the top-level [`eframe::App`].  It owns the UI-side
//! [`AppState`] and two channel endpoints:
//!
//! * `command_tx`: sends [`PipelineCommand`] to the pipeline orchestrator.
//! * `event_rx`  : receives [`PipelineEvent`] progress and results.
//!
//! # Layout
//!
//! | Section | Content |
//! |---------|---------|
//! | Upload  | image path field, drop zone, "Generate Story", preview |
//! | Status  | spinner + stage label, or the error message |
//! | Caption | caption of the last image |
//! | Story   | generated story, "Regenerate Audio Only" |
//! | Audio   | narration size, "Download Audio" |

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::pipeline::{AppState, ImageSource, PipelineCommand, PipelineEvent, PipelineState};
use crate::upload;

const ERROR_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 136, 68);
const OK_COLOR: egui::Color32 = egui::Color32::from_rgb(80, 200, 120);
const HINT_COLOR: egui::Color32 = egui::Color32::from_rgb(140, 140, 140);
const PREVIEW_MAX_SIDE: u32 = 512;

// ---------------------------------------------------------------------------
// StoryApp
// ---------------------------------------------------------------------------

/// eframe application: the single image-to-story window.
pub struct StoryApp {
    // ── Session ──────────────────────────────────────────────────────────
    state: AppState,
    /// Contents of the image path field.
    image_input: String,
    /// Result of the last "Download Audio" click.
    notice: Option<Result<String, String>>,
    /// Image sent with the last "Generate", decoded on the next frame.
    pending_preview: Option<ImageSource>,
    preview: Option<egui::TextureHandle>,

    // ── Channels ─────────────────────────────────────────────────────────
    command_tx: mpsc::Sender<PipelineCommand>,
    event_rx: mpsc::Receiver<PipelineEvent>,

    // ── Configuration ────────────────────────────────────────────────────
    config: AppConfig,
    download_dir: PathBuf,
}

impl StoryApp {
    /// * `command_tx`  : sender end of the pipeline command channel.
    /// * `event_rx`    : receiver end of the pipeline event channel.
    /// * `config`      : loaded application configuration.
    /// * `download_dir`: where "Download Audio" writes.
    pub fn new(
        command_tx: mpsc::Sender<PipelineCommand>,
        event_rx: mpsc::Receiver<PipelineEvent>,
        config: AppConfig,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            state: AppState::new(),
            image_input: String::new(),
            notice: None,
            pending_preview: None,
            preview: None,
            command_tx,
            event_rx,
            config,
            download_dir,
        }
    }

    // ── Channel polling ──────────────────────────────────────────────────

    /// Drain all pending pipeline events (non-blocking).
    fn poll_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            if let PipelineEvent::Progress(PipelineState::Captioning | PipelineState::Narrating) =
                event
            {
                self.notice = None;
            }
            self.state.apply(event);
        }
    }

    /// Hand `command` to the orchestrator and enter its first busy stage
    /// immediately, so the repaint loop runs until the pipeline reports back.
    fn send(&mut self, command: PipelineCommand) {
        let (first_stage, preview) = match &command {
            PipelineCommand::Generate(source) => (PipelineState::Captioning, Some(source.clone())),
            PipelineCommand::RegenerateAudio { .. } => (PipelineState::Narrating, None),
        };
        match self.command_tx.try_send(command) {
            Ok(()) => {
                self.notice = None;
                if preview.is_some() {
                    self.pending_preview = preview;
                }
                self.state.apply(PipelineEvent::Progress(first_stage));
            }
            Err(e) => {
                log::error!("ui: cannot reach pipeline: {e}");
                self.state
                    .apply(PipelineEvent::Failed("pipeline is not running".into()));
            }
        }
    }

    // ── Actions ──────────────────────────────────────────────────────────

    fn generate_from_input(&mut self) {
        match parse_path_input(&self.image_input) {
            Some(path) => self.send(PipelineCommand::Generate(ImageSource::Path(path))),
            None => self
                .state
                .apply(PipelineEvent::Failed("choose an image first".into())),
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        let Some(source) = dropped.iter().find_map(image_source_from_drop) else {
            return;
        };
        if self.state.pipeline.is_busy() {
            log::warn!("ui: ignoring drop while the pipeline is busy");
            return;
        }
        if let ImageSource::Path(path) = &source {
            self.image_input = path.display().to_string();
        }
        self.send(PipelineCommand::Generate(source));
    }

    fn regenerate_audio(&mut self) {
        if let Some(story) = self.state.story.clone() {
            self.send(PipelineCommand::RegenerateAudio { story });
        }
    }

    fn download_audio(&mut self) {
        let Some(audio) = self.state.audio.as_deref() else {
            return;
        };
        self.notice = Some(
            upload::export_audio(audio, &self.download_dir, &self.config.ui.download_file_name)
                .map(|path| format!("Saved to {}", path.display()))
                .map_err(|e| e.to_string()),
        );
    }

    // ── Section renderers ────────────────────────────────────────────────

    fn draw_upload(&mut self, ui: &mut egui::Ui) {
        ui.heading("Image to Story");
        ui.label(
            egui::RichText::new("Type an image path or drop an image onto the window.")
                .color(HINT_COLOR),
        );
        ui.add_space(4.0);

        let busy = self.state.pipeline.is_busy();
        ui.horizontal(|ui| {
            let field = ui.add_enabled(
                !busy,
                egui::TextEdit::singleline(&mut self.image_input)
                    .hint_text("path/to/image.jpg")
                    .desired_width(ui.available_width() - 130.0),
            );
            let submitted = field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            let clicked = ui
                .add_enabled(!busy, egui::Button::new("Generate Story"))
                .clicked();
            if submitted || clicked {
                self.generate_from_input();
            }
        });
    }

    fn refresh_preview(&mut self, ctx: &egui::Context) {
        let Some(source) = self.pending_preview.take() else {
            return;
        };
        self.preview = decode_preview(&source)
            .map(|image| ctx.load_texture("image-preview", image, egui::TextureOptions::LINEAR));
    }

    fn draw_preview(&self, ui: &mut egui::Ui) {
        if let Some(texture) = &self.preview {
            ui.add_space(4.0);
            ui.add(
                egui::Image::from_texture(egui::load::SizedTexture::from_handle(texture))
                    .max_height(240.0),
            );
        }
    }

    fn draw_status(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| match self.state.pipeline {
            state if state.is_busy() => {
                ui.add(egui::Spinner::new());
                ui.label(state.label());
            }
            PipelineState::Error => {
                let message = self.state.error_message.as_deref().unwrap_or("unknown error");
                ui.label(egui::RichText::new(message).color(ERROR_COLOR));
            }
            PipelineState::Done => {
                ui.label(egui::RichText::new("Done").color(OK_COLOR));
            }
            PipelineState::Idle => {
                ui.label(egui::RichText::new(PipelineState::Idle.label()).color(HINT_COLOR));
            }
            _ => {}
        });
    }

    fn draw_results(&mut self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Caption").strong());
        match self.state.caption.as_deref() {
            Some(caption) => ui.label(caption),
            None => ui.label(egui::RichText::new("(none yet)").color(HINT_COLOR)),
        };

        ui.add_space(8.0);
        ui.label(egui::RichText::new("Story").strong());
        let story = self.state.story.clone().unwrap_or_default();
        egui::ScrollArea::vertical()
            .max_height(260.0)
            .show(ui, |ui| {
                ui.add(
                    egui::TextEdit::multiline(&mut story.as_str())
                        .desired_width(f32::INFINITY)
                        .desired_rows(8),
                );
            });

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui
                .add_enabled(
                    self.state.can_regenerate_audio(),
                    egui::Button::new("Regenerate Audio Only"),
                )
                .clicked()
            {
                self.regenerate_audio();
            }
            if ui
                .add_enabled(self.state.can_download(), egui::Button::new("Download Audio"))
                .clicked()
            {
                self.download_audio();
            }
            if let Some(audio) = self.state.audio.as_ref() {
                ui.label(
                    egui::RichText::new(format!("audio ready ({})", format_size(audio.len())))
                        .color(OK_COLOR),
                );
            }
        });

        match &self.notice {
            Some(Ok(msg)) => {
                ui.label(egui::RichText::new(msg).color(OK_COLOR));
            }
            Some(Err(msg)) => {
                ui.label(egui::RichText::new(msg).color(ERROR_COLOR));
            }
            None => {}
        }
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for StoryApp {
    /// Called every frame by eframe.  Polls the event channel, then renders.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_events();
        self.handle_dropped_files(ctx);
        self.refresh_preview(ctx);

        // Keep polling while the orchestrator is working.
        if self.state.pipeline.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_upload(ui);
            self.draw_preview(ui);
            ui.separator();
            self.draw_status(ui);
            ui.separator();
            self.draw_results(ui);
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("image-to-story window closing");
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Trim the path field and strip one pair of surrounding quotes, as left by
/// "copy as path" in most file managers.
pub fn parse_path_input(input: &str) -> Option<PathBuf> {
    let trimmed = input.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(trimmed);
    if unquoted.is_empty() {
        None
    } else {
        Some(PathBuf::from(unquoted))
    }
}

/// Turn a dropped file into an [`ImageSource`].
///
/// Native drops carry a path; web-style drops only carry bytes and a name.
pub fn image_source_from_drop(file: &egui::DroppedFile) -> Option<ImageSource> {
    if let Some(path) = &file.path {
        return Some(ImageSource::Path(path.clone()));
    }
    let bytes: Arc<[u8]> = file.bytes.clone()?;
    let suffix = Path::new(&file.name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".jpg".to_string());
    Some(ImageSource::Bytes { bytes, suffix })
}

/// Decode `source` into a thumbnail for the upload section.  Undecodable
/// images get no preview; the caption stage reports the real error.
fn decode_preview(source: &ImageSource) -> Option<egui::ColorImage> {
    let decoded = match source {
        ImageSource::Path(path) => image::open(path),
        ImageSource::Bytes { bytes, .. } => image::load_from_memory(bytes),
    };
    let image = match decoded {
        Ok(image) => image,
        Err(e) => {
            log::warn!("ui: no preview: {e}");
            return None;
        }
    };
    let rgba = image.thumbnail(PREVIEW_MAX_SIDE, PREVIEW_MAX_SIDE).to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Some(egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}

fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_app() -> (
        StoryApp,
        mpsc::Receiver<PipelineCommand>,
        mpsc::Sender<PipelineEvent>,
        tempfile::TempDir,
    ) {
        let (command_tx, command_rx) = mpsc::channel(4);
        let (event_tx, event_rx) = mpsc::channel(16);
        let downloads = tempfile::tempdir().unwrap();
        let app = StoryApp::new(
            command_tx,
            event_rx,
            AppConfig::default(),
            downloads.path().to_path_buf(),
        );
        (app, command_rx, event_tx, downloads)
    }

    #[test]
    fn path_input_is_trimmed_and_unquoted() {
        assert_eq!(
            parse_path_input("  \"/tmp/forest.jpg\" "),
            Some(PathBuf::from("/tmp/forest.jpg"))
        );
        assert_eq!(
            parse_path_input("'/tmp/a b.png'"),
            Some(PathBuf::from("/tmp/a b.png"))
        );
        assert_eq!(parse_path_input("   "), None);
        assert_eq!(parse_path_input("\"\""), None);
    }

    #[test]
    fn dropped_path_wins_over_bytes() {
        let file = egui::DroppedFile {
            path: Some(PathBuf::from("/tmp/forest.jpg")),
            bytes: Some(Arc::from(&b"xx"[..])),
            ..Default::default()
        };
        assert!(matches!(
            image_source_from_drop(&file),
            Some(ImageSource::Path(p)) if p == Path::new("/tmp/forest.jpg")
        ));
    }

    #[test]
    fn dropped_bytes_keep_their_extension() {
        let file = egui::DroppedFile {
            name: "cat.png".into(),
            bytes: Some(Arc::from(&b"png"[..])),
            ..Default::default()
        };
        match image_source_from_drop(&file) {
            Some(ImageSource::Bytes { bytes, suffix }) => {
                assert_eq!(&*bytes, b"png");
                assert_eq!(suffix, ".png");
            }
            other => panic!("expected bytes, got {other:?}"),
        }
    }

    #[test]
    fn empty_drop_is_ignored() {
        assert!(image_source_from_drop(&egui::DroppedFile::default()).is_none());
    }

    #[test]
    fn generate_sends_path_command() {
        let (mut app, mut command_rx, _event_tx, _downloads) = make_app();
        app.image_input = " /tmp/forest.jpg ".into();

        app.generate_from_input();

        match command_rx.try_recv() {
            Ok(PipelineCommand::Generate(ImageSource::Path(p))) => {
                assert_eq!(p, PathBuf::from("/tmp/forest.jpg"))
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn sent_generate_is_busy_before_first_event() {
        let (mut app, mut command_rx, _event_tx, _downloads) = make_app();
        app.image_input = "/tmp/forest.jpg".into();

        app.generate_from_input();

        assert!(command_rx.try_recv().is_ok());
        assert_eq!(app.state.pipeline, PipelineState::Captioning);
        assert!(app.state.pipeline.is_busy());
    }

    #[test]
    fn sent_regenerate_is_busy_and_quick_failure_lands() {
        let (mut app, mut command_rx, event_tx, _downloads) = make_app();
        app.state
            .apply(PipelineEvent::Story("The fox woke up.".into()));
        app.state.apply(PipelineEvent::Audio(b"old".to_vec()));

        app.regenerate_audio();

        assert!(command_rx.try_recv().is_ok());
        assert_eq!(app.state.pipeline, PipelineState::Narrating);
        assert!(app.state.audio.is_none());
        assert!(!app.state.can_regenerate_audio());

        event_tx
            .try_send(PipelineEvent::Failed("no audio produced".into()))
            .unwrap();
        app.poll_events();

        assert_eq!(app.state.pipeline, PipelineState::Error);
        assert_eq!(app.state.error_message.as_deref(), Some("no audio produced"));
    }

    #[test]
    fn generate_without_path_shows_error() {
        let (mut app, mut command_rx, _event_tx, _downloads) = make_app();

        app.generate_from_input();

        assert!(command_rx.try_recv().is_err());
        assert_eq!(app.state.pipeline, PipelineState::Error);
    }

    #[test]
    fn events_flow_into_state_and_download_writes_file() {
        let (mut app, _command_rx, event_tx, downloads) = make_app();
        for event in [
            PipelineEvent::Progress(PipelineState::Captioning),
            PipelineEvent::Caption("a forest with tall trees".into()),
            PipelineEvent::Story("a forest with tall trees and a fox.".into()),
            PipelineEvent::Audio(b"fLaC".to_vec()),
            PipelineEvent::Progress(PipelineState::Done),
        ] {
            event_tx.try_send(event).unwrap();
        }

        app.poll_events();
        app.download_audio();

        let saved = downloads.path().join("story_narration.flac");
        assert_eq!(std::fs::read(saved).unwrap(), b"fLaC");
        assert!(matches!(app.notice, Some(Ok(_))));
    }

    #[test]
    fn regenerate_sends_current_story() {
        let (mut app, mut command_rx, _event_tx, _downloads) = make_app();
        app.state
            .apply(PipelineEvent::Story("The fox woke up.".into()));

        app.regenerate_audio();

        match command_rx.try_recv() {
            Ok(PipelineCommand::RegenerateAudio { story }) => assert_eq!(story, "The fox woke up."),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn closed_pipeline_surfaces_as_error() {
        let (mut app, command_rx, _event_tx, _downloads) = make_app();
        drop(command_rx);
        app.image_input = "/tmp/forest.jpg".into();

        app.generate_from_input();

        assert_eq!(
            app.state.error_message.as_deref(),
            Some("pipeline is not running")
        );
    }

    #[test]
    fn generate_queues_preview_of_the_sent_image() {
        let (mut app, _command_rx, _event_tx, _downloads) = make_app();
        app.image_input = "/tmp/forest.jpg".into();

        app.generate_from_input();

        assert!(matches!(
            &app.pending_preview,
            Some(ImageSource::Path(p)) if p == Path::new("/tmp/forest.jpg")
        ));
    }

    #[test]
    fn preview_is_a_bounded_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        image::RgbImage::from_pixel(1024, 256, image::Rgb([10, 200, 30]))
            .save(&path)
            .unwrap();

        let preview = decode_preview(&ImageSource::Path(path)).unwrap();

        assert_eq!(preview.size, [512, 128]);
    }

    #[test]
    fn undecodable_image_has_no_preview() {
        let source = ImageSource::Bytes {
            bytes: Arc::from(&b"not an image"[..]),
            suffix: ".jpg".into(),
        };
        assert!(decode_preview(&source).is_none());
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
