//! Application entry point: image to caption to story to narration.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load `.env` into the process environment.
//! 3. Parse the command line.
//! 4. Load [`AppConfig`] from disk (returns default on first run).
//! 5. Resolve the speech-synthesis [`Credential`]; a missing token stops here,
//!    before any model is downloaded.
//! 6. Build [`InferenceContext`] (downloads or reuses cached weights).
//! 7. Create [`tokio`] runtime.
//! 8. With `--image`: run the pipeline once, print the caption and story,
//!    write the audio to `--output`, exit.
//! 9. Otherwise spawn the [`PipelineOrchestrator`] and run
//!    [`eframe::run_native`] until the window is closed.
//! 10. Join the orchestrator and shut the context down.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use clap::Parser;
use eframe::egui;
use tokio::sync::mpsc;

use image_to_story::{
    app::StoryApp,
    config::{AppConfig, AppPaths, Credential},
    pipeline::{run_once, InferenceContext, PipelineCommand, PipelineEvent, PipelineOrchestrator},
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "image-to-story", version, about = "Turn an image into a narrated short story")]
struct Cli {
    /// Run once on this image without opening a window.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Where headless mode writes the narration.
    #[arg(long, requires = "image")]
    output: Option<PathBuf>,

    /// Read settings from this file instead of the platform config dir.
    #[arg(long)]
    config: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (width, height) = config.ui.window_size;
    let vp = egui::ViewportBuilder::default()
        .with_title("Image to Story")
        .with_inner_size([width, height])
        .with_min_inner_size([420.0, 360.0])
        .with_drag_and_drop(true);

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

fn run_headless(
    rt: &tokio::runtime::Runtime,
    ctx: &Arc<InferenceContext>,
    image: PathBuf,
    output: PathBuf,
) -> anyhow::Result<()> {
    let report = rt
        .block_on(run_once(ctx, &image, &output))
        .with_context(|| format!("processing {}", image.display()))?;

    println!("Caption: {}", report.caption);
    println!("Story: {}", report.story);
    if report.audio_written {
        println!("Audio saved to {}", output.display());
    } else if report.story.trim().is_empty() {
        println!("No story produced; audio skipped");
    } else {
        println!("No audio produced");
    }
    Ok(())
}

fn run_gui(
    rt: &tokio::runtime::Runtime,
    ctx: &Arc<InferenceContext>,
    config: AppConfig,
    paths: &AppPaths,
) -> anyhow::Result<()> {
    let (command_tx, command_rx) = mpsc::channel::<PipelineCommand>(16);
    let (event_tx, event_rx) = mpsc::channel::<PipelineEvent>(32);

    let orchestrator =
        PipelineOrchestrator::new(Arc::clone(ctx), event_tx, config.narrator.output_file.clone());
    let pipeline_task = rt.spawn(orchestrator.run(command_rx));

    let options = native_options(&config);
    let app = StoryApp::new(command_tx, event_rx, config, paths.download_dir.clone());
    let ui_result = eframe::run_native(
        "Image to Story",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    );

    // The app (and its command sender) is gone; the orchestrator drains and exits.
    if let Err(e) = rt.block_on(pipeline_task) {
        log::warn!("pipeline task ended abnormally: {e}");
    }

    ui_result.map_err(|e| anyhow!("window error: {e}"))
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("image-to-story starting up");

    // 2. .env
    if let Ok(path) = dotenvy::dotenv() {
        log::debug!("loaded environment from {}", path.display());
    }

    // 3. CLI
    let cli = Cli::parse();

    // 4. Configuration
    let paths = AppPaths::new();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };

    // 5. Credential (before any model load)
    let credential = Credential::resolve(&config.narrator)?;

    // 6. Models
    let ctx = Arc::new(InferenceContext::load(&config, credential, &paths)?);

    // 7. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 8./9. Headless or windowed
    let result = match cli.image {
        Some(image) => {
            let output = cli
                .output
                .unwrap_or_else(|| PathBuf::from(&config.narrator.output_file));
            run_headless(&rt, &ctx, image, output)
        }
        None => run_gui(&rt, &ctx, config, &paths),
    };

    // 10. Teardown
    drop(rt);
    match Arc::try_unwrap(ctx) {
        Ok(ctx) => ctx.shutdown(),
        Err(_) => log::warn!("inference context still shared at exit"),
    }

    result
}
