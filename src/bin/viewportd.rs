//! viewportd - motion-following viewport renderer
//!
//! This binary:
//! 1. Loads pipeline settings (file, then environment overrides)
//! 2. Opens an image-sequence directory, a video file or a `stub://` scene
//! 3. Runs the source → detector → tracker → renderer pipeline
//! 4. Writes annotated frames, viewport crops and a JSONL trace

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use viewport_tracker::ui::{self, Progress};
use viewport_tracker::{
    FrameRenderer, FrameSource, Pipeline, PipelineConfig, SourceConfig, ViewportRecord,
    ViewportSink,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Track motion in a frame stream with a smoothed viewport"
)]
struct Args {
    /// Image-sequence directory, video file (with the ingest-file-ffmpeg
    /// feature), or stub://<name> for a synthetic scene.
    #[arg(long)]
    input: String,

    /// Directory for rendered frames, viewport crops and the trace.
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Pipeline settings (TOML, or JSON when the name ends in .json).
    #[arg(long, env = "VIEWPORT_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Native frame rate of the input. A video file's own rate wins.
    #[arg(long, default_value_t = 30.0)]
    source_fps: f64,

    /// Length of a synthetic scene, in source frames.
    #[arg(long)]
    frames: Option<u64>,

    /// UI mode for stderr progress (auto|plain|pretty).
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

/// Forwards to the renderer and ticks the spinner.
struct ProgressSink<S> {
    inner: S,
    progress: Progress,
}

impl<S: ViewportSink> ViewportSink for ProgressSink<S> {
    fn accept(&mut self, record: ViewportRecord) -> Result<()> {
        let frame_id = record.frame_id;
        self.inner.accept(record)?;
        self.progress.frame_done(frame_id);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.finish()
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let cfg = {
        let _stage = ui.stage("Load configuration");
        PipelineConfig::load(Some(&args.config))
    };
    log::info!("configuration: {}", cfg);

    let mut source_cfg = SourceConfig::from_pipeline(&args.input, &cfg);
    source_cfg.source_fps = args.source_fps;
    if let Some(frames) = args.frames {
        source_cfg.synthetic_frames = frames;
    }
    let source = FrameSource::new(source_cfg)
        .with_context(|| format!("failed to open input {}", args.input))?;
    let renderer = FrameRenderer::create(&args.output)?;

    let pipeline = Pipeline::new(cfg);
    let shutdown = pipeline.shutdown_flag();
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    let report = {
        let stage = ui.stage("Track viewport");
        let sink = ProgressSink {
            inner: renderer,
            progress: stage.progress(),
        };
        pipeline.run(source, sink)?
    };

    log::info!(
        "viewportd done: {} frames read, {} detections, {} viewports, {} rendered to {}",
        report.frames_read,
        report.detections,
        report.viewports,
        report.rendered,
        args.output.display()
    );
    log::info!(
        "renderer wrote {} frame pairs",
        report.sink.inner.rendered()
    );
    Ok(())
}
