//! Frame sources.
//!
//! `FrameSource` produces the stream of `FrameRecord`s that enters the
//! pipeline. It is responsible for:
//! - Reading frames from an image-sequence directory or a local video file
//!   (feature: ingest-file-ffmpeg), or synthesizing a deterministic test
//!   scene for `stub://` locations
//! - Decimating from the source rate to the target rate
//! - Resizing every emitted frame to the configured processing size
//! - Assigning frame ids and timestamps
//!
//! The source MUST NOT fetch remote URLs.

use anyhow::{anyhow, bail, Context, Result};
use image::{imageops, Rgb, RgbImage};
use std::path::{Path, PathBuf};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::video::VideoFile;
use crate::config::PipelineConfig;
use crate::frame::{FrameRecord, Size};

/// Source rate assumed when the configured one is unusable.
const FALLBACK_SOURCE_FPS: f64 = 30.0;
const DEFAULT_SYNTHETIC_FRAMES: u64 = 60;
const SEQUENCE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Configuration for a frame source.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Local directory of still images, a local video file, or
    /// `stub://<name>` for the synthetic scene.
    pub location: String,
    /// Native rate of the source, frames per second. A video container's
    /// own rate replaces it.
    pub source_fps: f64,
    /// Rate the pipeline processes at. The source decimates to it.
    pub target_fps: u32,
    /// Every emitted frame is resized to this.
    pub frame_size: Size,
    /// Length of the synthetic scene, in source frames.
    pub synthetic_frames: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            location: String::new(),
            source_fps: FALLBACK_SOURCE_FPS,
            target_fps: 5,
            frame_size: Size::new(1280, 720),
            synthetic_frames: DEFAULT_SYNTHETIC_FRAMES,
        }
    }
}

impl SourceConfig {
    pub fn from_pipeline(location: &str, cfg: &PipelineConfig) -> Self {
        Self {
            location: location.to_string(),
            target_fps: cfg.target_fps,
            frame_size: cfg.frame_size(),
            ..Self::default()
        }
    }

    /// Keep every `interval`-th source frame.
    pub fn frame_interval(&self) -> u64 {
        let ratio = self.effective_source_fps() / self.target_fps.max(1) as f64;
        (ratio.round() as u64).max(1)
    }

    fn effective_source_fps(&self) -> f64 {
        if self.source_fps.is_finite() && self.source_fps > 0.0 {
            self.source_fps
        } else {
            FALLBACK_SOURCE_FPS
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceStats {
    pub frames_emitted: u64,
    pub location: String,
}

/// Decimating, resizing frame source.
pub struct FrameSource {
    config: SourceConfig,
    backend: SourceBackend,
    interval: u64,
    next_index: u64,
    frames_emitted: u64,
}

enum SourceBackend {
    Synthetic(SyntheticScene),
    Sequence(ImageSequence),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Video(VideoFile),
}

impl SourceBackend {
    fn open_local(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self::Sequence(ImageSequence::open(path)?));
        }
        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self::Video(VideoFile::open(path)?))
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!(
                "video file input requires the ingest-file-ffmpeg feature (got '{}')",
                path.display()
            ))
        }
    }

    /// Rate declared by the input itself.
    fn native_fps(&self) -> Option<f64> {
        match self {
            Self::Synthetic(_) | Self::Sequence(_) => None,
            #[cfg(feature = "ingest-file-ffmpeg")]
            Self::Video(video) => video.fps(),
        }
    }
}

/// The input's declared rate wins over the configured one when usable.
fn resolve_source_fps(configured: f64, native: Option<f64>) -> f64 {
    match native {
        Some(fps) if fps.is_finite() && fps > 0.0 => {
            if (fps - configured).abs() > f64::EPSILON {
                log::info!(
                    "FrameSource: using input rate {:.2} fps instead of {:.2}",
                    fps,
                    configured
                );
            }
            fps
        }
        _ => configured,
    }
}

impl FrameSource {
    pub fn new(mut config: SourceConfig) -> Result<Self> {
        if config.frame_size.is_empty() {
            bail!(
                "frame size must be non-zero (got {}x{})",
                config.frame_size.width,
                config.frame_size.height
            );
        }
        let backend = if let Some(name) = config.location.strip_prefix("stub://") {
            log::info!("FrameSource: synthetic scene '{}'", name);
            SourceBackend::Synthetic(SyntheticScene::new(
                config.frame_size,
                config.synthetic_frames,
            ))
        } else if config.location.contains("://") {
            bail!(
                "frame source only supports local paths and stub:// (got '{}')",
                config.location
            );
        } else {
            SourceBackend::open_local(Path::new(&config.location))?
        };
        config.source_fps = resolve_source_fps(config.source_fps, backend.native_fps());
        let interval = config.frame_interval();
        log::info!(
            "FrameSource: {} source_fps={:.2}, target_fps={}, interval={}",
            config.location,
            config.effective_source_fps(),
            config.target_fps,
            interval
        );
        Ok(Self {
            config,
            backend,
            interval,
            next_index: 0,
            frames_emitted: 0,
        })
    }

    /// Next decimated, resized frame; `None` once the source is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<FrameRecord>> {
        let index = self.next_index;
        let raw = match &mut self.backend {
            SourceBackend::Synthetic(scene) => scene.frame_at(index),
            SourceBackend::Sequence(sequence) => sequence.frame_at(index)?,
            #[cfg(feature = "ingest-file-ffmpeg")]
            SourceBackend::Video(video) => video.frame_at(index)?,
        };
        let Some(raw) = raw else {
            return Ok(None);
        };
        self.next_index += self.interval;
        self.frames_emitted += 1;

        let Size { width, height } = self.config.frame_size;
        let pixels = if raw.dimensions() == (width, height) {
            raw
        } else {
            imageops::resize(&raw, width, height, imageops::FilterType::Triangle)
        };
        let timestamp = index as f64 / self.config.effective_source_fps();
        Ok(Some(FrameRecord::new(index, pixels, timestamp)))
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_emitted: self.frames_emitted,
            location: self.config.location.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Image sequence: a directory of still frames in filename order
// ----------------------------------------------------------------------------

struct ImageSequence {
    paths: Vec<PathBuf>,
}

impl ImageSequence {
    fn open(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("failed to open frame directory {}", dir.display()))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && has_frame_extension(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(anyhow!("no png/jpg frames found in {}", dir.display()));
        }
        paths.sort();
        log::info!("FrameSource: {} frames in {}", paths.len(), dir.display());
        Ok(Self { paths })
    }

    fn frame_at(&self, index: u64) -> Result<Option<RgbImage>> {
        let Some(path) = usize::try_from(index).ok().and_then(|i| self.paths.get(i)) else {
            return Ok(None);
        };
        let image = image::open(path)
            .with_context(|| format!("failed to decode frame {}", path.display()))?;
        Ok(Some(image.into_rgb8()))
    }
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SEQUENCE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

// ----------------------------------------------------------------------------
// Synthetic scene (stub://) for tests and demos
// ----------------------------------------------------------------------------

/// A bright square sweeping back and forth across a dark background.
struct SyntheticScene {
    size: Size,
    frames: u64,
}

impl SyntheticScene {
    const BACKGROUND: Rgb<u8> = Rgb([16, 16, 16]);
    const FOREGROUND: Rgb<u8> = Rgb([235, 235, 235]);

    fn new(size: Size, frames: u64) -> Self {
        Self { size, frames }
    }

    fn square_side(&self) -> u32 {
        (self.size.width.min(self.size.height) / 8).max(1)
    }

    /// Top-left corner of the square in frame `index`.
    fn square_origin(&self, index: u64) -> (u32, u32) {
        let side = self.square_side();
        let travel = self.size.width.saturating_sub(side) as u64;
        let speed = (self.size.width as u64 / 40).max(1);
        let x = if travel == 0 {
            0
        } else {
            let phase = (index * speed) % (2 * travel);
            if phase <= travel {
                phase
            } else {
                2 * travel - phase
            }
        };
        (x as u32, self.size.height / 3)
    }

    fn frame_at(&self, index: u64) -> Option<RgbImage> {
        if index >= self.frames {
            return None;
        }
        let side = self.square_side();
        let (sx, sy) = self.square_origin(index);
        let mut img = RgbImage::from_pixel(self.size.width, self.size.height, Self::BACKGROUND);
        for y in sy..(sy + side).min(self.size.height) {
            for x in sx..(sx + side).min(self.size.width) {
                img.put_pixel(x, y, Self::FOREGROUND);
            }
        }
        Some(img)
    }
}
