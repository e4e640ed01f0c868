use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::detect::DetectionSettings;
use crate::frame::Size;
use crate::viewport::TrackerSettings;

const DEFAULT_QUEUE_MAX_SIZE: usize = 100;
const DEFAULT_QUEUE_TIMEOUT_SECS: f64 = 5.0;
const DEFAULT_DETECTION_THRESHOLD: f64 = 25.0;
const DEFAULT_MIN_MOTION_AREA: u64 = 100;
const DEFAULT_GAUSSIAN_BLUR_SIZE: u32 = 5;
const DEFAULT_VIEWPORT_WIDTH: u32 = 720;
const DEFAULT_VIEWPORT_HEIGHT: u32 = 480;
const DEFAULT_SMOOTHING_WINDOW_SIZE: usize = 5;
const DEFAULT_TARGET_FPS: u32 = 5;
const DEFAULT_FRAME_RESIZE_WIDTH: u32 = 1280;
const DEFAULT_FRAME_RESIZE_HEIGHT: u32 = 720;

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    queues: Option<QueuesConfigFile>,
    detection: Option<DetectionConfigFile>,
    viewport: Option<ViewportConfigFile>,
    processing: Option<ProcessingConfigFile>,
}

// Integer fields are read as i64 so a negative value falls back for that
// field only.
#[derive(Debug, Deserialize, Default)]
struct QueuesConfigFile {
    max_size: Option<i64>,
    timeout: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    threshold: Option<f64>,
    min_motion_area: Option<i64>,
    gaussian_blur_size: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct ViewportConfigFile {
    width: Option<i64>,
    height: Option<i64>,
    smoothing_window_size: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct ProcessingConfigFile {
    target_fps: Option<i64>,
    frame_resize_width: Option<i64>,
    frame_resize_height: Option<i64>,
}

/// Pipeline configuration.
///
/// Loading never fails: a missing, unreadable or malformed file falls back to
/// the defaults, and individual out-of-range values fall back to their
/// default. Every fallback is logged as a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub queue_max_size: usize,
    pub queue_timeout: Duration,
    pub detection_threshold: f64,
    pub min_motion_area: u64,
    pub gaussian_blur_size: u32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub smoothing_window_size: usize,
    pub target_fps: u32,
    pub frame_resize_width: u32,
    pub frame_resize_height: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_file(PipelineConfigFile::default())
    }
}

impl PipelineConfig {
    /// Load from `path` (or `VIEWPORT_CONFIG` when `path` is `None`), then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).or_else(|| {
            std::env::var("VIEWPORT_CONFIG")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
        });
        let file_cfg = match path.as_deref() {
            Some(path) if path.exists() => match read_config_file(path) {
                Ok(file) => file,
                Err(err) => {
                    log::warn!("{}; using defaults", err);
                    PipelineConfigFile::default()
                }
            },
            Some(path) => {
                log::warn!("config file {} not found; using defaults", path.display());
                PipelineConfigFile::default()
            }
            None => PipelineConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env();
        cfg.validate();
        cfg
    }

    /// Strict variant of `load` for a single file: read and parse errors are returned.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?);
        cfg.validate();
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let queues = file.queues.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let viewport = file.viewport.unwrap_or_default();
        let processing = file.processing.unwrap_or_default();
        Self {
            queue_max_size: int_field("queues.max_size", queues.max_size, DEFAULT_QUEUE_MAX_SIZE),
            queue_timeout: seconds(queues.timeout.unwrap_or(DEFAULT_QUEUE_TIMEOUT_SECS)),
            detection_threshold: detection.threshold.unwrap_or(DEFAULT_DETECTION_THRESHOLD),
            min_motion_area: int_field(
                "detection.min_motion_area",
                detection.min_motion_area,
                DEFAULT_MIN_MOTION_AREA,
            ),
            gaussian_blur_size: int_field(
                "detection.gaussian_blur_size",
                detection.gaussian_blur_size,
                DEFAULT_GAUSSIAN_BLUR_SIZE,
            ),
            viewport_width: int_field("viewport.width", viewport.width, DEFAULT_VIEWPORT_WIDTH),
            viewport_height: int_field(
                "viewport.height",
                viewport.height,
                DEFAULT_VIEWPORT_HEIGHT,
            ),
            smoothing_window_size: int_field(
                "viewport.smoothing_window_size",
                viewport.smoothing_window_size,
                DEFAULT_SMOOTHING_WINDOW_SIZE,
            ),
            target_fps: int_field(
                "processing.target_fps",
                processing.target_fps,
                DEFAULT_TARGET_FPS,
            ),
            frame_resize_width: int_field(
                "processing.frame_resize_width",
                processing.frame_resize_width,
                DEFAULT_FRAME_RESIZE_WIDTH,
            ),
            frame_resize_height: int_field(
                "processing.frame_resize_height",
                processing.frame_resize_height,
                DEFAULT_FRAME_RESIZE_HEIGHT,
            ),
        }
    }

    fn apply_env(&mut self) {
        if let Some(size) = env_value("VIEWPORT_QUEUE_MAX_SIZE") {
            self.queue_max_size = size;
        }
        if let Some(timeout) = env_value::<f64>("VIEWPORT_QUEUE_TIMEOUT") {
            self.queue_timeout = seconds(timeout);
        }
        if let Some(threshold) = env_value("VIEWPORT_DETECTION_THRESHOLD") {
            self.detection_threshold = threshold;
        }
        if let Some(area) = env_value("VIEWPORT_MIN_MOTION_AREA") {
            self.min_motion_area = area;
        }
        if let Some(width) = env_value("VIEWPORT_WIDTH") {
            self.viewport_width = width;
        }
        if let Some(height) = env_value("VIEWPORT_HEIGHT") {
            self.viewport_height = height;
        }
        if let Some(fps) = env_value("VIEWPORT_TARGET_FPS") {
            self.target_fps = fps;
        }
    }

    fn validate(&mut self) {
        if self.queue_max_size == 0 {
            warn_default("queues.max_size", &self.queue_max_size);
            self.queue_max_size = DEFAULT_QUEUE_MAX_SIZE;
        }
        if self.queue_timeout.is_zero() {
            warn_default("queues.timeout", &self.queue_timeout.as_secs_f64());
            self.queue_timeout = seconds(DEFAULT_QUEUE_TIMEOUT_SECS);
        }
        if !self.detection_threshold.is_finite() || self.detection_threshold <= 0.0 {
            warn_default("detection.threshold", &self.detection_threshold);
            self.detection_threshold = DEFAULT_DETECTION_THRESHOLD;
        }
        if self.gaussian_blur_size == 0 {
            warn_default("detection.gaussian_blur_size", &self.gaussian_blur_size);
            self.gaussian_blur_size = DEFAULT_GAUSSIAN_BLUR_SIZE;
        }
        if self.viewport_width == 0 {
            warn_default("viewport.width", &self.viewport_width);
            self.viewport_width = DEFAULT_VIEWPORT_WIDTH;
        }
        if self.viewport_height == 0 {
            warn_default("viewport.height", &self.viewport_height);
            self.viewport_height = DEFAULT_VIEWPORT_HEIGHT;
        }
        if self.smoothing_window_size == 0 {
            warn_default("viewport.smoothing_window_size", &self.smoothing_window_size);
            self.smoothing_window_size = DEFAULT_SMOOTHING_WINDOW_SIZE;
        }
        if self.target_fps == 0 {
            warn_default("processing.target_fps", &self.target_fps);
            self.target_fps = DEFAULT_TARGET_FPS;
        }
        if self.frame_resize_width == 0 {
            warn_default("processing.frame_resize_width", &self.frame_resize_width);
            self.frame_resize_width = DEFAULT_FRAME_RESIZE_WIDTH;
        }
        if self.frame_resize_height == 0 {
            warn_default("processing.frame_resize_height", &self.frame_resize_height);
            self.frame_resize_height = DEFAULT_FRAME_RESIZE_HEIGHT;
        }
        if self.viewport_width > self.frame_resize_width
            || self.viewport_height > self.frame_resize_height
        {
            log::warn!(
                "viewport {}x{} is larger than frame {}x{}; oversized axes stay centered",
                self.viewport_width,
                self.viewport_height,
                self.frame_resize_width,
                self.frame_resize_height
            );
        }
    }

    pub fn viewport_size(&self) -> Size {
        Size::new(self.viewport_width, self.viewport_height)
    }

    pub fn frame_size(&self) -> Size {
        Size::new(self.frame_resize_width, self.frame_resize_height)
    }

    pub fn detection(&self) -> DetectionSettings {
        DetectionSettings {
            threshold: self.detection_threshold,
            min_motion_area: self.min_motion_area,
            blur_size: self.gaussian_blur_size,
        }
    }

    pub fn tracker(&self) -> TrackerSettings {
        TrackerSettings {
            viewport: self.viewport_size(),
            smoothing_window: self.smoothing_window_size,
            ..TrackerSettings::default()
        }
    }
}

impl std::fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PipelineConfig(queue_size={}, viewport={}x{}, frame={}x{}, fps={})",
            self.queue_max_size,
            self.viewport_width,
            self.viewport_height,
            self.frame_resize_width,
            self.frame_resize_height,
            self.target_fps
        )
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let cfg = if is_json {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

/// Negative, NaN and infinite values map to zero so `validate` replaces them.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Narrow a file integer, falling back to `default` when it is negative or too large.
fn int_field<T: TryFrom<i64>>(field: &str, value: Option<i64>, default: T) -> T {
    let Some(raw) = value else {
        return default;
    };
    match T::try_from(raw) {
        Ok(value) => value,
        Err(_) => {
            log::warn!("{} = {} is out of range; using default", field, raw);
            default
        }
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    if raw.trim().is_empty() {
        return None;
    }
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}

fn warn_default(field: &str, value: &dyn std::fmt::Display) {
    log::warn!("{} = {} is not positive; using default", field, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.queue_max_size, 100);
        assert_eq!(cfg.queue_timeout, Duration::from_secs(5));
        assert_eq!(cfg.detection_threshold, 25.0);
        assert_eq!(cfg.min_motion_area, 100);
        assert_eq!(cfg.gaussian_blur_size, 5);
        assert_eq!(cfg.viewport_size(), Size::new(720, 480));
        assert_eq!(cfg.smoothing_window_size, 5);
        assert_eq!(cfg.target_fps, 5);
        assert_eq!(cfg.frame_size(), Size::new(1280, 720));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let file: PipelineConfigFile = toml::from_str(
            r#"
            [viewport]
            width = 320
            smoothing_window_size = 9
            "#,
        )
        .unwrap();
        let cfg = PipelineConfig::from_file(file);
        assert_eq!(cfg.viewport_width, 320);
        assert_eq!(cfg.viewport_height, 480);
        assert_eq!(cfg.smoothing_window_size, 9);
        assert_eq!(cfg.queue_max_size, 100);
    }

    #[test]
    fn non_positive_values_fall_back_per_field() {
        let file: PipelineConfigFile = toml::from_str(
            r#"
            [queues]
            max_size = 0
            timeout = -1.0
            [detection]
            threshold = 0.0
            min_motion_area = 0
            "#,
        )
        .unwrap();
        let mut cfg = PipelineConfig::from_file(file);
        cfg.validate();
        assert_eq!(cfg.queue_max_size, 100);
        assert_eq!(cfg.queue_timeout, Duration::from_secs(5));
        assert_eq!(cfg.detection_threshold, 25.0);
        // Zero minimum area is legitimate: keep every box.
        assert_eq!(cfg.min_motion_area, 0);
    }

    #[test]
    fn negative_integers_fall_back_without_discarding_the_file() {
        let file: PipelineConfigFile = toml::from_str(
            r#"
            [queues]
            max_size = -1
            [detection]
            min_motion_area = -5
            [viewport]
            width = 320
            height = -480
            [processing]
            target_fps = 4294967296
            "#,
        )
        .unwrap();
        let mut cfg = PipelineConfig::from_file(file);
        cfg.validate();
        assert_eq!(cfg.viewport_width, 320);
        assert_eq!(cfg.viewport_height, 480);
        assert_eq!(cfg.queue_max_size, 100);
        assert_eq!(cfg.min_motion_area, 100);
        assert_eq!(cfg.target_fps, 5);
    }

    #[test]
    fn settings_views_follow_config() {
        let cfg = PipelineConfig {
            gaussian_blur_size: 8,
            viewport_width: 300,
            smoothing_window_size: 2,
            ..PipelineConfig::default()
        };
        assert_eq!(cfg.detection().blur_size, 8);
        assert_eq!(cfg.tracker().viewport, Size::new(300, 480));
        assert_eq!(cfg.tracker().smoothing_window, 2);
    }
}
