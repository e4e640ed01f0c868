use anyhow::{bail, Result};
use image::{GrayImage, RgbImage};

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::imgops;
use crate::frame::MotionBox;

/// Dilation passes applied to the thresholded difference.
const DILATE_ITERATIONS: usize = 3;

/// Tunables for frame-difference motion detection.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionSettings {
    /// Minimum absolute intensity difference (0-255) for a pixel to count as motion.
    pub threshold: f64,
    /// Boxes with a smaller area (pixels) are discarded.
    pub min_motion_area: u64,
    /// Blur kernel size; coerced to an odd value of at least 3.
    pub blur_size: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            threshold: 25.0,
            min_motion_area: 100,
            blur_size: 5,
        }
    }
}

/// Frame-differencing motion detector.
///
/// Each frame is compared against the previous frame of the stream after both
/// are converted to intensity and blurred. The first frame only establishes
/// the baseline and never reports motion.
pub struct FrameDiffBackend {
    settings: DetectionSettings,
    kernel_size: usize,
    baseline: Option<GrayImage>,
}

impl FrameDiffBackend {
    pub fn new(settings: DetectionSettings) -> Self {
        let kernel_size = imgops::coerce_kernel_size(settings.blur_size);
        Self {
            settings,
            kernel_size,
            baseline: None,
        }
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    fn boxes_against(&self, prev: &GrayImage, current: &GrayImage) -> Vec<MotionBox> {
        let (w, h) = (current.width() as usize, current.height() as usize);
        let mask = imgops::diff_mask(prev, current, self.settings.threshold);
        let mask = imgops::dilate(&mask, w, h, DILATE_ITERATIONS);
        imgops::external_regions(&mask, w, h)
            .into_iter()
            .filter(|b| b.area() >= self.settings.min_motion_area)
            .collect()
    }
}

impl Default for FrameDiffBackend {
    fn default() -> Self {
        Self::new(DetectionSettings::default())
    }
}

impl DetectorBackend for FrameDiffBackend {
    fn name(&self) -> &'static str {
        "frame-diff"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(capability, DetectionCapability::Motion)
    }

    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<MotionBox>> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            bail!("empty frame ({}x{})", width, height);
        }
        if let Some(prev) = &self.baseline {
            if prev.dimensions() != (width, height) {
                bail!(
                    "frame size changed mid-stream: baseline {}x{}, got {}x{}",
                    prev.width(),
                    prev.height(),
                    width,
                    height
                );
            }
        }

        let blurred = imgops::gaussian_blur(&imgops::to_gray(frame), self.kernel_size);
        let boxes = match &self.baseline {
            None => Vec::new(),
            Some(prev) => self.boxes_against(prev, &blurred),
        };
        self.baseline = Some(blurred);
        Ok(boxes)
    }
}
