use anyhow::{bail, Result};

use super::clamp::clamp_center;
use super::roi::RoiWeights;
use super::smoothing::SmoothingWindow;
use super::state::{transition, ViewportState};
use crate::frame::{DetectionRecord, MotionBox, Point, Size, ViewportRecord};
use crate::stage::Stage;

/// Tunables for the viewport tracker.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackerSettings {
    /// Fixed viewport size, constant for the whole stream.
    pub viewport: Size,
    /// Number of recent centers averaged by the smoother.
    pub smoothing_window: usize,
    pub weights: RoiWeights,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            viewport: Size::new(720, 480),
            smoothing_window: 5,
            weights: RoiWeights::default(),
        }
    }
}

/// Two-state viewport controller.
///
/// Starts `Steady`, centered on the first frame. While tracking, each frame's
/// best motion box is clamped, smoothed and clamped again; while steady the
/// center is held and smoothing history is dropped every frame.
pub struct ViewportTracker {
    settings: TrackerSettings,
    state: ViewportState,
    no_motion_count: u32,
    current_center: Option<Point>,
    window: SmoothingWindow,
}

impl ViewportTracker {
    pub fn new(settings: TrackerSettings) -> Self {
        let window = SmoothingWindow::new(settings.smoothing_window);
        Self {
            settings,
            state: ViewportState::Steady,
            no_motion_count: 0,
            current_center: None,
            window,
        }
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn no_motion_count(&self) -> u32 {
        self.no_motion_count
    }

    pub fn current_center(&self) -> Option<Point> {
        self.current_center
    }

    pub fn viewport_size(&self) -> Size {
        self.settings.viewport
    }

    /// Feed one frame's motion boxes and return the new viewport center.
    pub fn update(&mut self, frame: Size, motion_boxes: &[MotionBox]) -> Result<Point> {
        if frame.is_empty() {
            bail!("empty frame ({}x{})", frame.width, frame.height);
        }
        let previous = *self.current_center.get_or_insert_with(|| frame.center());

        let (state, count) = transition(self.state, self.no_motion_count, motion_boxes);
        if state != self.state {
            log::debug!(
                "tracker: {} -> {} (no-motion count {})",
                self.state.as_str(),
                state.as_str(),
                count
            );
        }
        self.state = state;
        self.no_motion_count = count;

        let center = match self.state {
            ViewportState::Steady => {
                self.window.clear();
                previous
            }
            ViewportState::Tracking => {
                let viewport = self.settings.viewport;
                let raw = self
                    .settings
                    .weights
                    .select(motion_boxes, frame, Some(previous));
                let clamped = clamp_center(raw, frame, viewport);
                let smoothed = self.window.push(clamped);
                clamp_center(smoothed, frame, viewport)
            }
        };
        self.current_center = Some(center);
        Ok(center)
    }
}

impl Stage for ViewportTracker {
    type Input = DetectionRecord;
    type Output = ViewportRecord;

    fn name(&self) -> &'static str {
        "tracker"
    }

    fn process(&mut self, detection: DetectionRecord) -> Result<ViewportRecord> {
        let center = self.update(detection.size(), &detection.motion_boxes)?;
        Ok(ViewportRecord {
            frame_id: detection.frame_id,
            pixels: detection.pixels,
            viewport_center: center,
            viewport_size: self.settings.viewport,
            motion_boxes: detection.motion_boxes,
            state: self.state,
        })
    }
}
