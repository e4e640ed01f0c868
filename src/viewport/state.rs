use serde::{Deserialize, Serialize};

use crate::frame::MotionBox;

/// Consecutive empty frames after which the viewport stops following.
pub const STEADY_AFTER_EMPTY_FRAMES: u32 = 3;

/// Viewport controller mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportState {
    /// Actively re-centering on motion.
    Tracking,
    /// Holding position; smoothing history is discarded every frame.
    #[default]
    Steady,
}

impl ViewportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewportState::Tracking => "tracking",
            ViewportState::Steady => "steady",
        }
    }
}

/// Advance the controller by one frame.
///
/// Any motion resets the empty-frame counter and switches to tracking. Empty
/// frames count up; the state only drops to steady once the counter reaches
/// `STEADY_AFTER_EMPTY_FRAMES`, so a single missed detection does not flap.
pub fn transition(
    state: ViewportState,
    no_motion_count: u32,
    motion_boxes: &[MotionBox],
) -> (ViewportState, u32) {
    if !motion_boxes.is_empty() {
        return (ViewportState::Tracking, 0);
    }
    let count = no_motion_count.saturating_add(1);
    if count >= STEADY_AFTER_EMPTY_FRAMES {
        (ViewportState::Steady, count)
    } else {
        (state, count)
    }
}
