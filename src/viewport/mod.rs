//! Viewport tracking.
//!
//! - `state`: the tracking/steady controller and its pure transition function.
//! - `roi`: region-of-interest scoring over motion boxes.
//! - `smoothing`: sliding-window moving average of centers.
//! - `clamp`: keeps the viewport inside the frame.
//! - `tracker`: the per-record controller, also the tracker pipeline stage.

mod clamp;
mod roi;
mod smoothing;
mod state;
mod tracker;

pub use clamp::clamp_center;
pub use roi::{select_roi, RoiWeights};
pub use smoothing::SmoothingWindow;
pub use state::{transition, ViewportState, STEADY_AFTER_EMPTY_FRAMES};
pub use tracker::{TrackerSettings, ViewportTracker};
