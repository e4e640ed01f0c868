//! Records that flow between pipeline stages.
//!
//! - `FrameRecord`: a decoded, resized frame produced by the frame source.
//! - `DetectionRecord`: the same frame plus the motion boxes found in it.
//! - `ViewportRecord`: the same frame plus the viewport placed on it.
//!
//! Pixel buffers are shared through an `Arc`, so forwarding a record downstream
//! never copies the raster. Records are moved into a transport and are not
//! touched by the sender afterwards.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::viewport::ViewportState;

/// Shared, immutable RGB raster.
pub type Pixels = Arc<RgbImage>;

// ----------------------------------------------------------------------------
// Geometry
// ----------------------------------------------------------------------------

/// Axis-aligned bounding box of a motion region, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl MotionBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Geometric center in floating point.
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

/// Integer pixel coordinate. Signed so intermediate clamping math cannot wrap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Geometric center using integer floor division.
    pub fn center(&self) -> Point {
        Point::new(self.width as i64 / 2, self.height as i64 / 2)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

// ----------------------------------------------------------------------------
// Stage records
// ----------------------------------------------------------------------------

/// A frame as produced by the frame source.
#[derive(Clone, Debug)]
pub struct FrameRecord {
    /// Source frame index. Strictly increasing within a stream; may skip after decimation.
    pub frame_id: u64,
    pub pixels: Pixels,
    /// Seconds since stream start, derived from the index and the source frame rate.
    pub timestamp: f64,
}

impl FrameRecord {
    pub fn new(frame_id: u64, pixels: RgbImage, timestamp: f64) -> Self {
        Self {
            frame_id,
            pixels: Arc::new(pixels),
            timestamp,
        }
    }

    pub fn size(&self) -> Size {
        frame_size(&self.pixels)
    }
}

/// Output of the motion detector.
#[derive(Clone, Debug)]
pub struct DetectionRecord {
    pub frame_id: u64,
    pub pixels: Pixels,
    /// Contour discovery order; may be empty, may overlap.
    pub motion_boxes: Vec<MotionBox>,
}

impl DetectionRecord {
    pub fn size(&self) -> Size {
        frame_size(&self.pixels)
    }
}

/// Output of the viewport tracker.
#[derive(Clone, Debug)]
pub struct ViewportRecord {
    pub frame_id: u64,
    pub pixels: Pixels,
    pub viewport_center: Point,
    pub viewport_size: Size,
    pub motion_boxes: Vec<MotionBox>,
    /// Controller mode that produced this record.
    pub state: ViewportState,
}

impl ViewportRecord {
    pub fn size(&self) -> Size {
        frame_size(&self.pixels)
    }

    /// Viewport rectangle as `(x1, y1, x2, y2)`, half-open, possibly extending past the frame.
    pub fn viewport_bounds(&self) -> (i64, i64, i64, i64) {
        let half_w = self.viewport_size.width as i64 / 2;
        let half_h = self.viewport_size.height as i64 / 2;
        (
            self.viewport_center.x - half_w,
            self.viewport_center.y - half_h,
            self.viewport_center.x + half_w,
            self.viewport_center.y + half_h,
        )
    }
}

fn frame_size(pixels: &RgbImage) -> Size {
    let (width, height) = pixels.dimensions();
    Size::new(width, height)
}
