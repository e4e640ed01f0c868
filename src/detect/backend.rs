use anyhow::Result;
use image::RgbImage;

use crate::frame::MotionBox;

/// What a backend can report.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionCapability {
    /// Boxes around regions that changed since the previous frame.
    Motion,
}

/// Motion detector backend.
///
/// A backend is stateful: it keeps whatever baseline it needs between calls
/// and is fed frames strictly in stream order. It is owned by exactly one
/// detector stage.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the backend supports a capability.
    fn supports(&self, capability: DetectionCapability) -> bool;

    /// Find motion regions in `frame`.
    ///
    /// Returned boxes must lie within the frame. An error is fatal for the
    /// stream: the baseline can no longer be trusted.
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<MotionBox>>;

    /// Optional warm-up hook, called once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
