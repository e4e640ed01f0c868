use anyhow::{bail, Context, Result};

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::frame::{DetectionRecord, FrameRecord};
use crate::stage::Stage;

/// Pipeline stage turning frames into detection records.
pub struct DetectorStage {
    backend: Box<dyn DetectorBackend>,
    warmed_up: bool,
}

impl DetectorStage {
    /// Fails when the backend cannot report motion.
    pub fn new(backend: Box<dyn DetectorBackend>) -> Result<Self> {
        if !backend.supports(DetectionCapability::Motion) {
            bail!(
                "detector backend {} does not support motion detection",
                backend.name()
            );
        }
        Ok(Self {
            backend,
            warmed_up: false,
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

impl Stage for DetectorStage {
    type Input = FrameRecord;
    type Output = DetectionRecord;

    fn name(&self) -> &'static str {
        "detector"
    }

    fn process(&mut self, frame: FrameRecord) -> Result<DetectionRecord> {
        if !self.warmed_up {
            self.backend
                .warm_up()
                .with_context(|| format!("warm up {} backend", self.backend.name()))?;
            self.warmed_up = true;
        }
        let motion_boxes = self
            .backend
            .detect(&frame.pixels)
            .with_context(|| format!("motion detection failed on frame {}", frame.frame_id))?;
        log::debug!(
            "detector: frame {} -> {} motion boxes",
            frame.frame_id,
            motion_boxes.len()
        );
        Ok(DetectionRecord {
            frame_id: frame.frame_id,
            pixels: frame.pixels,
            motion_boxes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ScriptedBackend;
    use crate::frame::MotionBox;
    use image::RgbImage;
    use std::sync::Arc;

    #[test]
    fn forwards_frame_buffer_and_boxes() -> Result<()> {
        let boxes = vec![MotionBox::new(1, 2, 3, 4)];
        let backend = ScriptedBackend::new(vec![boxes.clone()]);
        let mut stage = DetectorStage::new(Box::new(backend))?;
        let frame = FrameRecord::new(7, RgbImage::new(16, 16), 0.7);
        let pixels = frame.pixels.clone();

        let record = stage.process(frame)?;
        assert_eq!(record.frame_id, 7);
        assert_eq!(record.motion_boxes, boxes);
        assert!(Arc::ptr_eq(&record.pixels, &pixels));
        assert_eq!(stage.backend_name(), "scripted");
        Ok(())
    }

    #[test]
    fn rejects_backend_without_motion() {
        let backend = ScriptedBackend::default().with_capabilities(Vec::new());
        let err = match DetectorStage::new(Box::new(backend)) {
            Ok(_) => panic!("stage accepted a backend without motion support"),
            Err(err) => err,
        };
        assert_eq!(
            err.to_string(),
            "detector backend scripted does not support motion detection"
        );
    }
}
