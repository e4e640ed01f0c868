use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::draw::{crop_clipped, draw_motion_box, draw_rect, VIEWPORT_COLOR};
use super::ViewportSink;
use crate::frame::{MotionBox, Point, Size, ViewportRecord};
use crate::viewport::ViewportState;

pub const FRAMES_DIR: &str = "frames";
pub const VIEWPORT_DIR: &str = "viewport";
pub const TRACE_FILE: &str = "trace.jsonl";

/// One line of `trace.jsonl`.
#[derive(Debug, Serialize)]
struct TraceLine<'a> {
    frame_id: u64,
    state: ViewportState,
    viewport_center: Point,
    viewport_size: Size,
    motion_boxes: &'a [MotionBox],
}

/// Writes annotated frames, viewport crops and a JSON-lines trace.
///
/// Layout under the output directory:
/// - `frames/frame_NNNN.png`: full frame with motion boxes and the viewport drawn
/// - `viewport/frame_NNNN.png`: the viewport crop
/// - `trace.jsonl`: one record per frame
pub struct FrameRenderer {
    frames_dir: PathBuf,
    viewport_dir: PathBuf,
    trace: BufWriter<File>,
    rendered: u64,
}

impl FrameRenderer {
    pub fn create(output_dir: &Path) -> Result<Self> {
        let frames_dir = output_dir.join(FRAMES_DIR);
        let viewport_dir = output_dir.join(VIEWPORT_DIR);
        fs::create_dir_all(&frames_dir)
            .with_context(|| format!("create {}", frames_dir.display()))?;
        fs::create_dir_all(&viewport_dir)
            .with_context(|| format!("create {}", viewport_dir.display()))?;
        let trace_path = output_dir.join(TRACE_FILE);
        let trace = File::create(&trace_path)
            .with_context(|| format!("create {}", trace_path.display()))?;
        Ok(Self {
            frames_dir,
            viewport_dir,
            trace: BufWriter::new(trace),
            rendered: 0,
        })
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }
}

/// `frame_NNNN.png`, numbered from one.
pub fn frame_file_name(frame_id: u64) -> String {
    format!("frame_{:04}.png", frame_id + 1)
}

impl ViewportSink for FrameRenderer {
    fn accept(&mut self, record: ViewportRecord) -> Result<()> {
        let (x1, y1, x2, y2) = record.viewport_bounds();
        let name = frame_file_name(record.frame_id);

        let mut annotated = (*record.pixels).clone();
        for b in &record.motion_boxes {
            draw_motion_box(&mut annotated, b);
        }
        draw_rect(&mut annotated, x1, y1, x2, y2, VIEWPORT_COLOR, 2);
        let path = self.frames_dir.join(&name);
        annotated
            .save(&path)
            .with_context(|| format!("write {}", path.display()))?;

        let crop = crop_clipped(&record.pixels, x1, y1, x2, y2);
        if crop.width() == 0 || crop.height() == 0 {
            log::warn!("renderer: viewport of frame {} is outside the frame", record.frame_id);
        } else {
            let path = self.viewport_dir.join(&name);
            crop.save(&path)
                .with_context(|| format!("write {}", path.display()))?;
        }

        let line = TraceLine {
            frame_id: record.frame_id,
            state: record.state,
            viewport_center: record.viewport_center,
            viewport_size: record.viewport_size,
            motion_boxes: &record.motion_boxes,
        };
        serde_json::to_writer(&mut self.trace, &line)?;
        self.trace.write_all(b"\n")?;
        self.rendered += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.trace.flush().context("flush trace")?;
        log::info!("renderer: wrote {} frames", self.rendered);
        Ok(())
    }
}
