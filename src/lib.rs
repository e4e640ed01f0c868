//! Viewport tracker
//!
//! A staged pipeline that finds motion in a video stream and keeps a
//! fixed-size crop window (the viewport) on it.
//!
//! # Architecture
//!
//! Four stages run on their own threads, connected by bounded channels:
//!
//! 1. **Source**: reads, decimates and resizes frames.
//! 2. **Detector**: frame-difference motion detection, producing boxes.
//! 3. **Tracker**: picks a region of interest, smooths the center, clamps
//!    the viewport inside the frame.
//! 4. **Renderer**: consumes viewport records (writes images or collects).
//!
//! Every channel carries an explicit end-of-stream marker. A stage forwards
//! it exactly once, both on normal completion and after a failure, so the
//! stages below it always shut down.
//!
//! # Module Structure
//!
//! - `frame`: records and geometry passed between stages
//! - `transport`: bounded timed channels
//! - `stage`: the stage trait and its run loop
//! - `detect`, `viewport`: the two processing stages
//! - `ingest`, `render`: the ends of the pipeline
//! - `config`, `pipeline`: settings and the driver that wires everything

pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod render;
pub mod stage;
pub mod transport;
pub mod ui;
pub mod viewport;

pub use config::PipelineConfig;
pub use detect::{
    DetectionCapability, DetectionSettings, DetectorBackend, DetectorStage, FrameDiffBackend,
};
pub use frame::{DetectionRecord, FrameRecord, MotionBox, Point, Size, ViewportRecord};
pub use ingest::{FrameSource, SourceConfig};
pub use pipeline::{Pipeline, PipelineReport};
pub use render::{CollectingSink, FrameRenderer, ViewportSink};
pub use stage::{run_stage, Stage, StageSummary};
pub use transport::{stage_channel, Envelope, StageReceiver, StageSender};
pub use viewport::{TrackerSettings, ViewportState, ViewportTracker};
