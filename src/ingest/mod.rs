//! Frame ingestion.
//!
//! Inputs are image-sequence directories, local video files (feature:
//! ingest-file-ffmpeg) and `stub://` synthetic scenes.
//!
//! Sources produce `FrameRecord`s at the target rate and processing size;
//! `run_source` pumps them into the head of the pipeline.

pub mod file;
mod pump;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod video;

pub use file::{FrameSource, SourceConfig, SourceStats};
pub use pump::run_source;
