//! Motion detection.
//!
//! The detector stage owns one `DetectorBackend` and feeds it every frame in
//! stream order. `FrameDiffBackend` is the production backend;
//! `ScriptedBackend` replays canned results for tests and dry runs.

mod backend;
mod backends;
pub mod imgops;
mod stage;

pub use backend::{DetectionCapability, DetectorBackend};
pub use backends::{DetectionSettings, FrameDiffBackend, ScriptedBackend};
pub use stage::DetectorStage;
