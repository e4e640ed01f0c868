pub mod frame_diff;
pub mod scripted;

pub use frame_diff::{DetectionSettings, FrameDiffBackend};
pub use scripted::ScriptedBackend;
