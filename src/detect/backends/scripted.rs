use anyhow::{bail, Result};
use image::RgbImage;
use std::collections::VecDeque;

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::frame::MotionBox;

/// Replays a fixed sequence of box lists, one per frame.
///
/// Once the script is exhausted every further frame reports no motion.
/// `fail_at` makes the n-th call (zero-based) return an error, which is how
/// stage failure handling is exercised without a malformed frame.
pub struct ScriptedBackend {
    script: VecDeque<Vec<MotionBox>>,
    calls: u64,
    fail_at: Option<u64>,
    capabilities: Vec<DetectionCapability>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ScriptedBackend {
    pub fn new(script: Vec<Vec<MotionBox>>) -> Self {
        Self {
            script: script.into(),
            calls: 0,
            fail_at: None,
            capabilities: vec![DetectionCapability::Motion],
        }
    }

    pub fn fail_at(mut self, call: u64) -> Self {
        self.fail_at = Some(call);
        self
    }

    /// Replace the advertised capabilities.
    pub fn with_capabilities(mut self, capabilities: Vec<DetectionCapability>) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<MotionBox>> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_at == Some(call) {
            bail!("scripted failure on call {}", call);
        }
        Ok(self.script.pop_front().unwrap_or_default())
    }
}
