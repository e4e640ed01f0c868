//! Pipeline driver.
//!
//! Wires the three stage channels, runs every stage on its own named thread
//! and joins them:
//!
//! ```text
//! source ──frames──▶ detector ──detections──▶ tracker ──viewports──▶ renderer
//! ```
//!
//! A stage that fails forwards end-of-stream downstream and exits. Its
//! inbound receiver is dropped with it, so the stage above stops on its next
//! `put` with a disconnect error instead of blocking forever on a full
//! channel. Those disconnects are consequences; the driver reports the stage
//! error that started the unwind.

use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::PipelineConfig;
use crate::detect::{DetectorBackend, DetectorStage, FrameDiffBackend};
use crate::frame::{DetectionRecord, FrameRecord, ViewportRecord};
use crate::ingest::{run_source, FrameSource};
use crate::render::{run_sink, ViewportSink};
use crate::stage::{run_stage, StageSummary};
use crate::transport::{stage_channel, TransportError};
use crate::viewport::ViewportTracker;

type StageHandle = (&'static str, JoinHandle<Result<StageSummary>>);

/// Per-stage record counts of a completed run, plus the sink.
pub struct PipelineReport<S> {
    pub frames_read: u64,
    pub detections: u64,
    pub viewports: u64,
    pub rendered: u64,
    pub sink: S,
}

pub struct Pipeline {
    config: PipelineConfig,
    detector: Option<Box<dyn DetectorBackend>>,
    shutdown: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            detector: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the default frame-difference backend.
    pub fn with_detector(mut self, backend: Box<dyn DetectorBackend>) -> Self {
        self.detector = Some(backend);
        self
    }

    /// Raising this flag makes the source stop and the pipeline drain.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Run to completion. Fails if any stage failed or panicked.
    pub fn run<S: ViewportSink + 'static>(
        self,
        mut source: FrameSource,
        mut sink: S,
    ) -> Result<PipelineReport<S>> {
        let capacity = self.config.queue_max_size;
        let timeout = self.config.queue_timeout;
        log::info!("starting pipeline: {}", self.config);

        let backend: Box<dyn DetectorBackend> = match self.detector {
            Some(backend) => backend,
            None => Box::new(FrameDiffBackend::new(self.config.detection())),
        };
        let mut detector = DetectorStage::new(backend)?;
        let mut tracker = ViewportTracker::new(self.config.tracker());
        log::info!("detector backend: {}", detector.backend_name());

        let (frames_tx, frames_rx) = stage_channel::<FrameRecord>("frames", capacity, timeout);
        let (detections_tx, detections_rx) =
            stage_channel::<DetectionRecord>("detections", capacity, timeout);
        let (viewports_tx, viewports_rx) =
            stage_channel::<ViewportRecord>("viewports", capacity, timeout);

        let mut started: Vec<StageHandle> = Vec::with_capacity(3);
        let shutdown = self.shutdown.clone();
        let handle = spawn_or_unwind("source", &mut started, move || {
            run_source(&mut source, &frames_tx, &shutdown)
        })?;
        started.push(("source", handle));
        let handle = spawn_or_unwind("detector", &mut started, move || {
            run_stage(&mut detector, &frames_rx, &detections_tx)
        })?;
        started.push(("detector", handle));
        let handle = spawn_or_unwind("tracker", &mut started, move || {
            run_stage(&mut tracker, &detections_rx, &viewports_tx)
        })?;
        started.push(("tracker", handle));
        let renderer_handle = spawn_or_unwind("renderer", &mut started, move || {
            let summary = run_sink(&mut sink, &viewports_rx);
            (summary, sink)
        })?;

        let mut outcomes: Vec<Result<StageSummary>> = started
            .into_iter()
            .map(|(name, handle)| join(name, handle))
            .collect();
        let sink = match renderer_handle.join() {
            Ok((summary, sink)) => {
                outcomes.push(summary);
                Some(sink)
            }
            Err(_) => {
                outcomes.push(Err(anyhow!("renderer thread panicked")));
                None
            }
        };

        let mut failures = Vec::new();
        let mut counts = [0u64; 4];
        for (slot, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(summary) => counts[slot] = summary.records,
                Err(err) => {
                    log::error!("pipeline: {:#}", err);
                    failures.push(err);
                }
            }
        }
        let failed = failures.len();
        if let Some(cause) = root_cause(failures) {
            return Err(cause.context(format!(
                "pipeline failed ({} stage(s) reported errors)",
                failed
            )));
        }
        let sink = sink.ok_or_else(|| anyhow!("renderer did not return its sink"))?;
        let [frames_read, detections, viewports, rendered] = counts;
        log::info!(
            "pipeline complete: {} frames read, {} rendered",
            frames_read,
            rendered
        );
        Ok(PipelineReport {
            frames_read,
            detections,
            viewports,
            rendered,
            sink,
        })
    }
}

/// The failure to report: the first one that is not a channel disconnect,
/// falling back to the first failure when every stage only saw disconnects.
fn root_cause(failures: Vec<anyhow::Error>) -> Option<anyhow::Error> {
    let mut fallback = None;
    for err in failures {
        if !TransportError::is_disconnect(&err) {
            return Some(err);
        }
        fallback.get_or_insert(err);
    }
    fallback
}

/// Spawn a stage thread. If that fails, the closure and the channel ends it
/// owns are dropped, which makes the stages already running see a disconnect
/// and exit; they are joined before the spawn error is returned.
fn spawn_or_unwind<T, F>(
    name: &'static str,
    started: &mut Vec<StageHandle>,
    body: F,
) -> Result<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match thread::Builder::new().name(name.to_string()).spawn(body) {
        Ok(handle) => Ok(handle),
        Err(err) => {
            for failure in unwind(std::mem::take(started)) {
                log::warn!("pipeline: {:#}", failure);
            }
            Err(err).with_context(|| format!("failed to spawn {} thread", name))
        }
    }
}

/// Join every handle, returning the failures.
fn unwind(started: Vec<StageHandle>) -> Vec<anyhow::Error> {
    started
        .into_iter()
        .filter_map(|(name, handle)| join(name, handle).err())
        .collect()
}

fn join(name: &str, handle: JoinHandle<Result<StageSummary>>) -> Result<StageSummary> {
    handle
        .join()
        .map_err(|_| anyhow!("{} thread panicked", name))?
}
