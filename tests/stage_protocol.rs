use anyhow::{bail, Result};
use image::RgbImage;
use std::sync::Arc;
use std::time::Duration;

use viewport_tracker::detect::ScriptedBackend;
use viewport_tracker::{
    run_stage, stage_channel, CollectingSink, DetectionRecord, DetectorStage, Envelope,
    FrameRecord, FrameSource, MotionBox, Pipeline, PipelineConfig, SourceConfig, StageReceiver,
    TrackerSettings, ViewportRecord, ViewportSink, ViewportTracker,
};

const SHORT: Duration = Duration::from_millis(20);

/// Everything currently queued, stopping at the first empty poll.
fn drain<T>(rx: &StageReceiver<T>) -> Vec<Envelope<T>> {
    let mut out = Vec::new();
    while let Ok(Some(envelope)) = rx.get(SHORT) {
        out.push(envelope);
    }
    out
}

fn frame(id: u64) -> FrameRecord {
    FrameRecord::new(id, RgbImage::new(64, 48), id as f64 / 30.0)
}

fn small_config() -> PipelineConfig {
    PipelineConfig {
        queue_max_size: 2,
        viewport_width: 32,
        viewport_height: 24,
        target_fps: 30,
        frame_resize_width: 64,
        frame_resize_height: 48,
        ..PipelineConfig::default()
    }
}

fn stub_source(cfg: &PipelineConfig, frames: u64) -> Result<FrameSource> {
    let mut source_cfg = SourceConfig::from_pipeline("stub://protocol", cfg);
    source_cfg.synthetic_frames = frames;
    FrameSource::new(source_cfg)
}

#[test]
fn tracker_forwards_lone_end_of_stream_once() -> Result<()> {
    let (in_tx, in_rx) = stage_channel::<DetectionRecord>("detections", 4, SHORT);
    let (out_tx, out_rx) = stage_channel::<ViewportRecord>("viewports", 4, SHORT);
    in_tx.finish()?;

    let mut tracker = ViewportTracker::new(TrackerSettings::default());
    let summary = run_stage(&mut tracker, &in_rx, &out_tx)?;
    assert_eq!(summary.records, 0);

    let forwarded = drain(&out_rx);
    assert_eq!(forwarded.len(), 1);
    assert!(forwarded[0].is_end_of_stream());
    Ok(())
}

#[test]
fn failing_detector_forwards_one_end_of_stream() -> Result<()> {
    let (in_tx, in_rx) = stage_channel::<FrameRecord>("frames", 8, SHORT);
    let (out_tx, out_rx) = stage_channel::<DetectionRecord>("detections", 8, SHORT);
    for id in 0..3 {
        in_tx.put_record(frame(id))?;
    }
    in_tx.finish()?;

    let backend = ScriptedBackend::new(vec![vec![MotionBox::new(1, 1, 4, 4)]]).fail_at(1);
    let mut stage = DetectorStage::new(Box::new(backend))?;
    let err = match run_stage(&mut stage, &in_rx, &out_tx) {
        Ok(summary) => panic!("detector should fail, got {:?}", summary),
        Err(err) => err,
    };
    assert!(format!("{:#}", err).contains("detector stage failed"));

    let forwarded = drain(&out_rx);
    assert_eq!(forwarded.len(), 2);
    let first = match &forwarded[0] {
        Envelope::Record(record) => record,
        Envelope::EndOfStream => panic!("expected a record first"),
    };
    assert_eq!(first.frame_id, 0);
    assert_eq!(first.motion_boxes, vec![MotionBox::new(1, 1, 4, 4)]);
    assert!(forwarded[1].is_end_of_stream());
    Ok(())
}

#[test]
fn detector_forwards_pixels_without_copying() -> Result<()> {
    let (in_tx, in_rx) = stage_channel::<FrameRecord>("frames", 4, SHORT);
    let (out_tx, out_rx) = stage_channel::<DetectionRecord>("detections", 4, SHORT);
    let record = frame(7);
    let pixels = record.pixels.clone();
    in_tx.put_record(record)?;
    in_tx.finish()?;

    let mut stage = DetectorStage::new(Box::new(ScriptedBackend::default()))?;
    run_stage(&mut stage, &in_rx, &out_tx)?;

    let forwarded = drain(&out_rx);
    let Some(Envelope::Record(detection)) = forwarded.into_iter().next() else {
        panic!("expected a detection record");
    };
    assert_eq!(detection.frame_id, 7);
    assert!(Arc::ptr_eq(&detection.pixels, &pixels));
    Ok(())
}

#[test]
fn pipeline_reports_detector_failure() -> Result<()> {
    let cfg = small_config();
    let source = stub_source(&cfg, 40)?;
    let pipeline =
        Pipeline::new(cfg).with_detector(Box::new(ScriptedBackend::default().fail_at(2)));
    let result = pipeline.run(source, CollectingSink::default());
    let Err(err) = result else {
        panic!("pipeline should fail when the detector fails");
    };
    let message = format!("{:#}", err);
    assert!(message.contains("pipeline failed"), "{}", message);
    assert!(message.contains("scripted failure"), "{}", message);
    assert!(!message.contains("disconnected"), "{}", message);
    Ok(())
}

#[test]
fn pipeline_refuses_backend_without_motion() -> Result<()> {
    let cfg = small_config();
    let source = stub_source(&cfg, 5)?;
    let backend = ScriptedBackend::default().with_capabilities(Vec::new());
    let result = Pipeline::new(cfg)
        .with_detector(Box::new(backend))
        .run(source, CollectingSink::default());
    let Err(err) = result else {
        panic!("pipeline should refuse a backend without motion support");
    };
    assert!(format!("{:#}", err).contains("does not support motion detection"));
    Ok(())
}

struct FailingSink {
    accepted: u64,
    fail_after: u64,
}

impl ViewportSink for FailingSink {
    fn accept(&mut self, _record: ViewportRecord) -> Result<()> {
        if self.accepted == self.fail_after {
            bail!("disk full");
        }
        self.accepted += 1;
        Ok(())
    }
}

#[test]
fn renderer_failure_unwinds_upstream_stages() -> Result<()> {
    let cfg = small_config();
    let source = stub_source(&cfg, 60)?;
    let sink = FailingSink {
        accepted: 0,
        fail_after: 3,
    };
    let result = Pipeline::new(cfg).run(source, sink);
    let Err(err) = result else {
        panic!("pipeline should fail when the renderer fails");
    };
    let message = format!("{:#}", err);
    assert!(message.contains("pipeline failed"), "{}", message);
    assert!(message.contains("disk full"), "{}", message);
    assert!(!message.contains("disconnected"), "{}", message);
    Ok(())
}
