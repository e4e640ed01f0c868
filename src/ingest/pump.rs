use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};

use super::file::FrameSource;
use crate::frame::FrameRecord;
use crate::stage::StageSummary;
use crate::transport::StageSender;

/// Push every frame of `source` into the first pipeline channel.
///
/// Stops when the source is exhausted or `shutdown` is raised, then forwards
/// the end-of-stream marker. A source error gets a best-effort marker and is
/// returned.
pub fn run_source(
    source: &mut FrameSource,
    outbound: &StageSender<FrameRecord>,
    shutdown: &AtomicBool,
) -> Result<StageSummary> {
    let mut records = 0u64;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            log::info!("source: shutdown requested after {} frames", records);
            break;
        }
        match source.next_frame() {
            Ok(Some(frame)) => {
                outbound.put_record(frame)?;
                records += 1;
            }
            Ok(None) => break,
            Err(err) => {
                log::error!("source: error: {:#}", err);
                outbound.finish_best_effort();
                return Err(err.context("source stage failed"));
            }
        }
    }
    outbound.finish()?;
    log::info!("source: finished reading {} frames", records);
    Ok(StageSummary {
        name: "source",
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Size;
    use crate::ingest::SourceConfig;
    use crate::transport::{stage_channel, Envelope};
    use std::time::Duration;

    fn source(frames: u64) -> FrameSource {
        FrameSource::new(SourceConfig {
            location: "stub://pump".to_string(),
            source_fps: 5.0,
            target_fps: 5,
            frame_size: Size::new(32, 24),
            synthetic_frames: frames,
        })
        .unwrap()
    }

    #[test]
    fn emits_all_frames_then_marker() -> Result<()> {
        let (tx, rx) = stage_channel("frames", 16, Duration::from_millis(20));
        let summary = run_source(&mut source(4), &tx, &AtomicBool::new(false))?;
        assert_eq!(summary.records, 4);

        let mut ids = Vec::new();
        while let Envelope::Record(frame) = rx.next()? {
            ids.push(frame.frame_id);
        }
        assert_eq!(ids, vec![0, 1, 2, 3]);
        Ok(())
    }

    #[test]
    fn shutdown_stops_early_with_marker() -> Result<()> {
        let (tx, rx) = stage_channel("frames", 16, Duration::from_millis(20));
        let summary = run_source(&mut source(100), &tx, &AtomicBool::new(true))?;
        assert_eq!(summary.records, 0);
        assert!(rx.next()?.is_end_of_stream());
        Ok(())
    }
}
