//! Output side of the pipeline.
//!
//! The last stage drains viewport records into a `ViewportSink`.
//! `FrameRenderer` writes annotated images and a trace to disk;
//! `CollectingSink` keeps records in memory.

mod draw;
mod writer;

use anyhow::Result;

use crate::frame::ViewportRecord;
use crate::stage::StageSummary;
use crate::transport::{Envelope, StageReceiver};

pub use writer::{frame_file_name, FrameRenderer, FRAMES_DIR, TRACE_FILE, VIEWPORT_DIR};

/// Consumer of the final pipeline channel.
pub trait ViewportSink: Send {
    fn accept(&mut self, record: ViewportRecord) -> Result<()>;

    /// Called once after end-of-stream.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory sink.
#[derive(Default)]
pub struct CollectingSink {
    pub records: Vec<ViewportRecord>,
}

impl ViewportSink for CollectingSink {
    fn accept(&mut self, record: ViewportRecord) -> Result<()> {
        self.records.push(record);
        Ok(())
    }
}

/// Drain `inbound` into `sink` until end-of-stream.
pub fn run_sink<S: ViewportSink + ?Sized>(
    sink: &mut S,
    inbound: &StageReceiver<ViewportRecord>,
) -> Result<StageSummary> {
    let mut records = 0u64;
    loop {
        match inbound.next()? {
            Envelope::Record(record) => {
                let frame_id = record.frame_id;
                if let Err(err) = sink.accept(record) {
                    log::error!("renderer: error on frame {}: {:#}", frame_id, err);
                    return Err(err.context("renderer stage failed"));
                }
                records += 1;
            }
            Envelope::EndOfStream => {
                sink.finish()?;
                log::info!("renderer: finished (received end-of-stream)");
                return Ok(StageSummary {
                    name: "renderer",
                    records,
                });
            }
        }
    }
}
