//! Shared receive → process → forward loop for pipeline stages.
//!
//! A stage reads one inbound channel and writes one outbound channel. On
//! end-of-stream it forwards exactly one marker and stops. On a processing
//! failure it makes one attempt to forward the marker, discards whatever that
//! attempt returns, and reports the original error.

use anyhow::Result;

use crate::transport::{Envelope, StageReceiver, StageSender};

/// A unit of per-record work run by `run_stage`.
pub trait Stage {
    type Input;
    type Output;

    /// Stage identifier used in logs and reports.
    fn name(&self) -> &'static str;

    /// Transform one record. An error aborts the stage.
    fn process(&mut self, input: Self::Input) -> Result<Self::Output>;
}

/// Outcome of a stage that reached end-of-stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageSummary {
    pub name: &'static str,
    pub records: u64,
}

/// Drive `stage` until its inbound channel delivers end-of-stream.
pub fn run_stage<S: Stage>(
    stage: &mut S,
    inbound: &StageReceiver<S::Input>,
    outbound: &StageSender<S::Output>,
) -> Result<StageSummary> {
    let name = stage.name();
    log::info!("{}: starting", name);
    let mut records = 0u64;
    loop {
        let envelope = match inbound.next() {
            Ok(envelope) => envelope,
            Err(err) => return Err(fail(name, outbound, err)),
        };
        let input = match envelope {
            Envelope::Record(input) => input,
            Envelope::EndOfStream => {
                outbound.finish()?;
                log::info!("{}: finished after {} records (received end-of-stream)", name, records);
                return Ok(StageSummary { name, records });
            }
        };
        let output = match stage.process(input) {
            Ok(output) => output,
            Err(err) => return Err(fail(name, outbound, err)),
        };
        outbound.put_record(output)?;
        records += 1;
    }
}

fn fail<T>(name: &str, outbound: &StageSender<T>, err: anyhow::Error) -> anyhow::Error {
    log::error!("{}: error: {:#}", name, err);
    outbound.finish_best_effort();
    err.context(format!("{} stage failed", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::stage_channel;
    use anyhow::bail;
    use std::time::Duration;

    const SHORT: Duration = Duration::from_millis(20);

    struct Doubler;

    impl Stage for Doubler {
        type Input = i32;
        type Output = i32;

        fn name(&self) -> &'static str {
            "doubler"
        }

        fn process(&mut self, input: i32) -> Result<i32> {
            if input < 0 {
                bail!("negative input {}", input);
            }
            Ok(input * 2)
        }
    }

    fn drain(rx: &StageReceiver<i32>) -> (Vec<i32>, usize) {
        let mut records = Vec::new();
        let mut markers = 0;
        while let Ok(Some(envelope)) = rx.get(SHORT) {
            match envelope {
                Envelope::Record(value) => records.push(value),
                Envelope::EndOfStream => markers += 1,
            }
        }
        (records, markers)
    }

    #[test]
    fn forwards_records_then_one_marker() -> Result<()> {
        let (in_tx, in_rx) = stage_channel("in", 8, SHORT);
        let (out_tx, out_rx) = stage_channel("out", 8, SHORT);
        in_tx.put_record(1)?;
        in_tx.put_record(2)?;
        in_tx.finish()?;
        // Anything after the marker must not be read.
        in_tx.put_record(3)?;

        let summary = run_stage(&mut Doubler, &in_rx, &out_tx)?;
        assert_eq!(summary, StageSummary { name: "doubler", records: 2 });
        assert_eq!(drain(&out_rx), (vec![2, 4], 1));
        assert!(matches!(in_rx.get(SHORT)?, Some(Envelope::Record(3))));
        Ok(())
    }

    #[test]
    fn failure_forwards_marker_and_keeps_original_error() -> Result<()> {
        let (in_tx, in_rx) = stage_channel("in", 8, SHORT);
        let (out_tx, out_rx) = stage_channel("out", 8, SHORT);
        in_tx.put_record(5)?;
        in_tx.put_record(-1)?;
        in_tx.put_record(6)?;

        let err = run_stage(&mut Doubler, &in_rx, &out_tx).unwrap_err();
        assert!(format!("{:#}", err).contains("negative input -1"));
        assert_eq!(drain(&out_rx), (vec![10], 1));
        Ok(())
    }

    #[test]
    fn failure_with_full_outbound_still_reports_original_error() -> Result<()> {
        let (in_tx, in_rx) = stage_channel("in", 8, SHORT);
        let (out_tx, out_rx) = stage_channel("out", 1, SHORT);
        in_tx.put_record(1)?;
        in_tx.put_record(-2)?;

        let err = run_stage(&mut Doubler, &in_rx, &out_tx).unwrap_err();
        assert!(format!("{:#}", err).contains("negative input -2"));
        assert_eq!(drain(&out_rx), (vec![2], 0));
        Ok(())
    }

    #[test]
    fn upstream_disconnect_is_fatal() {
        let (in_tx, in_rx) = stage_channel::<i32>("in", 8, SHORT);
        let (out_tx, out_rx) = stage_channel("out", 8, SHORT);
        drop(in_tx);
        assert!(run_stage(&mut Doubler, &in_rx, &out_tx).is_err());
        assert_eq!(drain(&out_rx), (vec![], 1));
    }
}
