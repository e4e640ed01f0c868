//! Bounded channel with blocking-with-timeout put/get.
//!
//! `put` never drops a record: on timeout it logs and waits again, so a full
//! channel only throttles the producer. `get` timing out is likewise not an
//! error; the caller simply asks again. The only hard failure is a
//! disconnected peer, which means the thread on the other side has ended.

use anyhow::Result;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::time::Duration;
use thiserror::Error;

/// Hard transport failures. Both mean the peer thread has already ended.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{channel}: downstream stage disconnected")]
    DownstreamGone { channel: String },
    #[error("{channel}: upstream stage disconnected without end-of-stream")]
    UpstreamGone { channel: String },
}

impl TransportError {
    /// True when `err` is, or was caused by, a disconnected channel.
    ///
    /// Such an error is a consequence of another stage ending, not a cause.
    pub fn is_disconnect(err: &anyhow::Error) -> bool {
        err.chain().any(|cause| cause.downcast_ref::<TransportError>().is_some())
    }
}

/// Unit carried by a stage channel.
#[derive(Debug)]
pub enum Envelope<T> {
    Record(T),
    /// No further records will follow on this channel.
    EndOfStream,
}

impl<T> Envelope<T> {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Envelope::EndOfStream)
    }

    pub fn into_record(self) -> Option<T> {
        match self {
            Envelope::Record(record) => Some(record),
            Envelope::EndOfStream => None,
        }
    }
}

/// Create a bounded stage channel.
///
/// `capacity` is clamped to at least one slot; a zero-capacity crossbeam
/// channel is a rendezvous channel, which is not what a stage queue is.
/// `timeout` is the wait used by the retrying `put`/`next` helpers.
pub fn stage_channel<T>(
    name: &str,
    capacity: usize,
    timeout: Duration,
) -> (StageSender<T>, StageReceiver<T>) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        StageSender {
            name: name.to_string(),
            tx,
            timeout,
        },
        StageReceiver {
            name: name.to_string(),
            rx,
            timeout,
        },
    )
}

/// Producer side of a stage channel.
pub struct StageSender<T> {
    name: String,
    tx: Sender<Envelope<T>>,
    timeout: Duration,
}

impl<T> StageSender<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Single bounded attempt. On failure the envelope is handed back inside the error.
    pub fn try_put(
        &self,
        envelope: Envelope<T>,
        timeout: Duration,
    ) -> Result<(), SendTimeoutError<Envelope<T>>> {
        self.tx.send_timeout(envelope, timeout)
    }

    /// Enqueue, waiting as long as it takes for capacity.
    ///
    /// Fails only when the receiving stage is gone.
    pub fn put(&self, envelope: Envelope<T>) -> Result<()> {
        let mut pending = envelope;
        loop {
            match self.tx.send_timeout(pending, self.timeout) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => {
                    log::warn!(
                        "{}: channel full ({} queued), waiting...",
                        self.name,
                        self.tx.len()
                    );
                    pending = returned;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    return Err(TransportError::DownstreamGone {
                        channel: self.name.clone(),
                    }
                    .into());
                }
            }
        }
    }

    pub fn put_record(&self, record: T) -> Result<()> {
        self.put(Envelope::Record(record))
    }

    /// Enqueue the end-of-stream marker with the same retry discipline as `put`.
    pub fn finish(&self) -> Result<()> {
        self.put(Envelope::EndOfStream)
    }

    /// One attempt to enqueue the end-of-stream marker; any failure is discarded.
    ///
    /// Used on the failure path, where the original error is what gets reported.
    pub fn finish_best_effort(&self) {
        if let Err(err) = self.try_put(Envelope::EndOfStream, self.timeout) {
            log::debug!(
                "{}: could not forward end-of-stream after failure: {}",
                self.name,
                err
            );
        }
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            capacity: self.tx.capacity().unwrap_or(0),
            len: self.tx.len(),
            is_full: self.tx.is_full(),
            is_empty: self.tx.is_empty(),
        }
    }
}

/// Consumer side of a stage channel.
pub struct StageReceiver<T> {
    name: String,
    rx: Receiver<Envelope<T>>,
    timeout: Duration,
}

impl<T> StageReceiver<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait up to `timeout`. `Ok(None)` means nothing arrived yet.
    pub fn get(&self, timeout: Duration) -> Result<Option<Envelope<T>>> {
        match self.rx.recv_timeout(timeout) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::UpstreamGone {
                channel: self.name.clone(),
            }
            .into()),
        }
    }

    /// Wait for the next envelope, retrying on timeout with no limit.
    pub fn next(&self) -> Result<Envelope<T>> {
        loop {
            if let Some(envelope) = self.get(self.timeout)? {
                return Ok(envelope);
            }
            log::debug!("{}: no record within {:?}, retrying", self.name, self.timeout);
        }
    }
}

/// Snapshot of a channel's occupancy.
#[derive(Debug, Clone, Copy)]
pub struct ChannelStats {
    pub capacity: usize,
    pub len: usize,
    pub is_full: bool,
    pub is_empty: bool,
}

impl ChannelStats {
    /// Occupancy as a fraction of capacity (0.0 to 1.0).
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.len as f64 / self.capacity as f64
        }
    }
}
