//! Bounded stage transport.
//!
//! Stages talk to each other only through these channels. Each channel has a
//! fixed capacity, is FIFO, and carries an explicit end-of-stream marker so a
//! consumer knows when its producer is done.

mod channel;

pub use channel::{
    stage_channel, ChannelStats, Envelope, StageReceiver, StageSender, TransportError,
};
