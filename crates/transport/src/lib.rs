//! # Transport
//!
//! Socket opener implementations for the sync client.
//!
//! Responsibilities:
//! - Mock transport with scripted events and injectable failures
//! - Replay of recorded message streams (JSONL) at original pacing
//! - Recording writer producing files the replay transport reads
//!
//! Live network transports are supplied by the embedding application
//! through [`contracts::SocketOpener`].

pub mod mock;
pub mod replay;

pub use contracts::{BinaryType, DialOptions, Payload, Socket, SocketOpener, TransportEvent};
pub use mock::{MockSocketOpener, MockTransportHandle};
pub use replay::{
    load_recording, parse_recording, write_recording, RecordedFrame, ReplayConfig,
    ReplaySocketOpener,
};
