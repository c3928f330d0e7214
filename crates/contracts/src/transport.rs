//! Transport seam
//!
//! The sync client never establishes connections itself. An injected
//! [`SocketOpener`] produces a receive-only [`Socket`] and pushes
//! [`TransportEvent`]s into the channel the client drains on every poll.

use std::future::Future;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use validator::Validate;

use crate::TransportError;

/// How the transport should surface binary frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryType {
    /// Frames are delivered as ready bytes
    #[default]
    Bytes,
    /// Frames are delivered as deferred reads
    Blob,
}

/// Options handed to the socket opener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DialOptions {
    /// Endpoint URL (or recording path for replay transports)
    #[validate(length(min = 1))]
    pub url: String,

    /// Requested sub-protocols
    pub protocols: Vec<String>,

    /// Binary frame delivery mode
    pub binary_type: BinaryType,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            url: "ws://localhost:43127/ws".to_string(),
            protocols: Vec::new(),
            binary_type: BinaryType::Bytes,
        }
    }
}

/// Message payload as delivered by the transport
#[derive(Debug)]
pub enum Payload {
    /// Text frame (JSON envelope)
    Text(String),
    /// Binary frame
    Binary(Bytes),
    /// Binary frame whose bytes are still being read
    Blob(oneshot::Receiver<std::io::Result<Bytes>>),
}

/// Transport callbacks, delivered in order through a channel
#[derive(Debug)]
pub enum TransportEvent {
    Open,
    Close { code: Option<u16>, reason: String },
    Error { message: String },
    Message(Payload),
}

/// Sending half handed to transports
pub type TransportSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiving half owned by the sync client
pub type TransportReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Open duplex socket, used receive-only
pub trait Socket: Send {
    /// Configure how binary frames are surfaced
    fn set_binary_type(&mut self, binary_type: BinaryType);

    /// Close the socket
    ///
    /// Idempotent: closing an already closed socket is a no-op.
    fn close(&mut self, code: Option<u16>, reason: Option<&str>);
}

/// Transport-opening function
///
/// Implementations own the handshake and credentials; on success every
/// subsequent transport callback is sent through `events`.
pub trait SocketOpener: Send + Sync {
    fn open(
        &self,
        dial: &DialOptions,
        events: TransportSender,
    ) -> impl Future<Output = Result<Box<dyn Socket>, TransportError>> + Send;
}
