//! Sync client error types

use contracts::TransportError;
use thiserror::Error;

/// Errors surfaced to callers of [`SyncClient`](crate::SyncClient)
///
/// Only `connect()` returns errors; per-message failures are logged and
/// counted instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// Opening the transport failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
