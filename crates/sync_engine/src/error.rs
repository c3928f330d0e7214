//! Error types for sync engine components

use thiserror::Error;

/// Time-sync message rejected by the clock synchronizer
///
/// The estimate is left untouched when a message is rejected.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClockSyncError {
    #[error("{field} is not finite: {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("echoed send time is after receipt (round trip {round_trip_ms} ms)")]
    NegativeRoundTrip { round_trip_ms: f64 },
}
