//! Diagnostics snapshots.

/// Pending snapshot buffer status
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferStats {
    /// Snapshots currently buffered
    pub depth: usize,

    /// Snapshots evicted on overflow
    pub dropped_count: u64,

    /// Snapshots that arrived with an older capture time than their predecessor
    pub out_of_order_count: u64,

    /// Oldest buffered capture time
    pub oldest_captured_at_ms: Option<i64>,

    /// Newest buffered capture time
    pub newest_captured_at_ms: Option<i64>,
}

/// Counters kept by the sync client
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientStats {
    pub snapshots_received: u64,
    pub snapshots_ingested: u64,
    pub decode_failures: u64,
    pub unrecognized_messages: u64,
    pub time_sync_messages: u64,
    pub corrections_applied: u64,
}
