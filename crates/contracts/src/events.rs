//! Observable events emitted by the sync client.

use serde::{Deserialize, Serialize};

use crate::ConnectionState;

/// Event emitted by the sync client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Connection state changed
    ConnectionStatus {
        previous: ConnectionState,
        current: ConnectionState,
    },

    /// A forced correction was installed
    CorrectionApplied(CorrectionEvent),

    /// Roster membership changed
    RosterChanged(RosterChange),
}

/// Divergence between predicted and authoritative state on a keyframe
///
/// Purely informational: consumers must not feed it back into prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionEvent {
    pub entity_id: String,

    /// Euclidean position error (m)
    pub position_error: f64,

    /// Largest per-axis orientation error (deg)
    pub orientation_error: f64,

    pub tick_id: u64,
}

/// Roster delta plus the resulting membership
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterChange {
    pub joined: Vec<String>,
    pub left: Vec<String>,

    /// Full roster after the change (sorted)
    pub entity_ids: Vec<String>,
}

impl RosterChange {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}
