//! Snapshot data model
//!
//! Authoritative world snapshots as decoded from the wire, and the state
//! handed back to callers.

use serde::{Deserialize, Serialize};

/// Position in world units
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Euler angles in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Orientation {
    pub yaw_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
}

impl Orientation {
    pub const fn new(yaw_deg: f64, pitch_deg: f64, roll_deg: f64) -> Self {
        Self {
            yaw_deg,
            pitch_deg,
            roll_deg,
        }
    }
}

/// One entity update inside a [`WorldSnapshot`]
///
/// `tick_id`, `captured_at_ms` and `keyframe` are optional on the wire and
/// fall back to the enclosing snapshot's values when absent. `active` is
/// only present on updates that affect the roster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity ID (non-empty, unique within one snapshot)
    pub entity_id: String,

    /// Entity-level tick override
    pub tick_id: Option<u64>,

    /// Entity-level capture time override (authoritative ms)
    pub captured_at_ms: Option<i64>,

    /// Entity-level keyframe override
    pub keyframe: Option<bool>,

    /// Roster flag (join when true, despawn when false)
    pub active: Option<bool>,

    pub position: Vector3,

    pub orientation: Orientation,
}

impl EntitySnapshot {
    /// Create an entity update without overrides
    pub fn new(entity_id: impl Into<String>, position: Vector3, orientation: Orientation) -> Self {
        Self {
            entity_id: entity_id.into(),
            position,
            orientation,
            ..Default::default()
        }
    }

    /// Resolve the entity against its snapshot's fallback values
    pub fn resolve(&self, snapshot: &WorldSnapshot) -> InterpolatedState {
        InterpolatedState {
            tick_id: self.tick_id.unwrap_or(snapshot.tick_id),
            keyframe: self.keyframe.unwrap_or(snapshot.keyframe),
            captured_at_ms: self.captured_at_ms.unwrap_or(snapshot.captured_at_ms),
            position: self.position,
            orientation: self.orientation,
        }
    }
}

/// Authoritative world update for a single server tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick_id: u64,

    /// Authoritative capture time (server ms)
    pub captured_at_ms: i64,

    pub keyframe: bool,

    /// Entity updates in wire order
    pub entities: Vec<EntitySnapshot>,
}

/// Snapshot waiting in the reconciliation buffer
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSnapshot {
    pub snapshot: WorldSnapshot,

    /// Local arrival time (ms)
    pub received_at_ms: f64,
}

/// Entity state returned to callers
///
/// Either interpolated between authoritative samples or a forced
/// correction pinned to a keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterpolatedState {
    pub tick_id: u64,
    pub keyframe: bool,
    pub captured_at_ms: i64,
    pub position: Vector3,
    pub orientation: Orientation,
}

/// Server clock correlation message (`"type": "time_sync"`)
///
/// The broker broadcasts its wall clock periodically; clients that sent a
/// probe get their send timestamp echoed back for round-trip compensation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSyncMessage {
    /// Authoritative server time when the message was produced (ms)
    #[serde(alias = "serverTimestampMs", alias = "serverTimeMs")]
    pub server_timestamp_ms: f64,

    /// Echoed local send time of the probe that triggered this reply (ms)
    #[serde(
        default,
        alias = "clientSendTimestampMs",
        alias = "clientSendTimeMs",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_send_timestamp_ms: Option<f64>,

    /// Simulation clock (ms)
    #[serde(
        default,
        alias = "simulatedTimestampMs",
        skip_serializing_if = "Option::is_none"
    )]
    pub simulated_timestamp_ms: Option<f64>,

    /// Server-side drift hint (ms)
    #[serde(
        default,
        alias = "recommendedOffsetMs",
        skip_serializing_if = "Option::is_none"
    )]
    pub recommended_offset_ms: Option<f64>,
}

impl TimeSyncMessage {
    pub fn new(server_timestamp_ms: f64) -> Self {
        Self {
            server_timestamp_ms,
            client_send_timestamp_ms: None,
            simulated_timestamp_ms: None,
            recommended_offset_ms: None,
        }
    }
}
