//! JSON envelope routing and snapshot normalization.
//!
//! Text frames share the socket with other message kinds, so nothing here
//! fails hard: unparseable or mis-shaped payloads come back as
//! [`NotRecognized`] and the caller logs and drops them.

use contracts::{EntitySnapshot, Orientation, TimeSyncMessage, Vector3, WorldSnapshot};
use serde_json::{Map, Value};
use tracing::trace;

use crate::NotRecognized;

const TYPE_TIME_SYNC: &str = "time_sync";
const TYPE_WORLD_SNAPSHOT: &str = "world_snapshot";

/// Recognized text message
#[derive(Debug, Clone, PartialEq)]
pub enum TextMessage {
    TimeSync(TimeSyncMessage),
    WorldSnapshot(WorldSnapshot),
}

/// Parse a text frame and route it by its `type` discriminator
pub fn parse_text_message(text: &str) -> Result<TextMessage, NotRecognized> {
    let value: Value = serde_json::from_str(text).map_err(|_| NotRecognized::InvalidJson)?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(NotRecognized::MissingType)?
        .to_owned();

    match kind.as_str() {
        TYPE_TIME_SYNC => serde_json::from_value::<TimeSyncMessage>(value)
            .map(TextMessage::TimeSync)
            .map_err(|_| NotRecognized::InvalidShape(TYPE_TIME_SYNC)),
        TYPE_WORLD_SNAPSHOT => normalize_world_snapshot(&value)
            .map(TextMessage::WorldSnapshot)
            .ok_or(NotRecognized::InvalidShape(TYPE_WORLD_SNAPSHOT)),
        other => Err(NotRecognized::UnknownType(other.to_owned())),
    }
}

/// Normalize a `world_snapshot` object into a [`WorldSnapshot`]
///
/// Returns `None` unless the value is an object with an `entities` array.
/// Fields are coerced leniently (numeric strings, numeric booleans) with
/// missing numbers defaulting to 0 and missing booleans to `false`.
/// Entities without a usable id are dropped.
pub fn normalize_world_snapshot(value: &Value) -> Option<WorldSnapshot> {
    let object = value.as_object()?;
    let entities = object.get("entities")?.as_array()?;

    let entities: Vec<EntitySnapshot> = entities.iter().filter_map(normalize_entity).collect();

    let snapshot = WorldSnapshot {
        tick_id: lookup(object, &["tickId", "tick_id"])
            .and_then(coerce_u64)
            .unwrap_or(0),
        captured_at_ms: lookup(object, &["capturedAtMs", "captured_at_ms"])
            .and_then(coerce_i64)
            .unwrap_or(0),
        keyframe: lookup(object, &["keyframe"])
            .and_then(coerce_bool)
            .unwrap_or(false),
        entities,
    };

    trace!(
        tick_id = snapshot.tick_id,
        entities = snapshot.entities.len(),
        "normalized JSON world snapshot"
    );
    Some(snapshot)
}

fn normalize_entity(value: &Value) -> Option<EntitySnapshot> {
    let object = value.as_object()?;

    let entity_id = lookup(object, &["entityId", "entity_id", "id"]).and_then(coerce_id)?;
    if entity_id.is_empty() {
        return None;
    }

    Some(EntitySnapshot {
        entity_id,
        tick_id: lookup(object, &["tickId", "tick_id"]).and_then(coerce_u64),
        captured_at_ms: lookup(object, &["capturedAtMs", "captured_at_ms"]).and_then(coerce_i64),
        keyframe: lookup(object, &["keyframe"]).and_then(coerce_bool),
        active: lookup(object, &["active"]).and_then(coerce_bool),
        position: lookup(object, &["position"])
            .and_then(Value::as_object)
            .map(normalize_position)
            .unwrap_or_default(),
        orientation: lookup(object, &["orientation"])
            .and_then(Value::as_object)
            .map(normalize_orientation)
            .unwrap_or_default(),
    })
}

fn normalize_position(object: &Map<String, Value>) -> Vector3 {
    Vector3 {
        x: number_or_zero(object, &["x"]),
        y: number_or_zero(object, &["y"]),
        z: number_or_zero(object, &["z"]),
    }
}

fn normalize_orientation(object: &Map<String, Value>) -> Orientation {
    Orientation {
        yaw_deg: number_or_zero(object, &["yawDeg", "yaw_deg", "yaw"]),
        pitch_deg: number_or_zero(object, &["pitchDeg", "pitch_deg", "pitch"]),
        roll_deg: number_or_zero(object, &["rollDeg", "roll_deg", "roll"]),
    }
}

/// First present, non-null value among `keys`
fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

fn number_or_zero(object: &Map<String, Value>, keys: &[&str]) -> f64 {
    lookup(object, keys).and_then(coerce_f64).unwrap_or(0.0)
}

fn coerce_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn coerce_u64(value: &Value) -> Option<u64> {
    if let Some(exact) = value.as_u64() {
        return Some(exact);
    }
    if let Some(Ok(exact)) = value.as_str().map(|text| text.trim().parse::<u64>()) {
        return Some(exact);
    }
    // saturating float-to-int cast; negatives clamp to 0
    coerce_f64(value).map(|number| number.trunc() as u64)
}

fn coerce_i64(value: &Value) -> Option<i64> {
    if let Some(exact) = value.as_i64() {
        return Some(exact);
    }
    if let Some(Ok(exact)) = value.as_str().map(|text| text.trim().parse::<i64>()) {
        return Some(exact);
    }
    coerce_f64(value).map(|number| number.trunc() as i64)
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|n| n != 0.0),
        Value::String(text) => match text.trim() {
            "true" | "1" => Some(true),
            "false" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_id(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_owned()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
