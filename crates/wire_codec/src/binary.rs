//! Binary snapshot codec.
//!
//! Field maps:
//! - `WorldSnapshot { 2: captured_at_ms int64, 3: repeated EntitySnapshot, 6: tick_id uint64, 7: keyframe bool }`
//! - `EntitySnapshot { 2: entity_id string, 4: position Vector3, 6: orientation Orientation, 8: active bool,
//!   10: captured_at_ms int64, 11: tick_id uint64, 12: keyframe bool }`
//! - `Vector3 { 1: x, 2: y, 3: z }` and `Orientation { 1: yaw_deg, 2: pitch_deg, 3: roll_deg }`, all doubles
//!
//! Every other field number is skipped by wire type.

use bytes::Bytes;
use contracts::{EntitySnapshot, Orientation, Vector3, WorldSnapshot};
use tracing::instrument;

use crate::{DecodeError, Tag, WireReader, WireType, WireWriter};

mod world {
    pub const CAPTURED_AT_MS: u32 = 2;
    pub const ENTITIES: u32 = 3;
    pub const TICK_ID: u32 = 6;
    pub const KEYFRAME: u32 = 7;
}

mod entity {
    pub const ENTITY_ID: u32 = 2;
    pub const POSITION: u32 = 4;
    pub const ORIENTATION: u32 = 6;
    pub const ACTIVE: u32 = 8;
    pub const CAPTURED_AT_MS: u32 = 10;
    pub const TICK_ID: u32 = 11;
    pub const KEYFRAME: u32 = 12;
}

mod axis {
    pub const FIRST: u32 = 1;
    pub const SECOND: u32 = 2;
    pub const THIRD: u32 = 3;
}

/// Decode a `WorldSnapshot` message
#[instrument(
    level = "trace",
    name = "wire_decode_world_snapshot",
    skip(bytes),
    fields(len = bytes.len())
)]
pub fn decode_world_snapshot(bytes: &[u8]) -> Result<WorldSnapshot, DecodeError> {
    const MESSAGE: &str = "WorldSnapshot";

    let mut reader = WireReader::new(bytes);
    let mut snapshot = WorldSnapshot::default();

    while let Some(tag) = reader.read_tag()? {
        match tag.field {
            world::CAPTURED_AT_MS => {
                expect(MESSAGE, tag, WireType::Varint)?;
                snapshot.captured_at_ms = reader.read_int64()?;
            }
            world::ENTITIES => {
                expect(MESSAGE, tag, WireType::LengthDelimited)?;
                let body = reader.read_length_delimited()?;
                snapshot.entities.push(decode_entity(body)?);
            }
            world::TICK_ID => {
                expect(MESSAGE, tag, WireType::Varint)?;
                snapshot.tick_id = reader.read_uint64()?;
            }
            world::KEYFRAME => {
                expect(MESSAGE, tag, WireType::Varint)?;
                snapshot.keyframe = reader.read_bool()?;
            }
            _ => reader.skip(tag)?,
        }
    }

    Ok(snapshot)
}

fn decode_entity(bytes: &[u8]) -> Result<EntitySnapshot, DecodeError> {
    const MESSAGE: &str = "EntitySnapshot";

    let mut reader = WireReader::new(bytes);
    let mut entity = EntitySnapshot::default();

    while let Some(tag) = reader.read_tag()? {
        match tag.field {
            entity::ENTITY_ID => {
                expect(MESSAGE, tag, WireType::LengthDelimited)?;
                let raw = reader.read_length_delimited()?;
                entity.entity_id = std::str::from_utf8(raw)
                    .map_err(|_| DecodeError::InvalidUtf8 {
                        message: MESSAGE,
                        field: tag.field,
                    })?
                    .to_owned();
            }
            entity::POSITION => {
                expect(MESSAGE, tag, WireType::LengthDelimited)?;
                let [x, y, z] = decode_triple("Vector3", reader.read_length_delimited()?)?;
                entity.position = Vector3 { x, y, z };
            }
            entity::ORIENTATION => {
                expect(MESSAGE, tag, WireType::LengthDelimited)?;
                let [yaw_deg, pitch_deg, roll_deg] =
                    decode_triple("Orientation", reader.read_length_delimited()?)?;
                entity.orientation = Orientation {
                    yaw_deg,
                    pitch_deg,
                    roll_deg,
                };
            }
            entity::ACTIVE => {
                expect(MESSAGE, tag, WireType::Varint)?;
                entity.active = Some(reader.read_bool()?);
            }
            entity::CAPTURED_AT_MS => {
                expect(MESSAGE, tag, WireType::Varint)?;
                entity.captured_at_ms = Some(reader.read_int64()?);
            }
            entity::TICK_ID => {
                expect(MESSAGE, tag, WireType::Varint)?;
                entity.tick_id = Some(reader.read_uint64()?);
            }
            entity::KEYFRAME => {
                expect(MESSAGE, tag, WireType::Varint)?;
                entity.keyframe = Some(reader.read_bool()?);
            }
            _ => reader.skip(tag)?,
        }
    }

    Ok(entity)
}

/// `Vector3` and `Orientation` share the same three-double layout
fn decode_triple(message: &'static str, bytes: &[u8]) -> Result<[f64; 3], DecodeError> {
    let mut reader = WireReader::new(bytes);
    let mut values = [0.0; 3];

    while let Some(tag) = reader.read_tag()? {
        let slot = match tag.field {
            axis::FIRST => 0,
            axis::SECOND => 1,
            axis::THIRD => 2,
            _ => {
                reader.skip(tag)?;
                continue;
            }
        };
        expect(message, tag, WireType::Fixed64)?;
        values[slot] = reader.read_double()?;
    }

    Ok(values)
}

fn expect(message: &'static str, tag: Tag, expected: WireType) -> Result<(), DecodeError> {
    if tag.is(expected) {
        Ok(())
    } else {
        Err(DecodeError::WireTypeMismatch {
            message,
            field: tag.field,
            expected: expected.bits(),
            actual: tag.wire_type,
        })
    }
}

/// Encode a `WorldSnapshot` message
///
/// Zero scalars are omitted; optional entity fields are written whenever
/// present, including `active = false`.
pub fn encode_world_snapshot(snapshot: &WorldSnapshot) -> Bytes {
    let mut writer = WireWriter::with_capacity(32 + snapshot.entities.len() * 96);

    if snapshot.captured_at_ms != 0 {
        writer.write_int64_field(world::CAPTURED_AT_MS, snapshot.captured_at_ms);
    }
    for entity in &snapshot.entities {
        writer.write_message_field(world::ENTITIES, |nested| encode_entity(nested, entity));
    }
    if snapshot.tick_id != 0 {
        writer.write_uint64_field(world::TICK_ID, snapshot.tick_id);
    }
    if snapshot.keyframe {
        writer.write_bool_field(world::KEYFRAME, true);
    }

    writer.freeze()
}

fn encode_entity(writer: &mut WireWriter, entity: &EntitySnapshot) {
    if !entity.entity_id.is_empty() {
        writer.write_string_field(entity::ENTITY_ID, &entity.entity_id);
    }

    let position = entity.position;
    writer.write_message_field(entity::POSITION, |nested| {
        encode_triple(nested, [position.x, position.y, position.z])
    });

    let orientation = entity.orientation;
    writer.write_message_field(entity::ORIENTATION, |nested| {
        encode_triple(
            nested,
            [
                orientation.yaw_deg,
                orientation.pitch_deg,
                orientation.roll_deg,
            ],
        )
    });

    if let Some(active) = entity.active {
        writer.write_bool_field(entity::ACTIVE, active);
    }
    if let Some(captured_at_ms) = entity.captured_at_ms {
        writer.write_int64_field(entity::CAPTURED_AT_MS, captured_at_ms);
    }
    if let Some(tick_id) = entity.tick_id {
        writer.write_uint64_field(entity::TICK_ID, tick_id);
    }
    if let Some(keyframe) = entity.keyframe {
        writer.write_bool_field(entity::KEYFRAME, keyframe);
    }
}

fn encode_triple(writer: &mut WireWriter, values: [f64; 3]) {
    for (field, value) in [axis::FIRST, axis::SECOND, axis::THIRD].into_iter().zip(values) {
        // -0.0 keeps its sign on the wire
        if value.to_bits() != 0 {
            writer.write_double_field(field, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> WorldSnapshot {
        WorldSnapshot {
            tick_id: 4_242,
            captured_at_ms: 1_700_000_000_123,
            keyframe: true,
            entities: vec![
                EntitySnapshot {
                    active: Some(true),
                    ..EntitySnapshot::new(
                        "alpha",
                        Vector3::new(1.5, -2.25, 300.0),
                        Orientation::new(179.5, -12.0, 3.0),
                    )
                },
                EntitySnapshot {
                    tick_id: Some(4_241),
                    captured_at_ms: Some(-5),
                    keyframe: Some(false),
                    active: Some(false),
                    ..EntitySnapshot::new("bravo", Vector3::default(), Orientation::default())
                },
            ],
        }
    }

    #[test]
    fn test_round_trip() {
        let snapshot = sample_snapshot();
        let bytes = encode_world_snapshot(&snapshot);
        assert_eq!(decode_world_snapshot(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn test_negative_zero_keeps_sign() {
        let snapshot = WorldSnapshot {
            entities: vec![EntitySnapshot::new(
                "alpha",
                Vector3::new(-0.0, 0.0, 1.0),
                Orientation::default(),
            )],
            ..Default::default()
        };
        let decoded = decode_world_snapshot(&encode_world_snapshot(&snapshot)).unwrap();
        assert!(decoded.entities[0].position.x.is_sign_negative());
        assert!(decoded.entities[0].position.y.is_sign_positive());
    }

    #[test]
    fn test_empty_input_is_default_snapshot() {
        assert_eq!(decode_world_snapshot(&[]).unwrap(), WorldSnapshot::default());
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let mut writer = WireWriter::new();
        // fields a newer server might add, at both levels
        writer.write_uint64_field(1, 3);
        writer.write_string_field(15, "future");
        writer.write_message_field(world::ENTITIES, |nested| {
            nested.write_string_field(entity::ENTITY_ID, "alpha");
            nested.write_double_field(20, 9.0);
            nested.write_tag(21, WireType::Fixed32);
            nested.write_varint(0);
            nested.write_varint(0);
            nested.write_varint(0);
            nested.write_varint(0);
            nested.write_message_field(entity::POSITION, |vector| {
                vector.write_double_field(axis::FIRST, 4.0);
                vector.write_uint64_field(9, 1);
            });
        });
        writer.write_uint64_field(world::TICK_ID, 12);

        let snapshot = decode_world_snapshot(&writer.freeze()).unwrap();
        assert_eq!(snapshot.tick_id, 12);
        assert_eq!(snapshot.entities.len(), 1);
        assert_eq!(snapshot.entities[0].entity_id, "alpha");
        assert_eq!(snapshot.entities[0].position.x, 4.0);
    }

    #[test]
    fn test_truncated_input_fails() {
        let bytes = encode_world_snapshot(&sample_snapshot());
        let truncated = &bytes[..bytes.len() - 3];
        assert!(decode_world_snapshot(truncated).is_err());
    }

    #[test]
    fn test_zero_tag_stops_decoding() {
        let mut writer = WireWriter::new();
        writer.write_uint64_field(world::TICK_ID, 5);
        writer.write_varint(0);
        writer.write_uint64_field(world::TICK_ID, 99);

        let snapshot = decode_world_snapshot(&writer.freeze()).unwrap();
        assert_eq!(snapshot.tick_id, 5);
    }

    #[test]
    fn test_wire_type_mismatch_fails() {
        let mut writer = WireWriter::new();
        writer.write_double_field(world::TICK_ID, 1.0);
        assert!(matches!(
            decode_world_snapshot(&writer.freeze()),
            Err(DecodeError::WireTypeMismatch { field: 6, .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_entity_id_fails() {
        let mut writer = WireWriter::new();
        writer.write_message_field(world::ENTITIES, |nested| {
            nested.write_bytes_field(entity::ENTITY_ID, &[0xff, 0xfe]);
        });
        assert!(matches!(
            decode_world_snapshot(&writer.freeze()),
            Err(DecodeError::InvalidUtf8 { .. })
        ));
    }

    #[test]
    fn test_start_group_fails() {
        let mut writer = WireWriter::new();
        writer.write_tag(9, WireType::StartGroup);
        assert!(matches!(
            decode_world_snapshot(&writer.freeze()),
            Err(DecodeError::UnsupportedWireType { wire_type: 3, .. })
        ));
    }
}
