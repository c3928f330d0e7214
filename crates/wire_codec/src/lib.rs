//! # Wire Codec
//!
//! Maps wire bytes and JSON envelopes onto the snapshot data model.
//!
//! Responsibilities:
//! - Tag/length-value binary decoding with forward-compatible field skipping
//! - Matching encoder (recordings, simulation, round-trip tests)
//! - JSON envelope routing and `world_snapshot` normalization
//!
//! ## Example
//!
//! ```
//! use contracts::{EntitySnapshot, Orientation, Vector3, WorldSnapshot};
//! use wire_codec::{decode_world_snapshot, encode_world_snapshot};
//!
//! let snapshot = WorldSnapshot {
//!     tick_id: 1,
//!     captured_at_ms: 100,
//!     keyframe: true,
//!     entities: vec![EntitySnapshot::new(
//!         "alpha",
//!         Vector3::new(1.0, 2.0, 3.0),
//!         Orientation::default(),
//!     )],
//! };
//! let bytes = encode_world_snapshot(&snapshot);
//! assert_eq!(decode_world_snapshot(&bytes).unwrap(), snapshot);
//! ```

mod binary;
mod error;
mod json;
mod reader;
mod writer;

pub use binary::{decode_world_snapshot, encode_world_snapshot};
pub use error::{DecodeError, NotRecognized};
pub use json::{normalize_world_snapshot, parse_text_message, TextMessage};
pub use reader::{Tag, WireReader, WireType};
pub use writer::WireWriter;
