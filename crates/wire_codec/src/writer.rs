//! Encoder counterpart of [`WireReader`](crate::WireReader).

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Tag, WireType};

/// Append-only encoder for the tag/length-value format
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.put_u8((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    pub fn write_tag(&mut self, field: u32, wire_type: WireType) {
        self.write_varint(Tag::new(field, wire_type).encoded());
    }

    pub fn write_bool_field(&mut self, field: u32, value: bool) {
        self.write_tag(field, WireType::Varint);
        self.write_varint(u64::from(value));
    }

    pub fn write_uint64_field(&mut self, field: u32, value: u64) {
        self.write_tag(field, WireType::Varint);
        self.write_varint(value);
    }

    /// Two's-complement int64, matching `read_int64`
    pub fn write_int64_field(&mut self, field: u32, value: i64) {
        self.write_tag(field, WireType::Varint);
        self.write_varint(value as u64);
    }

    pub fn write_double_field(&mut self, field: u32, value: f64) {
        self.write_tag(field, WireType::Fixed64);
        self.buf.put_u64_le(value.to_bits());
    }

    pub fn write_bytes_field(&mut self, field: u32, value: &[u8]) {
        self.write_tag(field, WireType::LengthDelimited);
        self.write_varint(value.len() as u64);
        self.buf.put_slice(value);
    }

    pub fn write_string_field(&mut self, field: u32, value: &str) {
        self.write_bytes_field(field, value.as_bytes());
    }

    /// Encode a nested message as a length-delimited field
    pub fn write_message_field(&mut self, field: u32, encode: impl FnOnce(&mut WireWriter)) {
        let mut nested = WireWriter::new();
        encode(&mut nested);
        self.write_bytes_field(field, &nested.buf);
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}
