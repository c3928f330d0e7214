//! Cursor over an encoded message with typed reads.

use crate::DecodeError;

const MAX_VARINT_BYTES: usize = 10;

/// Wire types of the tag/length-value format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    /// LEB128 varint (bool, int32/64, uint32/64, length prefixes)
    Varint = 0,
    /// 8 bytes little-endian (double)
    Fixed64 = 1,
    /// Varint length followed by that many bytes (string, nested, bytes)
    LengthDelimited = 2,
    /// Legacy group start, never produced by this format
    StartGroup = 3,
    /// Legacy group end, treated as an end-of-message marker
    EndGroup = 4,
    /// 4 bytes little-endian
    Fixed32 = 5,
}

impl WireType {
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Field header: `(field << 3) | wire_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub field: u32,
    pub wire_type: u8,
}

impl Tag {
    pub const fn new(field: u32, wire_type: WireType) -> Self {
        Self {
            field,
            wire_type: wire_type.bits(),
        }
    }

    /// Encoded varint value of this tag
    pub const fn encoded(self) -> u64 {
        ((self.field as u64) << 3) | self.wire_type as u64
    }

    pub fn is(self, wire_type: WireType) -> bool {
        self.wire_type == wire_type.bits()
    }
}

/// Read cursor over one encoded message
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Offset of the next unread byte
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read the next field header
    ///
    /// Returns `None` at the end of the message: end of input, a zero tag,
    /// or a group-end marker. The last two only guard against truncated or
    /// corrupted input looping forever.
    pub fn read_tag(&mut self) -> Result<Option<Tag>, DecodeError> {
        if self.is_empty() {
            return Ok(None);
        }

        let offset = self.pos;
        let raw = self.read_varint()?;
        if raw == 0 {
            return Ok(None);
        }

        let wire_type = (raw & 7) as u8;
        if wire_type == WireType::EndGroup.bits() {
            return Ok(None);
        }

        let field = u32::try_from(raw >> 3)
            .ok()
            .filter(|field| *field != 0)
            .ok_or(DecodeError::InvalidFieldNumber { offset })?;

        Ok(Some(Tag { field, wire_type }))
    }

    /// Read an unsigned LEB128 varint
    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let start = self.pos;
        let mut value = 0u64;

        for i in 0..MAX_VARINT_BYTES {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or(DecodeError::UnexpectedEof {
                    offset: self.pos,
                    needed: 1,
                })?;
            self.pos += 1;

            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }

        Err(DecodeError::VarintOverflow { offset: start })
    }

    #[inline]
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_varint()? != 0)
    }

    #[inline]
    pub fn read_uint64(&mut self) -> Result<u64, DecodeError> {
        self.read_varint()
    }

    /// Two's-complement int64 (not zigzag)
    #[inline]
    pub fn read_int64(&mut self) -> Result<i64, DecodeError> {
        Ok(self.read_varint()? as i64)
    }

    pub fn read_fixed64(&mut self) -> Result<u64, DecodeError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    #[inline]
    pub fn read_double(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_bits(self.read_fixed64()?))
    }

    /// Read a varint length prefix and return exactly that many bytes
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8], DecodeError> {
        let offset = self.pos;
        let length = self.read_varint()?;
        let length =
            usize::try_from(length).map_err(|_| DecodeError::LengthOverflow { length, offset })?;
        self.take(length)
    }

    /// Skip the value following `tag` using its wire type alone
    pub fn skip(&mut self, tag: Tag) -> Result<(), DecodeError> {
        match tag.wire_type {
            0 => self.read_varint().map(|_| ()),
            1 => self.take(8).map(|_| ()),
            2 => self.read_length_delimited().map(|_| ()),
            5 => self.take(4).map(|_| ()),
            wire_type => Err(DecodeError::UnsupportedWireType {
                field: tag.field,
                wire_type,
                offset: self.pos,
            }),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEof {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}
