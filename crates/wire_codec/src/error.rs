//! Codec error types

use thiserror::Error;

/// Binary payload could not be parsed
///
/// Always fatal for the single message being decoded; a partially decoded
/// snapshot is never returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Input ended in the middle of a value
    #[error("unexpected end of input at offset {offset}: needed {needed} more byte(s)")]
    UnexpectedEof { offset: usize, needed: usize },

    /// Varint longer than 10 bytes
    #[error("varint overflow at offset {offset}")]
    VarintOverflow { offset: usize },

    /// Wire type the format does not use
    #[error("unsupported wire type {wire_type} for field {field} at offset {offset}")]
    UnsupportedWireType {
        field: u32,
        wire_type: u8,
        offset: usize,
    },

    /// Known field carried with the wrong wire type
    #[error("field {field} of {message} expects wire type {expected}, got {actual}")]
    WireTypeMismatch {
        message: &'static str,
        field: u32,
        expected: u8,
        actual: u8,
    },

    /// Field number zero or beyond 32 bits
    #[error("invalid field number at offset {offset}")]
    InvalidFieldNumber { offset: usize },

    /// Length prefix that does not fit the platform
    #[error("length {length} at offset {offset} exceeds addressable size")]
    LengthOverflow { length: u64, offset: usize },

    /// String field that is not UTF-8
    #[error("field {field} of {message} is not valid UTF-8")]
    InvalidUtf8 { message: &'static str, field: u32 },
}

/// Text payload that is not a message this client understands
///
/// Not a failure: the channel multiplexes message kinds, so these are
/// logged and skipped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotRecognized {
    #[error("payload is not valid JSON")]
    InvalidJson,

    #[error("payload has no string 'type' discriminator")]
    MissingType,

    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("'{0}' message has an unexpected shape")]
    InvalidShape(&'static str),
}
