//! Codec error types.

use thiserror::Error;

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Malformed input on the wire.
///
/// Decode failures are never dropped silently: the reader hands them to the
/// frame handler, which treats them as terminal for the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame did not end with the 0xCE marker.
    #[error("invalid frame end marker: expected 0xce, found {found:#04x}")]
    BadFrameEnd {
        /// Byte found where the marker belongs.
        found: u8,
    },

    /// Input ended before a complete value could be read.
    #[error("truncated input: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes required by the value being read.
        needed: usize,
        /// Bytes actually left in the buffer.
        available: usize,
    },

    /// Frame type octet is not one AMQP 0-9-1 defines.
    #[error("unknown frame type {0}")]
    UnknownFrameType(u8),

    /// Method id not defined for the connection class.
    #[error("unknown method {method_id} in class {class_id}")]
    UnknownMethod {
        /// Class identifier.
        class_id: u16,
        /// Method identifier.
        method_id: u16,
    },

    /// Field table value carried an unknown type tag.
    #[error("invalid field value type {0:#04x}")]
    InvalidFieldType(u8),

    /// Field arrays and tables nested deeper than the decoder accepts.
    #[error("field table nesting exceeds {max} levels")]
    NestingTooDeep {
        /// Deepest nesting accepted.
        max: usize,
    },

    /// Short string or text field was not valid UTF-8.
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    /// Frame exceeds the negotiated (or pre-tune) maximum.
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared frame size, including header and end marker.
        size: u32,
        /// Maximum accepted size.
        max: u32,
    },

    /// Peer answered with its own protocol header, i.e. it refused our version.
    #[error("broker rejected protocol version, it supports AMQP {major}-{minor}-{revision}")]
    UnsupportedProtocol {
        /// Major version advertised by the broker.
        major: u8,
        /// Minor version advertised by the broker.
        minor: u8,
        /// Revision advertised by the broker.
        revision: u8,
    },
}
