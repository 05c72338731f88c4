//! AMQP 0-9-1 frame codec.
//!
//! Bidirectional mapping between wire bytes and [`Frame`] values. Only the
//! connection class is decoded structurally; everything the handshake does not
//! care about (content frames, other classes) is carried opaquely.
//!
//! # Frame types
//!
//! | Type | Octet | Payload                              |
//! |------|-------|--------------------------------------|
//! | Method    | 1 | class id, method id, arguments   |
//! | Header    | 2 | content header (opaque)          |
//! | Body      | 3 | content body (opaque)            |
//! | Heartbeat | 8 | empty                            |
//!
//! # Usage
//!
//! ```rust
//! use amqp_handshake::codec::{decode_frame, Frame, Method, Open};
//! use bytes::BytesMut;
//!
//! let frame = Frame::method(0, Method::Open(Open::new("/")));
//! let mut buf = BytesMut::new();
//! frame.encode(&mut buf);
//!
//! let decoded = decode_frame(&mut buf, 0).unwrap();
//! assert_eq!(decoded, Some(frame));
//! ```

mod error;
mod frame;
mod method;
mod table;
mod wire;

pub use error::{DecodeError, DecodeResult};
pub use frame::{decode_frame, parse_frame, Frame, FramePayload};
pub use method::{method_id, Close, Method, MethodId, Open, Start, StartOk, Tune, CLASS_CONNECTION};
pub use table::{FieldTable, FieldValue, MAX_NESTING};
pub use wire::SHORT_STR_MAX;

/// Protocol header announcing AMQP 0-9-1.
pub const PROTOCOL_HEADER: [u8; 8] = *b"AMQP\x00\x00\x09\x01";

/// Method frame type.
pub const FRAME_METHOD: u8 = 1;
/// Content header frame type.
pub const FRAME_HEADER: u8 = 2;
/// Content body frame type.
pub const FRAME_BODY: u8 = 3;
/// Heartbeat frame type.
pub const FRAME_HEARTBEAT: u8 = 8;

/// Frame-end marker.
pub const FRAME_END: u8 = 0xCE;

/// Type, channel and size.
pub const FRAME_HEADER_SIZE: usize = 7;

/// Header plus end marker.
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_SIZE + 1;

/// Smallest frame-max a peer may impose.
pub const FRAME_MIN_SIZE: u32 = 4096;
