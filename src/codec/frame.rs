//! Frame encoding and decoding.
//!
//! ```text
//! +----------+--------------+-------------+-----------------+-----------+
//! | type: u8 | channel: u16 | size: u32   | payload[size]   | end: 0xCE |
//! +----------+--------------+-------------+-----------------+-----------+
//! ```
//!
//! The decoder works directly on a socket read buffer: it leaves partial
//! frames in place and only consumes bytes once a whole frame is available.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::{DecodeError, DecodeResult};
use super::method::Method;
use super::{
    FRAME_BODY, FRAME_END, FRAME_HEADER, FRAME_HEADER_SIZE, FRAME_HEARTBEAT, FRAME_METHOD,
    FRAME_OVERHEAD,
};

/// What a frame carries.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    /// A decoded method.
    Method(Method),
    /// Content header, kept opaque.
    Header(Bytes),
    /// Content body, kept opaque.
    Body(Bytes),
    /// Keep-alive with no payload.
    Heartbeat,
}

/// An addressed unit of data on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Logical channel; 0 is the connection itself.
    pub channel: u16,
    /// Frame contents.
    pub payload: FramePayload,
}

impl Frame {
    /// A method frame on the given channel.
    pub fn method(channel: u16, method: Method) -> Self {
        Self {
            channel,
            payload: FramePayload::Method(method),
        }
    }

    /// A heartbeat frame (always channel 0).
    pub fn heartbeat() -> Self {
        Self {
            channel: 0,
            payload: FramePayload::Heartbeat,
        }
    }

    /// Method carried by this frame, if any.
    pub fn as_method(&self) -> Option<&Method> {
        match &self.payload {
            FramePayload::Method(method) => Some(method),
            _ => None,
        }
    }

    /// Frame type octet.
    pub fn frame_type(&self) -> u8 {
        match self.payload {
            FramePayload::Method(_) => FRAME_METHOD,
            FramePayload::Header(_) => FRAME_HEADER,
            FramePayload::Body(_) => FRAME_BODY,
            FramePayload::Heartbeat => FRAME_HEARTBEAT,
        }
    }

    /// Short human-readable description for diagnostics.
    pub fn describe(&self) -> String {
        match &self.payload {
            FramePayload::Method(method) => {
                format!("{} on channel {}", method.id(), self.channel)
            },
            FramePayload::Header(_) => format!("content header on channel {}", self.channel),
            FramePayload::Body(_) => format!("content body on channel {}", self.channel),
            FramePayload::Heartbeat => format!("heartbeat on channel {}", self.channel),
        }
    }

    /// Append the wire encoding of this frame to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.frame_type());
        buf.put_u16(self.channel);

        // Reserve the size slot, fill it in once the payload is written
        let size_at = buf.len();
        buf.put_u32(0);
        let start = buf.len();

        match &self.payload {
            FramePayload::Method(method) => method.encode(buf),
            FramePayload::Header(raw) | FramePayload::Body(raw) => buf.put_slice(raw),
            FramePayload::Heartbeat => {},
        }

        let size = (buf.len() - start) as u32;
        buf[size_at..size_at + 4].copy_from_slice(&size.to_be_bytes());
        buf.put_u8(FRAME_END);
    }

    /// Encode into a standalone buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(64);
        self.encode(&mut buf);
        buf.freeze()
    }
}

/// Try to decode one frame from the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed. `max_frame_size` bounds the
/// whole frame (header, payload and end marker); 0 disables the check.
pub fn decode_frame(buf: &mut BytesMut, max_frame_size: u32) -> DecodeResult<Option<Frame>> {
    if buf.len() >= 4 && &buf[..4] == b"AMQP" {
        if buf.len() < 8 {
            return Ok(None);
        }
        return Err(DecodeError::UnsupportedProtocol {
            major: buf[5],
            minor: buf[6],
            revision: buf[7],
        });
    }

    if buf.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    let frame_type = buf[0];
    let channel = u16::from_be_bytes([buf[1], buf[2]]);
    let size = u32::from_be_bytes([buf[3], buf[4], buf[5], buf[6]]);

    if !matches!(
        frame_type,
        FRAME_METHOD | FRAME_HEADER | FRAME_BODY | FRAME_HEARTBEAT
    ) {
        return Err(DecodeError::UnknownFrameType(frame_type));
    }

    let total = u64::from(size) + FRAME_OVERHEAD as u64;
    if max_frame_size != 0 && total > u64::from(max_frame_size) {
        return Err(DecodeError::FrameTooLarge {
            size: total.min(u64::from(u32::MAX)) as u32,
            max: max_frame_size,
        });
    }

    // The buffer grows with what actually arrives, never with the declared size
    let total = total as usize;
    if buf.len() < total {
        return Ok(None);
    }

    let end = buf[total - 1];
    if end != FRAME_END {
        return Err(DecodeError::BadFrameEnd { found: end });
    }

    let mut frame = buf.split_to(total);
    frame.advance(FRAME_HEADER_SIZE);
    frame.truncate(size as usize);
    let payload = frame.freeze();

    let payload = match frame_type {
        FRAME_METHOD => FramePayload::Method(Method::decode(payload)?),
        FRAME_HEADER => FramePayload::Header(payload),
        FRAME_BODY => FramePayload::Body(payload),
        _ => FramePayload::Heartbeat,
    };

    Ok(Some(Frame { channel, payload }))
}

/// Decode exactly one complete frame from a byte slice.
///
/// Unlike [`decode_frame`], missing bytes are an error here.
pub fn parse_frame(data: &[u8]) -> DecodeResult<Frame> {
    let mut buf = BytesMut::from(data);
    match decode_frame(&mut buf, 0)? {
        Some(frame) => Ok(frame),
        None => {
            let needed = if data.len() < FRAME_HEADER_SIZE {
                FRAME_HEADER_SIZE
            } else {
                let size = u32::from_be_bytes([data[3], data[4], data[5], data[6]]);
                size as usize + FRAME_OVERHEAD
            };
            Err(DecodeError::Truncated {
                needed,
                available: data.len(),
            })
        },
    }
}
