//! Async frame reader.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{ReadError, TransportError};
use crate::codec::{decode_frame, Frame};

/// Ceiling on inbound frames before tuning has agreed on one.
pub const DEFAULT_MAX_FRAME: u32 = 131072;

/// Reads whole frames from a byte stream, preserving wire order.
///
/// Holds a read buffer across calls, so partial frames survive between reads
/// and cancelling [`read_frame`](Self::read_frame) never loses data.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    buffer: BytesMut,
    max_frame: u32,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(8 * 1024),
            max_frame: DEFAULT_MAX_FRAME,
        }
    }

    /// Accept frames up to `max_frame` bytes (0 = unlimited), normally the
    /// negotiated frame-max.
    pub fn set_frame_max(&mut self, max_frame: u32) {
        self.max_frame = max_frame;
    }

    /// Current inbound frame limit.
    pub fn frame_max(&self) -> u32 {
        self.max_frame
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` on a clean EOF between frames. EOF in the middle of
    /// a frame is an I/O error.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, ReadError> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buffer, self.max_frame)? {
                return Ok(Some(frame));
            }

            let read = self
                .reader
                .read_buf(&mut self.buffer)
                .await
                .map_err(TransportError::Io)?;

            if read == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let partial = self.buffer.len();
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("connection closed with {partial} bytes of a partial frame"),
                ))
                .into());
            }
        }
    }

    /// Returns a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Unwraps this FrameReader, returning the underlying reader.
    ///
    /// Any buffered bytes are discarded.
    pub fn into_inner(self) -> R {
        self.reader
    }
}
