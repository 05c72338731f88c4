//! Channel-backed sender and socket writer task.
//!
//! [`ChannelSender`] never blocks: it encodes and queues. A separate writer
//! task owns the socket's write half and drains the queue in order.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Sender, TransportError};
use crate::codec::{Frame, PROTOCOL_HEADER};

/// [`Sender`] that queues encoded bytes for a writer task.
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ChannelSender {
    /// Create a sender and the receiving end for the writer.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Whether the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn push(&self, bytes: Bytes) -> Result<(), TransportError> {
        self.tx.send(bytes).map_err(|_| TransportError::Closed)
    }
}

impl Sender for ChannelSender {
    fn send_protocol_header(&mut self) -> Result<(), TransportError> {
        self.push(Bytes::from_static(&PROTOCOL_HEADER))
    }

    fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let mut buf = BytesMut::with_capacity(64);
        frame.encode(&mut buf);
        self.push(buf.freeze())
    }
}

/// Spawn a task that writes queued bytes to `writer` until every
/// [`ChannelSender`] is dropped or a write fails.
///
/// The task hands the writer back when the queue closes cleanly.
pub fn spawn_writer<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
) -> JoinHandle<Result<W, TransportError>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if let Err(e) = writer.write_all(&bytes).await {
                tracing::warn!("socket write failed: {}", e);
                rx.close();
                return Err(TransportError::Io(e));
            }
            writer.flush().await?;
        }
        tracing::debug!("writer queue closed");
        Ok(writer)
    })
}
