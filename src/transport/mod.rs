//! Transport collaborators for the handshake.
//!
//! The handshake never touches a socket itself. It talks to two narrow
//! interfaces:
//!
//! - [`Sender`]: writes the protocol header and encoded frames
//! - [`FrameHandler`]: receives decoded frames, registered per channel with a
//!   [`FrameDispatcher`]
//!
//! # Architecture
//!
//! ```text
//!   socket read half                         socket write half
//!         │                                         ▲
//!         ▼                                         │
//! ┌───────────────┐   Frame   ┌────────────────┐    │ Bytes
//! │  FrameReader  │──────────>│ FrameDispatcher│    │
//! └───────────────┘           └───────┬────────┘    │
//!                                     │ channel 0   │
//!                                     ▼             │
//!                             ┌──────────────┐  ┌───┴───────────┐
//!                             │  Handshaker  │─>│ ChannelSender │
//!                             └──────────────┘  └───────────────┘
//! ```
//!
//! [`FrameReader`] and [`ChannelSender`] are the tokio-backed implementations
//! used by [`crate::client::connect`]; tests substitute their own.

mod dispatch;
mod reader;
mod tcp;

pub use dispatch::FrameDispatcher;
pub use reader::FrameReader;
pub use tcp::{spawn_writer, ChannelSender};

use thiserror::Error;

use crate::codec::{DecodeError, Frame};

/// Failure to move bytes over the transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Transport was closed (peer hung up, or the writer went away).
    #[error("transport closed")]
    Closed,

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure on the read side, delivered to the frame handler.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Bytes arrived but did not form a valid frame.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Reading from the transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Outbound half of the transport.
///
/// Sends are fire-and-forget from the caller's point of view: they must not
/// block, but a transport that can no longer deliver must say so.
pub trait Sender: Send {
    /// Send the fixed protocol header that precedes all frames.
    fn send_protocol_header(&mut self) -> Result<(), TransportError>;

    /// Send one frame.
    fn send(&mut self, frame: Frame) -> Result<(), TransportError>;
}

impl<S: Sender + ?Sized> Sender for Box<S> {
    fn send_protocol_header(&mut self) -> Result<(), TransportError> {
        (**self).send_protocol_header()
    }

    fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        (**self).send(frame)
    }
}

/// Anything that accepts inbound frames for a channel.
///
/// The dispatcher guarantees calls arrive one at a time and in wire order.
pub trait FrameHandler: Send {
    /// Called once when the handler is registered with a dispatcher.
    fn on_register(&mut self) {}

    /// Deliver one inbound frame.
    fn handle_frame(&mut self, frame: Frame);

    /// Deliver a read-side failure; no further frames follow it.
    fn handle_read_error(&mut self, error: ReadError);
}
