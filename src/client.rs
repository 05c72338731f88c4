//! TCP connection bring-up.
//!
//! [`connect`] opens a socket, runs the handshake over it under the
//! configured deadline, and hands back a [`Connection`] positioned right
//! after `connection.open-ok`.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::codec::{Close, Frame, FramePayload, Method};
use crate::config::ClientConfig;
use crate::error::{AmqpError, Result};
use crate::protocol::{HandshakeOutcome, Handshaker, NegotiatedParameters, ServerInfo};
use crate::transport::{
    spawn_writer, ChannelSender, FrameDispatcher, FrameReader, Sender, TransportError,
};

/// Reply code for a normal shutdown
pub const REPLY_SUCCESS: u16 = 200;

type WriterTask = JoinHandle<std::result::Result<OwnedWriteHalf, TransportError>>;

/// Connect to the broker and perform the handshake.
///
/// The whole attempt, TCP connect included, is bounded by
/// `broker.handshake_timeout`.
pub async fn connect(config: &ClientConfig) -> Result<Connection> {
    config.validate()?;

    let attempt = Uuid::new_v4();
    let span = tracing::info_span!("connect", %attempt, broker = %config.broker.addr());
    let deadline = config.broker.handshake_timeout();

    tokio::time::timeout(deadline, establish(config))
        .instrument(span)
        .await
        .map_err(|_| {
            tracing::warn!(%attempt, "handshake timed out after {:?}", deadline);
            AmqpError::Timeout(deadline)
        })?
}

async fn establish(config: &ClientConfig) -> Result<Connection> {
    tracing::debug!("opening TCP connection");
    let stream = TcpStream::connect(config.broker.addr()).await?;
    stream.set_nodelay(true)?;
    let peer = stream.peer_addr()?;

    let (read_half, write_half) = stream.into_split();
    let (sender, rx) = ChannelSender::channel();
    let writer = spawn_writer(write_half, rx);

    let (handshaker, mut completion) = Handshaker::new(sender.clone(), config.connection.clone());
    let mut dispatcher = FrameDispatcher::new();
    dispatcher.register(0, Box::new(handshaker));

    let mut reader = FrameReader::new(read_half);
    let result = loop {
        if let Some(result) = completion.try_outcome() {
            break result;
        }
        match reader.read_frame().await {
            Ok(Some(frame)) => {
                // Only channel 0 is open; anything else is the handshake's to reject
                let channel = if dispatcher.is_registered(frame.channel) {
                    frame.channel
                } else {
                    0
                };
                dispatcher.dispatch_to(channel, frame);
            },
            Ok(None) => {
                dispatcher.dispatch_error(0, TransportError::Closed.into());
            },
            Err(e) => {
                dispatcher.dispatch_error(0, e);
            },
        }
    };

    // Channel 0 belongs to the connection from here on
    dispatcher.unregister(0);

    match result {
        Ok(outcome) => {
            reader.set_frame_max(outcome.params.frame_max);
            Ok(Connection {
                outcome,
                peer,
                reader,
                dispatcher,
                sender,
                writer,
                close_timeout: config.broker.handshake_timeout(),
            })
        },
        Err(e) => {
            // Let the writer flush anything queued (a close-ok, say) before the socket goes
            drop(dispatcher);
            drop(sender);
            match writer.await {
                Ok(Ok(_)) => {},
                Ok(Err(write_err)) => {
                    tracing::debug!("writer failed after handshake error: {}", write_err)
                },
                Err(join_err) => tracing::debug!("writer task ended abnormally: {}", join_err),
            }
            Err(e.into())
        },
    }
}

/// An open connection, just past the handshake.
pub struct Connection {
    outcome: HandshakeOutcome,
    peer: SocketAddr,
    reader: FrameReader<OwnedReadHalf>,
    dispatcher: FrameDispatcher,
    sender: ChannelSender,
    writer: WriterTask,
    close_timeout: Duration,
}

impl Connection {
    /// Everything learned during the handshake
    pub fn outcome(&self) -> &HandshakeOutcome {
        &self.outcome
    }

    /// Negotiated tuning values
    pub fn params(&self) -> &NegotiatedParameters {
        &self.outcome.params
    }

    /// Broker details from `connection.start`
    pub fn server(&self) -> &ServerInfo {
        &self.outcome.server
    }

    /// Broker address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Per-channel routing for inbound frames
    pub fn dispatcher(&mut self) -> &mut FrameDispatcher {
        &mut self.dispatcher
    }

    /// Outbound frame queue
    pub fn sender(&mut self) -> &mut ChannelSender {
        &mut self.sender
    }

    /// Read the next inbound frame
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.reader.read_frame().await?)
    }

    /// Queue a heartbeat frame
    pub fn send_heartbeat(&mut self) -> Result<()> {
        Ok(self.sender.send(Frame::heartbeat())?)
    }

    /// Close the connection with reply code 200.
    ///
    /// Waits for `connection.close-ok`, bounded by the handshake timeout;
    /// a broker that does not answer in time just gets the socket closed.
    pub async fn close(mut self) -> Result<()> {
        tracing::debug!(peer = %self.peer, "closing connection");
        self.sender.send(Frame::method(
            0,
            Method::Close(Close {
                reply_code: REPLY_SUCCESS,
                reply_text: "Goodbye".to_string(),
                class_id: 0,
                method_id: 0,
            }),
        ))?;

        let acknowledged =
            tokio::time::timeout(self.close_timeout, wait_close_ok(&mut self.reader, &mut self.sender))
                .await;
        match acknowledged {
            Ok(result) => result?,
            Err(_) => tracing::warn!("no close-ok within {:?}", self.close_timeout),
        }

        let Connection { sender, writer, .. } = self;
        drop(sender);
        match writer.await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(AmqpError::Io(std::io::Error::other(e))),
        }
    }
}

async fn wait_close_ok(
    reader: &mut FrameReader<OwnedReadHalf>,
    sender: &mut ChannelSender,
) -> Result<()> {
    while let Some(frame) = reader.read_frame().await? {
        match frame.payload {
            FramePayload::Method(Method::CloseOk) if frame.channel == 0 => {
                tracing::debug!("close acknowledged");
                return Ok(());
            },
            FramePayload::Method(Method::Close(close)) if frame.channel == 0 => {
                // Both sides closed at once; answer theirs and stop
                tracing::debug!(reply_code = close.reply_code, "broker closed concurrently");
                sender.send(Frame::method(0, Method::CloseOk))?;
                return Ok(());
            },
            _ => tracing::trace!(frame = %frame.describe(), "discarded while closing"),
        }
    }
    Ok(())
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("params", &self.outcome.params)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
