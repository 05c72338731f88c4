//! Per-channel frame dispatch.

use std::collections::HashMap;

use super::{FrameHandler, ReadError};
use crate::codec::Frame;

/// Routes inbound frames to the handler registered for their channel.
///
/// One handler per channel. During the handshake only channel 0 is
/// populated; channel-level handlers after the handshake use the same table.
#[derive(Default)]
pub struct FrameDispatcher {
    handlers: HashMap<u16, Box<dyn FrameHandler>>,
}

impl FrameDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `channel`, replacing and returning any previous
    /// handler. The new handler's [`FrameHandler::on_register`] runs first.
    pub fn register(
        &mut self,
        channel: u16,
        mut handler: Box<dyn FrameHandler>,
    ) -> Option<Box<dyn FrameHandler>> {
        handler.on_register();
        tracing::debug!(channel, "frame handler registered");
        self.handlers.insert(channel, handler)
    }

    /// Stop delivery to `channel` and hand the handler back.
    pub fn unregister(&mut self, channel: u16) -> Option<Box<dyn FrameHandler>> {
        let handler = self.handlers.remove(&channel);
        if handler.is_some() {
            tracing::debug!(channel, "frame handler unregistered");
        }
        handler
    }

    /// Whether a handler is registered for `channel`.
    pub fn is_registered(&self, channel: u16) -> bool {
        self.handlers.contains_key(&channel)
    }

    /// Deliver a frame. Returns false if no handler owns the frame's channel.
    pub fn dispatch(&mut self, frame: Frame) -> bool {
        self.dispatch_to(frame.channel, frame)
    }

    /// Deliver a frame to the handler on `channel`, whatever channel the
    /// frame itself is addressed to. Used to hand stray frames to the
    /// connection handler so it can reject them.
    pub fn dispatch_to(&mut self, channel: u16, frame: Frame) -> bool {
        match self.handlers.get_mut(&channel) {
            Some(handler) => {
                handler.handle_frame(frame);
                true
            },
            None => {
                tracing::trace!(channel, frame = %frame.describe(), "no handler, frame dropped");
                false
            },
        }
    }

    /// Deliver a read failure to the handler on `channel`.
    pub fn dispatch_error(&mut self, channel: u16, error: ReadError) -> bool {
        match self.handlers.get_mut(&channel) {
            Some(handler) => {
                handler.handle_read_error(error);
                true
            },
            None => {
                tracing::trace!(channel, %error, "no handler, read error dropped");
                false
            },
        }
    }
}

impl std::fmt::Debug for FrameDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut channels: Vec<_> = self.handlers.keys().copied().collect();
        channels.sort_unstable();
        f.debug_struct("FrameDispatcher")
            .field("channels", &channels)
            .finish()
    }
}
