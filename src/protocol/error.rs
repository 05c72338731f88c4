//! Handshake failure reasons.

use thiserror::Error;

use crate::codec::{DecodeError, MethodId};
use crate::transport::{ReadError, TransportError};

/// Reply code the broker uses for refused credentials or vhost access.
pub const ACCESS_REFUSED: u16 = 403;

/// Why a handshake failed. Every variant is terminal.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// A frame arrived that the current state does not accept.
    #[error("protocol violation: expected {expected}, received {received}")]
    ProtocolViolation {
        /// What the handshake was waiting for.
        expected: &'static str,
        /// What actually arrived.
        received: String,
    },

    /// Inbound bytes could not be decoded.
    #[error("malformed frame: {0}")]
    Decode(#[from] DecodeError),

    /// The broker sent `connection.close`.
    #[error("broker closed the connection: {reply_code} {reply_text} (caused by {})", MethodId::new(*class_id, *method_id))]
    BrokerClose {
        /// AMQP reply code.
        reply_code: u16,
        /// Human-readable reason.
        reply_text: String,
        /// Class of the offending method, 0 if none.
        class_id: u16,
        /// Offending method, 0 if none.
        method_id: u16,
    },

    /// The transport could not deliver or receive.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Client and server have nothing in common to agree on.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// The handshaker was torn down before finishing.
    #[error("handshake aborted")]
    Aborted,
}

impl HandshakeError {
    /// Whether the broker refused the credentials or virtual host.
    pub fn is_access_refused(&self) -> bool {
        matches!(self, Self::BrokerClose { reply_code, .. } if *reply_code == ACCESS_REFUSED)
    }
}

impl From<ReadError> for HandshakeError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Decode(e) => Self::Decode(e),
            ReadError::Transport(e) => Self::Transport(e),
        }
    }
}
