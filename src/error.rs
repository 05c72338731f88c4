//! Crate-level error types.
//!
//! Each layer has its own error enum ([`DecodeError`], [`TransportError`],
//! [`HandshakeError`]). [`AmqpError`] aggregates them for callers that drive
//! a whole connection attempt.

use std::time::Duration;

use thiserror::Error;

use crate::codec::DecodeError;
use crate::protocol::HandshakeError;
use crate::transport::{ReadError, TransportError};

/// Errors surfaced by connection attempts.
#[derive(Error, Debug)]
pub enum AmqpError {
    /// Negotiation with the broker failed.
    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    /// Malformed bytes from the broker.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Transport failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// The broker did not respond in time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for connection operations
pub type Result<T> = std::result::Result<T, AmqpError>;

impl From<ReadError> for AmqpError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Decode(e) => AmqpError::Decode(e),
            ReadError::Transport(e) => AmqpError::Transport(e),
        }
    }
}

impl From<toml::de::Error> for AmqpError {
    fn from(err: toml::de::Error) -> Self {
        AmqpError::Config(err.to_string())
    }
}

impl From<url::ParseError> for AmqpError {
    fn from(err: url::ParseError) -> Self {
        AmqpError::Config(format!("invalid URI: {err}"))
    }
}
