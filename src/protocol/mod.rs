//! AMQP 0-9-1 connection negotiation.
//!
//! Implements the bring-up sequence from a raw transport to an open,
//! authenticated and tuned connection.
//!
//! # Protocol Overview
//!
//! ## Message Flow
//!
//! ```text
//! Client                                   Broker
//!    |                                        |
//!    |------ "AMQP" 0 0 9 1 ---------------->|  Protocol header
//!    |<----- connection.start ---------------|  Version, mechanisms, locales
//!    |------ connection.start-ok ----------->|  Mechanism, response, properties
//!    |<----- connection.tune ----------------|  Server limits
//!    |------ connection.tune-ok ------------>|  Negotiated limits
//!    |------ connection.open --------------->|  Virtual host
//!    |<----- connection.open-ok -------------|  Connection usable
//! ```
//!
//! A `connection.close` from the broker at any point ends the handshake.
//!
//! ## State Machine
//!
//! | State            | Accepts                | On accept                    | Next             |
//! |------------------|------------------------|------------------------------|------------------|
//! | `AwaitingStart`  | `connection.start`     | send Start-Ok                | `AwaitingTune`   |
//! | `AwaitingTune`   | `connection.tune`      | send Tune-Ok, then Open      | `AwaitingOpenOk` |
//! | `AwaitingOpenOk` | `connection.open-ok`   | resolve completion           | `Completed`      |
//! | `Completed`      | nothing                | frames ignored               | (terminal)       |
//! | `Failed`         | nothing                | frames ignored               | (terminal)       |
//!
//! Any other method in a waiting state is a protocol violation and moves
//! the handshake to `Failed`. Heartbeats are ignored while waiting.
//!
//! ## Tuning
//!
//! | Field         | Client 0 means   | Rule                                    |
//! |---------------|------------------|-----------------------------------------|
//! | `heartbeat`   | disabled         | 0 if either side is 0, else the minimum |
//! | `frame_max`   | no preference    | server value if client is 0, else min   |
//! | `channel_max` | no preference    | server value if client is 0, else min   |
//!
//! # Usage
//!
//! ```rust,ignore
//! use amqp_handshake::config::ConnectionConfig;
//! use amqp_handshake::protocol::Handshaker;
//! use amqp_handshake::transport::{ChannelSender, FrameDispatcher};
//!
//! let (sender, rx) = ChannelSender::channel();
//! let (handshaker, completion) = Handshaker::new(sender, ConnectionConfig::default());
//!
//! let mut dispatcher = FrameDispatcher::new();
//! dispatcher.register(0, Box::new(handshaker)); // sends the protocol header
//!
//! // Feed inbound frames to `dispatcher.dispatch(frame)` ...
//! let outcome = completion.await?;
//! println!("heartbeat every {}s", outcome.heartbeat());
//! ```

mod auth;
mod error;
mod handshaker;
mod properties;
mod tuning;

pub use auth::AuthMechanism;
pub use error::{HandshakeError, ACCESS_REFUSED};
pub use handshaker::{
    HandshakeCompletion, HandshakeOutcome, HandshakeState, Handshaker, ServerInfo,
};
pub use properties::{client_properties, PRODUCT};
pub use tuning::{negotiate_heartbeat, negotiate_limit, NegotiatedParameters};
