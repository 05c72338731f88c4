//! Connection-class method definitions.
//!
//! Only class 10 (`connection`) is decoded structurally. Methods from other
//! classes pass through as [`Method::Other`] so that a reader shared with the
//! channel layer never has to reject them.

#![allow(missing_docs)]

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use super::error::{DecodeError, DecodeResult};
use super::table::FieldTable;
use super::wire::{
    get_long_bytes, get_long_str, get_short_str, get_u16, get_u32, get_u8, put_long_bytes,
    put_short_str,
};

/// Class id of the connection class.
pub const CLASS_CONNECTION: u16 = 10;

/// Connection method ids.
pub mod method_id {
    pub const START: u16 = 10;
    pub const START_OK: u16 = 11;
    pub const SECURE: u16 = 20;
    pub const SECURE_OK: u16 = 21;
    pub const TUNE: u16 = 30;
    pub const TUNE_OK: u16 = 31;
    pub const OPEN: u16 = 40;
    pub const OPEN_OK: u16 = 41;
    pub const CLOSE: u16 = 50;
    pub const CLOSE_OK: u16 = 51;
    pub const BLOCKED: u16 = 60;
    pub const UNBLOCKED: u16 = 61;
}

/// Class/method identifier pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId {
    /// Class identifier.
    pub class_id: u16,
    /// Method identifier within the class.
    pub method_id: u16,
}

impl MethodId {
    /// Construct a method id.
    pub const fn new(class_id: u16, method_id: u16) -> Self {
        Self {
            class_id,
            method_id,
        }
    }

    /// Dotted protocol name, e.g. `connection.tune-ok`.
    pub fn name(&self) -> Option<&'static str> {
        if self.class_id != CLASS_CONNECTION {
            return None;
        }
        let name = match self.method_id {
            method_id::START => "connection.start",
            method_id::START_OK => "connection.start-ok",
            method_id::SECURE => "connection.secure",
            method_id::SECURE_OK => "connection.secure-ok",
            method_id::TUNE => "connection.tune",
            method_id::TUNE_OK => "connection.tune-ok",
            method_id::OPEN => "connection.open",
            method_id::OPEN_OK => "connection.open-ok",
            method_id::CLOSE => "connection.close",
            method_id::CLOSE_OK => "connection.close-ok",
            method_id::BLOCKED => "connection.blocked",
            method_id::UNBLOCKED => "connection.unblocked",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "method {}.{}", self.class_id, self.method_id),
        }
    }
}

/// `connection.start`: the broker's capability announcement.
#[derive(Debug, Clone, PartialEq)]
pub struct Start {
    pub version_major: u8,
    pub version_minor: u8,
    pub server_properties: FieldTable,
    /// Space-separated SASL mechanism names.
    pub mechanisms: String,
    /// Space-separated locale names.
    pub locales: String,
}

/// `connection.start-ok`
#[derive(Debug, Clone, PartialEq)]
pub struct StartOk {
    pub client_properties: FieldTable,
    pub mechanism: String,
    pub response: Bytes,
    pub locale: String,
}

/// `connection.tune` and `connection.tune-ok` share one argument layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tune {
    pub channel_max: u16,
    pub frame_max: u32,
    pub heartbeat: u16,
}

/// `connection.open`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Open {
    pub virtual_host: String,
    /// Reserved; always empty in 0-9-1.
    pub capabilities: String,
    /// Reserved; always false in 0-9-1.
    pub insist: bool,
}

impl Open {
    /// Open the given virtual host.
    pub fn new(virtual_host: &str) -> Self {
        Self {
            virtual_host: virtual_host.to_string(),
            capabilities: String::new(),
            insist: false,
        }
    }
}

/// `connection.close`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Close {
    pub reply_code: u16,
    pub reply_text: String,
    /// Class of the method that caused the close, 0 if none.
    pub class_id: u16,
    /// Method that caused the close, 0 if none.
    pub method_id: u16,
}

/// A decoded method frame payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    Start(Start),
    StartOk(StartOk),
    Secure { challenge: Bytes },
    SecureOk { response: Bytes },
    Tune(Tune),
    TuneOk(Tune),
    Open(Open),
    OpenOk { known_hosts: String },
    Close(Close),
    CloseOk,
    Blocked { reason: String },
    Unblocked,
    /// Method of a class other than `connection`, arguments left undecoded.
    Other {
        class_id: u16,
        method_id: u16,
        arguments: Bytes,
    },
}

impl Method {
    /// Class/method identifier of this method.
    pub fn id(&self) -> MethodId {
        use self::method_id as m;
        let method = match self {
            Method::Start(_) => m::START,
            Method::StartOk(_) => m::START_OK,
            Method::Secure { .. } => m::SECURE,
            Method::SecureOk { .. } => m::SECURE_OK,
            Method::Tune(_) => m::TUNE,
            Method::TuneOk(_) => m::TUNE_OK,
            Method::Open(_) => m::OPEN,
            Method::OpenOk { .. } => m::OPEN_OK,
            Method::Close(_) => m::CLOSE,
            Method::CloseOk => m::CLOSE_OK,
            Method::Blocked { .. } => m::BLOCKED,
            Method::Unblocked => m::UNBLOCKED,
            Method::Other {
                class_id,
                method_id,
                ..
            } => return MethodId::new(*class_id, *method_id),
        };
        MethodId::new(CLASS_CONNECTION, method)
    }

    /// Encode class id, method id and arguments.
    pub fn encode(&self, buf: &mut BytesMut) {
        let id = self.id();
        buf.put_u16(id.class_id);
        buf.put_u16(id.method_id);

        match self {
            Method::Start(start) => {
                buf.put_u8(start.version_major);
                buf.put_u8(start.version_minor);
                start.server_properties.encode(buf);
                put_long_bytes(buf, start.mechanisms.as_bytes());
                put_long_bytes(buf, start.locales.as_bytes());
            },
            Method::StartOk(ok) => {
                ok.client_properties.encode(buf);
                put_short_str(buf, &ok.mechanism);
                put_long_bytes(buf, &ok.response);
                put_short_str(buf, &ok.locale);
            },
            Method::Secure { challenge } => put_long_bytes(buf, challenge),
            Method::SecureOk { response } => put_long_bytes(buf, response),
            Method::Tune(tune) | Method::TuneOk(tune) => {
                buf.put_u16(tune.channel_max);
                buf.put_u32(tune.frame_max);
                buf.put_u16(tune.heartbeat);
            },
            Method::Open(open) => {
                put_short_str(buf, &open.virtual_host);
                put_short_str(buf, &open.capabilities);
                buf.put_u8(u8::from(open.insist));
            },
            Method::OpenOk { known_hosts } => put_short_str(buf, known_hosts),
            Method::Close(close) => {
                buf.put_u16(close.reply_code);
                put_short_str(buf, &close.reply_text);
                buf.put_u16(close.class_id);
                buf.put_u16(close.method_id);
            },
            Method::Blocked { reason } => put_short_str(buf, reason),
            Method::CloseOk | Method::Unblocked => {},
            Method::Other { arguments, .. } => buf.put_slice(arguments),
        }
    }

    /// Decode a method frame payload.
    pub fn decode(mut payload: Bytes) -> DecodeResult<Self> {
        let class_id = get_u16(&mut payload)?;
        let method_id = get_u16(&mut payload)?;

        if class_id != CLASS_CONNECTION {
            return Ok(Method::Other {
                class_id,
                method_id,
                arguments: payload,
            });
        }

        let buf = &mut payload;
        use self::method_id as m;
        let method = match method_id {
            m::START => Method::Start(Start {
                version_major: get_u8(buf)?,
                version_minor: get_u8(buf)?,
                server_properties: FieldTable::decode(buf)?,
                mechanisms: get_long_str(buf)?,
                locales: get_long_str(buf)?,
            }),
            m::START_OK => Method::StartOk(StartOk {
                client_properties: FieldTable::decode(buf)?,
                mechanism: get_short_str(buf)?,
                response: get_long_bytes(buf)?,
                locale: get_short_str(buf)?,
            }),
            m::SECURE => Method::Secure {
                challenge: get_long_bytes(buf)?,
            },
            m::SECURE_OK => Method::SecureOk {
                response: get_long_bytes(buf)?,
            },
            m::TUNE => Method::Tune(decode_tune(buf)?),
            m::TUNE_OK => Method::TuneOk(decode_tune(buf)?),
            m::OPEN => Method::Open(Open {
                virtual_host: get_short_str(buf)?,
                capabilities: get_short_str(buf)?,
                insist: get_u8(buf)? & 1 != 0,
            }),
            m::OPEN_OK => Method::OpenOk {
                known_hosts: get_short_str(buf)?,
            },
            m::CLOSE => Method::Close(Close {
                reply_code: get_u16(buf)?,
                reply_text: get_short_str(buf)?,
                class_id: get_u16(buf)?,
                method_id: get_u16(buf)?,
            }),
            m::CLOSE_OK => Method::CloseOk,
            m::BLOCKED => Method::Blocked {
                reason: get_short_str(buf)?,
            },
            m::UNBLOCKED => Method::Unblocked,
            _ => {
                return Err(DecodeError::UnknownMethod {
                    class_id,
                    method_id,
                })
            },
        };
        Ok(method)
    }
}

fn decode_tune(buf: &mut Bytes) -> DecodeResult<Tune> {
    Ok(Tune {
        channel_max: get_u16(buf)?,
        frame_max: get_u32(buf)?,
        heartbeat: get_u16(buf)?,
    })
}
