//! AMQP field tables.
//!
//! Field tables carry the server and client property maps exchanged in
//! `connection.start` / `connection.start-ok`, and the AMQPLAIN SASL response.
//!
//! ```text
//! +-------------+------------------------------------------------+
//! | size (u32)  | (short-string name, type octet, value)*        |
//! +-------------+------------------------------------------------+
//! ```
//!
//! Type tags follow the RabbitMQ dialect of 0-9-1 (`s` is a signed 16-bit
//! integer, `x` is a byte array).

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::error::{DecodeError, DecodeResult};
use super::wire::{ensure, get_long_bytes, get_short_str, get_u32, get_u64, get_u8};
use super::wire::{put_long_bytes, put_short_str};

/// Deepest nesting of arrays and tables accepted when decoding.
pub const MAX_NESTING: usize = 64;

fn nest(depth: usize) -> DecodeResult<usize> {
    if depth >= MAX_NESTING {
        return Err(DecodeError::NestingTooDeep { max: MAX_NESTING });
    }
    Ok(depth + 1)
}

/// A single typed value in a field table or field array.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// `t`
    Bool(bool),
    /// `b`
    I8(i8),
    /// `B`
    U8(u8),
    /// `s`
    I16(i16),
    /// `u`
    U16(u16),
    /// `I`
    I32(i32),
    /// `i`
    U32(u32),
    /// `l`
    I64(i64),
    /// `f`
    F32(f32),
    /// `d`
    F64(f64),
    /// `D`: value / 10^scale
    Decimal {
        /// Number of decimal digits.
        scale: u8,
        /// Unscaled value.
        value: u32,
    },
    /// `S`
    LongString(Bytes),
    /// `x`
    ByteArray(Bytes),
    /// `A`
    Array(Vec<FieldValue>),
    /// `T`: seconds since the Unix epoch
    Timestamp(u64),
    /// `F`
    Table(FieldTable),
    /// `V`
    Void,
}

impl FieldValue {
    /// Type tag written on the wire.
    pub fn tag(&self) -> u8 {
        match self {
            FieldValue::Bool(_) => b't',
            FieldValue::I8(_) => b'b',
            FieldValue::U8(_) => b'B',
            FieldValue::I16(_) => b's',
            FieldValue::U16(_) => b'u',
            FieldValue::I32(_) => b'I',
            FieldValue::U32(_) => b'i',
            FieldValue::I64(_) => b'l',
            FieldValue::F32(_) => b'f',
            FieldValue::F64(_) => b'd',
            FieldValue::Decimal { .. } => b'D',
            FieldValue::LongString(_) => b'S',
            FieldValue::ByteArray(_) => b'x',
            FieldValue::Array(_) => b'A',
            FieldValue::Timestamp(_) => b'T',
            FieldValue::Table(_) => b'F',
            FieldValue::Void => b'V',
        }
    }

    /// Long string contents, if this is a UTF-8 long string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::LongString(raw) => std::str::from_utf8(raw).ok(),
            _ => None,
        }
    }

    /// Boolean contents, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Nested table, if this is a table.
    pub fn as_table(&self) -> Option<&FieldTable> {
        match self {
            FieldValue::Table(t) => Some(t),
            _ => None,
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tag());
        match self {
            FieldValue::Bool(v) => buf.put_u8(u8::from(*v)),
            FieldValue::I8(v) => buf.put_i8(*v),
            FieldValue::U8(v) => buf.put_u8(*v),
            FieldValue::I16(v) => buf.put_i16(*v),
            FieldValue::U16(v) => buf.put_u16(*v),
            FieldValue::I32(v) => buf.put_i32(*v),
            FieldValue::U32(v) => buf.put_u32(*v),
            FieldValue::I64(v) => buf.put_i64(*v),
            FieldValue::F32(v) => buf.put_f32(*v),
            FieldValue::F64(v) => buf.put_f64(*v),
            FieldValue::Decimal { scale, value } => {
                buf.put_u8(*scale);
                buf.put_u32(*value);
            },
            FieldValue::LongString(v) | FieldValue::ByteArray(v) => put_long_bytes(buf, v),
            FieldValue::Array(items) => {
                let mut inner = BytesMut::new();
                for item in items {
                    item.encode(&mut inner);
                }
                put_long_bytes(buf, &inner);
            },
            FieldValue::Timestamp(v) => buf.put_u64(*v),
            FieldValue::Table(t) => t.encode(buf),
            FieldValue::Void => {},
        }
    }

    fn decode(buf: &mut Bytes, depth: usize) -> DecodeResult<Self> {
        let tag = get_u8(buf)?;
        let value = match tag {
            b't' => FieldValue::Bool(get_u8(buf)? != 0),
            b'b' => {
                ensure(buf, 1)?;
                FieldValue::I8(buf.get_i8())
            },
            b'B' => FieldValue::U8(get_u8(buf)?),
            b's' => {
                ensure(buf, 2)?;
                FieldValue::I16(buf.get_i16())
            },
            b'u' => {
                ensure(buf, 2)?;
                FieldValue::U16(buf.get_u16())
            },
            b'I' => {
                ensure(buf, 4)?;
                FieldValue::I32(buf.get_i32())
            },
            b'i' => FieldValue::U32(get_u32(buf)?),
            b'l' => {
                ensure(buf, 8)?;
                FieldValue::I64(buf.get_i64())
            },
            b'f' => {
                ensure(buf, 4)?;
                FieldValue::F32(buf.get_f32())
            },
            b'd' => {
                ensure(buf, 8)?;
                FieldValue::F64(buf.get_f64())
            },
            b'D' => {
                let scale = get_u8(buf)?;
                let value = get_u32(buf)?;
                FieldValue::Decimal { scale, value }
            },
            b'S' => FieldValue::LongString(get_long_bytes(buf)?),
            b'x' => FieldValue::ByteArray(get_long_bytes(buf)?),
            b'A' => {
                let depth = nest(depth)?;
                let mut inner = get_long_bytes(buf)?;
                let mut items = Vec::new();
                while inner.has_remaining() {
                    items.push(FieldValue::decode(&mut inner, depth)?);
                }
                FieldValue::Array(items)
            },
            b'T' => FieldValue::Timestamp(get_u64(buf)?),
            b'F' => FieldValue::Table(FieldTable::decode_nested(buf, nest(depth)?)?),
            b'V' => FieldValue::Void,
            other => return Err(DecodeError::InvalidFieldType(other)),
        };
        Ok(value)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::LongString(Bytes::copy_from_slice(v.as_bytes()))
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::LongString(Bytes::from(v))
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::I32(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::I64(v)
    }
}

impl From<FieldTable> for FieldValue {
    fn from(v: FieldTable) -> Self {
        FieldValue::Table(v)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Bool(v) => serializer.serialize_bool(*v),
            FieldValue::I8(v) => serializer.serialize_i8(*v),
            FieldValue::U8(v) => serializer.serialize_u8(*v),
            FieldValue::I16(v) => serializer.serialize_i16(*v),
            FieldValue::U16(v) => serializer.serialize_u16(*v),
            FieldValue::I32(v) => serializer.serialize_i32(*v),
            FieldValue::U32(v) => serializer.serialize_u32(*v),
            FieldValue::I64(v) => serializer.serialize_i64(*v),
            FieldValue::F32(v) => serializer.serialize_f32(*v),
            FieldValue::F64(v) => serializer.serialize_f64(*v),
            FieldValue::Decimal { scale, value } => {
                serializer.serialize_f64(f64::from(*value) / 10f64.powi(i32::from(*scale)))
            },
            FieldValue::LongString(raw) | FieldValue::ByteArray(raw) => {
                match std::str::from_utf8(raw) {
                    Ok(s) => serializer.serialize_str(s),
                    Err(_) => serializer.serialize_bytes(raw),
                }
            },
            FieldValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            },
            FieldValue::Timestamp(v) => serializer.serialize_u64(*v),
            FieldValue::Table(t) => t.serialize(serializer),
            FieldValue::Void => serializer.serialize_unit(),
        }
    }
}

/// An ordered map of field names to typed values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldTable(BTreeMap<String, FieldValue>);

impl FieldTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, replacing any previous value under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Look up a UTF-8 long string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    /// Encode with the u32 size prefix.
    pub fn encode(&self, buf: &mut BytesMut) {
        let mut inner = BytesMut::new();
        self.encode_entries(&mut inner);
        put_long_bytes(buf, &inner);
    }

    /// Encode the entries without a size prefix (AMQPLAIN response body).
    pub fn encode_entries(&self, buf: &mut BytesMut) {
        for (key, value) in &self.0 {
            put_short_str(buf, key);
            value.encode(buf);
        }
    }

    /// Decode a size-prefixed table.
    ///
    /// Arrays and tables nested more than [`MAX_NESTING`] levels deep are
    /// rejected.
    pub fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        Self::decode_nested(buf, 0)
    }

    fn decode_nested(buf: &mut Bytes, depth: usize) -> DecodeResult<Self> {
        let mut inner = get_long_bytes(buf)?;
        let mut table = FieldTable::new();
        while inner.has_remaining() {
            let key = get_short_str(&mut inner)?;
            let value = FieldValue::decode(&mut inner, depth)?;
            table.0.insert(key, value);
        }
        Ok(table)
    }
}

impl Serialize for FieldTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = FieldTable::new();
        for (k, v) in iter {
            table.insert(k, v);
        }
        table
    }
}
