//! Payload values and their one-character wire tags.
//!
//! A payload is an ordered list of [`Value`]s.  On the wire each value is
//! described by a single [`Tag`] byte in the payload's tag string, followed
//! (later in the payload) by the value's encoded bytes.

use std::any::Any;
use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::protocol::codec::ProtocolError;

// ── Wire tags ─────────────────────────────────────────────────────────────────

/// One character of a payload tag string.
///
/// The encoder only ever emits `0 ? b h i q d s X`.  The decoder also accepts
/// `c B H f`, which other implementations of the protocol may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tag {
    Null = b'0',
    Bool = b'?',
    Byte = b'b',
    Short = b'h',
    Int = b'i',
    Long = b'q',
    Double = b'd',
    Text = b's',
    Binary = b'X',
    // Decode-only
    Char = b'c',
    UnsignedByte = b'B',
    UnsignedShort = b'H',
    Single = b'f',
}

impl TryFrom<u8> for Tag {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            b'0' => Ok(Tag::Null),
            b'?' => Ok(Tag::Bool),
            b'b' => Ok(Tag::Byte),
            b'h' => Ok(Tag::Short),
            b'i' => Ok(Tag::Int),
            b'q' => Ok(Tag::Long),
            b'd' => Ok(Tag::Double),
            b's' => Ok(Tag::Text),
            b'X' => Ok(Tag::Binary),
            b'c' => Ok(Tag::Char),
            b'B' => Ok(Tag::UnsignedByte),
            b'H' => Ok(Tag::UnsignedShort),
            b'f' => Ok(Tag::Single),
            _ => Err(()),
        }
    }
}

impl Tag {
    /// The tag as it appears in the tag string.
    pub fn as_char(self) -> char {
        self as u8 as char
    }

    /// Number of value bytes following this tag, or `None` for the
    /// length-prefixed tags (`s` and `X`).
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            Tag::Null => Some(0),
            Tag::Bool | Tag::Byte | Tag::Char | Tag::UnsignedByte => Some(1),
            Tag::Short | Tag::UnsignedShort => Some(2),
            Tag::Int | Tag::Single => Some(4),
            Tag::Long | Tag::Double => Some(8),
            Tag::Text | Tag::Binary => None,
        }
    }

    /// Picks the narrowest integer tag for `v`.
    ///
    /// The bounds are exclusive on both ends, so `-128`, `127`, `-32768`,
    /// `32767`, `-2147483648` and `2147483647` each take the next wider
    /// form.  Deployed decoders depend on this exact choice.
    pub fn for_integer(v: i64) -> Tag {
        if v > -128 && v < 127 {
            Tag::Byte
        } else if v > -32_768 && v < 32_767 {
            Tag::Short
        } else if v > -2_147_483_648 && v < 2_147_483_647 {
            Tag::Int
        } else {
            Tag::Long
        }
    }
}

// ── Values ────────────────────────────────────────────────────────────────────

/// A single entry of a payload list.
///
/// `Text` and `Binary` both hold raw bytes.  Text is never transcoded; the two
/// variants differ only in the tag they are sent with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(Vec<u8>),
    Binary(Vec<u8>),
}

impl Value {
    /// Creates a text value from anything byte-like.
    pub fn text(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Text(bytes.into())
    }

    /// Creates a binary blob value.
    pub fn blob(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Binary(bytes.into())
    }

    /// The tag the encoder writes for this value.
    pub fn tag(&self) -> Tag {
        match self {
            Value::Null => Tag::Null,
            Value::Bool(_) => Tag::Bool,
            Value::Integer(v) => Tag::for_integer(*v),
            Value::Float(_) => Tag::Double,
            Value::Text(_) => Tag::Text,
            Value::Binary(_) => Tag::Binary,
        }
    }

    /// Number of bytes this value occupies after the tag string.
    pub fn encoded_len(&self) -> usize {
        match self {
            Value::Text(b) | Value::Binary(b) => 4 + b.len(),
            other => other.tag().fixed_width().unwrap_or(0),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Raw bytes of a `Text` or `Binary` value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Text(b) | Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Text content, with invalid UTF-8 replaced.  `None` for non-text values.
    pub fn as_text_lossy(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Text(b) => Some(String::from_utf8_lossy(b)),
            _ => None,
        }
    }

    /// Converts a dynamically typed item into a [`Value`].
    ///
    /// Accepts `()`, `bool`, every primitive integer, `f32`/`f64`, `String`,
    /// `&str`, `Vec<u8>`, `&[u8]` and `Value` itself.  `index` is only used to
    /// label the error.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::UnsupportedValueType`] for any other type and
    /// [`ProtocolError::IntegerTooLarge`] for integers outside the `i64` range.
    pub fn from_any(index: usize, item: &dyn Any) -> Result<Value, ProtocolError> {
        macro_rules! lossless {
            ($($t:ty),*) => {
                $(if let Some(v) = item.downcast_ref::<$t>() {
                    return Ok(Value::Integer(i64::from(*v)));
                })*
            };
        }
        macro_rules! checked {
            ($($t:ty),*) => {
                $(if let Some(v) = item.downcast_ref::<$t>() {
                    return i64::try_from(*v)
                        .map(Value::Integer)
                        .map_err(|_| ProtocolError::IntegerTooLarge(v.to_string()));
                })*
            };
        }

        lossless!(i8, i16, i32, i64, u8, u16, u32);
        checked!(isize, usize, u64, i128, u128);

        if let Some(v) = item.downcast_ref::<Value>() {
            return Ok(v.clone());
        }
        if item.is::<()>() {
            return Ok(Value::Null);
        }
        if let Some(v) = item.downcast_ref::<bool>() {
            return Ok(Value::Bool(*v));
        }
        if let Some(v) = item.downcast_ref::<f64>() {
            return Ok(Value::Float(*v));
        }
        if let Some(v) = item.downcast_ref::<f32>() {
            return Ok(Value::Float(f64::from(*v)));
        }
        if let Some(v) = item.downcast_ref::<String>() {
            return Ok(Value::text(v.as_bytes()));
        }
        if let Some(v) = item.downcast_ref::<&str>() {
            return Ok(Value::text(v.as_bytes()));
        }
        if let Some(v) = item.downcast_ref::<Vec<u8>>() {
            return Ok(Value::blob(v.clone()));
        }
        if let Some(v) = item.downcast_ref::<&[u8]>() {
            return Ok(Value::blob(*v));
        }

        Err(ProtocolError::UnsupportedValueType { index })
    }
}

/// Converts a list of dynamically typed items, see [`Value::from_any`].
///
/// # Errors
///
/// Fails on the first item that cannot be represented; the error names its
/// position in `items`.
pub fn values_from_any(items: &[&dyn Any]) -> Result<Vec<Value>, ProtocolError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| Value::from_any(index, *item))
        .collect()
}

// ── Conversions ───────────────────────────────────────────────────────────────

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Integer(i64::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl TryFrom<u64> for Value {
    type Error = ProtocolError;

    fn try_from(v: u64) -> Result<Self, Self::Error> {
        i64::try_from(v)
            .map(Value::Integer)
            .map_err(|_| ProtocolError::IntegerTooLarge(v.to_string()))
    }
}

impl TryFrom<i128> for Value {
    type Error = ProtocolError;

    fn try_from(v: i128) -> Result<Self, Self::Error> {
        i64::try_from(v)
            .map(Value::Integer)
            .map_err(|_| ProtocolError::IntegerTooLarge(v.to_string()))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::text(v.as_bytes())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v.into_bytes())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
