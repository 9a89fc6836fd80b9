//! Binary codec for backlog payload value lists.
//!
//! Wire format (all multi-byte integers are little-endian):
//! ```text
//! [tag_len:4][tags:tag_len][value_0][value_1]...[value_n]
//! ```
//! Each value's bytes are determined by its tag:
//!
//! | tag | bytes                           |
//! |-----|---------------------------------|
//! | `0` | none                            |
//! | `?` | 1 (0 or 1)                      |
//! | `b` `h` `i` `q` | 1, 2, 4, 8 signed   |
//! | `d` | 8, IEEE-754 double              |
//! | `s` `X` | `[len:4][bytes:len]`        |
//! | `c` `B` `H` `f` | 1, 1, 2, 4 (decode only) |

use thiserror::Error;
use tracing::{debug, trace};

use crate::protocol::message::MAX_PAYLOAD_SIZE;
use crate::protocol::value::{Tag, Value};

/// Errors that can occur while building, parsing, encoding or decoding messages.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// A header field does not fit its wire width (u8 type, i64 timestamp).
    #[error("header {field} out of range: {value}")]
    HeaderRange { field: &'static str, value: String },

    /// Fewer bytes than a complete header were supplied.
    #[error("truncated header: need {needed} bytes, got {available}")]
    TruncatedHeader { needed: usize, available: usize },

    /// A value has no wire encoding.
    #[error("value at index {index} is of an unsupported type")]
    UnsupportedValueType { index: usize },

    /// An integer does not fit into 8 signed bytes.
    #[error("integer {0} is too big to be transferred using 8 bytes")]
    IntegerTooLarge(String),

    /// The payload bytes could not be decoded (out-of-bounds read, unknown tag).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The payload exceeds the maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: u64, max: u64 },
}

impl ProtocolError {
    /// `true` when the bytes are only incomplete, not corrupt.  A stream
    /// reader should wait for more data rather than drop the buffer.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ProtocolError::TruncatedHeader { .. })
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes an ordered value list into payload bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] if the encoded payload would
/// exceed [`MAX_PAYLOAD_SIZE`].
///
/// # Examples
///
/// ```rust
/// use backlog_core::{decode_values, encode_values, Value};
///
/// let values = vec![Value::Integer(42), Value::from("ok"), Value::Null];
/// let bytes = encode_values(&values).unwrap();
/// assert_eq!(&bytes[4..7], b"bs0");
/// assert_eq!(decode_values(&bytes).unwrap(), values);
/// ```
pub fn encode_values(values: &[Value]) -> Result<Vec<u8>, ProtocolError> {
    let body_len: u64 = values.iter().map(|v| v.encoded_len() as u64).sum();
    let total = 4 + values.len() as u64 + body_len;
    if total > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size: total,
            max: MAX_PAYLOAD_SIZE,
        });
    }

    // total <= MAX_PAYLOAD_SIZE < u32::MAX, so every length below fits a u32
    let mut buf = Vec::with_capacity(total as usize);
    buf.extend_from_slice(&(values.len() as u32).to_le_bytes());
    buf.extend(values.iter().map(|v| v.tag() as u8));
    for value in values {
        encode_value(&mut buf, value);
    }

    trace!(values = values.len(), bytes = buf.len(), "encoded payload");
    Ok(buf)
}

/// Decodes payload bytes back into the value list.
///
/// Trailing bytes after the last value are ignored.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if a read runs past the end of
/// `payload` or the tag string contains an unknown character.
pub fn decode_values(payload: &[u8]) -> Result<Vec<Value>, ProtocolError> {
    let mut reader = Reader::new(payload);
    let tags = reader.tag_string()?;

    let mut values = Vec::with_capacity(tags.len());
    for (index, &c) in tags.iter().enumerate() {
        let tag = parse_tag(c, index)?;
        let value = reader.value(tag).map_err(|e| {
            debug!(index, tag = %tag.as_char(), "payload value out of bounds");
            e
        })?;
        values.push(value);
    }
    Ok(values)
}

/// The tag string the encoder would write for `values`.
pub fn tag_string(values: &[Value]) -> String {
    values.iter().map(|v| v.tag().as_char()).collect()
}

/// Reads the tag string of an encoded payload without decoding any value.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the tag string is truncated
/// or contains an unknown character.
pub fn read_tag_string(payload: &[u8]) -> Result<String, ProtocolError> {
    let tags = Reader::new(payload).tag_string()?;
    tags.iter()
        .enumerate()
        .map(|(index, &c)| parse_tag(c, index).map(Tag::as_char))
        .collect()
}

// ── Encoding ──────────────────────────────────────────────────────────────────

fn encode_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => buf.push(u8::from(*b)),
        // Tag::for_integer guarantees the narrowing casts are lossless.
        Value::Integer(v) => match Tag::for_integer(*v) {
            Tag::Byte => buf.extend_from_slice(&(*v as i8).to_le_bytes()),
            Tag::Short => buf.extend_from_slice(&(*v as i16).to_le_bytes()),
            Tag::Int => buf.extend_from_slice(&(*v as i32).to_le_bytes()),
            _ => buf.extend_from_slice(&v.to_le_bytes()),
        },
        Value::Float(f) => buf.extend_from_slice(&f.to_le_bytes()),
        Value::Text(bytes) | Value::Binary(bytes) => {
            buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            buf.extend_from_slice(bytes);
        }
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

fn parse_tag(c: u8, index: usize) -> Result<Tag, ProtocolError> {
    Tag::try_from(c).map_err(|_| {
        debug!(index, byte = c, "unknown payload tag");
        ProtocolError::MalformedPayload(format!(
            "unknown tag {:?} at position {index}",
            c as char
        ))
    })
}

/// Bounds-checked cursor over a payload.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, context: &str) -> Result<&'a [u8], ProtocolError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                ProtocolError::MalformedPayload(format!(
                    "{context}: need {n} bytes at offset {}, got {}",
                    self.pos,
                    self.buf.len().saturating_sub(self.pos)
                ))
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, context: &str) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, context)?);
        Ok(out)
    }

    fn u32(&mut self, context: &str) -> Result<usize, ProtocolError> {
        Ok(u32::from_le_bytes(self.array(context)?) as usize)
    }

    fn length_prefixed(&mut self, context: &str) -> Result<&'a [u8], ProtocolError> {
        let len = self.u32(context)?;
        self.take(len, context)
    }

    fn tag_string(&mut self) -> Result<&'a [u8], ProtocolError> {
        self.length_prefixed("tag string")
    }

    fn value(&mut self, tag: Tag) -> Result<Value, ProtocolError> {
        let value = match tag {
            Tag::Null => Value::Null,
            Tag::Bool => Value::Bool(self.array::<1>("bool")?[0] != 0),
            Tag::Byte => Value::Integer(i64::from(i8::from_le_bytes(self.array("i8")?))),
            Tag::UnsignedByte => Value::Integer(i64::from(u8::from_le_bytes(self.array("u8")?))),
            Tag::Short => Value::Integer(i64::from(i16::from_le_bytes(self.array("i16")?))),
            Tag::UnsignedShort => {
                Value::Integer(i64::from(u16::from_le_bytes(self.array("u16")?)))
            }
            Tag::Int => Value::Integer(i64::from(i32::from_le_bytes(self.array("i32")?))),
            Tag::Long => Value::Integer(i64::from_le_bytes(self.array("i64")?)),
            Tag::Single => Value::Float(f64::from(f32::from_le_bytes(self.array("f32")?))),
            Tag::Double => Value::Float(f64::from_le_bytes(self.array("f64")?)),
            Tag::Char => Value::Text(self.take(1, "char")?.to_vec()),
            Tag::Text => Value::Text(self.length_prefixed("text")?.to_vec()),
            Tag::Binary => Value::Binary(self.length_prefixed("binary")?.to_vec()),
        };
        Ok(value)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(values: &[Value]) -> Vec<Value> {
        let encoded = encode_values(values).expect("encode failed");
        decode_values(&encoded).expect("decode failed")
    }

    /// Builds a payload by hand from a tag string and raw value bytes.
    fn raw_payload(tags: &str, body: &[u8]) -> Vec<u8> {
        let mut buf = (tags.len() as u32).to_le_bytes().to_vec();
        buf.extend_from_slice(tags.as_bytes());
        buf.extend_from_slice(body);
        buf
    }

    // ── Round trips ───────────────────────────────────────────────────────────

    #[test]
    fn test_empty_list_round_trip() {
        let encoded = encode_values(&[]).unwrap();
        assert_eq!(encoded, vec![0, 0, 0, 0]);
        assert!(decode_values(&encoded).unwrap().is_empty());
    }

    #[test]
    fn test_mixed_values_round_trip() {
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
            Value::Integer(-5),
            Value::Integer(1_000),
            Value::Integer(100_000),
            Value::Integer(-10_000_000_000),
            Value::Float(-273.15),
            Value::from("temperature"),
            Value::blob(vec![0xDE, 0xAD, 0xBE, 0xEF]),
        ];
        assert_eq!(round_trip(&values), values);
    }

    #[test]
    fn test_integer_extremes_round_trip() {
        let values = vec![Value::Integer(i64::MIN), Value::Integer(i64::MAX)];
        assert_eq!(round_trip(&values), values);
    }

    #[test]
    fn test_empty_text_and_blob_round_trip() {
        let values = vec![Value::text(""), Value::blob(Vec::new())];
        assert_eq!(round_trip(&values), values);
    }

    // ── Layout ────────────────────────────────────────────────────────────────

    #[test]
    fn test_layout_of_small_integer_and_text() {
        let encoded = encode_values(&[Value::Integer(-2), Value::from("ab")]).unwrap();
        assert_eq!(
            encoded,
            vec![2, 0, 0, 0, b'b', b's', 0xFE, 2, 0, 0, 0, b'a', b'b']
        );
    }

    #[test]
    fn test_integers_are_little_endian() {
        let encoded = encode_values(&[Value::Integer(0x1234)]).unwrap();
        assert_eq!(&encoded[4..], &[b'h', 0x34, 0x12]);
    }

    #[test]
    fn test_boolean_is_single_byte() {
        let encoded = encode_values(&[Value::Bool(true)]).unwrap();
        assert_eq!(&encoded[4..], &[b'?', 1]);
    }

    #[test]
    fn test_boundary_pairs_select_expected_tags() {
        let cases: [(i64, &str); 12] = [
            (126, "b"),
            (127, "h"),
            (-127, "b"),
            (-128, "h"),
            (32_766, "h"),
            (32_767, "i"),
            (-32_767, "h"),
            (-32_768, "i"),
            (2_147_483_646, "i"),
            (2_147_483_647, "q"),
            (-2_147_483_647, "i"),
            (-2_147_483_648, "q"),
        ];
        for (v, expected) in cases {
            let values = [Value::Integer(v)];
            assert_eq!(tag_string(&values), expected, "value {v}");
            assert_eq!(read_tag_string(&encode_values(&values).unwrap()).unwrap(), expected);
            assert_eq!(round_trip(&values), values);
        }
    }

    // ── Decode-only tags ──────────────────────────────────────────────────────

    #[test]
    fn test_decodes_foreign_tags() {
        let mut body = vec![b'z', 0xFF];
        body.extend_from_slice(&0xFFFFu16.to_le_bytes());
        body.extend_from_slice(&1.5f32.to_le_bytes());
        let payload = raw_payload("cBHf", &body);

        let values = decode_values(&payload).unwrap();

        assert_eq!(
            values,
            vec![
                Value::text("z"),
                Value::Integer(255),
                Value::Integer(65_535),
                Value::Float(1.5),
            ]
        );
    }

    #[test]
    fn test_nonzero_bool_byte_decodes_true() {
        let payload = raw_payload("?", &[7]);
        assert_eq!(decode_values(&payload).unwrap(), vec![Value::Bool(true)]);
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let payload = raw_payload("b", &[5, 0xAA, 0xBB]);
        assert_eq!(decode_values(&payload).unwrap(), vec![Value::Integer(5)]);
    }

    // ── Error conditions ──────────────────────────────────────────────────────

    #[test]
    fn test_decode_unknown_tag_returns_malformed() {
        let payload = raw_payload("bZ", &[1]);
        assert!(matches!(
            decode_values(&payload),
            Err(ProtocolError::MalformedPayload(_))
        ));
        assert!(matches!(
            read_tag_string(&payload),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_empty_bytes_returns_malformed() {
        assert!(matches!(
            decode_values(&[]),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_tag_length_past_end_returns_malformed() {
        let mut payload = 100u32.to_le_bytes().to_vec();
        payload.extend_from_slice(b"bb");
        assert!(matches!(
            decode_values(&payload),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_truncated_fixed_value_returns_malformed() {
        let payload = raw_payload("q", &[1, 2, 3]);
        assert!(matches!(
            decode_values(&payload),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_blob_length_past_end_returns_malformed() {
        let mut body = 10u32.to_le_bytes().to_vec();
        body.extend_from_slice(&[0; 4]);
        let payload = raw_payload("X", &body);
        assert!(matches!(
            decode_values(&payload),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_max_length_prefix_does_not_overflow() {
        let mut body = u32::MAX.to_le_bytes().to_vec();
        body.push(0);
        let payload = raw_payload("s", &body);
        assert!(matches!(
            decode_values(&payload),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_truncated_header_is_incomplete() {
        let err = ProtocolError::TruncatedHeader {
            needed: 9,
            available: 3,
        };
        assert!(err.is_incomplete());
        assert!(!ProtocolError::MalformedPayload(String::new()).is_incomplete());
    }
}
