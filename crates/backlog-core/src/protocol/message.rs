//! Backlog message framing.
//!
//! Wire format (little-endian):
//! ```text
//! [type:1][timestamp_ms:8][payload:N]
//! ```
//! The header is always 9 bytes.  The payload is optional and, when present,
//! is a value list encoded by [`crate::protocol::codec`].
//!
//! # Two phases
//!
//! A received message is parsed in two steps.  [`RawMessage::parse`] only
//! splits the header from the payload bytes, which is cheap and cannot fail
//! once 9 bytes are available.  The payload is decoded later, on demand, with
//! [`RawMessage::values`] or [`RawMessage::decode`], which turns it into a
//! [`DecodedMessage`].

use serde::{Deserialize, Serialize};

use crate::protocol::codec::{decode_values, encode_values, ProtocolError};
use crate::protocol::value::Value;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Total size of the message header in bytes.
pub const HEADER_SIZE: usize = 9;

/// Largest payload a message may carry (2^32 - 9 bytes).
///
/// The transport prefixes every message with a 4-byte length, so header plus
/// payload must stay addressable by a `u32`.
pub const MAX_PAYLOAD_SIZE: u64 = 4_294_967_287;

// ── Header ────────────────────────────────────────────────────────────────────

/// The 9-byte header prepended to every message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Header {
    /// Message type code, see [`crate::protocol::types`].
    pub msg_type: u8,
    /// Milliseconds since the Unix epoch, on the sender's clock.
    pub timestamp: i64,
}

impl Header {
    pub fn new(msg_type: u8, timestamp: i64) -> Self {
        Self {
            msg_type,
            timestamp,
        }
    }

    /// Builds a header from integers wider than the wire fields.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::HeaderRange`] if `msg_type` is outside
    /// `0..=255` or `timestamp` outside the `i64` range.
    pub fn from_wide(msg_type: i64, timestamp: i128) -> Result<Self, ProtocolError> {
        let msg_type = u8::try_from(msg_type).map_err(|_| ProtocolError::HeaderRange {
            field: "type",
            value: msg_type.to_string(),
        })?;
        let timestamp = i64::try_from(timestamp).map_err(|_| ProtocolError::HeaderRange {
            field: "timestamp",
            value: timestamp.to_string(),
        })?;
        Ok(Self::new(msg_type, timestamp))
    }

    /// Packs the header into its 9-byte wire form.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0] = self.msg_type;
        out[1..].copy_from_slice(&self.timestamp.to_le_bytes());
        out
    }

    /// Unpacks the header from the first 9 bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedHeader`] if fewer than 9 bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ProtocolError::TruncatedHeader {
                needed: HEADER_SIZE,
                available: bytes.len(),
            });
        }
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&bytes[1..HEADER_SIZE]);
        Ok(Self::new(bytes[0], i64::from_le_bytes(ts)))
    }
}

fn check_payload_len(len: usize) -> Result<(), ProtocolError> {
    if len as u64 > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size: len as u64,
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(())
}

// ── Raw message ───────────────────────────────────────────────────────────────

/// A message whose payload has not been decoded yet.
///
/// This is what producers build and what the transport sends and receives.
///
/// # Examples
///
/// ```rust
/// use backlog_core::{RawMessage, Value};
///
/// let msg = RawMessage::build(60, 1_000, Some(&[Value::Integer(2), Value::from("ab")])).unwrap();
/// let parsed = RawMessage::parse(&msg.to_bytes()).unwrap();
/// assert_eq!(parsed.msg_type(), 60);
/// assert_eq!(parsed.values().unwrap(), vec![Value::Integer(2), Value::from("ab")]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    header: Header,
    payload: Option<Vec<u8>>,
}

impl RawMessage {
    /// Builds a message, encoding `values` as its payload.
    ///
    /// An absent or empty value list produces a message without payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if the encoded values would
    /// exceed [`MAX_PAYLOAD_SIZE`].
    pub fn build(
        msg_type: u8,
        timestamp: i64,
        values: Option<&[Value]>,
    ) -> Result<Self, ProtocolError> {
        Self::with_header(Header::new(msg_type, timestamp), values)
    }

    /// Like [`RawMessage::build`], for callers holding wider integers.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::HeaderRange`] if the type or timestamp cannot
    /// be represented, plus the errors of [`RawMessage::build`].
    pub fn build_wide(
        msg_type: i64,
        timestamp: i128,
        values: Option<&[Value]>,
    ) -> Result<Self, ProtocolError> {
        Self::with_header(Header::from_wide(msg_type, timestamp)?, values)
    }

    /// Builds a message whose payload is a single binary blob.
    ///
    /// The blob is sent as a one-element `X` value list, exactly as
    /// `build(.., Some(&[Value::Binary(blob)]))` would send it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] for oversized blobs.
    pub fn with_blob(msg_type: u8, timestamp: i64, blob: Vec<u8>) -> Result<Self, ProtocolError> {
        Self::build(msg_type, timestamp, Some(&[Value::Binary(blob)]))
    }

    fn with_header(header: Header, values: Option<&[Value]>) -> Result<Self, ProtocolError> {
        let payload = match values {
            Some(values) if !values.is_empty() => Some(encode_values(values)?),
            _ => None,
        };
        Ok(Self { header, payload })
    }

    /// Splits a received byte buffer into header and payload.
    ///
    /// The payload (everything after the 9th byte) is stored as-is and not
    /// decoded here.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedHeader`] if `bytes` holds fewer than
    /// 9 bytes, or [`ProtocolError::PayloadTooLarge`] if the payload exceeds
    /// [`MAX_PAYLOAD_SIZE`].
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let header = Header::from_bytes(bytes)?;
        let rest = &bytes[HEADER_SIZE..];
        check_payload_len(rest.len())?;
        let payload = (!rest.is_empty()).then(|| rest.to_vec());
        Ok(Self { header, payload })
    }

    /// Re-parses this message in place from `bytes`, reusing the payload
    /// allocation where possible.
    ///
    /// On error the message is left unchanged.
    ///
    /// # Errors
    ///
    /// Same as [`RawMessage::parse`].
    pub fn replace_from(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let header = Header::from_bytes(bytes)?;
        let rest = &bytes[HEADER_SIZE..];
        check_payload_len(rest.len())?;

        self.header = header;
        if rest.is_empty() {
            self.payload = None;
        } else {
            let buf = self.payload.get_or_insert_with(Vec::new);
            buf.clear();
            buf.extend_from_slice(rest);
        }
        Ok(())
    }

    /// Serializes the message: header followed by the payload, if any.
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload = self.payload.as_deref().unwrap_or_default();
        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
        buf.extend_from_slice(&self.header.to_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn msg_type(&self) -> u8 {
        self.header.msg_type
    }

    pub fn timestamp(&self) -> i64 {
        self.header.timestamp
    }

    /// Payload length in bytes, 0 when the message has no payload.
    pub fn size(&self) -> usize {
        self.payload.as_ref().map_or(0, Vec::len)
    }

    /// The undecoded payload bytes.
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Decodes the payload into its value list.  No payload yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPayload`] if the payload is corrupt.
    pub fn values(&self) -> Result<Vec<Value>, ProtocolError> {
        match &self.payload {
            Some(payload) => decode_values(payload),
            None => Ok(Vec::new()),
        }
    }

    /// Converts into the decoded phase.
    ///
    /// # Errors
    ///
    /// Same as [`RawMessage::values`].
    pub fn decode(&self) -> Result<DecodedMessage, ProtocolError> {
        Ok(DecodedMessage {
            header: self.header,
            values: self.values()?,
        })
    }
}

// ── Decoded message ───────────────────────────────────────────────────────────

/// A message together with its decoded value list.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub header: Header,
    pub values: Vec<Value>,
}

impl DecodedMessage {
    pub fn new(msg_type: u8, timestamp: i64, values: Vec<Value>) -> Self {
        Self {
            header: Header::new(msg_type, timestamp),
            values,
        }
    }

    pub fn msg_type(&self) -> u8 {
        self.header.msg_type
    }

    pub fn timestamp(&self) -> i64 {
        self.header.timestamp
    }

    /// Converts back into the raw phase by encoding the values.
    ///
    /// # Errors
    ///
    /// Same as [`RawMessage::build`].
    pub fn encode(&self) -> Result<RawMessage, ProtocolError> {
        RawMessage::with_header(self.header, Some(&self.values))
    }
}

impl TryFrom<&RawMessage> for DecodedMessage {
    type Error = ProtocolError;

    fn try_from(raw: &RawMessage) -> Result<Self, Self::Error> {
        raw.decode()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Header ────────────────────────────────────────────────────────────────

    #[test]
    fn test_header_layout_is_type_then_le_timestamp() {
        let header = Header::new(0x3C, 0x0102_0304_0506_0708);
        assert_eq!(
            header.to_bytes(),
            [0x3C, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_header_negative_timestamp_round_trip() {
        let header = Header::new(255, -1);
        assert_eq!(Header::from_bytes(&header.to_bytes()).unwrap(), header);
    }

    #[test]
    fn test_header_from_wide_rejects_out_of_range_type() {
        assert!(matches!(
            Header::from_wide(256, 0),
            Err(ProtocolError::HeaderRange { field: "type", .. })
        ));
        assert!(matches!(
            Header::from_wide(-1, 0),
            Err(ProtocolError::HeaderRange { field: "type", .. })
        ));
    }

    #[test]
    fn test_header_from_wide_rejects_out_of_range_timestamp() {
        let too_big = i128::from(i64::MAX) + 1;
        assert!(matches!(
            Header::from_wide(1, too_big),
            Err(ProtocolError::HeaderRange {
                field: "timestamp",
                ..
            })
        ));
    }

    #[test]
    fn test_header_from_wide_accepts_limits() {
        let header = Header::from_wide(255, i128::from(i64::MIN)).unwrap();
        assert_eq!(header, Header::new(255, i64::MIN));
    }

    // ── Build ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_build_without_values_has_no_payload() {
        let msg = RawMessage::build(2, 10, None).unwrap();
        assert_eq!(msg.size(), 0);
        assert_eq!(msg.payload(), None);
        assert_eq!(msg.to_bytes().len(), HEADER_SIZE);
    }

    #[test]
    fn test_build_with_empty_values_has_no_payload() {
        let msg = RawMessage::build(2, 10, Some(&[])).unwrap();
        assert_eq!(msg.size(), 0);
        assert!(msg.values().unwrap().is_empty());
    }

    #[test]
    fn test_size_of_single_short_text() {
        let msg = RawMessage::build(10, 0, Some(&[Value::from("ab")])).unwrap();
        assert_eq!(msg.size(), 4 + 1 + 4 + 2);
    }

    #[test]
    fn test_with_blob_matches_explicit_binary_value() {
        let blob = vec![9u8; 5];
        let wrapped = RawMessage::with_blob(30, 7, blob.clone()).unwrap();
        let explicit = RawMessage::build(30, 7, Some(&[Value::Binary(blob.clone())])).unwrap();

        assert_eq!(wrapped, explicit);
        assert_eq!(wrapped.values().unwrap(), vec![Value::Binary(blob)]);
    }

    #[test]
    fn test_build_wide_rejects_type_out_of_range() {
        let result = RawMessage::build_wide(300, 0, None);
        assert!(matches!(result, Err(ProtocolError::HeaderRange { .. })));
    }

    // ── Parse ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_rejects_short_buffers() {
        for len in 0..HEADER_SIZE {
            let bytes = vec![0u8; len];
            assert_eq!(
                RawMessage::parse(&bytes),
                Err(ProtocolError::TruncatedHeader {
                    needed: HEADER_SIZE,
                    available: len,
                })
            );
        }
    }

    #[test]
    fn test_parse_header_only_has_no_payload() {
        let bytes = Header::new(3, 99).to_bytes();
        let msg = RawMessage::parse(&bytes).unwrap();
        assert_eq!(msg.msg_type(), 3);
        assert_eq!(msg.timestamp(), 99);
        assert_eq!(msg.payload(), None);
    }

    #[test]
    fn test_parse_keeps_payload_undecoded() {
        let mut bytes = Header::new(60, 5).to_bytes().to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]); // nonsense tag length

        let msg = RawMessage::parse(&bytes).expect("parse must not decode the payload");

        assert_eq!(msg.size(), 4);
        assert!(matches!(msg.values(), Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn test_to_bytes_parse_round_trip() {
        let values = vec![Value::Integer(-7), Value::Float(0.25), Value::Null];
        let msg = RawMessage::build(12, -42, Some(&values)).unwrap();

        let parsed = RawMessage::parse(&msg.to_bytes()).unwrap();

        assert_eq!(parsed, msg);
        assert_eq!(parsed.values().unwrap(), values);
    }

    #[test]
    fn test_values_is_repeatable() {
        let msg = RawMessage::build(10, 0, Some(&[Value::Bool(true)])).unwrap();
        assert_eq!(msg.values().unwrap(), msg.values().unwrap());
    }

    // ── Replace in place ──────────────────────────────────────────────────────

    #[test]
    fn test_replace_from_overwrites_header_and_payload() {
        let mut msg = RawMessage::build(10, 1, Some(&[Value::from("old")])).unwrap();
        let other = RawMessage::build(11, 2, Some(&[Value::Integer(5)])).unwrap();

        msg.replace_from(&other.to_bytes()).unwrap();

        assert_eq!(msg, other);
    }

    #[test]
    fn test_replace_from_header_only_clears_payload() {
        let mut msg = RawMessage::build(10, 1, Some(&[Value::from("old")])).unwrap();

        msg.replace_from(&Header::new(2, 3).to_bytes()).unwrap();

        assert_eq!(msg.payload(), None);
        assert_eq!(msg.header(), Header::new(2, 3));
    }

    #[test]
    fn test_replace_from_failure_leaves_message_unchanged() {
        let mut msg = RawMessage::build(10, 1, Some(&[Value::Integer(1)])).unwrap();
        let before = msg.clone();

        let result = msg.replace_from(&[1, 2, 3]);

        assert!(matches!(result, Err(ProtocolError::TruncatedHeader { .. })));
        assert_eq!(msg, before);
    }

    // ── Decoded phase ─────────────────────────────────────────────────────────

    #[test]
    fn test_decode_and_encode_between_phases() {
        let decoded = DecodedMessage::new(60, 1_000, vec![Value::Integer(2), Value::from("x")]);

        let raw = decoded.encode().unwrap();
        let back = DecodedMessage::try_from(&raw).unwrap();

        assert_eq!(back, decoded);
        assert_eq!(back.msg_type(), 60);
        assert_eq!(back.timestamp(), 1_000);
    }
}
