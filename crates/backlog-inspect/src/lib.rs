//! Human-readable rendering of captured backlog messages.
//!
//! Captures are hex dumps of single messages, exactly as handed to
//! [`RawMessage::parse`] (the transport's length prefix already removed).

use backlog_core::protocol::{check_payload_size, read_tag_string};
use backlog_core::{MessageTypeRegistry, ProtocolError, RawMessage, Value};
use thiserror::Error;

/// Errors raised while turning a capture line into a message.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Parses one hex-encoded message.  Whitespace and an optional `0x` prefix
/// are ignored.
///
/// # Errors
///
/// [`InspectError::Hex`] for invalid hex, [`InspectError::Protocol`] if the
/// bytes are not a message or its payload exceeds `max_payload_size`.
pub fn parse_hex_message(line: &str, max_payload_size: u64) -> Result<RawMessage, InspectError> {
    let digits: String = line.split_whitespace().collect();
    let digits = digits.strip_prefix("0x").unwrap_or(&digits);
    let bytes = hex::decode(digits)?;
    let msg = RawMessage::parse(&bytes)?;
    check_payload_size(msg.size(), max_payload_size)?;
    Ok(msg)
}

/// Formats one value for display.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Float(f) => format!("{f:?}"),
        Value::Text(bytes) => format!("{:?}", String::from_utf8_lossy(bytes)),
        Value::Binary(bytes) => format!("0x{} ({} bytes)", hex::encode(bytes), bytes.len()),
    }
}

/// Renders a message as a multi-line report.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the payload cannot be decoded.
pub fn render_message(
    msg: &RawMessage,
    registry: &MessageTypeRegistry,
) -> Result<String, ProtocolError> {
    let mut out = format!(
        "type:      {} ({})\ntimestamp: {}\nsize:      {}\n",
        msg.msg_type(),
        registry.describe(msg.msg_type()),
        msg.timestamp(),
        msg.size(),
    );

    let Some(payload) = msg.payload() else {
        out.push_str("payload:   none\n");
        return Ok(out);
    };

    let tags = read_tag_string(payload)?;
    let values = msg.values()?;
    out.push_str(&format!("tags:      {tags}\nvalues:\n"));
    out.extend(
        values
            .iter()
            .enumerate()
            .map(|(index, value)| format!("  [{index}] {}\n", format_value(value))),
    );
    Ok(out)
}
