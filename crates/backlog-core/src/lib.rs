//! # backlog-core
//!
//! Message codec for the backlog deployment protocol: the binary format spoken
//! between the backlog agent running at a sensor deployment and the collection
//! server that receives its buffered measurements.
//!
//! This crate performs no I/O.  Opening sockets, the outer 4-byte length prefix
//! on the stream, retries and flow control all belong to the transport that
//! consumes these types.
//!
//! # Architecture overview (for beginners)
//!
//! Every unit of data the agent forwards is a *message*: a 9-byte header
//! (message type + millisecond timestamp) optionally followed by a payload.
//! The payload is not a fixed struct.  It is an ordered list of loosely typed
//! values (integers, floats, strings, blobs...) preceded by a *tag string*
//! with one character per value, so the receiver can decode it without knowing
//! which plugin produced it.
//!
//! - **`protocol::value`** – The [`Value`] sum type and its wire tags.
//! - **`protocol::codec`** – Encoding and decoding of value lists.
//! - **`protocol::message`** – The header and the two message phases:
//!   [`RawMessage`] (header + undecoded bytes) and [`DecodedMessage`]
//!   (header + values).
//! - **`protocol::types`** – Reserved control codes and the plugin registry.
//! - **`protocol::ordering`** – Oldest-first ordering and payload accounting.
//! - **`config`** – TOML configuration for codec limits and plugin codes.

pub mod config;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `backlog_core::RawMessage` instead of `backlog_core::protocol::message::RawMessage`.
pub use config::{BacklogConfig, ConfigError};
pub use protocol::codec::{decode_values, encode_values, ProtocolError};
pub use protocol::message::{DecodedMessage, Header, RawMessage, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use protocol::types::{ControlType, MessageKind, MessageTypeRegistry, RegistryError};
pub use protocol::value::{Tag, Value};
