//! Protocol module containing the value codec, message framing and type registry.

pub mod codec;
pub mod message;
pub mod ordering;
pub mod types;
pub mod value;

pub use codec::{decode_values, encode_values, read_tag_string, tag_string, ProtocolError};
pub use message::{DecodedMessage, Header, RawMessage, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use ordering::{by_timestamp, check_payload_size, OldestFirst, PayloadTally, Timestamped};
pub use types::{ControlType, MessageKind, MessageTypeRegistry, RegistryError};
pub use value::{values_from_any, Tag, Value};
