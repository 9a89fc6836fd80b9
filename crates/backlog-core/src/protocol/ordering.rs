//! Timestamp ordering and payload accounting for message queues.
//!
//! Messages are ordered by timestamp alone.  Two messages with the same
//! timestamp compare equal here even if their contents differ, so containers
//! keep them in whatever order they were inserted.

use std::cmp::Ordering;

use crate::protocol::codec::ProtocolError;
use crate::protocol::message::{DecodedMessage, RawMessage, MAX_PAYLOAD_SIZE};

/// Anything that can be queued by timestamp.
pub trait Timestamped {
    fn timestamp(&self) -> i64;

    /// `true` if `self` was created strictly before `other`.
    fn is_older_than(&self, other: &impl Timestamped) -> bool
    where
        Self: Sized,
    {
        self.timestamp() < other.timestamp()
    }
}

impl Timestamped for RawMessage {
    fn timestamp(&self) -> i64 {
        RawMessage::timestamp(self)
    }
}

impl Timestamped for DecodedMessage {
    fn timestamp(&self) -> i64 {
        DecodedMessage::timestamp(self)
    }
}

/// Compares two messages by timestamp, for use with `sort_by`.
pub fn by_timestamp<M: Timestamped>(a: &M, b: &M) -> Ordering {
    a.timestamp().cmp(&b.timestamp())
}

/// Wrapper that makes [`std::collections::BinaryHeap`] pop the oldest
/// message first.
///
/// # Examples
///
/// ```rust
/// use std::collections::BinaryHeap;
/// use backlog_core::RawMessage;
/// use backlog_core::protocol::OldestFirst;
///
/// let mut queue = BinaryHeap::new();
/// queue.push(OldestFirst(RawMessage::build(10, 300, None).unwrap()));
/// queue.push(OldestFirst(RawMessage::build(10, 100, None).unwrap()));
/// assert_eq!(queue.pop().unwrap().0.timestamp(), 100);
/// ```
#[derive(Debug, Clone)]
pub struct OldestFirst<M>(pub M);

impl<M: Timestamped> PartialEq for OldestFirst<M> {
    fn eq(&self, other: &Self) -> bool {
        self.0.timestamp() == other.0.timestamp()
    }
}

impl<M: Timestamped> Eq for OldestFirst<M> {}

impl<M: Timestamped> PartialOrd for OldestFirst<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<M: Timestamped> Ord for OldestFirst<M> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: the max-heap's "greatest" element is the oldest one.
        other.0.timestamp().cmp(&self.0.timestamp())
    }
}

/// Running total of payload bytes held by a queue or buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayloadTally {
    messages: usize,
    bytes: u64,
}

impl PayloadTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, msg: &RawMessage) {
        self.messages += 1;
        self.bytes += msg.size() as u64;
    }

    /// Removes a message previously passed to [`PayloadTally::add`].
    pub fn remove(&mut self, msg: &RawMessage) {
        self.messages = self.messages.saturating_sub(1);
        self.bytes = self.bytes.saturating_sub(msg.size() as u64);
    }

    pub fn messages(&self) -> usize {
        self.messages
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl<'a> FromIterator<&'a RawMessage> for PayloadTally {
    fn from_iter<I: IntoIterator<Item = &'a RawMessage>>(iter: I) -> Self {
        let mut tally = Self::new();
        for msg in iter {
            tally.add(msg);
        }
        tally
    }
}

/// Checks a payload size against a configured limit.
///
/// `limit` is clamped to [`MAX_PAYLOAD_SIZE`].
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] if `size` exceeds the limit.
pub fn check_payload_size(size: usize, limit: u64) -> Result<(), ProtocolError> {
    let max = limit.min(MAX_PAYLOAD_SIZE);
    if size as u64 > max {
        return Err(ProtocolError::PayloadTooLarge {
            size: size as u64,
            max,
        });
    }
    Ok(())
}
