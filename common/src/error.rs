use thiserror::Error;

use crate::types::{ChannelKind, LoadChannel};

/// Contract violations reported by the load registry.
///
/// These indicate caller bugs, not runtime conditions; every other fault
/// class (decode, range, sensor) is recovered where it occurs and never
/// crosses a component boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A value of the wrong kind was applied to a channel, e.g. a fan
    /// level on a binary load. No partial update is performed.
    #[error("channel {channel} holds a {expected:?} value, got {got:?}")]
    KindMismatch {
        channel: LoadChannel,
        expected: ChannelKind,
        got: ChannelKind,
    },
}

/// Failures while decoding an inbound wire message.
///
/// Callers drop the message and log; no state is mutated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("empty payload on topic {0}")]
    EmptyPayload(&'static str),

    #[error("unparseable payload byte 0x{byte:02x} on topic {topic}")]
    Malformed { topic: &'static str, byte: u8 },
}
