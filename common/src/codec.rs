//! Single-byte wire codec for the remote topic protocol.
//!
//! One message is one topic name plus a one-byte ASCII payload: `'0'`/`'1'`
//! for binary loads, `'1'..'5'` for the fan level. The current reading goes
//! out as a plain decimal string on its own output-only topic.

use crate::error::DecodeError;
use crate::topics::{channel_for, topic_for};
use crate::types::{ChannelKind, ChannelValue, FanLevel, LoadChannel, LoadState};

/// A decoded remote command, ready for the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub channel: LoadChannel,
    pub value: ChannelValue,
    /// The payload carried a fan level outside [1, 5] and was saturated.
    /// Counted as a range warning by the caller, never fatal.
    pub clamped: bool,
}

/// Encodes a channel value as its one-byte payload.
pub fn encode(value: ChannelValue) -> [u8; 1] {
    [value.as_wire_byte()]
}

/// Encodes the current reading for the `Current` topic.
pub fn encode_current(milliamps: u32) -> String {
    milliamps.to_string()
}

/// Decodes an inbound message.
///
/// `Ok(None)` means the payload is meaningless for the channel and the
/// message should be silently ignored (binary channels accept only
/// `'0'`/`'1'`). Errors mean the message must be dropped and logged.
/// Only the first payload byte is interpreted.
pub fn decode(topic: &str, payload: &[u8]) -> Result<Option<Command>, DecodeError> {
    let channel =
        channel_for(topic).ok_or_else(|| DecodeError::UnknownTopic(topic.to_string()))?;
    let topic = topic_for(channel);

    let Some(&byte) = payload.first() else {
        return Err(DecodeError::EmptyPayload(topic));
    };

    match channel.kind() {
        ChannelKind::Binary => {
            let state = match byte {
                b'0' => LoadState::Off,
                b'1' => LoadState::On,
                _ => return Ok(None),
            };
            Ok(Some(Command {
                channel,
                value: state.into(),
                clamped: false,
            }))
        }
        ChannelKind::Leveled => {
            if !byte.is_ascii_digit() {
                return Err(DecodeError::Malformed { topic, byte });
            }
            let wire = byte - b'0';
            let level = FanLevel::saturating_from_wire(wire);
            Ok(Some(Command {
                channel,
                value: level.into(),
                clamped: !(FanLevel::MIN_WIRE..=FanLevel::MAX_WIRE).contains(&wire),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn decoded(topic: &str, payload: &[u8]) -> Command {
        decode(topic, payload).unwrap().unwrap()
    }

    #[test]
    fn round_trips_every_binary_state() {
        for channel in [
            LoadChannel::Heater,
            LoadChannel::Light,
            LoadChannel::StatusIndicator,
        ] {
            for state in [LoadState::Off, LoadState::On] {
                let value = ChannelValue::from(state);
                let payload = encode(value);
                let command = decoded(topic_for(channel), &payload);
                assert_eq!(command.channel, channel);
                assert_eq!(command.value, value);
                assert!(!command.clamped);
            }
        }
    }

    #[test]
    fn round_trips_every_fan_level() {
        for wire in FanLevel::MIN_WIRE..=FanLevel::MAX_WIRE {
            let level = FanLevel::saturating_from_wire(wire);
            let payload = encode(level.into());
            let command = decoded("Fan", &payload);
            assert_eq!(command.value, ChannelValue::Level(level));
            assert!(!command.clamped);
        }
    }

    #[test]
    fn unknown_topic_is_rejected() {
        assert_eq!(
            decode("Lamp9", b"1"),
            Err(DecodeError::UnknownTopic("Lamp9".to_string()))
        );
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert_eq!(decode("Heater", b""), Err(DecodeError::EmptyPayload("Heater")));
    }

    #[test]
    fn binary_junk_byte_is_ignored_not_an_error() {
        assert_eq!(decode("Light", b"x"), Ok(None));
        assert_eq!(decode("Heater", b"2"), Ok(None));
    }

    #[test]
    fn fan_non_digit_is_malformed() {
        assert_eq!(
            decode("Fan", b"x"),
            Err(DecodeError::Malformed {
                topic: "Fan",
                byte: b'x',
            })
        );
    }

    #[test]
    fn fan_out_of_range_digits_are_clamped_and_flagged() {
        let low = decoded("Fan", b"0");
        assert_eq!(low.value, ChannelValue::Level(FanLevel::Off));
        assert!(low.clamped);

        let high = decoded("Fan", b"9");
        assert_eq!(high.value, ChannelValue::Level(FanLevel::VeryHigh));
        assert!(high.clamped);
    }

    #[test]
    fn only_first_byte_is_interpreted() {
        let command = decoded("Heater", b"1garbage");
        assert_eq!(command.value, ChannelValue::Binary(LoadState::On));
    }

    #[test]
    fn current_encodes_as_decimal_ascii() {
        assert_eq!(encode_current(0), "0");
        assert_eq!(encode_current(1250), "1250");
    }
}
