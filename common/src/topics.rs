use crate::types::LoadChannel;

/// Output-only topic carrying the latest current reading in milliamps.
pub const TOPIC_CURRENT: &str = "Current";

/// Fixed topic table for the command channels, injective in both directions.
pub const CHANNEL_TOPICS: [(&str, LoadChannel); 4] = [
    ("Heater", LoadChannel::Heater),
    ("Light", LoadChannel::Light),
    ("Fan", LoadChannel::Fan),
    ("LED", LoadChannel::StatusIndicator),
];

/// Topic a channel's state is published on.
pub fn topic_for(channel: LoadChannel) -> &'static str {
    channel.name()
}

/// Channel a command topic addresses, if any.
pub fn channel_for(topic: &str) -> Option<LoadChannel> {
    CHANNEL_TOPICS
        .iter()
        .find(|(name, _)| *name == topic)
        .map(|(_, channel)| *channel)
}
