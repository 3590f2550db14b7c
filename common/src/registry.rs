use crate::error::RegistryError;
use crate::types::{
    ChannelValue, CurrentReading, DeviceSnapshot, FanLevel, LoadChannel, LoadState, Origin,
};

/// Mirrors a committed change must be pushed to.
///
/// The actuator driver is not listed: it never originates changes, so it
/// receives every committed transition unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    pub local_ui: bool,
    pub remote: bool,
}

/// Result of an `apply` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The channel already held the requested value; nothing to propagate.
    Unchanged,
    /// The canonical value was replaced and must fan out to `targets`.
    Applied {
        value: ChannelValue,
        revision: u64,
        targets: FanOut,
    },
}

#[derive(Debug, Clone, Copy)]
struct Slot<T> {
    value: T,
    revision: u64,
}

impl<T: Copy + PartialEq> Slot<T> {
    fn new(value: T) -> Self {
        Self { value, revision: 0 }
    }

    /// Replaces the value unless it is already held, bumping the revision
    /// on a real transition.
    fn replace(&mut self, value: T) -> Option<u64> {
        if self.value == value {
            return None;
        }
        self.value = value;
        self.revision += 1;
        Some(self.revision)
    }
}

/// Single source of truth for every controllable output and the latest
/// current reading.
///
/// All mutation goes through [`LoadRegistry::apply`]; mirrors only observe.
/// The registry itself is not synchronized — the owner serializes access
/// (the controller wraps it in a mutex) so the compare/replace/revision
/// step stays atomic with respect to concurrent applies.
#[derive(Debug, Clone)]
pub struct LoadRegistry {
    heater: Slot<LoadState>,
    light: Slot<LoadState>,
    fan: Slot<FanLevel>,
    status_indicator: Slot<LoadState>,
    current: CurrentReading,
}

impl Default for LoadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadRegistry {
    /// All loads start off; channels live for the process duration.
    pub fn new() -> Self {
        Self {
            heater: Slot::new(LoadState::Off),
            light: Slot::new(LoadState::Off),
            fan: Slot::new(FanLevel::Off),
            status_indicator: Slot::new(LoadState::Off),
            current: CurrentReading::default(),
        }
    }

    /// Commits a state change requested by `origin`.
    ///
    /// Identical values are a no-op; a committed transition reports the
    /// mirrors to notify, excluding the originator. A value of the wrong
    /// kind for the channel is rejected without any partial update.
    pub fn apply(
        &mut self,
        channel: LoadChannel,
        value: ChannelValue,
        origin: Origin,
    ) -> Result<ApplyOutcome, RegistryError> {
        if value.kind() != channel.kind() {
            return Err(RegistryError::KindMismatch {
                channel,
                expected: channel.kind(),
                got: value.kind(),
            });
        }

        let revision = match (channel, value) {
            (LoadChannel::Heater, ChannelValue::Binary(state)) => self.heater.replace(state),
            (LoadChannel::Light, ChannelValue::Binary(state)) => self.light.replace(state),
            (LoadChannel::Fan, ChannelValue::Level(level)) => self.fan.replace(level),
            (LoadChannel::StatusIndicator, ChannelValue::Binary(state)) => {
                self.status_indicator.replace(state)
            }
            // Kind agreement was checked above.
            _ => unreachable!("channel/value kind mismatch after check"),
        };

        Ok(match revision {
            None => ApplyOutcome::Unchanged,
            Some(revision) => ApplyOutcome::Applied {
                value,
                revision,
                targets: Self::fan_out(channel, origin),
            },
        })
    }

    /// Origin-exclusion table: every mirror except the one that asked,
    /// and the status indicator is never mirrored on the local display.
    fn fan_out(channel: LoadChannel, origin: Origin) -> FanOut {
        FanOut {
            local_ui: origin != Origin::LocalUi && channel != LoadChannel::StatusIndicator,
            remote: origin != Origin::Remote,
        }
    }

    pub fn read(&self, channel: LoadChannel) -> ChannelValue {
        match channel {
            LoadChannel::Heater => self.heater.value.into(),
            LoadChannel::Light => self.light.value.into(),
            LoadChannel::Fan => self.fan.value.into(),
            LoadChannel::StatusIndicator => self.status_indicator.value.into(),
        }
    }

    pub fn revision(&self, channel: LoadChannel) -> u64 {
        match channel {
            LoadChannel::Heater => self.heater.revision,
            LoadChannel::Light => self.light.revision,
            LoadChannel::Fan => self.fan.revision,
            LoadChannel::StatusIndicator => self.status_indicator.revision,
        }
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            heater: self.heater.value,
            light: self.light.value,
            fan: self.fan.value,
            status_indicator: self.status_indicator.value,
            current: self.current,
        }
    }

    /// Replaces the current reading. Sensor data has no mirrors to notify
    /// and therefore bypasses dispatch; readers pick it up on their own
    /// schedule.
    pub fn update_current(&mut self, reading: CurrentReading) {
        self.current = reading;
    }

    pub fn latest_current(&self) -> CurrentReading {
        self.current
    }
}
