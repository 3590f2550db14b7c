use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Binary state of an on/off load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoadState {
    Off,
    On,
}

impl LoadState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
        }
    }
}

impl From<bool> for LoadState {
    fn from(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

impl FromStr for LoadState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OFF" | "0" => Ok(Self::Off),
            "ON" | "1" => Ok(Self::On),
            _ => Err(()),
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete speed of the multi-level fan load.
///
/// Wire numbering runs 1..=5 with the off state at level 1; out-of-range
/// requests saturate instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FanLevel {
    Off,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl FanLevel {
    pub const MIN_WIRE: u8 = 1;
    pub const MAX_WIRE: u8 = 5;

    pub fn as_wire(self) -> u8 {
        match self {
            Self::Off => 1,
            Self::Low => 2,
            Self::Medium => 3,
            Self::High => 4,
            Self::VeryHigh => 5,
        }
    }

    /// Maps a wire level onto a fan level, saturating at both ends.
    pub fn saturating_from_wire(level: u8) -> Self {
        match level {
            0 | 1 => Self::Off,
            2 => Self::Low,
            3 => Self::Medium,
            4 => Self::High,
            _ => Self::VeryHigh,
        }
    }

    pub fn step_up(self) -> Self {
        Self::saturating_from_wire(self.as_wire().saturating_add(1))
    }

    pub fn step_down(self) -> Self {
        Self::saturating_from_wire(self.as_wire().saturating_sub(1))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::VeryHigh => "VERY HIGH",
        }
    }
}

impl fmt::Display for FanLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a channel carries a binary state or a discrete level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Binary,
    Leveled,
}

/// One controllable output tracked by the load registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadChannel {
    Heater,
    Light,
    Fan,
    StatusIndicator,
}

impl LoadChannel {
    pub const ALL: [LoadChannel; 4] = [
        Self::Heater,
        Self::Light,
        Self::Fan,
        Self::StatusIndicator,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Heater => "Heater",
            Self::Light => "Light",
            Self::Fan => "Fan",
            Self::StatusIndicator => "LED",
        }
    }

    pub fn kind(self) -> ChannelKind {
        match self {
            Self::Fan => ChannelKind::Leveled,
            _ => ChannelKind::Binary,
        }
    }
}

impl fmt::Display for LoadChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which mirror initiated a state change. The originator is excluded from
/// the resulting fan-out so a change never echoes back to its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Hardware,
    LocalUi,
    Remote,
}

/// A value a channel can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelValue {
    Binary(LoadState),
    Level(FanLevel),
}

impl ChannelValue {
    pub fn kind(self) -> ChannelKind {
        match self {
            Self::Binary(_) => ChannelKind::Binary,
            Self::Level(_) => ChannelKind::Leveled,
        }
    }

    pub fn as_wire_byte(self) -> u8 {
        match self {
            Self::Binary(LoadState::Off) => b'0',
            Self::Binary(LoadState::On) => b'1',
            Self::Level(level) => b'0' + level.as_wire(),
        }
    }
}

impl From<LoadState> for ChannelValue {
    fn from(state: LoadState) -> Self {
        Self::Binary(state)
    }
}

impl From<FanLevel> for ChannelValue {
    fn from(level: FanLevel) -> Self {
        Self::Level(level)
    }
}

impl fmt::Display for ChannelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary(state) => state.fmt(f),
            Self::Level(level) => level.fmt(f),
        }
    }
}

/// One calibrated sample of the current sensor.
///
/// Recreated every sampling period; the registry only ever holds the latest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CurrentReading {
    /// Raw ADC sample after clamping into the hardware range.
    pub raw: u16,
    /// Calibrated sensor voltage in millivolts.
    pub millivolts: u32,
    /// Derived load current in milliamps.
    pub milliamps: u32,
    /// False when the uncalibrated fallback conversion produced the value.
    pub calibrated: bool,
}

/// Aggregate view of every channel plus the latest current reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub heater: LoadState,
    pub light: LoadState,
    pub fan: FanLevel,
    pub status_indicator: LoadState,
    pub current: CurrentReading,
}
