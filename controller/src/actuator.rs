//! Mapping from canonical channel state to physical output signals.
//!
//! The driver is stateless: it derives the signal purely from the value it
//! is handed, so repeating a call re-asserts the same levels and changes
//! nothing.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use relay_common::{ChannelValue, FanLevel, LoadChannel, LoadState};
use tracing::debug;

use crate::dispatch::Actuator;

/// One single-bit output line.
pub trait OutputPin: Send {
    fn set_level(&mut self, high: bool);
}

/// Drive strategy for the multi-level fan. Whether a level becomes a PWM
/// duty or a relay-bank combination is a board decision, injected here.
pub trait FanDrive: Send {
    fn apply_level(&mut self, level: FanLevel);
}

struct Outputs {
    heater: Box<dyn OutputPin>,
    light: Box<dyn OutputPin>,
    status: Box<dyn OutputPin>,
    fan: Box<dyn FanDrive>,
}

/// Relay-board wiring for all four channels.
pub struct ActuatorDriver {
    outputs: Mutex<Outputs>,
}

impl ActuatorDriver {
    pub fn new(
        heater: Box<dyn OutputPin>,
        light: Box<dyn OutputPin>,
        status: Box<dyn OutputPin>,
        fan: Box<dyn FanDrive>,
    ) -> Self {
        let mut outputs = Outputs {
            heater,
            light,
            status,
            fan,
        };
        // Loads start de-asserted; the relay inputs are active-low.
        outputs.heater.set_level(true);
        outputs.light.set_level(true);
        outputs.status.set_level(true);
        outputs.fan.apply_level(FanLevel::Off);

        Self {
            outputs: Mutex::new(outputs),
        }
    }

    fn drive_relay(pin: &mut dyn OutputPin, state: LoadState) {
        pin.set_level(state == LoadState::Off);
    }
}

impl Actuator for ActuatorDriver {
    fn actuate(&self, channel: LoadChannel, value: ChannelValue) {
        let mut outputs = self.outputs.lock().unwrap();
        match (channel, value) {
            (LoadChannel::Heater, ChannelValue::Binary(state)) => {
                Self::drive_relay(outputs.heater.as_mut(), state);
            }
            (LoadChannel::Light, ChannelValue::Binary(state)) => {
                Self::drive_relay(outputs.light.as_mut(), state);
            }
            (LoadChannel::StatusIndicator, ChannelValue::Binary(state)) => {
                Self::drive_relay(outputs.status.as_mut(), state);
            }
            (LoadChannel::Fan, ChannelValue::Level(level)) => {
                outputs.fan.apply_level(level);
            }
            // Kind agreement is enforced by the registry before dispatch.
            _ => {}
        }
    }
}

/// Host stand-in that records the driven level.
///
/// Hardware integration point: the board build replaces these with GPIO pad
/// drivers.
pub struct SimulatedPin {
    name: &'static str,
    level: Arc<AtomicBool>,
}

impl SimulatedPin {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            // High is the de-asserted level on this board.
            level: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Shared view of the pin level for tests and diagnostics.
    pub fn probe(&self) -> PinProbe {
        PinProbe(self.level.clone())
    }
}

impl OutputPin for SimulatedPin {
    fn set_level(&mut self, high: bool) {
        if self.level.swap(high, Ordering::Relaxed) != high {
            debug!(pin = self.name, high, "pin level changed");
        }
    }
}

#[derive(Clone)]
pub struct PinProbe(Arc<AtomicBool>);

impl PinProbe {
    pub fn is_high(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Host stand-in for the fan drive.
pub struct SimulatedFanDrive {
    level: Arc<AtomicU8>,
}

impl SimulatedFanDrive {
    pub fn new() -> Self {
        Self {
            level: Arc::new(AtomicU8::new(FanLevel::Off.as_wire())),
        }
    }

    pub fn probe(&self) -> FanProbe {
        FanProbe(self.level.clone())
    }
}

impl Default for SimulatedFanDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl FanDrive for SimulatedFanDrive {
    fn apply_level(&mut self, level: FanLevel) {
        if self.level.swap(level.as_wire(), Ordering::Relaxed) != level.as_wire() {
            debug!(%level, "fan drive changed");
        }
    }
}

#[derive(Clone)]
pub struct FanProbe(Arc<AtomicU8>);

impl FanProbe {
    pub fn level(&self) -> FanLevel {
        FanLevel::saturating_from_wire(self.0.load(Ordering::Relaxed))
    }
}
