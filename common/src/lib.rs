pub mod codec;
pub mod config;
pub mod error;
pub mod registry;
pub mod sense;
pub mod topics;
pub mod types;

pub use codec::Command;
pub use config::{NetworkConfig, RelayConfig, RuntimeConfig};
pub use error::{DecodeError, RegistryError};
pub use registry::{ApplyOutcome, FanOut, LoadRegistry};
pub use sense::{AdcCalibration, CurrentScale};
pub use topics::*;
pub use types::{
    ChannelKind, ChannelValue, CurrentReading, DeviceSnapshot, FanLevel, LoadChannel, LoadState,
    Origin,
};
