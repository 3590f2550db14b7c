//! Periodic current sensing.
//!
//! The sampler owns the raw channel and its calibration choice; each cycle
//! produces one reading and drops it into the registry's snapshot slot.
//! Sensor faults are recovered in place — a bad read is clamped and logged
//! and the next period proceeds regardless.

use std::sync::Arc;
use std::time::Duration;

use relay_common::{
    sense::{self, AdcCalibration, CurrentScale},
    CurrentReading, RelayConfig,
};
use tracing::{debug, warn};

use crate::dispatch::Dispatcher;

/// The raw sensor channel collaborator.
pub trait SampleSource: Send {
    fn read_raw(&mut self) -> i32;

    /// Characterization coefficients for this hardware revision, if the
    /// reference data is present.
    fn characterization(&self) -> Option<(u32, u32)>;
}

pub struct CurrentSampler<S: SampleSource> {
    source: S,
    calibration: AdcCalibration,
    scale: CurrentScale,
}

impl<S: SampleSource> CurrentSampler<S> {
    /// Resolves the calibration once. A missing characterization falls back
    /// to the nominal linear mapping and keeps sampling; startup is never
    /// blocked on calibration data.
    pub fn new(source: S, config: &RelayConfig) -> Self {
        let calibration = match source.characterization() {
            Some((coeff_a, coeff_b)) => AdcCalibration::Characterized { coeff_a, coeff_b },
            None => {
                warn!("no ADC characterization for this hardware revision, using uncalibrated conversion");
                AdcCalibration::Uncalibrated {
                    vref_mv: config.adc_vref_mv,
                }
            }
        };

        Self {
            source,
            calibration,
            scale: CurrentScale {
                numerator: config.current_coeff_numerator,
                denominator: config.current_coeff_denominator,
            },
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_characterized()
    }

    pub fn sample_once(&mut self) -> CurrentReading {
        let raw = self.source.read_raw();
        let (reading, clamped) = sense::reading_from_raw(raw, &self.calibration, self.scale);
        if clamped {
            warn!(raw, clamped_to = reading.raw, "raw sample outside ADC range");
        }
        debug!(
            raw = reading.raw,
            millivolts = reading.millivolts,
            milliamps = reading.milliamps,
            "current sample"
        );
        reading
    }
}

/// Sampler task: one reading per period into the registry. The write
/// bypasses dispatch — sensor data has no mirrors to notify; readers pull
/// it on their own schedules.
pub async fn run_sampler<S: SampleSource + 'static>(
    mut sampler: CurrentSampler<S>,
    dispatcher: Arc<Dispatcher>,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let reading = sampler.sample_once();
        dispatcher.update_current(reading).await;
    }
}

/// Host stand-in producing a slow sawtooth.
///
/// Hardware integration point: the board build reads the ADC oneshot
/// channel here instead.
pub struct SimulatedAdc {
    tick: u32,
}

impl SimulatedAdc {
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

impl Default for SimulatedAdc {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for SimulatedAdc {
    fn read_raw(&mut self) -> i32 {
        self.tick = self.tick.wrapping_add(1);
        i32::try_from((self.tick % 64) * 50).unwrap_or(i32::MAX)
    }

    fn characterization(&self) -> Option<(u32, u32)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource {
        raw: i32,
        characterization: Option<(u32, u32)>,
    }

    impl SampleSource for FixedSource {
        fn read_raw(&mut self) -> i32 {
            self.raw
        }

        fn characterization(&self) -> Option<(u32, u32)> {
            self.characterization
        }
    }

    #[test]
    fn missing_characterization_falls_back_uncalibrated() {
        let mut sampler = CurrentSampler::new(
            FixedSource {
                raw: 2048,
                characterization: None,
            },
            &RelayConfig::default(),
        );

        assert!(!sampler.is_calibrated());
        let reading = sampler.sample_once();
        assert!(!reading.calibrated);
        // 2048/4095 of the nominal 1100 mV reference at unit scale.
        assert_eq!(reading.milliamps, 550);
    }

    #[test]
    fn characterized_source_produces_calibrated_readings() {
        let mut sampler = CurrentSampler::new(
            FixedSource {
                raw: 1000,
                characterization: Some((65_536, 75)),
            },
            &RelayConfig::default(),
        );

        assert!(sampler.is_calibrated());
        let reading = sampler.sample_once();
        assert!(reading.calibrated);
        assert_eq!(reading.millivolts, 1075);
    }

    #[test]
    fn below_floor_read_clamps_to_zero_and_continues() {
        let mut sampler = CurrentSampler::new(
            FixedSource {
                raw: -5,
                characterization: None,
            },
            &RelayConfig::default(),
        );

        let reading = sampler.sample_once();
        assert_eq!(reading.raw, 0);
        assert_eq!(reading.milliamps, 0);

        // The next period samples normally.
        sampler.source.raw = 100;
        assert_eq!(sampler.sample_once().raw, 100);
    }

    #[test]
    fn simulated_adc_stays_in_hardware_range() {
        let mut adc = SimulatedAdc::new();
        for _ in 0..200 {
            let raw = adc.read_raw();
            assert!((0..=i32::from(relay_common::sense::ADC_MAX_RAW)).contains(&raw));
        }
    }
}
