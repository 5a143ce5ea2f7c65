//! Windowed weight acquisition
//!
//! Samples the load cell for a fixed window, drops failed and implausible
//! readings, takes the median of the remaining raw values and converts it
//! with the bound calibration. Conversion is affine, so the median of raw
//! values converts to the median of converted values.

use embedded_hal_async::delay::DelayNs;
use heapless::Vec;

use crate::calibration::CalibrationRecord;
use crate::config::AcquisitionConfig;
use crate::filter::median;
use crate::traits::{Clock, LoadCell};

/// Upper bound on samples kept per window
pub const MAX_WINDOW_SAMPLES: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquireError {
    /// Every sample in the window was discarded
    NoValidSamples,
}

/// Outcome of one acquisition window
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// Reported weight (baseline delta when a baseline is set)
    pub weight: f64,
    /// Median converted weight on the platform
    pub measured: f64,
    /// Samples used for the median
    pub valid: usize,
    /// Samples dropped for read errors or the sanity bound
    pub discarded: usize,
}

impl Measurement {
    /// Reported weight as a percentage of `baseline`, when meaningful
    pub fn percent_of(&self, baseline: Option<f64>) -> Option<f64> {
        match baseline {
            Some(b) if b != 0.0 => Some(self.weight / b * 100.0),
            _ => None,
        }
    }
}

/// Converts load-cell readings to weight with a bound calibration
///
/// Cannot be constructed without a [`CalibrationRecord`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightAcquirer {
    record: CalibrationRecord,
}

impl WeightAcquirer {
    pub fn new(record: CalibrationRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &CalibrationRecord {
        &self.record
    }

    /// Rebind to a new record (after a re-tare)
    pub fn rebind(&mut self, record: CalibrationRecord) {
        self.record = record;
    }

    /// Sample for `config.window_ms` and return the filtered weight
    ///
    /// On success the load cell is powered down. On
    /// [`AcquireError::NoValidSamples`] it is left as is; powering it down
    /// is the caller's job.
    pub async fn acquire<L, D, C>(
        &self,
        load_cell: &mut L,
        delay: &mut D,
        clock: &C,
        config: &AcquisitionConfig,
    ) -> Result<Measurement, AcquireError>
    where
        L: LoadCell,
        D: DelayNs,
        C: Clock,
    {
        if let Err(e) = load_cell.power_down().await {
            warn!("Acquire: power down failed: {:?}", e);
        }
        if let Err(e) = load_cell.power_up().await {
            warn!("Acquire: power up failed: {:?}", e);
        }

        let mut raw_values: Vec<f64, MAX_WINDOW_SAMPLES> = Vec::new();
        let mut discarded = 0usize;
        let start = clock.now_ms();
        let window = config.window_ms as u64;

        while clock.now_ms().saturating_sub(start) < window {
            match load_cell.read_raw().await {
                Ok(raw) => {
                    let weight = self.record.convert(raw);
                    if weight.is_finite() && weight.abs() <= config.sanity_bound {
                        if raw_values.push(raw).is_err() {
                            warn!("Acquire: window full, stopping early");
                            break;
                        }
                    } else {
                        discarded += 1;
                        warn!("Acquire: discarded out-of-bounds reading {}", weight);
                    }
                }
                Err(e) => {
                    discarded += 1;
                    warn!("Acquire: discarded reading: {:?}", e);
                }
            }
            delay.delay_ms(config.sample_interval_ms).await;
        }

        let valid = raw_values.len();
        let raw = median(&mut raw_values).ok_or(AcquireError::NoValidSamples)?;
        let measured = self.record.convert(raw);
        let weight = match self.record.baseline_weight() {
            Some(baseline) => baseline - measured,
            None => measured,
        };

        if let Err(e) = load_cell.power_down().await {
            warn!("Acquire: power down failed: {:?}", e);
        }

        debug!(
            "Acquired {} valid / {} discarded samples",
            valid, discarded
        );
        Ok(Measurement {
            weight,
            measured,
            valid,
            discarded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, ScriptedLoadCell, StepDelay};
    use crate::traits::SensorError;
    use embassy_futures::block_on;
    use proptest::prelude::*;

    fn window(window_ms: u32) -> AcquisitionConfig {
        AcquisitionConfig {
            window_ms,
            ..AcquisitionConfig::default()
        }
    }

    fn acquirer(offset: f64, unit: f64, baseline: Option<f64>) -> WeightAcquirer {
        WeightAcquirer::new(CalibrationRecord::with_parts(offset, unit, baseline).unwrap())
    }

    #[test]
    fn test_median_of_valid_converted() {
        let clock = ManualClock::new();
        let mut delay = StepDelay::new(&clock);
        // offset 1000, unit 10: raw 1100 -> 10 g
        let mut cell = ScriptedLoadCell::new([
            Ok(1100.0),
            Ok(1120.0),
            Err(SensorError::Timeout),
            Ok(1110.0),
            Ok(1.0e6), // 99_900 g is inside the bound
            Ok(2.0e6), // 199_900 g is outside
        ]);

        let m = block_on(acquirer(1000.0, 10.0, None).acquire(
            &mut cell,
            &mut delay,
            &clock,
            &window(600),
        ))
        .unwrap();
        assert_eq!(m.valid, 4);
        assert_eq!(m.discarded, 2);
        // Median of 10, 11, 12, 99_900 = (11 + 12) / 2
        assert_eq!(m.measured, 11.5);
        assert_eq!(m.weight, 11.5);
        assert_eq!(cell.reads, 6);
    }

    #[test]
    fn test_window_length_and_cadence() {
        let clock = ManualClock::new();
        let mut delay = StepDelay::new(&clock);
        let mut cell = ScriptedLoadCell::constant(0.0);

        let m = block_on(acquirer(0.0, 1.0, None).acquire(
            &mut cell,
            &mut delay,
            &clock,
            &AcquisitionConfig::default(),
        ))
        .unwrap();
        // 3 s window at 100 ms
        assert_eq!(m.valid, 30);
        assert_eq!(clock.now(), 3000);
    }

    #[test]
    fn test_baseline_delta() {
        let clock = ManualClock::new();
        let mut delay = StepDelay::new(&clock);
        let mut cell = ScriptedLoadCell::constant(300.0);

        let m = block_on(acquirer(100.0, 2.0, Some(250.0)).acquire(
            &mut cell,
            &mut delay,
            &clock,
            &window(300),
        ))
        .unwrap();
        assert_eq!(m.measured, 100.0);
        assert_eq!(m.weight, 150.0);
        assert_eq!(m.percent_of(Some(250.0)), Some(60.0));
        assert_eq!(m.percent_of(Some(0.0)), None);
        assert_eq!(m.percent_of(None), None);
    }

    #[test]
    fn test_power_cycled_and_powered_down_on_success() {
        let clock = ManualClock::new();
        let mut delay = StepDelay::new(&clock);
        let mut cell = ScriptedLoadCell::constant(5.0);

        block_on(acquirer(0.0, 1.0, None).acquire(&mut cell, &mut delay, &clock, &window(200)))
            .unwrap();
        assert_eq!(cell.power_ups, 1);
        assert_eq!(cell.power_downs, 2);
        assert!(!cell.powered);
    }

    #[test]
    fn test_no_valid_samples_leaves_power_alone() {
        let clock = ManualClock::new();
        let mut delay = StepDelay::new(&clock);
        let mut cell = ScriptedLoadCell::failing(SensorError::Timeout);
        let acq = acquirer(0.0, 1.0, None);

        let result = block_on(acq.acquire(&mut cell, &mut delay, &clock, &window(500)));
        assert_eq!(result, Err(AcquireError::NoValidSamples));
        assert!(cell.powered);
        assert_eq!(cell.power_downs, 1);
        // Calibration untouched
        assert_eq!(acq.record(), &CalibrationRecord::new(0.0, 1.0).unwrap());
    }

    #[test]
    fn test_out_of_bounds_only_is_failure() {
        let clock = ManualClock::new();
        let mut delay = StepDelay::new(&clock);
        let mut cell = ScriptedLoadCell::constant(1.0e12);

        let result = block_on(acquirer(0.0, 1.0, None).acquire(
            &mut cell,
            &mut delay,
            &clock,
            &window(300),
        ));
        assert_eq!(result, Err(AcquireError::NoValidSamples));
    }

    proptest! {
        #[test]
        fn prop_equals_median_of_converted_valid(
            raws in prop::collection::vec(prop_oneof![
                3 => (-1.0e6f64..1.0e6).prop_map(Ok::<f64, SensorError>),
                1 => Just(Err(SensorError::Timeout)),
            ], 1..30),
            offset in -1.0e4f64..1.0e4,
            unit in prop_oneof![-500.0f64..-0.5, 0.5f64..500.0],
        ) {
            let clock = ManualClock::new();
            let mut delay = StepDelay::new(&clock);
            let n = raws.len() as u32;
            let mut cell = ScriptedLoadCell::new(raws.clone());
            let acq = acquirer(offset, unit, None);
            let config = AcquisitionConfig {
                window_ms: n * 100,
                sample_interval_ms: 100,
                sanity_bound: 1.0e5,
                post_trigger_pause_ms: 0,
            };

            let mut expected: std::vec::Vec<f64> = raws
                .iter()
                .filter_map(|r| r.ok())
                .map(|raw| acq.record().convert(raw))
                .filter(|w| w.abs() <= 1.0e5)
                .collect();

            let result = block_on(acq.acquire(&mut cell, &mut delay, &clock, &config));
            match median(&mut expected) {
                Some(m) => {
                    let got = result.unwrap().measured;
                    prop_assert!((got - m).abs() <= 1e-6 * m.abs().max(1.0));
                }
                None => prop_assert_eq!(result, Err(AcquireError::NoValidSamples)),
            }
        }
    }
}
