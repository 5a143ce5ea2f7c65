//! Gyroscope polling loop

use embedded_hal_async::delay::DelayNs;

use super::detector::{Settled, StabilityDetector};
use crate::config::StabilityConfig;
use crate::traits::{AngularRates, Clock, Gyroscope, SensorError, StopSignal};

/// Drives a [`StabilityDetector`] from a gyroscope on a fixed cadence
///
/// Read errors are treated as motion and followed by a longer backoff.
/// Status is logged at most once per `status_interval_ms`.
pub struct StabilityMonitor {
    detector: StabilityDetector,
    sample_interval_ms: u32,
    error_backoff_ms: u32,
    status_interval_ms: u64,
    last_status_ms: Option<u64>,
}

impl StabilityMonitor {
    pub fn new(config: &StabilityConfig) -> Self {
        Self {
            detector: StabilityDetector::from_config(config),
            sample_interval_ms: config.sample_interval_ms,
            error_backoff_ms: config.error_backoff_ms,
            status_interval_ms: config.status_interval_ms as u64,
            last_status_ms: None,
        }
    }

    pub fn detector(&self) -> &StabilityDetector {
        &self.detector
    }

    /// Forget accumulated stillness
    pub fn reset(&mut self) {
        self.detector.reset();
    }

    /// Take one sample
    ///
    /// Returns immediately with the event when the sample completes a settle
    /// episode; otherwise sleeps until the next sample is due.
    pub async fn poll<G, D, C>(&mut self, gyro: &mut G, delay: &mut D, clock: &C) -> Option<Settled>
    where
        G: Gyroscope,
        D: DelayNs,
        C: Clock,
    {
        let sample = gyro.read_angular_rates().await;
        let now = clock.now_ms();
        let failed = sample.is_err();

        if let Err(e) = sample {
            warn!("Gyroscope read failed: {:?}", e);
        }
        self.log_status(&sample, now);

        if let Some(settled) = self.detector.observe(sample, now) {
            info!("Settled after {} ms still", settled.still_for_ms);
            return Some(settled);
        }

        let wait = if failed {
            self.error_backoff_ms
        } else {
            self.sample_interval_ms
        };
        delay.delay_ms(wait).await;
        None
    }

    /// Poll until a settle episode completes or a stop is requested
    pub async fn wait_for_settle<G, D, C, X>(
        &mut self,
        gyro: &mut G,
        delay: &mut D,
        clock: &C,
        stop: &X,
    ) -> Option<Settled>
    where
        G: Gyroscope,
        D: DelayNs,
        C: Clock,
        X: StopSignal,
    {
        while !stop.stop_requested() {
            if let Some(settled) = self.poll(gyro, delay, clock).await {
                return Some(settled);
            }
        }
        None
    }

    /// Run `callback` once per settle episode until a stop is requested
    pub async fn on_settled<G, D, C, X, F>(
        &mut self,
        gyro: &mut G,
        delay: &mut D,
        clock: &C,
        stop: &X,
        mut callback: F,
    ) where
        G: Gyroscope,
        D: DelayNs,
        C: Clock,
        X: StopSignal,
        F: FnMut(Settled),
    {
        while let Some(settled) = self.wait_for_settle(gyro, delay, clock, stop).await {
            callback(settled);
        }
    }

    fn log_status(&mut self, sample: &Result<AngularRates, SensorError>, now: u64) {
        let due = match self.last_status_ms {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.status_interval_ms,
        };
        if !due {
            return;
        }
        self.last_status_ms = Some(now);

        if let Ok(rates) = sample {
            debug!(
                "Gyro x={} y={} z={} still {} ms",
                rates.x,
                rates.y,
                rates.z,
                self.detector.still_for(now)
            );
        }
    }
}
