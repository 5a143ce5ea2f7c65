//! Configuration type definitions

use crate::acquisition::MAX_WINDOW_SAMPLES;
use crate::calibration::MAX_TARE_SAMPLES;
use crate::traits::{PeerEndpoint, ServiceUuid};

/// How a gyroscope sample is judged still
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StabilityPolicy {
    /// Every axis strictly below its own threshold (deg/s)
    PerAxis { x: f32, y: f32, z: f32 },
    /// Vector magnitude strictly below a single threshold (deg/s)
    Magnitude { threshold: f32 },
}

/// Stability detector settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StabilityConfig {
    pub policy: StabilityPolicy,
    /// Continuous stillness needed before firing
    pub required_duration_ms: u32,
    /// Gyroscope polling cadence
    pub sample_interval_ms: u32,
    /// Wait after a gyroscope read error
    pub error_backoff_ms: u32,
    /// Status log cadence
    pub status_interval_ms: u32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            policy: StabilityPolicy::PerAxis {
                x: 4.0,
                y: 4.0,
                z: 4.0,
            },
            required_duration_ms: 3000,
            sample_interval_ms: 100,
            error_backoff_ms: 200,
            status_interval_ms: 1000,
        }
    }
}

/// Weight acquisition settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcquisitionConfig {
    /// Sampling window length
    pub window_ms: u32,
    /// Delay between raw samples
    pub sample_interval_ms: u32,
    /// Converted readings with a larger magnitude are discarded
    pub sanity_bound: f64,
    /// Pause after each triggered measurement before monitoring resumes
    pub post_trigger_pause_ms: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            window_ms: 3000,
            sample_interval_ms: 100,
            sanity_bound: 100_000.0,
            post_trigger_pause_ms: 500,
        }
    }
}

/// Tare and first-boot calibration settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TareConfig {
    /// Raw readings collected for the offset median
    pub samples: u16,
    /// Delay between tare readings
    pub sample_interval_ms: u32,
    /// Settle time between power-down and power-up
    pub power_cycle_ms: u32,
    /// Reference unit used when no calibration is stored
    pub default_reference_unit: f64,
    /// Measure a baseline weight after a fresh tare
    pub capture_baseline: bool,
    /// Time given to place the baseline item
    pub baseline_capture_delay_ms: u32,
}

impl Default for TareConfig {
    fn default() -> Self {
        Self {
            samples: 20,
            sample_interval_ms: 100,
            power_cycle_ms: 500,
            default_reference_unit: 425.37,
            capture_baseline: true,
            baseline_capture_delay_ms: 5000,
        }
    }
}

/// Which side opens the peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkMode {
    /// Wait for the peer to connect to the advertised service
    Inbound,
    /// Look the peer up and connect to it
    Outbound,
}

/// Delivery channel settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeliveryConfig {
    pub mode: LinkMode,
    pub service: ServiceUuid,
    /// Used when discovery finds no peer (outbound only)
    pub fallback: Option<PeerEndpoint>,
    /// Bound on waiting for `True` / `False`
    pub ack_timeout_ms: u32,
    /// Bound on waiting for an inbound connection
    pub accept_timeout_ms: u32,
    /// Exchange `Sync` / `Sync Confirmed` after connecting
    pub handshake: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: LinkMode::Inbound,
            service: ServiceUuid::WEIGHT_REPORT,
            fallback: None,
            ack_timeout_ms: 5000,
            accept_timeout_ms: 60_000,
            handshake: true,
        }
    }
}

/// Complete device configuration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceConfig {
    pub stability: StabilityConfig,
    pub acquisition: AcquisitionConfig,
    pub tare: TareConfig,
    pub delivery: DeliveryConfig,
}

/// Configuration validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A stability threshold is not a positive finite number
    InvalidThreshold,
    /// A polling or sampling interval is zero
    ZeroInterval,
    /// Sanity bound is not a positive finite number
    InvalidSanityBound,
    /// Tare needs at least one sample
    ZeroTareSamples,
    /// More tare samples than can be held
    TooManyTareSamples,
    /// Window at this interval can yield more samples than can be held
    WindowTooLong,
    /// Reference unit is zero or not finite
    InvalidReferenceUnit,
    /// Acknowledgement timeout is zero
    ZeroAckTimeout,
}

fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

impl DeviceConfig {
    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.stability.policy {
            StabilityPolicy::PerAxis { x, y, z } => {
                if !(positive(x) && positive(y) && positive(z)) {
                    return Err(ConfigError::InvalidThreshold);
                }
            }
            StabilityPolicy::Magnitude { threshold } => {
                if !positive(threshold) {
                    return Err(ConfigError::InvalidThreshold);
                }
            }
        }

        if self.stability.sample_interval_ms == 0
            || self.acquisition.sample_interval_ms == 0
            || self.tare.sample_interval_ms == 0
        {
            return Err(ConfigError::ZeroInterval);
        }

        let bound = self.acquisition.sanity_bound;
        if !(bound.is_finite() && bound > 0.0) {
            return Err(ConfigError::InvalidSanityBound);
        }

        let window_samples = self
            .acquisition
            .window_ms
            .div_ceil(self.acquisition.sample_interval_ms);
        if window_samples as usize > MAX_WINDOW_SAMPLES {
            return Err(ConfigError::WindowTooLong);
        }

        if self.tare.samples == 0 {
            return Err(ConfigError::ZeroTareSamples);
        }
        if self.tare.samples as usize > MAX_TARE_SAMPLES {
            return Err(ConfigError::TooManyTareSamples);
        }

        let unit = self.tare.default_reference_unit;
        if !unit.is_finite() || unit == 0.0 {
            return Err(ConfigError::InvalidReferenceUnit);
        }

        if self.delivery.ack_timeout_ms == 0 {
            return Err(ConfigError::ZeroAckTimeout);
        }

        Ok(())
    }
}
