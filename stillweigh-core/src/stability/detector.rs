//! Debounced stillness detector

#[allow(unused_imports)]
use micromath::F32Ext;

use crate::config::{StabilityConfig, StabilityPolicy};
use crate::traits::{AngularRates, SensorError};

/// Detector phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StabilityPhase {
    /// Moving, or no stable sample yet
    Unstable,
    /// Continuously still since `since_ms`
    Accumulating { since_ms: u64 },
}

/// One settle episode completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settled {
    /// Time of the sample that completed the episode
    pub at_ms: u64,
    /// Length of the still period
    pub still_for_ms: u64,
}

/// Edge-triggered stillness detector
///
/// Fires exactly once per episode, then starts over from `Unstable`, so a
/// second event needs a full fresh `required_ms` of stillness. Any moving
/// sample or read error while accumulating drops straight back to
/// `Unstable`.
#[derive(Debug, Clone)]
pub struct StabilityDetector {
    policy: StabilityPolicy,
    required_ms: u64,
    phase: StabilityPhase,
}

impl StabilityDetector {
    pub fn new(policy: StabilityPolicy, required_ms: u64) -> Self {
        Self {
            policy,
            required_ms,
            phase: StabilityPhase::Unstable,
        }
    }

    pub fn from_config(config: &StabilityConfig) -> Self {
        Self::new(config.policy, config.required_duration_ms as u64)
    }

    pub fn phase(&self) -> StabilityPhase {
        self.phase
    }

    /// Start of the current still period, if any
    pub fn stable_since(&self) -> Option<u64> {
        match self.phase {
            StabilityPhase::Unstable => None,
            StabilityPhase::Accumulating { since_ms } => Some(since_ms),
        }
    }

    /// How long the platform has been still as of `now_ms`
    pub fn still_for(&self, now_ms: u64) -> u64 {
        self.stable_since()
            .map(|since| now_ms.saturating_sub(since))
            .unwrap_or(0)
    }

    /// Drop any accumulated stillness
    pub fn reset(&mut self) {
        self.phase = StabilityPhase::Unstable;
    }

    /// Whether a single sample is within thresholds (strict comparison)
    pub fn is_stable(&self, rates: &AngularRates) -> bool {
        match self.policy {
            StabilityPolicy::PerAxis { x, y, z } => {
                rates.x.abs() < x && rates.y.abs() < y && rates.z.abs() < z
            }
            StabilityPolicy::Magnitude { threshold } => {
                let magnitude =
                    (rates.x * rates.x + rates.y * rates.y + rates.z * rates.z).sqrt();
                magnitude < threshold
            }
        }
    }

    /// Feed one gyroscope result taken at `now_ms`
    pub fn observe(
        &mut self,
        sample: Result<AngularRates, SensorError>,
        now_ms: u64,
    ) -> Option<Settled> {
        let still = match sample {
            Ok(rates) => self.is_stable(&rates),
            Err(_) => false,
        };

        if !still {
            self.phase = StabilityPhase::Unstable;
            return None;
        }

        let since_ms = match self.phase {
            StabilityPhase::Unstable => {
                self.phase = StabilityPhase::Accumulating { since_ms: now_ms };
                now_ms
            }
            StabilityPhase::Accumulating { since_ms } => since_ms,
        };

        let still_for_ms = now_ms.saturating_sub(since_ms);
        if still_for_ms >= self.required_ms {
            self.phase = StabilityPhase::Unstable;
            Some(Settled {
                at_ms: now_ms,
                still_for_ms,
            })
        } else {
            None
        }
    }
}
