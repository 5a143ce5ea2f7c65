//! Board-agnostic core logic for the stability-gated scale
//!
//! Everything here is generic over the sensor, link, storage and timing
//! traits so it runs unchanged on the RP2040 firmware and in host tests:
//!
//! - Hardware abstraction traits (gyroscope, load cell, peer link, clock)
//! - Calibration record, persistence and tare
//! - Stability detection (pure state machine plus async poller)
//! - Windowed, median-filtered weight acquisition
//! - Acknowledged delivery over a byte stream
//! - Orchestrator state machine and run loop
//!
//! ```text
//! gyro ─▶ StabilityMonitor ─(Settled)─▶ WeightAcquirer ─(weight)─▶ DeliveryChannel ─▶ peer
//!                                             ▲
//!                                     CalibrationRecord
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;

pub mod acquisition;
pub mod bridge;
pub mod calibration;
pub mod config;
pub mod delivery;
pub mod filter;
pub mod orchestrator;
pub mod stability;
pub mod state;
pub mod traits;

#[cfg(test)]
mod testing;
