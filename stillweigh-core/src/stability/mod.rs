//! Stability detection
//!
//! [`StabilityDetector`] is a pure, timer-aware state machine fed one
//! gyroscope result at a time. [`StabilityMonitor`] drives it from a
//! gyroscope on a fixed cadence.

pub mod detector;
pub mod monitor;

pub use detector::{Settled, StabilityDetector, StabilityPhase};
pub use monitor::StabilityMonitor;
