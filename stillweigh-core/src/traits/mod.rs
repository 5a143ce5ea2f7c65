//! Hardware abstraction traits
//!
//! The narrow interfaces the pipeline consumes. Concrete drivers live in
//! `stillweigh-drivers`; host tests use scripted fakes.

pub mod gyroscope;
pub mod link;
pub mod load_cell;
pub mod time;

pub use gyroscope::{AngularRates, Gyroscope};
pub use link::{BdAddr, LinkError, PeerEndpoint, PeerLink, ServiceUuid};
pub use load_cell::LoadCell;
pub use time::{Clock, StopSignal};

/// Errors reported by sensor drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// Bus transaction failed
    Bus,
    /// Device did not signal data ready in time
    Timeout,
    /// Device identity check failed
    NotPresent,
    /// Reading was out of the device's representable range
    Saturated,
    /// GPIO operation failed
    Pin,
}
