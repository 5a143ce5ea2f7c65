//! Hardware bundle and one-time initialization

use stillweigh_hal::FlashStorage;

use crate::acquisition::WeightAcquirer;
use crate::calibration::{CalibrationRecord, CalibrationStore};
use crate::delivery::DeliveryChannel;
use crate::traits::{PeerLink, SensorError};

/// Unconfigured hardware handed to [`Orchestrator::initialize`](super::Orchestrator::initialize)
pub struct Peripherals<G, L, P, S> {
    pub gyroscope: G,
    pub load_cell: L,
    pub link: P,
    pub storage: S,
}

/// Everything the run loop owns after a successful initialization
pub struct Context<G, L, P: PeerLink, S> {
    pub gyroscope: G,
    pub load_cell: L,
    pub link: P,
    pub store: CalibrationStore<S>,
    pub acquirer: WeightAcquirer,
    /// `None` until a peer is connected; re-established on demand
    pub channel: Option<DeliveryChannel<P::Transport>>,
}

impl<G, L, P: PeerLink, S: FlashStorage> Context<G, L, P, S> {
    /// Calibration currently bound to the acquirer
    pub fn record(&self) -> &CalibrationRecord {
        self.acquirer.record()
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }
}

/// Fatal initialization failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardwareInitFailure {
    /// Gyroscope did not come up
    Gyroscope(SensorError),
    /// Load cell did not come up
    LoadCell(SensorError),
    /// No stored calibration and the tare produced no valid readings
    Calibration,
}
