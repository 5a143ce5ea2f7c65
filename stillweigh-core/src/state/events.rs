//! Events that drive the orchestrator state machine

/// Orchestrator events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Sensors, calibration and channel set up
    Initialized,
    /// Hardware initialization failed
    InitFailed,
    /// Stability detector fired
    Settled,
    /// Bridge asked for a delivery
    DeliveryRequested,
    /// Acquisition produced a weight
    AcquisitionSucceeded,
    /// Acquisition had no valid samples
    AcquisitionFailed,
    /// Delivery attempt finished, whatever the result
    DeliveryFinished,
    /// External interrupt
    StopRequested,
    /// Resources released
    ShutdownComplete,
}
