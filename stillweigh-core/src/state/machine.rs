//! State machine definition

use super::events::Event;

/// Orchestrator states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OrchestratorState {
    /// Loading calibration, initializing sensors, opening the channel
    Init,
    /// Polling the gyroscope
    Monitoring,
    /// Sampling the load cell
    Acquiring,
    /// Sending a message and waiting for the acknowledgement
    Delivering,
    /// Releasing hardware
    ShuttingDown,
    /// Done; no further transitions
    Terminated,
}

impl OrchestratorState {
    /// Whether the run loop should keep going
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            OrchestratorState::Monitoring
                | OrchestratorState::Acquiring
                | OrchestratorState::Delivering
        )
    }

    /// Process an event and return the next state
    ///
    /// Events that do not apply to the current state leave it unchanged.
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use OrchestratorState::*;

        match (self, event) {
            (Terminated, _) => Terminated,

            // Init transitions
            (Init, Initialized) => Monitoring,
            (Init, InitFailed) => ShuttingDown,

            // Monitoring transitions
            (Monitoring, Settled) => Acquiring,
            (Monitoring, DeliveryRequested) => Delivering,

            // Acquiring transitions
            (Acquiring, AcquisitionSucceeded) => Delivering,
            (Acquiring, AcquisitionFailed) => Monitoring,

            // Delivering transitions
            (Delivering, DeliveryFinished) => Monitoring,

            // Shutdown from anywhere
            (ShuttingDown, ShutdownComplete) => Terminated,
            (_, StopRequested) => ShuttingDown,

            // Default: stay in current state
            (state, _) => state,
        }
    }
}
