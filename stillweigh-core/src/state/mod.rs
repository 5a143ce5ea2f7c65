//! Orchestrator state machine
//!
//! Explicit, finite and deterministic: the run loop only ever changes
//! state through [`OrchestratorState::transition`].

pub mod events;
pub mod machine;

pub use events::Event;
pub use machine::OrchestratorState;
