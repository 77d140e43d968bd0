//! Flight-phase state machine.
//!
//! Tracks which of the seven turnaround phases the aircraft is in, validates
//! moves along the single phase cycle, predicts the next phase from live
//! parameters, fires phase-bound timeouts and persists its state.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use groundlink::log::NoOpLogger;
//! use groundlink::phase::{AircraftParameterSnapshot, FlightPhase, PhaseStateMachine};
//!
//! let machine = PhaseStateMachine::new(Arc::new(NoOpLogger));
//! let snapshot = AircraftParameterSnapshot {
//!     flight_plan_loaded: true,
//!     ..AircraftParameterSnapshot::parked()
//! };
//!
//! let outcome = machine.try_transition_with_conditions(FlightPhase::Departure, &snapshot, None);
//! assert!(outcome.is_accepted());
//! assert_eq!(machine.current_phase(), FlightPhase::Departure);
//! ```

mod error;
mod hooks;
mod machine;
mod persistence;
pub mod rules;
mod timeout;
mod types;

pub use error::{PersistenceError, PhaseError};
pub use hooks::{HookId, PhaseHook};
pub use machine::{PhaseMachineOptions, PhaseStateMachine, DEFAULT_TIMEOUT_SCAN_INTERVAL};
pub use timeout::{TimeoutCallback, TimeoutHandle};
pub use types::{
    AircraftParameterSnapshot, FlightPhase, PhaseEvent, PhasePrediction, PhaseTransitionRecord,
    TransitionOutcome,
};
