//! Core phase types.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PhaseError;

/// Operational phase of the aircraft across one turnaround cycle.
///
/// The phases form a single directed cycle:
///
/// ```text
/// Preflight -> Departure -> TaxiOut -> Flight -> TaxiIn -> Arrival -> Turnaround
///                  ^                                                      |
///                  +------------------------------------------------------+
/// ```
///
/// Serialized by symbolic name, never by ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum FlightPhase {
    /// Cold and dark through flight-plan loading.
    #[default]
    Preflight,
    /// At the gate: boarding, loading, refueling.
    Departure,
    /// Pushed back and taxiing to the runway.
    TaxiOut,
    /// Airborne.
    Flight,
    /// Landed and taxiing to the gate.
    TaxiIn,
    /// Parked at the gate: deboarding, unloading.
    Arrival,
    /// Between legs, preparing the next departure.
    Turnaround,
}

impl FlightPhase {
    /// Every phase in cycle order.
    pub const ALL: [FlightPhase; 7] = [
        FlightPhase::Preflight,
        FlightPhase::Departure,
        FlightPhase::TaxiOut,
        FlightPhase::Flight,
        FlightPhase::TaxiIn,
        FlightPhase::Arrival,
        FlightPhase::Turnaround,
    ];

    /// The single legal successor of this phase.
    pub fn next(&self) -> FlightPhase {
        match self {
            FlightPhase::Preflight => FlightPhase::Departure,
            FlightPhase::Departure => FlightPhase::TaxiOut,
            FlightPhase::TaxiOut => FlightPhase::Flight,
            FlightPhase::Flight => FlightPhase::TaxiIn,
            FlightPhase::TaxiIn => FlightPhase::Arrival,
            FlightPhase::Arrival => FlightPhase::Turnaround,
            FlightPhase::Turnaround => FlightPhase::Departure,
        }
    }

    /// Symbolic name, identical to the serialized form.
    pub fn name(&self) -> &'static str {
        match self {
            FlightPhase::Preflight => "Preflight",
            FlightPhase::Departure => "Departure",
            FlightPhase::TaxiOut => "TaxiOut",
            FlightPhase::Flight => "Flight",
            FlightPhase::TaxiIn => "TaxiIn",
            FlightPhase::Arrival => "Arrival",
            FlightPhase::Turnaround => "Turnaround",
        }
    }
}

impl std::fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FlightPhase {
    type Err = PhaseError;

    /// Parse a symbolic name, ignoring case and `_`/`-` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        FlightPhase::ALL
            .into_iter()
            .find(|p| p.name().to_lowercase() == normalized)
            .ok_or_else(|| PhaseError::UnknownPhase(s.to_string()))
    }
}

impl TryFrom<u8> for FlightPhase {
    type Error = PhaseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        FlightPhase::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| PhaseError::UnknownPhase(value.to_string()))
    }
}

/// Read-only bag of live aircraft parameters.
///
/// Supplied per call; the phase machine keeps no copy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AircraftParameterSnapshot {
    pub on_ground: bool,
    pub engines_running: bool,
    pub parking_brake_set: bool,
    pub beacon_on: bool,
    /// Knots.
    pub ground_speed: f64,
    /// Feet.
    pub altitude: f64,
    pub ground_equipment_connected: bool,
    pub flight_plan_loaded: bool,
}

impl AircraftParameterSnapshot {
    /// Parked at the gate, cold, with ground equipment attached.
    pub fn parked() -> Self {
        Self {
            on_ground: true,
            parking_brake_set: true,
            ground_equipment_connected: true,
            ..Self::default()
        }
    }
}

/// Immutable record of one accepted transition.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseTransitionRecord {
    pub from: FlightPhase,
    pub to: FlightPhase,
    pub timestamp: DateTime<Utc>,
    pub duration_in_previous_phase: Duration,
    pub reason: Option<String>,
}

/// Predicted next phase with a confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhasePrediction {
    pub phase: FlightPhase,
    pub confidence: f64,
}

impl PhasePrediction {
    pub fn new(phase: FlightPhase, confidence: f64) -> Self {
        Self {
            phase,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Notifications published by the phase state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseEvent {
    /// An accepted transition, delivered after every hook has run.
    Changed {
        previous: FlightPhase,
        current: FlightPhase,
        reason: Option<String>,
    },
    /// The published prediction moved materially.
    PredictionChanged {
        previous: Option<FlightPhase>,
        predicted: FlightPhase,
        confidence: f64,
    },
    /// A phase timeout elapsed while still in the registering phase.
    Timeout {
        phase: FlightPhase,
        entered_at: DateTime<Utc>,
        duration: Duration,
        expiry: DateTime<Utc>,
    },
    /// State was restored without living through a transition.
    Restored { phase: FlightPhase },
}

/// Result of a guarded transition attempt.
///
/// Rejections are ordinary control flow, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition happened.
    Accepted { reason: String },
    /// Target equals the current phase; nothing happened.
    NoChange { reason: String },
    /// Target is not the current phase's successor.
    InvalidTransition { reason: String },
    /// The move is legal but a parameter check failed.
    PreconditionNotMet { reason: String },
}

impl TransitionOutcome {
    /// True for `Accepted` and `NoChange`.
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            TransitionOutcome::Accepted { .. } | TransitionOutcome::NoChange { .. }
        )
    }

    pub fn reason(&self) -> &str {
        match self {
            TransitionOutcome::Accepted { reason }
            | TransitionOutcome::NoChange { reason }
            | TransitionOutcome::InvalidTransition { reason }
            | TransitionOutcome::PreconditionNotMet { reason } => reason,
        }
    }
}
