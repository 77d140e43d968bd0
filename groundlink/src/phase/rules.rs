//! Fixed decision tables for phase prediction and guarded transitions.
//!
//! # Prediction
//!
//! | Current    | Rule                                                  | Result                        |
//! |------------|-------------------------------------------------------|-------------------------------|
//! | Preflight  | flight plan loaded                                    | (Departure 0.9) / (Preflight 1.0) |
//! | Departure  | equipment off AND beacon on AND brake released        | (TaxiOut 0.85) / (Departure 0.95) |
//! | TaxiOut    | airborne / engines running AND GS > 5kt / otherwise   | (Flight 0.9) / (TaxiOut 0.95) / (TaxiOut 0.8) |
//! | Flight     | on ground AND GS < 100kt                              | (TaxiIn 0.9) / (Flight 0.95)  |
//! | TaxiIn     | on ground AND GS < 1kt AND brake set AND engines off  | (Arrival 0.9) / (TaxiIn 0.85) |
//! | Arrival    | always                                                | (Arrival 0.95)                |
//! | Turnaround | flight plan loaded                                    | (Departure 0.85) / (Turnaround 0.9) |
//!
//! Arrival never predicts Turnaround: that move is driven by deboarding
//! completion, not by aircraft parameters.
//!
//! These functions are pure so that service prediction can reuse them without
//! touching the state machine.

use super::types::{AircraftParameterSnapshot, FlightPhase, PhasePrediction};

/// A confidence move larger than this republishes an unchanged prediction.
pub const PREDICTION_CONFIDENCE_THRESHOLD: f64 = 0.1;

/// Absorbs binary rounding in confidence deltas (0.9 - 0.8 is not exactly 0.1).
const CONFIDENCE_EPSILON: f64 = 1e-9;

/// Apply the prediction table for `current`.
pub fn evaluate_prediction(
    current: FlightPhase,
    snapshot: &AircraftParameterSnapshot,
) -> PhasePrediction {
    let s = snapshot;
    let (phase, confidence) = match current {
        FlightPhase::Preflight => {
            if s.flight_plan_loaded {
                (FlightPhase::Departure, 0.9)
            } else {
                (FlightPhase::Preflight, 1.0)
            }
        }
        FlightPhase::Departure => {
            if !s.ground_equipment_connected && s.beacon_on && !s.parking_brake_set {
                (FlightPhase::TaxiOut, 0.85)
            } else {
                (FlightPhase::Departure, 0.95)
            }
        }
        FlightPhase::TaxiOut => {
            if !s.on_ground {
                (FlightPhase::Flight, 0.9)
            } else if s.engines_running && s.ground_speed > 5.0 {
                (FlightPhase::TaxiOut, 0.95)
            } else {
                (FlightPhase::TaxiOut, 0.8)
            }
        }
        FlightPhase::Flight => {
            if s.on_ground && s.ground_speed < 100.0 {
                (FlightPhase::TaxiIn, 0.9)
            } else {
                (FlightPhase::Flight, 0.95)
            }
        }
        FlightPhase::TaxiIn => {
            if s.on_ground && s.ground_speed < 1.0 && s.parking_brake_set && !s.engines_running {
                (FlightPhase::Arrival, 0.9)
            } else {
                (FlightPhase::TaxiIn, 0.85)
            }
        }
        FlightPhase::Arrival => (FlightPhase::Arrival, 0.95),
        FlightPhase::Turnaround => {
            if s.flight_plan_loaded {
                (FlightPhase::Departure, 0.85)
            } else {
                (FlightPhase::Turnaround, 0.9)
            }
        }
    };
    PhasePrediction::new(phase, confidence)
}

/// Whether `next` differs enough from the last published prediction to be
/// republished. The first prediction is always material.
pub fn is_material_change(previous: Option<&PhasePrediction>, next: &PhasePrediction) -> bool {
    match previous {
        None => true,
        Some(prev) => {
            prev.phase != next.phase
                || (prev.confidence - next.confidence).abs()
                    > PREDICTION_CONFIDENCE_THRESHOLD + CONFIDENCE_EPSILON
        }
    }
}

/// Outcome of a named transition precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreconditionCheck {
    pub passed: bool,
    pub reason: &'static str,
}

impl PreconditionCheck {
    fn pass(reason: &'static str) -> Self {
        Self {
            passed: true,
            reason,
        }
    }

    fn fail(reason: &'static str) -> Self {
        Self {
            passed: false,
            reason,
        }
    }
}

/// Evaluate the precondition guarding `from -> to`.
///
/// Only meaningful for legal successor pairs; any other pair fails with a
/// generic reason.
pub fn check_precondition(
    from: FlightPhase,
    to: FlightPhase,
    snapshot: &AircraftParameterSnapshot,
) -> PreconditionCheck {
    let s = snapshot;
    match (from, to) {
        (FlightPhase::Preflight, FlightPhase::Departure)
        | (FlightPhase::Turnaround, FlightPhase::Departure) => {
            if s.flight_plan_loaded {
                PreconditionCheck::pass("Flight plan loaded")
            } else {
                PreconditionCheck::fail("Flight plan not loaded")
            }
        }
        (FlightPhase::Departure, FlightPhase::TaxiOut) => {
            if s.ground_equipment_connected {
                PreconditionCheck::fail("Ground equipment still connected")
            } else if !s.beacon_on {
                PreconditionCheck::fail("Beacon light off")
            } else if s.parking_brake_set {
                PreconditionCheck::fail("Parking brake still set")
            } else {
                PreconditionCheck::pass("Ready for taxi")
            }
        }
        (FlightPhase::TaxiOut, FlightPhase::Flight) => {
            if s.on_ground {
                PreconditionCheck::fail("Aircraft still on ground")
            } else {
                PreconditionCheck::pass("Aircraft airborne")
            }
        }
        (FlightPhase::Flight, FlightPhase::TaxiIn) => {
            if s.on_ground {
                PreconditionCheck::pass("Aircraft on ground")
            } else {
                PreconditionCheck::fail("Aircraft still airborne")
            }
        }
        (FlightPhase::TaxiIn, FlightPhase::Arrival) => {
            if !s.on_ground {
                PreconditionCheck::fail("Aircraft not on ground")
            } else if !s.parking_brake_set {
                PreconditionCheck::fail("Parking brake not set")
            } else if s.engines_running {
                PreconditionCheck::fail("Engines still running")
            } else {
                PreconditionCheck::pass("Aircraft parked")
            }
        }
        (FlightPhase::Arrival, FlightPhase::Turnaround) => {
            PreconditionCheck::pass("External trigger")
        }
        _ => PreconditionCheck::fail("No precondition defined for this transition"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> AircraftParameterSnapshot {
        AircraftParameterSnapshot::default()
    }

    #[test]
    fn test_preflight_prediction() {
        let mut s = snapshot();
        assert_eq!(
            evaluate_prediction(FlightPhase::Preflight, &s),
            PhasePrediction::new(FlightPhase::Preflight, 1.0)
        );
        s.flight_plan_loaded = true;
        assert_eq!(
            evaluate_prediction(FlightPhase::Preflight, &s),
            PhasePrediction::new(FlightPhase::Departure, 0.9)
        );
    }

    #[test]
    fn test_departure_prediction_requires_all_three() {
        let mut s = snapshot();
        s.beacon_on = true;
        s.ground_equipment_connected = true;
        assert_eq!(
            evaluate_prediction(FlightPhase::Departure, &s).phase,
            FlightPhase::Departure
        );
        s.ground_equipment_connected = false;
        assert_eq!(
            evaluate_prediction(FlightPhase::Departure, &s),
            PhasePrediction::new(FlightPhase::TaxiOut, 0.85)
        );
        s.parking_brake_set = true;
        assert_eq!(
            evaluate_prediction(FlightPhase::Departure, &s),
            PhasePrediction::new(FlightPhase::Departure, 0.95)
        );
    }

    #[test]
    fn test_taxi_out_prediction_branches() {
        let mut s = snapshot();
        s.on_ground = true;
        assert_eq!(
            evaluate_prediction(FlightPhase::TaxiOut, &s),
            PhasePrediction::new(FlightPhase::TaxiOut, 0.8)
        );
        s.engines_running = true;
        s.ground_speed = 12.0;
        assert_eq!(
            evaluate_prediction(FlightPhase::TaxiOut, &s),
            PhasePrediction::new(FlightPhase::TaxiOut, 0.95)
        );
        s.on_ground = false;
        assert_eq!(
            evaluate_prediction(FlightPhase::TaxiOut, &s),
            PhasePrediction::new(FlightPhase::Flight, 0.9)
        );
    }

    #[test]
    fn test_flight_and_taxi_in_predictions() {
        let mut s = snapshot();
        s.ground_speed = 140.0;
        s.on_ground = true;
        assert_eq!(
            evaluate_prediction(FlightPhase::Flight, &s).phase,
            FlightPhase::Flight
        );
        s.ground_speed = 60.0;
        assert_eq!(
            evaluate_prediction(FlightPhase::Flight, &s),
            PhasePrediction::new(FlightPhase::TaxiIn, 0.9)
        );

        s.ground_speed = 0.0;
        s.parking_brake_set = true;
        s.engines_running = true;
        assert_eq!(
            evaluate_prediction(FlightPhase::TaxiIn, &s),
            PhasePrediction::new(FlightPhase::TaxiIn, 0.85)
        );
        s.engines_running = false;
        assert_eq!(
            evaluate_prediction(FlightPhase::TaxiIn, &s),
            PhasePrediction::new(FlightPhase::Arrival, 0.9)
        );
    }

    #[test]
    fn test_arrival_never_predicts_turnaround() {
        let mut s = AircraftParameterSnapshot::parked();
        s.flight_plan_loaded = true;
        assert_eq!(
            evaluate_prediction(FlightPhase::Arrival, &s),
            PhasePrediction::new(FlightPhase::Arrival, 0.95)
        );
    }

    #[test]
    fn test_turnaround_prediction() {
        let mut s = snapshot();
        assert_eq!(
            evaluate_prediction(FlightPhase::Turnaround, &s),
            PhasePrediction::new(FlightPhase::Turnaround, 0.9)
        );
        s.flight_plan_loaded = true;
        assert_eq!(
            evaluate_prediction(FlightPhase::Turnaround, &s),
            PhasePrediction::new(FlightPhase::Departure, 0.85)
        );
    }

    #[test]
    fn test_material_change_threshold() {
        let base = PhasePrediction::new(FlightPhase::TaxiOut, 0.85);
        assert!(is_material_change(None, &base));
        assert!(!is_material_change(
            Some(&base),
            &PhasePrediction::new(FlightPhase::TaxiOut, 0.95)
        ));
        assert!(!is_material_change(
            Some(&PhasePrediction::new(FlightPhase::TaxiOut, 0.8)),
            &PhasePrediction::new(FlightPhase::TaxiOut, 0.9)
        ));
        assert!(is_material_change(
            Some(&PhasePrediction::new(FlightPhase::TaxiOut, 0.8)),
            &PhasePrediction::new(FlightPhase::TaxiOut, 0.95)
        ));
        assert!(is_material_change(
            Some(&base),
            &PhasePrediction::new(FlightPhase::Flight, 0.85)
        ));
    }

    #[test]
    fn test_departure_precondition_reports_first_failure() {
        let mut s = snapshot();
        s.ground_equipment_connected = true;
        let check = check_precondition(FlightPhase::Departure, FlightPhase::TaxiOut, &s);
        assert!(!check.passed);
        assert_eq!(check.reason, "Ground equipment still connected");

        s.ground_equipment_connected = false;
        assert_eq!(
            check_precondition(FlightPhase::Departure, FlightPhase::TaxiOut, &s).reason,
            "Beacon light off"
        );

        s.beacon_on = true;
        let check = check_precondition(FlightPhase::Departure, FlightPhase::TaxiOut, &s);
        assert!(check.passed);
    }

    #[test]
    fn test_taxi_in_to_arrival_precondition() {
        let mut s = AircraftParameterSnapshot::parked();
        s.engines_running = true;
        let check = check_precondition(FlightPhase::TaxiIn, FlightPhase::Arrival, &s);
        assert_eq!(check.reason, "Engines still running");

        s.engines_running = false;
        assert!(check_precondition(FlightPhase::TaxiIn, FlightPhase::Arrival, &s).passed);
    }

    #[test]
    fn test_arrival_to_turnaround_has_no_parameter_check() {
        let check = check_precondition(
            FlightPhase::Arrival,
            FlightPhase::Turnaround,
            &AircraftParameterSnapshot::default(),
        );
        assert!(check.passed);
    }

    #[test]
    fn test_flight_plan_guards_both_departure_entries() {
        let s = snapshot();
        assert!(!check_precondition(FlightPhase::Preflight, FlightPhase::Departure, &s).passed);
        assert!(!check_precondition(FlightPhase::Turnaround, FlightPhase::Departure, &s).passed);
    }
}
