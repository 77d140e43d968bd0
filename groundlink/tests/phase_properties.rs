//! Property tests for the flight-phase state machine.
//!
//! Every property is checked for every phase: self-transitions are no-ops,
//! only the single successor is accepted, the turnaround loop closes and
//! persisted state restores exactly.
//!
//! Run with: `cargo test --test phase_properties`

use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;

use groundlink::log::NoOpLogger;
use groundlink::phase::{FlightPhase, PhaseEvent, PhaseStateMachine};

// ============================================================================
// Helper Functions
// ============================================================================

fn any_phase() -> impl Strategy<Value = FlightPhase> {
    prop::sample::select(FlightPhase::ALL.to_vec())
}

/// A machine walked from Preflight along the cycle until it sits in `phase`.
fn machine_in(phase: FlightPhase) -> PhaseStateMachine {
    let machine = PhaseStateMachine::new(Arc::new(NoOpLogger));
    while machine.current_phase() != phase {
        let next = machine.current_phase().next();
        assert!(machine.try_transition(next, Some("walk")));
    }
    machine
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn test_self_transition_is_a_no_op(phase in any_phase()) {
        let machine = machine_in(phase);
        let before = machine.transition_history().len();
        let events = Arc::new(Mutex::new(0usize));
        let e = Arc::clone(&events);
        machine.subscribe(move |_| *e.lock() += 1);

        prop_assert!(machine.try_transition(phase, None));
        prop_assert_eq!(machine.current_phase(), phase);
        prop_assert_eq!(machine.transition_history().len(), before);
        prop_assert_eq!(*events.lock(), 0);
    }

    #[test]
    fn test_only_the_successor_is_accepted(phase in any_phase(), target in any_phase()) {
        let machine = machine_in(phase);
        let accepted = machine.try_transition(target, None);

        if target == phase || target == phase.next() {
            prop_assert!(accepted);
            prop_assert_eq!(machine.current_phase(), target);
        } else {
            prop_assert!(!accepted);
            prop_assert_eq!(machine.current_phase(), phase);
        }
    }

    #[test]
    fn test_validity_matches_successor(phase in any_phase(), target in any_phase()) {
        let machine = machine_in(phase);
        prop_assert_eq!(
            machine.is_valid_transition(target),
            target == phase || target == phase.next()
        );
    }

    #[test]
    fn test_seven_transitions_close_the_loop(phase in any_phase()) {
        let machine = machine_in(phase);
        for _ in 0..7 {
            let next = machine.current_phase().next();
            prop_assert!(machine.try_transition(next, None));
        }
        // Preflight is left once and never re-entered; the loop closes on
        // Departure.
        let expected = if phase == FlightPhase::Preflight {
            FlightPhase::Departure
        } else {
            phase.next()
        };
        prop_assert_eq!(machine.current_phase(), expected);
    }

    #[test]
    fn test_save_load_round_trip(phase in any_phase()) {
        let machine = machine_in(phase);
        let mut bytes = Vec::new();
        machine.save(&mut bytes).unwrap();

        let restored = PhaseStateMachine::new(Arc::new(NoOpLogger));
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = Arc::clone(&events);
        restored.subscribe(move |event: &PhaseEvent| e.lock().push(event.clone()));

        prop_assert_eq!(restored.load(bytes.as_slice()).unwrap(), phase);
        prop_assert_eq!(restored.current_phase(), phase);
        prop_assert_eq!(restored.entered_at(), machine.entered_at());

        let original = machine.transition_history();
        let loaded = restored.transition_history();
        prop_assert_eq!(loaded.len(), original.len());
        for (a, b) in original.iter().zip(loaded.iter()) {
            prop_assert_eq!((a.from, a.to, &a.reason), (b.from, b.to, &b.reason));
            prop_assert_eq!(a.timestamp, b.timestamp);
        }

        prop_assert_eq!(events.lock().clone(), vec![PhaseEvent::Restored { phase }]);
    }
}
