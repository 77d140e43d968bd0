//! Per-domain service coordinators.
//!
//! Each coordinator owns one ground-handling domain (passengers, doors,
//! ground equipment, fuel, cargo), reacts to phase changes through
//! [`ServiceCoordinator::manage_for_phase`], and performs idempotent
//! start/stop/update operations against its facade.
//!
//! # Contract
//!
//! - Domain operations return `bool`. Starting something already running, or
//!   starting one side of a mutually exclusive pair while the other runs, logs
//!   a warning and returns `false` without touching state.
//! - Facade writes that fail are logged and turn the operation into `false`.
//!   Facade reads propagate [`DataAccessError`]; the caller cannot proceed
//!   without the value.
//! - A [`DomainStateChanged`] event follows every mutating call, whether or not
//!   anything changed, so subscribers can treat it as a tick.
//! - The orchestrator reference is attached after construction. Until it is,
//!   forwarding planned values logs a warning and is skipped.

mod base;
mod cargo;
mod door;
mod equipment;
mod error;
pub mod fuel;
mod passenger;

pub use cargo::{CargoCoordinator, CargoState};
pub use door::{DoorCoordinator, DoorType};
pub use equipment::{EquipmentCoordinator, GroundEquipment};
pub use error::CoordinatorError;
pub use fuel::{FuelCoordinator, FuelState, FuelUnits, RefuelingSubState};
pub use passenger::{PassengerCoordinator, PassengerState};

use std::sync::{Arc, Weak};

use tokio_util::sync::CancellationToken;

use crate::events::{EventCallback, Subscription};
use crate::facade::DataAccessError;
use crate::phase::{FlightPhase, PhaseEvent, PhaseStateMachine};
use crate::worker::run_cancellable;

/// Ground-handling domain owned by one coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceDomain {
    Passenger,
    Door,
    Equipment,
    Fuel,
    Cargo,
}

impl std::fmt::Display for ServiceDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServiceDomain::Passenger => "passenger",
            ServiceDomain::Door => "door",
            ServiceDomain::Equipment => "equipment",
            ServiceDomain::Fuel => "fuel",
            ServiceDomain::Cargo => "cargo",
        };
        f.write_str(name)
    }
}

/// Domain-specific part of a [`DomainStateChanged`] event.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainDetail {
    Passenger {
        boarding_active: bool,
        deboarding_active: bool,
    },
    Door {
        open: Vec<DoorType>,
    },
    Equipment {
        connected: Vec<GroundEquipment>,
    },
    Fuel {
        units: FuelUnits,
        sub_state: RefuelingSubState,
    },
    Cargo {
        loading_active: bool,
        unloading_active: bool,
    },
}

/// Raised after every mutating coordinator call.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainStateChanged {
    pub domain: ServiceDomain,
    /// Name of the operation that just ran, e.g. `"start_boarding"`.
    pub operation: &'static str,
    pub current: f64,
    pub planned: f64,
    pub detail: DomainDetail,
}

/// Back-reference from a coordinator to the orchestrator.
pub trait OrchestratorLink: Send + Sync {
    /// Record the planned value a coordinator pulled from its facade.
    fn update_planned(&self, domain: ServiceDomain, value: f64);
}

/// Shared contract of the per-domain coordinators.
///
/// Test doubles implement this trait directly.
pub trait ServiceCoordinator: Send + Sync {
    fn domain(&self) -> ServiceDomain;

    /// Apply this domain's behaviour for `phase`. Failures are logged.
    fn manage_for_phase(&self, phase: FlightPhase);

    /// Pull current and planned values from the facade, then forward the
    /// planned value to the orchestrator if one is attached.
    fn synchronize(&self) -> Result<(), DataAccessError>;

    /// Record a planned value from an external plan. With `force_sync` the
    /// current value is overwritten and written through immediately.
    fn update_from_external_plan(&self, value: f64, force_sync: bool) -> bool;

    /// Late-bind the orchestrator reference.
    fn attach_orchestrator(&self, link: Weak<dyn OrchestratorLink>);

    fn subscribe(&self, callback: EventCallback<DomainStateChanged>) -> Subscription;

    fn unsubscribe(&self, token: Subscription) -> bool;
}

/// Drive `coordinator` from the machine's phase changes and restores.
///
/// The returned token unsubscribes it again.
pub fn bind_to_phase_machine(
    coordinator: Arc<dyn ServiceCoordinator>,
    machine: &PhaseStateMachine,
) -> Subscription {
    machine.subscribe(move |event: &PhaseEvent| match event {
        PhaseEvent::Changed { current, .. } => coordinator.manage_for_phase(*current),
        PhaseEvent::Restored { phase } => coordinator.manage_for_phase(*phase),
        _ => {}
    })
}

/// [`ServiceCoordinator::synchronize`] on the blocking pool.
pub async fn synchronize_async(
    coordinator: Arc<dyn ServiceCoordinator>,
    cancellation: &CancellationToken,
) -> Result<(), CoordinatorError> {
    run_cancellable(cancellation, move || coordinator.synchronize()).await??;
    Ok(())
}

/// [`ServiceCoordinator::manage_for_phase`] on the blocking pool.
pub async fn manage_for_phase_async(
    coordinator: Arc<dyn ServiceCoordinator>,
    phase: FlightPhase,
    cancellation: &CancellationToken,
) -> Result<(), CoordinatorError> {
    run_cancellable(cancellation, move || coordinator.manage_for_phase(phase)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::InMemoryFacade;
    use crate::log::NoOpLogger;

    fn passengers() -> (Arc<InMemoryFacade>, Arc<PassengerCoordinator>) {
        let facade = Arc::new(InMemoryFacade::new());
        facade.set("passengers.planned", 150.0);
        facade.set("passengers.current", 0.0);
        let coordinator = Arc::new(PassengerCoordinator::new(
            facade.clone(),
            Arc::new(NoOpLogger),
        ));
        (facade, coordinator)
    }

    #[test]
    fn test_bound_coordinator_follows_phase_changes() {
        let (facade, coordinator) = passengers();
        let machine = PhaseStateMachine::new(Arc::new(NoOpLogger));
        bind_to_phase_machine(coordinator.clone(), &machine);

        machine.try_transition(FlightPhase::Departure, None);

        assert!(coordinator.state().boarding_active);
        assert_eq!(facade.flag("passengers.boarding"), Some(true));
    }

    #[test]
    fn test_unbound_coordinator_stops_reacting() {
        let (_facade, coordinator) = passengers();
        let machine = PhaseStateMachine::new(Arc::new(NoOpLogger));
        let token = bind_to_phase_machine(coordinator.clone(), &machine);

        assert!(machine.unsubscribe(token));
        machine.try_transition(FlightPhase::Departure, None);

        assert!(!coordinator.state().boarding_active);
    }

    #[tokio::test]
    async fn test_synchronize_async_propagates_read_failure() {
        let (facade, coordinator) = passengers();
        facade.fail_reads_of("passengers.planned");

        let result = synchronize_async(coordinator, &CancellationToken::new()).await;

        assert!(matches!(result, Err(CoordinatorError::DataAccess(_))));
    }

    #[tokio::test]
    async fn test_cancelled_async_call_leaves_state_untouched() {
        let (facade, coordinator) = passengers();
        let token = CancellationToken::new();
        token.cancel();

        let result =
            manage_for_phase_async(coordinator.clone(), FlightPhase::Departure, &token).await;

        assert!(matches!(result, Err(CoordinatorError::Cancelled)));
        assert!(!coordinator.state().boarding_active);
        assert_eq!(facade.write_count(), 0);
    }
}
