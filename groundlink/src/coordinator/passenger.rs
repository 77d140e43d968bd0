//! Passenger boarding and deboarding.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::base::CoordinatorBase;
use super::{
    DomainDetail, DomainStateChanged, OrchestratorLink, ServiceCoordinator, ServiceDomain,
};
use crate::events::{EventCallback, Subscription};
use crate::facade::{AircraftDataFacade, DataAccessError, TypedRead};
use crate::log::Logger;
use crate::phase::FlightPhase;
use crate::{log_info, log_warn};

pub(crate) const VAR_PLANNED: &str = "passengers.planned";
pub(crate) const VAR_CURRENT: &str = "passengers.current";
pub(crate) const VAR_BOARDING: &str = "passengers.boarding";
pub(crate) const VAR_DEBOARDING: &str = "passengers.deboarding";

/// Passenger domain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassengerState {
    /// Passengers on the load sheet.
    pub planned: u32,
    /// Passengers currently on board.
    pub current: u32,
    pub boarding_active: bool,
    pub deboarding_active: bool,
}

/// Coordinates boarding and deboarding with the aircraft.
///
/// Boarding and deboarding are mutually exclusive.
pub struct PassengerCoordinator {
    base: CoordinatorBase<dyn AircraftDataFacade>,
    state: Mutex<PassengerState>,
}

impl PassengerCoordinator {
    pub fn new(facade: Arc<dyn AircraftDataFacade>, logger: Arc<dyn Logger>) -> Self {
        Self {
            base: CoordinatorBase::new(ServiceDomain::Passenger, "passenger", facade, logger),
            state: Mutex::new(PassengerState::default()),
        }
    }

    pub fn state(&self) -> PassengerState {
        *self.state.lock()
    }

    pub fn start_boarding(&self) -> bool {
        let started = {
            let mut state = self.state.lock();
            if state.boarding_active {
                log_warn!(self.base.logger, "Boarding already active");
                false
            } else if state.deboarding_active {
                log_warn!(
                    self.base.logger,
                    "Cannot start boarding while deboarding is active"
                );
                false
            } else if self.base.write(VAR_BOARDING, true) {
                state.boarding_active = true;
                log_info!(
                    self.base.logger,
                    "Boarding started ({} of {} on board)",
                    state.current,
                    state.planned
                );
                true
            } else {
                false
            }
        };
        self.notify("start_boarding");
        started
    }

    pub fn stop_boarding(&self) -> bool {
        let stopped = {
            let mut state = self.state.lock();
            if !state.boarding_active {
                log_warn!(self.base.logger, "Boarding not active");
                false
            } else if self.base.write(VAR_BOARDING, false) {
                state.boarding_active = false;
                log_info!(self.base.logger, "Boarding stopped with {} on board", state.current);
                true
            } else {
                false
            }
        };
        self.notify("stop_boarding");
        stopped
    }

    pub fn start_deboarding(&self) -> bool {
        let started = {
            let mut state = self.state.lock();
            if state.deboarding_active {
                log_warn!(self.base.logger, "Deboarding already active");
                false
            } else if state.boarding_active {
                log_warn!(
                    self.base.logger,
                    "Cannot start deboarding while boarding is active"
                );
                false
            } else if self.base.write(VAR_DEBOARDING, true) {
                state.deboarding_active = true;
                log_info!(
                    self.base.logger,
                    "Deboarding started ({} on board)",
                    state.current
                );
                true
            } else {
                false
            }
        };
        self.notify("start_deboarding");
        started
    }

    pub fn stop_deboarding(&self) -> bool {
        let stopped = {
            let mut state = self.state.lock();
            if !state.deboarding_active {
                log_warn!(self.base.logger, "Deboarding not active");
                false
            } else if self.base.write(VAR_DEBOARDING, false) {
                state.deboarding_active = false;
                log_info!(self.base.logger, "Deboarding stopped");
                true
            } else {
                false
            }
        };
        self.notify("stop_deboarding");
        stopped
    }

    /// Set the number on board during boarding, clamped to the planned count.
    pub fn update_boarding_progress(&self, on_board: u32) -> bool {
        let updated = {
            let mut state = self.state.lock();
            let count = on_board.min(state.planned);
            if self.base.write(VAR_CURRENT, count) {
                state.current = count;
                if state.boarding_active && count == state.planned {
                    log_info!(self.base.logger, "Boarding complete: {} on board", count);
                }
                true
            } else {
                false
            }
        };
        self.notify("update_boarding_progress");
        updated
    }

    /// Set the number still on board during deboarding.
    pub fn update_deboarding_progress(&self, remaining: u32) -> bool {
        let updated = {
            let mut state = self.state.lock();
            let count = remaining.min(state.current);
            if self.base.write(VAR_CURRENT, count) {
                state.current = count;
                if state.deboarding_active && count == 0 {
                    log_info!(self.base.logger, "Deboarding complete");
                }
                true
            } else {
                false
            }
        };
        self.notify("update_deboarding_progress");
        updated
    }

    pub fn is_boarding_complete(&self) -> bool {
        let state = self.state.lock();
        state.planned > 0 && state.current >= state.planned
    }

    pub fn is_deboarding_complete(&self) -> bool {
        self.state.lock().current == 0
    }

    fn notify(&self, operation: &'static str) {
        let state = self.state();
        self.base.notify(DomainStateChanged {
            domain: ServiceDomain::Passenger,
            operation,
            current: f64::from(state.current),
            planned: f64::from(state.planned),
            detail: DomainDetail::Passenger {
                boarding_active: state.boarding_active,
                deboarding_active: state.deboarding_active,
            },
        });
    }
}

impl ServiceCoordinator for PassengerCoordinator {
    fn domain(&self) -> ServiceDomain {
        ServiceDomain::Passenger
    }

    fn manage_for_phase(&self, phase: FlightPhase) {
        let state = self.state();
        let idle = !state.boarding_active && !state.deboarding_active;
        match phase {
            FlightPhase::Preflight => {
                if let Err(e) = self.synchronize() {
                    log_warn!(self.base.logger, "Passenger sync failed: {}", e);
                }
            }
            FlightPhase::Departure if idle => {
                self.start_boarding();
            }
            FlightPhase::TaxiOut | FlightPhase::Flight if state.boarding_active => {
                self.stop_boarding();
            }
            FlightPhase::Arrival if idle => {
                self.start_deboarding();
            }
            FlightPhase::Turnaround if state.deboarding_active => {
                self.stop_deboarding();
            }
            _ => {}
        }
    }

    fn synchronize(&self) -> Result<(), DataAccessError> {
        let planned: u32 = self.base.facade.read(VAR_PLANNED)?;
        let current: u32 = self.base.facade.read(VAR_CURRENT)?;
        {
            let mut state = self.state.lock();
            state.planned = planned;
            state.current = current;
        }
        self.notify("synchronize");
        self.base.forward_planned(f64::from(planned));
        Ok(())
    }

    fn update_from_external_plan(&self, value: f64, force_sync: bool) -> bool {
        let planned = value.max(0.0).round() as u32;
        let written = {
            let mut state = self.state.lock();
            state.planned = planned;
            if force_sync {
                let ok = self.base.write(VAR_PLANNED, planned)
                    && self.base.write(VAR_CURRENT, planned);
                if ok {
                    state.current = planned;
                }
                ok
            } else {
                true
            }
        };
        self.notify("update_from_external_plan");
        written
    }

    fn attach_orchestrator(&self, link: Weak<dyn OrchestratorLink>) {
        self.base.attach(link);
    }

    fn subscribe(&self, callback: EventCallback<DomainStateChanged>) -> Subscription {
        self.base.subscribe(callback)
    }

    fn unsubscribe(&self, token: Subscription) -> bool {
        self.base.unsubscribe(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::InMemoryFacade;
    use crate::log::{LogLevel, RecordingLogger};

    struct Fixture {
        facade: Arc<InMemoryFacade>,
        logger: Arc<RecordingLogger>,
        coordinator: PassengerCoordinator,
        events: Arc<Mutex<Vec<DomainStateChanged>>>,
    }

    fn fixture() -> Fixture {
        let facade = Arc::new(InMemoryFacade::new());
        facade.set(VAR_PLANNED, 180.0);
        facade.set(VAR_CURRENT, 0.0);
        let logger = Arc::new(RecordingLogger::new());
        let coordinator = PassengerCoordinator::new(facade.clone(), logger.clone());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        coordinator.subscribe(Arc::new(move |e: &DomainStateChanged| sink.lock().push(e.clone())));
        Fixture {
            facade,
            logger,
            coordinator,
            events,
        }
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let f = fixture();

        assert!(f.coordinator.start_boarding());
        assert!(!f.coordinator.start_boarding());
        assert!(f.coordinator.stop_boarding());
        assert!(!f.coordinator.stop_boarding());
        assert!(f.logger.contains(LogLevel::Warn, "Boarding already active"));
    }

    #[test]
    fn test_boarding_and_deboarding_are_exclusive() {
        let f = fixture();

        assert!(f.coordinator.start_deboarding());
        assert!(!f.coordinator.start_boarding());
        assert!(!f.coordinator.state().boarding_active);
        assert!(f
            .logger
            .contains(LogLevel::Warn, "Cannot start boarding while deboarding is active"));
    }

    #[test]
    fn test_event_raised_after_every_call() {
        let f = fixture();

        f.coordinator.start_boarding();
        f.coordinator.start_boarding();

        let events = f.events.lock();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.operation == "start_boarding"));
    }

    #[test]
    fn test_failed_write_leaves_state_unchanged() {
        let f = fixture();
        f.facade.fail_writes_to(VAR_BOARDING);

        assert!(!f.coordinator.start_boarding());
        assert!(!f.coordinator.state().boarding_active);
        assert_eq!(f.logger.count_at(LogLevel::Error), 1);
    }

    #[test]
    fn test_phase_binding() {
        let f = fixture();
        let c = &f.coordinator;

        c.manage_for_phase(FlightPhase::Preflight);
        assert_eq!(c.state().planned, 180);

        c.manage_for_phase(FlightPhase::Departure);
        assert!(c.state().boarding_active);

        c.manage_for_phase(FlightPhase::TaxiOut);
        assert!(!c.state().boarding_active);

        c.manage_for_phase(FlightPhase::TaxiIn);
        assert_eq!(c.state(), PassengerState { planned: 180, ..Default::default() });

        c.manage_for_phase(FlightPhase::Arrival);
        assert!(c.state().deboarding_active);

        c.manage_for_phase(FlightPhase::Turnaround);
        assert!(!c.state().deboarding_active);
    }

    #[test]
    fn test_boarding_progress_is_clamped_to_plan() {
        let f = fixture();
        f.coordinator.synchronize().unwrap();
        f.coordinator.start_boarding();

        assert!(f.coordinator.update_boarding_progress(200));

        assert_eq!(f.coordinator.state().current, 180);
        assert!(f.coordinator.is_boarding_complete());
        assert_eq!(f.facade.number(VAR_CURRENT), Some(180.0));
    }

    #[test]
    fn test_deboarding_progress_counts_down() {
        let f = fixture();
        f.coordinator.update_from_external_plan(120.0, true);
        f.coordinator.start_deboarding();

        f.coordinator.update_deboarding_progress(40);
        assert!(!f.coordinator.is_deboarding_complete());
        f.coordinator.update_deboarding_progress(0);
        assert!(f.coordinator.is_deboarding_complete());
    }

    #[test]
    fn test_external_plan_without_force_keeps_current() {
        let f = fixture();

        assert!(f.coordinator.update_from_external_plan(96.0, false));

        assert_eq!(f.coordinator.state().planned, 96);
        assert_eq!(f.coordinator.state().current, 0);
        assert_eq!(f.facade.write_count(), 0);
    }

    #[test]
    fn test_external_plan_with_force_writes_through() {
        let f = fixture();

        assert!(f.coordinator.update_from_external_plan(96.0, true));

        assert_eq!(f.coordinator.state().current, 96);
        assert_eq!(f.facade.number(VAR_CURRENT), Some(96.0));
    }

    #[test]
    fn test_synchronize_without_orchestrator_warns() {
        let f = fixture();

        assert!(f.coordinator.synchronize().is_ok());
        assert!(f.logger.contains(LogLevel::Warn, "not forwarded"));
    }

    #[test]
    fn test_synchronize_propagates_read_failure() {
        let f = fixture();
        f.facade.fail_reads_of(VAR_CURRENT);

        assert!(f.coordinator.synchronize().is_err());
        assert_eq!(f.coordinator.state().planned, 0);
    }
}
