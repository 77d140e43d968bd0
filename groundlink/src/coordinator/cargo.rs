//! Cargo loading and unloading.

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

pub(crate) const VAR_PLANNED: &str = "cargo.planned";
pub(crate) const VAR_PERCENTAGE: &str = "cargo.percentage";
pub(crate) const VAR_LOADING: &str = "cargo.loading";
pub(crate) const VAR_UNLOADING: &str = "cargo.unloading";

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CargoState {
    /// Planned cargo mass, in the aircraft's weight units.
    pub planned_amount: f64,
    /// Share of the planned amount currently loaded, 0 to 100.
    pub current_percentage: f64,
    pub loading_active: bool,
    pub unloading_active: bool,
}

/// Coordinates cargo hold loading. Loading and unloading are exclusive.
pub struct CargoCoordinator {
    base: CoordinatorBase<dyn AircraftDataFacade>,
    state: Mutex<CargoState>,
}

#[derive(Clone, Copy)]
enum Operation {
    Loading,
    Unloading,
}

impl Operation {
    fn variable(self) -> &'static str {
        match self {
            Operation::Loading => VAR_LOADING,
            Operation::Unloading => VAR_UNLOADING,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Operation::Loading => "Cargo loading",
            Operation::Unloading => "Cargo unloading",
        }
    }
}

impl CargoCoordinator {
    pub fn new(facade: Arc<dyn AircraftDataFacade>, logger: Arc<dyn Logger>) -> Self {
        Self {
            base: CoordinatorBase::new(ServiceDomain::Cargo, "cargo", facade, logger),
            state: Mutex::new(CargoState::default()),
        }
    }

    pub fn state(&self) -> CargoState {
        *self.state.lock()
    }

    pub fn start_loading(&self) -> bool {
        let started = self.start(Operation::Loading);
        self.notify("start_loading");
        started
    }

    pub fn stop_loading(&self) -> bool {
        let stopped = self.stop(Operation::Loading);
        self.notify("stop_loading");
        stopped
    }

    pub fn start_unloading(&self) -> bool {
        let started = self.start(Operation::Unloading);
        self.notify("start_unloading");
        started
    }

    pub fn stop_unloading(&self) -> bool {
        let stopped = self.stop(Operation::Unloading);
        self.notify("stop_unloading");
        stopped
    }

    /// Record loading progress, clamped to 0..=100.
    pub fn update_progress(&self, percentage: f64) -> bool {
        let pct = if percentage.is_nan() {
            0.0
        } else {
            percentage.clamp(0.0, 100.0)
        };
        let updated = {
            let mut state = self.state.lock();
            if self.base.write(VAR_PERCENTAGE, pct) {
                state.current_percentage = pct;
                true
            } else {
                false
            }
        };
        self.notify("update_progress");
        updated
    }

    fn start(&self, op: Operation) -> bool {
        let mut state = self.state.lock();
        let (own, other) = match op {
            Operation::Loading => (state.loading_active, state.unloading_active),
            Operation::Unloading => (state.unloading_active, state.loading_active),
        };
        if own {
            log_warn!(self.base.logger, "{} already active", op.label());
            return false;
        }
        if other {
            log_warn!(
                self.base.logger,
                "{} refused: the opposite operation is active",
                op.label()
            );
            return false;
        }
        if !self.base.write(op.variable(), true) {
            return false;
        }
        match op {
            Operation::Loading => state.loading_active = true,
            Operation::Unloading => state.unloading_active = true,
        }
        log_info!(
            self.base.logger,
            "{} started at {:.0}%",
            op.label(),
            state.current_percentage
        );
        true
    }

    fn stop(&self, op: Operation) -> bool {
        let mut state = self.state.lock();
        let active = match op {
            Operation::Loading => state.loading_active,
            Operation::Unloading => state.unloading_active,
        };
        if !active {
            log_warn!(self.base.logger, "{} not active", op.label());
            return false;
        }
        if !self.base.write(op.variable(), false) {
            return false;
        }
        match op {
            Operation::Loading => state.loading_active = false,
            Operation::Unloading => state.unloading_active = false,
        }
        log_info!(self.base.logger, "{} stopped", op.label());
        true
    }

    fn notify(&self, operation: &'static str) {
        let state = self.state();
        self.base.notify(DomainStateChanged {
            domain: ServiceDomain::Cargo,
            operation,
            current: state.current_percentage,
            planned: state.planned_amount,
            detail: DomainDetail::Cargo {
                loading_active: state.loading_active,
                unloading_active: state.unloading_active,
            },
        });
    }
}

impl ServiceCoordinator for CargoCoordinator {
    fn domain(&self) -> ServiceDomain {
        ServiceDomain::Cargo
    }

    fn manage_for_phase(&self, phase: FlightPhase) {
        let state = self.state();
        let idle = !state.loading_active && !state.unloading_active;
        match phase {
            FlightPhase::Preflight => {
                if let Err(e) = self.synchronize() {
                    log_warn!(self.base.logger, "Cargo sync failed: {}", e);
                }
            }
            FlightPhase::Departure if idle && state.current_percentage < 100.0 => {
                self.start_loading();
            }
            FlightPhase::TaxiOut | FlightPhase::Flight if state.loading_active => {
                self.stop_loading();
            }
            FlightPhase::Arrival if idle && state.current_percentage > 0.0 => {
                self.start_unloading();
            }
            FlightPhase::Turnaround if state.unloading_active => {
                self.stop_unloading();
            }
            _ => {}
        }
    }

    fn synchronize(&self) -> Result<(), DataAccessError> {
        let planned: f64 = self.base.facade.read(VAR_PLANNED)?;
        let percentage: f64 = self.base.facade.read(VAR_PERCENTAGE)?;
        {
            let mut state = self.state.lock();
            state.planned_amount = planned;
            state.current_percentage = percentage.clamp(0.0, 100.0);
        }
        self.notify("synchronize");
        self.base.forward_planned(planned);
        Ok(())
    }

    /// `force_sync` marks the hold as fully loaded with the new plan.
    fn update_from_external_plan(&self, value: f64, force_sync: bool) -> bool {
        let written = {
            let mut state = self.state.lock();
            state.planned_amount = value.max(0.0);
            if force_sync {
                let ok = self.base.write(VAR_PLANNED, state.planned_amount)
                    && self.base.write(VAR_PERCENTAGE, 100.0);
                if ok {
                    state.current_percentage = 100.0;
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
