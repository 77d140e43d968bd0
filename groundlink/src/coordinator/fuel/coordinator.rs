//! Fuel coordinator.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use super::commands::{
    ActivateTransfer, FuelCommand, PrepareTransfer, StopTransfer, VAR_CURRENT, VAR_PLANNED,
};
use super::refueling::{RefuelingStateChange, RefuelingStateManager, RefuelingSubState};
use super::units::FuelUnits;
use crate::coordinator::base::CoordinatorBase;
use crate::coordinator::{
    DomainDetail, DomainStateChanged, OrchestratorLink, ServiceCoordinator, ServiceDomain,
};
use crate::events::{EventCallback, Subscription};
use crate::facade::{AircraftDataFacade, DataAccessError, TypedRead};
use crate::log::Logger;
use crate::phase::FlightPhase;
use crate::{log_error, log_info, log_warn};

/// Transfer tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelSettings {
    /// Units the facade reports fuel in.
    pub units: FuelUnits,
    /// Transfer rate in units per second.
    pub rate_per_second: f64,
    /// Time one `refuel()`/`defuel()` call represents.
    pub tick_interval: Duration,
    /// Completion tolerance in units.
    pub tolerance: f64,
}

impl Default for FuelSettings {
    fn default() -> Self {
        Self {
            units: FuelUnits::Kilograms,
            rate_per_second: 28.0,
            tick_interval: Duration::from_secs(1),
            tolerance: 1.0,
        }
    }
}

impl FuelSettings {
    /// Quantity moved per tick.
    pub fn step(&self) -> f64 {
        self.rate_per_second * self.tick_interval.as_secs_f64()
    }
}

/// Fuel domain state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelState {
    pub current: f64,
    pub planned: f64,
    pub units: FuelUnits,
    pub sub_state: RefuelingSubState,
    /// Target written by the last prepare, cleared when the transfer ends.
    pub transfer_target: Option<f64>,
}

/// Result of one transfer tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferTick {
    /// Moved toward the plan, not there yet.
    Progress { current: f64 },
    /// Landed within tolerance of the plan on this tick.
    Complete { current: f64 },
    /// No transfer in the matching direction is running.
    NotActive,
    /// Writing the new quantity failed; the workflow is now in error.
    Failed,
}

#[derive(Clone, Copy)]
enum Direction {
    Refuel,
    Defuel,
}

struct Quantities {
    current: f64,
    planned: f64,
    transfer_target: Option<f64>,
}

/// Notifications raised while the operation lock is held, delivered once it
/// is released.
#[derive(Default)]
struct Pending {
    changes: Vec<RefuelingStateChange>,
    events: Vec<DomainStateChanged>,
    forward: Option<f64>,
}

/// Coordinates fuel quantity and drives the refueling workflow.
///
/// # Refueling
///
/// `request_refueling` -> `prepare_transfer` -> `activate_transfer`, then one
/// `refuel` call per tick until it reports [`TransferTick::Complete`]. The
/// prepare and activate steps are separate because activation waits for the
/// fuel truck to be connected.
///
/// Every operation, including its sub-state check, runs under one lock, so
/// the orchestrator and a phase binding may drive the same coordinator.
pub struct FuelCoordinator {
    base: CoordinatorBase<dyn AircraftDataFacade>,
    operation: Mutex<()>,
    quantities: Mutex<Quantities>,
    refueling: RefuelingStateManager,
    settings: FuelSettings,
}

impl FuelCoordinator {
    pub fn new(
        facade: Arc<dyn AircraftDataFacade>,
        settings: FuelSettings,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            refueling: RefuelingStateManager::new(Arc::clone(&logger)),
            base: CoordinatorBase::new(ServiceDomain::Fuel, "fuel", facade, logger),
            operation: Mutex::new(()),
            quantities: Mutex::new(Quantities {
                current: 0.0,
                planned: 0.0,
                transfer_target: None,
            }),
            settings,
        }
    }

    pub fn state(&self) -> FuelState {
        let q = self.quantities.lock();
        FuelState {
            current: q.current,
            planned: q.planned,
            units: self.settings.units,
            sub_state: self.refueling.state(),
            transfer_target: q.transfer_target,
        }
    }

    /// The refueling sub-workflow, read-only from outside.
    pub fn refueling(&self) -> &RefuelingStateManager {
        &self.refueling
    }

    pub fn settings(&self) -> &FuelSettings {
        &self.settings
    }

    /// Ask for fuel. Refused when already within tolerance of the plan.
    pub fn request_refueling(&self) -> bool {
        self.serialized(|pending| self.request_locked(pending))
    }

    /// First half of the start: write the target and zero the rate.
    pub fn prepare_transfer(&self) -> bool {
        self.serialized(|pending| self.prepare_locked(pending))
    }

    /// Second half of the start: switch the transfer on.
    pub fn activate_transfer(&self) -> bool {
        self.serialized(|pending| self.activate_locked(pending))
    }

    /// Advance one refueling tick.
    pub fn refuel(&self) -> TransferTick {
        self.serialized(|pending| self.step(Direction::Refuel, pending))
    }

    /// Abandon a requested or running refuel.
    pub fn stop_refueling(&self) -> bool {
        self.serialized(|pending| self.stop_locked(pending))
    }

    /// Start removing fuel down to the plan.
    pub fn start_defueling(&self) -> bool {
        self.serialized(|pending| self.start_defueling_locked(pending))
    }

    /// Advance one defueling tick.
    pub fn defuel(&self) -> TransferTick {
        self.serialized(|pending| self.step(Direction::Defuel, pending))
    }

    /// Return a finished or failed workflow to Idle.
    pub fn reset_after_completion(&self) -> bool {
        self.serialized(|pending| self.reset_locked(pending))
    }

    fn serialized<R>(&self, f: impl FnOnce(&mut Pending) -> R) -> R {
        let mut pending = Pending::default();
        let result = {
            let _guard = self.operation.lock();
            f(&mut pending)
        };
        self.deliver(pending);
        result
    }

    fn deliver(&self, pending: Pending) {
        for change in &pending.changes {
            self.refueling.publish(change);
        }
        for event in pending.events {
            self.base.notify(event);
        }
        if let Some(planned) = pending.forward {
            self.base.forward_planned(planned);
        }
    }

    fn move_to(&self, next: RefuelingSubState, pending: &mut Pending) -> bool {
        match self.refueling.commit(next) {
            Some(change) => {
                pending.changes.push(change);
                true
            }
            None => false,
        }
    }

    fn request_locked(&self, pending: &mut Pending) -> bool {
        let (current, planned) = self.current_and_planned();
        let requested = if planned - current <= self.settings.tolerance {
            log_warn!(
                self.base.logger,
                "Refueling not needed: {:.0} of {:.0} {} on board",
                current,
                planned,
                self.settings.units
            );
            false
        } else if self.move_to(RefuelingSubState::Requested, pending) {
            log_info!(
                self.base.logger,
                "Refueling requested: {:.0} -> {:.0} {}",
                current,
                planned,
                self.settings.units
            );
            true
        } else {
            false
        };
        self.record("request_refueling", pending);
        requested
    }

    fn prepare_locked(&self, pending: &mut Pending) -> bool {
        let prepared = if self.refueling.state() != RefuelingSubState::Requested {
            log_warn!(self.base.logger, "Cannot prepare transfer: refueling not requested");
            false
        } else {
            let command = PrepareTransfer::for_planned(self.current_and_planned().1);
            if self.run(&command) {
                self.quantities.lock().transfer_target = Some(command.target);
                true
            } else {
                self.move_to(RefuelingSubState::Error, pending);
                false
            }
        };
        self.record("prepare_transfer", pending);
        prepared
    }

    fn activate_locked(&self, pending: &mut Pending) -> bool {
        let prepared = self.quantities.lock().transfer_target.is_some();
        let activated = if self.refueling.state() != RefuelingSubState::Requested || !prepared {
            log_warn!(self.base.logger, "Cannot activate transfer: not prepared");
            false
        } else if self.run(&ActivateTransfer {
            rate: self.settings.rate_per_second,
        }) {
            self.move_to(RefuelingSubState::Refueling, pending)
        } else {
            self.move_to(RefuelingSubState::Error, pending);
            false
        };
        self.record("activate_transfer", pending);
        activated
    }

    fn stop_locked(&self, pending: &mut Pending) -> bool {
        let stopped = match self.refueling.state() {
            RefuelingSubState::Requested | RefuelingSubState::Refueling => {
                self.run(&StopTransfer);
                self.quantities.lock().transfer_target = None;
                log_info!(self.base.logger, "Refueling stopped");
                self.move_to(RefuelingSubState::Idle, pending)
            }
            other => {
                log_warn!(self.base.logger, "No refueling to stop ({})", other);
                false
            }
        };
        self.record("stop_refueling", pending);
        stopped
    }

    fn start_defueling_locked(&self, pending: &mut Pending) -> bool {
        let (current, planned) = self.current_and_planned();
        let started = if current - planned <= self.settings.tolerance {
            log_warn!(self.base.logger, "Defueling not needed");
            false
        } else if !self.move_to(RefuelingSubState::Defueling, pending) {
            false
        } else if self.run(&ActivateTransfer {
            rate: -self.settings.rate_per_second,
        }) {
            log_info!(
                self.base.logger,
                "Defueling started: {:.0} -> {:.0} {}",
                current,
                planned,
                self.settings.units
            );
            true
        } else {
            self.move_to(RefuelingSubState::Error, pending);
            false
        };
        self.record("start_defueling", pending);
        started
    }

    fn reset_locked(&self, pending: &mut Pending) -> bool {
        let reset = match self.refueling.state() {
            RefuelingSubState::Complete | RefuelingSubState::Error => {
                self.move_to(RefuelingSubState::Idle, pending)
            }
            _ => false,
        };
        self.record("reset_after_completion", pending);
        reset
    }

    fn step(&self, direction: Direction, pending: &mut Pending) -> TransferTick {
        let tick = self.step_locked(direction, pending);
        let operation = match direction {
            Direction::Refuel => "refuel",
            Direction::Defuel => "defuel",
        };
        self.record(operation, pending);
        tick
    }

    fn step_locked(&self, direction: Direction, pending: &mut Pending) -> TransferTick {
        let expected = match direction {
            Direction::Refuel => RefuelingSubState::Refueling,
            Direction::Defuel => RefuelingSubState::Defueling,
        };
        if self.refueling.state() != expected {
            log_warn!(self.base.logger, "Transfer tick ignored: not {}", expected);
            return TransferTick::NotActive;
        }

        let step = self.settings.step();
        let written = {
            let mut q = self.quantities.lock();
            let next = match direction {
                Direction::Refuel => (q.current + step).min(q.planned),
                Direction::Defuel => (q.current - step).max(q.planned),
            };
            if self.base.write(VAR_CURRENT, next) {
                q.current = next;
                Some((next, (q.planned - next).abs() <= self.settings.tolerance))
            } else {
                None
            }
        };

        let Some((current, done)) = written else {
            self.run(&StopTransfer);
            self.move_to(RefuelingSubState::Error, pending);
            return TransferTick::Failed;
        };
        if !done {
            return TransferTick::Progress { current };
        }

        self.run(&StopTransfer);
        self.quantities.lock().transfer_target = None;
        match direction {
            Direction::Refuel => {
                self.move_to(RefuelingSubState::Complete, pending);
                log_info!(
                    self.base.logger,
                    "Refueling complete: {:.0} {}",
                    current,
                    self.settings.units
                );
            }
            Direction::Defuel => {
                self.move_to(RefuelingSubState::Idle, pending);
                log_info!(
                    self.base.logger,
                    "Defueling complete: {:.0} {}",
                    current,
                    self.settings.units
                );
            }
        }
        TransferTick::Complete { current }
    }

    fn synchronize_locked(&self, pending: &mut Pending) -> Result<(), DataAccessError> {
        let current: f64 = self.base.facade.read(VAR_CURRENT)?;
        let planned: f64 = self.base.facade.read(VAR_PLANNED)?;
        {
            let mut q = self.quantities.lock();
            q.current = current;
            q.planned = planned;
        }
        self.record("synchronize", pending);
        pending.forward = Some(planned);
        Ok(())
    }

    fn synchronize_or_warn(&self, pending: &mut Pending) {
        if let Err(e) = self.synchronize_locked(pending) {
            log_warn!(self.base.logger, "Fuel sync failed: {}", e);
        }
    }

    fn run(&self, command: &dyn FuelCommand) -> bool {
        match command.execute(self.base.facade.as_ref()) {
            Ok(()) => true,
            Err(e) => {
                log_error!(self.base.logger, "Fuel {} failed: {}", command.name(), e);
                false
            }
        }
    }

    fn current_and_planned(&self) -> (f64, f64) {
        let q = self.quantities.lock();
        (q.current, q.planned)
    }

    /// Queue a state-changed event describing the state right now.
    fn record(&self, operation: &'static str, pending: &mut Pending) {
        let state = self.state();
        pending.events.push(DomainStateChanged {
            domain: ServiceDomain::Fuel,
            operation,
            current: state.current,
            planned: state.planned,
            detail: DomainDetail::Fuel {
                units: state.units,
                sub_state: state.sub_state,
            },
        });
    }
}

impl ServiceCoordinator for FuelCoordinator {
    fn domain(&self) -> ServiceDomain {
        ServiceDomain::Fuel
    }

    fn manage_for_phase(&self, phase: FlightPhase) {
        self.serialized(|pending| {
            let sub_state = self.refueling.state();
            match phase {
                FlightPhase::Preflight => self.synchronize_or_warn(pending),
                FlightPhase::Departure => match sub_state {
                    RefuelingSubState::Idle => {
                        let (current, planned) = self.current_and_planned();
                        if planned - current > self.settings.tolerance
                            && self.request_locked(pending)
                        {
                            self.prepare_locked(pending);
                        }
                    }
                    RefuelingSubState::Refueling => {
                        self.step(Direction::Refuel, pending);
                    }
                    _ => {}
                },
                FlightPhase::TaxiOut => {
                    if matches!(
                        sub_state,
                        RefuelingSubState::Requested | RefuelingSubState::Refueling
                    ) {
                        self.stop_locked(pending);
                    }
                }
                FlightPhase::Turnaround => {
                    if matches!(
                        sub_state,
                        RefuelingSubState::Complete | RefuelingSubState::Error
                    ) {
                        self.reset_locked(pending);
                    }
                    self.synchronize_or_warn(pending);
                }
                FlightPhase::Flight | FlightPhase::TaxiIn | FlightPhase::Arrival => {}
            }
        });
    }

    fn synchronize(&self) -> Result<(), DataAccessError> {
        self.serialized(|pending| self.synchronize_locked(pending))
    }

    /// With `force_sync`, the current quantity is overwritten only when no
    /// transfer is requested or running.
    fn update_from_external_plan(&self, value: f64, force_sync: bool) -> bool {
        self.serialized(|pending| {
            let planned = value.max(0.0);
            let updated = {
                let mut q = self.quantities.lock();
                q.planned = planned;
                if !force_sync {
                    true
                } else if !self.refueling.allows_direct_overwrite() {
                    log_warn!(
                        self.base.logger,
                        "Transfer in progress; current fuel not overwritten"
                    );
                    false
                } else if self.base.write(VAR_PLANNED, planned)
                    && self.base.write(VAR_CURRENT, planned)
                {
                    q.current = planned;
                    true
                } else {
                    false
                }
            };
            self.record("update_from_external_plan", pending);
            updated
        })
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
