//! Aircraft doors.

use std::collections::BTreeSet;
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
use crate::{log_debug, log_info, log_warn};

/// Doors the coordinator operates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DoorType {
    ForwardPassenger,
    AftPassenger,
    ForwardCargo,
    AftCargo,
    Catering,
}

impl DoorType {
    pub const ALL: [DoorType; 5] = [
        DoorType::ForwardPassenger,
        DoorType::AftPassenger,
        DoorType::ForwardCargo,
        DoorType::AftCargo,
        DoorType::Catering,
    ];

    /// Doors opened for passenger and cargo handling at the gate.
    pub const GATE_SERVICE: [DoorType; 3] = [
        DoorType::ForwardPassenger,
        DoorType::ForwardCargo,
        DoorType::AftCargo,
    ];

    /// Facade variable holding this door's open flag.
    pub fn variable(&self) -> &'static str {
        match self {
            DoorType::ForwardPassenger => "doors.forward_passenger.open",
            DoorType::AftPassenger => "doors.aft_passenger.open",
            DoorType::ForwardCargo => "doors.forward_cargo.open",
            DoorType::AftCargo => "doors.aft_cargo.open",
            DoorType::Catering => "doors.catering.open",
        }
    }
}

impl std::fmt::Display for DoorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DoorType::ForwardPassenger => "forward passenger door",
            DoorType::AftPassenger => "aft passenger door",
            DoorType::ForwardCargo => "forward cargo door",
            DoorType::AftCargo => "aft cargo door",
            DoorType::Catering => "catering door",
        };
        f.write_str(name)
    }
}

/// Opens and closes doors in step with the phase.
pub struct DoorCoordinator {
    base: CoordinatorBase<dyn AircraftDataFacade>,
    open: Mutex<BTreeSet<DoorType>>,
}

impl DoorCoordinator {
    pub fn new(facade: Arc<dyn AircraftDataFacade>, logger: Arc<dyn Logger>) -> Self {
        Self {
            base: CoordinatorBase::new(ServiceDomain::Door, "door", facade, logger),
            open: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn is_open(&self, door: DoorType) -> bool {
        self.open.lock().contains(&door)
    }

    /// Open doors, in [`DoorType`] order.
    pub fn open_doors(&self) -> Vec<DoorType> {
        self.open.lock().iter().copied().collect()
    }

    pub fn open_door(&self, door: DoorType) -> bool {
        let opened = {
            let mut open = self.open.lock();
            if open.contains(&door) {
                log_warn!(self.base.logger, "The {} is already open", door);
                false
            } else if self.base.write(door.variable(), true) {
                open.insert(door);
                log_info!(self.base.logger, "Opened {}", door);
                true
            } else {
                false
            }
        };
        self.notify("open_door");
        opened
    }

    pub fn close_door(&self, door: DoorType) -> bool {
        let closed = {
            let mut open = self.open.lock();
            if !open.contains(&door) {
                log_warn!(self.base.logger, "The {} is already closed", door);
                false
            } else if self.base.write(door.variable(), false) {
                open.remove(&door);
                log_info!(self.base.logger, "Closed {}", door);
                true
            } else {
                false
            }
        };
        self.notify("close_door");
        closed
    }

    /// Close every open door. Returns how many were closed.
    pub fn close_all_doors(&self) -> usize {
        let closed = {
            let mut open = self.open.lock();
            let doors: Vec<DoorType> = open.iter().copied().collect();
            let mut closed = 0;
            for door in doors {
                if self.base.write(door.variable(), false) {
                    open.remove(&door);
                    closed += 1;
                }
            }
            closed
        };
        if closed > 0 {
            log_info!(self.base.logger, "Closed {} door(s)", closed);
        }
        self.notify("close_all_doors");
        closed
    }

    fn open_gate_doors(&self) {
        for door in DoorType::GATE_SERVICE {
            if !self.is_open(door) {
                self.open_door(door);
            }
        }
    }

    fn notify(&self, operation: &'static str) {
        let open = self.open_doors();
        self.base.notify(DomainStateChanged {
            domain: ServiceDomain::Door,
            operation,
            current: open.len() as f64,
            planned: 0.0,
            detail: DomainDetail::Door { open },
        });
    }
}

impl ServiceCoordinator for DoorCoordinator {
    fn domain(&self) -> ServiceDomain {
        ServiceDomain::Door
    }

    fn manage_for_phase(&self, phase: FlightPhase) {
        match phase {
            FlightPhase::Preflight => {
                if let Err(e) = self.synchronize() {
                    log_warn!(self.base.logger, "Door sync failed: {}", e);
                }
            }
            FlightPhase::Departure | FlightPhase::Arrival => self.open_gate_doors(),
            FlightPhase::TaxiOut | FlightPhase::Flight => {
                if !self.open.lock().is_empty() {
                    self.close_all_doors();
                }
            }
            FlightPhase::TaxiIn | FlightPhase::Turnaround => {}
        }
    }

    /// Doors have no planned value; only the open flags are pulled.
    fn synchronize(&self) -> Result<(), DataAccessError> {
        let mut flags = BTreeSet::new();
        for door in DoorType::ALL {
            let open: bool = self.base.facade.read(door.variable())?;
            if open {
                flags.insert(door);
            }
        }
        *self.open.lock() = flags;
        self.notify("synchronize");
        Ok(())
    }

    fn update_from_external_plan(&self, _value: f64, _force_sync: bool) -> bool {
        log_debug!(self.base.logger, "Door coordinator has no planned value");
        self.notify("update_from_external_plan");
        false
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
