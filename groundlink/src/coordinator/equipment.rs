//! Ground equipment: power unit, air conditioning, chocks and jetway.

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::base::CoordinatorBase;
use super::{
    DomainDetail, DomainStateChanged, OrchestratorLink, ServiceCoordinator, ServiceDomain,
};
use crate::events::{EventCallback, Subscription};
use crate::facade::{DataAccessError, GroundServiceDataFacade, TypedRead};
use crate::log::Logger;
use crate::phase::FlightPhase;
use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroundEquipment {
    /// Ground power unit.
    Gpu,
    /// Pre-conditioned air.
    Pca,
    Chocks,
    Jetway,
}

impl GroundEquipment {
    pub const ALL: [GroundEquipment; 4] = [
        GroundEquipment::Gpu,
        GroundEquipment::Pca,
        GroundEquipment::Chocks,
        GroundEquipment::Jetway,
    ];

    pub fn variable(&self) -> &'static str {
        match self {
            GroundEquipment::Gpu => "equipment.gpu.connected",
            GroundEquipment::Pca => "equipment.pca.connected",
            GroundEquipment::Chocks => "equipment.chocks.connected",
            GroundEquipment::Jetway => "equipment.jetway.connected",
        }
    }
}

impl std::fmt::Display for GroundEquipment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroundEquipment::Gpu => write!(f, "GPU"),
            GroundEquipment::Pca => write!(f, "PCA"),
            GroundEquipment::Chocks => write!(f, "chocks"),
            GroundEquipment::Jetway => write!(f, "jetway"),
        }
    }
}

/// Connects and removes ground equipment through the ground-services
/// simulation.
///
/// [`EquipmentCoordinator::any_connected`] is what callers feed into
/// `AircraftParameterSnapshot::ground_equipment_connected`.
pub struct EquipmentCoordinator {
    base: CoordinatorBase<dyn GroundServiceDataFacade>,
    connected: Mutex<BTreeSet<GroundEquipment>>,
}

impl EquipmentCoordinator {
    pub fn new(facade: Arc<dyn GroundServiceDataFacade>, logger: Arc<dyn Logger>) -> Self {
        Self {
            base: CoordinatorBase::new(ServiceDomain::Equipment, "equipment", facade, logger),
            connected: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn is_connected(&self, equipment: GroundEquipment) -> bool {
        self.connected.lock().contains(&equipment)
    }

    pub fn any_connected(&self) -> bool {
        !self.connected.lock().is_empty()
    }

    pub fn connected(&self) -> Vec<GroundEquipment> {
        self.connected.lock().iter().copied().collect()
    }

    pub fn connect(&self, equipment: GroundEquipment) -> bool {
        let connected = {
            let mut set = self.connected.lock();
            if set.contains(&equipment) {
                log_warn!(self.base.logger, "{} already connected", equipment);
                false
            } else if self.base.write(equipment.variable(), true) {
                set.insert(equipment);
                log_info!(self.base.logger, "{} connected", equipment);
                true
            } else {
                false
            }
        };
        self.notify("connect");
        connected
    }

    pub fn disconnect(&self, equipment: GroundEquipment) -> bool {
        let removed = {
            let mut set = self.connected.lock();
            if !set.contains(&equipment) {
                log_warn!(self.base.logger, "{} not connected", equipment);
                false
            } else if self.base.write(equipment.variable(), false) {
                set.remove(&equipment);
                log_info!(self.base.logger, "{} disconnected", equipment);
                true
            } else {
                false
            }
        };
        self.notify("disconnect");
        removed
    }

    /// Remove everything connected. Returns how many were removed.
    pub fn disconnect_all(&self) -> usize {
        let removed = {
            let mut set = self.connected.lock();
            let attached: Vec<GroundEquipment> = set.iter().copied().collect();
            attached
                .into_iter()
                .filter(|item| {
                    let ok = self.base.write(item.variable(), false);
                    if ok {
                        set.remove(item);
                    }
                    ok
                })
                .count()
        };
        log_debug!(self.base.logger, "Disconnected {} item(s)", removed);
        self.notify("disconnect_all");
        removed
    }

    fn ensure_connected(&self, items: &[GroundEquipment]) {
        for item in items {
            if !self.is_connected(*item) {
                self.connect(*item);
            }
        }
    }

    fn notify(&self, operation: &'static str) {
        let connected = self.connected();
        self.base.notify(DomainStateChanged {
            domain: ServiceDomain::Equipment,
            operation,
            current: connected.len() as f64,
            planned: 0.0,
            detail: DomainDetail::Equipment { connected },
        });
    }
}

impl ServiceCoordinator for EquipmentCoordinator {
    fn domain(&self) -> ServiceDomain {
        ServiceDomain::Equipment
    }

    fn manage_for_phase(&self, phase: FlightPhase) {
        match phase {
            FlightPhase::Preflight => {
                if let Err(e) = self.synchronize() {
                    log_warn!(self.base.logger, "Equipment sync failed: {}", e);
                }
                self.ensure_connected(&[GroundEquipment::Gpu, GroundEquipment::Chocks]);
            }
            FlightPhase::TaxiOut => {
                if self.any_connected() {
                    self.disconnect_all();
                }
            }
            FlightPhase::Arrival => self.ensure_connected(&[
                GroundEquipment::Gpu,
                GroundEquipment::Chocks,
                GroundEquipment::Jetway,
            ]),
            FlightPhase::Departure
            | FlightPhase::Flight
            | FlightPhase::TaxiIn
            | FlightPhase::Turnaround => {}
        }
    }

    fn synchronize(&self) -> Result<(), DataAccessError> {
        let mut connected = BTreeSet::new();
        for item in GroundEquipment::ALL {
            let flag: bool = self.base.facade.read(item.variable())?;
            if flag {
                connected.insert(item);
            }
        }
        *self.connected.lock() = connected;
        self.notify("synchronize");
        Ok(())
    }

    fn update_from_external_plan(&self, _value: f64, _force_sync: bool) -> bool {
        log_debug!(self.base.logger, "Equipment coordinator has no planned value");
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
