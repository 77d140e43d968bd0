//! Automated ground-service orchestration.
//!
//! [`ServiceOrchestrator`] sits on top of the coordinators. Each poll tick it
//! lets every coordinator apply its phase behaviour, then requests the
//! automated services the phase calls for from the ground-services
//! simulation.

mod callbacks;
mod service;

pub use callbacks::{CallbackId, ServiceCallback};
pub use service::ServiceOrchestrator;

use crate::phase::FlightPhase;

/// Automated services the ground-services simulation can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceType {
    Refuel,
    Catering,
    Boarding,
    Deboarding,
    CargoLoading,
    CargoUnloading,
}

impl ServiceType {
    pub const ALL: [ServiceType; 6] = [
        ServiceType::Refuel,
        ServiceType::Catering,
        ServiceType::Boarding,
        ServiceType::Deboarding,
        ServiceType::CargoLoading,
        ServiceType::CargoUnloading,
    ];

    /// Services dispatched while in `phase`.
    pub fn for_phase(phase: FlightPhase) -> &'static [ServiceType] {
        match phase {
            FlightPhase::Departure => &[
                ServiceType::Refuel,
                ServiceType::Catering,
                ServiceType::Boarding,
                ServiceType::CargoLoading,
            ],
            FlightPhase::Arrival => &[ServiceType::Deboarding, ServiceType::CargoUnloading],
            FlightPhase::Turnaround => &[ServiceType::Refuel, ServiceType::Catering],
            FlightPhase::Preflight
            | FlightPhase::TaxiOut
            | FlightPhase::Flight
            | FlightPhase::TaxiIn => &[],
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServiceType::Refuel => "refuel",
            ServiceType::Catering => "catering",
            ServiceType::Boarding => "boarding",
            ServiceType::Deboarding => "deboarding",
            ServiceType::CargoLoading => "cargo loading",
            ServiceType::CargoUnloading => "cargo unloading",
        };
        f.write_str(name)
    }
}

/// A service expected once the predicted phase is reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServicePrediction {
    /// Phase the service belongs to.
    pub phase: FlightPhase,
    pub service: ServiceType,
    pub confidence: f64,
}
