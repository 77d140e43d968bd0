//! `groundlink simulate` - drive one scripted turnaround cycle.
//!
//! Wires the phase machine, all five coordinators and the orchestrator
//! against an in-memory stand-in for both simulations, then walks the
//! aircraft Preflight -> Departure -> ... -> Turnaround -> Departure. Every
//! phase event and domain event is logged; the machine state is saved at the
//! end.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use groundlink::config::ConfigFile;
use groundlink::coordinator::fuel::{FuelSettings, FuelState, RefuelingSubState};
use groundlink::coordinator::{
    CargoCoordinator, DomainStateChanged, DoorCoordinator, DoorType, EquipmentCoordinator,
    FuelCoordinator, GroundEquipment, PassengerCoordinator, ServiceCoordinator,
};
use groundlink::facade::InMemoryFacade;
use groundlink::log::{Logger, TracingLogger};
use groundlink::orchestrator::{ServiceOrchestrator, ServiceType};
use groundlink::phase::{
    AircraftParameterSnapshot, FlightPhase, PersistenceError, PhaseEvent, PhaseStateMachine,
    PhaseTransitionRecord,
};
use groundlink::{log_debug, log_info};

use crate::error::CliError;
use crate::runner::CliRunner;

const PLANNED_PASSENGERS: u32 = 150;
const BOARDING_PER_TICK: u32 = 6;
const PLANNED_CARGO_KG: f64 = 4200.0;
const CARGO_PERCENT_PER_TICK: f64 = 5.0;
const INITIAL_FUEL: f64 = 9000.0;
const PLANNED_FUEL: f64 = 10000.0;

/// Arguments for the simulate command.
pub struct SimulateArgs {
    /// Tick budget for each gate phase.
    pub ticks: u32,
    pub state_file: Option<PathBuf>,
}

/// Run the simulate command.
pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("simulate");
    let config = runner.config();
    let state_file = args
        .state_file
        .unwrap_or_else(|| config.phase.state_file.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let simulation = Simulation::new(config, runtime.handle().clone(), Arc::new(TracingLogger));
    let report = runtime.block_on(simulation.run_cycle(args.ticks))?;
    simulation.save(&state_file)?;

    info!("Phase state saved to {}", state_file.display());
    print_report(&report, &state_file);
    Ok(())
}

fn print_report(report: &CycleReport, state_file: &Path) {
    println!("Turnaround cycle complete");
    println!();
    for record in &report.transitions {
        println!(
            "  {:<10} -> {:<10} after {:.2}s",
            record.from.name(),
            record.to.name(),
            record.duration_in_previous_phase.as_secs_f64()
        );
    }
    println!();
    println!("Final phase:     {}", report.final_phase);
    println!(
        "Fuel on board:   {:.0} / {:.0} {} ({})",
        report.fuel.current, report.fuel.planned, report.fuel.units, report.fuel.sub_state
    );
    println!("Refuel ticks:    {}", report.refuel_ticks);
    let services: Vec<String> = report.requested.iter().map(|s| s.to_string()).collect();
    println!("Open services:   {}", services.join(", "));
    println!("Service calls:   {}", report.service_calls);
    println!("State saved to:  {}", state_file.display());
}

/// Outcome of one scripted cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub transitions: Vec<PhaseTransitionRecord>,
    pub final_phase: FlightPhase,
    pub fuel: FuelState,
    /// Ticks spent with the transfer running during the first departure.
    pub refuel_ticks: u32,
    pub requested: Vec<ServiceType>,
    /// Trigger and cancel calls seen by the ground-services stand-in.
    pub service_calls: usize,
}

/// The wired system plus the stand-in simulator it talks to.
pub struct Simulation {
    facade: Arc<InMemoryFacade>,
    machine: PhaseStateMachine,
    passengers: Arc<PassengerCoordinator>,
    equipment: Arc<EquipmentCoordinator>,
    fuel: Arc<FuelCoordinator>,
    cargo: Arc<CargoCoordinator>,
    orchestrator: Arc<ServiceOrchestrator>,
    cancellation: CancellationToken,
    logger: Arc<dyn Logger>,
}

impl Simulation {
    pub fn new(config: &ConfigFile, runtime: Handle, logger: Arc<dyn Logger>) -> Self {
        let facade = Arc::new(InMemoryFacade::new());
        seed(&facade);

        let machine = PhaseStateMachine::with_options(
            Arc::clone(&logger),
            config.phase.machine_options().with_runtime(runtime),
        );

        let passengers = Arc::new(PassengerCoordinator::new(facade.clone(), logger.clone()));
        let doors = Arc::new(DoorCoordinator::new(facade.clone(), logger.clone()));
        let equipment = Arc::new(EquipmentCoordinator::new(facade.clone(), logger.clone()));
        let fuel = Arc::new(FuelCoordinator::new(
            facade.clone(),
            FuelSettings::from(config.fuel),
            logger.clone(),
        ));
        let cargo = Arc::new(CargoCoordinator::new(facade.clone(), logger.clone()));

        let coordinators: Vec<Arc<dyn ServiceCoordinator>> = vec![
            passengers.clone(),
            doors,
            equipment.clone(),
            fuel.clone(),
            cargo.clone(),
        ];
        for coordinator in &coordinators {
            let events = logger.clone();
            coordinator.subscribe(Arc::new(move |event: &DomainStateChanged| {
                log_debug!(
                    events,
                    "{} {}: {:.1} of {:.1}",
                    event.domain,
                    event.operation,
                    event.current,
                    event.planned
                );
            }));
        }

        let events = logger.clone();
        machine.subscribe(move |event: &PhaseEvent| match event {
            PhaseEvent::Changed {
                previous, current, ..
            } => log_info!(events, "Phase changed: {} -> {}", previous, current),
            PhaseEvent::PredictionChanged {
                predicted,
                confidence,
                ..
            } => log_info!(
                events,
                "Next phase predicted: {} ({:.0}%)",
                predicted,
                confidence * 100.0
            ),
            PhaseEvent::Timeout { phase, .. } => log_info!(events, "{} timed out", phase),
            PhaseEvent::Restored { phase } => log_info!(events, "Restored into {}", phase),
        });

        let orchestrator =
            ServiceOrchestrator::new(machine.clone(), facade.clone(), coordinators, logger.clone());
        orchestrator.wire();

        Self {
            facade,
            machine,
            passengers,
            equipment,
            fuel,
            cargo,
            orchestrator,
            cancellation: CancellationToken::new(),
            logger,
        }
    }

    /// Walk the full cycle back to Departure.
    ///
    /// `max_ticks` bounds each gate phase; an unfinished refuel or boarding
    /// is simply cut short at pushback.
    pub async fn run_cycle(&self, max_ticks: u32) -> Result<CycleReport, CliError> {
        let mut snapshot = AircraftParameterSnapshot::parked();
        self.tick(&snapshot).await?;

        snapshot.flight_plan_loaded = true;
        self.advance(FlightPhase::Departure, &snapshot)?;
        self.tick(&snapshot).await?;

        // Fuel truck connected.
        self.fuel.activate_transfer();
        let mut refuel_ticks = 0;
        for n in 1..=max_ticks {
            if self.departure_done() {
                break;
            }
            if self.fuel.state().sub_state == RefuelingSubState::Refueling {
                refuel_ticks += 1;
            }
            self.tick(&snapshot).await?;
            self.passengers
                .update_boarding_progress(n.saturating_mul(BOARDING_PER_TICK));
            self.cargo
                .update_progress(f64::from(n) * CARGO_PERCENT_PER_TICK);
        }

        // Pushback.
        self.equipment.disconnect_all();
        snapshot = AircraftParameterSnapshot {
            on_ground: true,
            engines_running: true,
            parking_brake_set: false,
            beacon_on: true,
            ground_speed: 6.0,
            altitude: 0.0,
            ground_equipment_connected: self.equipment.any_connected(),
            flight_plan_loaded: true,
        };
        self.advance(FlightPhase::TaxiOut, &snapshot)?;
        self.tick(&snapshot).await?;

        snapshot.on_ground = false;
        snapshot.ground_speed = 250.0;
        snapshot.altitude = 8000.0;
        self.advance(FlightPhase::Flight, &snapshot)?;
        self.tick(&snapshot).await?;

        snapshot.on_ground = true;
        snapshot.ground_speed = 18.0;
        snapshot.altitude = 0.0;
        self.advance(FlightPhase::TaxiIn, &snapshot)?;
        self.tick(&snapshot).await?;

        snapshot.ground_speed = 0.0;
        snapshot.parking_brake_set = true;
        snapshot.engines_running = false;
        self.advance(FlightPhase::Arrival, &snapshot)?;
        snapshot.ground_equipment_connected = true;
        self.tick(&snapshot).await?;

        let on_board = self.passengers.state().current;
        let loaded = self.cargo.state().current_percentage;
        for n in 1..=max_ticks {
            let unloaded = self.cargo.state().current_percentage <= 0.0;
            if self.passengers.is_deboarding_complete() && unloaded {
                break;
            }
            self.tick(&snapshot).await?;
            self.passengers
                .update_deboarding_progress(on_board.saturating_sub(n.saturating_mul(BOARDING_PER_TICK)));
            self.cargo
                .update_progress(loaded - f64::from(n) * CARGO_PERCENT_PER_TICK);
        }

        // Turnaround is started by the ground crew, not by a parameter.
        self.advance(FlightPhase::Turnaround, &snapshot)?;
        self.tick(&snapshot).await?;

        self.advance(FlightPhase::Departure, &snapshot)?;
        self.tick(&snapshot).await?;

        Ok(CycleReport {
            transitions: self.machine.transition_history(),
            final_phase: self.machine.current_phase(),
            fuel: self.fuel.state(),
            refuel_ticks,
            requested: self.orchestrator.requested_services(),
            service_calls: self.facade.service_calls().len(),
        })
    }

    /// Save the machine state, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<(), CliError> {
        let result = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent).map_err(PersistenceError::from)
            }
            _ => Ok(()),
        }
        .and_then(|()| self.machine.save_to_path(path));

        result.map_err(|error| CliError::StateSave {
            path: path.to_path_buf(),
            error,
        })
    }

    #[cfg(test)]
    fn machine(&self) -> &PhaseStateMachine {
        &self.machine
    }

    #[cfg(test)]
    fn facade(&self) -> &InMemoryFacade {
        &self.facade
    }

    async fn tick(&self, snapshot: &AircraftParameterSnapshot) -> Result<(), CliError> {
        self.machine.predict(snapshot);
        self.orchestrator
            .orchestrate_services_async(self.machine.current_phase(), *snapshot, &self.cancellation)
            .await?;
        Ok(())
    }

    fn advance(
        &self,
        target: FlightPhase,
        snapshot: &AircraftParameterSnapshot,
    ) -> Result<(), CliError> {
        let phase = self.machine.current_phase();
        let outcome = self
            .machine
            .try_transition_with_conditions(target, snapshot, None);
        if outcome.is_accepted() {
            Ok(())
        } else {
            Err(CliError::Simulation {
                phase,
                target,
                reason: outcome.reason().to_string(),
            })
        }
    }

    fn departure_done(&self) -> bool {
        let fuel_done = matches!(
            self.fuel.state().sub_state,
            RefuelingSubState::Complete | RefuelingSubState::Idle
        );
        let done = fuel_done
            && self.passengers.is_boarding_complete()
            && self.cargo.state().current_percentage >= 100.0;
        if done {
            log_info!(self.logger, "Departure services finished");
        }
        done
    }
}

/// Initial values for every variable the coordinators read.
fn seed(facade: &InMemoryFacade) {
    facade.set("passengers.planned", PLANNED_PASSENGERS);
    facade.set("passengers.current", 0u32);
    facade.set("passengers.boarding", false);
    facade.set("passengers.deboarding", false);

    for door in DoorType::ALL {
        facade.set(door.variable(), false);
    }
    for item in GroundEquipment::ALL {
        facade.set(item.variable(), false);
    }

    facade.set("fuel.current", INITIAL_FUEL);
    facade.set("fuel.planned", PLANNED_FUEL);
    facade.set("fuel.target", 0.0);
    facade.set("fuel.transfer_rate", 0.0);
    facade.set("fuel.transfer_power", false);

    facade.set("cargo.planned", PLANNED_CARGO_KG);
    facade.set("cargo.percentage", 0.0);
    facade.set("cargo.loading", false);
    facade.set("cargo.unloading", false);
}
