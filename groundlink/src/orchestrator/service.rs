//! The service orchestrator.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::callbacks::{CallbackId, ServiceCallbacks};
use super::{ServicePrediction, ServiceType};
use crate::coordinator::{OrchestratorLink, ServiceCoordinator, ServiceDomain};
use crate::events::{run_isolated, CallbackError};
use crate::facade::GroundServiceDataFacade;
use crate::log::Logger;
use crate::phase::{rules, AircraftParameterSnapshot, FlightPhase, PhaseStateMachine};
use crate::worker::{run_cancellable, WorkerError};
use crate::{log_debug, log_error, log_info, log_warn};

/// Aggregates the coordinators and dispatches automated services per phase.
///
/// # Construction
///
/// Coordinators need a back-reference to the orchestrator and the orchestrator
/// owns the coordinators, so construction has two steps:
///
/// ```ignore
/// let orchestrator = ServiceOrchestrator::new(machine, ground, coordinators, logger);
/// orchestrator.wire();
/// ```
///
/// Until `wire` runs, coordinators log and skip forwarding planned values.
pub struct ServiceOrchestrator {
    /// Phase machine consulted by [`Self::tick`].
    machine: PhaseStateMachine,

    /// Automation surface of the ground-services simulation.
    ground: Arc<dyn GroundServiceDataFacade>,

    /// Domain coordinators, driven in registration order.
    coordinators: Vec<Arc<dyn ServiceCoordinator>>,

    /// Services requested and not yet cancelled.
    requested: Mutex<HashSet<ServiceType>>,

    /// Planned values forwarded by coordinators.
    planned: Mutex<HashMap<ServiceDomain, f64>>,

    /// Phase of the previous orchestration pass.
    last_phase: Mutex<Option<FlightPhase>>,

    pre_service: ServiceCallbacks,
    post_service: ServiceCallbacks,
    logger: Arc<dyn Logger>,
}

impl ServiceOrchestrator {
    pub fn new(
        machine: PhaseStateMachine,
        ground: Arc<dyn GroundServiceDataFacade>,
        coordinators: Vec<Arc<dyn ServiceCoordinator>>,
        logger: Arc<dyn Logger>,
    ) -> Arc<Self> {
        Arc::new(Self {
            machine,
            ground,
            coordinators,
            requested: Mutex::new(HashSet::new()),
            planned: Mutex::new(HashMap::new()),
            last_phase: Mutex::new(None),
            pre_service: ServiceCallbacks::new("pre-service"),
            post_service: ServiceCallbacks::new("post-service"),
            logger,
        })
    }

    /// Hand every coordinator a weak back-reference to this orchestrator.
    pub fn wire(self: &Arc<Self>) {
        let link: Arc<dyn OrchestratorLink> = self.clone();
        for coordinator in &self.coordinators {
            coordinator.attach_orchestrator(Arc::downgrade(&link));
        }
        log_debug!(
            self.logger,
            "Orchestrator wired to {} coordinator(s)",
            self.coordinators.len()
        );
    }

    pub fn machine(&self) -> &PhaseStateMachine {
        &self.machine
    }

    pub fn coordinators(&self) -> &[Arc<dyn ServiceCoordinator>] {
        &self.coordinators
    }

    /// Coordinator for `domain`, if one is registered.
    pub fn coordinator(&self, domain: ServiceDomain) -> Option<Arc<dyn ServiceCoordinator>> {
        self.coordinators
            .iter()
            .find(|c| c.domain() == domain)
            .cloned()
    }

    /// One poll tick: refresh the phase prediction, then orchestrate for the
    /// machine's current phase.
    pub fn tick(&self, snapshot: &AircraftParameterSnapshot) {
        self.machine.predict(snapshot);
        self.orchestrate_services(self.machine.current_phase(), snapshot);
    }

    /// Run one orchestration pass for `phase`.
    ///
    /// Every coordinator applies its phase behaviour; a coordinator that
    /// panics is logged and the pass continues. Services belonging to the
    /// previous phase that `phase` does not dispatch are cancelled, then the
    /// services `phase` dispatches are requested once the aircraft is parked.
    pub fn orchestrate_services(&self, phase: FlightPhase, snapshot: &AircraftParameterSnapshot) {
        for coordinator in &self.coordinators {
            let label = format!("{} coordinator for {}", coordinator.domain(), phase);
            run_isolated(self.logger.as_ref(), &label, || {
                coordinator.manage_for_phase(phase);
                Ok(())
            });
        }

        let previous = self.last_phase.lock().replace(phase);
        if let Some(previous) = previous.filter(|p| *p != phase) {
            log_debug!(self.logger, "Orchestrating {} after {}", phase, previous);
            let keep = ServiceType::for_phase(phase);
            for service in ServiceType::for_phase(previous) {
                if !keep.contains(service) && self.is_requested(*service) {
                    self.cancel(*service);
                }
            }
        }

        if !(snapshot.on_ground && snapshot.parking_brake_set) {
            return;
        }
        for service in ServiceType::for_phase(phase) {
            if !self.is_requested(*service) {
                self.request_in(*service, phase);
            }
        }
    }

    /// [`Self::orchestrate_services`] on the blocking pool.
    pub async fn orchestrate_services_async(
        self: &Arc<Self>,
        phase: FlightPhase,
        snapshot: AircraftParameterSnapshot,
        cancellation: &CancellationToken,
    ) -> Result<(), WorkerError> {
        let orchestrator = Arc::clone(self);
        run_cancellable(cancellation, move || {
            orchestrator.orchestrate_services(phase, &snapshot)
        })
        .await
    }

    /// Request `service`. A second request without a cancel in between is a
    /// no-op returning `false`.
    pub fn request(&self, service: ServiceType) -> bool {
        self.request_in(service, self.machine.current_phase())
    }

    /// Request `service` on behalf of `phase`, which callbacks receive.
    fn request_in(&self, service: ServiceType, phase: FlightPhase) -> bool {
        if !self.requested.lock().insert(service) {
            log_debug!(self.logger, "Service {} already requested", service);
            return false;
        }

        self.pre_service.run(service, phase, self.logger.as_ref());
        match self.ground.trigger_service(service) {
            Ok(()) => {
                log_info!(self.logger, "Requested {} ({})", service, phase);
                self.post_service.run(service, phase, self.logger.as_ref());
                true
            }
            Err(e) => {
                self.requested.lock().remove(&service);
                log_error!(self.logger, "Request for {} failed: {}", service, e);
                false
            }
        }
    }

    /// Cancel `service`. Cancelling something not requested returns `false`.
    pub fn cancel(&self, service: ServiceType) -> bool {
        if !self.requested.lock().remove(&service) {
            log_debug!(self.logger, "Service {} not requested", service);
            return false;
        }
        match self.ground.cancel_service(service) {
            Ok(()) => {
                log_info!(self.logger, "Cancelled {}", service);
                true
            }
            Err(e) => {
                self.requested.lock().insert(service);
                log_error!(self.logger, "Cancel of {} failed: {}", service, e);
                false
            }
        }
    }

    pub fn is_requested(&self, service: ServiceType) -> bool {
        self.requested.lock().contains(&service)
    }

    /// Requested services in [`ServiceType`] order.
    pub fn requested_services(&self) -> Vec<ServiceType> {
        let mut services: Vec<ServiceType> = self.requested.lock().iter().copied().collect();
        services.sort();
        services
    }

    /// Last planned value forwarded by the coordinator for `domain`.
    pub fn planned_value(&self, domain: ServiceDomain) -> Option<f64> {
        self.planned.lock().get(&domain).copied()
    }

    /// Services expected in the phase predicted from `phase` and `snapshot`.
    ///
    /// Pure: nothing is requested and no state is touched. Empty when the
    /// prediction stays in `phase`.
    pub fn predict_services(
        &self,
        phase: FlightPhase,
        snapshot: &AircraftParameterSnapshot,
    ) -> Vec<ServicePrediction> {
        let prediction = rules::evaluate_prediction(phase, snapshot);
        if prediction.phase == phase {
            return Vec::new();
        }
        ServiceType::for_phase(prediction.phase)
            .iter()
            .map(|service| ServicePrediction {
                phase: prediction.phase,
                service: *service,
                confidence: prediction.confidence,
            })
            .collect()
    }

    pub fn register_pre_service_callback<F>(&self, service: ServiceType, callback: F) -> CallbackId
    where
        F: Fn(ServiceType, FlightPhase) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.pre_service.add(service, Arc::new(callback))
    }

    pub fn register_post_service_callback<F>(&self, service: ServiceType, callback: F) -> CallbackId
    where
        F: Fn(ServiceType, FlightPhase) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.post_service.add(service, Arc::new(callback))
    }

    pub fn unregister_pre_service_callback(&self, service: ServiceType, id: CallbackId) -> bool {
        self.pre_service.remove(service, id)
    }

    pub fn unregister_post_service_callback(&self, service: ServiceType, id: CallbackId) -> bool {
        self.post_service.remove(service, id)
    }
}

impl OrchestratorLink for ServiceOrchestrator {
    fn update_planned(&self, domain: ServiceDomain, value: f64) {
        let previous = self.planned.lock().insert(domain, value);
        if previous != Some(value) {
            log_debug!(self.logger, "Planned {} updated to {}", domain, value);
        }
        if value < 0.0 {
            log_warn!(self.logger, "Negative planned {} value {}", domain, value);
        }
    }
}
