//! Pre- and post-service callback registries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::ServiceType;
use crate::events::{run_isolated, CallbackError};
use crate::log::Logger;
use crate::phase::FlightPhase;

/// Callback run around a dispatched service request.
pub type ServiceCallback =
    Arc<dyn Fn(ServiceType, FlightPhase) -> Result<(), CallbackError> + Send + Sync>;

/// Handle for removing a registered service callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

pub(crate) struct ServiceCallbacks {
    label: &'static str,
    next_id: AtomicU64,
    callbacks: Mutex<HashMap<ServiceType, Vec<(CallbackId, ServiceCallback)>>>,
}

impl ServiceCallbacks {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            next_id: AtomicU64::new(1),
            callbacks: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn add(&self, service: ServiceType, callback: ServiceCallback) -> CallbackId {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks
            .lock()
            .entry(service)
            .or_default()
            .push((id, callback));
        id
    }

    pub(crate) fn remove(&self, service: ServiceType, id: CallbackId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let Some(list) = callbacks.get_mut(&service) else {
            return false;
        };
        let before = list.len();
        list.retain(|(c, _)| *c != id);
        list.len() != before
    }

    /// Run every callback for `service`, isolated from each other.
    pub(crate) fn run(&self, service: ServiceType, phase: FlightPhase, logger: &dyn Logger) {
        let snapshot = self
            .callbacks
            .lock()
            .get(&service)
            .cloned()
            .unwrap_or_default();
        for (id, callback) in snapshot {
            let label = format!("{} callback #{} for {}", self.label, id.0, service);
            run_isolated(logger, &label, || callback(service, phase));
        }
    }
}
