//! In-memory facade used by tests and the CLI simulation.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use super::{
    AircraftDataFacade, DataAccessError, DataValue, GroundServiceDataFacade, VariableAccess,
};
use crate::orchestrator::ServiceType;

/// A call made against the ground-service automation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCall {
    Trigger(ServiceType),
    Cancel(ServiceType),
}

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<String, DataValue>,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
    failing_services: HashSet<ServiceType>,
    service_calls: Vec<ServiceCall>,
    write_count: usize,
}

/// Variable store implementing both facade traits.
///
/// Reads of unknown names fail with [`DataAccessError::NotFound`], matching a
/// real simulator connection. Individual variables and services can be made
/// to fail on demand.
#[derive(Debug, Default)]
pub struct InMemoryFacade {
    inner: Mutex<Inner>,
}

impl InMemoryFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a variable without counting it as a write.
    pub fn set(&self, name: &str, value: impl Into<DataValue>) {
        self.inner.lock().values.insert(name.to_string(), value.into());
    }

    /// Current raw value, if any.
    pub fn get(&self, name: &str) -> Option<DataValue> {
        self.inner.lock().values.get(name).cloned()
    }

    /// Current numeric value, if the variable holds a number.
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(DataValue::Number(n)) => Some(n),
            _ => None,
        }
    }

    /// Current flag value, if the variable holds a bool.
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(DataValue::Bool(b)) => Some(b),
            _ => None,
        }
    }

    pub fn fail_reads_of(&self, name: &str) {
        self.inner.lock().failing_reads.insert(name.to_string());
    }

    pub fn fail_writes_to(&self, name: &str) {
        self.inner.lock().failing_writes.insert(name.to_string());
    }

    pub fn fail_service(&self, service: ServiceType) {
        self.inner.lock().failing_services.insert(service);
    }

    /// Clear every injected failure.
    pub fn heal(&self) {
        let mut inner = self.inner.lock();
        inner.failing_reads.clear();
        inner.failing_writes.clear();
        inner.failing_services.clear();
    }

    /// Every trigger/cancel call in order.
    pub fn service_calls(&self) -> Vec<ServiceCall> {
        self.inner.lock().service_calls.clone()
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.inner.lock().write_count
    }
}

impl VariableAccess for InMemoryFacade {
    fn read_value(&self, name: &str) -> Result<DataValue, DataAccessError> {
        let inner = self.inner.lock();
        if inner.failing_reads.contains(name) {
            return Err(DataAccessError::ReadFailed {
                name: name.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        inner
            .values
            .get(name)
            .cloned()
            .ok_or_else(|| DataAccessError::NotFound(name.to_string()))
    }

    fn write_value(&self, name: &str, value: DataValue) -> Result<(), DataAccessError> {
        let mut inner = self.inner.lock();
        if inner.failing_writes.contains(name) {
            return Err(DataAccessError::WriteFailed {
                name: name.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        inner.values.insert(name.to_string(), value);
        inner.write_count += 1;
        Ok(())
    }
}

impl AircraftDataFacade for InMemoryFacade {}

impl GroundServiceDataFacade for InMemoryFacade {
    fn trigger_service(&self, service: ServiceType) -> Result<(), DataAccessError> {
        let mut inner = self.inner.lock();
        if inner.failing_services.contains(&service) {
            return Err(DataAccessError::Unavailable(format!(
                "{} automation not responding",
                service
            )));
        }
        inner.service_calls.push(ServiceCall::Trigger(service));
        Ok(())
    }

    fn cancel_service(&self, service: ServiceType) -> Result<(), DataAccessError> {
        let mut inner = self.inner.lock();
        if inner.failing_services.contains(&service) {
            return Err(DataAccessError::Unavailable(format!(
                "{} automation not responding",
                service
            )));
        }
        inner.service_calls.push(ServiceCall::Cancel(service));
        Ok(())
    }
}
