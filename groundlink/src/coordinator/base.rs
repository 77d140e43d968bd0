//! Plumbing shared by every coordinator.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::{DomainStateChanged, OrchestratorLink, ServiceDomain};
use crate::events::{EventCallback, Subscribers, Subscription};
use crate::facade::{DataValue, TypedRead, VariableAccess};
use crate::log::Logger;
use crate::{log_debug, log_error, log_warn};

/// Facade handle, event stream and late-bound orchestrator link.
pub(super) struct CoordinatorBase<F: ?Sized> {
    domain: ServiceDomain,
    pub(super) facade: Arc<F>,
    orchestrator: Mutex<Option<Weak<dyn OrchestratorLink>>>,
    events: Subscribers<DomainStateChanged>,
    pub(super) logger: Arc<dyn Logger>,
}

impl<F: VariableAccess + ?Sized> CoordinatorBase<F> {
    pub(super) fn new(
        domain: ServiceDomain,
        stream: &'static str,
        facade: Arc<F>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            domain,
            facade,
            orchestrator: Mutex::new(None),
            events: Subscribers::new(stream, Arc::clone(&logger)),
            logger,
        }
    }

    /// Write a variable, logging a failure. Returns whether it succeeded.
    pub(super) fn write(&self, name: &str, value: impl Into<DataValue>) -> bool {
        match self.facade.write(name, value) {
            Ok(()) => true,
            Err(e) => {
                log_error!(self.logger, "{} coordinator: {}", self.domain, e);
                false
            }
        }
    }

    pub(super) fn attach(&self, link: Weak<dyn OrchestratorLink>) {
        *self.orchestrator.lock() = Some(link);
        log_debug!(self.logger, "{} coordinator attached to orchestrator", self.domain);
    }

    /// Hand `planned` to the orchestrator, or warn and skip if none is attached.
    pub(super) fn forward_planned(&self, planned: f64) {
        let link = self.orchestrator.lock().as_ref().and_then(Weak::upgrade);
        match link {
            Some(link) => link.update_planned(self.domain, planned),
            None => log_warn!(
                self.logger,
                "{} coordinator has no orchestrator; planned value {} not forwarded",
                self.domain,
                planned
            ),
        }
    }

    pub(super) fn subscribe(&self, callback: EventCallback<DomainStateChanged>) -> Subscription {
        self.events.subscribe(move |event: &DomainStateChanged| callback(event))
    }

    pub(super) fn unsubscribe(&self, token: Subscription) -> bool {
        self.events.unsubscribe(token)
    }

    /// Deliver a state-changed event. Call with no coordinator lock held.
    pub(super) fn notify(&self, event: DomainStateChanged) {
        self.events.emit(&event);
    }
}
