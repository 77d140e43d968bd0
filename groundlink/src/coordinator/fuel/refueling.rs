//! Refueling sub-workflow.
//!
//! ```text
//! Idle       -> Requested | Defueling
//! Requested  -> Refueling | Idle | Error
//! Refueling  -> Complete  | Idle | Error
//! Defueling  -> Idle      | Error
//! Complete   -> Idle
//! Error      -> Idle
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::{Subscribers, Subscription};
use crate::log::Logger;
use crate::{log_debug, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RefuelingSubState {
    #[default]
    Idle,
    Requested,
    Refueling,
    Defueling,
    Complete,
    Error,
}

impl RefuelingSubState {
    /// Whether the table above allows `self -> next`.
    pub fn can_transition_to(&self, next: RefuelingSubState) -> bool {
        use RefuelingSubState::*;
        matches!(
            (self, next),
            (Idle, Requested)
                | (Idle, Defueling)
                | (Requested, Refueling)
                | (Requested, Idle)
                | (Requested, Error)
                | (Refueling, Complete)
                | (Refueling, Idle)
                | (Refueling, Error)
                | (Defueling, Idle)
                | (Defueling, Error)
                | (Complete, Idle)
                | (Error, Idle)
        )
    }
}

impl std::fmt::Display for RefuelingSubState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RefuelingSubState::Idle => "Idle",
            RefuelingSubState::Requested => "Requested",
            RefuelingSubState::Refueling => "Refueling",
            RefuelingSubState::Defueling => "Defueling",
            RefuelingSubState::Complete => "Complete",
            RefuelingSubState::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Accepted sub-state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefuelingStateChange {
    pub new: RefuelingSubState,
    pub old: RefuelingSubState,
}

/// Holds the refueling sub-state and enforces its transition table.
pub struct RefuelingStateManager {
    state: Mutex<RefuelingSubState>,
    events: Subscribers<RefuelingStateChange>,
    logger: Arc<dyn Logger>,
}

impl RefuelingStateManager {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            state: Mutex::new(RefuelingSubState::Idle),
            events: Subscribers::new("refueling", Arc::clone(&logger)),
            logger,
        }
    }

    pub fn state(&self) -> RefuelingSubState {
        *self.state.lock()
    }

    /// Move to `next` if the table allows it.
    ///
    /// Rejected moves are logged and leave the state unchanged.
    pub fn transition_to(&self, next: RefuelingSubState) -> bool {
        match self.commit(next) {
            Some(change) => {
                self.publish(&change);
                true
            }
            None => false,
        }
    }

    /// Apply `next` without notifying subscribers; the caller publishes the
    /// returned change once it holds no lock.
    pub(crate) fn commit(&self, next: RefuelingSubState) -> Option<RefuelingStateChange> {
        let mut state = self.state.lock();
        let old = *state;
        if !old.can_transition_to(next) {
            log_warn!(
                self.logger,
                "Invalid refueling transition from {} to {}",
                old,
                next
            );
            return None;
        }
        *state = next;
        log_debug!(self.logger, "Refueling state: {} -> {}", old, next);
        Some(RefuelingStateChange { new: next, old })
    }

    pub(crate) fn publish(&self, change: &RefuelingStateChange) {
        self.events.emit(change);
    }

    /// Whether current fuel may be overwritten without clobbering a transfer.
    pub fn allows_direct_overwrite(&self) -> bool {
        !matches!(
            self.state(),
            RefuelingSubState::Requested | RefuelingSubState::Refueling
        )
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RefuelingStateChange) + Send + Sync + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&self, token: Subscription) -> bool {
        self.events.unsubscribe(token)
    }
}
