//! Explicit event fan-out with per-subscriber isolation.
//!
//! Every notification stream in the crate (phase events, per-domain state
//! changes) is a [`Subscribers`] list. Delivery takes a snapshot of the
//! registered callbacks under the lock, releases it, then calls each callback
//! inside its own panic guard. A subscriber that panics is logged and skipped;
//! the remaining subscribers still receive the event.
//!
//! Lifetimes are explicit: `subscribe` hands back a [`Subscription`] token and
//! the subscriber stays registered until that token is passed to
//! `unsubscribe`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::log::Logger;
use crate::log_error;

/// Token identifying a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subscription(u64);

impl Subscription {
    /// Raw identifier, mostly useful in log output.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Callback stored by a [`Subscribers`] list.
pub type EventCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A list of subscribers for events of type `T`.
pub struct Subscribers<T> {
    /// Stream name, used when logging a failing subscriber.
    name: &'static str,
    next_id: AtomicU64,
    entries: Mutex<Vec<(Subscription, EventCallback<T>)>>,
    logger: Arc<dyn Logger>,
}

impl<T> Subscribers<T> {
    pub fn new(name: &'static str, logger: Arc<dyn Logger>) -> Self {
        Self {
            name,
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
            logger,
        }
    }

    /// Register a callback. It stays registered until [`Self::unsubscribe`].
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let token = Subscription(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((token, Arc::new(callback)));
        token
    }

    /// Remove a subscriber. Returns `false` if the token was not registered.
    pub fn unsubscribe(&self, token: Subscription) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(t, _)| *t != token);
        entries.len() != before
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Deliver `event` to every subscriber registered at call time.
    ///
    /// Must not be called while holding any lock a subscriber might take.
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<(Subscription, EventCallback<T>)> = self.entries.lock().clone();
        for (token, callback) in snapshot {
            let label = format!("{} subscriber #{}", self.name, token.id());
            run_isolated(self.logger.as_ref(), &label, || {
                callback(event);
                Ok(())
            });
        }
    }
}

/// Boxed error returned by hooks and callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Run `f`, logging (never propagating) an error result or a panic.
///
/// Returns `true` if `f` completed successfully.
pub(crate) fn run_isolated<F>(logger: &dyn Logger, label: &str, f: F) -> bool
where
    F: FnOnce() -> Result<(), CallbackError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log_error!(logger, "{} failed: {}", label, e);
            false
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log_error!(logger, "{} panicked: {}", label, message);
            false
        }
    }
}
