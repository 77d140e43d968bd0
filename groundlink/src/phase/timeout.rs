//! Phase-bound timeouts.
//!
//! A timeout is registered against the phase active at registration time
//! (tracked by a transition epoch, so leaving and re-entering the same phase
//! still invalidates it). A scan removes due registrations under the lock and
//! hands them back for the caller to fire with the lock released.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::types::FlightPhase;

/// Callback fired at most once when a timeout elapses.
pub type TimeoutCallback = Box<dyn FnOnce() + Send>;

/// Cancellation handle for a registered timeout.
#[derive(Debug, Clone)]
pub struct TimeoutHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl TimeoutHandle {
    /// Prevent the timeout from firing. Has no effect once it has fired.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A pending timeout.
pub(crate) struct TimeoutRegistration {
    pub(crate) phase: FlightPhase,
    epoch: u64,
    pub(crate) entered_at: DateTime<Utc>,
    pub(crate) duration: Duration,
    /// `None` when the duration is too large to represent; such a timeout
    /// never comes due.
    expiry: Option<Instant>,
    pub(crate) expiry_wall: DateTime<Utc>,
    pub(crate) callback: TimeoutCallback,
    cancelled: Arc<AtomicBool>,
}

/// Pending timeouts of one phase state machine.
pub(crate) struct TimeoutRegistry {
    next_id: AtomicU64,
    pending: Mutex<Vec<(u64, TimeoutRegistration)>>,
}

impl TimeoutRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn register(
        &self,
        phase: FlightPhase,
        epoch: u64,
        entered_at: DateTime<Utc>,
        duration: Duration,
        callback: TimeoutCallback,
    ) -> TimeoutHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));
        let expiry_wall = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let registration = TimeoutRegistration {
            phase,
            epoch,
            entered_at,
            duration,
            expiry: Instant::now().checked_add(duration),
            expiry_wall,
            callback,
            cancelled: Arc::clone(&cancelled),
        };
        self.pending.lock().push((id, registration));
        TimeoutHandle { id, cancelled }
    }

    /// Remove and return registrations that are due in `epoch`.
    ///
    /// Registrations from an older epoch, and cancelled ones, are dropped
    /// without being returned.
    pub(crate) fn take_due(&self, epoch: u64, now: Instant) -> Vec<TimeoutRegistration> {
        let mut pending = self.pending.lock();
        let mut due = Vec::new();
        let mut keep = Vec::with_capacity(pending.len());
        for (id, reg) in pending.drain(..) {
            if reg.epoch != epoch || reg.cancelled.load(Ordering::SeqCst) {
                continue;
            }
            if reg.expiry.is_some_and(|expiry| expiry <= now) {
                due.push(reg);
            } else {
                keep.push((id, reg));
            }
        }
        *pending = keep;
        due
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub(crate) fn clear(&self) {
        self.pending.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> TimeoutCallback {
        Box::new(|| {})
    }

    #[test]
    fn test_due_registration_is_taken_once() {
        let registry = TimeoutRegistry::new();
        registry.register(FlightPhase::Departure, 1, Utc::now(), Duration::ZERO, noop());

        let due = registry.take_due(1, Instant::now());
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].phase, FlightPhase::Departure);
        assert!(registry.take_due(1, Instant::now()).is_empty());
    }

    #[test]
    fn test_not_yet_due_is_kept() {
        let registry = TimeoutRegistry::new();
        registry.register(
            FlightPhase::Departure,
            1,
            Utc::now(),
            Duration::from_secs(60),
            noop(),
        );

        assert!(registry.take_due(1, Instant::now()).is_empty());
        assert_eq!(registry.pending_count(), 1);
    }

    #[test]
    fn test_unrepresentable_duration_never_comes_due() {
        let registry = TimeoutRegistry::new();
        registry.register(FlightPhase::Flight, 1, Utc::now(), Duration::MAX, noop());

        assert!(registry.take_due(1, Instant::now()).is_empty());
        assert_eq!(registry.pending_count(), 1);
    }

    #[test]
    fn test_stale_epoch_is_discarded() {
        let registry = TimeoutRegistry::new();
        registry.register(FlightPhase::Departure, 1, Utc::now(), Duration::ZERO, noop());

        assert!(registry.take_due(2, Instant::now()).is_empty());
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_cancelled_is_discarded() {
        let registry = TimeoutRegistry::new();
        let handle = registry.register(FlightPhase::Flight, 3, Utc::now(), Duration::ZERO, noop());
        handle.cancel();

        assert!(handle.is_cancelled());
        assert!(registry.take_due(3, Instant::now()).is_empty());
        assert_eq!(registry.pending_count(), 0);
    }
}
