//! The flight-phase state machine.

use std::cell::Cell;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, ReentrantMutex};
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::error::PersistenceError;
use super::hooks::{HookId, HookRegistry, PhaseHook};
use super::persistence::{write_atomically, PhaseStateDocument, TransitionEntry};
use super::rules;
use super::timeout::{TimeoutHandle, TimeoutRegistry};
use super::types::{
    AircraftParameterSnapshot, FlightPhase, PhaseEvent, PhasePrediction, PhaseTransitionRecord,
    TransitionOutcome,
};
use crate::events::{run_isolated, CallbackError, Subscribers, Subscription};
use crate::log::Logger;
use crate::worker::{run_cancellable, WorkerError};
use crate::{log_debug, log_info, log_warn};

/// Default period of the timeout scanner.
pub const DEFAULT_TIMEOUT_SCAN_INTERVAL: Duration = Duration::from_millis(100);

/// Construction options for [`PhaseStateMachine`].
#[derive(Debug, Clone)]
pub struct PhaseMachineOptions {
    /// How often pending timeouts are checked.
    pub timeout_scan_interval: Duration,
    /// Runtime used for the timeout scanner. When `None`, the runtime of the
    /// thread calling `set_timeout` is used, if there is one.
    pub runtime: Option<Handle>,
}

impl Default for PhaseMachineOptions {
    fn default() -> Self {
        Self {
            timeout_scan_interval: DEFAULT_TIMEOUT_SCAN_INTERVAL,
            runtime: None,
        }
    }
}

impl PhaseMachineOptions {
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.timeout_scan_interval = interval;
        self
    }

    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

struct PhaseState {
    current: FlightPhase,
    entered_at: DateTime<Utc>,
    entered_instant: Instant,
    /// Bumped on every phase change and restore; timeouts bind to it.
    epoch: u64,
    last_prediction: Option<PhasePrediction>,
    predicted_next: Option<FlightPhase>,
    last_updated: DateTime<Utc>,
}

impl PhaseState {
    fn initial() -> Self {
        let now = Utc::now();
        Self {
            current: FlightPhase::Preflight,
            entered_at: now,
            entered_instant: Instant::now(),
            epoch: 0,
            last_prediction: None,
            predicted_next: None,
            last_updated: now,
        }
    }
}

struct Inner {
    state: Mutex<PhaseState>,
    history: Mutex<Vec<PhaseTransitionRecord>>,
    hooks: HookRegistry,
    timeouts: TimeoutRegistry,
    /// Serializes transitions. Re-entrant so hooks may transition again; the
    /// cell counts how deeply the owning thread holds it.
    transition_lock: ReentrantMutex<Cell<usize>>,
    /// Events raised under `transition_lock`, delivered in order once the
    /// outermost holder releases it.
    queued: Mutex<VecDeque<PhaseEvent>>,
    events: Subscribers<PhaseEvent>,
    scanner_running: AtomicBool,
    scan_interval: Duration,
    runtime: Option<Handle>,
    logger: Arc<dyn Logger>,
}

impl Inner {
    fn current(&self) -> FlightPhase {
        self.state.lock().current
    }

    /// Run `f` under the transition lock, then deliver whatever it queued.
    ///
    /// Nested calls from hooks leave delivery to the outermost one, so
    /// subscribers see events in commit order and never under the lock.
    fn serialized<R>(&self, f: impl FnOnce(&Inner) -> R) -> R {
        let (result, outermost) = {
            let depth = self.transition_lock.lock();
            depth.set(depth.get() + 1);
            let result = f(self);
            depth.set(depth.get() - 1);
            (result, depth.get() == 0)
        };
        if outermost {
            self.deliver_queued();
        }
        result
    }

    fn queue(&self, event: PhaseEvent) {
        self.queued.lock().push_back(event);
    }

    fn deliver_queued(&self) {
        loop {
            let next = self.queued.lock().pop_front();
            let Some(event) = next else {
                return;
            };
            self.events.emit(&event);
        }
    }

    /// Commit a move to `target`. Caller holds `transition_lock`.
    fn transition_locked(&self, target: FlightPhase, reason: Option<&str>) -> bool {
        let (current, entered_instant) = {
            let state = self.state.lock();
            (state.current, state.entered_instant)
        };

        if target == current {
            log_debug!(self.logger, "Already in {}, transition ignored", current);
            return true;
        }
        if target != current.next() {
            log_warn!(
                self.logger,
                "Invalid phase transition from {} to {}",
                current,
                target
            );
            return false;
        }

        let now = Utc::now();
        let record = PhaseTransitionRecord {
            from: current,
            to: target,
            timestamp: now,
            duration_in_previous_phase: entered_instant.elapsed(),
            reason: reason.map(str::to_string),
        };
        self.history.lock().push(record.clone());

        self.hooks.run_exit(&record, self.logger.as_ref());
        {
            let mut state = self.state.lock();
            state.current = target;
            state.entered_at = now;
            state.entered_instant = Instant::now();
            state.epoch += 1;
            state.last_updated = now;
        }
        match &record.reason {
            Some(reason) => log_info!(
                self.logger,
                "Phase transition: {} -> {} ({})",
                record.from,
                record.to,
                reason
            ),
            None => log_info!(self.logger, "Phase transition: {} -> {}", record.from, record.to),
        }
        // Queued before the hooks below so a hook that transitions again is
        // delivered after this one.
        self.queue(PhaseEvent::Changed {
            previous: record.from,
            current: record.to,
            reason: record.reason.clone(),
        });
        self.hooks.run_transition(&record, self.logger.as_ref());
        self.hooks.run_entry(&record, self.logger.as_ref());
        true
    }

    /// Fire every due timeout still bound to the current phase.
    fn scan(&self) -> usize {
        let epoch = self.state.lock().epoch;
        let due = self.timeouts.take_due(epoch, Instant::now());
        let fired = due.len();

        for registration in due {
            let callback = registration.callback;
            run_isolated(
                self.logger.as_ref(),
                &format!("timeout callback for {}", registration.phase),
                || {
                    callback();
                    Ok(())
                },
            );
            log_info!(
                self.logger,
                "Phase timeout: {} after {:?}",
                registration.phase,
                registration.duration
            );
            self.events.emit(&PhaseEvent::Timeout {
                phase: registration.phase,
                entered_at: registration.entered_at,
                duration: registration.duration,
                expiry: registration.expiry_wall,
            });
        }
        fired
    }
}

/// Owns the current flight phase, its history, hooks, prediction and
/// phase-bound timeouts.
///
/// Cloning yields another handle onto the same machine.
///
/// # Transition order
///
/// An accepted transition appends a [`PhaseTransitionRecord`], then runs exit
/// hooks of the old phase, transition hooks of the pair, and entry hooks of the
/// new phase, in that order and synchronously. Only after every hook has run is
/// [`PhaseEvent::Changed`] delivered, with no lock held. When a hook moves the
/// machine again, subscribers see both changes in the order they happened.
#[derive(Clone)]
pub struct PhaseStateMachine {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PhaseStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseStateMachine")
            .field("current", &self.inner.current())
            .field("pending_timeouts", &self.inner.timeouts.pending_count())
            .finish()
    }
}

impl PhaseStateMachine {
    /// Create a machine in [`FlightPhase::Preflight`] with default options.
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self::with_options(logger, PhaseMachineOptions::default())
    }

    pub fn with_options(logger: Arc<dyn Logger>, options: PhaseMachineOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(PhaseState::initial()),
                history: Mutex::new(Vec::new()),
                hooks: HookRegistry::new(),
                timeouts: TimeoutRegistry::new(),
                transition_lock: ReentrantMutex::new(Cell::new(0)),
                queued: Mutex::new(VecDeque::new()),
                events: Subscribers::new("phase", Arc::clone(&logger)),
                scanner_running: AtomicBool::new(false),
                scan_interval: options.timeout_scan_interval,
                runtime: options.runtime,
                logger,
            }),
        }
    }

    pub fn current_phase(&self) -> FlightPhase {
        self.inner.current()
    }

    /// When the current phase was entered.
    pub fn entered_at(&self) -> DateTime<Utc> {
        self.inner.state.lock().entered_at
    }

    pub fn time_in_phase(&self) -> Duration {
        self.inner.state.lock().entered_instant.elapsed()
    }

    /// True iff `target` is the current phase or its sole successor.
    pub fn is_valid_transition(&self, target: FlightPhase) -> bool {
        let current = self.inner.current();
        target == current || target == current.next()
    }

    /// Move to `target`.
    ///
    /// Returns `true` when the move happened or `target` is already current
    /// (a no-op: no record, no hooks, no event). An illegal target is logged
    /// and returns `false` with nothing changed.
    pub fn try_transition(&self, target: FlightPhase, reason: Option<&str>) -> bool {
        self.inner.serialized(|inner| inner.transition_locked(target, reason))
    }

    /// Move to `target` only if the guarding precondition for the pair holds
    /// against `snapshot`.
    ///
    /// On success the history records `reason`, or the precondition's own
    /// reason when none is given.
    pub fn try_transition_with_conditions(
        &self,
        target: FlightPhase,
        snapshot: &AircraftParameterSnapshot,
        reason: Option<&str>,
    ) -> TransitionOutcome {
        self.inner.serialized(|inner| {
            let current = inner.current();

            if target == current {
                return TransitionOutcome::NoChange {
                    reason: format!("Already in {}", current),
                };
            }
            if target != current.next() {
                log_warn!(
                    inner.logger,
                    "Invalid phase transition from {} to {}",
                    current,
                    target
                );
                return TransitionOutcome::InvalidTransition {
                    reason: format!("Invalid transition from {} to {}", current, target),
                };
            }

            let check = rules::check_precondition(current, target, snapshot);
            if !check.passed {
                log_debug!(
                    inner.logger,
                    "Transition {} -> {} blocked: {}",
                    current,
                    target,
                    check.reason
                );
                return TransitionOutcome::PreconditionNotMet {
                    reason: check.reason.to_string(),
                };
            }

            inner.transition_locked(target, Some(reason.unwrap_or(check.reason)));
            TransitionOutcome::Accepted {
                reason: check.reason.to_string(),
            }
        })
    }

    /// [`Self::try_transition`] on the blocking pool.
    pub async fn try_transition_async(
        &self,
        target: FlightPhase,
        reason: Option<String>,
        cancellation: CancellationToken,
    ) -> Result<bool, WorkerError> {
        let machine = self.clone();
        run_cancellable(&cancellation, move || {
            machine.try_transition(target, reason.as_deref())
        })
        .await
    }

    /// Predict the next phase from `snapshot`.
    ///
    /// [`PhaseEvent::PredictionChanged`] is published only when the predicted
    /// phase differs from the last published one, or its confidence moved by
    /// more than [`rules::PREDICTION_CONFIDENCE_THRESHOLD`].
    pub fn predict(&self, snapshot: &AircraftParameterSnapshot) -> PhasePrediction {
        let current = self.inner.current();
        let prediction = rules::evaluate_prediction(current, snapshot);

        let published = {
            let mut state = self.inner.state.lock();
            if rules::is_material_change(state.last_prediction.as_ref(), &prediction) {
                let previous = state.last_prediction.map(|p| p.phase);
                state.last_prediction = Some(prediction);
                state.predicted_next = Some(prediction.phase);
                state.last_updated = Utc::now();
                Some(previous)
            } else {
                None
            }
        };

        if let Some(previous) = published {
            log_debug!(
                self.inner.logger,
                "Predicted next phase: {} ({:.2})",
                prediction.phase,
                prediction.confidence
            );
            self.inner.events.emit(&PhaseEvent::PredictionChanged {
                previous,
                predicted: prediction.phase,
                confidence: prediction.confidence,
            });
        }
        prediction
    }

    /// Last published prediction, if any since the last restore.
    pub fn last_prediction(&self) -> Option<PhasePrediction> {
        self.inner.state.lock().last_prediction
    }

    /// Predicted next phase, including one restored from a saved document.
    pub fn predicted_next_phase(&self) -> Option<FlightPhase> {
        self.inner.state.lock().predicted_next
    }

    /// Copy of the transition history, oldest first.
    pub fn transition_history(&self) -> Vec<PhaseTransitionRecord> {
        self.inner.history.lock().clone()
    }

    /// Run `callback` once after `duration`, but only if the machine has not
    /// left the current phase by then.
    ///
    /// Leaving and re-entering the same phase also invalidates the timeout.
    pub fn set_timeout<F>(&self, duration: Duration, callback: F) -> TimeoutHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let (phase, epoch, entered_at) = {
            let state = self.inner.state.lock();
            (state.current, state.epoch, state.entered_at)
        };
        let handle = self
            .inner
            .timeouts
            .register(phase, epoch, entered_at, duration, Box::new(callback));
        log_debug!(
            self.inner.logger,
            "Timeout #{} set for {} in {:?}",
            handle.id(),
            phase,
            duration
        );
        self.ensure_scanner();
        handle
    }

    /// Fire due timeouts now. Returns how many fired.
    ///
    /// The background scanner calls this on its own; a caller without a tokio
    /// runtime can call it from its poll loop instead.
    pub fn scan_timeouts(&self) -> usize {
        self.inner.scan()
    }

    /// Number of timeouts not yet fired, cancelled or discarded.
    pub fn pending_timeouts(&self) -> usize {
        self.inner.timeouts.pending_count()
    }

    fn ensure_scanner(&self) {
        let inner = &self.inner;
        if inner.scanner_running.swap(true, Ordering::SeqCst) {
            return;
        }
        let runtime = inner
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok());
        let Some(runtime) = runtime else {
            inner.scanner_running.store(false, Ordering::SeqCst);
            log_warn!(
                inner.logger,
                "No tokio runtime available; timeouts fire only on scan_timeouts()"
            );
            return;
        };
        runtime.spawn(run_scanner(Arc::downgrade(inner), inner.scan_interval));
    }

    pub fn register_entry_hook<F>(&self, phase: FlightPhase, hook: F) -> HookId
    where
        F: Fn(&PhaseTransitionRecord) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.inner.hooks.add_entry(phase, Arc::new(hook) as PhaseHook)
    }

    pub fn register_exit_hook<F>(&self, phase: FlightPhase, hook: F) -> HookId
    where
        F: Fn(&PhaseTransitionRecord) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.inner.hooks.add_exit(phase, Arc::new(hook) as PhaseHook)
    }

    pub fn register_transition_hook<F>(&self, from: FlightPhase, to: FlightPhase, hook: F) -> HookId
    where
        F: Fn(&PhaseTransitionRecord) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.inner
            .hooks
            .add_transition(from, to, Arc::new(hook) as PhaseHook)
    }

    pub fn unregister_entry_hook(&self, phase: FlightPhase, id: HookId) -> bool {
        self.inner.hooks.remove_entry(phase, id)
    }

    pub fn unregister_exit_hook(&self, phase: FlightPhase, id: HookId) -> bool {
        self.inner.hooks.remove_exit(phase, id)
    }

    pub fn unregister_transition_hook(&self, from: FlightPhase, to: FlightPhase, id: HookId) -> bool {
        self.inner.hooks.remove_transition(from, to, id)
    }

    /// Subscribe to [`PhaseEvent`]s until the token is unsubscribed.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PhaseEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(callback)
    }

    pub fn unsubscribe(&self, token: Subscription) -> bool {
        self.inner.events.unsubscribe(token)
    }

    /// Return to Preflight, dropping history, pending timeouts and prediction.
    ///
    /// No hooks run; subscribers see [`PhaseEvent::Restored`].
    pub fn reset(&self) {
        self.inner.serialized(|inner| {
            let epoch = inner.state.lock().epoch;
            let mut fresh = PhaseState::initial();
            fresh.epoch = epoch + 1;
            *inner.state.lock() = fresh;
            inner.history.lock().clear();
            inner.timeouts.clear();
            log_info!(inner.logger, "Phase state reset to {}", FlightPhase::Preflight);
            inner.queue(PhaseEvent::Restored {
                phase: FlightPhase::Preflight,
            });
        });
    }

    /// Write the current state as JSON.
    pub fn save<W: Write>(&self, writer: W) -> Result<(), PersistenceError> {
        self.document().write_to(writer)
    }

    /// Restore state written by [`Self::save`].
    ///
    /// This is a restore, not a lived transition: no hooks run and subscribers
    /// see [`PhaseEvent::Restored`]. Pending timeouts are invalidated. On any
    /// error the machine is left untouched.
    pub fn load<R: Read>(&self, reader: R) -> Result<FlightPhase, PersistenceError> {
        let parsed = PhaseStateDocument::read_from(reader)
            .and_then(|doc| doc.history().map(|history| (doc, history)));
        let (doc, history) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                log_warn!(self.inner.logger, "Phase state not restored: {}", e);
                return Err(e);
            }
        };

        let phase = doc.current_phase;
        self.inner.serialized(|inner| {
            let elapsed = (Utc::now() - doc.entered_at).to_std().unwrap_or_default();
            let mut state = inner.state.lock();
            state.current = phase;
            state.entered_at = doc.entered_at;
            state.entered_instant = Instant::now()
                .checked_sub(elapsed)
                .unwrap_or_else(Instant::now);
            state.epoch += 1;
            state.last_prediction = None;
            state.predicted_next = doc.predicted_next_phase;
            state.last_updated = doc.last_updated;
            drop(state);
            *inner.history.lock() = history;
            log_info!(inner.logger, "Phase state restored: {}", phase);
            inner.queue(PhaseEvent::Restored { phase });
        });
        Ok(phase)
    }

    /// [`Self::save`] to a file, replacing it atomically.
    pub fn save_to_path(&self, path: &Path) -> Result<(), PersistenceError> {
        let mut bytes = Vec::new();
        self.save(&mut bytes)?;
        write_atomically(path, &bytes)
    }

    /// [`Self::load`] from a file.
    pub fn load_from_path(&self, path: &Path) -> Result<FlightPhase, PersistenceError> {
        let file = std::fs::File::open(path)?;
        self.load(std::io::BufReader::new(file))
    }

    fn document(&self) -> PhaseStateDocument {
        let _guard = self.inner.transition_lock.lock();
        let history = self.inner.history.lock();
        let state = self.inner.state.lock();
        PhaseStateDocument {
            current_phase: state.current,
            entered_at: state.entered_at,
            transition_history: history.iter().map(TransitionEntry::from).collect(),
            predicted_next_phase: state.predicted_next,
            last_updated: state.last_updated,
        }
    }
}

/// Background scanner, alive only while timeouts are pending.
async fn run_scanner(inner: Weak<Inner>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(machine) = inner.upgrade() else {
            return;
        };
        machine.scan();
        if machine.timeouts.pending_count() > 0 {
            continue;
        }
        machine.scanner_running.store(false, Ordering::SeqCst);
        // A timeout registered between the count and the store saw the flag
        // still set and did not start a scanner; keep this one alive for it.
        if machine.timeouts.pending_count() > 0
            && !machine.scanner_running.swap(true, Ordering::SeqCst)
        {
            continue;
        }
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{LogLevel, NoOpLogger, RecordingLogger};
    use std::sync::atomic::AtomicUsize;

    fn machine() -> PhaseStateMachine {
        PhaseStateMachine::new(Arc::new(NoOpLogger))
    }

    fn recorded(machine: &PhaseStateMachine) -> Arc<Mutex<Vec<PhaseEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        machine.subscribe(move |e: &PhaseEvent| sink.lock().push(e.clone()));
        events
    }

    fn advance_to(machine: &PhaseStateMachine, target: FlightPhase) {
        while machine.current_phase() != target {
            let next = machine.current_phase().next();
            assert!(machine.try_transition(next, None));
        }
    }

    #[test]
    fn test_starts_in_preflight() {
        let m = machine();
        assert_eq!(m.current_phase(), FlightPhase::Preflight);
        assert!(m.transition_history().is_empty());
    }

    #[test]
    fn test_successor_is_accepted_and_recorded() {
        let m = machine();
        let events = recorded(&m);

        assert!(m.try_transition(FlightPhase::Departure, Some("boarding open")));

        assert_eq!(m.current_phase(), FlightPhase::Departure);
        let history = m.transition_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from, FlightPhase::Preflight);
        assert_eq!(history[0].reason.as_deref(), Some("boarding open"));
        assert_eq!(
            *events.lock(),
            vec![PhaseEvent::Changed {
                previous: FlightPhase::Preflight,
                current: FlightPhase::Departure,
                reason: Some("boarding open".to_string()),
            }]
        );
    }

    #[test]
    fn test_invalid_transition_logs_and_changes_nothing() {
        let logger = Arc::new(RecordingLogger::new());
        let m = PhaseStateMachine::new(logger.clone());
        let events = recorded(&m);

        assert!(!m.try_transition(FlightPhase::Flight, None));

        assert_eq!(m.current_phase(), FlightPhase::Preflight);
        assert!(m.transition_history().is_empty());
        assert!(events.lock().is_empty());
        assert!(logger.contains(LogLevel::Warn, "Invalid phase transition from Preflight to Flight"));
    }

    #[test]
    fn test_hooks_run_in_order_before_event() {
        let m = machine();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = Arc::clone(&order);
        m.register_entry_hook(FlightPhase::Departure, move |_| {
            o.lock().push("entry");
            Ok(())
        });
        let o = Arc::clone(&order);
        m.register_transition_hook(FlightPhase::Preflight, FlightPhase::Departure, move |_| {
            o.lock().push("transition");
            Ok(())
        });
        let o = Arc::clone(&order);
        m.register_exit_hook(FlightPhase::Preflight, move |_| {
            o.lock().push("exit");
            Ok(())
        });
        let o = Arc::clone(&order);
        m.subscribe(move |_: &PhaseEvent| o.lock().push("event"));

        m.try_transition(FlightPhase::Departure, None);

        assert_eq!(*order.lock(), vec!["exit", "transition", "entry", "event"]);
    }

    #[test]
    fn test_exit_hook_sees_old_phase_and_entry_hook_sees_new() {
        let m = machine();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let (probe, s) = (m.clone(), Arc::clone(&seen));
        m.register_exit_hook(FlightPhase::Preflight, move |_| {
            s.lock().push(probe.current_phase());
            Ok(())
        });
        let (probe, s) = (m.clone(), Arc::clone(&seen));
        m.register_entry_hook(FlightPhase::Departure, move |_| {
            s.lock().push(probe.current_phase());
            Ok(())
        });

        m.try_transition(FlightPhase::Departure, None);
        assert_eq!(*seen.lock(), vec![FlightPhase::Preflight, FlightPhase::Departure]);
    }

    #[test]
    fn test_failing_hook_does_not_block_transition() {
        let logger = Arc::new(RecordingLogger::new());
        let m = PhaseStateMachine::new(logger.clone());
        let entered = Arc::new(AtomicUsize::new(0));

        m.register_exit_hook(FlightPhase::Preflight, |_| Err("jetway jammed".into()));
        m.register_transition_hook(FlightPhase::Preflight, FlightPhase::Departure, |_| {
            panic!("transition hook panicked")
        });
        let e = Arc::clone(&entered);
        m.register_entry_hook(FlightPhase::Departure, move |_| {
            e.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(m.try_transition(FlightPhase::Departure, None));
        assert_eq!(entered.load(Ordering::SeqCst), 1);
        assert_eq!(logger.count_at(LogLevel::Error), 2);
    }

    #[test]
    fn test_unregistered_hook_does_not_run() {
        let m = machine();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let id = m.register_entry_hook(FlightPhase::Departure, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(m.unregister_entry_hook(FlightPhase::Departure, id));
        m.try_transition(FlightPhase::Departure, None);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_hook_may_transition_again() {
        let m = machine();
        let probe = m.clone();
        m.register_entry_hook(FlightPhase::Departure, move |_| {
            probe.try_transition(FlightPhase::TaxiOut, Some("immediate pushback"));
            Ok(())
        });

        let events = recorded(&m);

        assert!(m.try_transition(FlightPhase::Departure, None));
        assert_eq!(m.current_phase(), FlightPhase::TaxiOut);
        assert_eq!(m.transition_history().len(), 2);
        assert_eq!(
            *events.lock(),
            vec![
                PhaseEvent::Changed {
                    previous: FlightPhase::Preflight,
                    current: FlightPhase::Departure,
                    reason: None,
                },
                PhaseEvent::Changed {
                    previous: FlightPhase::Departure,
                    current: FlightPhase::TaxiOut,
                    reason: Some("immediate pushback".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_guarded_transition_notifies_after_releasing_lock() {
        let m = machine();
        let saved = Arc::new(AtomicBool::new(false));
        let (observer, s) = (m.clone(), Arc::clone(&saved));
        m.subscribe(move |event: &PhaseEvent| {
            if !matches!(event, PhaseEvent::Changed { .. }) {
                return;
            }
            let worker = observer.clone();
            let (tx, rx) = std::sync::mpsc::channel();
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = tx.send(worker.save(&mut buf).is_ok());
            });
            if rx.recv_timeout(Duration::from_millis(500)) == Ok(true) {
                s.store(true, Ordering::SeqCst);
            }
        });
        let snapshot = AircraftParameterSnapshot {
            flight_plan_loaded: true,
            ..AircraftParameterSnapshot::parked()
        };

        let outcome = m.try_transition_with_conditions(FlightPhase::Departure, &snapshot, None);

        assert!(matches!(outcome, TransitionOutcome::Accepted { .. }));
        assert!(saved.load(Ordering::SeqCst));
    }

    #[test]
    fn test_preflight_to_departure_with_flight_plan() {
        let m = machine();
        let snapshot = AircraftParameterSnapshot {
            flight_plan_loaded: true,
            ..AircraftParameterSnapshot::parked()
        };

        let prediction = m.predict(&snapshot);
        assert_eq!(prediction.phase, FlightPhase::Departure);
        assert!((prediction.confidence - 0.9).abs() < 1e-9);

        let outcome = m.try_transition_with_conditions(FlightPhase::Departure, &snapshot, None);
        assert_eq!(
            outcome,
            TransitionOutcome::Accepted {
                reason: "Flight plan loaded".to_string()
            }
        );
        assert_eq!(
            m.transition_history()[0].reason.as_deref(),
            Some("Flight plan loaded")
        );
    }

    #[test]
    fn test_departure_blocked_by_ground_equipment() {
        let m = machine();
        advance_to(&m, FlightPhase::Departure);
        let snapshot = AircraftParameterSnapshot {
            ground_equipment_connected: true,
            beacon_on: true,
            ..AircraftParameterSnapshot::parked()
        };

        let outcome = m.try_transition_with_conditions(FlightPhase::TaxiOut, &snapshot, None);

        assert_eq!(
            outcome,
            TransitionOutcome::PreconditionNotMet {
                reason: "Ground equipment still connected".to_string()
            }
        );
        assert_eq!(m.current_phase(), FlightPhase::Departure);
    }

    #[test]
    fn test_conditions_report_no_change_and_invalid() {
        let m = machine();
        let snapshot = AircraftParameterSnapshot::parked();

        assert_eq!(
            m.try_transition_with_conditions(FlightPhase::Preflight, &snapshot, None),
            TransitionOutcome::NoChange {
                reason: "Already in Preflight".to_string()
            }
        );
        assert_eq!(
            m.try_transition_with_conditions(FlightPhase::Arrival, &snapshot, None),
            TransitionOutcome::InvalidTransition {
                reason: "Invalid transition from Preflight to Arrival".to_string()
            }
        );
    }

    #[test]
    fn test_caller_reason_wins_over_precondition_reason() {
        let m = machine();
        let snapshot = AircraftParameterSnapshot {
            flight_plan_loaded: true,
            ..Default::default()
        };
        m.try_transition_with_conditions(FlightPhase::Departure, &snapshot, Some("dispatch release"));
        assert_eq!(
            m.transition_history()[0].reason.as_deref(),
            Some("dispatch release")
        );
    }

    #[test]
    fn test_prediction_republished_only_on_material_change() {
        let m = machine();
        let events = recorded(&m);
        let loaded = AircraftParameterSnapshot {
            flight_plan_loaded: true,
            ..AircraftParameterSnapshot::parked()
        };

        m.predict(&loaded);
        m.predict(&loaded);
        assert_eq!(events.lock().len(), 1);

        // (Departure, 0.9) -> (Departure, 0.95): same phase, small move.
        m.try_transition(FlightPhase::Departure, None);
        events.lock().clear();
        m.predict(&AircraftParameterSnapshot::parked());
        assert!(events.lock().is_empty());
        assert!((m.last_prediction().unwrap().confidence - 0.9).abs() < 1e-9);

        // Predicted phase changes.
        let ready = AircraftParameterSnapshot {
            beacon_on: true,
            on_ground: true,
            ..Default::default()
        };
        m.predict(&ready);
        assert_eq!(
            *events.lock(),
            vec![PhaseEvent::PredictionChanged {
                previous: Some(FlightPhase::Departure),
                predicted: FlightPhase::TaxiOut,
                confidence: 0.85,
            }]
        );
    }

    #[test]
    fn test_confidence_shift_above_threshold_republishes() {
        let m = machine();
        advance_to(&m, FlightPhase::TaxiOut);
        let events = recorded(&m);
        let taxiing = AircraftParameterSnapshot {
            on_ground: true,
            engines_running: true,
            ground_speed: 15.0,
            ..Default::default()
        };
        let holding = AircraftParameterSnapshot {
            on_ground: true,
            engines_running: true,
            ground_speed: 0.0,
            ..Default::default()
        };

        m.predict(&taxiing);
        m.predict(&holding);

        assert_eq!(events.lock().len(), 2);
    }

    #[test]
    fn test_reset_clears_everything() {
        let m = machine();
        let events = recorded(&m);
        advance_to(&m, FlightPhase::Flight);
        m.set_timeout(Duration::from_secs(60), || {});
        events.lock().clear();

        m.reset();

        assert_eq!(m.current_phase(), FlightPhase::Preflight);
        assert!(m.transition_history().is_empty());
        assert_eq!(m.pending_timeouts(), 0);
        assert!(m.last_prediction().is_none());
        assert_eq!(
            *events.lock(),
            vec![PhaseEvent::Restored {
                phase: FlightPhase::Preflight
            }]
        );
    }

    #[test]
    fn test_timeout_fires_when_phase_unchanged() {
        let m = machine();
        let events = recorded(&m);
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);

        m.set_timeout(Duration::ZERO, move || {
            f.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(m.scan_timeouts(), 1);
        assert_eq!(m.scan_timeouts(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(matches!(
            events.lock()[0],
            PhaseEvent::Timeout {
                phase: FlightPhase::Preflight,
                ..
            }
        ));
    }

    #[test]
    fn test_timeout_discarded_after_leaving_phase() {
        let m = machine();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        m.set_timeout(Duration::ZERO, move || {
            f.fetch_add(1, Ordering::SeqCst);
        });

        m.try_transition(FlightPhase::Departure, None);

        assert_eq!(m.scan_timeouts(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(m.pending_timeouts(), 0);
    }

    #[test]
    fn test_cancelled_timeout_never_fires() {
        let m = machine();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        let handle = m.set_timeout(Duration::ZERO, move || {
            f.fetch_add(1, Ordering::SeqCst);
        });

        handle.cancel();

        assert_eq!(m.scan_timeouts(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_huge_timeout_stays_pending() {
        let m = machine();
        let handle = m.set_timeout(Duration::MAX, || {});

        assert_eq!(m.scan_timeouts(), 0);
        assert_eq!(m.pending_timeouts(), 1);
        handle.cancel();
        assert_eq!(m.scan_timeouts(), 0);
        assert_eq!(m.pending_timeouts(), 0);
    }

    #[test]
    fn test_timeout_callback_may_transition() {
        let m = machine();
        let probe = m.clone();
        m.set_timeout(Duration::ZERO, move || {
            probe.try_transition(FlightPhase::Departure, Some("preflight timed out"));
        });

        m.scan_timeouts();
        assert_eq!(m.current_phase(), FlightPhase::Departure);
    }

    #[tokio::test]
    async fn test_background_scanner_fires_timeout() {
        let m = PhaseStateMachine::with_options(
            Arc::new(NoOpLogger),
            PhaseMachineOptions::default().with_scan_interval(Duration::from_millis(10)),
        );
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);

        m.set_timeout(Duration::from_millis(20), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..100 {
            if fired.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(m.pending_timeouts(), 0);
    }

    #[tokio::test]
    async fn test_background_scanner_drops_timeout_after_transition() {
        let m = PhaseStateMachine::with_options(
            Arc::new(NoOpLogger),
            PhaseMachineOptions::default().with_scan_interval(Duration::from_millis(10)),
        );
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);

        m.set_timeout(Duration::from_millis(50), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        m.try_transition(FlightPhase::Departure, None);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_async_transition_respects_cancellation() {
        let m = machine();
        let token = CancellationToken::new();

        let moved = m
            .try_transition_async(FlightPhase::Departure, None, token.clone())
            .await;
        assert_eq!(moved, Ok(true));

        token.cancel();
        let cancelled = m
            .try_transition_async(FlightPhase::TaxiOut, None, token)
            .await;
        assert_eq!(cancelled, Err(WorkerError::Cancelled));
        assert_eq!(m.current_phase(), FlightPhase::Departure);
    }

    #[test]
    fn test_save_load_round_trip_emits_restored_only() {
        let source = machine();
        advance_to(&source, FlightPhase::Flight);
        let mut buf = Vec::new();
        source.save(&mut buf).unwrap();

        let target = machine();
        let hook_runs = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hook_runs);
        target.register_entry_hook(FlightPhase::Flight, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let events = recorded(&target);

        let phase = target.load(buf.as_slice()).unwrap();

        assert_eq!(phase, FlightPhase::Flight);
        assert_eq!(target.current_phase(), FlightPhase::Flight);
        assert_eq!(
            target.transition_history().len(),
            source.transition_history().len()
        );
        assert_eq!(hook_runs.load(Ordering::SeqCst), 0);
        assert_eq!(
            *events.lock(),
            vec![PhaseEvent::Restored {
                phase: FlightPhase::Flight
            }]
        );
    }

    #[test]
    fn test_load_rejects_unknown_phase_and_keeps_state() {
        let logger = Arc::new(RecordingLogger::new());
        let m = PhaseStateMachine::new(logger.clone());
        m.try_transition(FlightPhase::Departure, None);
        let json = r#"{"currentPhase":"Holding","enteredAt":"2026-03-01T10:15:00Z",
            "transitionHistory":[],"predictedNextPhase":null,"lastUpdated":"2026-03-01T10:15:00Z"}"#;

        assert!(m.load(json.as_bytes()).is_err());

        assert_eq!(m.current_phase(), FlightPhase::Departure);
        assert_eq!(m.transition_history().len(), 1);
        assert!(logger.contains(LogLevel::Warn, "Phase state not restored"));
    }

    #[test]
    fn test_load_invalidates_pending_timeouts() {
        let source = machine();
        let mut buf = Vec::new();
        source.save(&mut buf).unwrap();

        let m = machine();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        m.set_timeout(Duration::ZERO, move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        m.load(buf.as_slice()).unwrap();

        assert_eq!(m.scan_timeouts(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_predicted_phase_survives_save_and_load() {
        let source = machine();
        source.predict(&AircraftParameterSnapshot {
            flight_plan_loaded: true,
            ..Default::default()
        });
        let mut buf = Vec::new();
        source.save(&mut buf).unwrap();

        let target = machine();
        target.load(buf.as_slice()).unwrap();

        assert_eq!(target.predicted_next_phase(), Some(FlightPhase::Departure));
        assert!(target.last_prediction().is_none());
    }

    #[test]
    fn test_save_to_path_and_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phase_state.json");
        let source = machine();
        advance_to(&source, FlightPhase::Arrival);

        source.save_to_path(&path).unwrap();
        let target = machine();

        assert_eq!(target.load_from_path(&path).unwrap(), FlightPhase::Arrival);
        assert_eq!(target.transition_history().len(), 5);
    }
}
