//! Entry, exit and transition hook registries.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::types::{FlightPhase, PhaseTransitionRecord};
use crate::events::{run_isolated, CallbackError};
use crate::log::Logger;

/// Callback run synchronously inside an accepted transition.
pub type PhaseHook = Arc<dyn Fn(&PhaseTransitionRecord) -> Result<(), CallbackError> + Send + Sync>;

/// Handle returned when registering a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

struct HookTable<K> {
    hooks: Mutex<HashMap<K, Vec<(HookId, PhaseHook)>>>,
}

impl<K: Eq + Hash + Copy> HookTable<K> {
    fn new() -> Self {
        Self {
            hooks: Mutex::new(HashMap::new()),
        }
    }

    fn insert(&self, key: K, id: HookId, hook: PhaseHook) {
        self.hooks.lock().entry(key).or_default().push((id, hook));
    }

    fn remove(&self, key: K, id: HookId) -> bool {
        let mut hooks = self.hooks.lock();
        let Some(list) = hooks.get_mut(&key) else {
            return false;
        };
        let before = list.len();
        list.retain(|(h, _)| *h != id);
        let removed = list.len() != before;
        if list.is_empty() {
            hooks.remove(&key);
        }
        removed
    }

    /// Copy of the hooks for `key`, so they can run without the lock held.
    fn snapshot(&self, key: K) -> Vec<(HookId, PhaseHook)> {
        self.hooks.lock().get(&key).cloned().unwrap_or_default()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.hooks.lock().values().map(Vec::len).sum()
    }
}

/// All hooks registered on a phase state machine.
pub(crate) struct HookRegistry {
    next_id: AtomicU64,
    entry: HookTable<FlightPhase>,
    exit: HookTable<FlightPhase>,
    transition: HookTable<(FlightPhase, FlightPhase)>,
}

impl HookRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entry: HookTable::new(),
            exit: HookTable::new(),
            transition: HookTable::new(),
        }
    }

    fn next_id(&self) -> HookId {
        HookId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn add_entry(&self, phase: FlightPhase, hook: PhaseHook) -> HookId {
        let id = self.next_id();
        self.entry.insert(phase, id, hook);
        id
    }

    pub(crate) fn add_exit(&self, phase: FlightPhase, hook: PhaseHook) -> HookId {
        let id = self.next_id();
        self.exit.insert(phase, id, hook);
        id
    }

    pub(crate) fn add_transition(
        &self,
        from: FlightPhase,
        to: FlightPhase,
        hook: PhaseHook,
    ) -> HookId {
        let id = self.next_id();
        self.transition.insert((from, to), id, hook);
        id
    }

    pub(crate) fn remove_entry(&self, phase: FlightPhase, id: HookId) -> bool {
        self.entry.remove(phase, id)
    }

    pub(crate) fn remove_exit(&self, phase: FlightPhase, id: HookId) -> bool {
        self.exit.remove(phase, id)
    }

    pub(crate) fn remove_transition(&self, from: FlightPhase, to: FlightPhase, id: HookId) -> bool {
        self.transition.remove((from, to), id)
    }

    pub(crate) fn run_exit(&self, record: &PhaseTransitionRecord, logger: &dyn Logger) {
        run_all(
            self.exit.snapshot(record.from),
            record,
            logger,
            &format!("exit hook for {}", record.from),
        );
    }

    pub(crate) fn run_transition(&self, record: &PhaseTransitionRecord, logger: &dyn Logger) {
        run_all(
            self.transition.snapshot((record.from, record.to)),
            record,
            logger,
            &format!("transition hook {} -> {}", record.from, record.to),
        );
    }

    pub(crate) fn run_entry(&self, record: &PhaseTransitionRecord, logger: &dyn Logger) {
        run_all(
            self.entry.snapshot(record.to),
            record,
            logger,
            &format!("entry hook for {}", record.to),
        );
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entry.len() + self.exit.len() + self.transition.len()
    }
}

fn run_all(
    hooks: Vec<(HookId, PhaseHook)>,
    record: &PhaseTransitionRecord,
    logger: &dyn Logger,
    label: &str,
) {
    for (id, hook) in hooks {
        let label = format!("{} #{}", label, id.0);
        run_isolated(logger, &label, || hook(record));
    }
}
