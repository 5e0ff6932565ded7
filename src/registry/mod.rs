//! Associates the calling thread with a worker slot and walks it through
//! its lifecycle (§4.2): INIT -> REGISTERED -> RUNNING -> QUIESCING -> DEAD.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::RegisterError;
use crate::mapping::ScbSource;
use crate::pressure::PressureTracker;
use crate::scb::WorkerState;

/// The calling thread's binding to a worker slot, plus the user-space
/// hint-continuity state that rides alongside it (§4.5).
pub struct WorkerHandle {
    worker_id: u32,
    pressure: PressureTracker,
    started: Cell<bool>,
}

impl WorkerHandle {
    pub fn worker_id(&self) -> u32 {
        self.worker_id
    }

    pub fn pressure(&self) -> &PressureTracker {
        &self.pressure
    }
}

thread_local! {
    static BOUND: RefCell<Option<WorkerHandle>> = const { RefCell::new(None) };
}

/// Process-wide table of claimed worker ids, guarding against two threads
/// racing to claim the same slot. Ids are never released once claimed:
/// a DEAD slot must not be reused within the same process (§4.2).
pub struct WorkerRegistry {
    claimed: Mutex<HashSet<u32>>,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// The calling thread's bound worker id, if any.
    pub fn current_worker_id(&self) -> Option<u32> {
        BOUND.with(|b| b.borrow().as_ref().map(|h| h.worker_id))
    }

    /// Runs `f` against the calling thread's handle, if it is bound.
    pub fn with_current<R>(&self, f: impl FnOnce(&WorkerHandle) -> R) -> Option<R> {
        BOUND.with(|b| b.borrow().as_ref().map(f))
    }

    pub fn init_worker(
        &self,
        source: &dyn ScbSource,
        worker_id: u32,
        escapable: bool,
        defensive_recovery_count: u32,
    ) -> Result<(), RegisterError> {
        if worker_id >= source.max_workers() {
            tracing::warn!(worker_id, "registration rejected: slot out of range");
            return Err(RegisterError::SlotOutOfRange {
                worker_id,
                max_workers: source.max_workers(),
            });
        }

        if let Some(existing) = self.current_worker_id() {
            tracing::warn!(worker_id, existing, "registration rejected: thread already bound");
            return Err(RegisterError::ThreadAlreadyBound { existing });
        }

        {
            let mut claimed = self.claimed.lock().unwrap();
            let slot_live = source
                .slot(worker_id)
                .map(|v| v.read_state() != WorkerState::Init as u32)
                .unwrap_or(false);
            if claimed.contains(&worker_id) || slot_live {
                tracing::warn!(worker_id, "registration rejected: slot busy");
                return Err(RegisterError::SlotBusy { worker_id });
            }
            claimed.insert(worker_id);
        }

        if let Some(view) = source.slot(worker_id) {
            view.store_escapable(escapable);
            let seq = view.read_preempt_seq();
            view.store_ack(seq);
            view.store_state(WorkerState::Registered as u32);
        }

        BOUND.with(|b| {
            *b.borrow_mut() = Some(WorkerHandle {
                worker_id,
                pressure: PressureTracker::new(defensive_recovery_count),
                started: Cell::new(false),
            });
        });

        tracing::debug!(worker_id, escapable, "worker registered");
        Ok(())
    }

    /// Transitions the calling thread's worker from REGISTERED to RUNNING
    /// the first time it is called; a no-op on every call after that, and
    /// a no-op if unbound. Called from the checkpoint engine rather than
    /// `init_worker`, since the contract for `init_worker` is that the
    /// slot is REGISTERED (not RUNNING) immediately on return.
    pub fn mark_running(&self, source: &dyn ScbSource) {
        let first_call = BOUND.with(|b| {
            let borrow = b.borrow();
            let handle = borrow.as_ref()?;
            if handle.started.get() {
                None
            } else {
                handle.started.set(true);
                Some(handle.worker_id)
            }
        });
        if let Some(id) = first_call {
            if let Some(view) = source.slot(id) {
                view.store_state(WorkerState::Running as u32);
            }
        }
    }

    pub fn quiesce(&self, source: &dyn ScbSource) {
        if let Some(id) = self.current_worker_id() {
            if let Some(view) = source.slot(id) {
                view.store_state(WorkerState::Quiescing as u32);
            }
            tracing::debug!(worker_id = id, "worker quiescing");
        }
    }

    pub fn deregister(&self, source: &dyn ScbSource) {
        let worker_id = BOUND.with(|b| b.borrow_mut().take().map(|h| h.worker_id));
        if let Some(id) = worker_id {
            if let Some(view) = source.slot(id) {
                view.store_state(WorkerState::Dead as u32);
            }
            tracing::debug!(worker_id = id, "worker deregistered");
        }
    }
}
