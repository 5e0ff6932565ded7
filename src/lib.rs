//! Morpheus is a kernel-guided cooperative scheduling runtime for
//! CPU-bound worker threads.
//!
//! A privileged kernel component observes per-worker CPU consumption and
//! system pressure through a memory-mapped [Shared Control Block](scb),
//! and advises workers to yield by advancing a sequence counter and, best
//! effort, pushing a [hint record](hint) into a ring buffer. Worker
//! threads call [`checkpoint`] between units of work; it is cheap enough
//! to call in a hot loop and returns `true` only when a yield is actually
//! outstanding.
//!
//! ```no_run
//! loop {
//!     // ... do one unit of CPU-bound work ...
//!     if morpheus::checkpoint() {
//!         morpheus::acknowledge_yield();
//!         // hand control back to whatever the host scheduler considers
//!         // "the next thing to run"
//!     }
//! }
//! ```
//!
//! If no kernel component is mapped (`MORPHEUS_SCB_MAP` unset, or the
//! file cannot be opened and `mmap`'d), every operation in this crate
//! degrades to a neutral value rather than failing: `checkpoint` always
//! returns `false`, `pressure_level` and friends return `None`, and
//! [`critical`] is a harmless no-op guard.

pub mod checkpoint;
pub mod config;
pub mod critical;
pub mod error;
pub mod ffi;
pub mod hint;
pub mod mapping;
pub mod policy;
pub mod pressure;
pub mod registry;
pub mod scb;
pub mod stats;

pub use checkpoint::{AdaptiveCheckpointer, CheckpointEngine};
pub use config::{Config, DEFAULT_SLICE_NS, GRACE_PERIOD_NS, MAX_WORKERS, RINGBUF_SIZE};
pub use critical::CriticalSection;
pub use error::RegisterError;
pub use hint::{HintReason, HintRecord, HINT_BUDGET, HINT_DEADLINE, HINT_IMBALANCE, HINT_PRESSURE};
pub use mapping::{BackingStore, MmapSource, ScbSource, StubSource};
pub use policy::{CheckpointingLoop, Step};
pub use pressure::PressureMode;
pub use registry::WorkerRegistry;
pub use stats::{Stats, StatsSnapshot};

use std::sync::OnceLock;

/// The process-wide runtime: the resolved mapping, the worker registry,
/// and the stats counters. Lazily built on first use of any public
/// function, from the environment (§8.3).
struct Runtime {
    source: Box<dyn ScbSource>,
    registry: WorkerRegistry,
    stats: Stats,
    config: Config,
}

impl Runtime {
    fn init() -> Self {
        let config = Config::from_env();
        let source: Box<dyn ScbSource> = match mapping::MmapSource::open(&config) {
            Ok(source) => Box::new(source),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "kernel shared memory unavailable, falling back to stub mapping"
                );
                Box::new(StubSource)
            }
        };
        Self {
            source,
            registry: WorkerRegistry::new(),
            stats: Stats::default(),
            config,
        }
    }

    fn engine(&self) -> CheckpointEngine<'_> {
        CheckpointEngine::new(self.source.as_ref(), &self.registry, &self.stats)
    }

    fn bound_view(&self) -> Option<scb::ScbView<'_>> {
        self.registry
            .current_worker_id()
            .and_then(|id| self.source.slot(id))
    }
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(Runtime::init)
}

/// Binds the calling thread to `worker_id` (§4.2).
pub fn init_worker(worker_id: u32, escapable: bool) -> Result<(), RegisterError> {
    let rt = runtime();
    rt.registry
        .init_worker(rt.source.as_ref(), worker_id, escapable, rt.config.defensive_recovery_count)
}

/// Fast-path predicate: true iff a yield is outstanding and the calling
/// thread is not in a critical section.
pub fn checkpoint() -> bool {
    runtime().engine().checkpoint()
}

/// Same predicate as [`checkpoint`], without acknowledging anything.
pub fn yield_requested() -> bool {
    runtime().engine().yield_requested()
}

/// Acknowledges the outstanding yield, if any. Returns whether one was
/// outstanding.
pub fn acknowledge_yield() -> bool {
    runtime().engine().acknowledge_yield()
}

/// Suspends once if a yield is outstanding, acknowledging it first.
/// Returns immediately, without touching the host scheduler, if not.
pub async fn async_checkpoint() {
    runtime().engine().async_checkpoint().await
}

/// Unconditionally acknowledges and suspends once.
pub async fn force_yield() {
    runtime().engine().force_yield().await
}

/// Imperative critical-section entry (§4.4). Prefer [`critical`] where a
/// scoped value can be held; this is for hosts that cannot.
pub fn enter_critical_section() {
    let rt = runtime();
    if let Some(view) = rt.bound_view() {
        view.inc_critical();
        rt.stats.record_critical_entered();
    }
}

/// Imperative critical-section exit, pairing with [`enter_critical_section`].
pub fn exit_critical_section() {
    let rt = runtime();
    if let Some(view) = rt.bound_view() {
        if view.dec_critical() == 0 {
            rt.stats.record_critical_underflow();
        }
    }
}

/// Enters a critical section, returning a guard that releases it on drop.
/// A no-op (inert guard) if the calling thread is not bound.
pub fn critical() -> CriticalSection<'static> {
    let rt = runtime();
    CriticalSection::enter(rt.bound_view(), &rt.stats)
}

/// Whether the calling thread currently holds a critical section.
pub fn is_in_critical_section() -> bool {
    runtime()
        .bound_view()
        .map(|v| v.read_critical_count() > 0)
        .unwrap_or(false)
}

/// The kernel-reported pressure level (0-100) for the calling thread's
/// worker, or `None` if unbound.
pub fn pressure_level() -> Option<u32> {
    runtime().bound_view().map(|v| v.read_pressure())
}

/// Remaining CPU budget, in nanoseconds, for the calling thread's worker.
pub fn budget_remaining_ns() -> Option<u64> {
    runtime().bound_view().map(|v| v.read_budget())
}

/// The calling thread's bound worker id, if any.
pub fn worker_id() -> Option<u32> {
    runtime().registry.current_worker_id()
}

/// Advises the kernel of the worker's runtime priority.
pub fn set_priority(priority: u8) {
    if let Some(view) = runtime().bound_view() {
        view.store_priority(priority);
    }
}

/// A point-in-time snapshot of process-wide stats.
pub fn get_stats() -> Option<StatsSnapshot> {
    Some(runtime().stats.snapshot())
}

/// Transitions the calling thread's worker to QUIESCING (§4.2).
pub fn quiesce() {
    let rt = runtime();
    rt.registry.quiesce(rt.source.as_ref());
}

/// Transitions the calling thread's worker to DEAD and releases the
/// thread-local binding. The slot is never reused by this process.
pub fn deregister() {
    let rt = runtime();
    rt.registry.deregister(rt.source.as_ref());
}

/// Whether the calling thread's worker is currently in DEFENSIVE mode.
pub fn is_defensive_mode() -> bool {
    runtime()
        .registry
        .with_current(|h| h.pressure().is_defensive())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests share the process-wide `RUNTIME` singleton and the
    // calling thread's binding, so each runs in its own thread (the
    // default for `cargo test`) to avoid cross-test interference; none of
    // them assume a particular worker_id is free.

    #[test]
    fn unbound_thread_sees_neutral_values() {
        assert!(!checkpoint());
        assert!(!yield_requested());
        assert_eq!(pressure_level(), None);
        assert_eq!(budget_remaining_ns(), None);
        assert_eq!(worker_id(), None);
        assert!(!is_defensive_mode());
        let guard = critical();
        assert!(!guard.is_active());
    }

    #[test]
    fn stats_are_always_available() {
        assert!(get_stats().is_some());
    }
}
