//! The checkpoint engine (§4.3): the predicate workers poll from their hot
//! loops, its acknowledging and suspending variants, and the pressure pacer.

pub mod pacer;

use std::future::Future;
use std::task::Poll;

pub use pacer::AdaptiveCheckpointer;

use crate::mapping::ScbSource;
use crate::registry::WorkerRegistry;
use crate::scb::{ScbView, YieldReason};
use crate::stats::Stats;

/// Bundles the three pieces of state a checkpoint decision needs: where
/// the SCB lives, who is bound to it on this thread, and where to record
/// what happened. Borrowed, not owned: this is constructed fresh (and
/// cheaply, it's three references) wherever the runtime's public API
/// needs to make a checkpoint decision.
pub struct CheckpointEngine<'a> {
    source: &'a dyn ScbSource,
    registry: &'a WorkerRegistry,
    stats: &'a Stats,
}

impl<'a> CheckpointEngine<'a> {
    pub fn new(source: &'a dyn ScbSource, registry: &'a WorkerRegistry, stats: &'a Stats) -> Self {
        Self {
            source,
            registry,
            stats,
        }
    }

    fn bound_view(&self) -> Option<ScbView<'_>> {
        self.registry
            .current_worker_id()
            .and_then(|id| self.source.slot(id))
    }

    fn is_defensive(&self) -> bool {
        self.registry
            .with_current(|h| h.pressure().is_defensive())
            .unwrap_or(false)
    }

    /// Hot-path predicate. One acquire load of `preempt_seq`, one of
    /// `last_ack_seq`, one of the critical-section counter; no allocation.
    ///
    /// The one deliberate exception to "never mutates": on a thread's very
    /// first call, this also publishes the REGISTERED -> RUNNING transition
    /// (`mark_running` below is idempotent after that). No other operation
    /// in the public API is positioned to observe "the worker's first
    /// checkpoint", and a worker that never calls `checkpoint` in its loop
    /// isn't cooperating with this scheme at all, so there is nowhere else
    /// to put it. Every call after the first is a pure read.
    pub fn checkpoint(&self) -> bool {
        let Some(view) = self.bound_view() else {
            return false;
        };
        self.registry.mark_running(self.source);
        if view.read_critical_count() > 0 {
            return false;
        }
        if self.is_defensive() {
            return true;
        }
        view.read_preempt_seq() != view.read_last_ack_seq()
    }

    /// Same predicate as [`Self::checkpoint`], without the "this is a
    /// decision" framing, for callers that only want to observe.
    pub fn yield_requested(&self) -> bool {
        self.checkpoint()
    }

    /// Publishes `last_ack_seq := preempt_seq` and returns whether a yield
    /// was outstanding (including the unconditional defensive-mode case).
    pub fn acknowledge_yield(&self) -> bool {
        self.do_acknowledge(false)
    }

    fn do_acknowledge(&self, force: bool) -> bool {
        let Some(view) = self.bound_view() else {
            return false;
        };
        let seq = view.read_preempt_seq();
        let ack = view.read_last_ack_seq();
        let outstanding = seq != ack;
        let defensive = self.is_defensive();

        if outstanding || defensive || force {
            view.store_ack(seq);
            view.store_yield_reason(if defensive {
                YieldReason::Defensive as u32
            } else {
                YieldReason::Hint as u32
            });
            self.stats.record_ack();
        }

        if let Some(id) = self.registry.current_worker_id() {
            let entered_defensive = self
                .registry
                .with_current(|h| h.pressure().observe(seq, id))
                .unwrap_or(false);
            if entered_defensive {
                self.stats.record_defensive_entry();
            }
        }

        outstanding || defensive || force
    }

    /// Suspends once if a hint is outstanding; otherwise returns without
    /// touching the host task scheduler at all.
    pub async fn async_checkpoint(&self) {
        if !self.checkpoint() {
            return;
        }
        self.acknowledge_yield();
        self.stats.record_yield();
        yield_once().await;
    }

    /// Unconditionally acknowledges and suspends once.
    pub async fn force_yield(&self) {
        self.do_acknowledge(true);
        self.stats.record_yield();
        yield_once().await;
    }

    /// Drains whatever hint records are currently available and feeds
    /// their sequence numbers to the defensive-mode detector. Not required
    /// for correctness (§5); meant to be called periodically by the
    /// host-scheduler policy, never from a worker's hot loop.
    pub fn poll_hints(&self) {
        let Some(id) = self.registry.current_worker_id() else {
            return;
        };
        let Some(ring) = self.source.hint_ring() else {
            return;
        };
        for record in ring.drain() {
            self.stats.record_hint_observed();
            let entered_defensive = self
                .registry
                .with_current(|h| h.pressure().observe(record.seq, id))
                .unwrap_or(false);
            if entered_defensive {
                self.stats.record_defensive_entry();
            }
        }
    }
}

/// A future that is pending exactly once, re-arming its waker before
/// returning control, then ready on the next poll. This is the entirety
/// of "yield to the host scheduler and resume at the tail of the ready
/// queue", with no dependency on any particular async runtime.
fn yield_once() -> impl Future<Output = ()> {
    let mut polled = false;
    futures::future::poll_fn(move |cx| {
        if polled {
            Poll::Ready(())
        } else {
            polled = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::BackingStore;

    fn engine_with_worker<'a>(
        store: &'a BackingStore,
        registry: &'a WorkerRegistry,
        stats: &'a Stats,
    ) -> CheckpointEngine<'a> {
        registry.init_worker(store, 0, true, 64).unwrap();
        CheckpointEngine::new(store, registry, stats)
    }

    #[test]
    fn first_checkpoint_transitions_worker_to_running() {
        use crate::scb::WorkerState;

        let store = BackingStore::single_worker();
        let registry = WorkerRegistry::new();
        let stats = Stats::default();
        let engine = engine_with_worker(&store, &registry, &stats);

        assert_eq!(
            store.slot(0).unwrap().read_state(),
            WorkerState::Registered as u32
        );
        engine.checkpoint();
        assert_eq!(
            store.slot(0).unwrap().read_state(),
            WorkerState::Running as u32
        );
    }

    #[test]
    fn no_outstanding_hint_does_not_checkpoint() {
        let store = BackingStore::single_worker();
        let registry = WorkerRegistry::new();
        let stats = Stats::default();
        let engine = engine_with_worker(&store, &registry, &stats);

        assert!(!engine.checkpoint());
        assert!(!engine.acknowledge_yield());
    }

    #[test]
    fn outstanding_hint_checkpoints_once_then_clears() {
        let store = BackingStore::single_worker();
        let registry = WorkerRegistry::new();
        let stats = Stats::default();
        let engine = engine_with_worker(&store, &registry, &stats);

        store.slot(0).unwrap().store_preempt_seq(1);
        assert!(engine.checkpoint());
        assert!(engine.acknowledge_yield());
        assert!(!engine.checkpoint());
    }

    #[test]
    fn gap_of_any_size_clears_on_single_acknowledge() {
        let store = BackingStore::single_worker();
        let registry = WorkerRegistry::new();
        let stats = Stats::default();
        let engine = engine_with_worker(&store, &registry, &stats);

        store.slot(0).unwrap().store_preempt_seq(50);
        assert!(engine.checkpoint());
        assert!(engine.acknowledge_yield());
        assert!(!engine.checkpoint());
    }

    #[test]
    fn critical_section_gates_checkpoint_even_with_pending_hint() {
        let store = BackingStore::single_worker();
        let registry = WorkerRegistry::new();
        let stats = Stats::default();
        let engine = engine_with_worker(&store, &registry, &stats);
        let view = store.slot(0).unwrap();

        view.store_preempt_seq(2);
        view.inc_critical();
        assert!(!engine.checkpoint());
        view.dec_critical();
        assert!(engine.checkpoint());
    }

    #[test]
    fn defensive_mode_forces_checkpoint_unconditionally() {
        let store = BackingStore::single_worker();
        let registry = WorkerRegistry::new();
        let stats = Stats::default();
        let engine = engine_with_worker(&store, &registry, &stats);

        registry.with_current(|h| {
            h.pressure().observe(0, 0);
            h.pressure().observe(10, 0); // gap -> defensive
        });
        assert!(engine.checkpoint());
    }

    #[test]
    fn defensive_entry_is_counted_exactly_once() {
        let store = BackingStore::single_worker();
        let registry = WorkerRegistry::new();
        let stats = Stats::default();
        let engine = engine_with_worker(&store, &registry, &stats);

        // first observation establishes the continuity baseline, no gap yet.
        store.slot(0).unwrap().store_preempt_seq(1);
        engine.acknowledge_yield();
        assert_eq!(stats.snapshot().defensive_entries, 0);

        // gap against the baseline: enters defensive, counted once.
        store.slot(0).unwrap().store_preempt_seq(10);
        engine.acknowledge_yield();
        assert_eq!(stats.snapshot().defensive_entries, 1);

        // another gap while already defensive: not a new edge.
        store.slot(0).unwrap().store_preempt_seq(20);
        engine.acknowledge_yield();
        assert_eq!(stats.snapshot().defensive_entries, 1);
    }

    #[test]
    fn unbound_thread_checkpoint_is_false() {
        let store = BackingStore::single_worker();
        let registry = WorkerRegistry::new();
        let stats = Stats::default();
        let engine = CheckpointEngine::new(&store, &registry, &stats);
        assert!(!engine.checkpoint());
        assert!(!engine.acknowledge_yield());
    }

    #[tokio::test]
    async fn async_checkpoint_returns_immediately_without_hint() {
        let store = BackingStore::single_worker();
        let registry = WorkerRegistry::new();
        let stats = Stats::default();
        let engine = engine_with_worker(&store, &registry, &stats);

        engine.async_checkpoint().await;
        assert_eq!(stats.snapshot().yields_performed, 0);
    }

    #[tokio::test]
    async fn async_checkpoint_acknowledges_and_suspends_when_pending() {
        let store = BackingStore::single_worker();
        let registry = WorkerRegistry::new();
        let stats = Stats::default();
        let engine = engine_with_worker(&store, &registry, &stats);

        store.slot(0).unwrap().store_preempt_seq(1);
        engine.async_checkpoint().await;
        assert_eq!(store.slot(0).unwrap().read_last_ack_seq(), 1);
        assert_eq!(stats.snapshot().yields_performed, 1);
        assert!(!engine.checkpoint());
    }

    #[tokio::test]
    async fn force_yield_always_acknowledges() {
        let store = BackingStore::single_worker();
        let registry = WorkerRegistry::new();
        let stats = Stats::default();
        let engine = engine_with_worker(&store, &registry, &stats);

        engine.force_yield().await;
        assert_eq!(stats.snapshot().yields_performed, 1);
        assert_eq!(stats.snapshot().acks, 1);
    }
}
