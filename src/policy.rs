//! Host-scheduler integration (§4.6): a thin wrapper that interleaves
//! checkpoint polling with a host task loop's own iteration, without
//! assuming anything about how that loop is driven.

use std::ops::ControlFlow;

use crate::checkpoint::CheckpointEngine;
use crate::mapping::ScbSource;
use crate::registry::WorkerRegistry;
use crate::stats::Stats;

/// A one-iteration entry point for loops that aren't naturally
/// [`Iterator`]s (e.g. an event loop that runs until told to stop).
pub trait Step {
    type Break;

    fn step(&mut self) -> ControlFlow<Self::Break>;
}

/// Wraps a host loop `L`, invoking [`CheckpointEngine::checkpoint`] and
/// draining available hints before every delegated iteration. Never
/// suspends the scheduler thread itself; per §4.6, the scheduler is a
/// bookkeeper, not a worker.
pub struct CheckpointingLoop<'a, L> {
    inner: L,
    engine: CheckpointEngine<'a>,
    last_checkpoint: bool,
}

impl<'a, L> CheckpointingLoop<'a, L> {
    pub fn new(inner: L, source: &'a dyn ScbSource, registry: &'a WorkerRegistry, stats: &'a Stats) -> Self {
        Self {
            inner,
            engine: CheckpointEngine::new(source, registry, stats),
            last_checkpoint: false,
        }
    }

    /// The result of the checkpoint invoked before the most recent
    /// delegated iteration. Exposed so a host that wants to react to
    /// pressure (without the wrapper making that decision for it) can.
    pub fn checkpoint_pending(&self) -> bool {
        self.last_checkpoint
    }

    pub fn into_inner(self) -> L {
        self.inner
    }

    fn pre_iteration(&mut self) {
        self.last_checkpoint = self.engine.checkpoint();
        self.engine.poll_hints();
    }
}

impl<L: Iterator> Iterator for CheckpointingLoop<'_, L> {
    type Item = L::Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.pre_iteration();
        self.inner.next()
    }
}

impl<L: Step> Step for CheckpointingLoop<'_, L> {
    type Break = L::Break;

    fn step(&mut self) -> ControlFlow<Self::Break> {
        self.pre_iteration();
        self.inner.step()
    }
}

/// Self-rearming checkpoint ticker for hosts built on `tokio`, satisfying
/// §4.6's "(b) schedule a self-rearming zero-delay task" option without
/// requiring every caller to build their own `Iterator`/[`Step`] adapter.
#[cfg(feature = "tokio-integration")]
pub fn spawn_checkpoint_ticker(
    source: std::sync::Arc<dyn ScbSource>,
    registry: std::sync::Arc<WorkerRegistry>,
    stats: std::sync::Arc<Stats>,
    period: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let engine = CheckpointEngine::new(source.as_ref(), registry.as_ref(), stats.as_ref());
            engine.checkpoint();
            engine.poll_hints();
        }
    })
}
