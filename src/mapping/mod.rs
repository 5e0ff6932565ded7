//! Resolves the kernel-backed shared memory surface (§6.1), or falls back
//! to an in-process stand-in when no kernel component is present.
//!
//! `ScbSource` is the seam: the checkpoint engine, registry and pressure
//! state machine never know whether a slot view is backed by `mmap`'d
//! kernel memory, a `Vec<u8>` test fixture, or nothing at all. Mapping
//! unavailability (§7) is modeled as [`stub::StubSource`] returning `None`
//! from every method, rather than as conditionals sprinkled through the
//! engine.

mod arena;
mod backing;
mod mmap_source;
mod pressure;
mod stub;

pub use backing::BackingStore;
pub use mmap_source::MmapSource;
pub use pressure::GlobalPressureView;
pub use stub::StubSource;

use crate::hint::HintRing;
use crate::scb::ScbView;

/// A source of SCB slots, the hint ring, and the global pressure record.
///
/// Implementations must hand out views whose lifetime does not outlive
/// `&self`; the SCB Accessor (§4.1) never holds one across a suspension
/// point.
pub trait ScbSource: Send + Sync {
    /// Returns a view onto `worker_id`'s slot, or `None` if the id is out
    /// of range or no backing slot exists (stub mode).
    fn slot(&self, worker_id: u32) -> Option<ScbView<'_>>;

    /// Returns the hint ring, if one is mapped.
    fn hint_ring(&self) -> Option<HintRing<'_>>;

    /// Returns the global pressure record, if one is mapped.
    fn global_pressure(&self) -> Option<GlobalPressureView<'_>>;

    /// Upper bound on valid `worker_id`s this source can serve.
    fn max_workers(&self) -> u32;

    /// Whether this source is the degraded stub (§7, mapping-unavailable).
    fn is_stub(&self) -> bool {
        false
    }
}
