use super::pressure::GlobalPressureView;
use super::ScbSource;
use crate::hint::HintRing;
use crate::scb::ScbView;

/// Degraded source used when the kernel's shared memory cannot be mapped
/// (§7, mapping-unavailable). Never hands out a slot, a ring, or a
/// pressure view; every downstream operation that already handles "thread
/// not bound" therefore handles "kernel not present" for free, with no
/// extra branching.
#[derive(Default)]
pub struct StubSource;

impl ScbSource for StubSource {
    fn slot(&self, _worker_id: u32) -> Option<ScbView<'_>> {
        None
    }

    fn hint_ring(&self) -> Option<HintRing<'_>> {
        None
    }

    fn global_pressure(&self) -> Option<GlobalPressureView<'_>> {
        None
    }

    fn max_workers(&self) -> u32 {
        crate::config::MAX_WORKERS
    }

    fn is_stub(&self) -> bool {
        true
    }
}
