//! The re-entrant critical-section discipline (§4.4): a scoped guard with
//! guaranteed release on every exit path, including panics and (for the
//! async critical future dropped mid-await) cancellation.

use crate::scb::ScbView;
use crate::stats::Stats;

/// RAII guard returned by entering a critical section.
///
/// Dropping the guard releases the section exactly once, regardless of
/// how control left the scope: normal return, `?`, panic-during-unwind,
/// or (if awaited inside) the enclosing future being dropped. When the
/// calling thread is not bound to a worker, entering is a documented
/// no-op: the guard holds no view and its drop does nothing.
#[must_use = "the critical section is released when this guard is dropped"]
pub struct CriticalSection<'a> {
    view: Option<ScbView<'a>>,
    stats: &'a Stats,
}

impl<'a> CriticalSection<'a> {
    pub(crate) fn enter(view: Option<ScbView<'a>>, stats: &'a Stats) -> Self {
        if let Some(v) = view {
            v.inc_critical();
            stats.record_critical_entered();
        }
        Self { view, stats }
    }

    /// Whether this guard actually holds a live SCB view (i.e. the calling
    /// thread was bound when the section was entered).
    pub fn is_active(&self) -> bool {
        self.view.is_some()
    }
}

impl Drop for CriticalSection<'_> {
    fn drop(&mut self) {
        if let Some(v) = self.view.take() {
            if v.dec_critical() == 0 {
                self.stats.record_critical_underflow();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::BackingStore;
    use crate::mapping::ScbSource;

    #[test]
    fn nesting_returns_counter_to_prior_value() {
        let store = BackingStore::single_worker();
        let stats = Stats::default();
        let view = store.slot(0).unwrap();

        assert_eq!(view.read_critical_count(), 0);
        let outer = CriticalSection::enter(Some(view), &stats);
        assert_eq!(view.read_critical_count(), 1);
        {
            let _inner = CriticalSection::enter(Some(view), &stats);
            assert_eq!(view.read_critical_count(), 2);
        }
        assert_eq!(view.read_critical_count(), 1);
        drop(outer);
        assert_eq!(view.read_critical_count(), 0);
    }

    #[test]
    fn released_on_early_return_via_closure() {
        let store = BackingStore::single_worker();
        let stats = Stats::default();
        let view = store.slot(0).unwrap();

        let run = || -> Result<(), ()> {
            let _guard = CriticalSection::enter(Some(view), &stats);
            Err(())?;
            Ok(())
        };
        let _ = run();
        assert_eq!(view.read_critical_count(), 0);
    }

    #[test]
    fn unbound_critical_section_is_a_no_op() {
        let stats = Stats::default();
        let guard = CriticalSection::enter(None, &stats);
        assert!(!guard.is_active());
    }
}
