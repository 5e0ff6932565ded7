//! Process-wide counters (§4.7), a singleton alongside the rest of the
//! runtime's static graph: no locks needed since every field is an atomic.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Stats {
    hints_observed: AtomicU64,
    yields_performed: AtomicU64,
    critical_entered: AtomicU64,
    defensive_entries: AtomicU64,
    acks: AtomicU64,
    critical_underflows: AtomicU64,
}

/// A point-in-time, read-only copy of [`Stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatsSnapshot {
    pub hints_observed: u64,
    pub yields_performed: u64,
    pub critical_entered: u64,
    pub defensive_entries: u64,
    pub acks: u64,
    pub critical_underflows: u64,
}

impl Stats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hints_observed: self.hints_observed.load(Ordering::Relaxed),
            yields_performed: self.yields_performed.load(Ordering::Relaxed),
            critical_entered: self.critical_entered.load(Ordering::Relaxed),
            defensive_entries: self.defensive_entries.load(Ordering::Relaxed),
            acks: self.acks.load(Ordering::Relaxed),
            critical_underflows: self.critical_underflows.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_hint_observed(&self) {
        self.hints_observed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_yield(&self) {
        self.yields_performed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_critical_entered(&self) {
        self.critical_entered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_defensive_entry(&self) {
        self.defensive_entries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ack(&self) {
        self.acks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_critical_underflow(&self) {
        self.critical_underflows.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let stats = Stats::default();
        stats.record_ack();
        stats.record_ack();
        stats.record_yield();
        let snap = stats.snapshot();
        assert_eq!(snap.acks, 2);
        assert_eq!(snap.yields_performed, 1);
    }
}
