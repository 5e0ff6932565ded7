//! Per-worker hint-continuity tracking and the DETERMINISTIC -> PRESSURED
//! -> DEFENSIVE state machine (§4.5).
//!
//! This state lives entirely in user space: it is bookkeeping the runtime
//! keeps about what it has *seen*, not part of the SCB's normative layout.
//! It is therefore owned by the worker's thread-local handle, not read
//! through [`crate::scb::ScbView`].

use std::cell::Cell;

/// Hint-continuity state for one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureMode {
    /// No hint has ever been observed since registration.
    Deterministic,
    /// At least one hint observed; sequence continuity intact.
    Pressured,
    /// A gap was detected; every checkpoint yields until recovery.
    Defensive,
}

pub struct PressureTracker {
    mode: Cell<PressureMode>,
    last_observed_seq: Cell<Option<u64>>,
    contiguous_since_defensive: Cell<u32>,
    recovery_threshold: u32,
}

impl PressureTracker {
    pub fn new(recovery_threshold: u32) -> Self {
        Self {
            mode: Cell::new(PressureMode::Deterministic),
            last_observed_seq: Cell::new(None),
            contiguous_since_defensive: Cell::new(0),
            recovery_threshold,
        }
    }

    pub fn mode(&self) -> PressureMode {
        self.mode.get()
    }

    pub fn is_defensive(&self) -> bool {
        self.mode.get() == PressureMode::Defensive
    }

    /// Feed a newly observed sequence value, from an SCB read or a drained
    /// hint record, and update the state machine accordingly. A repeated
    /// value (no new information) is a no-op. Returns whether this call is
    /// the one that entered DEFENSIVE (the edge, not every observation made
    /// while already defensive), so callers can drive a one-shot counter.
    pub fn observe(&self, seq: u64, worker_id: u32) -> bool {
        let Some(prev) = self.last_observed_seq.get() else {
            self.last_observed_seq.set(Some(seq));
            if self.mode.get() == PressureMode::Deterministic {
                self.mode.set(PressureMode::Pressured);
            }
            return false;
        };

        if seq == prev {
            return false;
        }
        self.last_observed_seq.set(Some(seq));

        let gap = seq.saturating_sub(prev);
        if gap > 1 {
            let already_defensive = self.mode.get() == PressureMode::Defensive;
            if !already_defensive {
                tracing::warn!(worker_id, gap, "hint sequence gap detected, entering defensive mode");
            }
            self.mode.set(PressureMode::Defensive);
            self.contiguous_since_defensive.set(0);
            return !already_defensive;
        }

        match self.mode.get() {
            PressureMode::Deterministic => self.mode.set(PressureMode::Pressured),
            PressureMode::Pressured => {}
            PressureMode::Defensive => {
                let n = self.contiguous_since_defensive.get() + 1;
                if n >= self.recovery_threshold {
                    tracing::info!(worker_id, "defensive mode recovered");
                    self.mode.set(PressureMode::Pressured);
                    self.contiguous_since_defensive.set(0);
                } else {
                    self.contiguous_since_defensive.set(n);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_sequence_stays_pressured() {
        let t = PressureTracker::new(64);
        t.observe(3, 0);
        assert_eq!(t.mode(), PressureMode::Pressured);
        t.observe(4, 0);
        assert_eq!(t.mode(), PressureMode::Pressured);
        t.observe(5, 0);
        assert_eq!(t.mode(), PressureMode::Pressured);
    }

    #[test]
    fn gap_enters_defensive() {
        let t = PressureTracker::new(64);
        t.observe(3, 0);
        t.observe(4, 0);
        t.observe(5, 0);
        t.observe(10, 0);
        assert_eq!(t.mode(), PressureMode::Defensive);
    }

    #[test]
    fn recovers_after_threshold_contiguous_observations() {
        let t = PressureTracker::new(4);
        t.observe(0, 0);
        t.observe(10, 0); // gap -> defensive
        assert_eq!(t.mode(), PressureMode::Defensive);
        for i in 11..14 {
            t.observe(i, 0);
            assert_eq!(t.mode(), PressureMode::Defensive);
        }
        t.observe(14, 0); // 4th contiguous observation since defensive
        assert_eq!(t.mode(), PressureMode::Pressured);
    }

    #[test]
    fn only_the_entering_observation_reports_the_defensive_edge() {
        let t = PressureTracker::new(64);
        t.observe(3, 0);
        assert!(t.observe(10, 0)); // gap -> enters defensive, edge reported
        assert!(!t.observe(11, 0)); // still defensive, not a new edge
        assert!(!t.observe(20, 0)); // another gap while already defensive
    }

    #[test]
    fn repeated_value_is_a_no_op() {
        let t = PressureTracker::new(64);
        t.observe(5, 0);
        assert_eq!(t.mode(), PressureMode::Pressured);
        t.observe(5, 0);
        assert_eq!(t.mode(), PressureMode::Pressured);
    }
}
