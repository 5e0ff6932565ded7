//! Pressure-adaptive spacing of checkpoint invocations (§4.3). Pure
//! arithmetic: this never touches the SCB itself, it only tells the
//! caller when to call [`super::CheckpointEngine::checkpoint`] next.

use std::cell::Cell;

use crate::config::Config;

/// Interpolates a checkpoint interval between `min_interval` (pressure
/// 100) and `max_interval` (pressure 0), in iteration counts.
pub struct AdaptiveCheckpointer {
    min_interval: u64,
    max_interval: u64,
    last_check: Cell<u64>,
}

impl AdaptiveCheckpointer {
    pub fn new(min_interval: u64, max_interval: u64) -> Self {
        Self {
            min_interval,
            max_interval,
            last_check: Cell::new(0),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.pacer_min_interval, config.pacer_max_interval)
    }

    /// `interval = max - (max - min) * pressure / 100`.
    pub fn interval_for_pressure(&self, pressure_pct: u32) -> u64 {
        let p = pressure_pct.min(100) as u64;
        self.max_interval - (self.max_interval - self.min_interval) * p / 100
    }

    /// Returns true (and advances the cursor to `i`) iff at least the
    /// current pressure-scaled interval has elapsed since the last check.
    pub fn should_check(&self, i: u64, pressure_pct: u32) -> bool {
        let interval = self.interval_for_pressure(pressure_pct);
        if i.saturating_sub(self.last_check.get()) >= interval {
            self.last_check.set(i);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_interpolates_linearly_with_pressure() {
        let pacer = AdaptiveCheckpointer::new(100, 10_000);
        assert_eq!(pacer.interval_for_pressure(0), 10_000);
        assert_eq!(pacer.interval_for_pressure(100), 100);
        assert_eq!(pacer.interval_for_pressure(50), 5_050);
    }

    #[test]
    fn should_check_respects_computed_interval() {
        let pacer = AdaptiveCheckpointer::new(100, 10_000);
        assert!(!pacer.should_check(50, 100)); // interval 100, not elapsed yet
        assert!(pacer.should_check(100, 100)); // exactly the interval
        assert!(!pacer.should_check(150, 100)); // only 50 since last check
        assert!(pacer.should_check(200, 100));
    }
}
