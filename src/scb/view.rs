//! Atomic accessor over one 128-byte SCB slot.
//!
//! `ScbView` never copies the slot; every read or write reinterprets a
//! sub-slice of the backing bytes as an atomic in place, the same way the
//! upstream ring-buffer reader reinterprets mmap'd kernel pages rather than
//! parsing them into owned structs.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use super::{
    OFF_BUDGET_REMAINING_NS, OFF_ESCALATION_POLICY, OFF_ESCAPABLE, OFF_IS_IN_CRITICAL_SECTION,
    OFF_KERNEL_PRESSURE_LEVEL, OFF_LAST_ACK_SEQ, OFF_LAST_YIELD_REASON, OFF_PREEMPT_SEQ,
    OFF_RUNTIME_PRIORITY, OFF_WORKER_STATE, SCB_SIZE,
};

/// A view bound to one worker's SCB slot.
///
/// `base` must point at `SCB_SIZE` readable/writable bytes, 8-byte aligned,
/// for the whole lifetime `'a`. Construction is the only unsafe step; every
/// method afterwards is a single atomic operation.
#[derive(Clone, Copy)]
pub struct ScbView<'a> {
    base: *mut u8,
    _marker: std::marker::PhantomData<&'a ()>,
}

// SAFETY: every access goes through an atomic at a fixed offset; the view
// itself carries no interior mutability beyond that.
unsafe impl Send for ScbView<'_> {}
unsafe impl Sync for ScbView<'_> {}

impl<'a> ScbView<'a> {
    /// # Safety
    /// `base` must point to `SCB_SIZE` bytes, aligned to 8, valid for `'a`,
    /// and not concurrently mutated except through the same atomic field
    /// widths this type uses.
    pub unsafe fn from_raw(base: *mut u8) -> Self {
        debug_assert_eq!(base as usize % 8, 0, "SCB slot must be 8-byte aligned");
        Self {
            base,
            _marker: std::marker::PhantomData,
        }
    }

    /// Builds a view over an in-memory byte slice, e.g. a test fixture or
    /// the in-process backing store. The slice must be exactly `SCB_SIZE`.
    pub fn from_slice(bytes: &'a mut [u8]) -> Self {
        assert_eq!(bytes.len(), SCB_SIZE);
        unsafe { Self::from_raw(bytes.as_mut_ptr()) }
    }

    #[inline]
    unsafe fn atomic_u64(&self, offset: usize) -> &'a AtomicU64 {
        &*(self.base.add(offset) as *const AtomicU64)
    }

    #[inline]
    unsafe fn atomic_u32(&self, offset: usize) -> &'a AtomicU32 {
        &*(self.base.add(offset) as *const AtomicU32)
    }

    #[inline]
    pub fn read_preempt_seq(&self) -> u64 {
        unsafe { self.atomic_u64(OFF_PREEMPT_SEQ) }.load(Ordering::Acquire)
    }

    #[inline]
    pub fn read_last_ack_seq(&self) -> u64 {
        unsafe { self.atomic_u64(OFF_LAST_ACK_SEQ) }.load(Ordering::Acquire)
    }

    #[inline]
    pub fn read_budget(&self) -> u64 {
        unsafe { self.atomic_u64(OFF_BUDGET_REMAINING_NS) }.load(Ordering::Acquire)
    }

    #[inline]
    pub fn read_pressure(&self) -> u32 {
        unsafe { self.atomic_u32(OFF_KERNEL_PRESSURE_LEVEL) }.load(Ordering::Acquire)
    }

    #[inline]
    pub fn read_state(&self) -> u32 {
        unsafe { self.atomic_u32(OFF_WORKER_STATE) }.load(Ordering::Acquire)
    }

    #[inline]
    pub fn read_critical_count(&self) -> u32 {
        unsafe { self.atomic_u32(OFF_IS_IN_CRITICAL_SECTION) }.load(Ordering::Acquire)
    }

    #[inline]
    pub fn read_escapable(&self) -> bool {
        unsafe { self.atomic_u32(OFF_ESCAPABLE) }.load(Ordering::Acquire) != 0
    }

    #[inline]
    pub fn read_priority(&self) -> u32 {
        unsafe { self.atomic_u32(OFF_RUNTIME_PRIORITY) }.load(Ordering::Acquire)
    }

    #[inline]
    pub fn read_yield_reason(&self) -> u32 {
        unsafe { self.atomic_u32(OFF_LAST_YIELD_REASON) }.load(Ordering::Acquire)
    }

    #[inline]
    pub fn store_ack(&self, seq: u64) {
        unsafe { self.atomic_u64(OFF_LAST_ACK_SEQ) }.store(seq, Ordering::Release);
    }

    #[inline]
    pub fn store_preempt_seq(&self, seq: u64) {
        unsafe { self.atomic_u64(OFF_PREEMPT_SEQ) }.store(seq, Ordering::Release);
    }

    #[inline]
    pub fn store_budget(&self, ns: u64) {
        unsafe { self.atomic_u64(OFF_BUDGET_REMAINING_NS) }.store(ns, Ordering::Release);
    }

    #[inline]
    pub fn store_pressure(&self, pct: u32) {
        unsafe { self.atomic_u32(OFF_KERNEL_PRESSURE_LEVEL) }.store(pct, Ordering::Release);
    }

    #[inline]
    pub fn store_state(&self, state: u32) {
        unsafe { self.atomic_u32(OFF_WORKER_STATE) }.store(state, Ordering::Release);
    }

    #[inline]
    pub fn store_escapable(&self, escapable: bool) {
        unsafe { self.atomic_u32(OFF_ESCAPABLE) }.store(escapable as u32, Ordering::Release);
    }

    #[inline]
    pub fn store_priority(&self, priority: u8) {
        unsafe { self.atomic_u32(OFF_RUNTIME_PRIORITY) }.store(priority as u32, Ordering::Release);
    }

    #[inline]
    pub fn store_yield_reason(&self, reason: u32) {
        unsafe { self.atomic_u32(OFF_LAST_YIELD_REASON) }.store(reason, Ordering::Release);
    }

    #[inline]
    pub fn store_escalation_policy(&self, policy: u32) {
        unsafe { self.atomic_u32(OFF_ESCALATION_POLICY) }.store(policy, Ordering::Release);
    }

    /// Re-entrant increment of `is_in_critical_section`. Returns the new count.
    #[inline]
    pub fn inc_critical(&self) -> u32 {
        unsafe { self.atomic_u32(OFF_IS_IN_CRITICAL_SECTION) }.fetch_add(1, Ordering::Release) + 1
    }

    /// Re-entrant decrement, clamped at zero (critical-section underflow is
    /// not supposed to happen, but must never wrap). Returns the count
    /// observed *before* the decrement, so callers can detect underflow
    /// (a previous count of zero means this call had no matching entry).
    #[inline]
    pub fn dec_critical(&self) -> u32 {
        unsafe { self.atomic_u32(OFF_IS_IN_CRITICAL_SECTION) }
            .fetch_update(Ordering::Release, Ordering::Acquire, |c| {
                Some(c.saturating_sub(1))
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scb::SCB_SIZE;

    #[test]
    fn round_trips_preempt_and_ack_seq() {
        let mut buf = vec![0u8; SCB_SIZE];
        let view = ScbView::from_slice(&mut buf);
        assert_eq!(view.read_preempt_seq(), 0);
        view.store_preempt_seq(7);
        assert_eq!(view.read_preempt_seq(), 7);
        view.store_ack(7);
        assert_eq!(view.read_last_ack_seq(), 7);
    }

    #[test]
    fn critical_count_is_reentrant_and_clamped() {
        let mut buf = vec![0u8; SCB_SIZE];
        let view = ScbView::from_slice(&mut buf);
        assert_eq!(view.inc_critical(), 1);
        assert_eq!(view.inc_critical(), 2);
        assert_eq!(view.dec_critical(), 2); // previous count, now 1
        assert_eq!(view.dec_critical(), 1); // previous count, now 0
        // underflow clamps rather than wraps; previous count already 0
        assert_eq!(view.dec_critical(), 0);
        assert_eq!(view.read_critical_count(), 0);
    }
}
