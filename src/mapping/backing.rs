use std::cell::UnsafeCell;
use std::sync::atomic::AtomicU64;

use super::pressure::{GlobalPressureView, GLOBAL_PRESSURE_SIZE};
use super::ScbSource;
use crate::hint::{HintRecord, HintRing, HINT_RECORD_SIZE};
use crate::scb::{ScbView, SCB_SIZE};

/// In-process stand-in for the kernel's shared memory, used by tests and
/// by any host that wants fully-functional Morpheus semantics without a
/// real kernel component. Unlike [`super::StubSource`], this gives real
/// answers: a `BackingStore` is a legitimate place to drive the scenarios
/// in the testable-properties section, because nothing here is neutral or
/// synthetic in the "always false" sense, only the origin of the bytes is.
pub struct BackingStore {
    scb: UnsafeCell<Box<[u8]>>,
    max_workers: u32,
    ring: UnsafeCell<Box<[u8]>>,
    ring_tail: AtomicU64,
    pressure: UnsafeCell<Box<[u8; GLOBAL_PRESSURE_SIZE]>>,
}

// SAFETY: callers only ever take disjoint, offset-addressed atomic views
// into these buffers (see `slot`/`hint_ring`/`global_pressure`).
unsafe impl Send for BackingStore {}
unsafe impl Sync for BackingStore {}

impl BackingStore {
    /// Builds a backing store with `max_workers` SCB slots and a ring
    /// buffer sized to hold `ring_slots` hint records.
    pub fn new(max_workers: u32, ring_slots: usize) -> Self {
        let scb_len = max_workers as usize * SCB_SIZE;
        Self {
            scb: UnsafeCell::new(vec![0u8; scb_len].into_boxed_slice()),
            max_workers,
            ring: UnsafeCell::new(
                vec![0u8; 8 + ring_slots * HINT_RECORD_SIZE].into_boxed_slice(),
            ),
            ring_tail: AtomicU64::new(0),
            pressure: UnsafeCell::new(Box::new([0u8; GLOBAL_PRESSURE_SIZE])),
        }
    }

    /// Convenience constructor for single-worker unit tests.
    pub fn single_worker() -> Self {
        Self::new(1, 16)
    }

    fn ring_head_ptr(&self) -> *mut AtomicU64 {
        unsafe { (*self.ring.get()).as_mut_ptr() as *mut AtomicU64 }
    }

    /// Appends a hint record to the ring and advances the producer's head
    /// cursor, as the kernel producer would. Test/harness-only.
    pub fn push_hint(&self, record: HintRecord) {
        let ring = unsafe { &mut *self.ring.get() };
        let slots = (ring.len() - 8) / HINT_RECORD_SIZE;
        let head_atomic = unsafe { &*self.ring_head_ptr() };
        let head = head_atomic.load(std::sync::atomic::Ordering::Relaxed);
        let idx = (head % slots as u64) as usize;
        let offset = 8 + idx * HINT_RECORD_SIZE;
        unsafe {
            std::ptr::write_unaligned(
                ring.as_mut_ptr().add(offset) as *mut HintRecord,
                record,
            );
        }
        head_atomic.store(head + 1, std::sync::atomic::Ordering::Release);
    }
}

impl ScbSource for BackingStore {
    fn slot(&self, worker_id: u32) -> Option<ScbView<'_>> {
        if worker_id >= self.max_workers {
            return None;
        }
        let offset = worker_id as usize * SCB_SIZE;
        let ptr = unsafe { (*self.scb.get()).as_mut_ptr().add(offset) };
        Some(unsafe { ScbView::from_raw(ptr) })
    }

    fn hint_ring(&self) -> Option<HintRing<'_>> {
        let ring = unsafe { &*self.ring.get() };
        let head = unsafe { &*self.ring_head_ptr() };
        Some(HintRing::new(&ring[8..], &self.ring_tail, head))
    }

    fn global_pressure(&self) -> Option<GlobalPressureView<'_>> {
        let ptr = unsafe { (*self.pressure.get()).as_ptr() };
        Some(unsafe { GlobalPressureView::from_raw(ptr) })
    }

    fn max_workers(&self) -> u32 {
        self.max_workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_out_of_range_is_none() {
        let store = BackingStore::new(2, 4);
        assert!(store.slot(0).is_some());
        assert!(store.slot(1).is_some());
        assert!(store.slot(2).is_none());
    }

    #[test]
    fn push_hint_is_observable_through_ring() {
        let store = BackingStore::single_worker();
        store.push_hint(HintRecord {
            seq: 1,
            reason: 1,
            target_tid: 0,
            deadline_ns: 0,
        });
        let ring = store.hint_ring().unwrap();
        assert_eq!(ring.try_pop().unwrap().seq, 1);
    }
}
