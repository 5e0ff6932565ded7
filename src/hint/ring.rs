use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{HintRecord, HINT_RECORD_SIZE};

/// SPSC, lossy ring buffer of [`HintRecord`]s.
///
/// `head` is written only by the kernel (producer) and read here with
/// acquire ordering; `tail` is owned by this consumer and published with
/// release ordering, mirroring the mmap'd ring buffer the upstream crate
/// reads perf samples from. Unlike that buffer, entries here are fixed
/// size, so the index arithmetic is a plain slot-count modulus rather than
/// a byte-length wraparound.
///
/// The buffer is lossy: if the producer advances `head` by more than the
/// slot count before the consumer catches up, old entries are silently
/// overwritten. [`HintRing::try_pop`] detects this and fast-forwards the
/// consumer cursor rather than returning stale data.
pub struct HintRing<'a> {
    alloc: &'a [u8],
    tail: &'a AtomicU64,
    head: &'a AtomicU64,
}

impl<'a> HintRing<'a> {
    /// # Safety
    /// `alloc` must be a whole number of [`HINT_RECORD_SIZE`]-sized slots,
    /// and `head`/`tail` must be the same atomics the kernel and this
    /// runtime respectively publish through.
    pub fn new(alloc: &'a [u8], tail: &'a AtomicU64, head: &'a AtomicU64) -> Self {
        debug_assert_eq!(alloc.len() % HINT_RECORD_SIZE, 0);
        Self { alloc, tail, head }
    }

    fn slot_count(&self) -> u64 {
        (self.alloc.len() / HINT_RECORD_SIZE) as u64
    }

    /// Pops the oldest still-available record, if any.
    pub fn try_pop(&self) -> Option<HintRecord> {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == head {
            return None;
        }

        let slots = self.slot_count();
        let lag = head - tail;
        let effective_tail = if lag > slots { head - slots } else { tail };

        let idx = (effective_tail % slots) as usize;
        let ptr = self.alloc.as_ptr().wrapping_add(idx * HINT_RECORD_SIZE);
        let record = unsafe { ptr::read_unaligned(ptr as *const HintRecord) };

        self.tail.store(effective_tail + 1, Ordering::Release);
        Some(record)
    }

    /// Drains every record currently available. Used by the defensive-mode
    /// detector, which cares about the full observed sequence, not just
    /// the newest hint.
    pub fn drain(&self) -> Vec<HintRecord> {
        let mut out = Vec::new();
        while let Some(r) = self.try_pop() {
            out.push(r);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    fn write_record(alloc: &mut [u8], idx: usize, rec: HintRecord) {
        let offset = idx * HINT_RECORD_SIZE;
        unsafe {
            ptr::write_unaligned(alloc.as_mut_ptr().add(offset) as *mut HintRecord, rec);
        }
    }

    #[test]
    fn pops_in_fifo_order() {
        let mut alloc = vec![0u8; HINT_RECORD_SIZE * 4];
        write_record(
            &mut alloc,
            0,
            HintRecord {
                seq: 1,
                reason: 1,
                target_tid: 0,
                deadline_ns: 0,
            },
        );
        write_record(
            &mut alloc,
            1,
            HintRecord {
                seq: 2,
                reason: 2,
                target_tid: 0,
                deadline_ns: 0,
            },
        );
        let tail = AtomicU64::new(0);
        let head = AtomicU64::new(2);
        let ring = HintRing::new(&alloc, &tail, &head);

        assert_eq!(ring.try_pop().unwrap().seq, 1);
        assert_eq!(ring.try_pop().unwrap().seq, 2);
        assert!(ring.try_pop().is_none());
    }

    #[test]
    fn detects_overwrite_and_fast_forwards() {
        let alloc = vec![0u8; HINT_RECORD_SIZE * 2];
        let tail = AtomicU64::new(0);
        // producer has lapped the 2-slot buffer by 3 entries
        let head = AtomicU64::new(5);
        let ring = HintRing::new(&alloc, &tail, &head);

        ring.try_pop();
        // consumer cursor should have jumped forward to head - slots, not stayed at 0
        assert!(tail.load(Ordering::Relaxed) >= 3);
    }
}
