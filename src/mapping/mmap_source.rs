use std::fs::OpenOptions;
use std::io::Result;
use std::sync::atomic::AtomicU64;

use super::arena::Arena;
use super::pressure::{GlobalPressureView, GLOBAL_PRESSURE_SIZE};
use super::ScbSource;
use crate::config::Config;
use crate::hint::{HintRing, HINT_RECORD_SIZE};
use crate::scb::{ScbView, SCB_SIZE};

/// Production [`ScbSource`]: `mmap`s the files the kernel loader has
/// already placed at the paths named in [`Config`].
pub struct MmapSource {
    scb_arena: Arena,
    max_workers: u32,
    ring_arena: Option<Arena>,
    ring_tail: AtomicU64,
    pressure_arena: Option<Arena>,
}

impl MmapSource {
    /// Opens and maps `scb_map` (required), `hint_ringbuf` and
    /// `global_pressure_map` (both best-effort) from the paths in `config`.
    pub fn open(config: &Config) -> Result<Self> {
        let scb_path = config.scb_map_path()?;
        let scb_file = OpenOptions::new().read(true).write(true).open(scb_path)?;
        let scb_len = config.max_workers as usize * SCB_SIZE;
        let scb_arena = Arena::new(&scb_file, scb_len, 0)?;

        let ring_arena = config
            .hint_ringbuf_path()
            .and_then(|p| OpenOptions::new().read(true).write(true).open(p).ok())
            .and_then(|f| Arena::new(&f, config.ringbuf_size as usize, 0).ok());

        let pressure_arena = config
            .global_pressure_map_path()
            .and_then(|p| OpenOptions::new().read(true).write(true).open(p).ok())
            .and_then(|f| Arena::new(&f, GLOBAL_PRESSURE_SIZE, 0).ok());

        Ok(Self {
            scb_arena,
            max_workers: config.max_workers,
            ring_arena,
            ring_tail: AtomicU64::new(0),
            pressure_arena,
        })
    }
}

impl ScbSource for MmapSource {
    fn slot(&self, worker_id: u32) -> Option<ScbView<'_>> {
        if worker_id >= self.max_workers {
            return None;
        }
        let offset = worker_id as usize * SCB_SIZE;
        let ptr = self.scb_arena.as_mut_ptr().wrapping_add(offset);
        Some(unsafe { ScbView::from_raw(ptr) })
    }

    fn hint_ring(&self) -> Option<HintRing<'_>> {
        let arena = self.ring_arena.as_ref()?;
        let bytes = arena.as_slice();
        // first 8 bytes: producer-published head cursor; remainder: slots,
        // rounded down to a whole number, since the mapped region's total
        // size is a round byte count, not necessarily header + N slots.
        let head = unsafe { &*(bytes.as_ptr() as *const AtomicU64) };
        let usable = (bytes.len() - 8) / HINT_RECORD_SIZE * HINT_RECORD_SIZE;
        let data = &bytes[8..8 + usable];
        Some(HintRing::new(data, &self.ring_tail, head))
    }

    fn global_pressure(&self) -> Option<GlobalPressureView<'_>> {
        let arena = self.pressure_arena.as_ref()?;
        Some(unsafe { GlobalPressureView::from_raw(arena.as_slice().as_ptr()) })
    }

    fn max_workers(&self) -> u32 {
        self.max_workers
    }
}
