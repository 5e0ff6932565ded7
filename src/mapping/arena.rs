use std::fs::File;
use std::io::Result;
use std::ptr::{null_mut, NonNull};
use std::slice;

use crate::ffi::{mmap, munmap};

/// An owned `mmap`'d region, shared (`MAP_SHARED`) so writes are visible to
/// the kernel on the other end.
pub struct Arena {
    ptr: NonNull<u8>,
    len: usize,
}

impl Arena {
    pub fn new(file: &File, len: usize, offset: usize) -> Result<Self> {
        let prot = libc::PROT_READ | libc::PROT_WRITE;
        let flags = libc::MAP_SHARED;
        let ptr = unsafe { mmap(null_mut(), len, prot, flags, file, offset as _) }?;
        let ptr = NonNull::new(ptr).expect("mmap returned null without reporting an error");
        Ok(Self { ptr, len })
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

// SAFETY: the region is MAP_SHARED and every access through it is a single
// atomic at a known offset (see `ScbView`/`HintRing`/`GlobalPressureView`).
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Drop for Arena {
    fn drop(&mut self) {
        match unsafe { munmap(self.ptr.as_ptr(), self.len) } {
            Ok(()) => (),
            Err(e) => panic!("failed to unmap arena: {e}"),
        }
    }
}
