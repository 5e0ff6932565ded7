//! Thin wrappers over the handful of raw syscalls the mapping layer needs.
//!
//! Kept minimal and `unsafe`-at-the-boundary-only, in the same style as a
//! syscall shim that simply turns `-1`-on-error C conventions into
//! `std::io::Result`.

use std::fs::File;
use std::io::{Error, Result};
use std::os::fd::AsRawFd;

pub unsafe fn mmap(
    ptr: *mut (),
    len: usize,
    prot: i32,
    flags: i32,
    file: &File,
    offset: i64,
) -> Result<*mut u8> {
    let ptr = libc::mmap(ptr as _, len, prot, flags, file.as_raw_fd(), offset);
    if ptr != libc::MAP_FAILED {
        Ok(ptr as _)
    } else {
        Err(Error::last_os_error())
    }
}

pub unsafe fn munmap(ptr: *mut u8, len: usize) -> Result<()> {
    let result = libc::munmap(ptr as _, len);
    if result != -1 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}
