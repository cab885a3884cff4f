// This file is part of spool, a stackful coroutine runtime with
// cooperative state checkpointing.
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io::Error as IoError;
use std::ptr;
use std::sync::OnceLock;

use libc::{c_int, c_void, size_t};

use crate::stack::{GuardedStack, Stack};

const GUARD_PROT: c_int = libc::PROT_NONE;
const STACK_PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
#[cfg(not(any(target_os = "freebsd", target_os = "dragonfly")))]
const STACK_FLAGS: c_int = libc::MAP_STACK | libc::MAP_PRIVATE | libc::MAP_ANON;
// workaround for http://lists.freebsd.org/pipermail/freebsd-bugs/2011-July/044840.html
// according to libgreen, DragonFlyBSD suffers from this too
#[cfg(any(target_os = "freebsd", target_os = "dragonfly"))]
const STACK_FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANON;

fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize })
}

/// OsStack holds a guarded stack allocated using the operating system's
/// anonymous memory mapping facility.
#[derive(Debug)]
pub struct OsStack {
    ptr: *mut u8,
    len: usize,
}

unsafe impl Send for OsStack {}

impl OsStack {
    /// Allocates a new stack with at least `size` accessible bytes.
    /// `size` is rounded up to an integral number of pages; `OsStack::new(0)`
    /// is legal and allocates the smallest stack this crate considers usable
    /// for panicking code, plus one guard page.
    pub fn new(size: usize) -> Result<OsStack, IoError> {
        let page_size = page_size();

        // Unwinding through a panicking coroutine needs some headroom.
        let len = if size == 0 { 16384 } else { size };

        // Round the length one page size up, using the fact that the page
        // size is a power of two.
        let len = (len + page_size - 1) & !(page_size - 1);

        // Increase the length to fit the guard page.
        let len = len + page_size;

        // Allocate a stack.
        let ptr = unsafe { libc::mmap(ptr::null_mut(), len as size_t, STACK_PROT, STACK_FLAGS, -1, 0) };
        if ptr == libc::MAP_FAILED {
            return Err(IoError::last_os_error());
        }
        let stack = OsStack {
            ptr: ptr as *mut u8,
            len,
        };

        // Mark the guard page. If this fails, `stack` is dropped, unmapping it.
        if unsafe { libc::mprotect(stack.ptr as *mut c_void, page_size as size_t, GUARD_PROT) } != 0 {
            return Err(IoError::last_os_error());
        }

        Ok(stack)
    }
}

unsafe impl Stack for OsStack {
    #[inline(always)]
    fn base(&self) -> *mut u8 {
        unsafe { self.ptr.add(self.len) }
    }

    #[inline(always)]
    fn limit(&self) -> *mut u8 {
        unsafe { self.ptr.add(page_size()) }
    }
}

unsafe impl GuardedStack for OsStack {}

impl Drop for OsStack {
    fn drop(&mut self) {
        let ret = unsafe { libc::munmap(self.ptr as *mut c_void, self.len as size_t) };
        debug_assert!(ret == 0, "cannot unmap stack");
    }
}
