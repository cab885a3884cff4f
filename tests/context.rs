// This file is part of spool, a stackful coroutine runtime with
// cooperative state checkpointing.
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

// Drives the raw switch primitive without the typed layer on top.

use std::cell::Cell;
use std::ptr;

use spool::{Error, OwnedStack, StackContext};

struct Shared {
    context: StackContext,
    hits: Cell<u32>,
}

unsafe extern "sysv64" fn entry(arg: *mut u8) {
    let shared = unsafe { &*(arg as *const Shared) };
    shared.hits.set(shared.hits.get() + 1);
    unsafe { shared.context.switch_out_of() };
    shared.hits.set(shared.hits.get() + 1);
    // Returning performs the final switch back to the caller.
}

#[test]
fn raw_context_round_trip() {
    let stack = OwnedStack::new(64 * 1024);
    let shared = Box::into_raw(Box::new(Shared {
        context: StackContext::new(),
        hits: Cell::new(0),
    }));
    unsafe {
        (*shared)
            .context
            .prepare(&stack, entry, shared as *mut u8)
            .unwrap();
        (*shared).context.switch_into();
        assert_eq!((*shared).hits.get(), 1);
        (*shared).context.switch_into();
        assert_eq!((*shared).hits.get(), 2);
        drop(Box::from_raw(shared));
    }
}

#[test]
fn prepare_rejects_a_tiny_stack() {
    let stack = OwnedStack::new(64);
    let mut context = StackContext::new();
    let result = unsafe { context.prepare(&stack, entry, ptr::null_mut()) };
    assert!(matches!(result, Err(Error::StackTooSmall { size: 64, .. })));
}
