// This file is part of spool, a stackful coroutine runtime with
// cooperative state checkpointing.
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! spool provides stackful symmetric coroutines: resumable functions that
//! run on a private call stack, suspend at any call depth, and move typed
//! values across each switch without copies. On top of that it provides
//! cooperative state checkpointing, so a coroutine can persist named locals
//! to a byte stream and a fresh coroutine can fast-forward past work a
//! previous run (or a previous process) already did.
//!
//! The crate is a single-threaded cooperative primitive: exactly one of the
//! caller and the coroutine runs at any instant, a coroutine is pinned to
//! the thread that created it, and nothing here preempts anything.
//!
//! # Coroutines
//!
//! ```
//! use spool::{Coroutine, Yielder};
//!
//! let mut counter = Coroutine::new(|yielder: &Yielder<(), i32>, ()| {
//!     for i in 0..3 {
//!         yielder.suspend(i);
//!     }
//!     3
//! });
//! for expected in 0..=3 {
//!     assert_eq!(counter.resume(()).unwrap(), expected);
//! }
//! assert!(counter.is_finished());
//! ```
//!
//! # Checkpoints
//!
//! ```
//! use spool::{CheckpointState, Coroutine, Yielder};
//!
//! fn body(yielder: &Yielder<&CheckpointState<'_>, i32>, state: &CheckpointState<'_>) -> i32 {
//!     let i = state.enrol("i", 0);
//!     while i.get() < 2 {
//!         let next = i.update(|v| {
//!             *v += 1;
//!             *v
//!         });
//!         yielder.suspend(next);
//!     }
//!     i.update(|v| {
//!         *v += 1;
//!         *v
//!     })
//! }
//!
//! // First run: drive one step, then persist the live state.
//! let state = CheckpointState::new(std::io::empty());
//! let mut coroutine: Coroutine<&CheckpointState, i32> = Coroutine::new(body);
//! assert_eq!(coroutine.resume(&state).unwrap(), 1);
//! let mut snapshot = Vec::new();
//! state.store(&mut snapshot).unwrap();
//!
//! // Second run: a fresh coroutine picks up where the snapshot left off.
//! let state = CheckpointState::new(&snapshot[..]);
//! let mut coroutine: Coroutine<&CheckpointState, i32> = Coroutine::new(body);
//! assert_eq!(coroutine.resume(&state).unwrap(), 2);
//! assert_eq!(coroutine.resume(&state).unwrap(), 3);
//! ```

mod arch;
mod context;
mod debug;
mod error;
mod macros;
mod slot;

pub mod checkpoint;
pub mod coroutine;
pub mod stack;

pub use crate::arch::STACK_ALIGNMENT;
pub use crate::checkpoint::{CheckpointState, SaveValue, Saved};
pub use crate::context::{EntryFn, StackContext};
pub use crate::coroutine::{Coroutine, Yielder};
pub use crate::error::Error;
pub use crate::stack::{
    GuardedStack, OsStack, OwnedStack, SliceStack, Stack, DEFAULT_STACK_SIZE, MIN_STACK_SIZE,
};
