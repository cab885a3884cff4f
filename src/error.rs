// This file is part of spool, a stackful coroutine runtime with
// cooperative state checkpointing.
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

/// Errors surfaced by coroutine construction and resumption.
///
/// A panic inside the coroutine body is not an `Error`: it is re-raised on
/// the caller's stack by the `resume` that observed it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The entry function has returned (or panicked); the coroutine cannot
    /// be resumed again.
    #[error("coroutine has already finished")]
    AlreadyFinished,
    /// The stack handed to a coroutine is below the platform minimum.
    #[error("stack of {size} bytes is below the {min} byte minimum")]
    StackTooSmall {
        /// Usable bytes of the rejected stack.
        size: usize,
        /// The minimum this platform accepts.
        min: usize,
    },
}
