// This file is part of spool, a stackful coroutine runtime with
// cooperative state checkpointing.
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

/// Runs a block at most once across checkpointed reruns of a coroutine body.
///
/// Expands to [`CheckpointState::run_once`](crate::CheckpointState::run_once)
/// with a site id derived from the source location, so every lexical
/// occurrence gets its own guard flag.
///
/// ```
/// use spool::{run_once, CheckpointState};
///
/// let state = CheckpointState::new(std::io::empty());
/// let mut ran = false;
/// run_once!(state, {
///     ran = true;
/// });
/// assert!(ran);
/// ```
#[macro_export]
macro_rules! run_once {
    ($state:expr, $body:block) => {
        $state.run_once(concat!(file!(), ":", line!(), ":", column!()), || $body)
    };
}
