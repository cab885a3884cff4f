// This file is part of spool, a stackful coroutine runtime with
// cooperative state checkpointing.
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

#[cfg(all(unix, target_arch = "x86_64"))]
mod x86_64;
#[cfg(all(unix, target_arch = "x86_64"))]
pub(crate) use self::x86_64::{init, swap, StackPointer};
#[cfg(all(unix, target_arch = "x86_64"))]
pub use self::x86_64::STACK_ALIGNMENT;

#[cfg(not(all(unix, target_arch = "x86_64")))]
compile_error!("spool requires x86_64 with the System V ABI");

#[cfg(all(unix, target_arch = "x86_64"))]
pub(crate) use self::x86_64::{ARG_OFFSET, CALLER_SP_OFFSET, ENTRY_OFFSET, OWN_SP_OFFSET};
