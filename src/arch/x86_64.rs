// This file is part of spool, a stackful coroutine runtime with
// cooperative state checkpointing.
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

// To understand the code in this file, keep in mind these facts:
// * The x86-64 SysV ABI requires the stack to be aligned at function entry,
//   so that (%rsp + 8) is a multiple of 16. The swap routine below is entered
//   by `call` and left by `ret` on both stacks, so the requirement holds on
//   either side as long as the initial stack image preserves it.
// * Only the callee-saved integer registers {rbp, rbx, r12-r15} are spilled
//   around a switch. The swap routine is an ordinary function call at the
//   language level, so the compiler already treats every caller-saved
//   register (and memory) as clobbered across it.
// * The first switch into a fresh stack "returns" into `stack_start`, which
//   finds the owning context through %rbx. The initial stack image places the
//   context address in the %rbx slot of the register block, so it survives
//   the restore epilogue of `swap`.

use core::arch::naked_asm;

/// Offsets of the context fields consumed by `stack_start`. The context
/// layout is defined in `crate::context` and checked against these constants.
pub(crate) const CALLER_SP_OFFSET: usize = 0;
pub(crate) const OWN_SP_OFFSET: usize = 8;
pub(crate) const ENTRY_OFFSET: usize = 16;
pub(crate) const ARG_OFFSET: usize = 24;

/// Alignment required of a stack base address on this platform.
pub const STACK_ALIGNMENT: usize = 16;

/// A saved stack pointer of a suspended side of a switch.
///
/// Only meaningful between the `swap` that stored it and the `swap` that
/// loads it again; the frame it points into lives on the suspended stack.
#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub(crate) struct StackPointer(*mut usize);

impl StackPointer {
    pub(crate) const fn null() -> StackPointer {
        StackPointer(core::ptr::null_mut())
    }
}

/// Saves the callee-saved registers and the stack pointer of the running
/// side through `save`, then resumes whatever `load` points at.
///
/// # Safety
///
/// `save` must be writable and `load` must hold either a pointer produced by
/// a previous spill through `swap` or the initial image built by `init`.
#[unsafe(naked)]
pub(crate) unsafe extern "sysv64" fn swap(save: *mut StackPointer, load: *const StackPointer) {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov [rdi], rsp",
        "mov rsp, [rsi]",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    )
}

/// First-entry trampoline. The restore epilogue of `swap` leaves the context
/// address in %rbx; the entry function and its argument are read from there.
/// When the entry function returns, the coroutine stack is abandoned with one
/// final switch back to the caller.
#[unsafe(naked)]
unsafe extern "sysv64" fn stack_start() {
    naked_asm!(
        "mov rdi, [rbx + {arg}]",
        "sub rsp, 8",
        "call qword ptr [rbx + {entry}]",
        "lea rdi, [rbx + {own_sp}]",
        "mov rsi, rbx",
        "call {swap}",
        "ud2",
        arg = const ARG_OFFSET,
        entry = const ENTRY_OFFSET,
        own_sp = const OWN_SP_OFFSET,
        swap = sym swap,
    )
}

/// Builds the initial stack image: a register block for `swap`'s restore
/// epilogue with `context` in the %rbx slot, returning into `stack_start`.
///
/// # Safety
///
/// `base` must be the 16-byte-aligned base of a writable stack with room for
/// the image, and `context` must stay at that address until the final switch
/// out of the stack.
pub(crate) unsafe fn init(base: *mut u8, context: *const u8) -> StackPointer {
    unsafe fn push(sp: &mut *mut usize, value: usize) {
        *sp = sp.sub(1);
        **sp = value;
    }

    debug_assert!(base as usize % STACK_ALIGNMENT == 0);

    let mut sp = base as *mut usize;
    push(&mut sp, 0); // padding, so stack_start runs with the usual entry alignment
    push(&mut sp, stack_start as usize); // `ret` target of the first swap
    push(&mut sp, 0); // rbp
    push(&mut sp, context as usize); // rbx
    push(&mut sp, 0); // r12
    push(&mut sp, 0); // r13
    push(&mut sp, 0); // r14
    push(&mut sp, 0); // r15
    StackPointer(sp)
}
