//! Read/write access to the trapped thread's integer register file via the
//! `ucontext_t` the kernel hands the `SIGSEGV` handler.
//!
//! This is Linux/x86-64-specific. A port to a different host ISA or OS
//! must reimplement this module: the register indices and program-counter
//! field below come straight out of glibc's `ucontext_t` layout.

use iced_x86::Register;

/// Index into `mcontext_t.gregs` for each general-purpose register, per
/// glibc's `sys/ucontext.h` (`REG_*` constants) on Linux/x86-64.
const REG_R8: usize = 0;
const REG_R9: usize = 1;
const REG_R10: usize = 2;
const REG_R11: usize = 3;
const REG_R12: usize = 4;
const REG_R13: usize = 5;
const REG_R14: usize = 6;
const REG_R15: usize = 7;
const REG_RDI: usize = 8;
const REG_RSI: usize = 9;
const REG_RBP: usize = 10;
const REG_RBX: usize = 11;
const REG_RDX: usize = 12;
const REG_RAX: usize = 13;
const REG_RCX: usize = 14;
const REG_RSP: usize = 15;
const REG_RIP: usize = 16;

/// Maps a decoded 32-bit general-purpose register to its `gregs` slot.
/// Returns `None` for anything outside the plain integer register file
/// (the trap engine only ever decodes `mov`s among GPRs, so this should
/// never miss in practice).
fn gregs_index(reg: Register) -> Option<usize> {
    use Register::*;
    Some(match reg {
        EAX => REG_RAX,
        ECX => REG_RCX,
        EDX => REG_RDX,
        EBX => REG_RBX,
        ESP => REG_RSP,
        EBP => REG_RBP,
        ESI => REG_RSI,
        EDI => REG_RDI,
        R8D => REG_R8,
        R9D => REG_R9,
        R10D => REG_R10,
        R11D => REG_R11,
        R12D => REG_R12,
        R13D => REG_R13,
        R14D => REG_R14,
        R15D => REG_R15,
        _ => return None,
    })
}

/// Reads the low 32 bits of `reg` from the trapped context.
pub fn read_gpr32(ctx: &libc::ucontext_t, reg: Register) -> Option<u32> {
    let index = gregs_index(reg)?;
    Some(ctx.uc_mcontext.gregs[index] as u64 as u32)
}

/// Writes `value` into `reg`, zero-extending to 64 bits, matching the
/// real CPU's behaviour for a 32-bit `mov` destination, which always
/// clears the upper 32 bits of the full register.
pub fn write_gpr32(ctx: &mut libc::ucontext_t, reg: Register, value: u32) -> bool {
    match gregs_index(reg) {
        Some(index) => {
            ctx.uc_mcontext.gregs[index] = value as i64;
            true
        }
        None => false,
    }
}

pub fn instruction_pointer(ctx: &libc::ucontext_t) -> u64 {
    ctx.uc_mcontext.gregs[REG_RIP] as u64
}

pub fn advance_instruction_pointer(ctx: &mut libc::ucontext_t, len: u32) {
    ctx.uc_mcontext.gregs[REG_RIP] += len as i64;
}
