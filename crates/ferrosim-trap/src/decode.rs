//! Minimal x86-64 instruction decode for the trap engine.
//!
//! Rather than hand-rolling an opcode table, this wraps a proven,
//! table-driven decoder backend (`iced-x86`) and only inspects the result
//! for the handful of MMIO access shapes a fault handler actually cares
//! about: register-to-memory stores and loads, and immediate stores.

use iced_x86::{Code, Decoder, DecoderOptions, OpKind, Register};

/// The three MMIO access shapes the trap engine understands, plus a
/// best-effort fallback for everything else the decoder can still parse.
#[derive(Debug, Clone, Copy)]
pub enum DecodedAccess {
    /// `mov reg, [reg]`: a 32-bit load.
    ReadToRegister { dest: Register },
    /// `mov [reg], reg`: a 32-bit store of a register's low 32 bits.
    WriteFromRegister { src: Register },
    /// `mov [reg], imm32`: a 32-bit store of an embedded immediate.
    WriteImmediate { value: u32 },
    /// Decoded successfully but not one of the three supported forms.
    /// `zero_dest` names a register-destination operand to zero, when the
    /// instruction has one, so the fallback can still produce *some*
    /// "read of zero" effect instead of silently doing nothing.
    Unsupported { zero_dest: Option<Register> },
}

#[derive(Debug, Clone, Copy)]
pub struct Decoded {
    pub access: DecodedAccess,
    /// Instruction length in bytes, used to advance the instruction
    /// pointer past the faulting instruction.
    pub len: u32,
}

/// Longest instruction this decoder will ever need to consider. x86-64
/// instructions are at most 15 bytes; the bare `mov`s we support are much
/// shorter, but prefixes (REX, segment overrides) can extend them.
pub const MAX_INSN_LEN: usize = 15;

/// Decodes the single instruction at `rip` from `bytes` (at least
/// [`MAX_INSN_LEN`] bytes starting at `rip`, or fewer at the tail of a
/// mapped page). Returns `None` only when the bytes do not form *any*
/// valid x86-64 instruction; that case is unrecoverable and is the
/// trap engine's responsibility to treat as fatal, since we cannot even
/// determine how far to advance the instruction pointer.
pub fn decode_one(bytes: &[u8], rip: u64) -> Option<Decoded> {
    let mut decoder = Decoder::with_ip(64, bytes, rip, DecoderOptions::NONE);
    if !decoder.can_decode() {
        return None;
    }
    let instr = decoder.decode();
    if instr.is_invalid() {
        return None;
    }
    let len = instr.len() as u32;

    let access = match instr.code() {
        Code::Mov_r32_rm32 if instr.op1_kind() == OpKind::Memory => DecodedAccess::ReadToRegister {
            dest: instr.op0_register(),
        },
        Code::Mov_rm32_r32 if instr.op0_kind() == OpKind::Memory => {
            DecodedAccess::WriteFromRegister {
                src: instr.op1_register(),
            }
        }
        Code::Mov_rm32_imm32 if instr.op0_kind() == OpKind::Memory => {
            DecodedAccess::WriteImmediate {
                value: instr.immediate32(),
            }
        }
        _ => {
            let zero_dest = (instr.op_count() > 0 && instr.op0_kind() == OpKind::Register)
                .then(|| instr.op0_register());
            DecodedAccess::Unsupported { zero_dest }
        }
    };

    Some(Decoded { access, len })
}
