//! Trap Engine: reserves guard regions for the Address
//! Map's ranges, installs a `SIGSEGV` handler, and on fault decodes the
//! offending instruction, dispatches it to the Plugin Host, and resumes the
//! faulting thread.

use std::ffi::c_void;
use std::io;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Arc, Mutex};

use ferrosim_addrmap::AddressMap;
use ferrosim_plugin::PluginHost;
use ferrosim_types::{AccessKind, FaultedRequest, PluginName, RequestIdGenerator};

use crate::decode::{decode_one, DecodedAccess, MAX_INSN_LEN};
use crate::guard::GuardRegion;
use crate::regs;
use crate::TrapError;

/// Process-wide pointer to the installed engine, used only by the raw
/// `SIGSEGV` trampoline. A signal handler is a bare C function pointer and
/// cannot capture state, so this one static is the unavoidable exception to
/// keeping state off of globals; every other table in this workspace lives
/// on an owned `Simulator`/`TrapEngine` value.
static ENGINE_PTR: AtomicPtr<TrapEngine> = AtomicPtr::new(std::ptr::null_mut());

pub struct TrapEngine {
    address_map: Mutex<AddressMap>,
    guards: Mutex<Vec<GuardRegion>>,
    host: Arc<PluginHost>,
    id_gen: RequestIdGenerator,
}

impl TrapEngine {
    pub fn new(host: Arc<PluginHost>) -> Arc<Self> {
        Arc::new(Self {
            address_map: Mutex::new(AddressMap::new()),
            guards: Mutex::new(Vec::new()),
            host,
            id_gen: RequestIdGenerator::new(),
        })
    }

    /// Registers a range in the Address Map and immediately reserves its
    /// host guard region.
    pub fn add_range(&self, start: u32, end: u32, module: PluginName) -> Result<(), TrapError> {
        let mut map = self.address_map.lock().expect("address map poisoned");
        let index = map.add(start, end, module)?;
        let range = &map.ranges()[index];
        let guard = GuardRegion::reserve(range.start as u64, range.len() as u64)
            .map_err(TrapError::GuardReservationFailed)?;
        map.set_guard_token(index, guard.start());
        self.guards.lock().expect("guard list poisoned").push(guard);
        Ok(())
    }

    /// Installs the process-wide `SIGSEGV` handler. Must be called exactly
    /// once per process; subsequent faults in the trapped ranges resume
    /// through [`TrapEngine::on_fault`].
    pub fn install(self: &Arc<Self>) -> Result<(), TrapError> {
        let raw = Arc::into_raw(self.clone()) as *mut TrapEngine;
        ENGINE_PTR.store(raw, Ordering::SeqCst);

        unsafe {
            let mut sa: libc::sigaction = std::mem::zeroed();
            sa.sa_sigaction = segv_trampoline as usize;
            sa.sa_flags = libc::SA_SIGINFO;
            libc::sigemptyset(&mut sa.sa_mask);
            if libc::sigaction(libc::SIGSEGV, &sa, std::ptr::null_mut()) != 0 {
                return Err(TrapError::InstallFailed(io::Error::last_os_error()));
            }
        }
        Ok(())
    }

    /// Handles one trapped fault. `fault_addr` is the faulting virtual
    /// address; `ctx` gives read/write access to the trapped thread's
    /// register file and instruction pointer.
    fn on_fault(&self, fault_addr: u64, ctx: &mut libc::ucontext_t) {
        let lookup = {
            let map = self.address_map.lock().expect("address map poisoned");
            map.lookup(fault_addr as u32)
                .map(|(module, _, _)| module.clone())
        };
        let Some(module) = lookup else {
            tracing::error!(addr = fault_addr, "trap engine: fault at unmapped address, aborting");
            std::process::abort();
        };

        let rip = regs::instruction_pointer(ctx);
        let bytes = unsafe { std::slice::from_raw_parts(rip as *const u8, MAX_INSN_LEN) };
        let Some(decoded) = decode_one(bytes, rip) else {
            tracing::error!(addr = fault_addr, rip, "trap engine: failed to decode faulting instruction, aborting");
            std::process::abort();
        };

        match decoded.access {
            DecodedAccess::ReadToRegister { dest } => {
                let request = self.build_request(module, fault_addr, AccessKind::Read, 0);
                let response = self.host.dispatch(request);
                if !response.is_ok() {
                    tracing::error!(addr = fault_addr, "trap engine: plugin rejected read, aborting");
                    std::process::abort();
                }
                regs::write_gpr32(ctx, dest, response.result_or_value);
            }
            DecodedAccess::WriteFromRegister { src } => {
                let value = regs::read_gpr32(ctx, src).unwrap_or(0);
                let request = self.build_request(module, fault_addr, AccessKind::Write, value);
                let response = self.host.dispatch(request);
                if !response.is_ok() {
                    tracing::error!(addr = fault_addr, "trap engine: plugin rejected write, aborting");
                    std::process::abort();
                }
            }
            DecodedAccess::WriteImmediate { value } => {
                let request = self.build_request(module, fault_addr, AccessKind::Write, value);
                let response = self.host.dispatch(request);
                if !response.is_ok() {
                    tracing::error!(addr = fault_addr, "trap engine: plugin rejected write, aborting");
                    std::process::abort();
                }
            }
            DecodedAccess::Unsupported { zero_dest } => {
                tracing::warn!(
                    addr = fault_addr,
                    rip,
                    "trap engine: unrecognised opcode at trapped address, falling back to read-of-zero"
                );
                if let Some(dest) = zero_dest {
                    regs::write_gpr32(ctx, dest, 0);
                }
            }
        }

        regs::advance_instruction_pointer(ctx, decoded.len);
    }

    fn build_request(
        &self,
        module: PluginName,
        address: u64,
        kind: AccessKind,
        value: u32,
    ) -> FaultedRequest {
        FaultedRequest {
            module,
            address: address as u32,
            kind,
            value,
            id: self.id_gen.next(),
        }
    }
}

impl Drop for TrapEngine {
    fn drop(&mut self) {
        // Restore the default disposition so a later fault (after the
        // simulator has gone away) crashes normally instead of dereferencing
        // a dangling `ENGINE_PTR`.
        unsafe {
            libc::signal(libc::SIGSEGV, libc::SIG_DFL);
        }
        let previous = ENGINE_PTR.swap(std::ptr::null_mut(), Ordering::SeqCst);
        if !previous.is_null() {
            // Safety: `install` produced this pointer via `Arc::into_raw` on
            // a clone of `self`; reclaiming it here balances that leak.
            unsafe {
                drop(Arc::from_raw(previous));
            }
        }
    }
}

extern "C" fn segv_trampoline(_signum: libc::c_int, info: *mut libc::siginfo_t, ctx: *mut c_void) {
    let engine_ptr = ENGINE_PTR.load(Ordering::SeqCst);
    if engine_ptr.is_null() {
        // A fault arrived with no engine installed; nothing sane to do.
        unsafe { libc::abort() };
    }
    let engine = unsafe { &*engine_ptr };
    let fault_addr = unsafe { (*info).si_addr() } as u64;
    let ucontext = unsafe { &mut *(ctx as *mut libc::ucontext_t) };
    engine.on_fault(fault_addr, ucontext);
}
