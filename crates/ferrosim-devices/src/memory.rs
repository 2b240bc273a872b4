//! Guest memory capability used by the DMA plugin's mem-to-mem transfers.
//!
//! DMA channel `src`/`dst` registers are guest addresses; something has to
//! own the byte array they index into for a transfer to actually copy
//! anything. This trait is that backing store, shaped after a `MemoryBus`
//! abstraction seen elsewhere in this codebase's lineage.
//!
//! Every method here takes `&self`: this crate's plugins are all
//! interior-mutability types dispatched through `&self`, so `GuestMemory`
//! follows the same convention rather than requiring `&mut self` through a
//! lock the caller doesn't otherwise need.

use std::sync::Mutex;

pub trait GuestMemory: Send + Sync {
    fn read(&self, addr: u32, buf: &mut [u8]);
    fn write(&self, addr: u32, buf: &[u8]);
}

/// A flat, fixed-size backing store good enough for demos and tests. Reads
/// and writes that fall outside `[0, len)` are logged and otherwise
/// ignored (reads fill with zero) rather than panicking: an out-of-range
/// DMA target is a driver bug, not a simulator crash.
pub struct FlatGuestMemory {
    bytes: Mutex<Vec<u8>>,
}

impl FlatGuestMemory {
    pub fn new(len: usize) -> Self {
        Self {
            bytes: Mutex::new(vec![0u8; len]),
        }
    }
}

impl GuestMemory for FlatGuestMemory {
    fn read(&self, addr: u32, buf: &mut [u8]) {
        let mem = self.bytes.lock().expect("guest memory poisoned");
        let start = addr as usize;
        let end = start.saturating_add(buf.len());
        if end > mem.len() {
            tracing::warn!(addr, len = buf.len(), "guest memory: read out of range, returning zero");
            buf.fill(0);
            return;
        }
        buf.copy_from_slice(&mem[start..end]);
    }

    fn write(&self, addr: u32, buf: &[u8]) {
        let mut mem = self.bytes.lock().expect("guest memory poisoned");
        let start = addr as usize;
        let end = start.saturating_add(buf.len());
        if end > mem.len() {
            tracing::warn!(addr, len = buf.len(), "guest memory: write out of range, ignored");
            return;
        }
        mem[start..end].copy_from_slice(buf);
    }
}
