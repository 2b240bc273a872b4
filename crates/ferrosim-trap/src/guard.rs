//! Guard regions: host virtual-memory reservations, page-aligned and sized
//! to cover a register range, marked inaccessible so any driver access to
//! them faults.

use std::ffi::c_void;
use std::io;

fn page_size() -> u64 {
    // `sysconf` rather than a hardcoded 4096 so this also behaves on hosts
    // with larger base pages (e.g. some arm64 kernels).
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as u64 }
}

fn page_align_len(start: u64, len: u64) -> (u64, u64) {
    let page = page_size();
    let aligned_start = start - (start % page);
    let end = start + len;
    let aligned_end = end + ((page - (end % page)) % page);
    (aligned_start, aligned_end - aligned_start)
}

/// A single `mmap`'d, `PROT_NONE` region reserved at a fixed guest virtual
/// address. Driver pointer literals are identity-mapped, so the guest's
/// nominal peripheral address must be exactly where we reserve this region,
/// not wherever `mmap` would otherwise choose to place it.
pub struct GuardRegion {
    addr: u64,
    len: u64,
}

impl GuardRegion {
    /// Reserves `[start, start+len)`, expanded to whole pages, as
    /// inaccessible. Fails if the range cannot be placed at its nominal
    /// address.
    pub fn reserve(start: u64, len: u64) -> io::Result<Self> {
        let (addr, len) = page_align_len(start, len);
        let ptr = unsafe {
            libc::mmap(
                addr as *mut c_void,
                len as usize,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_FIXED_NOREPLACE,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        if ptr as u64 != addr {
            // Should not happen with MAP_FIXED_NOREPLACE (it fails instead
            // of relocating), but guard against a misbehaving kernel.
            unsafe {
                libc::munmap(ptr, len as usize);
            }
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("guard region placed at {:#x}, wanted {:#x}", ptr as u64, addr),
            ));
        }
        Ok(Self { addr, len })
    }

    pub fn start(&self) -> u64 {
        self.addr
    }

    pub fn end(&self) -> u64 {
        self.addr + self.len
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.addr && addr < self.end()
    }
}

impl Drop for GuardRegion {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.addr as *mut c_void, self.len as usize);
        }
    }
}

// Safety: the region is only ever read by the kernel's fault machinery and
// never dereferenced by us; moving/sharing the handle across threads is
// sound.
unsafe impl Send for GuardRegion {}
unsafe impl Sync for GuardRegion {}
