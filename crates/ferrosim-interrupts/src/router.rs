//! Interrupt Router: installs host signal handling for the
//! real-time signals bound in the Signal Map, and resolves signal -> IRQ ->
//! handler on delivery.
//!
//! Rather than running driver-visible logic inside a raw `sigaction`
//! handler, delivery is split in two: the signals this router manages are
//! blocked with `sigprocmask` and instead consumed through a `signalfd`, so
//! the kernel's signal queue does the trampolining and an ordinary
//! background thread blocked in `read(2)` does the delivery. This keeps
//! IRQ handlers free of async-signal-safety constraints; only the trap
//! engine's synchronous `SIGSEGV` handler (`ferrosim-trap`) needs those.

use std::io;
use std::mem::MaybeUninit;
use std::os::fd::RawFd;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use ferrosim_addrmap::SignalMap;
use ferrosim_types::PluginName;

use crate::{InterruptError, IrqTable};

/// Real-time signals this router is willing to claim for IRQ delivery.
fn managed_signal_range() -> std::ops::RangeInclusive<i32> {
    unsafe { libc::SIGRTMIN()..=libc::SIGRTMAX() }
}

pub struct InterruptRouter {
    signal_map: Arc<Mutex<SignalMap>>,
    irq_table: Arc<IrqTable>,
    signal_fd: RawFd,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl InterruptRouter {
    /// Blocks every managed real-time signal on the calling thread and
    /// opens the `signalfd` that will deliver them, then starts the
    /// background delivery thread. Must be called before any driver thread
    /// that could otherwise race the signal mask is spawned.
    pub fn install(irq_table: Arc<IrqTable>) -> io::Result<Self> {
        let signal_map = Arc::new(Mutex::new(SignalMap::new()));

        let mut mask: libc::sigset_t = unsafe { std::mem::zeroed() };
        unsafe {
            libc::sigemptyset(&mut mask);
            for sig in managed_signal_range() {
                libc::sigaddset(&mut mask, sig);
            }
            if libc::pthread_sigmask(libc::SIG_BLOCK, &mask, std::ptr::null_mut()) != 0 {
                return Err(io::Error::last_os_error());
            }
        }

        let fd = unsafe { libc::signalfd(-1, &mask, libc::SFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let router = Self {
            signal_map,
            irq_table,
            signal_fd: fd,
            worker: Mutex::new(None),
        };
        router.spawn_delivery_thread();
        Ok(router)
    }

    fn spawn_delivery_thread(&self) {
        let fd = self.signal_fd;
        let signal_map = self.signal_map.clone();
        let irq_table = self.irq_table.clone();
        let handle = std::thread::Builder::new()
            .name("ferrosim-irq-router".into())
            .spawn(move || {
                let mut info = MaybeUninit::<libc::signalfd_siginfo>::uninit();
                loop {
                    let n = unsafe {
                        libc::read(
                            fd,
                            info.as_mut_ptr().cast(),
                            std::mem::size_of::<libc::signalfd_siginfo>(),
                        )
                    };
                    if n <= 0 {
                        // `close()` during shutdown makes `read` fail; exit the loop.
                        break;
                    }
                    let signo = unsafe { info.assume_init_ref().ssi_signo } as i32;
                    let irq = {
                        let map = signal_map.lock().expect("signal map poisoned");
                        map.irq_for_signal(signo).map(|(_, irq)| irq)
                    };
                    match irq {
                        Some(irq) => irq_table.deliver(irq),
                        None => tracing::warn!(signal = signo, "interrupt router: signal with no irq binding"),
                    }
                }
            })
            .expect("failed to spawn interrupt router delivery thread");
        *self.worker.lock().expect("worker slot poisoned") = Some(handle);
    }

    /// Records a `(signal, module, irq)` binding. The signal must fall
    /// within the managed real-time range; this router's `signalfd` already
    /// subscribes to the whole range so no further syscall is needed.
    pub fn add_signal_binding(
        &self,
        signal: i32,
        module: PluginName,
        irq: u32,
    ) -> Result<(), InterruptError> {
        if !managed_signal_range().contains(&signal) {
            return Err(InterruptError::UnmanagedSignal(signal));
        }
        self.signal_map
            .lock()
            .expect("signal map poisoned")
            .add(signal, module, irq);
        Ok(())
    }

    /// Locates the first binding whose `(module, irq)` matches and sends
    /// the bound signal to the current process.
    pub fn trigger(&self, module: &str, irq: u32) -> Result<(), InterruptError> {
        let signal = {
            let map = self.signal_map.lock().expect("signal map poisoned");
            map.signal_for(module, irq)
        };
        match signal {
            Some(signal) => {
                let rc = unsafe { libc::raise(signal) };
                if rc != 0 {
                    return Err(InterruptError::SignalDeliveryFailed(
                        io::Error::last_os_error().into(),
                    ));
                }
                Ok(())
            }
            None => Err(InterruptError::NoBindingFor {
                module: module.to_string(),
                irq,
            }),
        }
    }
}

impl Drop for InterruptRouter {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.signal_fd);
        }
        if let Some(handle) = self.worker.lock().expect("worker slot poisoned").take() {
            let _ = handle.join();
        }
    }
}
