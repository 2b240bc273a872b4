//! End-to-end UART scenarios driven through the real `SIGSEGV` trap path:
//! a genuine out-of-bounds pointer write to the mapped-but-guarded
//! peripheral address faults, is decoded, dispatched to the plugin, and
//! the faulting instruction resumes as if the memory access had actually
//! happened.
//!
//! Everything here runs through one `Simulator`, in one `#[test]`: the
//! trap engine installs a process-wide `SIGSEGV` handler, so a second
//! `Simulator` built concurrently in the same test binary would race it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ferrosim_devices::{addresses, UartPlugin};
use ferrosim_plugin::ClockMode;

const UART_SIGNAL: i32 = 34;
const TX_IRQ: u32 = 5;

#[inline(never)]
unsafe fn mmio_write32(addr: u32, value: u32) {
    std::ptr::write_volatile(addr as *mut u32, value);
}

#[inline(never)]
unsafe fn mmio_read32(addr: u32) -> u32 {
    std::ptr::read_volatile(addr as *const u32)
}

fn wait_for(counter: &AtomicU32, expected: u32) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if counter.load(Ordering::SeqCst) == expected {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out waiting for interrupt delivery (last seen {})", counter.load(Ordering::SeqCst));
}

#[test]
fn uart_tx_rx_and_irq_gating() {
    let sim = ferrosim::Simulator::new().expect("simulator init");

    let base = addresses::uart_base(0);
    sim.add_register_mapping(base, base + addresses::UART_WINDOW_LEN, "uart0")
        .expect("map uart0");
    sim.add_signal_mapping(UART_SIGNAL, "uart0", TX_IRQ).expect("bind tx signal");

    let tx_count = Arc::new(AtomicU32::new(0));
    let tx_count_clone = tx_count.clone();
    sim.register_interrupt_handler(TX_IRQ, move || {
        tx_count_clone.fetch_add(1, Ordering::SeqCst);
    });

    sim.register_plugin(Box::new(
        UartPlugin::new(0, sim_router(&sim), Duration::from_secs(3600)).expect("uart0"),
    ))
    .expect("register uart0");

    // Scenario 1: basic UART TX through a real trapped MMIO write.
    unsafe {
        mmio_write32(base + addresses::UART_REG_CONTROL, 1);
        mmio_write32(base + addresses::UART_REG_DATA, 0x41);
    }
    wait_for(&tx_count, 1);

    // Scenario 2: synthetic RX, advanced deterministically via `clock`,
    // then drained through a real trapped MMIO read.
    sim.clock_plugin("uart0", ClockMode::Tick, 2).expect("tick uart0");
    let a = unsafe { mmio_read32(base + addresses::UART_REG_DATA) };
    let b = unsafe { mmio_read32(base + addresses::UART_REG_DATA) };
    assert_eq!(a, b'A' as u32);
    assert_eq!(b, b'B' as u32);

    // Scenario 4: IRQ gating via the disable/enable surface, independent
    // of the MMIO path.
    sim.disable_interrupt(TX_IRQ).unwrap();
    sim.trigger_interrupt("uart0", TX_IRQ).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(tx_count.load(Ordering::SeqCst), 1, "disabled irq must not reach the handler");

    sim.enable_interrupt(TX_IRQ).unwrap();
    sim.trigger_interrupt("uart0", TX_IRQ).unwrap();
    wait_for(&tx_count, 2);

    sim.cleanup();
}

/// `UartPlugin::new` takes a router handle of its own so it can trigger
/// its TX/RX interrupts directly instead of routing through the host.
/// This hands it the `Simulator`'s own `InterruptRouter` so self-raised
/// interrupts resolve against the same signal/IRQ bindings the driver
/// installed.
fn sim_router(sim: &ferrosim::Simulator) -> Arc<ferrosim_interrupts::InterruptRouter> {
    sim.interrupt_router()
}
