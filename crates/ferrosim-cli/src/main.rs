//! Thin demo binary: wires one UART instance and one DMA instance into a
//! `Simulator`, drives them for a fixed number of ticks, and prints what
//! happened. Not a driver harness, just enough to see the core crates
//! work end to end without writing a test.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ferrosim_devices::{addresses, DmaPlugin, FlatGuestMemory, GuestMemory, UartPlugin};

/// Run a short UART + DMA demo against a simulated machine.
#[derive(Parser, Debug)]
#[command(name = "ferrosim", author, version, about)]
struct Args {
    /// Size, in bytes, of the flat guest memory backing the DMA demo.
    #[arg(long, default_value_t = 8192)]
    ram: usize,

    /// Number of `clock` ticks to advance each plugin by.
    #[arg(long, default_value_t = 4)]
    ticks: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let sim = ferrosim::Simulator::new()?;

    let uart_base = addresses::uart_base(0);
    sim.add_register_mapping(uart_base, uart_base + addresses::UART_WINDOW_LEN, "uart0")?;

    let dma_base = addresses::dma_base(0);
    sim.add_register_mapping(dma_base, dma_base + addresses::DMA_WINDOW_LEN, "dma0")?;

    let tx_count = Arc::new(AtomicU32::new(0));
    let tx_count_handler = tx_count.clone();
    sim.register_interrupt_handler(5, move || {
        tx_count_handler.fetch_add(1, Ordering::SeqCst);
    });

    sim.register_plugin(Box::new(UartPlugin::new(
        0,
        sim.interrupt_router(),
        Duration::from_millis(200),
    )?))?;

    let memory = Arc::new(FlatGuestMemory::new(args.ram));
    let pattern: Vec<u8> = (0..256u32).map(|i| i as u8).collect();
    memory.write(0, &pattern);
    sim.register_plugin(Box::new(DmaPlugin::new(0, memory.clone(), sim.interrupt_router())?))?;

    unsafe {
        std::ptr::write_volatile((uart_base + addresses::UART_REG_CONTROL) as *mut u32, 1);
        for byte in b"hello ferrosim\n" {
            std::ptr::write_volatile((uart_base + addresses::UART_REG_DATA) as *mut u32, *byte as u32);
        }

        let channel0 = dma_base + addresses::DMA_CHANNELS_BASE;
        std::ptr::write_volatile((channel0 + addresses::DMA_CHAN_REG_SRC) as *mut u32, 0);
        std::ptr::write_volatile((channel0 + addresses::DMA_CHAN_REG_DST) as *mut u32, 512);
        std::ptr::write_volatile((channel0 + addresses::DMA_CHAN_REG_SIZE) as *mut u32, 256);
        std::ptr::write_volatile((channel0 + addresses::DMA_CHAN_REG_CTRL) as *mut u32, 1);
    }

    sim.clock_plugin("uart0", ferrosim_plugin::ClockMode::Tick, args.ticks)?;
    sim.clock_plugin("dma0", ferrosim_plugin::ClockMode::Tick, args.ticks)?;

    let mut copied = vec![0u8; 256];
    memory.read(512, &mut copied);
    let dma_ok = copied == pattern;

    tracing::info!(
        tx_interrupts = tx_count.load(Ordering::SeqCst),
        dma_transfer_ok = dma_ok,
        "demo run complete"
    );

    sim.cleanup();
    Ok(())
}
