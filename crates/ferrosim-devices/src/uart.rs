//! UART exemplar plugin: a single transmit/receive data
//! register, a 256-byte receive FIFO fed by a background worker that
//! synthesises bytes while idle, and edge-triggered TX/RX interrupts.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use bitflags::bitflags;
use ferrosim_interrupts::InterruptRouter;
use ferrosim_plugin::{ClockMode, Plugin, PluginError, ResetMode};
use ferrosim_types::PluginName;

use crate::addresses;

/// Capacity of the receive FIFO.
pub const RX_FIFO_CAPACITY: usize = 256;

bitflags! {
    /// Control register bits.
    #[derive(Clone, Copy)]
    pub struct UartControl: u32 {
        const ENABLE = 1 << 0;
    }
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct UartDmaControl: u32 {
        const TX_DMA_ENABLE = 1 << 0;
        const RX_DMA_ENABLE = 1 << 1;
    }
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct UartFlags: u32 {
        const RX_READY = 1 << 0;
        const TX_READY = 1 << 1;
    }
}

/// A single memory-mapped UART instance.
pub struct UartPlugin {
    name: PluginName,
    base: u32,
    fifo: Arc<Mutex<VecDeque<u8>>>,
    control: AtomicU32,
    dma_control: AtomicU32,
    rx_sequence: Arc<AtomicU32>,
    tx_count: AtomicU32,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    router: Arc<InterruptRouter>,
    tick_period: Duration,
    tx_irq: u32,
    rx_irq: u32,
}

impl UartPlugin {
    /// Builds the UART for `instance`, bound at its exemplar address.
    /// `tick_period` governs the synthetic-RX cadence; callers needing
    /// deterministic tests should drive ticks via [`Plugin::clock`]'s
    /// `ClockMode::Tick` instead of waiting on the wall-clock worker.
    pub fn new(
        instance: u32,
        router: Arc<InterruptRouter>,
        tick_period: Duration,
    ) -> Result<Self, ferrosim_types::InvalidPluginName> {
        Ok(Self {
            name: PluginName::new(format!("uart{instance}"))?,
            base: addresses::uart_base(instance),
            fifo: Arc::new(Mutex::new(VecDeque::with_capacity(RX_FIFO_CAPACITY))),
            control: AtomicU32::new(0),
            dma_control: AtomicU32::new(0),
            rx_sequence: Arc::new(AtomicU32::new(0)),
            tx_count: AtomicU32::new(0),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            router,
            tick_period,
            tx_irq: 5,
            rx_irq: 6,
        })
    }

    /// Total bytes accepted via the data register (test/diagnostic hook).
    pub fn transmitted_bytes(&self) -> u32 {
        self.tx_count.load(Ordering::SeqCst)
    }

    fn control_flags(&self) -> UartControl {
        UartControl::from_bits_truncate(self.control.load(Ordering::SeqCst))
    }

    fn flags_value(&self) -> u32 {
        let mut flags = UartFlags::TX_READY;
        let fifo_len = self.fifo.lock().expect("uart fifo poisoned").len();
        if fifo_len > 0 {
            flags |= UartFlags::RX_READY;
        }
        flags.bits()
    }

    fn pop_fifo(&self) -> u32 {
        let mut fifo = self.fifo.lock().expect("uart fifo poisoned");
        fifo.pop_front().unwrap_or(0) as u32
    }

    fn handle_tx(&self, value: u32) {
        self.tx_count.fetch_add(1, Ordering::SeqCst);
        if self.control_flags().contains(UartControl::ENABLE) {
            if let Err(err) = self.router.trigger(self.name.as_str(), self.tx_irq) {
                tracing::warn!(module = %self.name, irq = self.tx_irq, %err, "uart: tx interrupt delivery failed");
            }
        }
        tracing::debug!(module = %self.name, value, "uart: byte transmitted");
    }

    fn handle_control_write(&self, value: u32) {
        let old = UartControl::from_bits_truncate(self.control.swap(value, Ordering::SeqCst));
        let new = UartControl::from_bits_truncate(value);
        if !old.contains(UartControl::ENABLE) && new.contains(UartControl::ENABLE) {
            self.start_worker();
        } else if old.contains(UartControl::ENABLE) && !new.contains(UartControl::ENABLE) {
            self.stop_worker();
        }
    }

    fn handle_dma_control_write(&self, value: u32) {
        let old = self.dma_control.swap(value, Ordering::SeqCst);
        let changed = UartDmaControl::from_bits_truncate(old ^ value);
        tracing::info!(module = %self.name, ?changed, "uart: dma-control enable bits changed");
    }

    fn start_worker(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let running = self.running.clone();
        let fifo = self.fifo.clone();
        let router = self.router.clone();
        let name = self.name.clone();
        let period = self.tick_period;
        let rx_sequence = self.rx_sequence.clone();
        let rx_irq = self.rx_irq;
        let handle = std::thread::Builder::new()
            .name(format!("ferrosim-uart-{name}"))
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    std::thread::sleep(period);
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    synthesize_rx_byte(&fifo, &rx_sequence, &router, name.as_str(), rx_irq);
                }
            })
            .expect("failed to spawn uart rx worker");
        *self.worker.lock().expect("uart worker slot poisoned") = Some(handle);
    }

    fn stop_worker(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().expect("uart worker slot poisoned").take() {
            let _ = handle.join();
        }
    }

    /// Advances the synthetic-RX state machine by `ticks` steps without a
    /// background thread, for deterministic tests and for
    /// [`Plugin::clock`]'s `ClockMode::Tick`.
    fn tick_manually(&self, ticks: u64) {
        for _ in 0..ticks {
            synthesize_rx_byte(&self.fifo, &self.rx_sequence, &self.router, self.name.as_str(), self.rx_irq);
        }
    }
}

fn synthesize_rx_byte(
    fifo: &Mutex<VecDeque<u8>>,
    rx_sequence: &AtomicU32,
    router: &InterruptRouter,
    module: &str,
    rx_irq: u32,
) {
    let mut guard = fifo.lock().expect("uart fifo poisoned");
    if guard.is_empty() {
        let k = rx_sequence.fetch_add(1, Ordering::SeqCst);
        let byte = b'A' + (k % 26) as u8;
        if guard.len() < RX_FIFO_CAPACITY {
            guard.push_back(byte);
        }
        drop(guard);
        if let Err(err) = router.trigger(module, rx_irq) {
            tracing::warn!(module, irq = rx_irq, %err, "uart: rx interrupt delivery failed");
        }
    }
}

impl Plugin for UartPlugin {
    fn name(&self) -> &PluginName {
        &self.name
    }

    fn init(&self) -> Result<(), PluginError> {
        Ok(())
    }

    fn cleanup(&self) {
        self.stop_worker();
    }

    fn reset(&self, mode: ResetMode) -> Result<(), PluginError> {
        if mode == ResetMode::Assert {
            self.stop_worker();
            self.fifo.lock().expect("uart fifo poisoned").clear();
            self.control.store(0, Ordering::SeqCst);
            self.dma_control.store(0, Ordering::SeqCst);
            self.rx_sequence.store(0, Ordering::SeqCst);
        }
        Ok(())
    }

    fn clock(&self, mode: ClockMode, cycles: u64) -> Result<(), PluginError> {
        match mode {
            ClockMode::Tick => {
                if self.control_flags().contains(UartControl::ENABLE) {
                    self.tick_manually(cycles.max(1));
                }
            }
            ClockMode::Enable | ClockMode::Disable => {
                tracing::debug!(module = %self.name, ?mode, "uart: clock enable/disable is informational; enable state is driven by the control register");
            }
        }
        Ok(())
    }

    fn read(&self, addr: u32) -> u32 {
        match addr - self.base {
            addresses::UART_REG_DATA => self.pop_fifo(),
            addresses::UART_REG_FLAG => self.flags_value(),
            addresses::UART_REG_CONTROL => self.control.load(Ordering::SeqCst),
            addresses::UART_REG_DMACTRL => self.dma_control.load(Ordering::SeqCst),
            other => {
                tracing::warn!(module = %self.name, offset = other, "uart: read of unknown register");
                0
            }
        }
    }

    fn write(&self, addr: u32, value: u32) -> Result<(), PluginError> {
        match addr - self.base {
            addresses::UART_REG_DATA => self.handle_tx(value),
            addresses::UART_REG_FLAG => {
                tracing::warn!(module = %self.name, "uart: write to read-only flag register ignored");
            }
            addresses::UART_REG_CONTROL => self.handle_control_write(value),
            addresses::UART_REG_DMACTRL => self.handle_dma_control_write(value),
            other => {
                tracing::warn!(module = %self.name, offset = other, "uart: write to unknown register ignored");
            }
        }
        Ok(())
    }
}
