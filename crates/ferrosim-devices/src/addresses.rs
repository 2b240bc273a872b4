//! Peripheral address plan. These are constants, not invariants the
//! core enforces (a driver is free to map its peripherals elsewhere),
//! but they are the addresses `ferrosim-cli`'s demo wiring and this
//! crate's tests use.

/// Base of the simulated peripheral region.
pub const PERIPHERAL_BASE: u32 = 0x4000_0000;

/// UART instance `i` occupies `[uart_base(i), uart_base(i) + UART_WINDOW_LEN)`.
pub const UART_INSTANCE_BASE: u32 = 0x4000_2000;
pub const UART_INSTANCE_STRIDE: u32 = 0x1000;
pub const UART_WINDOW_LEN: u32 = 0x50;

pub fn uart_base(instance: u32) -> u32 {
    UART_INSTANCE_BASE + instance * UART_INSTANCE_STRIDE
}

/// UART register offsets, matching a conventional PrimeCell-style layout.
pub const UART_REG_DATA: u32 = 0x00;
pub const UART_REG_FLAG: u32 = 0x18;
pub const UART_REG_CONTROL: u32 = 0x30;
pub const UART_REG_DMACTRL: u32 = 0x48;

/// DMA instance `i` occupies `[dma_base(i), dma_base(i) + DMA_WINDOW_LEN)`.
pub const DMA_INSTANCE_BASE: u32 = 0x4000_6000;
pub const DMA_INSTANCE_STRIDE: u32 = 0x1000;

/// Global DMA registers span `+0x00..+0x034`.
pub const DMA_REG_GLOBAL_CONTROL: u32 = 0x00;
pub const DMA_REG_GLOBAL_STATUS: u32 = 0x04;
pub const DMA_REG_INTERRUPT_STATUS: u32 = 0x08;
pub const DMA_REG_INTERRUPT_CLEAR: u32 = 0x0C;

/// Sixteen independent channel windows starting at `+0x100`, each
/// `0x20` bytes wide (`+0x100..+0x300`); see `DESIGN.md`'s Open Questions.
pub const DMA_CHANNEL_COUNT: usize = 16;
pub const DMA_CHANNELS_BASE: u32 = 0x100;
pub const DMA_CHANNEL_STRIDE: u32 = 0x20;

pub const DMA_CHAN_REG_SRC: u32 = 0x00;
pub const DMA_CHAN_REG_DST: u32 = 0x04;
pub const DMA_CHAN_REG_SIZE: u32 = 0x08;
pub const DMA_CHAN_REG_CTRL: u32 = 0x0C;
pub const DMA_CHAN_REG_CONFIG: u32 = 0x10;

pub const DMA_WINDOW_LEN: u32 = DMA_CHANNELS_BASE + DMA_CHANNEL_STRIDE * DMA_CHANNEL_COUNT as u32;

pub fn dma_base(instance: u32) -> u32 {
    DMA_INSTANCE_BASE + instance * DMA_INSTANCE_STRIDE
}
