//! Exemplar peripheral plugins: a UART with a
//! synthetic receive stream and a multi-channel mem-to-mem DMA engine,
//! both built on the [`ferrosim_plugin::Plugin`] contract.

pub mod addresses;
pub mod dma;
pub mod memory;
pub mod uart;

pub use dma::DmaPlugin;
pub use memory::{FlatGuestMemory, GuestMemory};
pub use uart::UartPlugin;
