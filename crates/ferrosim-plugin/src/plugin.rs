//! The plugin contract: every concrete peripheral model implements this
//! trait. Methods take `&self`, since a plugin's state is mutated both by
//! the Plugin Host's dispatch of reads/writes and by the plugin's own
//! background worker(s), so each concrete plugin is responsible for its
//! own interior synchronisation (atomics, a `Mutex` over its register
//! file, etc).

use ferrosim_types::PluginName;

use crate::PluginError;

/// `reset` input.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ResetMode {
    Assert,
    Deassert,
}

/// `clock` input.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ClockMode {
    Tick,
    Enable,
    Disable,
}

pub trait Plugin: Send + Sync {
    /// The plugin's unique, registry-assigned name (e.g. `uart0`).
    fn name(&self) -> &PluginName;

    /// Allocates per-instance state and may spawn background workers.
    fn init(&self) -> Result<(), PluginError>;

    /// Stops workers and frees state. Idempotent.
    fn cleanup(&self);

    /// On `Assert`: zero state, stop workers.
    fn reset(&self, mode: ResetMode) -> Result<(), PluginError>;

    /// May advance internal state; `cycles` is meaningful for `Tick`.
    fn clock(&self, mode: ClockMode, cycles: u64) -> Result<(), PluginError>;

    /// Must not block indefinitely.
    fn read(&self, addr: u32) -> u32;

    /// Side effects allowed, including raising an IRQ.
    fn write(&self, addr: u32, value: u32) -> Result<(), PluginError>;

    /// Hook invoked when an IRQ is delivered to *this* plugin (reserved for
    /// bidirectional models; the UART/DMA exemplars do not implement it).
    fn interrupt(&self, irq: u32) -> Result<(), PluginError> {
        let _ = irq;
        Ok(())
    }
}
