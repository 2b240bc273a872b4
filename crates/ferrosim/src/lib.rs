//! `Simulator`: the driver-facing composition root that owns every
//! subsystem (Plugin Registry/Host, Trap Engine, IRQ Table and Interrupt
//! Router) instead of leaving them as free-standing globals. One owned
//! value assembles every subsystem crate behind a small driver-facing
//! surface.

use std::sync::Arc;

use ferrosim_interrupts::{InterruptError, InterruptRouter, IrqTable};
use ferrosim_plugin::{ClockMode, Plugin, PluginError, PluginHost, PluginRef, PluginRegistry, ResetMode};
use ferrosim_trap::TrapEngine;
use ferrosim_types::PluginName;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Trap(#[from] ferrosim_trap::TrapError),
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error(transparent)]
    Interrupt(#[from] InterruptError),
    #[error("simulator: failed to install interrupt router: {0}")]
    RouterInstall(#[source] std::io::Error),
    #[error("simulator: invalid plugin name: {0}")]
    InvalidName(#[from] ferrosim_types::InvalidPluginName),
}

/// Owns the Address Map/Trap Engine, Plugin Registry/Host, and IRQ
/// Table/Interrupt Router for one simulated machine.
pub struct Simulator {
    registry: Arc<PluginRegistry>,
    host: Arc<PluginHost>,
    trap: Arc<TrapEngine>,
    irq_table: Arc<IrqTable>,
    router: Arc<InterruptRouter>,
}

impl Simulator {
    /// Builds every subsystem and installs the process-wide `SIGSEGV`
    /// handler and the interrupt router's `signalfd`. Call once per
    /// process.
    pub fn new() -> Result<Arc<Self>, SimError> {
        let registry = Arc::new(PluginRegistry::new());
        let host = Arc::new(PluginHost::new(registry.clone()));
        let trap = TrapEngine::new(host.clone());
        trap.install()?;

        let irq_table = Arc::new(IrqTable::new());
        let router = Arc::new(InterruptRouter::install(irq_table.clone()).map_err(SimError::RouterInstall)?);

        Ok(Arc::new(Self {
            registry,
            host,
            trap,
            irq_table,
            router,
        }))
    }

    /// Stops every registered plugin's background work. The `SIGSEGV`
    /// handler and interrupt router are torn down when the last `Arc`
    /// reference to this `Simulator` is dropped.
    pub fn cleanup(&self) {
        self.registry.cleanup_all();
    }

    /// `add_register_mapping(start, end, module)`.
    pub fn add_register_mapping(&self, start: u32, end: u32, module: &str) -> Result<(), SimError> {
        let module = PluginName::new(module)?;
        self.trap.add_range(start, end, module)?;
        Ok(())
    }

    /// `add_signal_mapping(signal, module, irq)`.
    pub fn add_signal_mapping(&self, signal: i32, module: &str, irq: u32) -> Result<(), SimError> {
        let module = PluginName::new(module)?;
        self.router.add_signal_binding(signal, module, irq)?;
        Ok(())
    }

    /// `register_interrupt_handler(irq, fn)`.
    pub fn register_interrupt_handler(&self, irq: u32, handler: impl Fn() + Send + Sync + 'static) {
        self.irq_table.register_interrupt_handler(irq, handler);
    }

    /// `enable_interrupt(irq)`.
    pub fn enable_interrupt(&self, irq: u32) -> Result<(), SimError> {
        self.irq_table.enable_interrupt(irq)?;
        Ok(())
    }

    /// `disable_interrupt(irq)`.
    pub fn disable_interrupt(&self, irq: u32) -> Result<(), SimError> {
        self.irq_table.disable_interrupt(irq)?;
        Ok(())
    }

    /// `trigger_interrupt(module, irq)`: used by plugins
    /// internally and exposed here for driver-side testing.
    pub fn trigger_interrupt(&self, module: &str, irq: u32) -> Result<(), SimError> {
        self.router.trigger(module, irq)?;
        Ok(())
    }

    /// `register_plugin(plugin)`.
    pub fn register_plugin(&self, plugin: Box<dyn Plugin>) -> Result<(), SimError> {
        self.registry.register_plugin(plugin)?;
        Ok(())
    }

    /// `find_plugin(name)`.
    pub fn find_plugin(&self, name: &str) -> Option<PluginRef<'_>> {
        self.registry.find_plugin(name)
    }

    /// Advances a plugin's internal clock; used by `ferrosim-cli` and
    /// tests to drive deterministic ticks instead of waiting on wall time.
    pub fn clock_plugin(&self, module: &str, mode: ClockMode, cycles: u64) -> Result<(), SimError> {
        self.host.clock(module, mode, cycles)?;
        Ok(())
    }

    /// Resets a plugin.
    pub fn reset_plugin(&self, module: &str, mode: ResetMode) -> Result<(), SimError> {
        self.host.reset(module, mode)?;
        Ok(())
    }

    /// The shared `InterruptRouter` plugins raise their own IRQs through.
    /// Exemplar plugins like `ferrosim_devices::UartPlugin` take this at
    /// construction so a plugin's self-raised interrupts resolve against
    /// the same signal/IRQ bindings the driver installed on this
    /// simulator, rather than an independent router of their own.
    pub fn interrupt_router(&self) -> Arc<InterruptRouter> {
        self.router.clone()
    }
}
