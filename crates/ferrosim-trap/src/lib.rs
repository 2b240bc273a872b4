//! MMIO trap engine: makes the driver's nominal
//! peripheral address ranges inaccessible at the OS memory-protection
//! level, decodes faulting loads/stores, and routes them to the plugin
//! model.

mod decode;
mod engine;
mod guard;
mod regs;

pub use engine::TrapEngine;
pub use guard::GuardRegion;

#[derive(Debug, thiserror::Error)]
pub enum TrapError {
    #[error("trap engine: failed to install SIGSEGV handler: {0}")]
    InstallFailed(#[source] std::io::Error),
    #[error("trap engine: failed to reserve guard region: {0}")]
    GuardReservationFailed(#[source] std::io::Error),
    #[error(transparent)]
    Map(#[from] ferrosim_addrmap::MapError),
}
