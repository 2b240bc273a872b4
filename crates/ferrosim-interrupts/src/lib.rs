//! Interrupt delivery path: maps asynchronous
//! OS-level interrupt signals into numbered IRQs and dispatches them to
//! registered handlers on the driver side.

mod irq_table;
mod router;

pub use irq_table::IrqTable;
pub use router::InterruptRouter;

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum InterruptError {
    #[error("irq table: no such irq {0}")]
    UnknownIrq(u32),
    #[error("interrupt router: no signal binding for module {module}, irq {irq}")]
    NoBindingFor { module: String, irq: u32 },
    #[error("interrupt router: signal {0} is outside the managed real-time range")]
    UnmanagedSignal(i32),
    #[error("interrupt router: failed to deliver signal: {0}")]
    SignalDeliveryFailed(#[from] SignalIoError),
}

/// Thin, comparable wrapper around [`std::io::Error`] so [`InterruptError`]
/// can derive `PartialEq` for tests.
#[derive(Debug)]
pub struct SignalIoError(std::io::Error);

impl std::fmt::Display for SignalIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Eq for SignalIoError {}
impl PartialEq for SignalIoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<std::io::Error> for SignalIoError {
    fn from(e: std::io::Error) -> Self {
        Self(e)
    }
}
