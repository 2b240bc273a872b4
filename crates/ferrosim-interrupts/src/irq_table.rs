//! IRQ Table: for each IRQ number, a handler callback
//! plus an enable bit.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::InterruptError;

type HandlerFn = Arc<dyn Fn() + Send + Sync>;

struct IrqEntry {
    handler: Mutex<Option<HandlerFn>>,
    enabled: AtomicBool,
}

/// IRQ number -> `(handler, enabled)` table. Reads on the hot delivery path
/// only ever touch the per-entry atomic enable flag and an `Arc` clone of
/// the handler, never a lock held across a user callback.
#[derive(Default)]
pub struct IrqTable {
    entries: Mutex<BTreeMap<u32, Arc<IrqEntry>>>,
}

impl IrqTable {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Inserts or replaces the handler for `irq` and enables it.
    pub fn register_interrupt_handler(&self, irq: u32, handler: impl Fn() + Send + Sync + 'static) {
        let mut entries = self.entries.lock().expect("irq table poisoned");
        let entry = entries.entry(irq).or_insert_with(|| {
            Arc::new(IrqEntry {
                handler: Mutex::new(None),
                enabled: AtomicBool::new(false),
            })
        });
        *entry.handler.lock().expect("irq handler slot poisoned") = Some(Arc::new(handler));
        entry.enabled.store(true, Ordering::SeqCst);
    }

    pub fn enable_interrupt(&self, irq: u32) -> Result<(), InterruptError> {
        self.with_entry(irq, |entry| entry.enabled.store(true, Ordering::SeqCst))
    }

    pub fn disable_interrupt(&self, irq: u32) -> Result<(), InterruptError> {
        self.with_entry(irq, |entry| entry.enabled.store(false, Ordering::SeqCst))
    }

    pub fn is_enabled(&self, irq: u32) -> bool {
        self.entries
            .lock()
            .expect("irq table poisoned")
            .get(&irq)
            .map(|e| e.enabled.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// If the IRQ has a handler and is enabled, calls it; else logs and
    /// returns.
    pub fn deliver(&self, irq: u32) {
        let entry = {
            let entries = self.entries.lock().expect("irq table poisoned");
            entries.get(&irq).cloned()
        };
        let Some(entry) = entry else {
            tracing::warn!(irq, "irq table: delivery requested for unregistered irq");
            return;
        };
        if !entry.enabled.load(Ordering::SeqCst) {
            tracing::debug!(irq, "irq table: delivery suppressed, irq disabled");
            return;
        }
        let handler = entry.handler.lock().expect("irq handler slot poisoned").clone();
        match handler {
            Some(handler) => handler(),
            None => tracing::warn!(irq, "irq table: enabled irq has no handler installed"),
        }
    }

    fn with_entry(&self, irq: u32, f: impl FnOnce(&IrqEntry)) -> Result<(), InterruptError> {
        let entries = self.entries.lock().expect("irq table poisoned");
        let entry = entries.get(&irq).ok_or(InterruptError::UnknownIrq(irq))?;
        f(entry);
        Ok(())
    }
}
