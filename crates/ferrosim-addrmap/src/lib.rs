//! Address Map and Signal Map: small, bounded,
//! append-mostly tables populated during simulator initialisation and
//! scanned linearly thereafter.

use ferrosim_types::PluginName;

/// Upper bound on the number of register ranges a single simulator may
/// register. A linear scan over a table this small is plenty fast.
pub const MAX_RANGES: usize = 32;

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum MapError {
    #[error("address map: range [{start:#x}, {end:#x}) is empty or inverted")]
    InvalidRange { start: u32, end: u32 },
    #[error(
        "address map: range [{start:#x}, {end:#x}) for module {module} overlaps existing range \
         [{existing_start:#x}, {existing_end:#x}) owned by module {existing_module}"
    )]
    Overlap {
        start: u32,
        end: u32,
        module: PluginName,
        existing_start: u32,
        existing_end: u32,
        existing_module: PluginName,
    },
    #[error("address map: table is full ({MAX_RANGES} ranges already registered)")]
    TableFull,
    #[error("signal map: signal {signal} is already bound to module {module}, irq {irq}")]
    DuplicateSignal {
        signal: i32,
        module: PluginName,
        irq: u32,
    },
}

/// A registered `[start, end)` register range. `guard_token` is an opaque handle the trap engine fills in once
/// it has reserved the corresponding host guard region; the address map
/// itself does not know how to reserve host memory.
#[derive(Debug, Clone)]
pub struct RegisterRange {
    pub start: u32,
    pub end: u32,
    pub module: PluginName,
    pub guard_token: Option<u64>,
}

impl RegisterRange {
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// Table of register ranges tagged with the owning plugin name.
#[derive(Debug, Default)]
pub struct AddressMap {
    ranges: Vec<RegisterRange>,
}

impl AddressMap {
    pub fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Inserts a new range. `start < end`, no overlap with an existing
    /// range. Returns the index of the newly inserted range so the caller
    /// (the trap engine, via the simulator) can later call
    /// [`AddressMap::set_guard_token`] once the host guard region is
    /// reserved.
    pub fn add(&mut self, start: u32, end: u32, module: PluginName) -> Result<usize, MapError> {
        if start >= end {
            return Err(MapError::InvalidRange { start, end });
        }
        if self.ranges.len() >= MAX_RANGES {
            return Err(MapError::TableFull);
        }
        if let Some(existing) = self
            .ranges
            .iter()
            .find(|r| start < r.end && r.start < end)
        {
            return Err(MapError::Overlap {
                start,
                end,
                module,
                existing_start: existing.start,
                existing_end: existing.end,
                existing_module: existing.module.clone(),
            });
        }
        self.ranges.push(RegisterRange {
            start,
            end,
            module,
            guard_token: None,
        });
        Ok(self.ranges.len() - 1)
    }

    pub fn set_guard_token(&mut self, index: usize, token: u64) {
        if let Some(range) = self.ranges.get_mut(index) {
            range.guard_token = Some(token);
        }
    }

    /// Looks up the range owning `addr`, returning `(module, base, length)`.
    pub fn lookup(&self, addr: u32) -> Option<(&PluginName, u32, u32)> {
        self.ranges
            .iter()
            .find(|r| r.contains(addr))
            .map(|r| (&r.module, r.start, r.len()))
    }

    pub fn ranges(&self) -> &[RegisterRange] {
        &self.ranges
    }
}

/// `(signal, module, irq)` binding.
#[derive(Debug, Clone)]
pub struct SignalBinding {
    pub signal: i32,
    pub module: PluginName,
    pub irq: u32,
}

/// Table binding an OS signal number to `(plugin name, IRQ number)`.
#[derive(Debug, Default)]
pub struct SignalMap {
    bindings: Vec<SignalBinding>,
}

impl SignalMap {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Records the triple. Duplicate signal numbers replace the previous
    /// binding in place.
    pub fn add(&mut self, signal: i32, module: PluginName, irq: u32) {
        if let Some(existing) = self.bindings.iter_mut().find(|b| b.signal == signal) {
            existing.module = module;
            existing.irq = irq;
        } else {
            self.bindings.push(SignalBinding {
                signal,
                module,
                irq,
            });
        }
    }

    pub fn irq_for_signal(&self, signal: i32) -> Option<(&PluginName, u32)> {
        self.bindings
            .iter()
            .find(|b| b.signal == signal)
            .map(|b| (&b.module, b.irq))
    }

    /// Locates the first binding whose `(module, irq)` matches.
    pub fn signal_for(&self, module: &str, irq: u32) -> Option<i32> {
        self.bindings
            .iter()
            .find(|b| b.module.as_str() == module && b.irq == irq)
            .map(|b| b.signal)
    }

    pub fn bindings(&self) -> &[SignalBinding] {
        &self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> PluginName {
        PluginName::new(s).unwrap()
    }

    #[test]
    fn add_then_lookup_roundtrips() {
        let mut map = AddressMap::new();
        map.add(0x1000, 0x1050, name("uart0")).unwrap();
        let (module, base, len) = map.lookup(0x1010).unwrap();
        assert_eq!(module.as_str(), "uart0");
        assert_eq!(base, 0x1000);
        assert_eq!(len, 0x50);
    }

    #[test]
    fn lookup_outside_any_range_is_none() {
        let mut map = AddressMap::new();
        map.add(0x1000, 0x1050, name("uart0")).unwrap();
        assert!(map.lookup(0x2000).is_none());
    }

    #[test]
    fn rejects_inverted_range() {
        let mut map = AddressMap::new();
        assert_eq!(
            map.add(0x100, 0x100, name("uart0")),
            Err(MapError::InvalidRange {
                start: 0x100,
                end: 0x100
            })
        );
    }

    #[test]
    fn rejects_overlap() {
        let mut map = AddressMap::new();
        map.add(0x1000, 0x2000, name("a")).unwrap();
        let err = map.add(0x1800, 0x2800, name("b")).unwrap_err();
        assert!(matches!(err, MapError::Overlap { .. }));
    }

    #[test]
    fn table_full_is_reported() {
        let mut map = AddressMap::new();
        for i in 0..MAX_RANGES as u32 {
            map.add(i * 0x1000, i * 0x1000 + 0x10, name(&format!("m{i}")))
                .unwrap();
        }
        let err = map
            .add(MAX_RANGES as u32 * 0x1000, MAX_RANGES as u32 * 0x1000 + 0x10, name("overflow"))
            .unwrap_err();
        assert_eq!(err, MapError::TableFull);
    }

    #[test]
    fn signal_map_replaces_duplicate_signal() {
        let mut map = SignalMap::new();
        map.add(34, name("uart0"), 5);
        map.add(34, name("uart0"), 6);
        assert_eq!(map.irq_for_signal(34).unwrap().1, 6);
        assert_eq!(map.bindings().len(), 1);
    }

    #[test]
    fn signal_map_finds_signal_for_module_irq() {
        let mut map = SignalMap::new();
        map.add(34, name("uart0"), 5);
        assert_eq!(map.signal_for("uart0", 5), Some(34));
        assert_eq!(map.signal_for("uart0", 6), None);
    }
}
