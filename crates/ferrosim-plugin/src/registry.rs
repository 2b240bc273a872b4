//! Plugin Registry: a fixed-capacity, name-indexed
//! collection of plugin instances.

use std::ops::Deref;
use std::sync::RwLock;

use ferrosim_types::PluginName;

use crate::{Plugin, PluginError};

/// Upper bound on the number of concurrently registered plugins.
pub const MAX_PLUGINS: usize = 32;

#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<Vec<(PluginName, Box<dyn Plugin>)>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: RwLock::new(Vec::new()),
        }
    }

    /// Inserts by name (must be unique) and calls the plugin's `init`.
    pub fn register_plugin(&self, plugin: Box<dyn Plugin>) -> Result<(), PluginError> {
        let mut plugins = self.plugins.write().expect("plugin registry poisoned");
        if plugins.len() >= MAX_PLUGINS {
            return Err(PluginError::RegistryFull);
        }
        let name = plugin.name().clone();
        if plugins.iter().any(|(existing, _)| existing == &name) {
            return Err(PluginError::DuplicateName(name));
        }
        plugin.init().map_err(|e| PluginError::InitFailed {
            module: name.clone(),
            source: Box::new(e),
        })?;
        plugins.push((name, plugin));
        Ok(())
    }

    /// Looks up a plugin by name, returning a guard that derefs to
    /// `&dyn Plugin`, or `None` if no such plugin is registered.
    pub fn find_plugin(&self, name: &str) -> Option<PluginRef<'_>> {
        let guard = self.plugins.read().expect("plugin registry poisoned");
        let index = guard.iter().position(|(n, _)| n.as_str() == name)?;
        Some(PluginRef { guard, index })
    }

    /// Calls `cleanup` on every registered plugin in reverse insertion
    /// order. Best-effort: a plugin's cleanup cannot fail
    /// the overall shutdown.
    pub fn cleanup_all(&self) {
        let plugins = self.plugins.read().expect("plugin registry poisoned");
        for (name, plugin) in plugins.iter().rev() {
            tracing::debug!(module = %name, "plugin registry: cleaning up");
            plugin.cleanup();
        }
    }

    pub fn len(&self) -> usize {
        self.plugins.read().expect("plugin registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A borrowed handle to a registered plugin. Derefs to `&dyn Plugin`; holds
/// the registry's read lock for its lifetime, so callers should not retain
/// it longer than the dispatch that needs it.
pub struct PluginRef<'a> {
    guard: std::sync::RwLockReadGuard<'a, Vec<(PluginName, Box<dyn Plugin>)>>,
    index: usize,
}

impl<'a> Deref for PluginRef<'a> {
    type Target = dyn Plugin + 'a;

    fn deref(&self) -> &Self::Target {
        self.guard[self.index].1.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClockMode, ResetMode};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingPlugin {
        name: PluginName,
        inits: AtomicU32,
    }

    impl Plugin for CountingPlugin {
        fn name(&self) -> &PluginName {
            &self.name
        }
        fn init(&self) -> Result<(), PluginError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn cleanup(&self) {}
        fn reset(&self, _mode: ResetMode) -> Result<(), PluginError> {
            Ok(())
        }
        fn clock(&self, _mode: ClockMode, _cycles: u64) -> Result<(), PluginError> {
            Ok(())
        }
        fn read(&self, _addr: u32) -> u32 {
            0
        }
        fn write(&self, _addr: u32, _value: u32) -> Result<(), PluginError> {
            Ok(())
        }
    }

    fn plugin(name: &str) -> Box<dyn Plugin> {
        Box::new(CountingPlugin {
            name: PluginName::new(name).unwrap(),
            inits: AtomicU32::new(0),
        })
    }

    #[test]
    fn register_then_find_roundtrips() {
        let registry = PluginRegistry::new();
        registry.register_plugin(plugin("uart0")).unwrap();
        let found = registry.find_plugin("uart0").unwrap();
        assert_eq!(found.name().as_str(), "uart0");
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let registry = PluginRegistry::new();
        registry.register_plugin(plugin("uart0")).unwrap();
        let err = registry.register_plugin(plugin("uart0")).unwrap_err();
        assert!(matches!(err, PluginError::DuplicateName(_)));
    }

    #[test]
    fn registry_full_is_reported() {
        let registry = PluginRegistry::new();
        for i in 0..MAX_PLUGINS {
            registry.register_plugin(plugin(&format!("m{i}"))).unwrap();
        }
        let err = registry.register_plugin(plugin("overflow")).unwrap_err();
        assert!(matches!(err, PluginError::RegistryFull));
    }

    #[test]
    fn find_missing_plugin_is_none() {
        let registry = PluginRegistry::new();
        assert!(registry.find_plugin("nope").is_none());
    }
}
