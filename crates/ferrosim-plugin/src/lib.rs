//! Plugin model: a uniform contract by
//! which peripheral-behaviour modules own register state, serve reads and
//! writes, advance internal state in background workers, and raise
//! interrupts back toward the driver.

mod host;
mod plugin;
mod registry;

pub use host::PluginHost;
pub use plugin::{ClockMode, Plugin, ResetMode};
pub use registry::{PluginRef, PluginRegistry, MAX_PLUGINS};

use ferrosim_types::PluginName;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin registry is full ({MAX_PLUGINS} plugins already registered)")]
    RegistryFull,
    #[error("plugin name {0} is already registered")]
    DuplicateName(PluginName),
    #[error("plugin {module} failed to initialise: {source}")]
    InitFailed {
        module: PluginName,
        #[source]
        source: Box<PluginError>,
    },
    #[error("plugin {0} not found")]
    NotFound(String),
    #[error("plugin {module} is busy and cannot service {operation}")]
    Busy { module: PluginName, operation: &'static str },
    #[error("plugin {module} rejected {operation}: {reason}")]
    Rejected {
        module: PluginName,
        operation: &'static str,
        reason: String,
    },
}
