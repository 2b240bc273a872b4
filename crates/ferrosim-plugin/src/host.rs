//! Plugin Host: invokes plugin lifecycle ops and relays
//! read/write requests from the trap engine.

use std::sync::Arc;

use ferrosim_types::{AccessKind, FaultedRequest, Response};

use crate::{ClockMode, PluginError, PluginRegistry, ResetMode};

pub struct PluginHost {
    registry: Arc<PluginRegistry>,
}

impl PluginHost {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    /// Resolves the plugin by `request.module`, translates the request
    /// kind into the matching plugin op, and constructs a response with the
    /// returned value/status.
    pub fn dispatch(&self, request: FaultedRequest) -> Response {
        let Some(plugin) = self.registry.find_plugin(request.module.as_str()) else {
            tracing::error!(module = %request.module, id = request.id, "plugin host: dispatch to unknown module");
            return Response::err(-1);
        };
        match request.kind {
            AccessKind::Read => Response::ok(plugin.read(request.address)),
            AccessKind::Write => match plugin.write(request.address, request.value) {
                Ok(()) => Response::ok(0),
                Err(err) => {
                    tracing::warn!(
                        module = %request.module,
                        addr = request.address,
                        id = request.id,
                        error = %err,
                        "plugin host: write rejected by plugin"
                    );
                    Response::err(-1)
                }
            },
        }
    }

    pub fn clock(&self, module: &str, mode: ClockMode, cycles: u64) -> Result<(), PluginError> {
        self.with_plugin(module, |plugin| plugin.clock(mode, cycles))
    }

    pub fn reset(&self, module: &str, mode: ResetMode) -> Result<(), PluginError> {
        self.with_plugin(module, |plugin| plugin.reset(mode))
    }

    pub fn interrupt(&self, module: &str, irq: u32) -> Result<(), PluginError> {
        self.with_plugin(module, |plugin| plugin.interrupt(irq))
    }

    fn with_plugin(
        &self,
        module: &str,
        f: impl FnOnce(&dyn crate::Plugin) -> Result<(), PluginError>,
    ) -> Result<(), PluginError> {
        let plugin = self
            .registry
            .find_plugin(module)
            .ok_or_else(|| PluginError::NotFound(module.to_string()))?;
        f(&plugin)
    }
}
