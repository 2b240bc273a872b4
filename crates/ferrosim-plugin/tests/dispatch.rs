use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use ferrosim_plugin::{ClockMode, Plugin, PluginError, PluginHost, PluginRegistry, ResetMode};
use ferrosim_types::{AccessKind, FaultedRequest, PluginName};

/// A plugin with a single `u32` register at offset 0, used to exercise the
/// Plugin Host's read/write dispatch translation.
struct ScratchRegister {
    name: PluginName,
    value: AtomicU32,
}

impl Plugin for ScratchRegister {
    fn name(&self) -> &PluginName {
        &self.name
    }
    fn init(&self) -> Result<(), PluginError> {
        Ok(())
    }
    fn cleanup(&self) {}
    fn reset(&self, _mode: ResetMode) -> Result<(), PluginError> {
        self.value.store(0, Ordering::SeqCst);
        Ok(())
    }
    fn clock(&self, _mode: ClockMode, _cycles: u64) -> Result<(), PluginError> {
        Ok(())
    }
    fn read(&self, _addr: u32) -> u32 {
        self.value.load(Ordering::SeqCst)
    }
    fn write(&self, _addr: u32, value: u32) -> Result<(), PluginError> {
        self.value.store(value, Ordering::SeqCst);
        Ok(())
    }
}

fn request(module: &str, kind: AccessKind, address: u32, value: u32, id: u32) -> FaultedRequest {
    FaultedRequest {
        module: PluginName::new(module).unwrap(),
        address,
        kind,
        value,
        id,
    }
}

#[test]
fn write_then_read_is_consistent() {
    let registry = Arc::new(PluginRegistry::new());
    registry
        .register_plugin(Box::new(ScratchRegister {
            name: PluginName::new("scratch0").unwrap(),
            value: AtomicU32::new(0),
        }))
        .unwrap();
    let host = PluginHost::new(registry);

    let write = request("scratch0", AccessKind::Write, 0x00, 0x41, 1);
    let response = host.dispatch(write);
    assert!(response.is_ok());

    let read = request("scratch0", AccessKind::Read, 0x00, 0, 2);
    let response = host.dispatch(read);
    assert_eq!(response.result_or_value, 0x41);
}

#[test]
fn dispatch_to_unknown_module_is_an_error_response() {
    let registry = Arc::new(PluginRegistry::new());
    let host = PluginHost::new(registry);
    let read = request("ghost", AccessKind::Read, 0x00, 0, 1);
    let response = host.dispatch(read);
    assert!(!response.is_ok());
}

#[test]
fn reset_assert_zeroes_state() {
    let registry = Arc::new(PluginRegistry::new());
    registry
        .register_plugin(Box::new(ScratchRegister {
            name: PluginName::new("scratch0").unwrap(),
            value: AtomicU32::new(0x1234),
        }))
        .unwrap();
    let host = PluginHost::new(registry);
    host.reset("scratch0", ResetMode::Assert).unwrap();
    let read = request("scratch0", AccessKind::Read, 0x00, 0, 1);
    assert_eq!(host.dispatch(read).result_or_value, 0);
}
