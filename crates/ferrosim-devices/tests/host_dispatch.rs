//! Drives the UART and DMA plugins through the real `PluginRegistry` /
//! `PluginHost` dispatch path, the way a trapped MMIO access would, instead
//! of calling `Plugin::read`/`write` directly.

use std::sync::Arc;
use std::time::Duration;

use ferrosim_devices::{addresses, DmaPlugin, FlatGuestMemory, GuestMemory, UartPlugin};
use ferrosim_interrupts::{InterruptRouter, IrqTable};
use ferrosim_plugin::{ClockMode, PluginHost, PluginRegistry};
use ferrosim_types::{AccessKind, FaultedRequest};

fn router() -> Arc<InterruptRouter> {
    let table = Arc::new(IrqTable::new());
    Arc::new(InterruptRouter::install(table).expect("router install"))
}

fn request(module: &str, kind: AccessKind, address: u32, value: u32, id: u32) -> FaultedRequest {
    FaultedRequest {
        module: ferrosim_types::PluginName::new(module).unwrap(),
        address,
        kind,
        value,
        id,
    }
}

#[test]
fn uart_transmit_and_synthetic_receive_through_the_host() {
    let uart_base = addresses::uart_base(0);
    let registry = Arc::new(PluginRegistry::new());
    registry
        .register_plugin(Box::new(
            UartPlugin::new(0, router(), Duration::from_secs(3600)).unwrap(),
        ))
        .unwrap();
    let host = PluginHost::new(registry);

    let enable = request(
        "uart0",
        AccessKind::Write,
        uart_base + addresses::UART_REG_CONTROL,
        1,
        1,
    );
    assert!(host.dispatch(enable).is_ok());

    host.clock("uart0", ClockMode::Tick, 2).unwrap();

    let read_a = request("uart0", AccessKind::Read, uart_base + addresses::UART_REG_DATA, 0, 2);
    let read_b = request("uart0", AccessKind::Read, uart_base + addresses::UART_REG_DATA, 0, 3);
    assert_eq!(host.dispatch(read_a).result_or_value, b'A' as u32);
    assert_eq!(host.dispatch(read_b).result_or_value, b'B' as u32);

    let tx = request("uart0", AccessKind::Write, uart_base + addresses::UART_REG_DATA, b'!' as u32, 4);
    assert!(host.dispatch(tx).is_ok());
}

#[test]
fn dma_channel_completes_mem_to_mem_transfer_through_the_host() {
    let dma_base = addresses::dma_base(0);
    let memory = Arc::new(FlatGuestMemory::new(8192));
    let pattern: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
    memory.write(0, &pattern);

    let registry = Arc::new(PluginRegistry::new());
    registry
        .register_plugin(Box::new(DmaPlugin::new(0, memory.clone(), router()).unwrap()))
        .unwrap();
    let host = PluginHost::new(registry);

    let channel0 = addresses::DMA_CHANNELS_BASE;
    let src = request("dma0", AccessKind::Write, dma_base + channel0 + addresses::DMA_CHAN_REG_SRC, 0, 1);
    let dst = request(
        "dma0",
        AccessKind::Write,
        dma_base + channel0 + addresses::DMA_CHAN_REG_DST,
        2048,
        2,
    );
    let size = request(
        "dma0",
        AccessKind::Write,
        dma_base + channel0 + addresses::DMA_CHAN_REG_SIZE,
        300,
        3,
    );
    let ctrl = request("dma0", AccessKind::Write, dma_base + channel0 + addresses::DMA_CHAN_REG_CTRL, 1, 4);
    for req in [src, dst, size, ctrl] {
        assert!(host.dispatch(req).is_ok());
    }

    host.clock("dma0", ClockMode::Tick, 1).unwrap();

    let mut copied = vec![0u8; 300];
    memory.read(2048, &mut copied);
    assert_eq!(copied, pattern);

    let status = request("dma0", AccessKind::Read, dma_base + addresses::DMA_REG_GLOBAL_STATUS, 0, 5);
    assert_eq!(host.dispatch(status).result_or_value & 1, 0, "channel 0 must be idle after completion");
}
