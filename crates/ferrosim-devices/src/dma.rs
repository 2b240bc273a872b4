//! DMA exemplar plugin: sixteen independent mem-to-mem
//! transfer channels plus global status/interrupt-clear registers.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use bitflags::bitflags;
use ferrosim_interrupts::InterruptRouter;
use ferrosim_plugin::{ClockMode, Plugin, PluginError, ResetMode};
use ferrosim_types::PluginName;

use crate::addresses;
use crate::memory::GuestMemory;

/// A channel enabled with `size == 0` transfers this many bytes instead.
const DEFAULT_TRANSFER_SIZE: u32 = 1024;
/// Bytes moved per `clock` tick while a channel is busy.
const BYTES_PER_TICK: u32 = 512;
/// Channel `i`'s completion interrupt is `COMPLETION_IRQ_BASE + i`.
const COMPLETION_IRQ_BASE: u32 = 10;

bitflags! {
    #[derive(Clone, Copy)]
    pub struct DmaChannelControl: u32 {
        const ENABLE = 1 << 0;
    }
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct DmaChannelConfig: u32 {
        const IRQ_ENABLE = 1 << 0;
    }
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct DmaGlobalControl: u32 {
        /// The controller enable bit. Clearing it aborts every in-flight
        /// channel transfer immediately.
        const ENABLE = 1 << 0;
    }
}

struct DmaChannel {
    ctrl: AtomicU32,
    config: AtomicU32,
    src: AtomicU32,
    dst: AtomicU32,
    size: AtomicU32,
    remaining: AtomicU32,
    cursor_src: AtomicU32,
    cursor_dst: AtomicU32,
    busy: AtomicBool,
}

impl DmaChannel {
    fn new() -> Self {
        Self {
            ctrl: AtomicU32::new(0),
            config: AtomicU32::new(0),
            src: AtomicU32::new(0),
            dst: AtomicU32::new(0),
            size: AtomicU32::new(0),
            remaining: AtomicU32::new(0),
            cursor_src: AtomicU32::new(0),
            cursor_dst: AtomicU32::new(0),
            busy: AtomicBool::new(false),
        }
    }

    fn reset(&self) {
        self.ctrl.store(0, Ordering::SeqCst);
        self.config.store(0, Ordering::SeqCst);
        self.src.store(0, Ordering::SeqCst);
        self.dst.store(0, Ordering::SeqCst);
        self.size.store(0, Ordering::SeqCst);
        self.remaining.store(0, Ordering::SeqCst);
        self.busy.store(false, Ordering::SeqCst);
    }

    fn abort(&self) {
        self.busy.store(false, Ordering::SeqCst);
        self.remaining.store(0, Ordering::SeqCst);
    }
}

pub struct DmaPlugin {
    name: PluginName,
    base: u32,
    channels: Vec<DmaChannel>,
    global_control: AtomicU32,
    interrupt_status: AtomicU32,
    memory: Arc<dyn GuestMemory>,
    router: Arc<InterruptRouter>,
}

impl DmaPlugin {
    pub fn new(
        instance: u32,
        memory: Arc<dyn GuestMemory>,
        router: Arc<InterruptRouter>,
    ) -> Result<Self, ferrosim_types::InvalidPluginName> {
        let channels = (0..addresses::DMA_CHANNEL_COUNT).map(|_| DmaChannel::new()).collect();
        Ok(Self {
            name: PluginName::new(format!("dma{instance}"))?,
            base: addresses::dma_base(instance),
            channels,
            global_control: AtomicU32::new(DmaGlobalControl::ENABLE.bits()),
            interrupt_status: AtomicU32::new(0),
            memory,
            router,
        })
    }

    fn channel_register(&self, offset: u32) -> Option<(usize, u32)> {
        if offset < addresses::DMA_CHANNELS_BASE {
            return None;
        }
        let rel = offset - addresses::DMA_CHANNELS_BASE;
        let index = (rel / addresses::DMA_CHANNEL_STRIDE) as usize;
        if index >= self.channels.len() {
            return None;
        }
        Some((index, rel % addresses::DMA_CHANNEL_STRIDE))
    }

    fn read_channel(&self, index: usize, reg: u32) -> u32 {
        let channel = &self.channels[index];
        match reg {
            addresses::DMA_CHAN_REG_SRC => channel.src.load(Ordering::SeqCst),
            addresses::DMA_CHAN_REG_DST => channel.dst.load(Ordering::SeqCst),
            addresses::DMA_CHAN_REG_SIZE => channel.size.load(Ordering::SeqCst),
            addresses::DMA_CHAN_REG_CTRL => channel.ctrl.load(Ordering::SeqCst),
            addresses::DMA_CHAN_REG_CONFIG => channel.config.load(Ordering::SeqCst),
            other => {
                tracing::warn!(module = %self.name, channel = index, offset = other, "dma: read of unknown channel register");
                0
            }
        }
    }

    fn write_channel(&self, index: usize, reg: u32, value: u32) {
        let channel = &self.channels[index];
        match reg {
            addresses::DMA_CHAN_REG_SRC => channel.src.store(value, Ordering::SeqCst),
            addresses::DMA_CHAN_REG_DST => channel.dst.store(value, Ordering::SeqCst),
            addresses::DMA_CHAN_REG_SIZE => channel.size.store(value, Ordering::SeqCst),
            addresses::DMA_CHAN_REG_CONFIG => channel.config.store(value, Ordering::SeqCst),
            addresses::DMA_CHAN_REG_CTRL => self.write_channel_ctrl(index, value),
            other => {
                tracing::warn!(module = %self.name, channel = index, offset = other, "dma: write to unknown channel register ignored");
            }
        }
    }

    fn write_channel_ctrl(&self, index: usize, value: u32) {
        let channel = &self.channels[index];
        let old = DmaChannelControl::from_bits_truncate(channel.ctrl.swap(value, Ordering::SeqCst));
        let new = DmaChannelControl::from_bits_truncate(value);
        if !old.contains(DmaChannelControl::ENABLE) && new.contains(DmaChannelControl::ENABLE) {
            let mut size = channel.size.load(Ordering::SeqCst);
            if size == 0 {
                size = DEFAULT_TRANSFER_SIZE;
                channel.size.store(size, Ordering::SeqCst);
            }
            channel.cursor_src.store(channel.src.load(Ordering::SeqCst), Ordering::SeqCst);
            channel.cursor_dst.store(channel.dst.load(Ordering::SeqCst), Ordering::SeqCst);
            channel.remaining.store(size, Ordering::SeqCst);
            channel.busy.store(true, Ordering::SeqCst);
            tracing::debug!(module = %self.name, channel = index, size, "dma: channel transfer started");
        } else if old.contains(DmaChannelControl::ENABLE) && !new.contains(DmaChannelControl::ENABLE) {
            channel.abort();
        }
    }

    fn read_global(&self, reg: u32) -> u32 {
        match reg {
            addresses::DMA_REG_GLOBAL_CONTROL => self.global_control.load(Ordering::SeqCst),
            addresses::DMA_REG_GLOBAL_STATUS => self.busy_mask(),
            addresses::DMA_REG_INTERRUPT_STATUS => self.interrupt_status.load(Ordering::SeqCst),
            other => {
                tracing::warn!(module = %self.name, offset = other, "dma: read of unknown global register");
                0
            }
        }
    }

    fn write_global(&self, reg: u32, value: u32) {
        match reg {
            addresses::DMA_REG_GLOBAL_CONTROL => {
                let old = DmaGlobalControl::from_bits_truncate(self.global_control.swap(value, Ordering::SeqCst));
                let new = DmaGlobalControl::from_bits_truncate(value);
                if old.contains(DmaGlobalControl::ENABLE) && !new.contains(DmaGlobalControl::ENABLE) {
                    for channel in &self.channels {
                        channel.abort();
                    }
                    tracing::info!(module = %self.name, "dma: controller disabled, all channels stopped");
                }
            }
            addresses::DMA_REG_INTERRUPT_CLEAR => {
                self.interrupt_status.fetch_and(!value, Ordering::SeqCst);
            }
            addresses::DMA_REG_GLOBAL_STATUS | addresses::DMA_REG_INTERRUPT_STATUS => {
                tracing::warn!(module = %self.name, "dma: write to read-only global register ignored");
            }
            other => {
                tracing::warn!(module = %self.name, offset = other, "dma: write to unknown global register ignored");
            }
        }
    }

    fn busy_mask(&self) -> u32 {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.busy.load(Ordering::SeqCst))
            .fold(0u32, |mask, (i, _)| mask | (1 << i))
    }

    fn tick_channel(&self, index: usize) {
        let channel = &self.channels[index];
        if !channel.busy.load(Ordering::SeqCst) {
            return;
        }
        let remaining = channel.remaining.load(Ordering::SeqCst);
        let chunk = remaining.min(BYTES_PER_TICK) as usize;
        if chunk == 0 {
            return;
        }
        let src = channel.cursor_src.load(Ordering::SeqCst);
        let dst = channel.cursor_dst.load(Ordering::SeqCst);
        let mut buf = vec![0u8; chunk];
        self.memory.read(src, &mut buf);
        self.memory.write(dst, &buf);
        channel.cursor_src.store(src + chunk as u32, Ordering::SeqCst);
        channel.cursor_dst.store(dst + chunk as u32, Ordering::SeqCst);
        let remaining = remaining - chunk as u32;
        channel.remaining.store(remaining, Ordering::SeqCst);

        if remaining == 0 {
            channel.busy.store(false, Ordering::SeqCst);
            channel.ctrl.fetch_and(!DmaChannelControl::ENABLE.bits(), Ordering::SeqCst);
            self.interrupt_status.fetch_or(1 << index, Ordering::SeqCst);
            let irq_enabled = DmaChannelConfig::from_bits_truncate(channel.config.load(Ordering::SeqCst))
                .contains(DmaChannelConfig::IRQ_ENABLE);
            if irq_enabled {
                let irq = COMPLETION_IRQ_BASE + index as u32;
                if let Err(err) = self.router.trigger(self.name.as_str(), irq) {
                    tracing::warn!(module = %self.name, channel = index, irq, %err, "dma: completion interrupt delivery failed");
                }
            }
        }
    }
}

impl Plugin for DmaPlugin {
    fn name(&self) -> &PluginName {
        &self.name
    }

    fn init(&self) -> Result<(), PluginError> {
        Ok(())
    }

    fn cleanup(&self) {}

    fn reset(&self, mode: ResetMode) -> Result<(), PluginError> {
        if mode == ResetMode::Assert {
            for channel in &self.channels {
                channel.reset();
            }
            self.global_control.store(DmaGlobalControl::ENABLE.bits(), Ordering::SeqCst);
            self.interrupt_status.store(0, Ordering::SeqCst);
        }
        Ok(())
    }

    fn clock(&self, mode: ClockMode, cycles: u64) -> Result<(), PluginError> {
        if mode == ClockMode::Tick {
            for _ in 0..cycles.max(1) {
                for index in 0..self.channels.len() {
                    self.tick_channel(index);
                }
            }
        }
        Ok(())
    }

    fn read(&self, addr: u32) -> u32 {
        let offset = addr - self.base;
        match self.channel_register(offset) {
            Some((index, reg)) => self.read_channel(index, reg),
            None => self.read_global(offset),
        }
    }

    fn write(&self, addr: u32, value: u32) -> Result<(), PluginError> {
        let offset = addr - self.base;
        match self.channel_register(offset) {
            Some((index, reg)) => self.write_channel(index, reg, value),
            None => self.write_global(offset, value),
        }
        Ok(())
    }
}
