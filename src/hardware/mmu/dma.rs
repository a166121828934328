use crate::hardware::mmu::cgb_mem::HdmaMode;
use crate::hardware::mmu::Memory;
use crate::hardware::ppu::memory_binds::DMA_TRANSFER;
use crate::scheduler::EventType::{DmaRequested, DmaTransferComplete};

impl Memory {
    /// Starts the sequence of events for an OAM DMA transfer.
    pub(super) fn dma_transfer(&mut self, value: u8) {
        self.io_registers.write_byte(DMA_TRANSFER, value);
        // In case a previous DMA was running we should cancel it.
        self.scheduler.remove_event_type(DmaTransferComplete);
        // 4 cycles after the request is when the DMA actually starts.
        self.scheduler.push_relative(DmaRequested, 4);
    }

    pub(super) fn gather_shadow_oam(&mut self, start_address: usize) -> Vec<u8> {
        let mut result = Vec::with_capacity(0xA0);
        for i in 0..0xA0 {
            result.push(self.read_byte((start_address + i) as u16));
        }
        result
    }

    /// A FF55 write either arms/starts a transfer or cancels a running
    /// H-Blank one (bit 7 cleared).
    pub(super) fn write_hdma5(&mut self, value: u8) {
        if self.hdma.transfer_ongoing && self.hdma.current_mode == HdmaMode::Hdma && value & 0x80 == 0 {
            log::debug!("Cancelling H-Blank DMA with {} bytes left", self.hdma.transfer_size);
            self.hdma.cancel();
            return;
        }

        self.hdma.start(value);

        if self.hdma.current_mode == HdmaMode::Gdma {
            self.gdma_transfer();
        }
    }

    /// A general purpose DMA copies everything at once while the CPU stalls.
    fn gdma_transfer(&mut self) {
        log::debug!(
            "Performing GDMA from source: {:#06X} to destination: {:#06X} ({} bytes)",
            self.hdma.source_address,
            self.hdma.destination_address,
            self.hdma.transfer_size
        );

        let blocks = (self.hdma.transfer_size / 16) as u64;
        while self.hdma.transfer_ongoing {
            self.copy_hdma_block();
        }

        // The CPU pays 32 cycles per block (double that in double speed).
        self.dma_stall_cycles += blocks * (32 << self.speed_shift());
    }

    /// Performs, when an H-Blank transfer is pending, the 16 byte block copy
    /// for this H-Blank.
    pub(super) fn hblank_hdma_step(&mut self) {
        if self.hdma.transfer_ongoing && self.hdma.current_mode == HdmaMode::Hdma {
            self.copy_hdma_block();
            self.dma_stall_cycles += 32 << self.speed_shift();
        }
    }

    fn copy_hdma_block(&mut self) {
        for i in 0..16 {
            let value = self.read_byte(self.hdma.source_address.wrapping_add(i));
            self.write_byte(self.hdma.destination_address.wrapping_add(i), value);
        }
        self.hdma.advance();
    }
}
