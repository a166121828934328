use crate::hardware::ppu::register_flags::AttributeFlags;
use crate::hardware::ppu::tiledata::SpriteAttribute;
use crate::hardware::ppu::PPU;
use crate::scheduler::EventType::DmaTransferComplete;
use crate::scheduler::Scheduler;

impl PPU {
    /// Called once the OAM DMA engine releases the bus again.
    pub fn oam_dma_finished(&mut self) {
        log::trace!("OAM DMA transfer finished");
        self.oam_transfer_ongoing = false;
    }

    /// Batch write of the 160 bytes an OAM DMA transfer moves.
    ///
    /// The CPU observes the copy itself as instantaneous, but OAM stays
    /// inaccessible until the engine finishes 640 cycles later.
    pub fn oam_dma_transfer(&mut self, values: &[u8], scheduler: &mut Scheduler) {
        debug_assert_eq!(values.len(), 0xA0, "OAM DMA transfers exactly 0xA0 bytes");

        for i in 0..40 {
            let offset = i * 4;
            self.oam[i] = SpriteAttribute {
                y_pos: values[offset],
                x_pos: values[offset + 1],
                tile_number: values[offset + 2],
                attribute_flags: AttributeFlags::from_bits_truncate(values[offset + 3]),
            };
        }

        // In case another DMA transfer was ongoing its completion event was
        // already cancelled by the MMU before we got called.
        self.oam_transfer_ongoing = true;
        scheduler.push_relative(DmaTransferComplete, 640);
    }
}
