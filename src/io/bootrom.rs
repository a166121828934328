/// 256 bytes for the DMG boot rom.
pub const DMG_BOOTROM_SIZE: usize = 0x100;
/// The CGB boot rom covers 0x0000-0x08FF with a gap for the cartridge header.
pub const CGB_BOOTROM_SIZE: usize = 0x900;

pub struct BootRom {
    pub is_finished: bool,
    data: Vec<u8>,
}

impl BootRom {
    pub fn new(data: Option<Vec<u8>>) -> Self {
        match data {
            Some(rom) => {
                if rom.len() != DMG_BOOTROM_SIZE && rom.len() != CGB_BOOTROM_SIZE {
                    log::warn!("Boot rom with unexpected size {:#X} bytes, ignoring it", rom.len());
                    return Self::absent();
                }
                Self {
                    is_finished: false,
                    data: rom,
                }
            }
            None => Self::absent(),
        }
    }

    fn absent() -> Self {
        Self {
            is_finished: true,
            data: Vec::new(),
        }
    }

    pub fn read_byte(&self, address: u16) -> u8 {
        self.data[address as usize]
    }

    /// Whether the boot rom overlays the provided address in the current mode.
    /// The CGB image additionally covers 0x0200-0x08FF.
    pub fn maps(&self, address: u16) -> bool {
        if self.is_finished {
            return false;
        }
        match address {
            0x0000..=0x00FF => true,
            0x0200..=0x08FF => self.data.len() == CGB_BOOTROM_SIZE,
            _ => false,
        }
    }
}
