use thiserror::Error;

use crate::hardware::cartridge::header::{CartridgeHeader, MbcKind};
use crate::hardware::cartridge::mbc::*;
use crate::hardware::cartridge::mbc3::{Mbc3State, Rtc};
use crate::hardware::mmu::{EXTERNAL_RAM_START, INVALID_READ};
use crate::state::{MbcSnapshot, RtcState};

pub mod header;
pub mod mbc;
pub mod mbc3;

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("ROM image is too small ({0} bytes), a cartridge holds at least one 0x4000 byte bank")]
    TooSmall(usize),
    #[error("unsupported cartridge type byte: {0:#04X}")]
    UnsupportedType(u8),
}

pub struct Cartridge {
    header: CartridgeHeader,
    mbc: Mbc,
    rom: Vec<u8>,
    ram: Vec<u8>,
    ram_dirty: bool,
}

impl Cartridge {
    pub fn new(rom: &[u8], saved_ram: Option<Vec<u8>>, saved_rtc: Option<&RtcState>) -> Result<Self, CartridgeError> {
        if rom.len() < ROM_BANK_SIZE {
            return Err(CartridgeError::TooSmall(rom.len()));
        }

        let header = CartridgeHeader::new(rom).ok_or_else(|| CartridgeError::UnsupportedType(rom[0x147]))?;
        let cart_type = header.cartridge_type;

        let mbc = match cart_type.mbc {
            MbcKind::None => Mbc::None,
            MbcKind::Mbc1 => Mbc::Mbc1(Mbc1State::new()),
            MbcKind::Mbc2 => Mbc::Mbc2(Mbc2State::new()),
            MbcKind::Mbc3 => {
                let mut state = Mbc3State::new(cart_type.has_rtc);
                if let (Some(rtc), Some(saved)) = (state.rtc.as_mut(), saved_rtc) {
                    *rtc = Rtc::restore(saved);
                }
                Mbc::Mbc3(state)
            }
            MbcKind::Mbc5 => Mbc::Mbc5(Mbc5State::new(cart_type.has_rumble)),
        };

        let ram_size = match cart_type.mbc {
            MbcKind::Mbc2 => MBC2_RAM_SIZE,
            _ => header.ram_size(),
        };

        let ram = match saved_ram {
            Some(saved) if saved.len() == ram_size => saved,
            Some(saved) => {
                log::warn!(
                    "Saved RAM size {:#X} does not match cartridge RAM size {:#X}, starting fresh",
                    saved.len(),
                    ram_size
                );
                vec![0xFF; ram_size]
            }
            None => vec![0xFF; ram_size],
        };

        log::info!(
            "Loaded cartridge '{}' ({:?}, {} ROM banks, {} RAM banks)",
            header.title,
            cart_type.mbc,
            header.rom_banks,
            header.ram_banks
        );

        Ok(Cartridge {
            header,
            mbc,
            rom: rom.to_vec(),
            ram,
            ram_dirty: false,
        })
    }

    pub fn cartridge_header(&self) -> &CartridgeHeader {
        &self.header
    }

    pub fn has_battery(&self) -> bool {
        self.header.cartridge_type.has_battery
    }

    #[inline]
    pub fn read_0000_3fff(&self, address: u16) -> u8 {
        self.rom[address as usize]
    }

    #[inline]
    pub fn read_4000_7fff(&self, address: u16) -> u8 {
        let bank = self.current_rom_bank();
        self.rom[bank * ROM_BANK_SIZE + (address & 0x3FFF) as usize]
    }

    /// The ROM bank currently mapped at 0x4000-0x7FFF, masked to the banks
    /// that actually exist on the cartridge.
    fn current_rom_bank(&self) -> usize {
        let bank = match &self.mbc {
            Mbc::None => 1,
            Mbc::Mbc1(state) => state.rom_bank() as usize,
            Mbc::Mbc2(state) => state.rom_bank as usize,
            Mbc::Mbc3(state) => state.rom_bank as usize,
            Mbc::Mbc5(state) => state.rom_bank as usize,
        };

        bank % (self.rom.len() / ROM_BANK_SIZE)
    }

    pub fn read_external_ram(&self, address: u16) -> u8 {
        match &self.mbc {
            Mbc::None => self.ram_read(0, address),
            Mbc::Mbc1(state) => {
                if state.ram_enabled {
                    self.ram_read(state.ram_bank() as usize, address)
                } else {
                    INVALID_READ
                }
            }
            Mbc::Mbc2(state) => {
                if state.ram_enabled && !self.ram.is_empty() {
                    // Only 512 half-byte cells exist; they mirror through the region.
                    0xF0 | self.ram[(address as usize) & (MBC2_RAM_SIZE - 1)]
                } else {
                    INVALID_READ
                }
            }
            Mbc::Mbc3(state) => {
                if !state.ram_enabled {
                    INVALID_READ
                } else if state.ram_bank >= 0x08 {
                    state
                        .rtc
                        .as_ref()
                        .map_or(INVALID_READ, |rtc| rtc.read_register(state.ram_bank))
                } else {
                    self.ram_read(state.ram_bank as usize, address)
                }
            }
            Mbc::Mbc5(state) => {
                if state.ram_enabled {
                    self.ram_read(state.ram_bank as usize, address)
                } else {
                    INVALID_READ
                }
            }
        }
    }

    fn ram_read(&self, bank: usize, address: u16) -> u8 {
        let offset = bank * EXTERNAL_RAM_SIZE + (address - EXTERNAL_RAM_START) as usize;
        if offset < self.ram.len() {
            self.ram[offset]
        } else {
            INVALID_READ
        }
    }

    /// Banking control writes to the 0x0000-0x7FFF ROM area.
    ///
    /// `current_time` and `cycles_per_second` feed the MBC3 clock latch.
    pub fn write_mbc_control(&mut self, address: u16, value: u8, current_time: u64, cycles_per_second: u64) {
        match &mut self.mbc {
            Mbc::None => {}
            Mbc::Mbc1(state) => match address {
                0x0000..=0x1FFF => state.ram_enabled = (value & 0xF) == 0xA,
                0x2000..=0x3FFF => state.bank1 = value & 0x1F,
                0x4000..=0x5FFF => state.bank2 = value & 0x03,
                _ => state.mode1 = (value & 0x1) == 0x1,
            },
            Mbc::Mbc2(state) => match address {
                0x0000..=0x0FFF => state.ram_enabled = (value & 0xF) == 0xA,
                0x2100..=0x21FF => state.set_rom_bank(value),
                _ => {}
            },
            Mbc::Mbc3(state) => match address {
                0x0000..=0x1FFF => state.ram_enabled = (value & 0xF) == 0xA,
                0x2000..=0x3FFF => state.set_rom_bank(value),
                0x4000..=0x5FFF => state.ram_bank = value & 0x0F,
                _ => {
                    if let Some(rtc) = state.rtc.as_mut() {
                        rtc.write_latch(value, current_time, cycles_per_second);
                    }
                }
            },
            Mbc::Mbc5(state) => match address {
                0x0000..=0x1FFF => state.ram_enabled = (value & 0xF) == 0xA,
                0x2000..=0x2FFF => state.set_rom_bank_low(value),
                0x3000..=0x3FFF => state.set_rom_bank_high(value),
                0x4000..=0x5FFF => state.set_ram_bank(value),
                _ => {}
            },
        }
    }

    pub fn write_external_ram(&mut self, address: u16, value: u8, current_time: u64, cycles_per_second: u64) {
        let ram = &mut self.ram;
        let ram_dirty = &mut self.ram_dirty;
        match &mut self.mbc {
            Mbc::None => {}
            Mbc::Mbc1(state) => {
                if state.ram_enabled {
                    ram_write(ram, ram_dirty, state.ram_bank() as usize, address, value);
                }
            }
            Mbc::Mbc2(state) => {
                if state.ram_enabled && !ram.is_empty() {
                    ram[(address as usize) & (MBC2_RAM_SIZE - 1)] = value & 0x0F;
                    *ram_dirty = true;
                }
            }
            Mbc::Mbc3(state) => {
                if !state.ram_enabled {
                    return;
                }
                if state.ram_bank >= 0x08 {
                    if let Some(rtc) = state.rtc.as_mut() {
                        rtc.write_register(state.ram_bank, value, current_time, cycles_per_second);
                        *ram_dirty = true;
                    }
                } else {
                    ram_write(ram, ram_dirty, state.ram_bank as usize, address, value);
                }
            }
            Mbc::Mbc5(state) => {
                if state.ram_enabled {
                    ram_write(ram, ram_dirty, state.ram_bank as usize, address, value);
                }
            }
        }
    }

    /// Returns, if the current ROM has a battery, the contents of the external RAM.
    ///
    /// Should be used for saving functionality.
    pub fn battery_ram(&self) -> Option<&[u8]> {
        if self.has_battery() {
            Some(&self.ram)
        } else {
            None
        }
    }

    /// Whether external RAM was written since the last call; the host can use
    /// this to debounce battery saves.
    pub fn take_ram_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.ram_dirty, false)
    }

    pub fn rtc(&self) -> Option<&Rtc> {
        match &self.mbc {
            Mbc::Mbc3(state) => state.rtc.as_ref(),
            _ => None,
        }
    }

    pub fn rtc_mut(&mut self) -> Option<&mut Rtc> {
        match &mut self.mbc {
            Mbc::Mbc3(state) => state.rtc.as_mut(),
            _ => None,
        }
    }

    pub fn rumble_active(&self) -> bool {
        match &self.mbc {
            Mbc::Mbc5(state) => state.rumble_active,
            _ => false,
        }
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn overwrite_ram(&mut self, ram: Vec<u8>) {
        if ram.len() == self.ram.len() {
            self.ram = ram;
        } else {
            log::error!("Refusing to restore RAM with mismatched size {:#X}", ram.len());
        }
    }

    pub fn mbc_snapshot(&self) -> MbcSnapshot {
        let mut snapshot = MbcSnapshot::default();
        match &self.mbc {
            Mbc::None => {}
            Mbc::Mbc1(state) => {
                snapshot.ram_enabled = state.ram_enabled;
                snapshot.rom_bank_low = state.bank1;
                snapshot.rom_bank_high = state.bank2;
                snapshot.mode1 = state.mode1;
            }
            Mbc::Mbc2(state) => {
                snapshot.ram_enabled = state.ram_enabled;
                snapshot.rom_bank_low = state.rom_bank;
            }
            Mbc::Mbc3(state) => {
                snapshot.ram_enabled = state.ram_enabled;
                snapshot.rom_bank_low = state.rom_bank;
                snapshot.ram_bank = state.ram_bank;
            }
            Mbc::Mbc5(state) => {
                snapshot.ram_enabled = state.ram_enabled;
                snapshot.rom_bank_low = state.rom_bank as u8;
                snapshot.rom_bank_high = (state.rom_bank >> 8) as u8;
                snapshot.ram_bank = state.ram_bank;
                snapshot.rumble_active = state.rumble_active;
            }
        }
        snapshot
    }

    pub fn restore_mbc(&mut self, snapshot: &MbcSnapshot) {
        match &mut self.mbc {
            Mbc::None => {}
            Mbc::Mbc1(state) => {
                state.ram_enabled = snapshot.ram_enabled;
                state.bank1 = snapshot.rom_bank_low & 0x1F;
                state.bank2 = snapshot.rom_bank_high & 0x03;
                state.mode1 = snapshot.mode1;
            }
            Mbc::Mbc2(state) => {
                state.ram_enabled = snapshot.ram_enabled;
                state.rom_bank = snapshot.rom_bank_low & 0x0F;
            }
            Mbc::Mbc3(state) => {
                state.ram_enabled = snapshot.ram_enabled;
                state.rom_bank = snapshot.rom_bank_low & 0x7F;
                state.ram_bank = snapshot.ram_bank;
            }
            Mbc::Mbc5(state) => {
                state.ram_enabled = snapshot.ram_enabled;
                state.rom_bank = snapshot.rom_bank_low as u16 | ((snapshot.rom_bank_high as u16 & 0x1) << 8);
                state.ram_bank = snapshot.ram_bank;
                state.rumble_active = snapshot.rumble_active;
            }
        }
    }
}

fn ram_write(ram: &mut [u8], ram_dirty: &mut bool, bank: usize, address: u16, value: u8) {
    let offset = bank * EXTERNAL_RAM_SIZE + (address - EXTERNAL_RAM_START) as usize;
    if offset < ram.len() {
        ram[offset] = value;
        *ram_dirty = true;
    }
}

impl std::fmt::Debug for Cartridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cartridge {{ title: {}, mbc: {:?} }}", self.header.title, self.mbc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn test_rom(cartridge_type: u8, rom_banks_byte: u8, ram_banks_byte: u8) -> Vec<u8> {
        let banks: usize = match rom_banks_byte {
            n @ 0x00..=0x08 => 2 << n,
            _ => 2,
        };
        let mut rom = vec![0u8; banks * ROM_BANK_SIZE];
        rom[0x147] = cartridge_type;
        rom[0x148] = rom_banks_byte;
        rom[0x149] = ram_banks_byte;
        // Tag every bank with its own number so reads are identifiable.
        for bank in 0..banks {
            rom[bank * ROM_BANK_SIZE] = bank as u8;
        }
        rom
    }

    #[test]
    fn test_too_small_rom_rejected() {
        assert!(matches!(
            Cartridge::new(&[0u8; 0x100], None, None),
            Err(CartridgeError::TooSmall(0x100))
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut rom = test_rom(0x01, 0x01, 0x00);
        rom[0x147] = 0x42;
        assert!(matches!(
            Cartridge::new(&rom, None, None),
            Err(CartridgeError::UnsupportedType(0x42))
        ));
    }

    #[test]
    fn test_mbc1_bank_zero_write_selects_bank_one() {
        let rom = test_rom(0x01, 0x02, 0x00);
        let mut cartridge = Cartridge::new(&rom, None, None).unwrap();

        cartridge.write_mbc_control(0x2000, 0x00, 0, 1);

        assert_eq!(cartridge.read_4000_7fff(0x4000), 1);
    }

    #[test]
    fn test_mbc1_bank_switching() {
        let rom = test_rom(0x01, 0x02, 0x00);
        let mut cartridge = Cartridge::new(&rom, None, None).unwrap();

        cartridge.write_mbc_control(0x2000, 0x05, 0, 1);

        assert_eq!(cartridge.read_4000_7fff(0x4000), 5);
        assert_eq!(cartridge.read_0000_3fff(0x0000), 0);
    }

    #[test]
    fn test_ram_disabled_reads_ff() {
        let rom = test_rom(0x03, 0x01, 0x02);
        let mut cartridge = Cartridge::new(&rom, None, None).unwrap();

        cartridge.write_external_ram(0xA000, 0x12, 0, 1);
        assert_eq!(cartridge.read_external_ram(0xA000), 0xFF);

        cartridge.write_mbc_control(0x0000, 0x0A, 0, 1);
        cartridge.write_external_ram(0xA000, 0x12, 0, 1);
        assert_eq!(cartridge.read_external_ram(0xA000), 0x12);
        assert!(cartridge.take_ram_dirty());
        assert!(!cartridge.take_ram_dirty());
    }

    #[test]
    fn test_mbc2_nibble_ram_mirrors() {
        let rom = test_rom(0x06, 0x01, 0x00);
        let mut cartridge = Cartridge::new(&rom, None, None).unwrap();

        cartridge.write_mbc_control(0x0000, 0x0A, 0, 1);
        cartridge.write_external_ram(0xA000, 0xFF, 0, 1);

        assert_eq!(cartridge.read_external_ram(0xA000), 0xFF);
        // Mirrored every 0x200 bytes, and only the low nibble is stored.
        assert_eq!(cartridge.read_external_ram(0xA200), 0xFF);
        cartridge.write_external_ram(0xA001, 0x3C, 0, 1);
        assert_eq!(cartridge.read_external_ram(0xA001), 0xFC);
    }

    #[test]
    fn test_mbc3_rtc_latch_sequence() {
        let rom = test_rom(0x10, 0x02, 0x03);
        let mut cartridge = Cartridge::new(&rom, None, None).unwrap();

        cartridge.write_mbc_control(0x0000, 0x0A, 0, 1);
        // Let 5 emulated seconds pass, then latch.
        cartridge.write_mbc_control(0x6000, 0x00, 5, 1);
        cartridge.write_mbc_control(0x6000, 0x01, 5, 1);
        // Select the RTC seconds register.
        cartridge.write_mbc_control(0x4000, 0x08, 5, 1);

        assert_eq!(cartridge.read_external_ram(0xA000), 5);
    }

    #[test]
    fn test_mbc5_rom_bank_zero_window() {
        let rom = test_rom(0x19, 0x03, 0x00);
        let mut cartridge = Cartridge::new(&rom, None, None).unwrap();

        cartridge.write_mbc_control(0x2000, 0x00, 0, 1);

        // Unlike MBC1, MBC5 can map bank 0 into the switchable window.
        assert_eq!(cartridge.read_4000_7fff(0x4000), 0);
    }
}
