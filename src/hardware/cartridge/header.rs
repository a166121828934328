use std::str::from_utf8;

pub const HEADER_START: u16 = 0x0100;
pub const HEADER_END: u16 = 0x014F;

/// Colour support advertised at 0x143.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CgbFlag {
    /// Plain DMG cartridge.
    None,
    /// Runs on both DMG and CGB.
    Dual,
    /// CGB hardware required.
    CgbOnly,
}

impl CgbFlag {
    pub fn supports_cgb(self) -> bool {
        self != CgbFlag::None
    }
}

/// Which memory bank controller drives the cartridge.
///
/// The more exotic chips are mapped onto the behaviour of the closest chip
/// we implement; their feature bits (battery/RTC/rumble) are kept separately.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum MbcKind {
    None,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

#[derive(Debug, Copy, Clone)]
pub struct CartridgeType {
    pub mbc: MbcKind,
    pub has_ram: bool,
    pub has_battery: bool,
    pub has_rtc: bool,
    pub has_rumble: bool,
}

#[derive(Debug)]
pub struct CartridgeHeader {
    /// Upper case ASCII, 16 characters in DMG, zero filled if less than that.
    /// In CGB it's either 15 or 11 characters instead.
    pub title: String,
    /// 4 character manufacturer code (newer cartridges only).
    pub manufacturer_code: String,
    /// In DMG this is still part of the title bytes, in CGB it contains a flag
    /// determining the relevant mode.
    pub cgb_flag: CgbFlag,
    /// Two character ASCII code, this one is for newer games only. Older games use the other header.
    pub new_licensee_code: u16,
    /// Specifies whether the game supports SGB functions.
    pub sgb_flag: bool,
    /// The decoded cartridge type byte (0x147).
    pub cartridge_type: CartridgeType,
    /// Amount of 16 KB ROM banks in the cartridge.
    pub rom_banks: u16,
    /// Amount of 8 KB external RAM banks in the cartridge.
    pub ram_banks: u8,
    /// Specifies if this version of the game is supposed to be sold in Japan,
    /// or anywhere else. Only two values are defined.
    pub is_japanese: bool,
    /// Specifies the games company/publisher code in range 00-FFh.
    /// A value of 0x33 signalizes that the New License Code in header bytes 0144-0145 is used instead.
    pub old_licensee_code: u8,
    /// Specifies the version number of the game. That is usually 0x00.
    pub mask_rom_version_number: u8,
    /// Contains an 8 bit checksum across the cartridge header bytes 0134-014C.
    pub header_checksum: u8,
    /// Contains a 16 bit checksum (upper byte first) across the whole cartridge ROM.
    /// The Game Boy doesn't verify this checksum.
    pub global_checksum: u16,
}

impl CartridgeHeader {
    /// Parse the header. The caller has verified the ROM is at least one
    /// bank (0x4000 bytes) long, so all header offsets are in range.
    pub fn new(rom: &[u8]) -> Option<Self> {
        let cgb_flag = read_cgb_flag(rom);
        Some(CartridgeHeader {
            title: read_title(rom, cgb_flag.supports_cgb()),
            manufacturer_code: read_manufacturer_code(rom),
            cgb_flag,
            new_licensee_code: read_new_licensee(rom),
            sgb_flag: rom[0x146] == 0x03,
            cartridge_type: read_cartridge_type(rom)?,
            rom_banks: read_rom_banks(rom),
            ram_banks: read_ram_banks(rom),
            is_japanese: rom[0x14A] == 0x00,
            old_licensee_code: rom[0x14B],
            mask_rom_version_number: rom[0x14C],
            header_checksum: rom[0x14D],
            global_checksum: ((rom[0x14E] as u16) << 8) | rom[0x14F] as u16,
        })
    }

    pub fn ram_size(&self) -> usize {
        self.ram_banks as usize * 0x2000
    }
}

fn read_title(rom: &[u8], cgb_mode: bool) -> String {
    // CGB apparently varies between 11 and 15 characters, chose the pessimistic option here.
    let slice = if cgb_mode { &rom[0x134..=0x13E] } else { &rom[0x134..=0x143] };

    from_utf8(slice)
        .unwrap_or("")
        .trim_matches(char::from(0))
        .trim()
        .to_owned()
}

fn read_manufacturer_code(rom: &[u8]) -> String {
    from_utf8(&rom[0x13F..=0x142])
        .unwrap_or("")
        .trim_matches(char::from(0))
        .to_owned()
}

fn read_cgb_flag(rom: &[u8]) -> CgbFlag {
    match rom[0x143] {
        0x80 => CgbFlag::Dual,
        0xC0 => CgbFlag::CgbOnly,
        // One commercial title shipped with 0x32 here; it behaves as a
        // dual-compatibility cartridge.
        0x32 => CgbFlag::Dual,
        _ => CgbFlag::None,
    }
}

fn read_new_licensee(rom: &[u8]) -> u16 {
    ((rom[0x144] as u16) << 8) | rom[0x145] as u16
}

fn read_cartridge_type(rom: &[u8]) -> Option<CartridgeType> {
    let (mbc, has_ram, has_battery, has_rtc, has_rumble) = match rom[0x147] {
        0x00 => (MbcKind::None, false, false, false, false),
        0x01 => (MbcKind::Mbc1, false, false, false, false),
        0x02 => (MbcKind::Mbc1, true, false, false, false),
        0x03 => (MbcKind::Mbc1, true, true, false, false),
        0x05 => (MbcKind::Mbc2, true, false, false, false),
        0x06 => (MbcKind::Mbc2, true, true, false, false),
        0x08 => (MbcKind::None, true, false, false, false),
        0x09 => (MbcKind::None, true, true, false, false),
        // MMM01 multi-carts boot into their last game without banking writes.
        0x0B => (MbcKind::None, false, false, false, false),
        0x0C => (MbcKind::None, true, false, false, false),
        0x0D => (MbcKind::None, true, true, false, false),
        0x0F => (MbcKind::Mbc3, false, true, true, false),
        0x10 => (MbcKind::Mbc3, true, true, true, false),
        0x11 => (MbcKind::Mbc3, false, false, false, false),
        0x12 => (MbcKind::Mbc3, true, false, false, false),
        0x13 => (MbcKind::Mbc3, true, true, false, false),
        0x19 => (MbcKind::Mbc5, false, false, false, false),
        0x1A => (MbcKind::Mbc5, true, false, false, false),
        0x1B => (MbcKind::Mbc5, true, true, false, false),
        0x1C => (MbcKind::Mbc5, false, false, false, true),
        0x1D => (MbcKind::Mbc5, true, false, false, true),
        0x1E => (MbcKind::Mbc5, true, true, false, true),
        // MBC7 and the pocket camera both answer to MBC5-style banking for
        // the parts we emulate.
        0x22 => (MbcKind::Mbc5, true, true, false, true),
        0xFC => (MbcKind::Mbc5, true, true, false, false),
        0xFD => (MbcKind::None, false, false, false, false),
        0xFE => (MbcKind::Mbc3, true, true, true, false),
        0xFF => (MbcKind::Mbc1, true, true, false, false),
        _ => return None,
    };

    Some(CartridgeType {
        mbc,
        has_ram,
        has_battery,
        has_rtc,
        has_rumble,
    })
}

fn read_rom_banks(rom: &[u8]) -> u16 {
    match rom[0x148] {
        n @ 0x00..=0x08 => 2 << n,
        0x52 => 72,
        0x53 => 80,
        0x54 => 96,
        other => {
            log::warn!("Unknown ROM size byte {:#04X}, deriving bank count from image size", other);
            (rom.len() / 0x4000).max(2) as u16
        }
    }
}

fn read_ram_banks(rom: &[u8]) -> u8 {
    match rom[0x149] {
        0x00 => 0,
        0x01 => 1,
        0x02 => 2,
        0x03 => 4,
        0x04 => 16,
        other => {
            log::warn!("Unknown RAM size byte {:#04X}, assuming no RAM", other);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with(fill: &[(usize, u8)]) -> Vec<u8> {
        let mut rom = vec![0u8; 0x4000];
        for (location, value) in fill {
            rom[*location] = *value;
        }
        rom
    }

    #[test]
    fn test_read_title() {
        let mut rom = vec![0u8; 0x4000];
        for (loc, i) in [0x48, 0x65, 0x6C, 0x6C, 0x6F, 0x20, 0x57, 0x6F, 0x72, 0x00, 0x00].iter().enumerate() {
            rom[0x134 + loc] = *i;
        }
        assert_eq!("Hello Wor", read_title(&rom, false))
    }

    #[test]
    fn test_cgb_flag() {
        assert_eq!(read_cgb_flag(&rom_with(&[(0x143, 0x80)])), CgbFlag::Dual);
        assert_eq!(read_cgb_flag(&rom_with(&[(0x143, 0xC0)])), CgbFlag::CgbOnly);
        assert_eq!(read_cgb_flag(&rom_with(&[(0x143, 0x32)])), CgbFlag::Dual);
        assert_eq!(read_cgb_flag(&rom_with(&[(0x143, 0x00)])), CgbFlag::None);
    }

    #[test]
    fn test_cartridge_type_features() {
        let header = CartridgeHeader::new(&rom_with(&[(0x147, 0x10), (0x148, 0x02), (0x149, 0x03)])).unwrap();

        assert_eq!(header.cartridge_type.mbc, MbcKind::Mbc3);
        assert!(header.cartridge_type.has_battery);
        assert!(header.cartridge_type.has_rtc);
        assert_eq!(header.rom_banks, 8);
        assert_eq!(header.ram_banks, 4);
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(CartridgeHeader::new(&rom_with(&[(0x147, 0x42)])).is_none());
    }

    #[test]
    fn test_odd_rom_bank_counts() {
        assert_eq!(read_rom_banks(&rom_with(&[(0x148, 0x52)])), 72);
        assert_eq!(read_rom_banks(&rom_with(&[(0x148, 0x54)])), 96);
    }
}
