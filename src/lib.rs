pub mod emulator;
mod scheduler;
pub mod state;

pub use crate::emulator::{Emulator, EmulatorMode};
pub use crate::hardware::cartridge::CartridgeError;
pub use crate::hardware::ppu::palette::{DisplayColour, RGB};
pub use crate::io::joypad::InputKey;

pub mod hardware;
mod io;

/// Struct for wrapping all the various options for the `Emulator`
#[derive(Debug)]
pub struct EmulatorOptions {
    pub boot_rom: Option<Vec<u8>>,
    pub saved_ram: Option<Vec<u8>>,
    pub saved_rtc: Option<state::RtcState>,
    pub emulator_mode: EmulatorMode,
    pub bg_display_colour: DisplayColour,
    pub sp0_display_colour: DisplayColour,
    pub sp1_display_colour: DisplayColour,
    pub sample_rate: u64,
}

#[derive(Debug)]
pub struct EmulatorOptionsBuilder {
    boot_rom: Option<Vec<u8>>,
    saved_ram: Option<Vec<u8>>,
    saved_rtc: Option<state::RtcState>,
    emulator_mode: EmulatorMode,
    bg_display_colour: DisplayColour,
    sp0_display_colour: DisplayColour,
    sp1_display_colour: DisplayColour,
    sample_rate: u64,
}

impl EmulatorOptionsBuilder {
    pub fn new() -> Self {
        EmulatorOptionsBuilder {
            boot_rom: None,
            saved_ram: None,
            saved_rtc: None,
            emulator_mode: EmulatorMode::DMG,
            bg_display_colour: DisplayColour::default(),
            sp0_display_colour: DisplayColour::default(),
            sp1_display_colour: DisplayColour::default(),
            sample_rate: 44_100,
        }
    }

    pub fn boot_rom(mut self, boot_rom: Option<Vec<u8>>) -> Self {
        self.boot_rom = boot_rom;
        self
    }

    pub fn saved_ram(mut self, saved_ram: Option<Vec<u8>>) -> Self {
        self.saved_ram = saved_ram;
        self
    }

    pub fn saved_rtc(mut self, saved_rtc: Option<state::RtcState>) -> Self {
        self.saved_rtc = saved_rtc;
        self
    }

    pub fn with_mode(mut self, mode: EmulatorMode) -> Self {
        self.emulator_mode = mode;
        self
    }

    pub fn with_display_colours(mut self, bg: DisplayColour, sp0: DisplayColour, sp1: DisplayColour) -> Self {
        self.bg_display_colour = bg;
        self.sp0_display_colour = sp0;
        self.sp1_display_colour = sp1;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn build(self) -> EmulatorOptions {
        EmulatorOptions {
            boot_rom: self.boot_rom,
            saved_ram: self.saved_ram,
            saved_rtc: self.saved_rtc,
            emulator_mode: self.emulator_mode,
            bg_display_colour: self.bg_display_colour,
            sp0_display_colour: self.sp0_display_colour,
            sp1_display_colour: self.sp1_display_colour,
            sample_rate: self.sample_rate,
        }
    }
}

impl From<EmulatorOptions> for EmulatorOptionsBuilder {
    fn from(from: EmulatorOptions) -> Self {
        EmulatorOptionsBuilder {
            boot_rom: from.boot_rom,
            saved_ram: from.saved_ram,
            saved_rtc: from.saved_rtc,
            emulator_mode: from.emulator_mode,
            bg_display_colour: from.bg_display_colour,
            sp0_display_colour: from.sp0_display_colour,
            sp1_display_colour: from.sp1_display_colour,
            sample_rate: from.sample_rate,
        }
    }
}
