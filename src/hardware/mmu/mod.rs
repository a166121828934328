use std::fmt;
use std::fmt::{Debug, Formatter};

use log::*;

use hram::Hram;

use crate::emulator::{EmulatorMode, DMG_CLOCK_SPEED};
use crate::hardware::apu::{APU, APU_MEM_END, APU_MEM_START, WAVE_SAMPLE_END, WAVE_SAMPLE_START};
use crate::hardware::cartridge::{Cartridge, CartridgeError};
use crate::hardware::mmu::cgb_mem::{CgbData, HdmaMode, HdmaRegister};
use crate::hardware::mmu::wram::Wram;
use crate::hardware::ppu::memory_binds::*;
use crate::hardware::ppu::timing::{LINE_153_RESET_DELAY, OAM_SEARCH_DURATION, SCANLINE_DURATION};
use crate::hardware::ppu::PPU;
use crate::io::bootrom::BootRom;
use crate::io::interrupts::Interrupts;
use crate::io::io_registers::IORegisters;
use crate::io::joypad::{JoyPad, JOYPAD_REGISTER};
use crate::io::serial::{SerialPort, SIO_CONT, SIO_DATA};
use crate::io::timer::*;
use crate::scheduler::{EventType, Scheduler};
use crate::EmulatorOptions;

pub mod cgb_mem;
mod dma;
mod hram;
mod wram;

pub const MEMORY_SIZE: usize = 0x10000;
/// 16 KB ROM bank, usually 00. From Cartridge, read-only
pub const ROM_BANK_00_START: u16 = 0x0000;
pub const ROM_BANK_00_END: u16 = 0x3FFF;
/// 16 KB Rom Bank 01~NN. From cartridge, switchable bank via Memory Bank. Read-only.
pub const ROM_BANK_NN_START: u16 = 0x4000;
pub const ROM_BANK_NN_END: u16 = 0x7FFF;
/// 8 KB of VRAM, only bank 0 in Non-CGB mode. Switchable bank 0/1 in CGB mode.
pub const VRAM_START: u16 = 0x8000;
pub const VRAM_END: u16 = 0x9FFF;
/// 8 KB of External Ram, in cartridge, switchable bank if any. Could hold save data.
pub const EXTERNAL_RAM_START: u16 = 0xA000;
pub const EXTERNAL_RAM_END: u16 = 0xBFFF;
/// 4 KB Work RAM bank 0
pub const WRAM_BANK_00_START: u16 = 0xC000;
pub const WRAM_BANK_00_END: u16 = 0xCFFF;
/// 4 KB Work RAM bank 1~N. Only bank 1 in Non-CGB mode, switchable bank 1~7 in CGB mode.
pub const WRAM_BANK_NN_START: u16 = 0xD000;
pub const WRAM_BANK_NN_END: u16 = 0xDFFF;
/// Mirror of C000~DDFF (ECHO RAM). Typically not used
pub const ECHO_RAM_START: u16 = 0xE000;
pub const ECHO_RAM_END: u16 = 0xFDFF;
/// Sprite attribute table (OAM)
pub const OAM_ATTRIBUTE_START: u16 = 0xFE00;
pub const OAM_ATTRIBUTE_END: u16 = 0xFE9F;
/// Not usable
pub const NOT_USABLE_START: u16 = 0xFEA0;
pub const NOT_USABLE_END: u16 = 0xFEFF;
/// I/O Registers
pub const IO_START: u16 = 0xFF00;
pub const IO_END: u16 = 0xFF7F;

pub const CGB_PREPARE_SWITCH: u16 = 0xFF4D;
/// Specifies the higher byte of the HDMA source address. Always returns FFh when read.
pub const CGB_HDMA_1: u16 = 0xFF51;
/// Specifies the lower byte of the HDMA source address. The lower 4 bits are ignored,
/// transfers are always aligned to 16 bytes. Always returns FFh when read.
pub const CGB_HDMA_2: u16 = 0xFF52;
/// Specifies the higher byte of the destination address. Destination is always in VRAM
/// (8000h - 9FFFh), the 3 upper bits are ignored. Always returns FFh when read.
pub const CGB_HDMA_3: u16 = 0xFF53;
/// Specifies the lower byte of the destination address. The lower 4 bits are ignored.
/// Always returns FFh when read.
pub const CGB_HDMA_4: u16 = 0xFF54;
/// This register specifies the length and mode of the transfer, and starts the copy
/// when it is written. Returns FFh in DMG mode.
/// Bit 7 - Transfer mode (0=GDMA, 1=HDMA)
/// Bits 6-0 - Blocks (Size = (Blocks+1) x 16 bytes)
pub const CGB_HDMA_5: u16 = 0xFF55;
/// Infrared communications port.
pub const CGB_RP: u16 = 0xFF56;
/// Work ram bank switching.
pub const CGB_WRAM_BANK: u16 = 0xFF70;

/// The flag used to signal that an interrupt is pending.
pub const INTERRUPTS_FLAG: u16 = 0xFF0F;
/// High Ram (HRAM)
pub const HRAM_START: u16 = 0xFF80;
pub const HRAM_END: u16 = 0xFFFE;
/// Interrupts Enable Register (IE)
pub const INTERRUPTS_ENABLE: u16 = 0xFFFF;
/// The value to return for an invalid read
pub const INVALID_READ: u8 = 0xFF;

/// Memory interface the CPU executes against: plain byte access plus the
/// handful of hooks that tie instruction execution to the rest of the
/// machine. Reads take `&mut self` since several peripherals synchronise
/// lazily on access.
pub trait MemoryMapper: Debug {
    fn read_byte(&mut self, address: u16) -> u8;
    fn write_byte(&mut self, address: u16, value: u8);
    fn boot_rom_finished(&self) -> bool {
        true
    }
    fn get_mode(&self) -> EmulatorMode {
        EmulatorMode::DMG
    }
    /// Returns the cartridge, if any is present.
    fn cartridge(&self) -> Option<&Cartridge> {
        None
    }
    fn interrupts(&self) -> &Interrupts;
    fn interrupts_mut(&mut self) -> &mut Interrupts;
    /// Push `cycles` T-cycles through every peripheral.
    /// Returns `true` if a V-Blank occurred during this window.
    fn advance_cycles(&mut self, cycles: u64) -> bool;
    /// Advance in one step to the earliest upcoming point of interest (the
    /// next scheduler event or predicted timer interrupt), bounded by `limit`.
    /// Used by `HALT`/`STOP` so idle time costs next to nothing.
    fn fast_forward(&mut self, limit: u64) -> bool {
        let _ = limit;
        self.advance_cycles(4)
    }
    /// Cycles the CPU lost to a DMA engine since the last call.
    fn take_dma_stall(&mut self) -> u64 {
        0
    }
    /// `STOP` was executed; returns `true` when it performed a CGB speed
    /// switch instead of stopping the machine.
    fn try_speed_switch(&mut self) -> bool {
        false
    }
}

pub struct Memory {
    boot_rom: BootRom,
    pub cartridge: Cartridge,
    pub scheduler: Scheduler,
    pub emulation_mode: EmulatorMode,
    pub cgb_data: CgbData,
    pub hdma: HdmaRegister,

    pub ppu: PPU,
    pub apu: APU,
    pub hram: Hram,
    pub wram: Wram,

    pub joypad_register: JoyPad,
    pub timers: TimerRegisters,
    pub serial: SerialPort,
    pub interrupts: Interrupts,
    pub io_registers: IORegisters,

    dma_stall_cycles: u64,
}

impl Memory {
    pub fn new(cartridge: &[u8], emu_opts: EmulatorOptions) -> Result<Self, CartridgeError> {
        let cartridge = Cartridge::new(cartridge, emu_opts.saved_ram, emu_opts.saved_rtc.as_ref())?;

        // The mode we end up in is decided by both the request and what the
        // cartridge supports; it stays latched for the whole session.
        let emulation_mode = match (emu_opts.emulator_mode, cartridge.cartridge_header().cgb_flag.supports_cgb()) {
            (EmulatorMode::DMG, false) => EmulatorMode::DMG,
            (EmulatorMode::DMG, true) => EmulatorMode::DMG,
            (_, true) => EmulatorMode::CGB,
            (_, false) => EmulatorMode::CgbCompat,
        };

        let mut result = Memory {
            boot_rom: BootRom::new(emu_opts.boot_rom),
            cartridge,
            scheduler: Scheduler::new(),
            emulation_mode,
            cgb_data: CgbData::new(),
            hdma: HdmaRegister::new(),
            ppu: PPU::new(
                emulation_mode,
                emu_opts.bg_display_colour,
                emu_opts.sp0_display_colour,
                emu_opts.sp1_display_colour,
            ),
            apu: APU::new(),
            hram: Hram::new(),
            wram: Wram::new(),
            joypad_register: JoyPad::new(),
            timers: Default::default(),
            serial: SerialPort::new(),
            interrupts: Default::default(),
            io_registers: IORegisters::new(),
            dma_stall_cycles: 0,
        };

        result.apu.set_sample_rate(emu_opts.sample_rate, DMG_CLOCK_SPEED);

        if result.boot_rom.is_finished {
            result.post_boot_init();
        }

        Ok(result)
    }

    /// Bring all registers to the documented post-boot values, used when no
    /// boot rom image was provided.
    fn post_boot_init(&mut self) {
        // DIV has a known phase after the boot rom handed over control.
        self.timers.system_clock = 0xABCC;

        for &(address, value) in [
            (0xFF10u16, 0x80u8),
            (0xFF11, 0xBF),
            (0xFF12, 0xF3),
            (0xFF14, 0xBF),
            (0xFF16, 0x3F),
            (0xFF17, 0x00),
            (0xFF19, 0xBF),
            (0xFF1A, 0x7F),
            (0xFF1B, 0xFF),
            (0xFF1C, 0x9F),
            (0xFF1E, 0xBF),
            (0xFF20, 0xFF),
            (0xFF21, 0x00),
            (0xFF22, 0x00),
            (0xFF23, 0xBF),
            (0xFF24, 0x77),
            (0xFF25, 0xF3),
            (0xFF47, 0xFC),
            (0xFF48, 0xFF),
            (0xFF49, 0xFF),
            // LCDC last: this turns the LCD on and schedules the first line.
            (0xFF40, 0x91),
        ]
        .iter()
        {
            self.write_byte(address, value);
        }
    }

    pub fn read_byte(&mut self, address: u16) -> u8 {
        match address {
            _ if self.boot_rom.maps(address) => self.boot_rom.read_byte(address),
            ROM_BANK_00_START..=ROM_BANK_00_END => self.cartridge.read_0000_3fff(address),
            ROM_BANK_NN_START..=ROM_BANK_NN_END => self.cartridge.read_4000_7fff(address),
            VRAM_START..=VRAM_END => self.ppu.read_vram(address),
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => self.cartridge.read_external_ram(address),
            WRAM_BANK_00_START..=WRAM_BANK_00_END => self.wram.read_bank_0(address),
            WRAM_BANK_NN_START..=WRAM_BANK_NN_END => self.wram.read_bank_n(address),
            ECHO_RAM_START..=ECHO_RAM_END => self.wram.read_echo_ram(address),
            OAM_ATTRIBUTE_START..=OAM_ATTRIBUTE_END => self.ppu.read_vram(address),
            NOT_USABLE_START..=NOT_USABLE_END => self.non_usable_call(address),
            IO_START..=IO_END => self.read_io_byte(address),
            HRAM_START..=HRAM_END => self.hram.read_byte(address),
            INTERRUPTS_ENABLE => self.interrupts.read_ie(),
        }
    }

    pub fn write_byte(&mut self, address: u16, value: u8) {
        match address {
            ROM_BANK_00_START..=ROM_BANK_NN_END => {
                let (time, cps) = (self.scheduler.current_time, self.cycles_per_second());
                self.cartridge.write_mbc_control(address, value, time, cps)
            }
            VRAM_START..=VRAM_END => {
                let shift = self.speed_shift();
                self.ppu
                    .write_vram(address, value, &mut self.scheduler, &mut self.interrupts, shift)
            }
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => {
                let (time, cps) = (self.scheduler.current_time, self.cycles_per_second());
                self.cartridge.write_external_ram(address, value, time, cps)
            }
            WRAM_BANK_00_START..=WRAM_BANK_00_END => self.wram.write_bank_0(address, value),
            WRAM_BANK_NN_START..=WRAM_BANK_NN_END => self.wram.write_bank_n(address, value),
            ECHO_RAM_START..=ECHO_RAM_END => self.wram.write_echo_ram(address, value),
            OAM_ATTRIBUTE_START..=OAM_ATTRIBUTE_END => {
                let shift = self.speed_shift();
                self.ppu
                    .write_vram(address, value, &mut self.scheduler, &mut self.interrupts, shift)
            }
            NOT_USABLE_START..=NOT_USABLE_END => trace!("ROM writing to non-usable memory: {:04X}", address),
            IO_START..=IO_END => self.write_io_byte(address, value),
            HRAM_START..=HRAM_END => self.hram.set_byte(address, value),
            INTERRUPTS_ENABLE => self.interrupts.overwrite_ie(value),
        }
    }

    /// Specific method for all reads to the IO registers.
    fn read_io_byte(&mut self, address: u16) -> u8 {
        match address {
            JOYPAD_REGISTER => self.joypad_register.get_register(),
            SIO_DATA => self.serial.read_data(),
            SIO_CONT => self.serial.read_control(self.emulation_mode),
            DIVIDER_REGISTER => self.timers.divider_register(),
            TIMER_COUNTER => self.timers.timer_counter,
            TIMER_MODULO => self.timers.timer_modulo,
            TIMER_CONTROL => self.timers.timer_control.to_bits(),
            INTERRUPTS_FLAG => self.interrupts.read_if(),
            APU_MEM_START..=APU_MEM_END => {
                let (time, shift) = (self.scheduler.current_time, self.speed_shift());
                self.apu.read_register(address, time, shift)
            }
            WAVE_SAMPLE_START..=WAVE_SAMPLE_END => {
                let (time, shift) = (self.scheduler.current_time, self.speed_shift());
                self.apu.read_wave_sample(address, time, shift)
            }
            LCD_CONTROL_REGISTER..=LYC_REGISTER => self.ppu.read_vram(address),
            DMA_TRANSFER => self.io_registers.read_byte(address),
            BG_PALETTE..=WX_REGISTER => self.ppu.read_vram(address),
            CGB_PREPARE_SWITCH if self.emulation_mode.is_cgb_hardware() => self.cgb_data.read_prepare_switch(),
            CGB_VRAM_BANK_REGISTER => self.ppu.read_vram(address),
            CGB_HDMA_1..=CGB_HDMA_4 => INVALID_READ,
            CGB_HDMA_5 if self.emulation_mode.is_cgb() => self.hdma.hdma5(),
            CGB_RP => self.io_registers.read_byte(address),
            CGB_BACKGROUND_COLOR_INDEX..=CGB_OBJECT_PRIORITY_MODE => self.ppu.read_vram(address),
            CGB_WRAM_BANK if self.emulation_mode.is_cgb() => self.wram.read_bank_select(),
            // The CGB-only registers behave as unmapped I/O everywhere else.
            CGB_PREPARE_SWITCH | CGB_HDMA_5 | CGB_WRAM_BANK => INVALID_READ,
            _ => self.io_registers.read_byte(address),
        }
    }

    fn write_io_byte(&mut self, address: u16, value: u8) {
        match address {
            JOYPAD_REGISTER => self.joypad_register.set_register(value),
            SIO_DATA => self.serial.write_data(value),
            SIO_CONT => {
                let mode = self.emulation_mode;
                self.serial.write_control(value, mode, &mut self.scheduler)
            }
            DIVIDER_REGISTER => self.timers.set_divider(),
            TIMER_COUNTER => self.timers.set_timer_counter(value),
            TIMER_MODULO => self.timers.set_tma(value),
            TIMER_CONTROL => self.timers.set_timer_control(value),
            INTERRUPTS_FLAG => self.interrupts.overwrite_if(value),
            APU_MEM_START..=APU_MEM_END => {
                let (time, mode, shift) = (self.scheduler.current_time, self.emulation_mode, self.speed_shift());
                self.apu.write_register(address, value, time, mode, shift)
            }
            WAVE_SAMPLE_START..=WAVE_SAMPLE_END => {
                let (time, shift) = (self.scheduler.current_time, self.speed_shift());
                self.apu.write_wave_sample(address, value, time, shift)
            }
            DMA_TRANSFER => self.dma_transfer(value),
            LCD_CONTROL_REGISTER..=WX_REGISTER => {
                let shift = self.speed_shift();
                self.ppu
                    .write_vram(address, value, &mut self.scheduler, &mut self.interrupts, shift)
            }
            CGB_PREPARE_SWITCH if self.emulation_mode.is_cgb_hardware() => self.cgb_data.write_prepare_switch(value),
            CGB_VRAM_BANK_REGISTER => {
                let shift = self.speed_shift();
                self.ppu
                    .write_vram(address, value, &mut self.scheduler, &mut self.interrupts, shift)
            }
            CGB_HDMA_1 if self.emulation_mode.is_cgb() => self.hdma.write_hdma1(value),
            CGB_HDMA_2 if self.emulation_mode.is_cgb() => self.hdma.write_hdma2(value),
            CGB_HDMA_3 if self.emulation_mode.is_cgb() => self.hdma.write_hdma3(value),
            CGB_HDMA_4 if self.emulation_mode.is_cgb() => self.hdma.write_hdma4(value),
            CGB_HDMA_5 if self.emulation_mode.is_cgb() => self.write_hdma5(value),
            0xFF50 if !self.boot_rom.is_finished => {
                self.boot_rom.is_finished = true;
                // A cartridge without CGB support drops the machine into
                // compatibility mode once the boot rom signs off.
                if !self.cartridge.cartridge_header().cgb_flag.supports_cgb()
                    && self.emulation_mode == EmulatorMode::CGB
                {
                    self.emulation_mode = EmulatorMode::CgbCompat;
                }
                info!("Finished executing BootRom!");
            }
            CGB_RP => self.io_registers.write_byte(address, value),
            CGB_BACKGROUND_COLOR_INDEX..=CGB_OBJECT_PRIORITY_MODE => {
                let shift = self.speed_shift();
                self.ppu
                    .write_vram(address, value, &mut self.scheduler, &mut self.interrupts, shift)
            }
            CGB_WRAM_BANK if self.emulation_mode.is_cgb() => self.wram.write_bank_select(value),
            // Dropped silently outside of CGB mode.
            CGB_PREPARE_SWITCH | CGB_HDMA_1..=CGB_HDMA_5 | CGB_WRAM_BANK => {}
            _ => self.io_registers.write_byte(address, value),
        }
    }

    /// Ticks the scheduler in 4 cycle steps, executing any events that come
    /// up and clocking the timers. Returns true if a V-Blank happened.
    fn tick_scheduler(&mut self, mut cycles: u64) -> bool {
        let mut vblank_occurred = false;

        while cycles >= 4 {
            self.scheduler.add_cycles(4);
            vblank_occurred |= self.handle_pending_events();

            if let Some(interrupt) = self.timers.tick_timers() {
                self.interrupts.insert_interrupt(interrupt);
            }

            cycles -= 4;
        }

        vblank_occurred
    }

    fn handle_pending_events(&mut self) -> bool {
        let mut vblank_occurred = false;
        let shift = self.speed_shift();

        while let Some(event) = self.scheduler.pop_closest() {
            match event.event_type {
                EventType::NONE => {}
                EventType::OamSearch => {
                    self.ppu.oam_search(&mut self.interrupts);
                    self.scheduler
                        .push_full_event(event.update_self(EventType::LcdTransfer, OAM_SEARCH_DURATION << shift));
                }
                EventType::LcdTransfer => {
                    self.ppu.lcd_transfer(event.timestamp, &mut self.interrupts);
                    let duration = self.ppu.get_lcd_transfer_duration();
                    self.scheduler
                        .push_full_event(event.update_self(EventType::Hblank, duration << shift));
                }
                EventType::Hblank => {
                    self.ppu.hblank(&mut self.interrupts);
                    self.hblank_hdma_step();

                    let duration = self.ppu.get_hblank_duration();
                    // Line 143 is the last one to render, V-Blank is next.
                    let next_event = if self.ppu.current_y() == 143 {
                        EventType::Vblank
                    } else {
                        EventType::OamSearch
                    };
                    self.scheduler
                        .push_full_event(event.update_self(next_event, duration << shift));
                }
                EventType::Vblank => {
                    self.ppu.vblank(&mut self.interrupts);
                    vblank_occurred = true;
                    self.scheduler
                        .push_full_event(event.update_self(EventType::VblankWait, SCANLINE_DURATION << shift));
                }
                EventType::VblankWait => {
                    if self.ppu.current_y() == 0 {
                        // The early LY reset already happened; this marks the
                        // start of the next frame's line 0.
                        self.scheduler.push_full_event(event.update_self(EventType::OamSearch, 0));
                    } else {
                        self.ppu.vblank_wait(&mut self.interrupts);
                        if self.ppu.current_y() == 153 {
                            self.scheduler
                                .push_event(EventType::Line153Reset, event.timestamp + (LINE_153_RESET_DELAY << shift));
                        }
                        self.scheduler
                            .push_full_event(event.update_self(EventType::VblankWait, SCANLINE_DURATION << shift));
                    }
                }
                EventType::Line153Reset => self.ppu.line_153_reset(&mut self.interrupts),
                EventType::DmaRequested => {
                    let address = (self.io_registers.read_byte(DMA_TRANSFER) as usize) << 8;
                    let oam_data = self.gather_shadow_oam(address);
                    self.ppu.oam_dma_transfer(&oam_data, &mut self.scheduler);
                }
                EventType::DmaTransferComplete => self.ppu.oam_dma_finished(),
                EventType::SerialTransferComplete => {
                    let interrupt = self.serial.transfer_complete();
                    self.interrupts.insert_interrupt(interrupt);
                }
            };
        }
        vblank_occurred
    }

    /// Simply returns 0xFF while also logging the access.
    fn non_usable_call(&self, address: u16) -> u8 {
        trace!("ROM accessed non-usable memory: {:4X}", address);
        INVALID_READ
    }

    #[inline]
    pub fn speed_shift(&self) -> u64 {
        self.cgb_data.double_speed as u64
    }

    pub(crate) fn cgb_snapshot(&self) -> crate::state::CgbState {
        crate::state::CgbState {
            double_speed: self.cgb_data.double_speed,
            prepare_speed_switch: self.cgb_data.prepare_speed_switch,
            hdma_source: self.hdma.source_address,
            hdma_destination: self.hdma.destination_address,
            hdma_size: self.hdma.transfer_size,
            hdma_ongoing: self.hdma.transfer_ongoing,
            hdma_hblank_mode: self.hdma.current_mode == HdmaMode::Hdma,
            wram_bank: self.wram.read_bank_select() & 0x7,
        }
    }

    pub(crate) fn restore_cgb(&mut self, state: &crate::state::CgbState) {
        self.cgb_data.double_speed = state.double_speed;
        self.cgb_data.prepare_speed_switch = state.prepare_speed_switch;
        self.hdma.source_address = state.hdma_source;
        self.hdma.destination_address = state.hdma_destination;
        self.hdma.transfer_size = state.hdma_size;
        self.hdma.transfer_ongoing = state.hdma_ongoing;
        self.hdma.current_mode = if state.hdma_hblank_mode {
            HdmaMode::Hdma
        } else {
            HdmaMode::Gdma
        };
        self.dma_stall_cycles = 0;
    }

    /// The emulated clock rate, used to anchor the RTC to seconds.
    fn cycles_per_second(&self) -> u64 {
        DMG_CLOCK_SPEED << self.speed_shift()
    }
}

impl MemoryMapper for Memory {
    fn read_byte(&mut self, address: u16) -> u8 {
        Memory::read_byte(self, address)
    }

    fn write_byte(&mut self, address: u16, value: u8) {
        Memory::write_byte(self, address, value)
    }

    fn boot_rom_finished(&self) -> bool {
        self.boot_rom.is_finished
    }

    fn get_mode(&self) -> EmulatorMode {
        self.emulation_mode
    }

    fn cartridge(&self) -> Option<&Cartridge> {
        Some(&self.cartridge)
    }

    fn interrupts(&self) -> &Interrupts {
        &self.interrupts
    }

    fn interrupts_mut(&mut self) -> &mut Interrupts {
        &mut self.interrupts
    }

    fn advance_cycles(&mut self, cycles: u64) -> bool {
        self.tick_scheduler(cycles)
    }

    fn fast_forward(&mut self, limit: u64) -> bool {
        let mut target = self.scheduler.next_event_timestamp().min(limit);
        if let Some(timer_cycles) = self.timers.cycles_until_interrupt() {
            target = target.min(self.scheduler.current_time + timer_cycles);
        }

        let delta = target.saturating_sub(self.scheduler.current_time).max(4);
        self.tick_scheduler((delta + 3) & !3)
    }

    fn take_dma_stall(&mut self) -> u64 {
        std::mem::replace(&mut self.dma_stall_cycles, 0)
    }

    fn try_speed_switch(&mut self) -> bool {
        if self.emulation_mode.is_cgb_hardware() && self.cgb_data.should_prepare() {
            self.cgb_data.toggle_speed();
            // The divider restarts on a speed switch.
            self.timers.set_divider();
            info!(
                "Speed switch performed, double speed now: {}",
                self.cgb_data.double_speed
            );
            true
        } else {
            false
        }
    }
}

impl Debug for Memory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Memory {{ mode: {:?}, cartridge: {:?}, time: {} }}",
            self.emulation_mode, self.cartridge, self.scheduler.current_time
        )
    }
}
