//! Purely here to provide an extra implementation block so that the main mod.rs doesn't get
//! too cluttered.

use crate::hardware::cpu::instructions::CYCLES_PREFIXED;
use crate::hardware::cpu::CPU;
use crate::hardware::mmu::MemoryMapper;

impl<M: MemoryMapper> CPU<M> {
    /// Retrieve the opcode at `PC` and advance it.
    ///
    /// When the HALT bug was triggered by the previous instruction the
    /// increment is swallowed once, duplicating the fetched byte.
    pub(super) fn fetch_opcode(&mut self) -> u8 {
        let opcode = self.mmu.read_byte(self.registers.pc);
        if self.skip_pc_increment {
            self.skip_pc_increment = false;
        } else {
            self.registers.pc = self.registers.pc.wrapping_add(1);
        }
        opcode
    }

    /// Read the next opcode, advance the PC, and call the execute function for
    /// a prefix opcode.
    pub(super) fn cb_prefix_call(&mut self) {
        self.opcode = self.get_instr_u8();
        self.pending_cycles += CYCLES_PREFIXED[self.opcode as usize] as u64;
        self.execute_prefix(self.opcode);
    }

    /// Based on the current `PC` will interpret the value at the location in memory as a `u8`
    /// value.
    ///
    /// Advances the `PC` by 1.
    pub(super) fn get_instr_u8(&mut self) -> u8 {
        let result = self.read_byte(self.registers.pc);
        self.registers.pc = self.registers.pc.wrapping_add(1);

        result
    }

    /// Based on the current `PC` will interpret the `current` and `current + 1` byte at those locations
    /// in memory as a `u16` value resolved as little endian (least significant byte first).
    ///
    /// Advances the `PC` by 2.
    pub(super) fn get_instr_u16(&mut self) -> u16 {
        let least_s_byte = self.get_instr_u8() as u16;
        let most_s_byte = self.get_instr_u8() as u16;

        (most_s_byte << 8) | least_s_byte
    }

    /// Read a byte through the `MMU`. Timing is settled wholesale after the
    /// opcode body finishes, so this has no cycle side effects.
    pub(super) fn read_byte(&mut self, address: u16) -> u8 {
        self.mmu.read_byte(address)
    }

    /// Write a byte through the `MMU`.
    pub(super) fn write_byte(&mut self, address: u16, value: u8) {
        self.mmu.write_byte(address, value);
    }

    /// Read a `short` (2 bytes, little endian) through the `MMU`.
    pub(super) fn read_short(&mut self, address: u16) -> u16 {
        let least_s_byte = self.read_byte(address) as u16;
        let most_s_byte = self.read_byte(address.wrapping_add(1)) as u16;

        (most_s_byte << 8) | least_s_byte
    }

    /// Write a `short` (2 bytes, little endian) through the `MMU`.
    pub(super) fn write_short(&mut self, address: u16, value: u16) {
        self.write_byte(address, (value & 0xFF) as u8); // Least significant byte first.
        self.write_byte(address.wrapping_add(1), (value >> 8) as u8);
    }

    /// Whether a `VBlank` was reached since the last call.
    ///
    /// Resets the flag when it was set.
    pub fn added_vblank(&mut self) -> bool {
        std::mem::replace(&mut self.had_vblank, false)
    }

    pub fn registers(&self) -> &crate::hardware::cpu::registers::Registers {
        &self.registers
    }

    pub(crate) fn snapshot(&self) -> crate::state::CpuState {
        crate::state::CpuState {
            af: self.registers.af(),
            bc: self.registers.bc(),
            de: self.registers.de(),
            hl: self.registers.hl(),
            sp: self.registers.sp,
            pc: self.registers.pc,
            ime: self.ime,
            ime_delay: self.ime_delay,
            halted: self.halted,
            stopped: self.stopped,
            cycles_performed: self.cycles_performed,
        }
    }

    pub(crate) fn restore(&mut self, state: &crate::state::CpuState) {
        self.registers.set_af(state.af);
        self.registers.set_bc(state.bc);
        self.registers.set_de(state.de);
        self.registers.set_hl(state.hl);
        self.registers.sp = state.sp;
        self.registers.pc = state.pc;
        self.ime = state.ime;
        self.ime_delay = state.ime_delay;
        self.halted = state.halted;
        self.stopped = state.stopped;
        self.cycles_performed = state.cycles_performed;
        self.skip_pc_increment = false;
        self.pending_cycles = 0;
        self.had_vblank = false;
    }
}
