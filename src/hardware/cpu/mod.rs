//! The CPU is the main executor of any ROM's code, and will also keep
//! track of the cycles the CPU has performed so far.
//!
//! Timing follows a simple contract: an opcode handler mutates state and
//! memory without advancing time, then the full cost of the opcode (from the
//! tables in `instructions`) is pushed through the peripherals in one go.

use log::*;

use crate::hardware::cpu::alu::ShiftKind;
use crate::hardware::cpu::execute::JumpModifier;
use crate::hardware::cpu::instructions::*;
use crate::hardware::cpu::registers::Reg8::A;
use crate::hardware::cpu::registers::{Reg16, Registers};
use crate::hardware::cpu::traits::{SetU16, SetU8, ToU16, ToU8};
use crate::hardware::mmu::MemoryMapper;
use crate::io::interrupts::Interrupt;

#[cfg(test)]
mod tests;

mod alu;
mod execute;
mod fetch;
mod instructions;
mod registers;
mod traits;

#[derive(Debug)]
pub struct CPU<M: MemoryMapper> {
    pub cycles_performed: u64,
    pub ime: bool,
    pub halted: bool,
    pub stopped: bool,
    pub mmu: M,
    opcode: u8,
    registers: Registers,
    ime_delay: u8,
    skip_pc_increment: bool,
    pending_cycles: u64,
    had_vblank: bool,
}

impl<M: MemoryMapper> CPU<M> {
    pub fn new(mmu: M) -> Self {
        let mut result = CPU {
            cycles_performed: 0,
            ime: false,
            halted: false,
            stopped: false,
            mmu,
            opcode: 0,
            registers: Registers::new(),
            ime_delay: 0,
            skip_pc_increment: false,
            pending_cycles: 0,
            had_vblank: false,
        };

        if result.mmu.boot_rom_finished() {
            // Set the registers to the state they would have if we had run
            // the boot rom.
            result.registers.pc = 0x100;
            if result.mmu.get_mode().is_cgb_hardware() {
                result.registers.set_af(0x11B0);
                result.registers.set_bc(0x0000);
                result.registers.set_de(0xFF56);
                result.registers.set_hl(0x000D);
            } else {
                result.registers.set_af(0x01B0);
                result.registers.set_bc(0x0013);
                result.registers.set_de(0x00D8);
                result.registers.set_hl(0x014D);
            }
            result.registers.sp = 0xFFFE;
        }

        result
    }

    /// Execute a single step of the CPU: an interrupt dispatch, one
    /// instruction, or, while halted/stopped, a fast-forward to the next
    /// point of interest (bounded by `iteration_target`).
    pub fn step_cycle(&mut self, iteration_target: u64) {
        // EI enables interrupts only after the instruction following it.
        if self.ime_delay > 0 {
            self.ime_delay -= 1;
            if self.ime_delay == 0 {
                self.ime = true;
            }
        }

        if self.stopped {
            // STOP only ends on a joypad press, which the emulator facade
            // handles; until then the rest of the machine idles onwards.
            self.had_vblank |= self.mmu.fast_forward(iteration_target);
            return;
        }

        if self.halted {
            if self.mmu.interrupts().pending().is_empty() {
                self.had_vblank |= self.mmu.fast_forward(iteration_target);
                return;
            }
            self.halted = false;
        }

        if self.ime && !self.mmu.interrupts().pending().is_empty() {
            self.dispatch_interrupt();
            return;
        }

        self.opcode = self.fetch_opcode();
        self.pending_cycles = CYCLES[self.opcode as usize] as u64;

        #[cfg(feature = "cpu-logging")]
        trace!("Executing opcode: {:02X} - registers: {}", self.opcode, self.registers);

        self.execute(self.opcode);

        let cycles = self.pending_cycles + self.mmu.take_dma_stall();
        self.cycles_performed += cycles;
        self.had_vblank |= self.mmu.advance_cycles(cycles);
    }

    /// The routine to be used whenever any kind of interrupt is dispatched.
    /// Clears the relevant IF bit, resets `ime` and jumps to the vector.
    fn dispatch_interrupt(&mut self) {
        let pending = self.mmu.interrupts().pending();

        for interrupt in Interrupt::iter() {
            if !pending.contains(interrupt.flag()) {
                continue;
            }
            debug!("Dispatching interrupt: {:?}", interrupt);
            self.ime = false;
            self.halted = false;
            self.mmu.interrupts_mut().interrupt_flag.remove(interrupt.flag());

            // PC is pushed high byte first, then low.
            self.registers.sp = self.registers.sp.wrapping_sub(1);
            self.mmu.write_byte(self.registers.sp, (self.registers.pc >> 8) as u8);
            self.registers.sp = self.registers.sp.wrapping_sub(1);
            self.mmu.write_byte(self.registers.sp, self.registers.pc as u8);

            self.registers.pc = interrupt.vector();

            self.cycles_performed += INTERRUPT_DISPATCH_CYCLES;
            self.had_vblank |= self.mmu.advance_cycles(INTERRUPT_DISPATCH_CYCLES);
            return;
        }
    }

    fn nop(&mut self) {}

    /// `ld   rr,nn       x1 nn nn  12 ---- rr=nn (rr may be BC,DE,HL or SP)`
    /// OR
    /// `ld   SP,HL       F9         8 ---- SP=HL`
    fn load_16bit<T: Copy, U: Copy>(&mut self, destination: T, source: U)
    where
        Self: SetU16<T>,
        Self: ToU16<U>,
    {
        let source_value = self.read_u16_value(source);

        self.set_u16_value(destination, source_value);
    }

    /// `ld` never sets any flags.
    fn load_8bit<T: Copy, U: Copy>(&mut self, destination: T, source: U)
    where
        Self: SetU8<T>,
        Self: ToU8<U>,
    {
        let source_value = self.read_u8_value(source);

        self.set_u8_value(destination, source_value);
    }

    /// `r=r+1` OR `(HL)=(HL)+1`
    ///
    /// Flags: `z0h-`
    fn increment<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
        Self: SetU8<T>,
    {
        let old_value = self.read_u8_value(target);
        let new_value = old_value.wrapping_add(1);

        self.registers.set_zf(new_value == 0);
        self.registers.set_n(false);
        self.registers.set_h((old_value & 0xF) + 0x1 > 0xF);

        self.set_u8_value(target, new_value);
    }

    /// `rr = rr+1      ;rr may be BC,DE,HL,SP`
    ///
    /// Flags: `----`
    fn increment16(&mut self, target: Reg16) {
        let new_value = self.read_u16_value(target).wrapping_add(1);

        self.set_u16_value(target, new_value);
    }

    /// `rotate A left; 7th bit to Carry flag`
    ///
    /// Flags: `000c`
    fn rlca(&mut self) {
        self.shift_op(A, ShiftKind::RotateLeft);
        self.registers.set_zf(false);
    }

    /// `HL = HL+rr     ;rr may be BC,DE,HL,SP`
    ///
    /// Flags: `-0hc`
    fn add16(&mut self, target: Reg16) {
        let old_value = self.read_u16_value(target);
        let (result, overflowed) = self.registers.hl().overflowing_add(old_value);
        self.registers.set_n(false);
        self.registers.set_cf(overflowed);
        self.registers
            .set_h((old_value & 0x0FFF) + (self.registers.hl() & 0x0FFF) > 0x0FFF);

        self.registers.set_hl(result);
    }

    /// `r=r-1` OR `(HL)=(HL)-1`
    ///
    /// Flags: `z1h-`
    fn decrement<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
        Self: SetU8<T>,
    {
        let old_value = self.read_u8_value(target);
        let new_value = old_value.wrapping_sub(1);

        self.registers.set_zf(new_value == 0);
        self.registers.set_n(true);
        self.registers.set_h(old_value & 0xF == 0);

        self.set_u8_value(target, new_value);
    }

    /// `rr = rr-1      ;rr may be BC,DE,HL,SP`
    ///
    /// Flags: `----`
    fn decrement16(&mut self, target: Reg16) {
        let new_value = self.read_u16_value(target).wrapping_sub(1);

        self.set_u16_value(target, new_value);
    }

    /// `Rotate A right. Old bit 0 to Carry flag.`
    ///
    /// Flags: `000C`
    fn rrca(&mut self) {
        self.shift_op(A, ShiftKind::RotateRight);

        self.registers.set_zf(false);
    }

    /// Low power standby mode. On CGB hardware this doubles as the trigger
    /// for the speed switch when KEY1's prepare bit is set; otherwise the
    /// CPU freezes until the facade observes a key press.
    fn stop(&mut self) {
        // STOP is encoded as 0x10 0x00, skip the padding byte.
        self.registers.pc = self.registers.pc.wrapping_add(1);

        if !self.mmu.try_speed_switch() {
            info!("CPU entering STOP mode");
            self.stopped = true;
        }
    }

    /// Rotate A left through Carry flag.
    ///
    /// Flags: `000C`
    fn rla(&mut self) {
        self.shift_op(A, ShiftKind::RotateLeftThroughCarry);
        self.registers.set_zf(false);
    }

    /// `jr   PC+dd` OR `jr   f,PC+dd`
    ///
    /// Add n to current address and jump to it.
    /// Conditional relative jump if nz,z,nc,c.
    ///
    /// Flags: `----`
    fn relative_jump(&mut self, condition: JumpModifier) {
        let offset = self.get_instr_u8() as i8;
        if self.matches_jmp_condition(condition) {
            self.registers.pc = self.registers.pc.wrapping_add(offset as u16);
        } else {
            self.pending_cycles = self.pending_cycles.saturating_sub(JUMP_UNTAKEN_DEDUCTION);
        }
    }

    /// Rotate A right through Carry flag.
    ///
    /// Flags: `000C`
    fn rra(&mut self) {
        self.shift_op(A, ShiftKind::RotateRightThroughCarry);
        self.registers.set_zf(false);
    }

    /// Decimal adjust register A.
    /// This instruction adjusts register A so that the
    /// correct representation of Binary Coded Decimal (BCD) is obtained.
    ///
    /// Flags: `Z-0C`
    fn daa(&mut self) {
        // After an addition, adjust if (half-)carry occurred or if result is out of bounds
        if !self.registers.n() {
            if self.registers.cf() || self.registers.a > 0x99 {
                self.registers.a = self.registers.a.wrapping_add(0x60);
                self.registers.set_cf(true);
            }
            if self.registers.hf() || (self.registers.a & 0x0F) > 0x09 {
                self.registers.a = self.registers.a.wrapping_add(0x06);
            }
        } else {
            // After a subtraction, only adjust if (half-)carry occurred
            if self.registers.cf() {
                self.registers.a = self.registers.a.wrapping_sub(0x60);
            }
            if self.registers.hf() {
                self.registers.a = self.registers.a.wrapping_sub(0x06);
            }
        }

        self.registers.set_zf(self.registers.a == 0);
        self.registers.set_h(false);
    }

    /// ComPLement accumulator (A = ~A).
    ///
    /// Flags: `-11-`
    fn cpl(&mut self) {
        self.registers.a = !self.registers.a;

        self.registers.set_n(true);
        self.registers.set_h(true);
    }

    /// Set Carry Flag.
    ///
    /// Flags: `-001`
    fn scf(&mut self) {
        self.registers.set_n(false);
        self.registers.set_h(false);
        self.registers.set_cf(true);
    }

    /// Complement Carry Flag.
    ///
    /// Flags: `-00i` where `i = inverted`
    fn ccf(&mut self) {
        self.registers.set_n(false);
        self.registers.set_h(false);
        self.registers.toggle_cf();
    }

    /// `halt until interrupt occurs (low power)`
    ///
    /// When `IME` is disabled while an interrupt is already pending, HALT
    /// falls through immediately and the following opcode byte is fetched
    /// twice (the HALT bug).
    fn halt(&mut self) {
        if !self.ime && !self.mmu.interrupts().pending().is_empty() {
            self.skip_pc_increment = true;
        } else {
            self.halted = true;
        }
    }

    /// `A=A+r` OR `A=A+n` OR `A=A+(HL)`
    /// Adds the provided `target` to the `A` register, setting any relevant flags.
    ///
    /// Flags: `Z0HC`
    fn add<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
    {
        let value = self.read_u8_value(target);
        let (new_value, overflowed) = self.registers.a.overflowing_add(value);
        self.registers.set_zf(new_value == 0);
        self.registers.set_n(false);
        self.registers.set_cf(overflowed);
        // Half Carry is set if adding the lower nibbles of the value and register A
        // together results in a value bigger than 0xF.
        self.registers.set_h((self.registers.a & 0xF) + (value & 0xF) > 0xF);

        self.registers.a = new_value;
    }

    /// Add the value in `target` plus the carry flag to A.
    ///
    /// Flags: `Z0HC`
    fn adc<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
    {
        let value = self.read_u8_value(target);
        let carry_flag = self.registers.cf() as u8;
        let new_value = self.registers.a.wrapping_add(value).wrapping_add(carry_flag);
        self.registers.set_zf(new_value == 0);
        self.registers.set_n(false);
        self.registers
            .set_h((self.registers.a & 0xF) + (value & 0xF) + carry_flag > 0xF);
        self.registers
            .set_cf((self.registers.a as u16) + (value as u16) + carry_flag as u16 > 0xFF);

        self.registers.a = new_value;
    }

    /// Subtract the value in `target` from A.
    ///
    /// Flags: `Z1HC`
    fn sub<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
    {
        let value = self.read_u8_value(target);
        let new_value = self.registers.a.wrapping_sub(value);
        self.registers.set_zf(new_value == 0);
        self.registers.set_n(true);
        self.registers
            .set_h((self.registers.a & 0xF).wrapping_sub(value & 0xF) & 0x10 != 0);
        self.registers.set_cf(value > self.registers.a);

        self.registers.a = new_value;
    }

    /// Subtract the value in `target` and the carry flag from A.
    ///
    /// Flags: `Z1HC`
    fn sbc<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
    {
        let value = self.read_u8_value(target);
        let carry_flag = self.registers.cf() as u8;
        let new_value = self.registers.a.wrapping_sub(value).wrapping_sub(carry_flag);

        self.registers.set_zf(new_value == 0);
        self.registers.set_n(true);
        self.registers.set_h(
            (self.registers.a & 0xF)
                .wrapping_sub(value & 0xF)
                .wrapping_sub(carry_flag)
                & 0x10
                != 0,
        );
        self.registers
            .set_cf((value as u16 + carry_flag as u16) > self.registers.a as u16);

        self.registers.a = new_value;
    }

    /// Bitwise AND between the value in `target` and A.
    ///
    /// Flags: `Z010`
    fn and<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
    {
        self.registers.a &= self.read_u8_value(target);

        self.registers.set_zf(self.registers.a == 0);
        self.registers.set_n(false);
        self.registers.set_h(true);
        self.registers.set_cf(false);
    }

    /// Bitwise XOR between the value in `target` and A.
    ///
    /// Flags: `Z000`
    fn xor<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
    {
        self.registers.a ^= self.read_u8_value(target);

        self.registers.set_zf(self.registers.a == 0);
        self.registers.set_n(false);
        self.registers.set_h(false);
        self.registers.set_cf(false);
    }

    /// Store into A the bitwise OR of the value in `target` and A.
    ///
    /// Flags: `Z000`
    fn or<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
    {
        self.registers.a |= self.read_u8_value(target);

        self.registers.set_zf(self.registers.a == 0);
        self.registers.set_n(false);
        self.registers.set_h(false);
        self.registers.set_cf(false);
    }

    /// Subtract the value in `target` from A and set flags accordingly, but don't store the result.
    /// This is useful for ComParing values.
    ///
    /// Flags: `Z1HC`
    fn compare<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
    {
        let value = self.read_u8_value(target);
        let new_value = self.registers.a.wrapping_sub(value);
        self.registers.set_zf(new_value == 0);
        self.registers.set_n(true);
        self.registers.set_cf(value > self.registers.a);
        self.registers
            .set_h((self.registers.a & 0xF).wrapping_sub(value & 0xF) & 0x10 != 0);
    }

    /// Return from subroutine.
    /// This is basically a POP PC (if such an instruction existed).
    fn ret(&mut self, target: JumpModifier) {
        if self.matches_jmp_condition(target) {
            self.registers.pc = self.read_short(self.registers.sp);
            self.registers.sp = self.registers.sp.wrapping_add(2);
        } else {
            self.pending_cycles = self.pending_cycles.saturating_sub(RET_UNTAKEN_DEDUCTION);
        }
    }

    /// Pop register `target` from the stack.
    ///
    /// Flags: `----` (unless AF is popped)
    fn pop(&mut self, target: Reg16) {
        let sp_target = self.read_short(self.registers.sp);
        self.set_u16_value(target, sp_target);
        self.registers.sp = self.registers.sp.wrapping_add(2);
    }

    /// `jump to nn, PC=nn` OR `jump to HL, PC=HL` OR `conditional jump if nz,z,nc,c`
    /// Sets the `PC` to the relevant value based on the JumpCondition.
    fn jump(&mut self, condition: JumpModifier) {
        if let JumpModifier::HL = condition {
            self.registers.pc = self.registers.hl();
            return;
        }

        let value = self.get_instr_u16();
        if self.matches_jmp_condition(condition) {
            self.registers.pc = value;
        } else {
            self.pending_cycles = self.pending_cycles.saturating_sub(JUMP_UNTAKEN_DEDUCTION);
        }
    }

    fn matches_jmp_condition(&self, condition: JumpModifier) -> bool {
        match condition {
            JumpModifier::NotZero => !self.registers.zf(),
            JumpModifier::Zero => self.registers.zf(),
            JumpModifier::NotCarry => !self.registers.cf(),
            JumpModifier::Carry => self.registers.cf(),
            JumpModifier::Always => true,
            JumpModifier::HL => true,
        }
    }

    /// Call address n16, if condition `target` is met.
    /// This pushes the address of the instruction after the CALL on the stack,
    /// such that RET can pop it later;
    /// then, it executes an implicit JP n16.
    ///
    /// Flags: `----`
    fn call(&mut self, target: JumpModifier) {
        let address = self.get_instr_u16();
        if self.matches_jmp_condition(target) {
            self.push_helper(self.registers.pc);
            self.registers.pc = address;
        } else {
            self.pending_cycles = self.pending_cycles.saturating_sub(CALL_UNTAKEN_DEDUCTION);
        }
    }

    /// Push register `target` onto the stack.
    ///
    /// Flags: `----`
    fn push(&mut self, target: Reg16) {
        let value = self.read_u16_value(target);
        self.push_helper(value);
    }

    /// Helper function to push certain values to the stack.
    fn push_helper(&mut self, value: u16) {
        self.registers.sp = self.registers.sp.wrapping_sub(2);
        self.write_short(self.registers.sp, value);
    }

    /// Call address `vec`.
    /// This is a shorter and faster equivalent to `CALL` for suitable values of `vec`.
    ///
    /// Flags: `----`
    fn rst(&mut self, vec: u8) {
        self.push_helper(self.registers.pc);
        self.registers.pc = vec as u16;
    }

    /// There are a few instructions in the GameBoy's instruction set which are not used.
    /// Real hardware locks up on them; we log and carry on so the host loop
    /// keeps control.
    fn unknown(&mut self) {
        error!(
            "Unimplemented opcode {:02X} called at PC {:04X}",
            self.opcode,
            self.registers.pc.wrapping_sub(1)
        );
    }

    /// Return from subroutine and enable interrupts.
    /// This is basically equivalent to executing EI then RET,
    /// meaning that IME is set right after this instruction.
    ///
    /// Flags: `----`
    fn reti(&mut self) {
        self.ime = true;
        self.ime_delay = 0;
        self.registers.pc = self.read_short(self.registers.sp);
        self.registers.sp = self.registers.sp.wrapping_add(2);
    }

    /// `ADD SP,e8`
    /// Add the signed value e8 to SP.
    ///
    /// Flags: `00HC`
    fn add_sp(&mut self) {
        let value = self.get_instr_u8() as i8 as u16;
        let new_value = self.registers.sp.wrapping_add(value);

        self.registers.set_zf(false);
        self.registers.set_n(false);
        self.registers.set_h((self.registers.sp & 0xF) + (value & 0xF) > 0xF);
        self.registers.set_cf((self.registers.sp & 0xFF) + (value & 0xFF) > 0xFF);

        self.registers.sp = new_value;
    }

    /// `DI`
    /// Disable Interrupts by clearing the IME flag.
    ///
    /// Flags: `----`
    fn di(&mut self) {
        self.ime = false;
        self.ime_delay = 0;
    }

    /// `LD HL,SP+i8`
    /// Load the value of `SP + i8` into the register `HL`.
    ///
    /// Flags: `00HC`
    fn load_sp_i(&mut self) {
        let value = self.get_instr_u8() as i8 as u16;
        let new_value = self.registers.sp.wrapping_add(value);

        self.registers.set_hl(new_value);
        self.registers.set_zf(false);
        self.registers.set_n(false);
        self.registers.set_h((self.registers.sp & 0xF) + (value & 0xF) > 0xF);
        // Test if overflow on 7th bit.
        self.registers.set_cf((self.registers.sp & 0xFF) + (value & 0xFF) > 0xFF);
    }

    /// `LD SP, HL`
    /// Load the value of `HL` into `SP`
    ///
    /// Flags: `----`
    fn load_sp_hl(&mut self) {
        self.registers.sp = self.registers.hl();
    }

    /// `EI`
    /// Enable Interrupts by setting the IME flag.
    /// The flag is only set after the instruction following EI.
    fn ei(&mut self) {
        if !self.ime && self.ime_delay == 0 {
            self.ime_delay = 2;
        }
    }

    /*
       Prefixed Instructions
    */

    /// `RLC r8/[HL]`
    /// Rotate register `target` left.
    ///
    /// C <- [7 <- 0] <- [7]
    ///
    /// Flags: `Z00C`
    fn rlc<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
        Self: SetU8<T>,
    {
        self.shift_op(target, ShiftKind::RotateLeft);
    }

    /// `RRC r8/[HL]`
    /// Rotate register r8 right.
    ///
    /// [0] -> [7 -> 0] -> C
    ///
    /// Flags: `Z00C`
    fn rrc<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
        Self: SetU8<T>,
    {
        self.shift_op(target, ShiftKind::RotateRight);
    }

    /// `RL r8/[HL]`
    /// Rotate bits in register `target` left through carry.
    ///
    /// C <- [7 <- 0] <- C
    ///
    /// Flags: `Z00C`
    fn rl<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
        Self: SetU8<T>,
    {
        self.shift_op(target, ShiftKind::RotateLeftThroughCarry);
    }

    /// `RR r8/[HL]`
    /// Rotate register `target` right through carry.
    ///
    /// C -> [7 -> 0] -> C
    ///
    /// Flags: `Z00C`
    fn rr<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
        Self: SetU8<T>,
    {
        self.shift_op(target, ShiftKind::RotateRightThroughCarry);
    }

    /// `SLA r8/[HL]`
    /// Shift Left Arithmetic on register `target`.
    ///
    /// C <- [7 <- 0] <- 0
    ///
    /// Flags: `Z00C`
    fn sla<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
        Self: SetU8<T>,
    {
        self.shift_op(target, ShiftKind::ShiftLeftArithmetic);
    }

    /// `SRA r8/[HL]`
    /// Shift Right Arithmetic register `target`.
    ///
    /// [7] -> [7 -> 0] -> C
    ///
    /// Flags: `Z00C`
    fn sra<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
        Self: SetU8<T>,
    {
        self.shift_op(target, ShiftKind::ShiftRightArithmetic);
    }

    /// `SWAP r8/[HL]`
    /// Swap upper 4 bits in register `target` and the lower 4 ones.
    ///
    /// Flags: `Z000`
    fn swap<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
        Self: SetU8<T>,
    {
        let value = self.read_u8_value(target);
        let new_value = ((value & 0x0F) << 4) | ((value & 0xF0) >> 4);

        self.registers.set_zf(new_value == 0);
        self.registers.set_n(false);
        self.registers.set_h(false);
        self.registers.set_cf(false);

        self.set_u8_value(target, new_value);
    }

    /// `SRL r8/[HL]`
    /// Shift Right Logic register `target`.
    ///
    /// 0 -> [7 -> 0] -> C
    ///
    /// Flags: `Z00C`
    fn srl<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T>,
        Self: SetU8<T>,
    {
        self.shift_op(target, ShiftKind::ShiftRightLogical);
    }

    /// `BIT u3,r8/[HL]`
    /// Test bit u3 in register `target`, set the zero flag if bit not set.
    ///
    /// Flags: `Z01-`
    fn bit<T: Copy>(&mut self, bit: u8, target: T)
    where
        Self: ToU8<T>,
    {
        let value = self.read_u8_value(target);
        let bitmask = 1 << bit;

        self.registers.set_zf((value & bitmask) == 0);
        self.registers.set_n(false);
        self.registers.set_h(true)
    }

    /// `SET u3,r8/[HL]`
    /// Set bit u3 in register r8 to 1.
    /// Bit 0 is the rightmost one, bit 7 the leftmost one.
    ///
    /// Flags: `----`
    fn set<T: Copy>(&mut self, bit: u8, target: T)
    where
        Self: ToU8<T>,
        Self: SetU8<T>,
    {
        let value = self.read_u8_value(target);
        let bitmask: u8 = 1 << bit;

        self.set_u8_value(target, value | bitmask);
    }

    /// `RES u3,r8/[HL]`
    /// Set bit u3 in register r8 to 0.
    /// Bit 0 is the rightmost one, bit 7 the leftmost one.
    ///
    /// Flags: `----`
    fn res<T: Copy>(&mut self, bit: u8, target: T)
    where
        Self: ToU8<T>,
        Self: SetU8<T>,
    {
        let value = self.read_u8_value(target);
        let bit_mask: u8 = 0x1 << bit;

        self.set_u8_value(target, value & !bit_mask);
    }
}
