//! Checks that full instruction steps cost exactly what the cycle tables
//! promise, including the conditional deductions and that every consumed
//! cycle also reached the peripherals.

use crate::hardware::cpu::tests::{initial_cpu, set_short, step, TestMemory};
use crate::hardware::cpu::CPU;
use crate::hardware::mmu::MemoryMapper;

fn run_program(program: &[u8]) -> CPU<TestMemory> {
    let mut cpu = initial_cpu();
    for (i, byte) in program.iter().enumerate() {
        cpu.mmu.write_byte(i as u16, *byte);
    }
    step(&mut cpu);
    cpu
}

#[test]
fn test_simple_costs() {
    assert_eq!(run_program(&[0x00]).cycles_performed, 4); // NOP
    assert_eq!(run_program(&[0x01, 0x34, 0x12]).cycles_performed, 12); // LD BC, d16
    assert_eq!(run_program(&[0x34]).cycles_performed, 12); // INC (HL)
    assert_eq!(run_program(&[0xC5]).cycles_performed, 16); // PUSH BC
    assert_eq!(run_program(&[0xE8, 0x05]).cycles_performed, 16); // ADD SP, r8
}

#[test]
fn test_prefixed_costs() {
    assert_eq!(run_program(&[0xCB, 0x00]).cycles_performed, 8); // RLC B
    assert_eq!(run_program(&[0xCB, 0x46]).cycles_performed, 12); // BIT 0, (HL)
    assert_eq!(run_program(&[0xCB, 0x86]).cycles_performed, 16); // RES 0, (HL)
}

#[test]
fn test_conditional_jump_costs() {
    // JR NZ taken (Z starts cleared).
    assert_eq!(run_program(&[0x20, 0x05]).cycles_performed, 12);

    // JR NZ untaken.
    let mut cpu = initial_cpu();
    cpu.registers.set_zf(true);
    cpu.mmu.write_byte(0, 0x20);
    step(&mut cpu);
    assert_eq!(cpu.cycles_performed, 8);

    // CALL NZ taken vs untaken.
    assert_eq!(run_program(&[0xC4, 0x00, 0x20]).cycles_performed, 24);
    let mut cpu = initial_cpu();
    cpu.registers.set_zf(true);
    cpu.mmu.write_byte(0, 0xC4);
    step(&mut cpu);
    assert_eq!(cpu.cycles_performed, 12);

    // RET NZ taken vs untaken.
    let mut cpu = initial_cpu();
    cpu.registers.sp = 0xFFF0;
    set_short(&mut cpu, 0xFFF0, 0x1234);
    cpu.mmu.write_byte(0, 0xC0);
    step(&mut cpu);
    assert_eq!(cpu.cycles_performed, 20);

    let mut cpu = initial_cpu();
    cpu.registers.set_zf(true);
    cpu.mmu.write_byte(0, 0xC0);
    step(&mut cpu);
    assert_eq!(cpu.cycles_performed, 8);
}

#[test]
fn test_peripherals_see_every_cycle() {
    let mut cpu = initial_cpu();
    // A few instructions of different shapes.
    for (i, byte) in [0x00u8, 0x3C, 0x01, 0x34, 0x12, 0xCB, 0x11].iter().enumerate() {
        cpu.mmu.write_byte(i as u16, *byte);
    }

    for _ in 0..4 {
        step(&mut cpu);
    }

    assert_eq!(cpu.cycles_performed, cpu.mmu.ticks_advanced);
    assert_eq!(cpu.cycles_performed, 4 + 4 + 12 + 8);
}
