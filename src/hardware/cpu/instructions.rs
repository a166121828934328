//! The fixed cycle cost tables for the instruction set.
//!
//! Costs are in T-cycles and assume conditional branches are taken; the
//! handlers for conditional instructions deduct the difference themselves
//! when the condition fails.

/// Cycle costs for the unprefixed opcode table.
#[rustfmt::skip]
pub const CYCLES: [u8; 256] = [
//  x0  x1  x2  x3  x4  x5  x6  x7  x8  x9  xA  xB  xC  xD  xE  xF
     4, 12,  8,  8,  4,  4,  8,  4, 20,  8,  8,  8,  4,  4,  8,  4, // 0x
     4, 12,  8,  8,  4,  4,  8,  4, 12,  8,  8,  8,  4,  4,  8,  4, // 1x
    12, 12,  8,  8,  4,  4,  8,  4, 12,  8,  8,  8,  4,  4,  8,  4, // 2x
    12, 12,  8,  8, 12, 12, 12,  4, 12,  8,  8,  8,  4,  4,  8,  4, // 3x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 4x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 5x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 6x
     8,  8,  8,  8,  8,  8,  4,  8,  4,  4,  4,  4,  4,  4,  8,  4, // 7x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 8x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 9x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // Ax
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // Bx
    20, 12, 16, 16, 24, 16,  8, 16, 20, 16, 16,  4, 24, 24,  8, 16, // Cx
    20, 12, 16,  4, 24, 16,  8, 16, 20, 16, 16,  4, 24,  4,  8, 16, // Dx
    12, 12,  8,  4,  4, 16,  8, 16, 16,  4, 16,  4,  4,  4,  8, 16, // Ex
    12, 12,  8,  4,  4, 16,  8, 16, 12,  8, 16,  4,  4,  4,  8, 16, // Fx
];

/// Cycle costs for the 0xCB-prefixed table. The 4 cycles for fetching the
/// prefix byte itself sit in `CYCLES[0xCB]`, so these are the remainders
/// (registers: 8 total, `(HL)` read-modify-write: 16 total, `BIT (HL)`: 12).
#[rustfmt::skip]
pub const CYCLES_PREFIXED: [u8; 256] = [
//  x0  x1  x2  x3  x4  x5  x6  x7  x8  x9  xA  xB  xC  xD  xE  xF
     4,  4,  4,  4,  4,  4, 12,  4,  4,  4,  4,  4,  4,  4, 12,  4, // 0x
     4,  4,  4,  4,  4,  4, 12,  4,  4,  4,  4,  4,  4,  4, 12,  4, // 1x
     4,  4,  4,  4,  4,  4, 12,  4,  4,  4,  4,  4,  4,  4, 12,  4, // 2x
     4,  4,  4,  4,  4,  4, 12,  4,  4,  4,  4,  4,  4,  4, 12,  4, // 3x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 4x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 5x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 6x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 7x
     4,  4,  4,  4,  4,  4, 12,  4,  4,  4,  4,  4,  4,  4, 12,  4, // 8x
     4,  4,  4,  4,  4,  4, 12,  4,  4,  4,  4,  4,  4,  4, 12,  4, // 9x
     4,  4,  4,  4,  4,  4, 12,  4,  4,  4,  4,  4,  4,  4, 12,  4, // Ax
     4,  4,  4,  4,  4,  4, 12,  4,  4,  4,  4,  4,  4,  4, 12,  4, // Bx
     4,  4,  4,  4,  4,  4, 12,  4,  4,  4,  4,  4,  4,  4, 12,  4, // Cx
     4,  4,  4,  4,  4,  4, 12,  4,  4,  4,  4,  4,  4,  4, 12,  4, // Dx
     4,  4,  4,  4,  4,  4, 12,  4,  4,  4,  4,  4,  4,  4, 12,  4, // Ex
     4,  4,  4,  4,  4,  4, 12,  4,  4,  4,  4,  4,  4,  4, 12,  4, // Fx
];

/// Cycles a conditional relative/absolute jump saves when not taken.
pub const JUMP_UNTAKEN_DEDUCTION: u64 = 4;
/// Cycles a conditional call saves when not taken.
pub const CALL_UNTAKEN_DEDUCTION: u64 = 12;
/// Cycles a conditional return saves when not taken.
pub const RET_UNTAKEN_DEDUCTION: u64 = 12;
/// The cost of an interrupt dispatch.
pub const INTERRUPT_DISPATCH_CYCLES: u64 = 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_costs() {
        assert_eq!(CYCLES[0x00], 4); // NOP
        assert_eq!(CYCLES[0x08], 20); // LD (a16),SP
        assert_eq!(CYCLES[0x36], 12); // LD (HL),d8
        assert_eq!(CYCLES[0x76], 4); // HALT
        assert_eq!(CYCLES[0xC4], 24); // CALL NZ, taken
        assert_eq!(CYCLES[0xE9], 4); // JP (HL)

        // Totals including the prefix fetch: BIT 0,(HL) is 12, RES 0,(HL) is 16.
        assert_eq!(CYCLES[0xCB] + CYCLES_PREFIXED[0x46], 12);
        assert_eq!(CYCLES[0xCB] + CYCLES_PREFIXED[0x86], 16);
    }

    #[test]
    fn test_memory_column_is_slower() {
        for row in 0x40..0x70u16 {
            if row % 8 == 6 {
                assert_eq!(CYCLES[row as usize], 8, "LD r,(HL) at {:#04X}", row);
            }
        }
    }
}
