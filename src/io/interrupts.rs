use bitflags::*;

/// The five interrupt sources, ordered by priority.
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
pub enum Interrupt {
    VBLANK = 0b0000_0001,
    LcdStat = 0b0000_0010,
    TIMER = 0b0000_0100,
    SERIAL = 0b0000_1000,
    JOYPAD = 0b0001_0000,
}

impl Interrupt {
    pub fn iter() -> impl Iterator<Item = Interrupt> {
        use Interrupt::*;
        [VBLANK, LcdStat, TIMER, SERIAL, JOYPAD].iter().copied()
    }

    /// The address the CPU jumps to when dispatching this interrupt.
    pub fn vector(self) -> u16 {
        use Interrupt::*;
        match self {
            VBLANK => 0x0040,
            LcdStat => 0x0048,
            TIMER => 0x0050,
            SERIAL => 0x0058,
            JOYPAD => 0x0060,
        }
    }

    pub fn flag(self) -> InterruptFlags {
        InterruptFlags::from_bits_truncate(self as u8)
    }
}

bitflags! {
    #[derive(Default)]
    pub struct InterruptFlags: u8 {
        /// V-Blank
        const VBLANK = 0b0000_0001;
        /// LCD Stat
        const LCD    = 0b0000_0010;
        /// Timer
        const TIMER  = 0b0000_0100;
        /// Serial
        const SERIAL = 0b0000_1000;
        /// Joypad
        const JOYPAD = 0b0001_0000;
    }
}

/// The `IE` (0xFFFF) and `IF` (0xFF0F) register pair.
#[derive(Default, Debug, Clone)]
pub struct Interrupts {
    pub interrupt_enable: InterruptFlags,
    pub interrupt_flag: InterruptFlags,
}

impl Interrupts {
    #[inline]
    pub fn insert_interrupt(&mut self, interrupt: InterruptFlags) {
        self.interrupt_flag.insert(interrupt);
    }

    /// The interrupts which are both requested and enabled, the spec's `IRQLineMatched`.
    #[inline]
    pub fn pending(&self) -> InterruptFlags {
        self.interrupt_flag & self.interrupt_enable
    }

    pub fn read_if(&self) -> u8 {
        // The three upper bits of IF are wired high.
        self.interrupt_flag.bits() | 0xE0
    }

    pub fn read_ie(&self) -> u8 {
        self.interrupt_enable.bits()
    }

    pub fn overwrite_if(&mut self, value: u8) {
        self.interrupt_flag = InterruptFlags::from_bits_truncate(value);
    }

    pub fn overwrite_ie(&mut self, value: u8) {
        self.interrupt_enable = InterruptFlags::from_bits_truncate(value);
    }
}

#[cfg(test)]
mod test {
    use super::Interrupt::*;
    use super::*;

    #[test]
    fn test_interrupt_order() {
        let ordered_array = [VBLANK, LcdStat, TIMER, SERIAL, JOYPAD];
        for (i, interrupt) in Interrupt::iter().enumerate() {
            assert_eq!(ordered_array[i], interrupt)
        }
    }

    #[test]
    fn test_pending_masks_disabled() {
        let mut interrupts = Interrupts::default();
        interrupts.insert_interrupt(InterruptFlags::TIMER | InterruptFlags::SERIAL);
        interrupts.overwrite_ie(0x04);

        assert_eq!(interrupts.pending(), InterruptFlags::TIMER);
        assert_eq!(interrupts.read_if(), 0xE0 | 0x0C);
    }
}
