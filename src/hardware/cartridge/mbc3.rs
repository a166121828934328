//! The MBC3 banking state and its real time clock.

use crate::state::RtcState;

/// RTC register selectors written to 0x4000-0x5FFF.
pub const RTC_SECONDS: u8 = 0x08;
pub const RTC_MINUTES: u8 = 0x09;
pub const RTC_HOURS: u8 = 0x0A;
pub const RTC_DAYS_LOW: u8 = 0x0B;
pub const RTC_DAYS_HIGH: u8 = 0x0C;

#[derive(Debug)]
pub struct Mbc3State {
    pub ram_enabled: bool,
    pub rom_bank: u8,
    /// 0x00..=0x03 selects a RAM bank, 0x08..=0x0C an RTC register.
    pub ram_bank: u8,
    pub rtc: Option<Rtc>,
}

impl Mbc3State {
    pub fn new(has_rtc: bool) -> Self {
        Mbc3State {
            ram_enabled: false,
            rom_bank: 1,
            ram_bank: 0,
            rtc: if has_rtc { Some(Rtc::default()) } else { None },
        }
    }

    /// ROM bank select, 7 bits with the usual zero-coercion.
    pub fn set_rom_bank(&mut self, value: u8) {
        self.rom_bank = value & 0x7F;
        if self.rom_bank == 0 {
            self.rom_bank = 1;
        }
    }
}

/// The battery backed clock on MBC3 cartridges.
///
/// The live clock advances with emulated time (4194304 cycles to the second);
/// catching up to the host's wall clock after the emulator was shut down is
/// the host's job through the persisted `last_time` field.
#[derive(Debug, Default)]
pub struct Rtc {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub days_low: u8,
    /// Bit 0 is day bit 8, bit 6 halts the clock, bit 7 is the day carry.
    pub days_high: u8,
    latched: [u8; 5],
    latch_primed: bool,
    cycle_accumulator: u64,
    last_sync_time: u64,
    pub last_time: u64,
}

impl Rtc {
    pub fn halted(&self) -> bool {
        self.days_high & 0x40 != 0
    }

    /// Bring the live clock up to `current_time` on the shared cycle counter.
    pub fn synchronise(&mut self, current_time: u64, cycles_per_second: u64) {
        let delta = current_time.saturating_sub(self.last_sync_time);
        self.last_sync_time = current_time;

        if self.halted() {
            return;
        }

        self.cycle_accumulator += delta;
        let seconds = self.cycle_accumulator / cycles_per_second;
        self.cycle_accumulator %= cycles_per_second;
        self.advance_seconds(seconds);
    }

    /// A 0 -> 1 write sequence on 0x6000-0x7FFF copies the live clock into
    /// the latched registers.
    pub fn write_latch(&mut self, value: u8, current_time: u64, cycles_per_second: u64) {
        if self.latch_primed && value == 0x01 {
            self.synchronise(current_time, cycles_per_second);
            self.latched = [self.seconds, self.minutes, self.hours, self.days_low, self.days_high];
            log::trace!("RTC latched: {:?}", self.latched);
        }
        self.latch_primed = value == 0x00;
    }

    pub fn read_register(&self, selector: u8) -> u8 {
        match selector {
            RTC_SECONDS => self.latched[0],
            RTC_MINUTES => self.latched[1],
            RTC_HOURS => self.latched[2],
            RTC_DAYS_LOW => self.latched[3],
            RTC_DAYS_HIGH => self.latched[4],
            _ => crate::hardware::mmu::INVALID_READ,
        }
    }

    pub fn write_register(&mut self, selector: u8, value: u8, current_time: u64, cycles_per_second: u64) {
        self.synchronise(current_time, cycles_per_second);
        match selector {
            RTC_SECONDS => {
                self.seconds = value & 0x3F;
                // Writing the seconds register also resets the sub-second counter.
                self.cycle_accumulator = 0;
            }
            RTC_MINUTES => self.minutes = value & 0x3F,
            RTC_HOURS => self.hours = value & 0x1F,
            RTC_DAYS_LOW => self.days_low = value,
            RTC_DAYS_HIGH => self.days_high = value & 0xC1,
            _ => {}
        }
    }

    fn advance_seconds(&mut self, seconds: u64) {
        for _ in 0..seconds {
            self.seconds = (self.seconds + 1) & 0x3F;
            if self.seconds != 60 {
                continue;
            }
            self.seconds = 0;
            self.minutes = (self.minutes + 1) & 0x3F;
            if self.minutes != 60 {
                continue;
            }
            self.minutes = 0;
            self.hours = (self.hours + 1) & 0x1F;
            if self.hours != 24 {
                continue;
            }
            self.hours = 0;
            let days = (((self.days_high as u16 & 0x1) << 8) | self.days_low as u16) + 1;
            self.days_low = days as u8;
            self.days_high = (self.days_high & 0xFE) | ((days >> 8) as u8 & 0x1);
            if days > 0x1FF {
                // Day counter overflow sets the carry, which sticks until written.
                self.days_high |= 0x80;
                self.days_low = 0;
            }
        }
    }

    pub fn snapshot(&self) -> RtcState {
        RtcState {
            seconds: self.seconds,
            minutes: self.minutes,
            hours: self.hours,
            days_low: self.days_low,
            days_high: self.days_high,
            latched_seconds: self.latched[0],
            latched_minutes: self.latched[1],
            latched_hours: self.latched[2],
            latched_days_low: self.latched[3],
            latched_days_high: self.latched[4],
            last_time: self.last_time,
        }
    }

    /// Pin the clock's cycle anchor to `current_time`, dropping any
    /// fractional second. Required after a state load, where the shared
    /// cycle counter is not the one this clock was built against.
    pub(crate) fn reanchor(&mut self, current_time: u64) {
        self.last_sync_time = current_time;
        self.cycle_accumulator = 0;
    }

    pub fn restore(state: &RtcState) -> Self {
        Rtc {
            seconds: state.seconds,
            minutes: state.minutes,
            hours: state.hours,
            days_low: state.days_low,
            days_high: state.days_high,
            latched: [
                state.latched_seconds,
                state.latched_minutes,
                state.latched_hours,
                state.latched_days_low,
                state.latched_days_high,
            ],
            latch_primed: false,
            cycle_accumulator: 0,
            last_sync_time: 0,
            last_time: state.last_time,
        }
    }
}

/// Advance a restored clock by whole host-side seconds (wall clock catch-up).
impl Rtc {
    pub fn catch_up(&mut self, elapsed_seconds: u64) {
        if !self.halted() {
            self.advance_seconds(elapsed_seconds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::DMG_CLOCK_SPEED;

    #[test]
    fn test_second_rollover() {
        let mut rtc = Rtc::default();
        rtc.seconds = 59;
        rtc.minutes = 59;
        rtc.hours = 23;
        rtc.days_low = 0xFF;
        rtc.days_high = 0x01;

        rtc.advance_seconds(1);

        assert_eq!(rtc.seconds, 0);
        assert_eq!(rtc.minutes, 0);
        assert_eq!(rtc.hours, 0);
        assert_eq!(rtc.days_low, 0);
        // Day overflow sets the carry bit.
        assert_eq!(rtc.days_high & 0x80, 0x80);
    }

    #[test]
    fn test_latch_on_rising_write() {
        let mut rtc = Rtc::default();
        rtc.seconds = 12;

        rtc.write_latch(0x00, 0, DMG_CLOCK_SPEED);
        rtc.write_latch(0x01, 0, DMG_CLOCK_SPEED);

        assert_eq!(rtc.read_register(RTC_SECONDS), 12);

        // The live clock moving on does not disturb the latch.
        rtc.synchronise(DMG_CLOCK_SPEED * 5, DMG_CLOCK_SPEED);
        assert_eq!(rtc.seconds, 17);
        assert_eq!(rtc.read_register(RTC_SECONDS), 12);
    }

    #[test]
    fn test_halt_stops_clock() {
        let mut rtc = Rtc::default();
        rtc.days_high = 0x40;

        rtc.synchronise(DMG_CLOCK_SPEED * 10, DMG_CLOCK_SPEED);

        assert_eq!(rtc.seconds, 0);
    }

    #[test]
    fn test_emulated_second() {
        let mut rtc = Rtc::default();

        rtc.synchronise(DMG_CLOCK_SPEED, DMG_CLOCK_SPEED);
        assert_eq!(rtc.seconds, 1);

        rtc.synchronise(DMG_CLOCK_SPEED + DMG_CLOCK_SPEED / 2, DMG_CLOCK_SPEED);
        assert_eq!(rtc.seconds, 1);

        rtc.synchronise(DMG_CLOCK_SPEED * 2, DMG_CLOCK_SPEED);
        assert_eq!(rtc.seconds, 2);
    }
}
