//! Serial transfer (link cable) port. No peer is ever attached, so an
//! internally clocked transfer shifts in all ones; externally clocked
//! transfers never complete.

use crate::emulator::EmulatorMode;
use crate::io::interrupts::InterruptFlags;
use crate::scheduler::{EventType, Scheduler};

pub const SIO_DATA: u16 = 0xFF01;
pub const SIO_CONT: u16 = 0xFF02;

/// Cycles per shifted bit when using the internal 8192 Hz clock.
const BIT_CYCLES: u64 = 512;
/// Cycles per shifted bit with the CGB fast clock (262144 Hz).
const BIT_CYCLES_FAST: u64 = 16;

#[derive(Debug, Default)]
pub struct SerialPort {
    pub data: u8,
    control: u8,
    transfer_in_progress: bool,
}

impl SerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_data(&self) -> u8 {
        self.data
    }

    pub fn read_control(&self, mode: EmulatorMode) -> u8 {
        let open_bus = if mode.is_cgb() { 0x7C } else { 0x7E };
        self.control | open_bus
    }

    pub fn write_data(&mut self, value: u8) {
        self.data = value;
    }

    /// A write with both the start bit (7) and the internal-clock bit (0) set
    /// begins an 8-bit shift; with an external clock nothing will ever drive
    /// the line, so the transfer stays pending forever.
    pub fn write_control(&mut self, value: u8, mode: EmulatorMode, scheduler: &mut Scheduler) {
        self.control = value & 0x83;

        let start_requested = value & 0x80 != 0;
        let internal_clock = value & 0x01 != 0;

        if self.transfer_in_progress {
            scheduler.remove_event_type(EventType::SerialTransferComplete);
            self.transfer_in_progress = false;
        }

        if start_requested && internal_clock {
            let bit_cycles = if mode.is_cgb() && value & 0x02 != 0 {
                BIT_CYCLES_FAST
            } else {
                BIT_CYCLES
            };
            self.transfer_in_progress = true;
            scheduler.push_relative(EventType::SerialTransferComplete, 8 * bit_cycles);
        }
    }

    /// Finish the in-flight transfer: the absent peer supplied 0xFF, the
    /// start bit clears and a serial interrupt is requested.
    pub fn transfer_complete(&mut self) -> InterruptFlags {
        self.data = 0xFF;
        self.control &= 0x7F;
        self.transfer_in_progress = false;
        log::trace!("Serial transfer completed");
        InterruptFlags::SERIAL
    }

    pub fn transfer_in_progress(&self) -> bool {
        self.transfer_in_progress
    }

    pub(crate) fn snapshot(&self) -> crate::state::SerialState {
        crate::state::SerialState {
            data: self.data,
            control: self.control,
            transfer_in_progress: self.transfer_in_progress,
        }
    }

    pub(crate) fn restore(state: &crate::state::SerialState) -> Self {
        SerialPort {
            data: state.data,
            control: state.control,
            transfer_in_progress: state.transfer_in_progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_clock_schedules_transfer() {
        let mut serial = SerialPort::new();
        let mut scheduler = Scheduler::new();

        serial.write_data(0x42);
        serial.write_control(0x81, EmulatorMode::DMG, &mut scheduler);

        assert!(serial.transfer_in_progress());
        assert_eq!(scheduler.next_event_timestamp(), 8 * 512);

        scheduler.add_cycles(8 * 512);
        assert_eq!(scheduler.pop_closest().unwrap().event_type, EventType::SerialTransferComplete);

        let interrupt = serial.transfer_complete();
        assert_eq!(interrupt, InterruptFlags::SERIAL);
        assert_eq!(serial.read_data(), 0xFF);
        assert_eq!(serial.read_control(EmulatorMode::DMG), 0x7F);
    }

    #[test]
    fn test_external_clock_stays_idle() {
        let mut serial = SerialPort::new();
        let mut scheduler = Scheduler::new();

        serial.write_control(0x80, EmulatorMode::DMG, &mut scheduler);

        assert!(!serial.transfer_in_progress());
        assert_eq!(scheduler.next_event_timestamp(), u64::MAX);
    }

    #[test]
    fn test_cgb_fast_clock() {
        let mut serial = SerialPort::new();
        let mut scheduler = Scheduler::new();

        serial.write_control(0x83, EmulatorMode::CGB, &mut scheduler);

        assert_eq!(scheduler.next_event_timestamp(), 8 * 16);
    }
}
