use crate::hardware::apu::channel_features::{EnvelopeFeature, LengthFeature, SweepFeature};
use crate::hardware::apu::{no_length_tick_next_step, test_bit};
use crate::hardware::mmu::INVALID_READ;
use crate::state::SquareChannelState;

/// The two square wave voices, merged into one implementation where the
/// second voice simply never has its sweep function called.
///
/// # Properties:
/// * Sweep (only voice 1)
/// * Volume Envelope
/// * Length Counter
#[derive(Default, Debug)]
pub struct SquareWaveChannel {
    length: LengthFeature,
    envelope: EnvelopeFeature,
    sweep: SweepFeature,
    trigger: bool,
    output_volume: u8,
    frequency: u16,
    timer: u16,
    // Relevant for wave table indexing
    wave_table_index: usize,
    duty_select: usize,
}

impl SquareWaveChannel {
    const SQUARE_WAVE_TABLE: [[u8; 8]; 4] = [
        [0, 0, 0, 0, 0, 0, 0, 1], // 12.5% Duty cycle square
        [1, 0, 0, 0, 0, 0, 0, 1], // 25%
        [1, 0, 0, 0, 0, 1, 1, 1], // 50%
        [0, 1, 1, 1, 1, 1, 1, 0], // 75%
    ];

    /// Output a sample for this channel, returns `0` if the channel isn't enabled.
    pub fn output_volume(&self) -> u8 {
        self.output_volume * self.trigger as u8
    }

    pub fn triggered(&self) -> bool {
        self.trigger
    }

    pub fn tick_timer(&mut self, mut cycles: u64) {
        while cycles > 0 {
            if self.timer as u64 > cycles {
                self.timer -= cycles as u16;
                break;
            }

            cycles -= self.timer as u64;
            self.timer = (2048 - self.frequency) * 4;
            // Selects which sample we should select in our chosen duty cycle.
            self.wave_table_index = (self.wave_table_index + 1) % 8;
            self.update_output();
        }
    }

    fn update_output(&mut self) {
        self.output_volume =
            self.envelope.volume * Self::SQUARE_WAVE_TABLE[self.duty_select][self.wave_table_index];
    }

    pub fn read_register(&self, address: u16) -> u8 {
        // Expect the address to already have had an & 0xFF
        match address {
            0x10 => 0x80 | self.sweep.read_register(),
            0x11 | 0x16 => 0x3F | ((self.duty_select as u8) << 6),
            0x12 | 0x17 => self.envelope.read_register(),
            0x13 | 0x18 => INVALID_READ, // Can't read NRx3
            0x14 | 0x19 => 0xBF | if self.length.length_enable { 0x40 } else { 0x0 },
            0x15 => INVALID_READ, // The second square wave channel doesn't have a sweep feature.
            _ => unreachable!("Invalid square channel register read: 0xFF{:02X}", address),
        }
    }

    pub fn write_register(&mut self, address: u16, value: u8, next_frame_sequencer_step: u8) {
        // Expect the address to already have had an & 0xFF
        match address {
            0x10 | 0x15 => self.sweep.write_register(value, &mut self.trigger),
            0x11 | 0x16 => {
                self.duty_select = ((value & 0b1100_0000) >> 6) as usize;
                self.length.write_register(value);
            }
            0x12 | 0x17 => {
                self.envelope.write_register(value, self.trigger);
                // If the DAC is disabled by this write we disable the channel
                if !self.envelope.dac_enabled() {
                    self.trigger = false;
                }
            }
            0x13 | 0x18 => self.frequency = (self.frequency & 0x0700) | value as u16,
            0x14 | 0x19 => {
                let old_length_enable = self.length.length_enable;
                let no_l_next = no_length_tick_next_step(next_frame_sequencer_step);

                self.length.length_enable = test_bit(value, 6);
                self.frequency = (self.frequency & 0xFF) | (((value & 0x07) as u16) << 8);

                if no_l_next {
                    self.length.second_half_enable_tick(&mut self.trigger, old_length_enable);
                }

                // We specifically only trigger if the current write value is setting the trigger bit.
                if test_bit(value, 7) {
                    self.trigger(no_l_next);
                }
            }
            _ => unreachable!("Invalid square channel register write: 0xFF{:02X}", address),
        }
    }

    /// Should be called whenever the trigger bit in NRx4 is written to.
    fn trigger(&mut self, next_step_no_length: bool) {
        self.trigger = true;
        self.length.trigger(next_step_no_length);
        self.envelope.trigger();
        self.timer = (2048 - self.frequency) * 4;
        self.sweep.trigger_sweep(&mut self.trigger, self.frequency);
        self.update_output();

        // If the DAC doesn't have power the trigger is ignored.
        if !self.envelope.dac_enabled() {
            self.trigger = false;
        }
    }

    pub fn reset(&mut self, keep_length: bool) {
        *self = if keep_length {
            // A DMG power cycle of the APU leaves the length counters untouched.
            Self {
                length: LengthFeature {
                    length_enable: false,
                    ..self.length
                },
                ..Default::default()
            }
        } else {
            Self::default()
        }
    }

    pub fn tick_envelope(&mut self) {
        self.envelope.tick();
    }

    pub fn tick_length(&mut self) {
        self.length.tick(&mut self.trigger);
    }

    pub fn tick_sweep(&mut self) {
        self.sweep.tick(&mut self.trigger, &mut self.frequency);
    }

    pub(crate) fn snapshot(&self) -> SquareChannelState {
        SquareChannelState {
            length: self.length.snapshot(),
            envelope: self.envelope.snapshot(),
            sweep: self.sweep.snapshot(),
            trigger: self.trigger,
            output_volume: self.output_volume,
            frequency: self.frequency,
            timer: self.timer,
            wave_table_index: self.wave_table_index as u8,
            duty_select: self.duty_select as u8,
        }
    }

    pub(crate) fn restore(state: &SquareChannelState) -> Self {
        SquareWaveChannel {
            length: LengthFeature::restore(&state.length),
            envelope: EnvelopeFeature::restore(&state.envelope),
            sweep: SweepFeature::restore(&state.sweep),
            trigger: state.trigger,
            output_volume: state.output_volume,
            frequency: state.frequency,
            timer: state.timer,
            wave_table_index: state.wave_table_index as usize % 8,
            duty_select: state.duty_select as usize % 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triggered_channel() -> SquareWaveChannel {
        let mut channel = SquareWaveChannel::default();
        channel.write_register(0x12, 0xF0, 0);
        channel.write_register(0x13, 0x00, 0);
        channel.write_register(0x14, 0x87, 0);
        channel
    }

    #[test]
    fn test_trigger_requires_dac() {
        let mut channel = SquareWaveChannel::default();
        // All-zero NR12 means the DAC is unpowered, the trigger must not stick.
        channel.write_register(0x14, 0x80, 0);

        assert!(!channel.triggered());

        let channel = triggered_channel();
        assert!(channel.triggered());
    }

    #[test]
    fn test_duty_cycle_output() {
        let mut channel = triggered_channel();
        // Duty 2 (50%): the wave table has a high sample at index 5.
        channel.write_register(0x11, 0x80, 0);

        let period = (2048 - 0x700u64) * 4;
        for _ in 0..5 {
            channel.tick_timer(period);
        }

        assert_eq!(channel.output_volume(), 15);
    }

    #[test]
    fn test_nr12_dac_off_kills_channel() {
        let mut channel = triggered_channel();
        assert!(channel.triggered());

        channel.write_register(0x12, 0x00, 0);

        assert!(!channel.triggered());
        assert_eq!(channel.output_volume(), 0);
    }
}
