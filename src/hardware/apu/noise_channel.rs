use crate::hardware::apu::channel_features::{EnvelopeFeature, LengthFeature};
use crate::hardware::apu::{no_length_tick_next_step, test_bit};
use crate::hardware::mmu::INVALID_READ;
use crate::state::NoiseChannelState;

/// Voice 4, pseudo random noise from a linear feedback shift register.
///
/// # Properties:
/// * Volume Envelope
/// * Length Counter
#[derive(Debug)]
pub struct NoiseChannel {
    length: LengthFeature,
    envelope: EnvelopeFeature,
    trigger: bool,
    output_volume: u8,
    // Wider than the other channel timers: the divisor shifted by the
    // maximum clock shift exceeds 16 bits.
    timer: u32,
    // Noise feature
    width_mode: bool,
    clock_shift: u8,
    divisor_code: u8,
    // 15 bit linear feedback shift register
    lfsr: u16,
}

impl Default for NoiseChannel {
    fn default() -> Self {
        NoiseChannel {
            length: LengthFeature::default(),
            envelope: EnvelopeFeature::default(),
            trigger: false,
            output_volume: 0,
            timer: 0,
            width_mode: false,
            clock_shift: 0,
            divisor_code: 0,
            lfsr: 0x7FFF,
        }
    }
}

impl NoiseChannel {
    pub fn new() -> Self {
        Self::default()
    }

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
                self.timer -= cycles as u32;
                break;
            }

            cycles -= self.timer as u64;
            self.timer = self.reload_value();
            self.clock_lfsr();
        }
    }

    fn reload_value(&self) -> u32 {
        (self.get_divisor_from_code() as u32) << self.clock_shift
    }

    fn clock_lfsr(&mut self) {
        let bit_1_and_0_xor = (self.lfsr & 0x1) ^ ((self.lfsr & 0x2) >> 1);
        self.lfsr >>= 1;
        // The high bit (bit 14) is always set to the XOR result.
        self.lfsr |= bit_1_and_0_xor << 14;

        if self.width_mode {
            // Set bit 6 as well, resulting in a 7 bit wide LFSR.
            self.lfsr = (self.lfsr & 0xFFBF) | (bit_1_and_0_xor << 6);
        }

        // The output is the inverted bit 0, scaled by the envelope.
        self.output_volume = (((!self.lfsr) & 0x1) as u8) * self.envelope.volume;
    }

    pub fn tick_length(&mut self) {
        self.length.tick(&mut self.trigger);
    }

    pub fn tick_envelope(&mut self) {
        self.envelope.tick();
    }

    pub fn read_register(&self, address: u16) -> u8 {
        // Expect the address to already have had an & 0xFF
        // The read values are taken from gbdev
        match address {
            0x1F => INVALID_READ,
            0x20 => INVALID_READ,
            0x21 => self.envelope.read_register(),
            0x22 => (self.clock_shift << 4) | if self.width_mode { 0x8 } else { 0x0 } | self.divisor_code,
            0x23 => 0xBF | if self.length.length_enable { 0x40 } else { 0x0 },
            _ => unreachable!("Invalid noise channel register read: 0xFF{:02X}", address),
        }
    }

    pub fn write_register(&mut self, address: u16, value: u8, next_frame_sequencer_step: u8) {
        // Expect the address to already have had an & 0xFF
        match address {
            0x1F => {}
            0x20 => self.length.write_register(value),
            0x21 => {
                self.envelope.write_register(value, self.trigger);
                // If the DAC is disabled by this write we also disable the channel
                if !self.envelope.dac_enabled() {
                    self.trigger = false;
                }
            }
            0x22 => {
                self.clock_shift = value >> 4;
                self.divisor_code = value & 0x7;
                self.width_mode = test_bit(value, 3);
            }
            0x23 => {
                let old_length_enable = self.length.length_enable;
                let no_l_next = no_length_tick_next_step(next_frame_sequencer_step);

                self.length.length_enable = test_bit(value, 6);

                if no_l_next {
                    self.length.second_half_enable_tick(&mut self.trigger, old_length_enable);
                }

                if test_bit(value, 7) {
                    self.trigger(no_l_next);
                }
            }
            _ => unreachable!("Invalid noise channel register write: 0xFF{:02X}", address),
        }
    }

    /// Should be called whenever the trigger bit in NR44 is written to.
    fn trigger(&mut self, next_step_no_length: bool) {
        self.trigger = true;
        self.length.trigger(next_step_no_length);
        self.envelope.trigger();
        self.timer = self.reload_value();
        // All 15 bits start out set.
        self.lfsr = 0x7FFF;

        // If the DAC doesn't have power the trigger is ignored.
        if !self.envelope.dac_enabled() {
            self.trigger = false;
        }
    }

    pub fn reset(&mut self, keep_length: bool) {
        *self = if keep_length {
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

    fn get_divisor_from_code(&self) -> u16 {
        match self.divisor_code {
            0 => 8,
            code => (code as u16) << 4,
        }
    }

    pub(crate) fn snapshot(&self) -> NoiseChannelState {
        NoiseChannelState {
            length: self.length.snapshot(),
            envelope: self.envelope.snapshot(),
            trigger: self.trigger,
            output_volume: self.output_volume,
            timer: self.timer,
            width_mode: self.width_mode,
            clock_shift: self.clock_shift,
            divisor_code: self.divisor_code,
            lfsr: self.lfsr,
        }
    }

    pub(crate) fn restore(state: &NoiseChannelState) -> Self {
        NoiseChannel {
            length: LengthFeature::restore(&state.length),
            envelope: EnvelopeFeature::restore(&state.envelope),
            trigger: state.trigger,
            output_volume: state.output_volume,
            timer: state.timer,
            width_mode: state.width_mode,
            clock_shift: state.clock_shift,
            divisor_code: state.divisor_code,
            lfsr: state.lfsr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divisor_codes() {
        let mut channel = NoiseChannel::new();
        assert_eq!(channel.get_divisor_from_code(), 8);

        channel.divisor_code = 7;
        assert_eq!(channel.get_divisor_from_code(), 112);
    }

    #[test]
    fn test_lfsr_width_mode() {
        let mut channel = NoiseChannel::new();
        channel.write_register(0x21, 0xF0, 0);
        channel.write_register(0x22, 0x08, 0);
        channel.write_register(0x23, 0x80, 0);

        // Starting from all ones, bit0 ^ bit1 == 0, which lands in bits 14 and 6.
        channel.clock_lfsr();

        assert_eq!(channel.lfsr & (1 << 14), 0);
        assert_eq!(channel.lfsr & (1 << 6), 0);
        // Bit 0 is still set, so the inverted output is silent for now.
        assert_eq!(channel.output_volume(), 0);
    }
}
