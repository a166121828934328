use crate::hardware::apu::{no_length_tick_next_step, test_bit};
use crate::hardware::mmu::INVALID_READ;
use crate::state::WaveChannelState;

use super::channel_features::LengthFeature;

/// Voice 3, playing straight from its 32 nibble wave RAM.
///
/// # Properties:
/// * Length Counter
#[derive(Default, Debug)]
pub struct WaveformChannel {
    length: LengthFeature,
    enabled: bool,
    output_volume: u8,
    frequency: u16,
    timer: u16,

    dac_power: bool,
    volume_load: u8,
    volume_shift: u8,
    sample_buffer: [u8; 32],
    sample_pointer: usize,
}

impl WaveformChannel {
    pub fn new() -> Self {
        WaveformChannel {
            // The DMG initialisation values, the game R-Type relies on these.
            sample_buffer: [
                0x8, 0x4, 0x4, 0x0, 0x4, 0x3, 0xA, 0xA, 0x2, 0xD, 0x7, 0x8, 0x9, 0x2, 0x3, 0xC, 0x6, 0x0, 0x5, 0x9,
                0x5, 0x9, 0xB, 0x0, 0x3, 0x4, 0xB, 0x8, 0x2, 0xE, 0xD, 0xA,
            ],
            volume_shift: 4,
            ..Default::default()
        }
    }

    pub fn output_volume(&self) -> u8 {
        self.output_volume
    }

    pub fn triggered(&self) -> bool {
        self.enabled
    }

    pub fn tick_timer(&mut self, mut cycles: u64) {
        while cycles > 0 {
            if self.timer as u64 > cycles {
                self.timer -= cycles as u16;
                break;
            }

            cycles -= self.timer as u64;
            self.timer = (2048 - self.frequency) * 2;
            self.sample_pointer = (self.sample_pointer + 1) % 32;
            self.update_output();
        }
    }

    fn update_output(&mut self) {
        self.output_volume = if self.enabled && self.dac_power {
            self.sample_buffer[self.sample_pointer] >> self.volume_shift
        } else {
            0
        };
    }

    pub fn tick_length(&mut self) {
        self.length.tick(&mut self.enabled);
    }

    pub fn read_register(&self, address: u16) -> u8 {
        // Expect the address to already have had an & 0xFF
        // The read values are taken from gbdev
        match address {
            0x1A => 0x7F | if self.dac_power { 0x80 } else { 0 },
            0x1B => INVALID_READ,
            0x1C => 0x9F | self.volume_load,
            0x1D => INVALID_READ, // Can't read NR33
            0x1E => 0xBF | if self.length.length_enable { 0x40 } else { 0x0 },
            0x30..=0x3F => {
                if self.enabled {
                    // While playing, reads return the byte the channel is
                    // currently fetching instead of the addressed one.
                    let playing_address = (self.sample_pointer & !0x1) as usize;
                    (self.sample_buffer[playing_address] << 4) | self.sample_buffer[playing_address + 1]
                } else {
                    let offset_address = ((address - 0x30) * 2) as usize;
                    (self.sample_buffer[offset_address] << 4) | self.sample_buffer[offset_address + 1]
                }
            }
            _ => unreachable!("Invalid wave channel register read: 0xFF{:02X}", address),
        }
    }

    pub fn write_register(&mut self, address: u16, value: u8, next_frame_sequencer_step: u8) {
        // Expect the address to already have had an & 0xFF
        match address {
            0x1A => {
                self.dac_power = test_bit(value, 7);
                if !self.dac_power {
                    self.enabled = false;
                }
            }
            0x1B => self.length.write_register_256(value),
            0x1C => self.set_volume_from_val(value),
            0x1D => self.frequency = (self.frequency & 0x0700) | value as u16,
            0x1E => {
                let old_length_enable = self.length.length_enable;
                let no_l_next = no_length_tick_next_step(next_frame_sequencer_step);

                self.length.length_enable = test_bit(value, 6);
                self.frequency = (self.frequency & 0xFF) | (((value & 0x07) as u16) << 8);

                if no_l_next {
                    self.length.second_half_enable_tick(&mut self.enabled, old_length_enable);
                }

                if test_bit(value, 7) {
                    self.trigger(no_l_next);
                }
            }
            0x30..=0x3F => {
                if self.enabled {
                    let playing_address = self.sample_pointer & !0x1;
                    self.sample_buffer[playing_address] = value >> 4;
                    self.sample_buffer[playing_address + 1] = value & 0xF;
                } else {
                    let offset_address = ((address - 0x30) * 2) as usize;
                    self.sample_buffer[offset_address] = value >> 4;
                    self.sample_buffer[offset_address + 1] = value & 0xF;
                }
            }
            _ => unreachable!("Invalid wave channel register write: 0xFF{:02X}", address),
        }
    }

    /// Should be called whenever the trigger bit in NR34 is written to.
    fn trigger(&mut self, next_step_no_length: bool) {
        // Only if the DAC has power is the channel re-enabled.
        if self.dac_power {
            self.enabled = true;
        }
        self.length.trigger_256(next_step_no_length);
        self.timer = (2048 - self.frequency) * 2;
        self.sample_pointer = 0;
        self.update_output();
    }

    fn set_volume_from_val(&mut self, value: u8) {
        self.volume_load = value & 0x60;
        // We'll shift right (thus divide by 2) by these amounts.
        self.volume_shift = match self.volume_load {
            0b0000_0000 => 4, // 0% volume
            0b0010_0000 => 0, // 100% volume
            0b0100_0000 => 1, // 50% volume
            _ => 2,           // 25% volume
        }
    }

    pub fn reset(&mut self, keep_length: bool) {
        let sample_buffer = self.sample_buffer;
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
        };
        // Wave RAM survives the APU being powered off.
        self.sample_buffer = sample_buffer;
        self.volume_shift = 4;
    }

    pub(crate) fn snapshot(&self) -> WaveChannelState {
        WaveChannelState {
            length: self.length.snapshot(),
            enabled: self.enabled,
            output_volume: self.output_volume,
            frequency: self.frequency,
            timer: self.timer,
            dac_power: self.dac_power,
            volume_load: self.volume_load,
            sample_buffer: self.sample_buffer.to_vec(),
            sample_pointer: self.sample_pointer as u8,
        }
    }

    pub(crate) fn restore(state: &WaveChannelState) -> Self {
        let mut result = WaveformChannel {
            length: LengthFeature::restore(&state.length),
            enabled: state.enabled,
            output_volume: state.output_volume,
            frequency: state.frequency,
            timer: state.timer,
            dac_power: state.dac_power,
            volume_load: 0,
            volume_shift: 4,
            sample_buffer: [0; 32],
            sample_pointer: state.sample_pointer as usize % 32,
        };
        result.set_volume_from_val(state.volume_load);
        for (i, nibble) in state.sample_buffer.iter().take(32).enumerate() {
            result.sample_buffer[i] = nibble & 0xF;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wave_ram_read_while_playing() {
        let mut channel = WaveformChannel::new();
        channel.write_register(0x1A, 0x80, 0);
        channel.write_register(0x1E, 0x87, 0);

        // Playing: every wave RAM address mirrors the current sample byte.
        let current = channel.read_register(0x30);
        assert_eq!(channel.read_register(0x3F), current);

        // Stopped: the addressed byte comes back again.
        channel.write_register(0x1A, 0x00, 0);
        assert_eq!(channel.read_register(0x30), 0x84);
        assert_eq!(channel.read_register(0x3F), 0xDA);
    }

    #[test]
    fn test_volume_shift() {
        let mut channel = WaveformChannel::new();
        channel.write_register(0x1C, 0x20, 0);
        channel.write_register(0x1A, 0x80, 0);
        channel.write_register(0x1E, 0x87, 0);

        // 100% volume: the second sample (0x4) comes through unshifted.
        channel.tick_timer((2048 - 0x700u64) * 2);
        assert_eq!(channel.output_volume(), 0x4);
    }
}
