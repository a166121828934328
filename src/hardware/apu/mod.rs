//! The APU runs lazily for the sake of performance: nothing ticks it per
//! instruction. Instead it is synchronised up to the shared cycle counter
//! whenever one of its registers is touched, and once more at the end of
//! every emulation iteration to drain the sample buffer.

use crate::emulator::{EmulatorMode, DMG_CLOCK_SPEED};
use crate::hardware::apu::noise_channel::NoiseChannel;
use crate::hardware::apu::square_channel::SquareWaveChannel;
use crate::hardware::apu::wave_channel::WaveformChannel;
use crate::hardware::mmu::INVALID_READ;
use crate::state::ApuState;

pub mod channel_features;
mod noise_channel;
mod square_channel;
mod wave_channel;

pub const FRAME_SEQUENCE_CYCLES: u64 = 8192;
/// The default amount of cycles between samples, for 44100 Hz output.
pub const SAMPLE_CYCLES: u64 = DMG_CLOCK_SPEED / 44_100;

pub const APU_MEM_START: u16 = 0xFF10;
pub const APU_MEM_END: u16 = 0xFF2F;
pub const WAVE_SAMPLE_START: u16 = 0xFF30;
pub const WAVE_SAMPLE_END: u16 = 0xFF3F;

#[derive(Debug)]
pub struct APU {
    voice1: SquareWaveChannel,
    voice2: SquareWaveChannel,
    voice3: WaveformChannel,
    voice4: NoiseChannel,
    audio_output: AudioOutput,
    // The vin mixing bits are unused by games, but kept for the accuracy tests.
    vin_l_enable: bool,
    vin_r_enable: bool,
    left_volume: u8,
    right_volume: u8,
    // 0-3 represent voice 1-4 enable respectively.
    left_channel_enable: [bool; 4],
    right_channel_enable: [bool; 4],
    global_sound_enable: bool,
    output_buffer: Vec<f32>,
    frame_sequencer_step: u8,
    // Used for synchronisation
    last_synchronise_time: u64,
    last_frame_sequence_tick: u64,
}

impl APU {
    pub fn new() -> Self {
        APU {
            voice1: SquareWaveChannel::default(),
            voice2: SquareWaveChannel::default(),
            voice3: WaveformChannel::new(),
            voice4: NoiseChannel::new(),
            audio_output: AudioOutput::default(),
            vin_l_enable: false,
            vin_r_enable: false,
            left_volume: 7,
            right_volume: 7,
            left_channel_enable: [true; 4],
            right_channel_enable: [true, true, false, false],
            // Start with roughly 2 frames of samples worth of capacity.
            output_buffer: Vec::with_capacity(3000),
            global_sound_enable: true,
            frame_sequencer_step: 0,
            last_synchronise_time: 0,
            last_frame_sequence_tick: 0,
        }
    }

    /// Bring the APU up to `current_time`, ticking the frame sequencer and
    /// all channels, and emitting one sample pair per elapsed resampler
    /// period.
    ///
    /// This is safe and valid so long as we do this before every APU memory
    /// access; between accesses no observable state can change.
    pub fn synchronise(&mut self, current_time: u64, speed_shift: u64) {
        self.tick_frame_sequencer(current_time, speed_shift);

        let mut remaining = (current_time - self.last_synchronise_time) >> speed_shift;
        self.last_synchronise_time = current_time;

        while remaining > 0 {
            let until_sample = self.audio_output.cycles_per_sample - self.audio_output.sample_counter;
            let step = remaining.min(until_sample);

            if self.global_sound_enable {
                self.voice1.tick_timer(step);
                self.voice2.tick_timer(step);
                self.voice3.tick_timer(step);
                self.voice4.tick_timer(step);
            }

            self.audio_output.sample_counter += step;
            if self.audio_output.sample_counter == self.audio_output.cycles_per_sample {
                self.audio_output.sample_counter = 0;
                self.generate_sample();
            }

            remaining -= step;
        }

        #[cfg(feature = "apu-logging")]
        log::trace!(
            "APU synchronised to {} (sequencer step {})",
            current_time,
            self.frame_sequencer_step
        );
    }

    /// Ticks, if it is required, the frame sequencer.
    /// Should always be called *before* ticking channels, as channels could be disabled
    /// based on the frame sequence ticks.
    fn tick_frame_sequencer(&mut self, current_time: u64, speed_shift: u64) {
        if !self.global_sound_enable {
            // A powered down APU holds the sequencer in reset.
            self.last_frame_sequence_tick = current_time;
            return;
        }

        // The frame sequencer clocks at 512Hz: 4194304/512 = 8192 cycles.
        let mut cycle_delta = (current_time - self.last_frame_sequence_tick) >> speed_shift;
        while cycle_delta >= FRAME_SEQUENCE_CYCLES {
            match self.frame_sequencer_step {
                0 | 4 => self.tick_length(),
                2 | 6 => {
                    self.tick_length();
                    self.tick_sweep();
                }
                7 => self.tick_envelope(),
                _ => {}
            }
            self.frame_sequencer_step = (self.frame_sequencer_step + 1) % 8;

            cycle_delta -= FRAME_SEQUENCE_CYCLES;
            self.last_frame_sequence_tick += FRAME_SEQUENCE_CYCLES << speed_shift;
        }
    }

    /// Mix one stereo sample pair into the output buffer.
    fn generate_sample(&mut self) {
        if !self.global_sound_enable {
            self.output_buffer.push(0.0);
            self.output_buffer.push(0.0);
            return;
        }

        let left_final_volume = self.left_volume as f32 / 7.0;
        let right_final_volume = self.right_volume as f32 / 7.0;

        let left_sample = self.generate_audio(self.left_channel_enable, left_final_volume);
        let right_sample = self.generate_audio(self.right_channel_enable, right_final_volume);

        let result_samples = self.audio_output.apply_highpass_filter(left_sample, right_sample);

        self.output_buffer.push(result_samples.0);
        self.output_buffer.push(result_samples.1);
    }

    fn generate_audio(&mut self, voice_enables: [bool; 4], final_volume: f32) -> f32 {
        let mut result = 0f32;
        // Voice 1 (Square wave)
        if voice_enables[0] {
            result += self.voice1.output_volume() as f32;
        }
        // Voice 2 (Square wave)
        if voice_enables[1] {
            result += self.voice2.output_volume() as f32;
        }
        // Voice 3 (Wave)
        if voice_enables[2] {
            result += self.voice3.output_volume() as f32;
        }
        // Voice 4 (Noise)
        if voice_enables[3] {
            result += self.voice4.output_volume() as f32;
        }

        (result / 100.0) * final_volume
    }

    pub fn get_audio_buffer(&self) -> &[f32] {
        &self.output_buffer
    }

    pub fn clear_audio_buffer(&mut self) {
        self.output_buffer.clear();
    }

    pub fn read_register(&mut self, address: u16, current_time: u64, speed_shift: u64) -> u8 {
        self.synchronise(current_time, speed_shift);
        let address = address & 0xFF;
        match address {
            0x10..=0x14 => self.voice1.read_register(address),
            0x15..=0x19 => self.voice2.read_register(address),
            0x1A..=0x1E => self.voice3.read_register(address),
            0x1F..=0x23 => self.voice4.read_register(address),
            // APU registers
            0x24 => {
                let mut output = 0;
                set_bit(&mut output, 7, self.vin_l_enable);
                set_bit(&mut output, 3, self.vin_r_enable);
                output | (self.left_volume << 4) | self.right_volume
            }
            0x25 => {
                let mut output = 0;
                for i in 0..4 {
                    set_bit(&mut output, i as u8, self.right_channel_enable[i]);
                }
                for i in 0..4 {
                    set_bit(&mut output, i as u8 + 4, self.left_channel_enable[i]);
                }
                output
            }
            0x26 => {
                let mut output = 0x70;
                set_bit(&mut output, 7, self.global_sound_enable);
                set_bit(&mut output, 3, self.voice4.triggered());
                set_bit(&mut output, 2, self.voice3.triggered());
                set_bit(&mut output, 1, self.voice2.triggered());
                set_bit(&mut output, 0, self.voice1.triggered());
                output
            }
            0x27..=0x2F => INVALID_READ, // Unused registers, always read 0xFF
            _ => unreachable!("Out of bound APU register read: {}", address),
        }
    }

    pub fn write_register(
        &mut self,
        address: u16,
        value: u8,
        current_time: u64,
        mode: EmulatorMode,
        speed_shift: u64,
    ) {
        self.synchronise(current_time, speed_shift);
        #[cfg(feature = "apu-logging")]
        log::trace!("APU write on address: {:#X} with value: {:#X}", address, value);
        let address = address & 0xFF;

        // It's not possible to access any register besides 0x26 while the sound is disabled.
        // *Caveat*: In DMG mode the length registers remain writable.
        if !self.global_sound_enable
            && address != 0x26
            && (mode.is_cgb() || ![0x11, 0x16, 0x1B, 0x20].contains(&address))
        {
            log::trace!("Blocked APU write at 0x{:02X} while powered down", address);
            return;
        }

        match address {
            0x10..=0x14 => self.voice1.write_register(address, value, self.frame_sequencer_step),
            0x15..=0x19 => self.voice2.write_register(address, value, self.frame_sequencer_step),
            0x1A..=0x1E => self.voice3.write_register(address, value, self.frame_sequencer_step),
            0x1F..=0x23 => self.voice4.write_register(address, value, self.frame_sequencer_step),
            0x24 => {
                self.vin_l_enable = test_bit(value, 7);
                self.vin_r_enable = test_bit(value, 3);
                self.right_volume = value & 0x07;
                self.left_volume = (value & 0x70) >> 4;
            }
            0x25 => {
                for i in 0..4 {
                    self.right_channel_enable[i] = test_bit(value, i as u8);
                }
                for i in 0..4 {
                    self.left_channel_enable[i] = test_bit(value, i as u8 + 4);
                }
            }
            0x26 => {
                let previous_enable = self.global_sound_enable;
                self.global_sound_enable = test_bit(value, 7);
                if previous_enable && !self.global_sound_enable {
                    self.reset(mode);
                } else if !previous_enable && self.global_sound_enable {
                    // After a re-enable the next frame sequence tick is once
                    // again a full period out.
                    self.last_frame_sequence_tick = current_time;
                    self.frame_sequencer_step = 0;
                }
            }
            0x27..=0x2F => {} // Writes to unused registers are silently ignored.
            _ => unreachable!(
                "Attempt to write to an unknown audio register: 0xFF{:02X} with val: {}",
                address, value
            ),
        }
    }

    /// Wave RAM bypasses the power gate entirely.
    pub fn read_wave_sample(&mut self, address: u16, current_time: u64, speed_shift: u64) -> u8 {
        self.synchronise(current_time, speed_shift);
        self.voice3.read_register(address & 0xFF)
    }

    pub fn write_wave_sample(&mut self, address: u16, value: u8, current_time: u64, speed_shift: u64) {
        self.synchronise(current_time, speed_shift);
        self.voice3.write_register(address & 0xFF, value, self.frame_sequencer_step)
    }

    /// Change the resampling factor, `max(clocks_per_second / sample_rate, 1)`.
    pub fn set_sample_rate(&mut self, sample_rate: u64, clocks_per_second: u64) {
        self.audio_output.set_sample_rate(sample_rate, clocks_per_second);
    }

    fn tick_length(&mut self) {
        self.voice1.tick_length();
        self.voice2.tick_length();
        self.voice3.tick_length();
        self.voice4.tick_length();
    }

    fn tick_envelope(&mut self) {
        self.voice1.tick_envelope();
        self.voice2.tick_envelope();
        self.voice4.tick_envelope();
    }

    fn tick_sweep(&mut self) {
        self.voice1.tick_sweep();
    }

    fn reset(&mut self, mode: EmulatorMode) {
        // On DMG the length counters survive the power cycle.
        let keep_length = mode.is_dmg();
        self.voice1.reset(keep_length);
        self.voice2.reset(keep_length);
        self.voice3.reset(keep_length);
        self.voice4.reset(keep_length);
        self.vin_l_enable = false;
        self.vin_r_enable = false;
        self.right_volume = 0;
        self.left_volume = 0;
        self.left_channel_enable = [false; 4];
        self.right_channel_enable = [false; 4];
        self.frame_sequencer_step = 0;
    }

    pub(crate) fn snapshot(&self) -> ApuState {
        ApuState {
            voice1: self.voice1.snapshot(),
            voice2: self.voice2.snapshot(),
            voice3: self.voice3.snapshot(),
            voice4: self.voice4.snapshot(),
            vin_l_enable: self.vin_l_enable,
            vin_r_enable: self.vin_r_enable,
            left_volume: self.left_volume,
            right_volume: self.right_volume,
            left_channel_enable: enable_bits(&self.left_channel_enable),
            right_channel_enable: enable_bits(&self.right_channel_enable),
            global_sound_enable: self.global_sound_enable,
            frame_sequencer_step: self.frame_sequencer_step,
            last_synchronise_time: self.last_synchronise_time,
            last_frame_sequence_tick: self.last_frame_sequence_tick,
            sample_counter: self.audio_output.sample_counter,
            highpass_left: self.audio_output.highpass_diff.0,
            highpass_right: self.audio_output.highpass_diff.1,
        }
    }

    pub(crate) fn restore(&mut self, state: &ApuState) {
        self.voice1 = SquareWaveChannel::restore(&state.voice1);
        self.voice2 = SquareWaveChannel::restore(&state.voice2);
        self.voice3 = WaveformChannel::restore(&state.voice3);
        self.voice4 = NoiseChannel::restore(&state.voice4);
        self.vin_l_enable = state.vin_l_enable;
        self.vin_r_enable = state.vin_r_enable;
        self.left_volume = state.left_volume;
        self.right_volume = state.right_volume;
        for i in 0..4 {
            self.left_channel_enable[i] = state.left_channel_enable & (1 << i) != 0;
            self.right_channel_enable[i] = state.right_channel_enable & (1 << i) != 0;
        }
        self.global_sound_enable = state.global_sound_enable;
        self.frame_sequencer_step = state.frame_sequencer_step;
        self.last_synchronise_time = state.last_synchronise_time;
        self.last_frame_sequence_tick = state.last_frame_sequence_tick;
        self.audio_output.sample_counter = state.sample_counter;
        self.audio_output.highpass_diff = (state.highpass_left, state.highpass_right);
        self.output_buffer.clear();
    }
}

fn enable_bits(enables: &[bool; 4]) -> u8 {
    enables
        .iter()
        .enumerate()
        .fold(0, |acc, (i, &on)| acc | ((on as u8) << i))
}

#[derive(Debug)]
pub struct AudioOutput {
    sample_counter: u64,
    cycles_per_sample: u64,
    highpass_rate: f32,
    highpass_diff: (f32, f32),
}

impl Default for AudioOutput {
    fn default() -> Self {
        AudioOutput {
            sample_counter: 0,
            cycles_per_sample: SAMPLE_CYCLES,
            highpass_rate: get_highpass_rate(SAMPLE_CYCLES),
            highpass_diff: (0.0, 0.0),
        }
    }
}

impl AudioOutput {
    #[inline]
    pub fn apply_highpass_filter(&mut self, left_in: f32, right_in: f32) -> (f32, f32) {
        // Credits to SameBoy since I looked at their implementation for this.
        let (high_left, high_right) = self.highpass_diff;
        let (filt_left, filt_right) = (left_in - high_left, right_in - high_right);
        self.highpass_diff = (
            left_in - (filt_left * self.highpass_rate),
            right_in - (filt_right * self.highpass_rate),
        );
        (filt_left, filt_right)
    }

    pub fn set_sample_rate(&mut self, sample_rate_in_hz: u64, clocks_per_second: u64) {
        self.cycles_per_sample = (clocks_per_second / sample_rate_in_hz).max(1);
        self.highpass_rate = get_highpass_rate(self.cycles_per_sample);
        self.sample_counter = 0;
    }
}

fn no_length_tick_next_step(next_frame_sequence_val: u8) -> bool {
    // Due to the fact that we increment frame_sequencer immediately we have to check for current_step + 1
    [1, 3, 5, 7].contains(&next_frame_sequence_val)
}

fn get_highpass_rate(cycles_per_sample: u64) -> f32 {
    0.999958f32.powf(cycles_per_sample as f32)
}

fn set_bit(output: &mut u8, bit: u8, set: bool) {
    if set {
        *output |= 1 << bit;
    }
}

fn test_bit(value: u8, bit: u8) -> bool {
    let mask = 1 << bit;
    (value & mask) == mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_count_is_cycles_over_factor() {
        let mut apu = APU::new();

        apu.synchronise(SAMPLE_CYCLES * 10 + 17, 0);

        assert_eq!(apu.get_audio_buffer().len(), 10 * 2);
    }

    #[test]
    fn test_power_off_clears_and_locks_registers() {
        let mut apu = APU::new();
        apu.write_register(0xFF26, 0x00, 0, EmulatorMode::CGB, 0);

        // Writes are blocked while off.
        apu.write_register(0xFF12, 0xF8, 4, EmulatorMode::CGB, 0);

        assert_eq!(apu.read_register(0xFF12, 8, 0), 0x00);
        // Open-bus patterns shine through on the cleared registers.
        assert_eq!(apu.read_register(0xFF10, 8, 0), 0x80);
        assert_eq!(apu.read_register(0xFF11, 8, 0), 0x3F);
        assert_eq!(apu.read_register(0xFF26, 8, 0), 0x70);
    }

    #[test]
    fn test_wave_ram_writable_while_powered_off() {
        let mut apu = APU::new();
        apu.write_register(0xFF26, 0x00, 0, EmulatorMode::DMG, 0);

        apu.write_wave_sample(0xFF30, 0xAB, 4, 0);

        assert_eq!(apu.read_wave_sample(0xFF30, 8, 0), 0xAB);
    }

    #[test]
    fn test_dmg_length_writable_while_powered_off() {
        let mut apu = APU::new();
        apu.write_register(0xFF26, 0x00, 0, EmulatorMode::DMG, 0);

        apu.write_register(0xFF20, 0x10, 4, EmulatorMode::DMG, 0);

        // NR41 is write only, but the length counter must have taken the value.
        assert_eq!(apu.read_register(0xFF20, 8, 0), 0xFF);
    }
}
