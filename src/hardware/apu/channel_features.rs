use crate::state::{EnvelopeState, LengthState, SweepState};

#[derive(Default, Debug, Copy, Clone)]
pub struct EnvelopeFeature {
    pub volume: u8,
    pub(crate) volume_load: u8,
    pub(crate) envelope_add_mode: bool,
    pub(crate) envelope_enabled: bool,
    pub(crate) envelope_period_load_value: u8,
    pub(crate) envelope_period: u8,
}

impl EnvelopeFeature {
    /// Tick Envelope following this specification:
    ///
    /// A volume envelope has a volume counter and an internal timer clocked at 64 Hz by the frame sequencer.
    /// When the timer generates a clock and the envelope period is not zero,
    /// a new volume is calculated by adding or subtracting (as set by NRx2) one from the current volume.
    /// If this new volume is within the 0 to 15 range, the volume is updated,
    /// otherwise it is left unchanged and no further automatic
    /// increments/decrements are made to the volume until the channel is triggered again.
    pub fn tick(&mut self) {
        if self.envelope_enabled && self.envelope_period_load_value > 0 {
            self.envelope_period = self.envelope_period.saturating_sub(1);

            if self.envelope_period == 0 {
                self.envelope_period = self.reload_period();

                if self.envelope_add_mode {
                    if self.volume < 15 {
                        self.volume += 1;
                    } else {
                        self.envelope_enabled = false;
                    }
                } else if self.volume > 0 {
                    self.volume -= 1;
                } else {
                    self.envelope_enabled = false;
                }
            }
        }
    }

    /// Follows the behaviour when a channel is triggered, specifically for the Envelope feature.
    pub fn trigger(&mut self) {
        self.envelope_enabled = true;
        self.envelope_period = self.reload_period();
        self.volume = self.volume_load;
    }

    /// Whether the DAC driven by this envelope register has power at all.
    pub fn dac_enabled(&self) -> bool {
        self.volume_load > 0 || self.envelope_add_mode
    }

    pub fn read_register(&self) -> u8 {
        (self.volume_load << 4) | self.envelope_period_load_value | if self.envelope_add_mode { 0x8 } else { 0 }
    }

    /// An NRx2 write. While the channel is playing this perturbs the live
    /// volume in the pattern known as zombie mode.
    pub fn write_register(&mut self, value: u8, channel_enabled: bool) {
        let new_add_mode = (value & 0x8) == 0x8;

        if channel_enabled {
            if self.envelope_period_load_value == 0 && self.envelope_enabled {
                self.volume = self.volume.wrapping_add(1);
            } else if !self.envelope_add_mode {
                self.volume = self.volume.wrapping_add(2);
            }

            if self.envelope_add_mode != new_add_mode {
                self.volume = 16u8.wrapping_sub(self.volume);
            }

            self.volume &= 0xF;
        }

        self.volume_load = (value & 0xF0) >> 4;
        self.envelope_add_mode = new_add_mode;
        self.envelope_period_load_value = value & 0x7;
    }

    fn reload_period(&self) -> u8 {
        // A period of 0 behaves as 8.
        if self.envelope_period_load_value == 0 {
            8
        } else {
            self.envelope_period_load_value
        }
    }

    pub(crate) fn snapshot(&self) -> EnvelopeState {
        EnvelopeState {
            volume: self.volume,
            volume_load: self.volume_load,
            add_mode: self.envelope_add_mode,
            enabled: self.envelope_enabled,
            period_load: self.envelope_period_load_value,
            period: self.envelope_period,
        }
    }

    pub(crate) fn restore(state: &EnvelopeState) -> Self {
        EnvelopeFeature {
            volume: state.volume,
            volume_load: state.volume_load,
            envelope_add_mode: state.add_mode,
            envelope_enabled: state.enabled,
            envelope_period_load_value: state.period_load,
            envelope_period: state.period,
        }
    }
}

#[derive(Default, Debug, Copy, Clone)]
pub struct LengthFeature {
    pub length_enable: bool,
    pub(crate) length_counter: u16,
}

impl LengthFeature {
    /// Ticked at 256 Hz by the frame sequencer; a channel with an elapsed
    /// length counter switches itself off.
    pub fn tick(&mut self, channel_enabled: &mut bool) {
        if self.length_enable && self.length_counter > 0 {
            self.length_counter -= 1;

            if self.length_counter == 0 {
                *channel_enabled = false;
            }
        }
    }

    /// NRx1 write for the 64-step channels.
    pub fn write_register(&mut self, value: u8) {
        self.length_counter = 64 - (value & 0x3F) as u16;
    }

    /// NR31 write, the wave channel counts down from 256.
    pub fn write_register_256(&mut self, value: u8) {
        self.length_counter = 256 - value as u16;
    }

    /// On trigger an elapsed counter reloads to the maximum. When the next
    /// frame sequencer step will skip length (first half of the period) an
    /// enabled counter immediately loses one.
    pub fn trigger(&mut self, next_step_no_length: bool) {
        if self.length_counter == 0 {
            self.length_counter = 64;
            if next_step_no_length && self.length_enable {
                self.length_counter -= 1;
            }
        }
    }

    pub fn trigger_256(&mut self, next_step_no_length: bool) {
        if self.length_counter == 0 {
            self.length_counter = 256;
            if next_step_no_length && self.length_enable {
                self.length_counter -= 1;
            }
        }
    }

    /// Enabling the length counter in the first half of the frame sequencer
    /// period clocks it once immediately.
    pub fn second_half_enable_tick(&mut self, channel_enabled: &mut bool, old_length_enable: bool) {
        if !old_length_enable && self.length_enable && self.length_counter > 0 {
            self.length_counter -= 1;

            if self.length_counter == 0 {
                *channel_enabled = false;
            }
        }
    }

    pub(crate) fn snapshot(&self) -> LengthState {
        LengthState {
            enable: self.length_enable,
            counter: self.length_counter,
        }
    }

    pub(crate) fn restore(state: &LengthState) -> Self {
        LengthFeature {
            length_enable: state.enable,
            length_counter: state.counter,
        }
    }
}

#[derive(Default, Debug, Copy, Clone)]
pub struct SweepFeature {
    pub(crate) sweep_period_load: u8,
    pub(crate) sweep_negate: bool,
    pub(crate) sweep_shift: u8,
    // Internal sweep state
    pub(crate) sweep_enabled: bool,
    pub(crate) sweep_timer: u8,
    pub(crate) sweep_frequency_shadow: u16,
    pub(crate) sweep_negate_used: bool,
}

impl SweepFeature {
    /// Ticked at 128 Hz by the frame sequencer.
    ///
    /// The overflow check deliberately runs twice per update: once for the
    /// frequency that gets written back, and once for the calculation after
    /// that, either of which can kill the channel.
    pub fn tick(&mut self, channel_enabled: &mut bool, frequency: &mut u16) {
        if self.sweep_timer > 0 {
            self.sweep_timer -= 1;
        }
        if self.sweep_timer != 0 {
            return;
        }
        self.sweep_timer = self.reload_period();

        if self.sweep_enabled && self.sweep_period_load != 0 {
            let new_frequency = self.calculate_frequency(channel_enabled);

            if new_frequency <= 2047 && self.sweep_shift != 0 {
                self.sweep_frequency_shadow = new_frequency;
                *frequency = new_frequency;
                self.calculate_frequency(channel_enabled);
            }
        }
    }

    /// An NR10 write. Clearing the negate bit after a negate-mode calculation
    /// took place disables the channel (a sweep fault).
    pub fn write_register(&mut self, value: u8, channel_enabled: &mut bool) {
        let new_negate = (value & 0x8) == 0x8;

        if self.sweep_negate_used && self.sweep_negate && !new_negate {
            *channel_enabled = false;
            self.sweep_negate_used = false;
        }

        self.sweep_period_load = (value >> 4) & 0x7;
        self.sweep_negate = new_negate;
        self.sweep_shift = value & 0x7;
    }

    pub fn read_register(&self) -> u8 {
        (self.sweep_period_load << 4) | self.sweep_shift | if self.sweep_negate { 0x8 } else { 0 }
    }

    /// Trigger behaviour for the sweep unit, including the immediate
    /// overflow check when a shift is configured.
    pub fn trigger_sweep(&mut self, channel_enabled: &mut bool, frequency: u16) {
        self.sweep_frequency_shadow = frequency;
        self.sweep_timer = self.reload_period();
        self.sweep_enabled = self.sweep_period_load != 0 || self.sweep_shift != 0;
        self.sweep_negate_used = false;

        if self.sweep_shift != 0 {
            self.calculate_frequency(channel_enabled);
        }
    }

    /// One sweep calculation on the shadow frequency; disables the channel
    /// on an overflow past 2047.
    fn calculate_frequency(&mut self, channel_enabled: &mut bool) -> u16 {
        let delta = self.sweep_frequency_shadow >> self.sweep_shift;
        let new_frequency = if self.sweep_negate {
            self.sweep_negate_used = true;
            self.sweep_frequency_shadow.wrapping_sub(delta)
        } else {
            self.sweep_frequency_shadow + delta
        };

        if new_frequency > 2047 {
            *channel_enabled = false;
        }

        new_frequency
    }

    fn reload_period(&self) -> u8 {
        // A period of 0 behaves as 8.
        if self.sweep_period_load == 0 {
            8
        } else {
            self.sweep_period_load
        }
    }

    pub(crate) fn snapshot(&self) -> SweepState {
        SweepState {
            period_load: self.sweep_period_load,
            negate: self.sweep_negate,
            shift: self.sweep_shift,
            enabled: self.sweep_enabled,
            timer: self.sweep_timer,
            frequency_shadow: self.sweep_frequency_shadow,
            negate_used: self.sweep_negate_used,
        }
    }

    pub(crate) fn restore(state: &SweepState) -> Self {
        SweepFeature {
            sweep_period_load: state.period_load,
            sweep_negate: state.negate,
            sweep_shift: state.shift,
            sweep_enabled: state.enabled,
            sweep_timer: state.timer,
            sweep_frequency_shadow: state.frequency_shadow,
            sweep_negate_used: state.negate_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_expiry_disables_channel() {
        let mut length = LengthFeature::default();
        let mut enabled = true;

        length.write_register(0x3E); // counter = 2
        length.length_enable = true;

        length.tick(&mut enabled);
        assert!(enabled);
        length.tick(&mut enabled);
        assert!(!enabled);
    }

    #[test]
    fn test_sweep_negate_to_positive_fault() {
        let mut sweep = SweepFeature::default();
        let mut enabled = true;

        // Negate mode with a shift, then trigger so a calculation runs.
        sweep.write_register(0x19, &mut enabled);
        sweep.trigger_sweep(&mut enabled, 0x400);
        assert!(enabled);

        // Switching to addition mode after a negate calculation faults.
        sweep.write_register(0x11, &mut enabled);
        assert!(!enabled);
    }

    #[test]
    fn test_sweep_overflow_disables_channel() {
        let mut sweep = SweepFeature::default();
        let mut enabled = true;

        // Addition mode, shift 1, near-maximum frequency.
        sweep.write_register(0x11, &mut enabled);
        sweep.trigger_sweep(&mut enabled, 2047);

        assert!(!enabled);
    }

    #[test]
    fn test_envelope_zombie_increment() {
        let mut envelope = EnvelopeFeature::default();
        envelope.write_register(0xF0, false);

        let mut enabled = true;
        envelope.trigger();
        assert_eq!(envelope.volume, 15);

        // Period 0 with automatic updates active bumps the volume by one.
        envelope.write_register(0xF0, enabled);
        assert_eq!(envelope.volume, 0);
        let _ = &mut enabled;
    }
}
