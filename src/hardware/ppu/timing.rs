use crate::hardware::ppu::register_flags::LcdControl;
use crate::hardware::ppu::{is_sprite_on_scanline, PPU};

pub const SCANLINE_DURATION: u64 = 456;
pub const BASE_LCD_TRANSFER_DURATION: u64 = 172;
pub const BASE_HBLANK_DURATION: u64 = 204;
pub const OAM_SEARCH_DURATION: u64 = 80;
/// LY wraps to 0 this many ticks into line 153.
pub const LINE_153_RESET_DELAY: u64 = 8;

impl PPU {
    #[inline]
    pub fn get_lcd_transfer_duration(&mut self) -> u64 {
        self.current_lcd_transfer_duration = self.calculate_lcd_transfer_duration();
        self.current_lcd_transfer_duration
    }

    #[inline]
    pub fn get_hblank_duration(&self) -> u64 {
        // Mode 3 stretching eats into the H-Blank of the same line.
        SCANLINE_DURATION - OAM_SEARCH_DURATION - self.current_lcd_transfer_duration
    }

    /// Roughly calculates the expected duration of LCD transfer (mode 3).
    /// This is not entirely accurate yet, as I'm not sure about the sprite timings.
    #[inline]
    fn calculate_lcd_transfer_duration(&self) -> u64 {
        // All cycles mentioned here are t-cycles
        let mut base_cycles = BASE_LCD_TRANSFER_DURATION;
        // If we need to skip a few initial pixels this scanline.
        base_cycles += (self.scroll_x % 8) as u64;

        // If there's an active window the fifo pauses for *at least* 6 cycles.
        if self.window_triggered && self.window_x < 168 && self.lcd_control.contains(LcdControl::WINDOW_DISPLAY) {
            base_cycles += 6;
        }

        let tall_sprites = self.lcd_control.contains(LcdControl::SPRITE_SIZE);
        let y_size = if tall_sprites { 16 } else { 8 };
        // Every sprite will *usually* pause the fetcher for
        // `11 - min(5, (x + SCX) mod 8)` cycles. If drawn over the window
        // 255 - WX is used instead of SCX.
        base_cycles += self
            .oam
            .iter()
            .filter(|sprite| {
                let screen_y_pos = sprite.y_pos as i16 - 16;
                is_sprite_on_scanline(self.current_y as i16, screen_y_pos, y_size)
            })
            .take(10) // Max 10 sprites per scanline
            .map(|s| {
                let to_add = if self.window_triggered && self.window_x >= s.x_pos {
                    255 - self.window_x
                } else {
                    self.scroll_x
                };

                (11 - core::cmp::min(5, (s.x_pos.wrapping_add(to_add)) % 8)) as u64
            })
            .sum::<u64>();

        base_cycles
    }
}
