use itertools::Itertools;
use tinyvec::ArrayVec;

use crate::emulator::EmulatorMode;
use crate::hardware::ppu::palette::{CgbPalette, CgbPaletteIndex, DisplayColour, Palette, RGB};
use crate::hardware::ppu::register_flags::*;
use crate::hardware::ppu::tiledata::*;
use crate::io::interrupts::{InterruptFlags, Interrupts};
use crate::scheduler::{EventType, Scheduler};

pub mod cgb_ppu;
pub mod cgb_vram;
pub mod dma;
pub mod memory_binds;
pub mod palette;
pub mod register_flags;
pub mod tiledata;
pub mod timing;

use crate::hardware::ppu::cgb_vram::CgbTileMap;

pub const RESOLUTION_WIDTH: usize = 160;
pub const RESOLUTION_HEIGHT: usize = 144;
pub const FRAMEBUFFER_SIZE: usize = RESOLUTION_HEIGHT * RESOLUTION_WIDTH;

// Misc:
// If the Window is enabled while drawing the screen (LY is between 0 and 143)
// then if it is disabled by changing the Bit 5 in LCDC, the Game Boy "remembers"
// what line it was last rendering from the Window.
// If the Window, once disabled, is again enabled before VBlank,
// it starts drawing the Window from the last line it "remembers".

#[derive(Debug, PartialOrd, PartialEq, Copy, Clone)]
pub enum Mode {
    Hblank,
    Vblank,
    OamSearch,
    LcdTransfer,
}

pub struct PPU {
    frame_buffer: [RGB; FRAMEBUFFER_SIZE],
    scanline_buffer: [RGB; RESOLUTION_WIDTH],
    /// The raw colour index and BG-priority flag of every pixel on the
    /// current scanline, needed for sprite ordering decisions.
    scanline_buffer_unpalette: [(u8, bool); RESOLUTION_WIDTH],

    pub(crate) tiles: [Tile; TILES_PER_BANK * 2],
    pub(crate) tile_bank_currently_used: u8,
    pub(crate) tile_map_9800: TileMap,
    pub(crate) tile_map_9c00: TileMap,
    pub(crate) cgb_9800_tile_map: CgbTileMap,
    pub(crate) cgb_9c00_tile_map: CgbTileMap,
    pub(crate) oam: [SpriteAttribute; 40],

    emulated_model: EmulatorMode,
    lcd_control: LcdControl,
    lcd_status: LcdStatus,

    bg_window_palette: Palette,
    oam_palette_0: Palette,
    oam_palette_1: Palette,

    pub(crate) cgb_bg_palette: [CgbPalette; 8],
    pub(crate) cgb_sprite_palette: [CgbPalette; 8],
    pub(crate) cgb_bg_palette_ind: CgbPaletteIndex,
    pub(crate) cgb_sprite_palette_ind: CgbPaletteIndex,
    pub(crate) cgb_object_priority: bool,

    bg_display_colours: DisplayColour,
    sp0_display_colours: DisplayColour,
    sp1_display_colours: DisplayColour,

    pub(crate) lyc_compare: u8,
    pub(crate) current_y: u8,
    pub(crate) scroll_x: u8,
    pub(crate) scroll_y: u8,
    pub(crate) window_x: u8,
    pub(crate) window_y: u8,
    window_counter: u8,
    window_triggered: bool,
    window_drawn_this_line: bool,

    pub(crate) oam_transfer_ongoing: bool,
    stat_irq_triggered: bool,
    pub(crate) lcd_transfer_start: u64,
    pub(crate) current_lcd_transfer_duration: u64,
    /// The panel shows nothing for the first two frames after power on.
    blank_frames: u8,
}

impl PPU {
    pub fn new(
        emulated_model: EmulatorMode,
        bg_display_colours: DisplayColour,
        sp0_display_colours: DisplayColour,
        sp1_display_colours: DisplayColour,
    ) -> Self {
        let (cgb_bg_palette, cgb_sprite_palette) =
            palette::initialise_cgb_palette(bg_display_colours, sp0_display_colours, sp1_display_colours);

        PPU {
            frame_buffer: [bg_display_colours.white; FRAMEBUFFER_SIZE],
            scanline_buffer: [bg_display_colours.white; RESOLUTION_WIDTH],
            scanline_buffer_unpalette: [(0, false); RESOLUTION_WIDTH],
            tiles: [Tile::default(); TILES_PER_BANK * 2],
            tile_bank_currently_used: 0,
            tile_map_9800: TileMap::new(),
            tile_map_9c00: TileMap::new(),
            cgb_9800_tile_map: CgbTileMap::new(),
            cgb_9c00_tile_map: CgbTileMap::new(),
            oam: [SpriteAttribute::default(); 40],
            emulated_model,
            lcd_control: LcdControl::default(),
            lcd_status: LcdStatus::default(),
            bg_window_palette: Palette::new(0b1110_0100, bg_display_colours),
            oam_palette_0: Palette::new(0xFF, sp0_display_colours),
            oam_palette_1: Palette::new(0xFF, sp1_display_colours),
            cgb_bg_palette,
            cgb_sprite_palette,
            cgb_bg_palette_ind: CgbPaletteIndex::default(),
            cgb_sprite_palette_ind: CgbPaletteIndex::default(),
            cgb_object_priority: false,
            bg_display_colours,
            sp0_display_colours,
            sp1_display_colours,
            lyc_compare: 0,
            current_y: 0,
            scroll_x: 0,
            scroll_y: 0,
            window_x: 0,
            window_y: 0,
            window_counter: 0,
            window_triggered: false,
            window_drawn_this_line: false,
            oam_transfer_ongoing: false,
            stat_irq_triggered: false,
            lcd_transfer_start: 0,
            current_lcd_transfer_duration: timing::BASE_LCD_TRANSFER_DURATION,
            blank_frames: 2,
        }
    }

    pub fn current_y(&self) -> u8 {
        self.current_y
    }

    pub fn get_current_mode(&self) -> Mode {
        self.lcd_status.mode_flag()
    }

    pub fn lcd_enabled(&self) -> bool {
        self.lcd_control.contains(LcdControl::LCD_DISPLAY)
    }

    /// Mode 2 entry, the start of every visible scanline.
    pub fn oam_search(&mut self, interrupts: &mut Interrupts) {
        // Coming out of V-Blank the line counter was already reset.
        if self.lcd_status.mode_flag() == Mode::Hblank {
            self.current_y += 1;
        }

        self.lcd_status.set_mode_flag(Mode::OamSearch);
        self.ly_lyc_compare(interrupts);
    }

    /// Mode 3 entry: latch the window trigger and rasterise the line.
    pub fn lcd_transfer(&mut self, current_time: u64, interrupts: &mut Interrupts) {
        self.lcd_status.set_mode_flag(Mode::LcdTransfer);
        self.lcd_transfer_start = current_time;
        self.window_drawn_this_line = false;
        // No STAT source is active during mode 3; recompute so the interrupt
        // line can drop and produce a fresh edge next H-Blank.
        self.request_stat_interrupt(interrupts);

        if self.lcd_control.contains(LcdControl::WINDOW_DISPLAY) && self.window_y <= self.current_y {
            self.window_triggered = true;
        }

        self.render_scanline();
    }

    /// Mode 0 entry: the finished scanline is committed to the frame buffer.
    pub fn hblank(&mut self, interrupts: &mut Interrupts) {
        self.lcd_status.set_mode_flag(Mode::Hblank);

        let current_address: usize = self.current_y as usize * RESOLUTION_WIDTH;
        self.frame_buffer[current_address..current_address + RESOLUTION_WIDTH].copy_from_slice(&self.scanline_buffer);

        if self.window_drawn_this_line {
            self.window_counter += 1;
        }

        self.request_stat_interrupt(interrupts);
    }

    /// Line 144: V-Blank starts, the frame is complete.
    pub fn vblank(&mut self, interrupts: &mut Interrupts) {
        self.current_y += 1;
        self.lcd_status.set_mode_flag(Mode::Vblank);
        self.window_counter = 0;
        self.window_triggered = false;

        interrupts.insert_interrupt(InterruptFlags::VBLANK);
        self.ly_lyc_compare(interrupts);

        if self.blank_frames > 0 {
            self.blank_frames -= 1;
            let blank = self.bg_display_colours.white;
            for pixel in self.frame_buffer.iter_mut() {
                *pixel = blank;
            }
        }
    }

    /// Lines 145..=153 just advance LY.
    pub fn vblank_wait(&mut self, interrupts: &mut Interrupts) {
        self.current_y += 1;
        self.ly_lyc_compare(interrupts);
    }

    /// 8 ticks into line 153, LY already reports 0.
    pub fn line_153_reset(&mut self, interrupts: &mut Interrupts) {
        self.current_y = 0;
        self.ly_lyc_compare(interrupts);
    }

    pub(crate) fn render_scanline(&mut self) {
        if self.emulated_model.is_cgb() {
            self.draw_cgb_scanline();
        } else {
            self.draw_scanline();
        }
    }

    fn draw_scanline(&mut self) {
        if self.lcd_control.contains(LcdControl::BG_WINDOW_PRIORITY) {
            self.draw_bg_scanline();

            if self.lcd_control.contains(LcdControl::WINDOW_DISPLAY) {
                self.draw_window_scanline();
            }
        } else {
            let bg_colour = self.bg_window_palette.colour_0();
            for (pixel, raw) in self
                .scanline_buffer
                .iter_mut()
                .zip(self.scanline_buffer_unpalette.iter_mut())
            {
                *pixel = bg_colour;
                *raw = (0, false);
            }
        }

        if self.lcd_control.contains(LcdControl::SPRITE_DISPLAY_ENABLE) {
            self.draw_sprite_scanline();
        }
    }

    fn draw_bg_scanline(&mut self) {
        let scanline_to_be_rendered = self.current_y.wrapping_add(self.scroll_y);
        // scanline_to_be_rendered can be in range 0-255, where each tile is 8 in length.
        // We first divide by 8, to then multiply by 32 for our array with a 1d representation.
        let tile_lower_bound = ((scanline_to_be_rendered / 8) as u16 * 32) + (self.scroll_x / 8) as u16;
        // 20 since 20*8 = 160 pixels
        let mut tile_higher_bound = tile_lower_bound + 20;

        // Which particular y coordinate to use from an 8x8 tile.
        let tile_line_y = (scanline_to_be_rendered % 8) as usize;
        let mut pixels_drawn: i16 = 0;
        let mut pixels_to_skip = self.scroll_x % 8;
        // If the tiles are not nicely aligned on % 8 boundaries we'll need an additional tile for the
        // last 8-pixels_to_skip pixels of the scanline.
        if pixels_to_skip != 0 {
            tile_higher_bound += 1;
        }

        for mut i in tile_lower_bound..tile_higher_bound {
            // When we wraparound in the x direction we want to stay on the same internal y-tile.
            // Since we have a 1d representation of the tile map we subtract 32 to 'negate'
            // the effect of the x wraparound.
            if (self.scroll_x as u16 + pixels_drawn as u16) > 255 {
                i -= 32;
            }
            // Modulo for the y-wraparound if scroll_y > 111
            let tile_index = self.get_tile_address_bg(i % BACKGROUND_TILE_SIZE as u16);
            let tile_address = self.resolve_tile_index(tile_index);

            self.draw_background_window_line(&mut pixels_drawn, &mut pixels_to_skip, tile_address, tile_line_y);
        }
    }

    fn draw_window_scanline(&mut self) {
        let window_x = (self.window_x as i16).wrapping_sub(7);
        // If the window x is out of scope, don't bother rendering.
        if !self.window_triggered || window_x >= 160 {
            return;
        }

        // The window always starts to pick tiles from the top left of its tile map,
        // and has a separate line counter for the y coordinate.
        let tile_lower_bound = ((self.window_counter / 8) as u16) * 32;
        // We need as many tiles as there are to the end of the current scanline, even if they're
        // partial, therefore we need a ceiling divide.
        let tile_higher_bound = tile_lower_bound + ((160 - window_x) as u16).div_ceil(8);

        let tile_line_y = (self.window_counter % 8) as usize;
        let (mut pixels_drawn, mut pixels_to_skip) = if window_x >= 0 {
            (window_x, 0)
        } else {
            (0, (-window_x) as u8)
        };

        self.window_drawn_this_line = true;

        for i in tile_lower_bound..tile_higher_bound {
            let tile_index = self.get_tile_address_window(i);
            let tile_address = self.resolve_tile_index(tile_index);

            self.draw_background_window_line(&mut pixels_drawn, &mut pixels_to_skip, tile_address, tile_line_y);
        }
    }

    fn draw_sprite_scanline(&mut self) {
        let tall_sprites = self.lcd_control.contains(LcdControl::SPRITE_SIZE);
        let y_size: u8 = if tall_sprites { 16 } else { 8 };

        // The first 10 sprites on the scanline, in OAM order.
        let sprites_on_line: ArrayVec<[SpriteAttribute; 10]> = self
            .oam
            .iter()
            .filter(|sprite| {
                let screen_y_pos = sprite.y_pos as i16 - 16;
                is_sprite_on_scanline(self.current_y as i16, screen_y_pos, y_size as i16)
            })
            .take(10)
            .copied()
            .collect();

        // On DMG the lowest x-position wins; the stable sort keeps OAM order
        // as the tie break. We render back-to-front so the winner lands last.
        for sprite in sprites_on_line.iter().sorted_by_key(|sprite| sprite.x_pos).rev() {
            // We need to cast to i16 here, as otherwise we'd wrap around when a sprite is
            // partially off the left/top side of the screen.
            let screen_x_pos = sprite.x_pos as i16 - 8;
            let screen_y_pos = sprite.y_pos as i16 - 16;

            let x_flip = sprite.attribute_flags.contains(AttributeFlags::X_FLIP);
            let y_flip = sprite.attribute_flags.contains(AttributeFlags::Y_FLIP);
            let is_background_sprite = sprite.attribute_flags.contains(AttributeFlags::OBJ_TO_BG_PRIORITY);

            let mut line = (self.current_y as i16 - screen_y_pos) as u8;

            if y_flip {
                line = y_size - (line + 1);
            }

            let tile_index = sprite.tile_number as usize;
            let tile = if !tall_sprites {
                self.tiles[tile_index]
            } else if line < 8 {
                // The upper 8x8 block of a tall sprite ignores bit one.
                self.tiles[tile_index & 0xFE]
            } else {
                self.tiles[tile_index | 0x01]
            };

            let tile_pixel_y = (line as usize % 8) * 8;
            let palette = self.get_sprite_palette(sprite);

            for j in 0..=7 {
                let pixel = if x_flip {
                    screen_x_pos + j
                } else {
                    screen_x_pos + (7 - j)
                };

                // Parts of sprites with x < 8 or y < 16 are simply not rendered.
                // A background sprite only shows over BG colour 0.
                if (pixel < 0)
                    || (pixel > 159)
                    || (is_background_sprite && self.scanline_buffer_unpalette[pixel as usize].0 != 0)
                {
                    continue;
                }

                let colour = tile.get_pixel(tile_pixel_y + j as usize);

                // Colour 0 is transparent for sprites.
                if colour != 0 {
                    self.scanline_buffer[pixel as usize] = palette.colour(colour);
                }
            }
        }
    }

    fn draw_background_window_line(
        &mut self,
        pixels_drawn: &mut i16,
        pixels_to_skip: &mut u8,
        tile_address: usize,
        tile_line_y: usize,
    ) {
        let tile_pixel_y = tile_line_y * 8;
        let tile = self.tiles[tile_address];

        // If we can draw 8 pixels in one go, we should.
        if *pixels_to_skip == 0 && *pixels_drawn < 152 {
            let base = *pixels_drawn as usize;
            for j in 0..8 {
                let colour = tile.get_pixel(tile_pixel_y + 7 - j);
                self.scanline_buffer[base + j] = self.bg_window_palette.colour(colour);
                self.scanline_buffer_unpalette[base + j] = (colour, false);
            }
            *pixels_drawn += 8;
        } else {
            for j in (tile_pixel_y..tile_pixel_y + 8).rev() {
                // Skip the first pixels_to_skip of a partially visible tile.
                if *pixels_to_skip > 0 {
                    *pixels_to_skip -= 1;
                    continue;
                }
                if *pixels_drawn > 159 {
                    break;
                }

                let colour = tile.get_pixel(j);
                self.scanline_buffer[*pixels_drawn as usize] = self.bg_window_palette.colour(colour);
                self.scanline_buffer_unpalette[*pixels_drawn as usize] = (colour, false);
                *pixels_drawn += 1;
            }
        }
    }

    fn get_sprite_palette(&self, sprite: &SpriteAttribute) -> Palette {
        if !sprite.attribute_flags.contains(AttributeFlags::PALETTE_NUMBER) {
            self.oam_palette_0
        } else {
            self.oam_palette_1
        }
    }

    /// Resolve a tile map entry to an index into the tile array, taking the
    /// signed "8800 addressing" mode into account.
    fn resolve_tile_index(&self, tile_index: u8) -> usize {
        if self.lcd_control.contains(LcdControl::BG_WINDOW_TILE_SELECT) {
            tile_index as usize
        } else {
            (256_usize).wrapping_add((tile_index as i8) as usize)
        }
    }

    fn get_tile_address_bg(&self, address: u16) -> u8 {
        if !self.lcd_control.contains(LcdControl::BG_TILE_MAP_SELECT) {
            self.tile_map_9800.data[address as usize]
        } else {
            self.tile_map_9c00.data[address as usize]
        }
    }

    fn get_tile_address_window(&self, address: u16) -> u8 {
        if !self.lcd_control.contains(LcdControl::WINDOW_MAP_SELECT) {
            self.tile_map_9800.data[address as usize]
        } else {
            self.tile_map_9c00.data[address as usize]
        }
    }

    fn ly_lyc_compare(&mut self, interrupts: &mut Interrupts) {
        self.lcd_status
            .set(LcdStatus::COINCIDENCE_FLAG, self.current_y == self.lyc_compare);
        self.request_stat_interrupt(interrupts);
    }

    /// Checks which interrupt condition(s) currently hold and raises the LCD
    /// Stat interrupt on a rising edge of the combined line.
    pub fn request_stat_interrupt(&mut self, interrupts: &mut Interrupts) {
        if !self.lcd_control.contains(LcdControl::LCD_DISPLAY) {
            return;
        }

        let old_stat_irq = self.stat_irq_triggered;

        self.stat_irq_triggered = match self.get_current_mode() {
            Mode::Hblank => self.lcd_status.contains(LcdStatus::MODE_0_H_INTERRUPT),
            Mode::Vblank if self.emulated_model.is_cgb_hardware() => {
                self.lcd_status.contains(LcdStatus::MODE_1_V_INTERRUPT)
            }
            // The DMG also takes the OAM source into account during V-Blank.
            Mode::Vblank => {
                self.lcd_status.contains(LcdStatus::MODE_1_V_INTERRUPT)
                    || self.lcd_status.contains(LcdStatus::MODE_2_OAM_INTERRUPT)
            }
            Mode::OamSearch => self.lcd_status.contains(LcdStatus::MODE_2_OAM_INTERRUPT),
            _ => false,
        };

        if self.lcd_status.contains(LcdStatus::COINCIDENCE_INTERRUPT) && self.current_y == self.lyc_compare {
            self.stat_irq_triggered = true;
        }

        // Only on a rising edge do we want to trigger the LCD interrupt.
        if !old_stat_irq && self.stat_irq_triggered {
            interrupts.insert_interrupt(InterruptFlags::LCD);
        }
    }

    pub fn turn_off_lcd(&mut self, scheduler: &mut Scheduler) {
        log::debug!("Turning off LCD");
        self.current_y = 0;
        self.window_counter = 0;
        self.window_triggered = false;
        self.stat_irq_triggered = false;
        self.lcd_status.set_mode_flag(Mode::Hblank);
        // Turn the PPU off by removing all its scheduled events.
        scheduler.remove_event_type(EventType::Hblank);
        scheduler.remove_event_type(EventType::VblankWait);
        scheduler.remove_event_type(EventType::Vblank);
        scheduler.remove_event_type(EventType::LcdTransfer);
        scheduler.remove_event_type(EventType::OamSearch);
        scheduler.remove_event_type(EventType::Line153Reset);
    }

    pub fn turn_on_lcd(&mut self, scheduler: &mut Scheduler, interrupts: &mut Interrupts, speed_shift: u64) {
        log::debug!("Turning on LCD");
        self.ly_lyc_compare(interrupts);
        // The first line after enabling is quirky: OamSearch is skipped
        // entirely and the line is also slightly shorter than usual.
        scheduler.push_relative(EventType::LcdTransfer, 76 << speed_shift);
    }

    /// The column the pixel pipeline has reached in the current mode 3,
    /// `None` outside of mode 3.
    ///
    /// A write to a rendering-visible register lands mid-scanline when this
    /// returns `Some(0..160)`; the caller re-renders the tail of the line
    /// after applying the write.
    pub(crate) fn mid_scanline_column(&self, scheduler: &Scheduler, speed_shift: u64) -> Option<usize> {
        if !self.lcd_enabled() || self.lcd_status.mode_flag() != Mode::LcdTransfer {
            return None;
        }
        let dots = (scheduler.current_time - self.lcd_transfer_start) >> speed_shift;
        // The fetcher needs 12 dots before the first pixel leaves the pipe.
        Some(dots.saturating_sub(12).min(160) as usize)
    }

    /// Re-render the scanline from `column` onwards with the (just updated)
    /// register state, keeping the already-emitted prefix intact.
    pub(crate) fn redraw_from(&mut self, column: Option<usize>) {
        let column = match column {
            Some(c) if c < RESOLUTION_WIDTH => c,
            _ => return,
        };

        let preserved_pixels = self.scanline_buffer;
        let preserved_raw = self.scanline_buffer_unpalette;

        self.render_scanline();

        self.scanline_buffer[..column].copy_from_slice(&preserved_pixels[..column]);
        self.scanline_buffer_unpalette[..column].copy_from_slice(&preserved_raw[..column]);
    }

    pub fn frame_buffer(&self) -> &[RGB; FRAMEBUFFER_SIZE] {
        &self.frame_buffer
    }

    pub(crate) fn snapshot(&self) -> crate::state::PpuState {
        let mut tiles = Vec::with_capacity(self.tiles.len() * 16);
        for tile in self.tiles.iter() {
            tiles.extend_from_slice(&tile.data);
        }

        crate::state::PpuState {
            lcd_control: self.lcd_control.bits(),
            lcd_status: self.lcd_status.bits(),
            scroll_y: self.scroll_y,
            scroll_x: self.scroll_x,
            current_y: self.current_y,
            lyc_compare: self.lyc_compare,
            window_y: self.window_y,
            window_x: self.window_x,
            bg_palette: self.bg_window_palette.into(),
            obj_palette_0: self.oam_palette_0.into(),
            obj_palette_1: self.oam_palette_1.into(),
            window_counter: self.window_counter,
            window_triggered: self.window_triggered,
            window_drawn_this_line: self.window_drawn_this_line,
            tile_bank: self.tile_bank_currently_used,
            object_priority: self.cgb_object_priority,
            tiles,
            tilemap_9800: self.tile_map_9800.data.to_vec(),
            tilemap_9c00: self.tile_map_9c00.data.to_vec(),
            tile_attributes_9800: self.cgb_9800_tile_map.attributes.iter().map(|a| a.bits()).collect(),
            tile_attributes_9c00: self.cgb_9c00_tile_map.attributes.iter().map(|a| a.bits()).collect(),
            oam: (0u16..160).map(|i| self.get_oam_byte(0xFE00 + i)).collect(),
            cgb_bg_palette: self
                .cgb_bg_palette
                .iter()
                .flat_map(|p| p.colours.iter().map(|c| c.raw))
                .collect(),
            cgb_obj_palette: self
                .cgb_sprite_palette
                .iter()
                .flat_map(|p| p.colours.iter().map(|c| c.raw))
                .collect(),
            bg_palette_index: self.cgb_bg_palette_ind.get_value(),
            obj_palette_index: self.cgb_sprite_palette_ind.get_value(),
            oam_transfer_ongoing: self.oam_transfer_ongoing,
            stat_irq_triggered: self.stat_irq_triggered,
            lcd_transfer_start: self.lcd_transfer_start,
            current_lcd_transfer_duration: self.current_lcd_transfer_duration,
            blank_frames: self.blank_frames,
        }
    }

    pub(crate) fn restore(&mut self, state: &crate::state::PpuState) {
        self.lcd_control = LcdControl::from_bits_truncate(state.lcd_control);
        self.lcd_status = LcdStatus::from_bits_truncate(state.lcd_status);
        self.scroll_y = state.scroll_y;
        self.scroll_x = state.scroll_x;
        self.current_y = state.current_y;
        self.lyc_compare = state.lyc_compare;
        self.window_y = state.window_y;
        self.window_x = state.window_x;
        self.window_counter = state.window_counter;
        self.window_triggered = state.window_triggered;
        self.window_drawn_this_line = state.window_drawn_this_line;
        self.tile_bank_currently_used = state.tile_bank & 0x1;
        self.cgb_object_priority = state.object_priority;
        self.oam_transfer_ongoing = state.oam_transfer_ongoing;
        self.stat_irq_triggered = state.stat_irq_triggered;
        self.lcd_transfer_start = state.lcd_transfer_start;
        self.current_lcd_transfer_duration = state.current_lcd_transfer_duration;
        self.blank_frames = state.blank_frames;

        self.bg_window_palette = Palette::new(state.bg_palette, self.bg_display_colours);
        self.oam_palette_0 = Palette::new(state.obj_palette_0, self.sp0_display_colours);
        self.oam_palette_1 = Palette::new(state.obj_palette_1, self.sp1_display_colours);

        // The decoded half of the tile cache is derived state, rebuild it
        // from the raw bytes.
        for (tile, bytes) in self.tiles.iter_mut().zip(state.tiles.chunks_exact(16)) {
            tile.data.copy_from_slice(bytes);
            tile.rebuild_pixels();
        }
        self.tile_map_9800.data.copy_from_slice(&state.tilemap_9800);
        self.tile_map_9c00.data.copy_from_slice(&state.tilemap_9c00);
        for (attr, &bits) in self
            .cgb_9800_tile_map
            .attributes
            .iter_mut()
            .zip(state.tile_attributes_9800.iter())
        {
            *attr = cgb_vram::CgbTileAttribute::from_bits_truncate(bits);
        }
        for (attr, &bits) in self
            .cgb_9c00_tile_map
            .attributes
            .iter_mut()
            .zip(state.tile_attributes_9c00.iter())
        {
            *attr = cgb_vram::CgbTileAttribute::from_bits_truncate(bits);
        }
        for (i, &byte) in state.oam.iter().take(160).enumerate() {
            self.set_oam_byte(0xFE00 + i as u16, byte);
        }

        for (colour, &raw) in self
            .cgb_bg_palette
            .iter_mut()
            .flat_map(|p| p.colours.iter_mut())
            .zip(state.cgb_bg_palette.iter())
        {
            *colour = palette::CgbColour::from_raw(raw);
        }
        for (colour, &raw) in self
            .cgb_sprite_palette
            .iter_mut()
            .flat_map(|p| p.colours.iter_mut())
            .zip(state.cgb_obj_palette.iter())
        {
            *colour = palette::CgbColour::from_raw(raw);
        }
        self.cgb_bg_palette_ind.set_value(state.bg_palette_index);
        self.cgb_sprite_palette_ind.set_value(state.obj_palette_index);

        // A snapshot taken during mode 3 loses the scanline buffer, so fill
        // it back in before the upcoming H-Blank commits it.
        if self.lcd_status.mode_flag() == Mode::LcdTransfer {
            self.render_scanline();
        }
    }

    /// The save state validator: every buffer a snapshot carries must have
    /// exactly the size the PPU expects.
    pub(crate) fn snapshot_sizes_valid(state: &crate::state::PpuState) -> bool {
        state.tiles.len() == TILES_PER_BANK * 2 * 16
            && state.tilemap_9800.len() == BACKGROUND_TILE_SIZE
            && state.tilemap_9c00.len() == BACKGROUND_TILE_SIZE
            && state.tile_attributes_9800.len() == BACKGROUND_TILE_SIZE
            && state.tile_attributes_9c00.len() == BACKGROUND_TILE_SIZE
            && state.oam.len() == 160
            && state.cgb_bg_palette.len() == 32
            && state.cgb_obj_palette.len() == 32
    }
}

pub(crate) fn is_sprite_on_scanline(scanline_y: i16, y_pos: i16, y_size: i16) -> bool {
    (scanline_y >= y_pos) && (scanline_y < (y_pos + y_size))
}
