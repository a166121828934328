//! CGB specific rendering; the DMG path lives in `ppu/mod.rs`.

use tinyvec::ArrayVec;

use crate::hardware::ppu::cgb_vram::CgbTileAttribute;
use crate::hardware::ppu::register_flags::{AttributeFlags, LcdControl};
use crate::hardware::ppu::tiledata::{SpriteAttribute, BACKGROUND_TILE_SIZE, TILES_PER_BANK};
use crate::hardware::ppu::{is_sprite_on_scanline, PPU, RESOLUTION_WIDTH};

impl PPU {
    pub(crate) fn draw_cgb_scanline(&mut self) {
        if self.lcd_control.contains(LcdControl::WINDOW_DISPLAY) {
            if !self.window_triggered || self.window_x > 7 {
                self.draw_cgb_bg_scanline();
            }
            self.draw_cgb_window_scanline();
        } else {
            self.draw_cgb_bg_scanline()
        }

        if self.lcd_control.contains(LcdControl::SPRITE_DISPLAY_ENABLE) {
            self.draw_cgb_sprite_scanline();
        }
    }

    fn draw_cgb_bg_scanline(&mut self) {
        let scanline_to_be_rendered = self.current_y.wrapping_add(self.scroll_y);
        let tile_lower_bound = ((scanline_to_be_rendered / 8) as u16 * 32) + (self.scroll_x / 8) as u16;
        let mut tile_higher_bound = tile_lower_bound + 20;

        let tile_line_y = (scanline_to_be_rendered % 8) as usize;
        let mut pixels_drawn: i16 = 0;
        let mut pixels_to_skip = self.scroll_x % 8;
        if pixels_to_skip != 0 {
            tile_higher_bound += 1;
        }

        for mut i in tile_lower_bound..tile_higher_bound {
            // x-wraparound without leaving the current tile map row.
            if (self.scroll_x as u16 + pixels_drawn as u16) > 255 {
                i -= 32;
            }
            let map_index = i % BACKGROUND_TILE_SIZE as u16;
            let tile_index = self.get_tile_address_bg(map_index);
            let tile_attributes = self.get_tile_attributes_cgb_bg(map_index);

            self.draw_cgb_background_window_line(
                &mut pixels_drawn,
                &mut pixels_to_skip,
                tile_index,
                tile_line_y,
                tile_attributes,
            )
        }
    }

    fn draw_cgb_window_scanline(&mut self) {
        let window_x = (self.window_x as i16).wrapping_sub(7);
        if !self.window_triggered || window_x >= 160 {
            return;
        }

        let tile_lower_bound = ((self.window_counter / 8) as u16) * 32;
        let tile_higher_bound = tile_lower_bound + ((160 - window_x) as u16 + 7) / 8;

        let tile_line_y = (self.window_counter % 8) as usize;
        let (mut pixels_drawn, mut pixels_to_skip) = if window_x >= 0 {
            (window_x, 0)
        } else {
            (0, (-window_x) as u8)
        };

        self.window_drawn_this_line = true;

        for i in tile_lower_bound..tile_higher_bound {
            let tile_index = self.get_tile_address_window(i);
            let tile_attributes = self.get_tile_attributes_cgb_window(i);

            self.draw_cgb_background_window_line(
                &mut pixels_drawn,
                &mut pixels_to_skip,
                tile_index,
                tile_line_y,
                tile_attributes,
            );
        }
    }

    fn draw_cgb_sprite_scanline(&mut self) {
        let tall_sprites = self.lcd_control.contains(LcdControl::SPRITE_SIZE);
        let y_size: u8 = if tall_sprites { 16 } else { 8 };
        // With the master priority bit cleared sprites win over everything.
        let always_display_sprite = !self.lcd_control.contains(LcdControl::BG_WINDOW_PRIORITY);

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

        // The CGB resolves overlap purely by OAM position, so the earliest
        // entry must be drawn last.
        for sprite in sprites_on_line.iter().rev() {
            let screen_x_pos = sprite.x_pos as i16 - 8;
            let screen_y_pos = sprite.y_pos as i16 - 16;

            let x_flip = sprite.attribute_flags.contains(AttributeFlags::X_FLIP);
            let y_flip = sprite.attribute_flags.contains(AttributeFlags::Y_FLIP);
            let is_background_sprite = sprite.attribute_flags.contains(AttributeFlags::OBJ_TO_BG_PRIORITY);

            let mut line = (self.current_y as i16 - screen_y_pos) as u8;

            if y_flip {
                line = y_size - (line + 1);
            }

            let mut tile_index = sprite.tile_number as usize
                + (TILES_PER_BANK * sprite.attribute_flags.contains(AttributeFlags::TILE_VRAM_BANK) as usize);
            if tall_sprites {
                if line < 8 {
                    // The top half of a tall sprite ignores bit one.
                    tile_index &= !0x01;
                } else {
                    tile_index |= 0x01;
                }
            }

            let tile = self.tiles[tile_index];
            let tile_pixel_y = (line as usize % 8) * 8;
            let palette = self.cgb_sprite_palette[sprite.attribute_flags.get_cgb_palette_number()];

            for j in 0..=7 {
                let pixel = if x_flip {
                    screen_x_pos + j
                } else {
                    screen_x_pos + (7 - j)
                };

                if pixel < 0 || pixel > 159 {
                    continue;
                }

                if !always_display_sprite {
                    let (bg_colour, bg_priority) = self.scanline_buffer_unpalette[pixel as usize];
                    // The BG wins when either side claims priority, unless it
                    // shows colour 0.
                    if (is_background_sprite || bg_priority) && bg_colour != 0 {
                        continue;
                    }
                }

                let colour = tile.get_pixel(tile_pixel_y + j as usize);

                // Colour 0 is transparent for sprites.
                if colour != 0 {
                    self.scanline_buffer[pixel as usize] = palette.colour(colour);
                    self.scanline_buffer_unpalette[pixel as usize] = (colour, false);
                }
            }
        }
    }

    /// Draw a tile line in a way appropriate for both the window, as well as the background.
    /// `pixels_to_skip` will skip pixels so long as it's greater than 0
    fn draw_cgb_background_window_line(
        &mut self,
        pixels_drawn: &mut i16,
        pixels_to_skip: &mut u8,
        tile_index: u8,
        tile_line_y: usize,
        tile_attributes: CgbTileAttribute,
    ) {
        let bank_offset = TILES_PER_BANK * tile_attributes.contains(CgbTileAttribute::TILE_VRAM_BANK_NUMBER) as usize;
        // For the "8800 addressing" mode we need a 256 tile offset with
        // signed addressing on top.
        let tile_address = if self.lcd_control.contains(LcdControl::BG_WINDOW_TILE_SELECT) {
            tile_index as usize + bank_offset
        } else {
            (256_usize).wrapping_add((tile_index as i8) as usize) + bank_offset
        };

        let tile_pixel_y = if tile_attributes.contains(CgbTileAttribute::Y_FLIP) {
            (7 - tile_line_y) * 8
        } else {
            tile_line_y * 8
        };

        let x_flip = tile_attributes.contains(CgbTileAttribute::X_FLIP);
        let bg_priority = tile_attributes.contains(CgbTileAttribute::BG_TO_OAM_PRIORITY);
        let palette = self.cgb_bg_palette[tile_attributes.bg_palette_numb()];
        let tile = self.tiles[tile_address];

        for step in 0..8 {
            // We have to render a partial tile, so skip the first pixels_to_skip and render the rest.
            if *pixels_to_skip > 0 {
                *pixels_to_skip -= 1;
                continue;
            }
            // We've exceeded the amount we need to draw, no need to do anything more.
            if *pixels_drawn as usize >= RESOLUTION_WIDTH {
                break;
            }

            let j = if x_flip { tile_pixel_y + step } else { tile_pixel_y + 7 - step };
            let colour = tile.get_pixel(j);

            self.scanline_buffer[*pixels_drawn as usize] = palette.colour(colour);
            self.scanline_buffer_unpalette[*pixels_drawn as usize] = (colour, bg_priority);
            *pixels_drawn += 1;
        }
    }

    fn get_tile_attributes_cgb_bg(&self, address: u16) -> CgbTileAttribute {
        if !self.lcd_control.contains(LcdControl::BG_TILE_MAP_SELECT) {
            self.cgb_9800_tile_map.attributes[address as usize]
        } else {
            self.cgb_9c00_tile_map.attributes[address as usize]
        }
    }

    fn get_tile_attributes_cgb_window(&self, address: u16) -> CgbTileAttribute {
        if !self.lcd_control.contains(LcdControl::WINDOW_MAP_SELECT) {
            self.cgb_9800_tile_map.attributes[address as usize]
        } else {
            self.cgb_9c00_tile_map.attributes[address as usize]
        }
    }
}
