use arrayvec::ArrayVec;

use crate::ppu::{LcdControl, Ppu};
use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

const TILE_MAP_BASE_0: u16 = 0x9800;
const TILE_MAP_BASE_1: u16 = 0x9c00;
const TILES_PER_ROW: u16 = 32;

// ARGB8888 for the four DMG shades
const SHADES: [u32; 4] = [0xffff_ffff, 0xffaa_aaaa, 0xff55_5555, 0xff00_0000];

const MODE_3_WINDOW_PENALTY: u16 = 6;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ObjectFlags: u8 {
        const BG_PRIORITY = 1 << 7;
        const FLIP_Y = 1 << 6;
        const FLIP_X = 1 << 5;
        const PALETTE = 1 << 4;
    }
}

#[derive(Clone, Copy)]
struct Object {
    y: u8,
    x: u8,
    tile: u8,
    flags: ObjectFlags,
}

impl From<[u8; 4]> for Object {
    fn from([y, x, tile, flags]: [u8; 4]) -> Self {
        Self {
            y,
            x,
            tile,
            flags: ObjectFlags::from_bits_retain(flags),
        }
    }
}

fn shade(palette: u8, color_index: u8) -> u32 {
    SHADES[usize::from(palette >> (color_index * 2) & 0b11)]
}

impl Ppu {
    fn tile_row(&self, tile: u8, row: u8, signed_addressing: bool) -> [u8; 2] {
        let base = if signed_addressing {
            (0x1000i32 + i32::from(tile.cast_signed()) * 16) as usize
        } else {
            usize::from(tile) * 16
        };
        let offset = base + usize::from(row) * 2;
        [self.vram[offset], self.vram[offset + 1]]
    }

    fn tile_row_color(&self, row: [u8; 2], column: u8) -> u8 {
        let bit = 7 - column;
        (row[0] >> bit & 1) | (row[1] >> bit & 1) << 1
    }

    /// Whole line at once, at the moment mode 3 begins. The per-pixel math
    /// matches the hardware fetcher; only the timing is collapsed.
    pub(crate) fn render_scanline(&mut self) {
        let y = self.scanline;
        if y >= SCREEN_HEIGHT {
            return;
        }
        let mut background_indexes = [0u8; SCREEN_WIDTH as usize];
        self.render_background_line(y, &mut background_indexes);
        self.render_object_line(y, &background_indexes);
    }

    fn render_background_line(
        &mut self,
        y: u8,
        background_indexes: &mut [u8; SCREEN_WIDTH as usize],
    ) {
        let row_base = usize::from(y) * usize::from(SCREEN_WIDTH);

        if !self.lcdc.contains(LcdControl::BG_ENABLE) {
            // background layer forced to white, which also unblocks sprites
            for x in 0..usize::from(SCREEN_WIDTH) {
                self.screen.pixels[row_base + x] = shade(self.bgp, 0);
            }
            return;
        }

        let window_on_line = self.lcdc.contains(LcdControl::WINDOW_ENABLE) && y >= self.wy;
        if window_on_line && self.wx < 167 {
            self.mode_3_penalty += MODE_3_WINDOW_PENALTY;
            self.window_line += 1;
        }
        let window_y = self.window_line.wrapping_sub(1);

        let background_y = y.wrapping_add(self.scy);
        let signed_addressing = !self.lcdc.contains(LcdControl::TILE_DATA);

        for x in 0..u16::from(SCREEN_WIDTH) {
            let (map_x, map_y, map_base) = if window_on_line && x + 7 >= u16::from(self.wx) {
                let window_x = (x + 7 - u16::from(self.wx)) as u8;
                let base = if self.lcdc.contains(LcdControl::WINDOW_TILE_MAP) {
                    TILE_MAP_BASE_1
                } else {
                    TILE_MAP_BASE_0
                };
                (window_x, window_y, base)
            } else {
                let base = if self.lcdc.contains(LcdControl::BG_TILE_MAP) {
                    TILE_MAP_BASE_1
                } else {
                    TILE_MAP_BASE_0
                };
                ((x as u8).wrapping_add(self.scx), background_y, base)
            };

            let map_address =
                map_base + u16::from(map_y / 8) * TILES_PER_ROW + u16::from(map_x / 8);
            let tile = self.vram[usize::from(map_address - 0x8000)];
            let row = self.tile_row(tile, map_y % 8, signed_addressing);
            let color_index = self.tile_row_color(row, map_x % 8);

            background_indexes[usize::from(x)] = color_index;
            self.screen.pixels[row_base + usize::from(x)] = shade(self.bgp, color_index);
        }
    }

    /// First ten sprites in OAM order covering the line; drawing priority is
    /// then ascending x with OAM order as the stable tie break.
    fn visible_objects(&self, y: u8) -> ArrayVec<Object, 10> {
        let height = if self.lcdc.contains(LcdControl::OBJ_SIZE) {
            16
        } else {
            8
        };

        let mut objects: ArrayVec<(usize, Object), 10> = ArrayVec::new();
        for (index, entry) in self.oam.chunks_exact(4).enumerate() {
            let object = Object::from(<[u8; 4]>::try_from(entry).unwrap());
            let top = i16::from(object.y) - 16;
            if (top..top + height).contains(&i16::from(y)) {
                objects.push((index, object));
                if objects.is_full() {
                    break;
                }
            }
        }

        // https://gbdev.io/pandocs/OAM.html#drawing-priority
        // Citation: the smaller the X coordinate, the higher the priority.
        // When X coordinates are identical, the object located first in OAM
        // has higher priority.
        objects.sort_unstable_by_key(|(index, object)| (object.x, *index));
        objects.into_iter().map(|(_, object)| object).collect()
    }

    // Per-line fetcher stall: 6 t-cycles per sprite plus up to 5 for its
    // fine-x phase, bucketed per tile column, rounded down to whole m-cycles.
    fn object_penalty(objects: &[Object], scx: u8) -> u16 {
        let scx = u16::from(scx) & 7;
        let mut bucket_penalty = [0u16; 21];
        let mut total = scx;

        for object in objects {
            if object.x >= 168 {
                continue;
            }
            let mut x = u16::from(object.x);
            if x == 0 {
                x += scx;
            }
            let bucket = usize::from(x >> 3);
            bucket_penalty[bucket] = bucket_penalty[bucket].max(5u16.saturating_sub(x & 7));
            total += 6;
        }

        total += bucket_penalty.iter().sum::<u16>();
        total >> 2 << 2
    }

    fn render_object_line(&mut self, y: u8, background_indexes: &[u8; SCREEN_WIDTH as usize]) {
        if !self.lcdc.contains(LcdControl::OBJ_ENABLE) {
            return;
        }

        let tall = self.lcdc.contains(LcdControl::OBJ_SIZE);
        let objects = self.visible_objects(y);
        self.mode_3_penalty += Self::object_penalty(&objects, self.scx);

        let row_base = usize::from(y) * usize::from(SCREEN_WIDTH);

        for x in 0..i16::from(SCREEN_WIDTH) {
            for object in &objects {
                let left = i16::from(object.x) - 8;
                if x < left || x >= left + 8 {
                    continue;
                }

                let mut pixel_x = (x - left) as u8;
                let mut pixel_y = (i16::from(y) - (i16::from(object.y) - 16)) as u8;
                if object.flags.contains(ObjectFlags::FLIP_X) {
                    pixel_x = 7 - pixel_x;
                }
                if object.flags.contains(ObjectFlags::FLIP_Y) {
                    pixel_y = if tall { 15 } else { 7 } - pixel_y;
                }

                let mut tile = object.tile;
                if tall {
                    // bit 0 is ignored, the pair of tiles is consecutive
                    tile &= 0xfe;
                    if pixel_y >= 8 {
                        tile |= 0x01;
                        pixel_y -= 8;
                    }
                }

                let row = self.tile_row(tile, pixel_y, false);
                let color_index = self.tile_row_color(row, pixel_x);
                if color_index == 0 {
                    // transparent, the next sprite gets its chance
                    continue;
                }

                let behind_background = object.flags.contains(ObjectFlags::BG_PRIORITY)
                    && background_indexes[usize::try_from(x).unwrap()] != 0;
                if !behind_background {
                    let palette = if object.flags.contains(ObjectFlags::PALETTE) {
                        self.obp1
                    } else {
                        self.obp0
                    };
                    self.screen.pixels[row_base + usize::try_from(x).unwrap()] =
                        shade(palette, color_index);
                }
                break;
            }
        }
    }
}
