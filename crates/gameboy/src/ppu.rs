//! Game Boy scanline renderer
//!
//! Composes one 160-pixel row from VRAM, OAM and the LCD registers: the
//! background layer, the window on top of it, then up to ten sprites.
//! Timing lives in [`crate::lcd`]; this module only draws.

use gb_core::ppu::{decode_row, IndexedPalette, ShadePalette, TILE_BYTES};

use crate::callbacks::{Scanline, SCREEN_WIDTH};
use crate::io;
use crate::mmu::Mmu;

// LCDC bits
pub const LCDC_ENABLE: u8 = 0x80;
const LCDC_WIN_TILEMAP: u8 = 0x40;
const LCDC_WIN_ENABLE: u8 = 0x20;
const LCDC_BG_WIN_TILES: u8 = 0x10;
const LCDC_BG_TILEMAP: u8 = 0x08;
const LCDC_OBJ_SIZE: u8 = 0x04;
const LCDC_OBJ_ENABLE: u8 = 0x02;
const LCDC_BG_WIN_ENABLE: u8 = 0x01;

// OAM attribute bits
const ATTR_BEHIND_BG: u8 = 0x80;
const ATTR_FLIP_Y: u8 = 0x40;
const ATTR_FLIP_X: u8 = 0x20;
const ATTR_PALETTE: u8 = 0x10;

const MAX_SPRITES_PER_LINE: usize = 10;
const SPRITE_COUNT: usize = 40;

/// A blank row in the theme's lightest shade
pub fn blank_line(palette: &ShadePalette) -> Scanline {
    [palette.get_color(0); SCREEN_WIDTH]
}

#[derive(Debug, Clone, Copy)]
struct Sprite {
    y: i16,
    x: i16,
    tile: u8,
    attr: u8,
}

/// Offset into VRAM of a BG/window tile, honouring LCDC.4 addressing.
fn tile_offset(lcdc: u8, tile_index: u8) -> usize {
    if lcdc & LCDC_BG_WIN_TILES != 0 {
        tile_index as usize * TILE_BYTES
    } else {
        // $8800 mode: index is signed around $9000
        (0x1000 + tile_index as i8 as i32 * TILE_BYTES as i32) as usize
    }
}

/// Colour indices of one 8-pixel tile row fetched from a tile map.
fn map_row(vram: &[u8], lcdc: u8, map_base: usize, map_x: u8, map_y: u8) -> [u8; 8] {
    let entry = map_base + (map_y as usize / 8) * 32 + map_x as usize / 8;
    let addr = tile_offset(lcdc, vram[entry]) + (map_y as usize % 8) * 2;
    decode_row(vram[addr], vram[addr + 1])
}

/// Render line `ly` into `out`.
///
/// `window_line` is the window's internal line counter; it advances only on
/// lines where the window was actually drawn and must be cleared at the start
/// of each frame.
pub fn render_scanline(
    mmu: &Mmu,
    ly: u8,
    window_line: &mut u8,
    palette: &ShadePalette,
    out: &mut Scanline,
) {
    let lcdc = mmu.reg(io::LCDC);
    if lcdc & LCDC_ENABLE == 0 {
        *out = blank_line(palette);
        return;
    }

    let vram = mmu.vram();
    let bgp = mmu.reg(io::BGP);
    // Raw BG/window colour index per pixel, for sprite priority
    let mut bg_index = [0u8; SCREEN_WIDTH];

    if lcdc & LCDC_BG_WIN_ENABLE != 0 {
        let scx = mmu.reg(io::SCX);
        let map_y = ly.wrapping_add(mmu.reg(io::SCY));
        let map_base = if lcdc & LCDC_BG_TILEMAP != 0 { 0x1C00 } else { 0x1800 };

        let mut x = 0usize;
        while x < SCREEN_WIDTH {
            let map_x = (x as u8).wrapping_add(scx);
            let row = map_row(vram, lcdc, map_base, map_x, map_y);
            let start = (map_x % 8) as usize;
            for &px in &row[start..] {
                if x >= SCREEN_WIDTH {
                    break;
                }
                bg_index[x] = px;
                x += 1;
            }
        }

        let wy = mmu.reg(io::WY);
        let wx = mmu.reg(io::WX);
        if lcdc & LCDC_WIN_ENABLE != 0 && ly >= wy && wx <= 166 {
            let map_base = if lcdc & LCDC_WIN_TILEMAP != 0 { 0x1C00 } else { 0x1800 };
            let left = wx as i16 - 7;
            let wline = *window_line;
            for screen_x in left.max(0) as usize..SCREEN_WIDTH {
                let win_x = (screen_x as i16 - left) as u8;
                let row = map_row(vram, lcdc, map_base, win_x, wline);
                bg_index[screen_x] = row[(win_x % 8) as usize];
            }
            *window_line = window_line.wrapping_add(1);
        }

        for (px, &idx) in out.iter_mut().zip(bg_index.iter()) {
            *px = palette.map(bgp, idx);
        }
    } else {
        *out = blank_line(palette);
    }

    if lcdc & LCDC_OBJ_ENABLE != 0 {
        render_sprites(mmu, lcdc, ly, &bg_index, palette, out);
    }
}

fn render_sprites(
    mmu: &Mmu,
    lcdc: u8,
    ly: u8,
    bg_index: &[u8; SCREEN_WIDTH],
    palette: &ShadePalette,
    out: &mut Scanline,
) {
    let height: i16 = if lcdc & LCDC_OBJ_SIZE != 0 { 16 } else { 8 };
    let oam = mmu.oam();
    let vram = mmu.vram();
    let line = ly as i16;

    // OAM scan: first ten sprites overlapping this line, in OAM order
    let mut sprites: Vec<Sprite> = oam
        .chunks_exact(4)
        .take(SPRITE_COUNT)
        .map(|e| Sprite {
            y: e[0] as i16 - 16,
            x: e[1] as i16 - 8,
            tile: e[2],
            attr: e[3],
        })
        .filter(|s| line >= s.y && line < s.y + height)
        .take(MAX_SPRITES_PER_LINE)
        .collect();

    // Lower X wins; ties go to the earlier OAM entry (stable sort)
    sprites.sort_by_key(|s| s.x);

    let mut claimed = [false; SCREEN_WIDTH];
    for sprite in &sprites {
        let mut row_y = (line - sprite.y) as u8;
        if sprite.attr & ATTR_FLIP_Y != 0 {
            row_y = (height as u8 - 1) - row_y;
        }
        let tile = if height == 16 { sprite.tile & 0xFE } else { sprite.tile };
        let addr = tile as usize * TILE_BYTES + row_y as usize * 2;
        let row = decode_row(vram[addr], vram[addr + 1]);
        let obp = if sprite.attr & ATTR_PALETTE != 0 {
            mmu.reg(io::OBP1)
        } else {
            mmu.reg(io::OBP0)
        };

        for col in 0..8i16 {
            let screen_x = sprite.x + col;
            if !(0..SCREEN_WIDTH as i16).contains(&screen_x) {
                continue;
            }
            let sx = screen_x as usize;
            if claimed[sx] {
                continue;
            }
            let px = if sprite.attr & ATTR_FLIP_X != 0 {
                row[7 - col as usize]
            } else {
                row[col as usize]
            };
            // Colour 0 is transparent
            if px == 0 {
                continue;
            }
            // An opaque pixel hides lower-priority sprites even when the
            // background wins
            claimed[sx] = true;
            if sprite.attr & ATTR_BEHIND_BG != 0 && bg_index[sx] != 0 {
                continue;
            }
            out[sx] = palette.map(obp, px);
        }
    }
}
