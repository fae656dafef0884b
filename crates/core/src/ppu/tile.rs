//! 2bpp planar tile decoding.
//!
//! Each 8x8 tile is stored in 16 bytes with interleaved bitplanes: byte
//! `2*y` holds the low bit of every pixel in row `y`, byte `2*y + 1` the
//! high bit. Bit 7 is the leftmost pixel.

/// Size of one tile in bytes
pub const TILE_BYTES: usize = 16;

/// Decode one tile row into eight colour indices (0-3), left to right.
pub fn decode_row(lo: u8, hi: u8) -> [u8; 8] {
    let mut row = [0u8; 8];
    for (x, px) in row.iter_mut().enumerate() {
        let bit = 7 - x;
        *px = (((hi >> bit) & 1) << 1) | ((lo >> bit) & 1);
    }
    row
}
