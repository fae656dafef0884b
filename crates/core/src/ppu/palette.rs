//! Indexed palettes for monochrome LCD output.
//!
//! The DMG has four shades. A palette register (BGP, OBP0, OBP1) maps each
//! 2-bit colour index to one of those shades, two bits per index with index 0
//! in bits 1-0. The shades themselves are host colours chosen by a theme.

/// Maps color indices to 32-bit ARGB colors (0xAARRGGBB).
pub trait IndexedPalette {
    /// Get the ARGB color for a palette index.
    fn get_color(&self, index: usize) -> u32;

    /// Get the number of colors in this palette.
    fn len(&self) -> usize;

    /// Check if the palette is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The four host colours used for shades 0 (lightest) to 3 (darkest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadePalette {
    shades: [u32; 4],
}

impl ShadePalette {
    pub const fn new(shades: [u32; 4]) -> Self {
        Self { shades }
    }

    /// Build from (r, g, b) triples.
    pub const fn from_rgb(rgb: [(u8, u8, u8); 4]) -> Self {
        let mut shades = [0u32; 4];
        let mut i = 0;
        while i < 4 {
            let (r, g, b) = rgb[i];
            shades[i] = 0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32;
            i += 1;
        }
        Self { shades }
    }

    /// Resolve a 2-bit colour index through a palette register.
    pub fn map(&self, register: u8, index: u8) -> u32 {
        let shade = (register >> ((index & 0x03) * 2)) & 0x03;
        self.shades[shade as usize]
    }

    pub fn shades(&self) -> &[u32; 4] {
        &self.shades
    }
}

impl IndexedPalette for ShadePalette {
    fn get_color(&self, index: usize) -> u32 {
        self.shades.get(index).copied().unwrap_or(0xFF00_0000)
    }

    fn len(&self) -> usize {
        self.shades.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREYS: ShadePalette =
        ShadePalette::new([0xFFFFFFFF, 0xFFAAAAAA, 0xFF555555, 0xFF000000]);

    #[test]
    fn test_from_rgb_packs_argb() {
        let p = ShadePalette::from_rgb([(0x12, 0x34, 0x56), (0, 0, 0), (0, 0, 0), (0xFF, 0, 0)]);
        assert_eq!(p.get_color(0), 0xFF123456);
        assert_eq!(p.get_color(3), 0xFFFF0000);
    }

    #[test]
    fn test_identity_register() {
        // 0xE4 = 11 10 01 00: index n -> shade n
        for i in 0..4 {
            assert_eq!(GREYS.map(0xE4, i), GREYS.shades()[i as usize]);
        }
    }

    #[test]
    fn test_inverted_register() {
        // 0x1B = 00 01 10 11: index n -> shade 3-n
        assert_eq!(GREYS.map(0x1B, 0), 0xFF000000);
        assert_eq!(GREYS.map(0x1B, 3), 0xFFFFFFFF);
    }

    #[test]
    fn test_out_of_bounds_is_black() {
        assert_eq!(GREYS.get_color(10), 0xFF000000);
        assert_eq!(GREYS.len(), 4);
        assert!(!GREYS.is_empty());
    }
}
