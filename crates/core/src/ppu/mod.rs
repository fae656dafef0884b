//! Reusable video building blocks: 2bpp tile decoding and shade palettes.
//!
//! The machine-specific LCD controller composes these into scanlines.

pub mod palette;
pub mod tile;

pub use palette::{IndexedPalette, ShadePalette};
pub use tile::{decode_row, TILE_BYTES};
