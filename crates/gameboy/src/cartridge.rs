//! Cartridge header parsing.
//!
//! The header lives at 0x0100-0x014F of every ROM:
//!
//! | Address     | Field                          |
//! |-------------|--------------------------------|
//! | 0x0134-0143 | Title (ASCII, zero padded)     |
//! | 0x0147      | Cartridge type (selects MBC)   |
//! | 0x0148      | ROM size code (32KB << n)      |
//! | 0x0149      | External RAM size code         |
//! | 0x014D      | Header checksum                |

use serde::{Deserialize, Serialize};

use crate::error::CartridgeError;
use crate::mappers::{Mapper, MBC2_RAM_SIZE};

pub const HEADER_END: usize = 0x150;

const TITLE: std::ops::Range<usize> = 0x134..0x144;
const CART_TYPE: usize = 0x147;
const ROM_SIZE: usize = 0x148;
const RAM_SIZE: usize = 0x149;
const HEADER_CHECKSUM: usize = 0x14D;

/// Parsed cartridge header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartInfo {
    pub title: String,
    pub cart_type: u8,
    pub mapper: String,
    pub rom_banks: usize,
    /// Cartridge RAM in bytes, including MBC2's built-in RAM
    pub ram_size: usize,
    pub battery: bool,
    pub header_checksum: u8,
    pub checksum_valid: bool,
}

impl CartInfo {
    /// Parse the header of `rom`. The returned mapper is in its power-on state.
    pub fn parse(rom: &[u8]) -> Result<(Self, Mapper), CartridgeError> {
        if rom.len() < HEADER_END {
            return Err(CartridgeError::TruncatedHeader { len: rom.len() });
        }

        let cart_type = rom[CART_TYPE];
        let mapper = Mapper::from_cart_type(cart_type)?;

        let rom_code = rom[ROM_SIZE];
        if rom_code > 0x08 {
            return Err(CartridgeError::InvalidRomSize(rom_code));
        }
        let rom_banks = 2usize << rom_code;

        let ram_size = if matches!(mapper, Mapper::Mbc2(_)) {
            MBC2_RAM_SIZE
        } else {
            ram_size_bytes(rom[RAM_SIZE])?
        };

        let title = rom[TITLE]
            .iter()
            .take_while(|&&b| b != 0)
            .filter(|b| b.is_ascii_graphic() || **b == b' ')
            .map(|&b| b as char)
            .collect::<String>()
            .trim_end()
            .to_string();

        let header_checksum = rom[HEADER_CHECKSUM];
        let info = CartInfo {
            title,
            cart_type,
            mapper: mapper.name().to_string(),
            rom_banks,
            ram_size,
            battery: matches!(cart_type, 0x03 | 0x06 | 0x09 | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E),
            header_checksum,
            checksum_valid: compute_header_checksum(rom) == header_checksum,
        };
        Ok((info, mapper))
    }
}

fn ram_size_bytes(code: u8) -> Result<usize, CartridgeError> {
    match code {
        0x00 => Ok(0),
        0x01 => Ok(0x800),
        0x02 => Ok(0x2000),
        0x03 => Ok(0x8000),
        0x04 => Ok(0x20000),
        0x05 => Ok(0x10000),
        other => Err(CartridgeError::InvalidRamSize(other)),
    }
}

/// The checksum the boot ROM verifies over 0x0134-0x014C
pub fn compute_header_checksum(rom: &[u8]) -> u8 {
    rom.get(0x134..=0x14C)
        .unwrap_or(&[])
        .iter()
        .fold(0u8, |x, &b| x.wrapping_sub(b).wrapping_sub(1))
}
