//! Game Boy Memory Bank Controllers (MBCs)
//!
//! A mapper only holds banking registers. The ROM image and cartridge RAM
//! are owned by the MMU and passed in on every access, so the mapper state
//! can be saved and restored on its own.
//!
//! | Cart type            | Mapper   |
//! |----------------------|----------|
//! | 0x00, 0x08, 0x09     | ROM only |
//! | 0x01-0x03            | MBC1     |
//! | 0x05-0x06            | MBC2     |
//! | 0x0F-0x13            | MBC3     |
//! | 0x19-0x1E            | MBC5     |

mod mbc1;
mod mbc2;
mod mbc3;
mod mbc5;
mod rom_only;

pub use mbc1::Mbc1;
pub use mbc2::{Mbc2, MBC2_RAM_SIZE};
pub use mbc3::Mbc3;
pub use mbc5::Mbc5;
pub use rom_only::RomOnly;

use serde::{Deserialize, Serialize};

use crate::error::CartridgeError;

pub const ROM_BANK_SIZE: usize = 0x4000;
pub const RAM_BANK_SIZE: usize = 0x2000;

/// Banking operations every cartridge controller provides.
///
/// `read_rom` covers 0x0000-0x7FFF, `write_control` receives writes to that
/// same range, and the RAM methods cover 0xA000-0xBFFF.
pub trait BankController {
    fn read_rom(&self, rom: &[u8], addr: u16) -> u8;
    fn write_control(&mut self, addr: u16, val: u8);
    fn read_ram(&self, ram: &[u8], addr: u16) -> u8;
    fn write_ram(&mut self, ram: &mut [u8], addr: u16, val: u8);
    fn ram_enabled(&self) -> bool;
    /// Bank currently mapped at 0x4000-0x7FFF (before wrapping to ROM size)
    fn rom_bank(&self) -> usize;
}

/// Read a byte from `bank`, wrapping the bank number to the ROM size.
pub(crate) fn rom_byte(rom: &[u8], bank: usize, addr: u16) -> u8 {
    let banks = rom.len().div_ceil(ROM_BANK_SIZE).max(1);
    let offset = (bank % banks) * ROM_BANK_SIZE + (addr as usize & (ROM_BANK_SIZE - 1));
    rom.get(offset).copied().unwrap_or(0xFF)
}

/// Offset of `addr` in cartridge RAM for `bank`, or None without RAM.
pub(crate) fn ram_offset(ram: &[u8], bank: usize, addr: u16) -> Option<usize> {
    if ram.is_empty() {
        return None;
    }
    let banks = ram.len().div_ceil(RAM_BANK_SIZE).max(1);
    let offset = (bank % banks) * RAM_BANK_SIZE + (addr as usize & (RAM_BANK_SIZE - 1));
    (offset < ram.len()).then_some(offset)
}

/// Unified mapper enum that dispatches to specific implementations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mapper {
    RomOnly(RomOnly),
    Mbc1(Mbc1),
    Mbc2(Mbc2),
    Mbc3(Mbc3),
    Mbc5(Mbc5),
}

impl Mapper {
    /// Select the controller declared by the header's cartridge type byte
    pub fn from_cart_type(cart_type: u8) -> Result<Self, CartridgeError> {
        match cart_type {
            0x00 | 0x08 | 0x09 => Ok(Mapper::RomOnly(RomOnly)),
            0x01..=0x03 => Ok(Mapper::Mbc1(Mbc1::new())),
            0x05 | 0x06 => Ok(Mapper::Mbc2(Mbc2::new())),
            0x0F..=0x13 => Ok(Mapper::Mbc3(Mbc3::new())),
            0x19..=0x1E => Ok(Mapper::Mbc5(Mbc5::new())),
            other => Err(CartridgeError::UnsupportedMapper(other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mapper::RomOnly(_) => "ROM ONLY",
            Mapper::Mbc1(_) => "MBC1",
            Mapper::Mbc2(_) => "MBC2",
            Mapper::Mbc3(_) => "MBC3",
            Mapper::Mbc5(_) => "MBC5",
        }
    }

    fn controller(&self) -> &dyn BankController {
        match self {
            Mapper::RomOnly(m) => m,
            Mapper::Mbc1(m) => m,
            Mapper::Mbc2(m) => m,
            Mapper::Mbc3(m) => m,
            Mapper::Mbc5(m) => m,
        }
    }

    fn controller_mut(&mut self) -> &mut dyn BankController {
        match self {
            Mapper::RomOnly(m) => m,
            Mapper::Mbc1(m) => m,
            Mapper::Mbc2(m) => m,
            Mapper::Mbc3(m) => m,
            Mapper::Mbc5(m) => m,
        }
    }
}

impl BankController for Mapper {
    fn read_rom(&self, rom: &[u8], addr: u16) -> u8 {
        self.controller().read_rom(rom, addr)
    }

    fn write_control(&mut self, addr: u16, val: u8) {
        self.controller_mut().write_control(addr, val)
    }

    fn read_ram(&self, ram: &[u8], addr: u16) -> u8 {
        self.controller().read_ram(ram, addr)
    }

    fn write_ram(&mut self, ram: &mut [u8], addr: u16, val: u8) {
        self.controller_mut().write_ram(ram, addr, val)
    }

    fn ram_enabled(&self) -> bool {
        self.controller().ram_enabled()
    }

    fn rom_bank(&self) -> usize {
        self.controller().rom_bank()
    }
}
