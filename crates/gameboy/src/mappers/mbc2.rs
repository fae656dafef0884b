//! MBC2 (Memory Bank Controller 2)
//!
//! Up to 256KB ROM (16 banks) and 512×4 bits of RAM inside the controller.
//! The MMU allocates [`MBC2_RAM_SIZE`] bytes of cartridge RAM for it since
//! the header declares no external RAM.
//!
//! # Register Map (0x0000-0x3FFF)
//!
//! Address bit 8 selects the register:
//! - bit 8 = 0: RAM Enable (low nibble 0x0A enables)
//! - bit 8 = 1: ROM Bank Select (low 4 bits, 0 reads as 1)
//!
//! RAM at 0xA000-0xA1FF is mirrored through 0xBFFF; only the low nibble is
//! stored and the upper nibble reads as 1s.

use serde::{Deserialize, Serialize};

use super::{rom_byte, BankController};

pub const MBC2_RAM_SIZE: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mbc2 {
    ram_enabled: bool,
    rom_bank: u8,
}

impl Mbc2 {
    pub fn new() -> Self {
        Self {
            ram_enabled: false,
            rom_bank: 1,
        }
    }
}

impl Default for Mbc2 {
    fn default() -> Self {
        Self::new()
    }
}

impl BankController for Mbc2 {
    fn read_rom(&self, rom: &[u8], addr: u16) -> u8 {
        let bank = if addr < 0x4000 { 0 } else { self.rom_bank() };
        rom_byte(rom, bank, addr)
    }

    fn write_control(&mut self, addr: u16, val: u8) {
        if addr >= 0x4000 {
            return;
        }
        if addr & 0x0100 == 0 {
            self.ram_enabled = (val & 0x0F) == 0x0A;
        } else {
            self.rom_bank = val & 0x0F;
        }
    }

    fn read_ram(&self, ram: &[u8], addr: u16) -> u8 {
        if !self.ram_enabled {
            return 0xFF;
        }
        let offset = (addr & 0x01FF) as usize;
        ram.get(offset).map_or(0xFF, |v| v | 0xF0)
    }

    fn write_ram(&mut self, ram: &mut [u8], addr: u16, val: u8) {
        if !self.ram_enabled {
            return;
        }
        let offset = (addr & 0x01FF) as usize;
        if let Some(cell) = ram.get_mut(offset) {
            *cell = val & 0x0F;
        }
    }

    fn ram_enabled(&self) -> bool {
        self.ram_enabled
    }

    fn rom_bank(&self) -> usize {
        match self.rom_bank {
            0 => 1,
            n => n as usize,
        }
    }
}
