//! MBC5 (Memory Bank Controller 5)
//!
//! Up to 8MB ROM (9-bit bank number) and 128KB RAM. Unlike MBC1, bank 0 can
//! be mapped at 0x4000.
//!
//! # Register Map
//!
//! - 0x0000-0x1FFF: RAM Enable (low nibble 0x0A enables)
//! - 0x2000-0x2FFF: ROM Bank Number, low 8 bits
//! - 0x3000-0x3FFF: ROM Bank Number, bit 8
//! - 0x4000-0x5FFF: RAM Bank Number (0-15)

use serde::{Deserialize, Serialize};

use super::{ram_offset, rom_byte, BankController};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mbc5 {
    ram_enabled: bool,
    rom_bank: u16,
    ram_bank: u8,
}

impl Mbc5 {
    pub fn new() -> Self {
        Self {
            ram_enabled: false,
            rom_bank: 1,
            ram_bank: 0,
        }
    }
}

impl Default for Mbc5 {
    fn default() -> Self {
        Self::new()
    }
}

impl BankController for Mbc5 {
    fn read_rom(&self, rom: &[u8], addr: u16) -> u8 {
        let bank = if addr < 0x4000 { 0 } else { self.rom_bank() };
        rom_byte(rom, bank, addr)
    }

    fn write_control(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enabled = (val & 0x0F) == 0x0A,
            0x2000..=0x2FFF => self.rom_bank = (self.rom_bank & 0x100) | val as u16,
            0x3000..=0x3FFF => {
                self.rom_bank = (self.rom_bank & 0xFF) | (((val & 0x01) as u16) << 8)
            }
            0x4000..=0x5FFF => self.ram_bank = val & 0x0F,
            _ => {}
        }
    }

    fn read_ram(&self, ram: &[u8], addr: u16) -> u8 {
        if !self.ram_enabled {
            return 0xFF;
        }
        ram_offset(ram, self.ram_bank as usize, addr).map_or(0xFF, |i| ram[i])
    }

    fn write_ram(&mut self, ram: &mut [u8], addr: u16, val: u8) {
        if !self.ram_enabled {
            return;
        }
        if let Some(i) = ram_offset(ram, self.ram_bank as usize, addr) {
            ram[i] = val;
        }
    }

    fn ram_enabled(&self) -> bool {
        self.ram_enabled
    }

    fn rom_bank(&self) -> usize {
        self.rom_bank as usize
    }
}
