//! MBC1 (Memory Bank Controller 1)
//!
//! The most common Game Boy mapper. Supports up to 2MB ROM and 32KB RAM.
//!
//! # Banking Modes
//!
//! - Mode 0 (default): bank 0 fixed at 0x0000, RAM bank 0 only
//! - Mode 1: the 2-bit upper register also selects bank 0/32/64/96 at
//!   0x0000 and the RAM bank
//!
//! In both modes the upper register supplies bits 5-6 of the bank mapped at
//! 0x4000.
//!
//! # Register Map
//!
//! - 0x0000-0x1FFF: RAM Enable (low nibble 0x0A enables)
//! - 0x2000-0x3FFF: ROM Bank Number (lower 5 bits, 0 reads as 1)
//! - 0x4000-0x5FFF: RAM Bank Number / ROM Bank Number (upper 2 bits)
//! - 0x6000-0x7FFF: Banking Mode Select

use serde::{Deserialize, Serialize};

use super::{ram_offset, rom_byte, BankController};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mbc1 {
    ram_enabled: bool,
    rom_bank: u8,
    upper: u8,
    mode: u8,
}

impl Mbc1 {
    pub fn new() -> Self {
        Self {
            ram_enabled: false,
            rom_bank: 1,
            upper: 0,
            mode: 0,
        }
    }

    fn lower_bank(&self) -> usize {
        if self.mode == 1 {
            (self.upper as usize) << 5
        } else {
            0
        }
    }

    fn ram_bank(&self) -> usize {
        if self.mode == 1 {
            self.upper as usize
        } else {
            0
        }
    }
}

impl Default for Mbc1 {
    fn default() -> Self {
        Self::new()
    }
}

impl BankController for Mbc1 {
    fn read_rom(&self, rom: &[u8], addr: u16) -> u8 {
        let bank = if addr < 0x4000 {
            self.lower_bank()
        } else {
            self.rom_bank()
        };
        rom_byte(rom, bank, addr)
    }

    fn write_control(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enabled = (val & 0x0F) == 0x0A,
            0x2000..=0x3FFF => self.rom_bank = val & 0x1F,
            0x4000..=0x5FFF => self.upper = val & 0x03,
            0x6000..=0x7FFF => self.mode = val & 0x01,
            _ => {}
        }
    }

    fn read_ram(&self, ram: &[u8], addr: u16) -> u8 {
        if !self.ram_enabled {
            return 0xFF;
        }
        ram_offset(ram, self.ram_bank(), addr).map_or(0xFF, |i| ram[i])
    }

    fn write_ram(&mut self, ram: &mut [u8], addr: u16, val: u8) {
        if !self.ram_enabled {
            return;
        }
        if let Some(i) = ram_offset(ram, self.ram_bank(), addr) {
            ram[i] = val;
        }
    }

    fn ram_enabled(&self) -> bool {
        self.ram_enabled
    }

    fn rom_bank(&self) -> usize {
        let low = match self.rom_bank & 0x1F {
            0 => 1,
            n => n as usize,
        };
        low | ((self.upper as usize) << 5)
    }
}
