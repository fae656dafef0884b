//! MBC3 (Memory Bank Controller 3)
//!
//! Up to 2MB ROM and 32KB RAM, optionally with a real-time clock.
//!
//! # Register Map
//!
//! - 0x0000-0x1FFF: RAM and Timer Enable (low nibble 0x0A enables)
//! - 0x2000-0x3FFF: ROM Bank Number (7 bits, 0 reads as 1)
//! - 0x4000-0x5FFF: RAM Bank Number (0-3) or RTC Register Select (0x08-0x0C)
//! - 0x6000-0x7FFF: Latch Clock Data (write 0x00 then 0x01)
//!
//! The RTC registers are plain storage: writes land in the live registers,
//! a latch copies them to the readable set, and no wall clock advances them.

use serde::{Deserialize, Serialize};

use super::{ram_offset, rom_byte, BankController};
use gb_core::logging::{log, LogCategory, LogLevel};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mbc3 {
    ram_enabled: bool,
    rom_bank: u8,
    ram_select: u8,
    rtc: [u8; 5],
    rtc_latched: [u8; 5],
    latch_armed: bool,
}

impl Mbc3 {
    pub fn new() -> Self {
        Self {
            ram_enabled: false,
            rom_bank: 1,
            ram_select: 0,
            rtc: [0; 5],
            rtc_latched: [0; 5],
            latch_armed: false,
        }
    }

    fn rtc_index(&self) -> Option<usize> {
        match self.ram_select {
            0x08..=0x0C => Some((self.ram_select - 0x08) as usize),
            _ => None,
        }
    }
}

impl Default for Mbc3 {
    fn default() -> Self {
        Self::new()
    }
}

impl BankController for Mbc3 {
    fn read_rom(&self, rom: &[u8], addr: u16) -> u8 {
        let bank = if addr < 0x4000 { 0 } else { self.rom_bank() };
        rom_byte(rom, bank, addr)
    }

    fn write_control(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enabled = (val & 0x0F) == 0x0A,
            0x2000..=0x3FFF => self.rom_bank = val & 0x7F,
            0x4000..=0x5FFF => self.ram_select = val & 0x0F,
            0x6000..=0x7FFF => {
                if self.latch_armed && val == 0x01 {
                    self.rtc_latched = self.rtc;
                    log(LogCategory::Stubs, LogLevel::Trace, || {
                        "MBC3 RTC latched (clock does not advance)".to_string()
                    });
                }
                self.latch_armed = val == 0x00;
            }
            _ => {}
        }
    }

    fn read_ram(&self, ram: &[u8], addr: u16) -> u8 {
        if !self.ram_enabled {
            return 0xFF;
        }
        if let Some(reg) = self.rtc_index() {
            return self.rtc_latched[reg];
        }
        match self.ram_select {
            0x00..=0x03 => {
                ram_offset(ram, self.ram_select as usize, addr).map_or(0xFF, |i| ram[i])
            }
            _ => 0xFF,
        }
    }

    fn write_ram(&mut self, ram: &mut [u8], addr: u16, val: u8) {
        if !self.ram_enabled {
            return;
        }
        if let Some(reg) = self.rtc_index() {
            self.rtc[reg] = val;
            return;
        }
        if self.ram_select <= 0x03 {
            if let Some(i) = ram_offset(ram, self.ram_select as usize, addr) {
                ram[i] = val;
            }
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
