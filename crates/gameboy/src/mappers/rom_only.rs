//! 32KB cartridges without a bank controller, optionally with 8KB RAM.

use serde::{Deserialize, Serialize};

use super::{ram_offset, BankController};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomOnly;

impl BankController for RomOnly {
    fn read_rom(&self, rom: &[u8], addr: u16) -> u8 {
        rom.get((addr & 0x7FFF) as usize).copied().unwrap_or(0xFF)
    }

    fn write_control(&mut self, _addr: u16, _val: u8) {}

    fn read_ram(&self, ram: &[u8], addr: u16) -> u8 {
        ram_offset(ram, 0, addr).map_or(0xFF, |i| ram[i])
    }

    fn write_ram(&mut self, ram: &mut [u8], addr: u16, val: u8) {
        if let Some(i) = ram_offset(ram, 0, addr) {
            ram[i] = val;
        }
    }

    fn ram_enabled(&self) -> bool {
        true
    }

    fn rom_bank(&self) -> usize {
        1
    }
}
