//! Builds small test cartridges with a valid header.

#![allow(dead_code)]

use gameboycore::cartridge::compute_header_checksum;

pub const CODE_START: u16 = 0x0150;

pub struct RomBuilder {
    rom: Vec<u8>,
}

impl RomBuilder {
    /// 32KB ROM-only cartridge whose entry point jumps to `CODE_START`
    pub fn new() -> Self {
        let mut rom = vec![0; 0x8000];
        rom[0x134..0x13C].copy_from_slice(b"TESTCART");
        // NOP; JP $0150
        rom[0x100..0x104].copy_from_slice(&[0x00, 0xC3, 0x50, 0x01]);
        Self { rom }
    }

    pub fn title(mut self, title: &[u8]) -> Self {
        self.rom[0x134..0x144].fill(0);
        self.rom[0x134..0x134 + title.len()].copy_from_slice(title);
        self
    }

    pub fn cart_type(mut self, cart_type: u8) -> Self {
        self.rom[0x147] = cart_type;
        self
    }

    /// Resize to `banks` 16KB banks and set the ROM size code
    pub fn rom_banks(mut self, banks: usize) -> Self {
        self.rom.resize(banks * 0x4000, 0);
        self.rom[0x148] = (banks / 2).trailing_zeros() as u8;
        self
    }

    pub fn ram_size_code(mut self, code: u8) -> Self {
        self.rom[0x149] = code;
        self
    }

    /// Place `code` at `CODE_START`
    pub fn code(self, code: &[u8]) -> Self {
        self.at(CODE_START as usize, code)
    }

    /// Place raw bytes at `addr`, e.g. an interrupt handler
    pub fn at(mut self, addr: usize, bytes: &[u8]) -> Self {
        self.rom[addr..addr + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.rom[0x14D] = compute_header_checksum(&self.rom);
        self.rom
    }
}

/// Enables V-Blank, clears IF, EI, then spins. V-Blank handler is RETI.
pub fn vblank_loop_rom() -> Vec<u8> {
    RomBuilder::new()
        .code(&[
            0x3E, 0x01, // LD A,$01
            0xE0, 0xFF, // LDH ($FF),A
            0xAF, // XOR A
            0xE0, 0x0F, // LDH ($0F),A
            0xFB, // EI
            0x18, 0xFE, // JR -2
        ])
        .at(0x40, &[0xD9]) // RETI
        .build()
}

/// Endlessly fills VRAM with an incrementing counter
pub fn vram_painter_rom() -> Vec<u8> {
    RomBuilder::new()
        .code(&[
            0x21, 0x00, 0x80, // LD HL,$8000
            0x3C, // loop: INC A
            0x22, // LD (HL+),A
            0xCB, 0x6C, // BIT 5,H
            0x28, 0x02, // JR Z,+2
            0x26, 0x80, // LD H,$80
            0x18, 0xF6, // JR loop
        ])
        .build()
}
