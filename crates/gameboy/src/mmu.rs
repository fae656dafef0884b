//! Game Boy memory map
//!
//! The MMU owns every byte of addressable storage and the cartridge banking
//! state. All other components reach memory and I/O registers through it.
//!
//! # Memory Map
//!
//! | Address Range | Size  | Description                       |
//! |---------------|-------|-----------------------------------|
//! | 0x0000-0x3FFF | 16KB  | ROM Bank 0 (mapper may remap)     |
//! | 0x4000-0x7FFF | 16KB  | ROM Bank 1-N (switchable)         |
//! | 0x8000-0x9FFF | 8KB   | VRAM                              |
//! | 0xA000-0xBFFF | 8KB   | External RAM (cartridge)          |
//! | 0xC000-0xDFFF | 8KB   | Work RAM                          |
//! | 0xE000-0xFDFF | 7.5KB | Echo RAM (mirror of C000-DDFF)    |
//! | 0xFE00-0xFE9F | 160B  | OAM (Object Attribute Memory)     |
//! | 0xFEA0-0xFEFF | 96B   | Unusable                          |
//! | 0xFF00-0xFF7F | 128B  | I/O Registers                     |
//! | 0xFF80-0xFFFE | 127B  | High RAM (HRAM)                   |
//! | 0xFFFF        | 1B    | Interrupt Enable Register         |
//!
//! Unmapped and unusable addresses read 0xFF and ignore writes.
//!
//! # Register ownership
//!
//! I/O registers are stored once, in `io`. [`Mmu::reg`] and
//! [`Mmu::reg_mut`] give the LCD controller, timer, APU and link direct
//! access to that storage without the masks and side effects of the bus
//! path. Each register has one hardware-side writer:
//!
//! - LCD controller: LY, STAT mode and coincidence bits
//! - Timer: DIV, TIMA
//! - APU: NR52 channel status bits
//! - Link: SB, SC transfer bit
//! - Any component: IF, through [`Mmu::request_interrupt`]
//!
//! Writes with side effects handled here: DIV reset, DMA (an immediate
//! 160-byte copy into OAM), STAT (only bits 3-6 writable), LY (read-only),
//! and the sound registers, which are queued for the APU and ignored while
//! the APU is powered off.

use serde::{Deserialize, Serialize};

use gb_core::cpu_lr35902::{Interrupt, MemoryLr35902};
use gb_core::logging::{log, LogCategory, LogLevel};

use crate::io;
use crate::joypad::{Joypad, Key};
use crate::mappers::{BankController, Mapper};

const VRAM_SIZE: usize = 0x2000;
const WRAM_SIZE: usize = 0x2000;
const OAM_SIZE: usize = 0xA0;
const IO_SIZE: usize = 0x80;
const HRAM_SIZE: usize = 0x7F;

/// Value read from unmapped addresses
pub const OPEN_BUS: u8 = 0xFF;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mmu {
    /// Immutable ROM image, supplied at load and never saved
    #[serde(skip)]
    rom: Vec<u8>,
    mapper: Mapper,
    cart_ram: Vec<u8>,
    vram: Vec<u8>,
    wram: Vec<u8>,
    oam: Vec<u8>,
    hram: Vec<u8>,
    io: Vec<u8>,
    ie: u8,
    joypad: Joypad,
    /// Sound register writes not yet seen by the APU
    apu_writes: Vec<(u16, u8)>,
    /// Set by a DIV write, cleared by the timer
    div_reset: bool,
}

impl Mmu {
    pub fn new(rom: Vec<u8>, mapper: Mapper, ram_size: usize) -> Self {
        let mut mmu = Self {
            rom,
            mapper,
            cart_ram: vec![0; ram_size],
            vram: vec![0; VRAM_SIZE],
            wram: vec![0; WRAM_SIZE],
            oam: vec![0; OAM_SIZE],
            hram: vec![0; HRAM_SIZE],
            io: vec![0; IO_SIZE],
            ie: 0,
            joypad: Joypad::new(),
            apu_writes: Vec::new(),
            div_reset: false,
        };
        mmu.reset_io();
        mmu
    }

    /// Restore I/O registers to their post-boot values and drop pending
    /// side effects. Memory contents and banking state are untouched.
    pub fn reset_io(&mut self) {
        self.io.fill(0);
        for &(addr, val) in io::POST_BOOT {
            self.io[Self::io_index(addr)] = val;
        }
        self.ie = 0;
        self.joypad.write(self.io[Self::io_index(io::P1)]);
        self.apu_writes.clear();
        self.div_reset = false;
    }

    fn io_index(addr: u16) -> usize {
        (addr as usize - 0xFF00) & (IO_SIZE - 1)
    }

    /// Read a byte through the bus
    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => self.mapper.read_rom(&self.rom, addr),
            0x8000..=0x9FFF => self.vram[(addr - 0x8000) as usize],
            0xA000..=0xBFFF => self.mapper.read_ram(&self.cart_ram, addr),
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize],
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize],
            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize],
            0xFEA0..=0xFEFF => OPEN_BUS,
            io::P1 => self.joypad.read(),
            0xFF01..=0xFF7F => self.io[Self::io_index(addr)] | io::read_mask(addr),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.ie,
        }
    }

    /// Write a byte through the bus
    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF => self.mapper.write_control(addr, val),
            0x8000..=0x9FFF => self.vram[(addr - 0x8000) as usize] = val,
            0xA000..=0xBFFF => self.mapper.write_ram(&mut self.cart_ram, addr, val),
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize] = val,
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize] = val,
            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize] = val,
            0xFEA0..=0xFEFF => {
                log(LogCategory::Bus, LogLevel::Trace, || {
                    format!("write {:02X} to unusable {:04X}", val, addr)
                });
            }
            0xFF00..=0xFF7F => self.write_io(addr, val),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.ie = val,
        }
    }

    fn write_io(&mut self, addr: u16, val: u8) {
        let idx = Self::io_index(addr);
        match addr {
            io::P1 => {
                self.joypad.write(val);
                self.io[idx] = val & 0x30;
            }
            io::DIV => {
                self.io[idx] = 0;
                self.div_reset = true;
            }
            io::IF => self.io[idx] = val & 0x1F,
            io::NR52 => {
                self.io[idx] = (val & 0x80) | (self.io[idx] & 0x0F);
                self.apu_writes.push((addr, val));
            }
            io::NR10..=0xFF25 => {
                if !self.apu_powered() {
                    log(LogCategory::Apu, LogLevel::Trace, || {
                        format!("write {:02X} to {:04X} while APU is off", val, addr)
                    });
                    return;
                }
                self.io[idx] = val;
                self.apu_writes.push((addr, val));
            }
            io::STAT => self.io[idx] = (val & 0x78) | (self.io[idx] & 0x07),
            io::LY => {
                log(LogCategory::Bus, LogLevel::Trace, || {
                    format!("ignored write {:02X} to LY", val)
                });
            }
            io::DMA => {
                self.io[idx] = val;
                self.oam_dma(val);
            }
            _ => self.io[idx] = val,
        }
    }

    fn oam_dma(&mut self, page: u8) {
        let src = (page as u16) << 8;
        for i in 0..OAM_SIZE as u16 {
            let byte = self.read(src.wrapping_add(i));
            self.oam[i as usize] = byte;
        }
    }

    /// Raw value of an I/O register, without read masks
    pub fn reg(&self, addr: u16) -> u8 {
        self.io[Self::io_index(addr)]
    }

    /// Direct reference to an I/O register's storage
    pub fn reg_mut(&mut self, addr: u16) -> &mut u8 {
        &mut self.io[Self::io_index(addr)]
    }

    pub fn request_interrupt(&mut self, interrupt: Interrupt) {
        *self.reg_mut(io::IF) |= interrupt.mask();
    }

    pub fn interrupt_enable(&self) -> u8 {
        self.ie
    }

    pub fn apu_powered(&self) -> bool {
        self.reg(io::NR52) & 0x80 != 0
    }

    /// Exchange the pending sound register writes with `buf`, which should
    /// be empty. The APU drains the queue this way without reallocating.
    pub(crate) fn swap_apu_writes(&mut self, buf: &mut Vec<(u16, u8)>) {
        std::mem::swap(&mut self.apu_writes, buf);
    }

    #[cfg(test)]
    pub(crate) fn pending_apu_writes(&self) -> usize {
        self.apu_writes.len()
    }

    pub(crate) fn take_div_reset(&mut self) -> bool {
        std::mem::take(&mut self.div_reset)
    }

    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    pub fn oam(&self) -> &[u8] {
        &self.oam
    }

    pub fn wave_ram(&self) -> &[u8] {
        let start = Self::io_index(io::WAVE_RAM);
        &self.io[start..start + 16]
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Update a key; a new press requests the joypad interrupt.
    pub fn set_key(&mut self, key: Key, pressed: bool) {
        if pressed {
            if self.joypad.press(key) {
                self.request_interrupt(Interrupt::Joypad);
            }
        } else {
            self.joypad.release(key);
        }
    }

    pub fn joypad(&self) -> &Joypad {
        &self.joypad
    }

    /// Battery-backed cartridge RAM
    pub fn cart_ram(&self) -> &[u8] {
        &self.cart_ram
    }

    /// Copy saved cartridge RAM in, truncating or zero-filling to size.
    pub fn load_cart_ram(&mut self, data: &[u8]) {
        let n = data.len().min(self.cart_ram.len());
        self.cart_ram[..n].copy_from_slice(&data[..n]);
        self.cart_ram[n..].fill(0);
    }

    /// Replace all state with `saved`, keeping this MMU's ROM.
    pub(crate) fn restore(&mut self, mut saved: Mmu) {
        saved.rom = std::mem::take(&mut self.rom);
        *self = saved;
    }

    /// Check that deserialized storage has the sizes this machine expects.
    pub(crate) fn layout_matches(&self, other: &Mmu) -> bool {
        self.cart_ram.len() == other.cart_ram.len()
            && other.vram.len() == VRAM_SIZE
            && other.wram.len() == WRAM_SIZE
            && other.oam.len() == OAM_SIZE
            && other.hram.len() == HRAM_SIZE
            && other.io.len() == IO_SIZE
            && std::mem::discriminant(&self.mapper) == std::mem::discriminant(&other.mapper)
    }
}

impl MemoryLr35902 for Mmu {
    fn read(&self, addr: u16) -> u8 {
        Mmu::read(self, addr)
    }

    fn write(&mut self, addr: u16, val: u8) {
        Mmu::write(self, addr, val)
    }
}
