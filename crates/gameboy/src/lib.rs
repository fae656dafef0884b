//! Game Boy (DMG) emulator core.
//!
//! [`GameboyCore`] is the entry point: load a ROM, advance emulated time
//! with [`GameboyCore::update`] or [`GameboyCore::emulate_frame`], feed
//! input, and receive video and audio through callbacks.
//!
//! ```no_run
//! use gameboycore::{GameboyCore, Key};
//!
//! let rom = std::fs::read("game.gb").expect("read rom");
//! let mut core = GameboyCore::new();
//! core.load_rom(&rom).expect("load");
//! core.set_scanline_callback(Box::new(|line, ly| {
//!     // copy `line` into the host's framebuffer at row `ly`
//!     let _ = (line, ly);
//! }));
//! core.input(Key::Start, true);
//! core.emulate_frame().expect("frame");
//! ```
//!
//! Everything runs on the caller's thread. Callbacks are invoked from inside
//! `update`/`emulate_frame`; they must not block and must not call back into
//! the core.

pub mod apu;
pub mod buffers;
pub mod callbacks;
pub mod cartridge;
pub mod config;
pub mod cpu;
pub mod error;
pub mod io;
pub mod joypad;
pub mod lcd;
pub mod link;
pub mod mappers;
pub mod mmu;
pub mod ppu;
pub mod state;
pub mod timer;

use gb_core::logging::{log, LogCategory, LogConfig, LogLevel};
use gb_core::types::Frame;
use gb_core::Machine;

pub use callbacks::{
    AudioSampleCallback, Callbacks, Scanline, ScanlineCallback, VBlankCallback, SCREEN_HEIGHT,
    SCREEN_WIDTH,
};
pub use cartridge::CartInfo;
pub use config::{ColorTheme, Config};
pub use error::{CartridgeError, CoreError, StateError};
pub use joypad::Key;
pub use state::STATE_SIZE;

use cpu::Cpu;
use mappers::BankController;
use mmu::{Mmu, OPEN_BUS};

/// Last visible line of a frame
const LAST_VISIBLE_LINE: u8 = 143;

#[derive(Debug)]
struct Loaded {
    cpu: Cpu,
    info: CartInfo,
}

/// A Game Boy: cartridge slot, machine and host callbacks.
#[derive(Debug, Default)]
pub struct GameboyCore {
    machine: Option<Loaded>,
    callbacks: Callbacks,
    config: Config,
    /// Cpu log level and rate limit to put back when debug mode ends
    debug_restore: Option<(LogLevel, usize)>,
}

impl GameboyCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parse `rom` and build a fresh machine around it. On failure the
    /// previously loaded machine, if any, keeps running.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), CoreError> {
        let (info, mapper) = CartInfo::parse(rom).map_err(|e| {
            log(LogCategory::Cartridge, LogLevel::Error, || format!("rejected ROM: {}", e));
            e
        })?;

        let mmu = Mmu::new(rom.to_vec(), mapper, info.ram_size);
        let cpu = Cpu::new(mmu, &self.config);
        log(LogCategory::Cartridge, LogLevel::Info, || {
            format!(
                "loaded \"{}\": {} ({} ROM banks, {} bytes RAM{})",
                info.title,
                info.mapper,
                info.rom_banks,
                info.ram_size,
                if info.checksum_valid { "" } else { ", bad header checksum" }
            )
        });
        self.machine = Some(Loaded { cpu, info });
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.machine.is_some()
    }

    /// Return CPU registers, I/O registers and subsystem counters to their
    /// post-boot values. RAM contents and cartridge banking are kept.
    pub fn reset(&mut self) {
        if let Some(m) = self.machine.as_mut() {
            m.cpu.reset();
        }
    }

    fn loaded_mut(&mut self) -> Result<(&mut Cpu, &mut Callbacks), CoreError> {
        match self.machine.as_mut() {
            Some(m) => Ok((&mut m.cpu, &mut self.callbacks)),
            None => Err(CoreError::NoCartridge),
        }
    }

    /// Execute exactly `steps` CPU steps
    pub fn update(&mut self, steps: usize) -> Result<(), CoreError> {
        let (cpu, callbacks) = self.loaded_mut()?;
        for _ in 0..steps {
            cpu.step(callbacks);
        }
        Ok(())
    }

    /// Run until the line counter wraps to 0, then through line 143, so
    /// exactly one frame of scanlines is delivered.
    pub fn emulate_frame(&mut self) -> Result<(), CoreError> {
        let (cpu, callbacks) = self.loaded_mut()?;
        while cpu.mmu().reg(io::LY) != 0 {
            cpu.step(callbacks);
        }
        while cpu.mmu().reg(io::LY) <= LAST_VISIBLE_LINE {
            cpu.step(callbacks);
        }
        Ok(())
    }

    /// Read through the memory map. Reads 0xFF with no cartridge.
    pub fn read_memory(&self, addr: u16) -> u8 {
        self.machine
            .as_ref()
            .map_or(OPEN_BUS, |m| m.cpu.mmu().read(addr))
    }

    /// Write through the memory map, with all side effects. Ignored with no
    /// cartridge.
    pub fn write_memory(&mut self, addr: u16, val: u8) {
        if let Some(m) = self.machine.as_mut() {
            m.cpu.write_memory(addr, val);
        }
    }

    pub fn input(&mut self, key: Key, pressed: bool) {
        if let Some(m) = self.machine.as_mut() {
            m.cpu.mmu_mut().set_key(key, pressed);
        }
    }

    /// Install or replace the scanline callback; takes effect immediately
    pub fn set_scanline_callback(&mut self, callback: ScanlineCallback) {
        self.callbacks.scanline = Some(callback);
    }

    pub fn set_vblank_callback(&mut self, callback: VBlankCallback) {
        self.callbacks.vblank = Some(callback);
    }

    /// Install or replace the audio callback; takes effect immediately
    pub fn set_audio_sample_callback(&mut self, callback: AudioSampleCallback) {
        self.callbacks.audio = Some(callback);
    }

    /// Snapshot the machine into a [`STATE_SIZE`] buffer
    pub fn serialize(&self) -> Result<Vec<u8>, CoreError> {
        let m = self.machine.as_ref().ok_or(CoreError::NoCartridge)?;
        Ok(state::save(&m.cpu, m.info.header_checksum)?)
    }

    /// Restore a snapshot made by [`GameboyCore::serialize`] for the same
    /// cartridge. A rejected snapshot leaves the machine untouched.
    pub fn deserialize(&mut self, data: &[u8]) -> Result<(), CoreError> {
        let m = self.machine.as_mut().ok_or(CoreError::NoCartridge)?;
        state::load(&mut m.cpu, m.info.header_checksum, data).map_err(|e| {
            log(LogCategory::Cpu, LogLevel::Warn, || format!("rejected save state: {}", e));
            CoreError::from(e)
        })
    }

    /// Change the shade colours; applies from the next rendered line
    pub fn set_color_theme(&mut self, theme: ColorTheme) {
        self.config.color_theme = theme;
        if let Some(m) = self.machine.as_mut() {
            m.cpu.lcd_mut().set_palette(theme.palette());
        }
    }

    /// The most recently rendered frame
    pub fn frame(&self) -> Option<&Frame> {
        self.machine.as_ref().map(|m| m.cpu.lcd().frame())
    }

    /// True while the CPU is halted
    pub fn is_done(&self) -> bool {
        self.machine.as_ref().is_some_and(|m| m.cpu.is_halted())
    }

    pub fn cartridge_info(&self) -> Option<&CartInfo> {
        self.machine.as_ref().map(|m| &m.info)
    }

    /// Trace every executed instruction (PC, opcode, registers) on the
    /// `gb::cpu` target. Raises the Cpu category to Trace with no rate limit;
    /// turning it off restores the previous level and limit.
    pub fn set_debug_mode(&mut self, enabled: bool) {
        let config = LogConfig::global();
        match (enabled, self.debug_restore) {
            (true, None) => {
                self.debug_restore =
                    Some((config.get_level(LogCategory::Cpu), config.get_rate_limit()));
                config.set_level(LogCategory::Cpu, LogLevel::Trace);
                config.set_rate_limit(usize::MAX);
            }
            (false, Some((level, rate_limit))) => {
                config.set_level(LogCategory::Cpu, level);
                config.set_rate_limit(rate_limit);
                self.debug_restore = None;
            }
            _ => {}
        }
    }

    pub fn is_debug_mode(&self) -> bool {
        self.debug_restore.is_some()
    }

    /// CPU registers and key I/O registers, for tooling
    pub fn debug_state(&self) -> serde_json::Value {
        let Some(m) = self.machine.as_ref() else {
            return serde_json::Value::Null;
        };
        let mmu = m.cpu.mmu();
        serde_json::json!({
            "cartridge": m.info.title,
            "mapper": m.info.mapper,
            "rom_bank": mmu.mapper().rom_bank(),
            "ram_enabled": mmu.mapper().ram_enabled(),
            "cpu": m.cpu.registers(),
            "lcd": {
                "mode": m.cpu.lcd().mode() as u8,
                "lcdc": mmu.reg(io::LCDC),
                "stat": mmu.reg(io::STAT),
                "ly": mmu.reg(io::LY),
                "lyc": mmu.reg(io::LYC),
            },
            "interrupts": {
                "if": mmu.reg(io::IF),
                "ie": mmu.interrupt_enable(),
            },
            "timer": {
                "div": mmu.reg(io::DIV),
                "tima": mmu.reg(io::TIMA),
                "tac": mmu.reg(io::TAC),
            },
        })
    }

    /// Battery-backed cartridge RAM, for the host to persist
    pub fn cartridge_ram(&self) -> Option<&[u8]> {
        self.machine.as_ref().map(|m| m.cpu.mmu().cart_ram())
    }

    pub fn load_cartridge_ram(&mut self, data: &[u8]) -> Result<(), CoreError> {
        let m = self.machine.as_mut().ok_or(CoreError::NoCartridge)?;
        m.cpu.mmu_mut().load_cart_ram(data);
        Ok(())
    }
}

impl Machine for GameboyCore {
    type Error = CoreError;

    fn reset(&mut self) {
        GameboyCore::reset(self);
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        self.emulate_frame()?;
        self.frame().cloned().ok_or(CoreError::NoCartridge)
    }

    fn save_state(&self) -> Result<Vec<u8>, Self::Error> {
        self.serialize()
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.deserialize(data)
    }

    fn supports_save_states(&self) -> bool {
        true
    }
}
