//! LCD controller timing
//!
//! Each line lasts 456 cycles and a frame 154 lines. Visible lines 0-143 run
//! OAM search (mode 2, 80 cycles), pixel transfer (mode 3, 172 cycles) and
//! H-Blank (mode 0, 204 cycles). Lines 144-153 are one V-Blank period
//! (mode 1, 4560 cycles).
//!
//! `clock` processes every line and mode boundary inside the cycle span it
//! is given, so the result does not depend on how cycles are batched.
//!
//! The line is rendered and handed to the scanline callback when pixel
//! transfer completes. With LCDC bit 7 clear the timing keeps running, blank
//! lines are delivered and no interrupts are raised.

use serde::{Deserialize, Serialize};

use gb_core::cpu_lr35902::Interrupt;
use gb_core::logging::{log, LogCategory, LogLevel};
use gb_core::ppu::ShadePalette;
use gb_core::types::Frame;

use crate::callbacks::{Callbacks, Scanline, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::io;
use crate::mmu::Mmu;
use crate::ppu::{self, LCDC_ENABLE};

pub const LINE_CYCLES: u32 = 456;
pub const LINES_PER_FRAME: u8 = 154;
pub const VBLANK_LINE: u8 = 144;

// STAT bits
const STAT_COINCIDENCE: u8 = 0x04;
const STAT_HBLANK_IRQ: u8 = 0x08;
const STAT_VBLANK_IRQ: u8 = 0x10;
const STAT_OAM_IRQ: u8 = 0x20;
const STAT_LYC_IRQ: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    HBlank = 0,
    VBlank = 1,
    OamSearch = 2,
    Transfer = 3,
}

impl Mode {
    /// Cycles spent in this mode before the next transition
    pub fn duration(self) -> u32 {
        match self {
            Mode::OamSearch => 80,
            Mode::Transfer => 172,
            Mode::HBlank => 204,
            Mode::VBlank => LINE_CYCLES * (LINES_PER_FRAME - VBLANK_LINE) as u32,
        }
    }

    fn stat_source(self) -> u8 {
        match self {
            Mode::HBlank => STAT_HBLANK_IRQ,
            Mode::VBlank => STAT_VBLANK_IRQ,
            Mode::OamSearch => STAT_OAM_IRQ,
            Mode::Transfer => 0,
        }
    }
}

fn blank_frame() -> Frame {
    Frame::new(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LcdController {
    mode: Mode,
    /// Cycles spent in the current mode
    mode_count: u32,
    /// Cycles spent in the current line
    line_count: u32,
    /// Window internal line counter
    window_line: u8,
    /// Last completed frame; rebuilt line by line, not saved
    #[serde(skip, default = "blank_frame")]
    frame: Frame,
    #[serde(skip, default = "default_palette")]
    palette: ShadePalette,
    #[serde(skip, default = "blank_scanline")]
    line: Scanline,
}

fn default_palette() -> ShadePalette {
    crate::config::ColorTheme::default().palette()
}

fn blank_scanline() -> Scanline {
    [0; SCREEN_WIDTH]
}

impl LcdController {
    pub fn new(palette: ShadePalette) -> Self {
        Self {
            mode: Mode::OamSearch,
            mode_count: 0,
            line_count: 0,
            window_line: 0,
            frame: blank_frame(),
            palette,
            line: blank_scanline(),
        }
    }

    /// Return to the top of line 0. The frame buffer is kept.
    pub fn reset(&mut self, mmu: &mut Mmu) {
        self.mode = Mode::OamSearch;
        self.mode_count = 0;
        self.line_count = 0;
        self.window_line = 0;
        *mmu.reg_mut(io::LY) = 0;
        self.write_mode(mmu);
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn line_count(&self) -> u32 {
        self.line_count
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn set_palette(&mut self, palette: ShadePalette) {
        self.palette = palette;
    }

    /// Take timing state from a snapshot, keeping palette and frame buffer.
    pub(crate) fn restore(&mut self, saved: LcdController) {
        self.mode = saved.mode;
        self.mode_count = saved.mode_count;
        self.line_count = saved.line_count;
        self.window_line = saved.window_line;
    }

    /// Counters lie inside the timing table and agree with each other and
    /// with `ly`: a mode's offset into the line matches `line_count`, and
    /// only lines 144-153 are in V-Blank.
    pub(crate) fn is_consistent(&self, ly: u8) -> bool {
        if self.line_count >= LINE_CYCLES
            || self.mode_count >= self.mode.duration()
            || ly >= LINES_PER_FRAME
        {
            return false;
        }
        let into_line = match self.mode {
            Mode::OamSearch => self.mode_count,
            Mode::Transfer => Mode::OamSearch.duration() + self.mode_count,
            Mode::HBlank => {
                Mode::OamSearch.duration() + Mode::Transfer.duration() + self.mode_count
            }
            Mode::VBlank => {
                return ly >= VBLANK_LINE
                    && self.mode_count
                        == (ly - VBLANK_LINE) as u32 * LINE_CYCLES + self.line_count;
            }
        };
        ly < VBLANK_LINE && into_line == self.line_count
    }

    /// Advance by `cycles` CPU cycles, handling every transition in the span.
    pub fn clock(&mut self, mmu: &mut Mmu, cycles: u32, callbacks: &mut Callbacks) {
        let mut remaining = cycles;
        while remaining > 0 {
            let to_line_end = LINE_CYCLES - self.line_count;
            let to_mode_end = self.mode.duration() - self.mode_count;
            let step = remaining.min(to_line_end).min(to_mode_end);

            self.line_count += step;
            self.mode_count += step;
            remaining -= step;

            if self.line_count >= LINE_CYCLES {
                self.line_count -= LINE_CYCLES;
                self.next_line(mmu);
            }
            if self.mode_count >= self.mode.duration() {
                self.mode_count -= self.mode.duration();
                self.next_mode(mmu, callbacks);
            }
        }
    }

    fn lcd_enabled(mmu: &Mmu) -> bool {
        mmu.reg(io::LCDC) & LCDC_ENABLE != 0
    }

    fn next_line(&mut self, mmu: &mut Mmu) {
        let ly = (mmu.reg(io::LY) + 1) % LINES_PER_FRAME;
        *mmu.reg_mut(io::LY) = ly;

        let stat = mmu.reg(io::STAT);
        if ly == mmu.reg(io::LYC) {
            *mmu.reg_mut(io::STAT) = stat | STAT_COINCIDENCE;
            if stat & STAT_LYC_IRQ != 0 && Self::lcd_enabled(mmu) {
                mmu.request_interrupt(Interrupt::Stat);
            }
        } else {
            *mmu.reg_mut(io::STAT) = stat & !STAT_COINCIDENCE;
        }
    }

    fn next_mode(&mut self, mmu: &mut Mmu, callbacks: &mut Callbacks) {
        let ly = mmu.reg(io::LY);
        self.mode = match self.mode {
            Mode::OamSearch => Mode::Transfer,
            Mode::Transfer => {
                self.render_line(mmu, ly, callbacks);
                Mode::HBlank
            }
            Mode::HBlank if ly == VBLANK_LINE => Mode::VBlank,
            Mode::HBlank => Mode::OamSearch,
            Mode::VBlank => {
                self.window_line = 0;
                Mode::OamSearch
            }
        };
        self.write_mode(mmu);

        if !Self::lcd_enabled(mmu) {
            if self.mode == Mode::VBlank {
                callbacks.emit_vblank(&self.frame);
            }
            return;
        }

        if mmu.reg(io::STAT) & self.mode.stat_source() != 0 {
            mmu.request_interrupt(Interrupt::Stat);
        }
        if self.mode == Mode::VBlank {
            mmu.request_interrupt(Interrupt::VBlank);
            log(LogCategory::Ppu, LogLevel::Trace, || "enter V-Blank".to_string());
            callbacks.emit_vblank(&self.frame);
        }
    }

    /// Store the mode in STAT bits 1-0, preserving the rest
    fn write_mode(&self, mmu: &mut Mmu) {
        let stat = mmu.reg_mut(io::STAT);
        *stat = (*stat & !0x03) | self.mode as u8;
    }

    fn render_line(&mut self, mmu: &Mmu, ly: u8, callbacks: &mut Callbacks) {
        ppu::render_scanline(mmu, ly, &mut self.window_line, &self.palette, &mut self.line);
        if let Some(row) = self.frame.row_mut(ly as usize) {
            row.copy_from_slice(&self.line);
        }
        callbacks.emit_scanline(&self.line, ly);
    }
}
