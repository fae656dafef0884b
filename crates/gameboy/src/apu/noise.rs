//! Noise channel 4.
//!
//! NR43 layout: `SSSS WDDD` (clock shift, 7-bit width mode, divisor code).
//! The LFSR is clocked every `divisor << shift` cycles and the channel
//! outputs the envelope volume while bit 0 of the LFSR is clear.

use serde::{Deserialize, Serialize};

use super::envelope::Envelope;
use super::length_counter::LengthCounter;

const DIVISORS: [u32; 8] = [8, 16, 32, 48, 64, 80, 96, 112];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseChannel {
    pub enabled: bool,
    shift: u8,
    width7: bool,
    divisor: u8,
    timer: u32,
    lfsr: u16,
    pub envelope: Envelope,
    pub length: LengthCounter,
}

impl NoiseChannel {
    pub fn new() -> Self {
        Self {
            enabled: false,
            shift: 0,
            width7: false,
            divisor: 0,
            timer: 0,
            lfsr: 0x7FFF,
            envelope: Envelope::new(),
            length: LengthCounter::new(64),
        }
    }

    fn period(&self) -> u32 {
        DIVISORS[(self.divisor & 0x07) as usize] << (self.shift & 0x0F)
    }

    /// Handle a write to register `reg` (1 = NR41 ... 4 = NR44)
    pub fn write(&mut self, reg: u16, val: u8) {
        match reg {
            1 => self.length.load(val & 0x3F),
            2 => {
                self.envelope.write(val);
                if !self.envelope.dac_enabled() {
                    self.enabled = false;
                }
            }
            3 => {
                self.shift = val >> 4;
                self.width7 = val & 0x08 != 0;
                self.divisor = val & 0x07;
            }
            4 => {
                self.length.set_enabled(val & 0x40 != 0);
                if val & 0x80 != 0 {
                    self.enabled = self.envelope.dac_enabled();
                    self.length.trigger();
                    self.envelope.trigger();
                    self.timer = self.period();
                    self.lfsr = 0x7FFF;
                }
            }
            _ => {}
        }
    }

    fn step_lfsr(&mut self) {
        let bit = (self.lfsr ^ (self.lfsr >> 1)) & 1;
        self.lfsr = (self.lfsr >> 1) | (bit << 14);
        if self.width7 {
            self.lfsr = (self.lfsr & !(1 << 6)) | (bit << 6);
        }
    }

    pub fn tick(&mut self, cycles: u32) {
        let mut cycles = cycles;
        while cycles > 0 {
            if self.timer > cycles {
                self.timer -= cycles;
                return;
            }
            cycles -= self.timer;
            self.timer = self.period();
            self.step_lfsr();
        }
    }

    pub fn clock_length(&mut self) {
        if self.length.clock() {
            self.enabled = false;
        }
    }

    pub fn dac_enabled(&self) -> bool {
        self.envelope.dac_enabled()
    }

    /// Digital output (0-15)
    pub fn output(&self) -> u8 {
        if !self.enabled || self.lfsr & 1 != 0 {
            return 0;
        }
        self.envelope.volume()
    }
}

impl Default for NoiseChannel {
    fn default() -> Self {
        Self::new()
    }
}
