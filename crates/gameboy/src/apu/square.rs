//! Square wave channels 1 and 2.
//!
//! Registers, relative to the channel base (NR10/NR21):
//!
//! - NRx1: `DDLL LLLL` duty and length load
//! - NRx2: envelope
//! - NRx3: frequency low bits
//! - NRx4: `TL-- -FFF` trigger, length enable, frequency high bits
//!
//! Channel 1 additionally owns a [`Sweep`] written through NR10.

use serde::{Deserialize, Serialize};

use super::envelope::Envelope;
use super::length_counter::LengthCounter;
use super::sweep::{Sweep, SweepEvent};

const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1], // 12.5%
    [1, 0, 0, 0, 0, 0, 0, 1], // 25%
    [1, 0, 0, 0, 0, 1, 1, 1], // 50%
    [0, 1, 1, 1, 1, 1, 1, 0], // 75%
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquareChannel {
    pub enabled: bool,
    duty: u8,
    duty_pos: u8,
    frequency: u16,
    timer: u32,
    pub envelope: Envelope,
    pub length: LengthCounter,
    sweep: Option<Sweep>,
}

impl SquareChannel {
    /// Channel 1, with sweep
    pub fn with_sweep() -> Self {
        Self {
            sweep: Some(Sweep::new()),
            ..Self::new()
        }
    }

    /// Channel 2
    pub fn new() -> Self {
        Self {
            enabled: false,
            duty: 0,
            duty_pos: 0,
            frequency: 0,
            timer: 0,
            envelope: Envelope::new(),
            length: LengthCounter::new(64),
            sweep: None,
        }
    }

    fn period(&self) -> u32 {
        (2048 - (self.frequency & 0x07FF) as u32) * 4
    }

    pub fn frequency(&self) -> u16 {
        self.frequency
    }

    /// Handle a write to register `reg` (0 = NRx0 ... 4 = NRx4)
    pub fn write(&mut self, reg: u16, val: u8) {
        match reg {
            0 => {
                if let Some(sweep) = self.sweep.as_mut() {
                    sweep.write(val);
                }
            }
            1 => {
                self.duty = val >> 6;
                self.length.load(val & 0x3F);
            }
            2 => {
                self.envelope.write(val);
                if !self.envelope.dac_enabled() {
                    self.enabled = false;
                }
            }
            3 => self.frequency = (self.frequency & 0x0700) | val as u16,
            4 => {
                self.frequency = (self.frequency & 0x00FF) | (((val & 0x07) as u16) << 8);
                self.length.set_enabled(val & 0x40 != 0);
                if val & 0x80 != 0 {
                    self.trigger();
                }
            }
            _ => {}
        }
    }

    fn trigger(&mut self) {
        self.enabled = self.envelope.dac_enabled();
        self.length.trigger();
        self.timer = self.period();
        self.envelope.trigger();
        if let Some(sweep) = self.sweep.as_mut() {
            if !sweep.trigger(self.frequency) {
                self.enabled = false;
            }
        }
    }

    /// Advance the frequency timer by `cycles`
    pub fn tick(&mut self, cycles: u32) {
        let mut cycles = cycles;
        while cycles > 0 {
            if self.timer > cycles {
                self.timer -= cycles;
                return;
            }
            cycles -= self.timer;
            self.timer = self.period();
            self.duty_pos = (self.duty_pos + 1) & 7;
        }
    }

    pub fn clock_length(&mut self) {
        if self.length.clock() {
            self.enabled = false;
        }
    }

    pub fn clock_sweep(&mut self) {
        let Some(sweep) = self.sweep.as_mut() else {
            return;
        };
        match sweep.clock() {
            SweepEvent::Frequency(freq) => self.frequency = freq,
            SweepEvent::Overflow => self.enabled = false,
            SweepEvent::None => {}
        }
    }

    pub fn dac_enabled(&self) -> bool {
        self.envelope.dac_enabled()
    }

    /// Digital output (0-15)
    pub fn output(&self) -> u8 {
        if !self.enabled {
            return 0;
        }
        DUTY_TABLE[(self.duty & 3) as usize][(self.duty_pos & 7) as usize] * self.envelope.volume()
    }
}

impl Default for SquareChannel {
    fn default() -> Self {
        Self::new()
    }
}
