//! Volume envelope for the square and noise channels.
//!
//! NRx2 layout: `VVVV APPP` (initial volume, add mode, period). The
//! envelope is clocked at 64 Hz by step 7 of the frame sequencer; a period
//! of 0 freezes the volume.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Volume loaded on trigger (0-15)
    initial: u8,
    /// Count up instead of down
    increase: bool,
    period: u8,
    timer: u8,
    volume: u8,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load parameters from an NRx2 write
    pub fn write(&mut self, val: u8) {
        self.initial = val >> 4;
        self.increase = val & 0x08 != 0;
        self.period = val & 0x07;
    }

    /// The channel DAC is powered while any of NRx2 bits 7-3 is set
    pub fn dac_enabled(&self) -> bool {
        self.initial != 0 || self.increase
    }

    /// Restart from the initial volume
    pub fn trigger(&mut self) {
        self.timer = self.period;
        self.volume = self.initial;
    }

    /// Clock the envelope (frame sequencer step 7)
    pub fn clock(&mut self) {
        if self.period == 0 {
            return;
        }
        if self.timer > 0 {
            self.timer -= 1;
        }
        if self.timer == 0 {
            self.timer = self.period;
            if self.increase && self.volume < 15 {
                self.volume += 1;
            } else if !self.increase && self.volume > 0 {
                self.volume -= 1;
            }
        }
    }

    /// Current volume (0-15)
    pub fn volume(&self) -> u8 {
        self.volume
    }
}
