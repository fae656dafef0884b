//! Frequency sweep unit of square channel 1.
//!
//! NR10 layout: `-PPP NSSS` (period, negate, shift). The sweep is clocked at
//! 128 Hz on frame sequencer steps 2 and 6. A calculated frequency above
//! 2047 disables the channel.

use serde::{Deserialize, Serialize};

const MAX_FREQUENCY: u16 = 2047;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sweep {
    period: u8,
    negate: bool,
    shift: u8,
    timer: u8,
    enabled: bool,
    shadow: u16,
}

/// Result of clocking the sweep unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepEvent {
    None,
    /// Load this new frequency into the channel
    Frequency(u16),
    /// Overflow: the channel must be disabled
    Overflow,
}

impl Sweep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, val: u8) {
        self.period = (val >> 4) & 0x07;
        self.negate = val & 0x08 != 0;
        self.shift = val & 0x07;
    }

    fn reload_timer(&mut self) {
        self.timer = if self.period == 0 { 8 } else { self.period };
    }

    fn calculate(&self) -> u16 {
        let delta = self.shadow >> self.shift;
        if self.negate {
            self.shadow.wrapping_sub(delta)
        } else {
            self.shadow + delta
        }
    }

    /// Restart on channel trigger. Returns false if the immediate overflow
    /// check disables the channel.
    pub fn trigger(&mut self, frequency: u16) -> bool {
        self.shadow = frequency;
        self.reload_timer();
        self.enabled = self.period != 0 || self.shift != 0;
        !(self.shift != 0 && self.calculate() > MAX_FREQUENCY)
    }

    pub fn clock(&mut self) -> SweepEvent {
        if self.timer > 0 {
            self.timer -= 1;
        }
        if self.timer != 0 {
            return SweepEvent::None;
        }
        self.reload_timer();
        if !self.enabled || self.period == 0 {
            return SweepEvent::None;
        }

        let next = self.calculate();
        if next > MAX_FREQUENCY {
            return SweepEvent::Overflow;
        }
        if self.shift == 0 {
            return SweepEvent::None;
        }
        self.shadow = next;
        if self.calculate() > MAX_FREQUENCY {
            return SweepEvent::Overflow;
        }
        SweepEvent::Frequency(next)
    }
}
