//! Programmable wave channel 3.
//!
//! Plays 32 4-bit samples from wave RAM ($FF30-$FF3F), high nibble first.
//! NR30 bit 7 powers the DAC, NR31 loads the 256-step length, and NR32 bits
//! 6-5 select the output level (mute, 100%, 50%, 25%).

use serde::{Deserialize, Serialize};

use super::length_counter::LengthCounter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveChannel {
    pub enabled: bool,
    dac: bool,
    frequency: u16,
    timer: u32,
    /// Sample index (0-31)
    position: u8,
    /// Last sample fetched from wave RAM
    sample: u8,
    level: u8,
    pub length: LengthCounter,
}

impl WaveChannel {
    pub fn new() -> Self {
        Self {
            enabled: false,
            dac: false,
            frequency: 0,
            timer: 0,
            position: 0,
            sample: 0,
            level: 0,
            length: LengthCounter::new(256),
        }
    }

    fn period(&self) -> u32 {
        (2048 - (self.frequency & 0x07FF) as u32) * 2
    }

    /// Handle a write to register `reg` (0 = NR30 ... 4 = NR34)
    pub fn write(&mut self, reg: u16, val: u8) {
        match reg {
            0 => {
                self.dac = val & 0x80 != 0;
                if !self.dac {
                    self.enabled = false;
                }
            }
            1 => self.length.load(val),
            2 => self.level = (val >> 5) & 0x03,
            3 => self.frequency = (self.frequency & 0x0700) | val as u16,
            4 => {
                self.frequency = (self.frequency & 0x00FF) | (((val & 0x07) as u16) << 8);
                self.length.set_enabled(val & 0x40 != 0);
                if val & 0x80 != 0 {
                    self.enabled = self.dac;
                    self.length.trigger();
                    self.timer = self.period();
                    self.position = 0;
                }
            }
            _ => {}
        }
    }

    /// Advance by `cycles`, fetching samples from `wave_ram`
    pub fn tick(&mut self, cycles: u32, wave_ram: &[u8]) {
        let mut cycles = cycles;
        while cycles > 0 {
            if self.timer > cycles {
                self.timer -= cycles;
                return;
            }
            cycles -= self.timer;
            self.timer = self.period();
            self.position = (self.position + 1) & 31;
            let byte = wave_ram.get(self.position as usize / 2).copied().unwrap_or(0);
            self.sample = if self.position % 2 == 0 { byte >> 4 } else { byte & 0x0F };
        }
    }

    pub fn clock_length(&mut self) {
        if self.length.clock() {
            self.enabled = false;
        }
    }

    pub fn dac_enabled(&self) -> bool {
        self.dac
    }

    /// Digital output (0-15)
    pub fn output(&self) -> u8 {
        if !self.enabled {
            return 0;
        }
        match self.level & 0x03 {
            0 => 0,
            level => self.sample >> (level - 1),
        }
    }
}

impl Default for WaveChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAMP: [u8; 16] = [
        0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0xFE, 0xDC, 0xBA, 0x98, 0x76, 0x54, 0x32,
        0x10,
    ];

    fn triggered(level: u8) -> WaveChannel {
        let mut ch = WaveChannel::new();
        ch.write(0, 0x80);
        ch.write(2, level << 5);
        ch.write(3, 0x00);
        ch.write(4, 0x87); // period (2048 - 0x700) * 2 = 512
        ch
    }

    #[test]
    fn test_trigger_requires_dac() {
        let mut ch = WaveChannel::new();
        ch.write(4, 0x80);
        assert!(!ch.enabled);
        assert!(triggered(1).enabled);
    }

    #[test]
    fn test_plays_samples_in_order() {
        let mut ch = triggered(1);
        ch.tick(512, &RAMP);
        assert_eq!(ch.output(), 1);
        ch.tick(512, &RAMP);
        assert_eq!(ch.output(), 2);
        ch.tick(512 * 13, &RAMP);
        assert_eq!(ch.output(), 15);
    }

    #[test]
    fn test_output_level_shift() {
        let mut ch = triggered(2);
        ch.tick(512 * 15, &RAMP);
        assert_eq!(ch.output(), 7);
        ch.write(2, 3 << 5);
        assert_eq!(ch.output(), 3);
        ch.write(2, 0);
        assert_eq!(ch.output(), 0);
    }

    #[test]
    fn test_dac_off_disables() {
        let mut ch = triggered(1);
        ch.write(0, 0x00);
        assert!(!ch.enabled);
    }
}
