//! Length counter shared by all four channels.
//!
//! The counter is loaded with `max - n` from NRx1, clocked at 256 Hz on the
//! even frame sequencer steps while enabled by NRx4 bit 6, and silences its
//! channel when it reaches zero.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthCounter {
    /// 64 for square and noise, 256 for wave
    max: u16,
    value: u16,
    enabled: bool,
}

impl LengthCounter {
    pub fn new(max: u16) -> Self {
        Self {
            max,
            value: 0,
            enabled: false,
        }
    }

    /// Load from the length bits of NRx1
    pub fn load(&mut self, n: u8) {
        // max is a power of two
        self.value = self.max.saturating_sub(n as u16 & self.max.wrapping_sub(1));
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// A trigger with an expired counter reloads the full length
    pub fn trigger(&mut self) {
        if self.value == 0 {
            self.value = self.max;
        }
    }

    /// Clock once; returns true when the counter just expired.
    pub fn clock(&mut self) -> bool {
        if self.enabled && self.value > 0 {
            self.value -= 1;
            return self.value == 0;
        }
        false
    }

    pub fn value(&self) -> u16 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0;
        self.enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_expire() {
        let mut len = LengthCounter::new(64);
        len.load(62);
        assert_eq!(len.value(), 2);
        len.set_enabled(true);
        assert!(!len.clock());
        assert!(len.clock());
        assert_eq!(len.value(), 0);
        assert!(!len.clock());
    }

    #[test]
    fn test_disabled_counter_holds() {
        let mut len = LengthCounter::new(256);
        len.load(0);
        assert_eq!(len.value(), 256);
        assert!(!len.clock());
        assert_eq!(len.value(), 256);
    }

    #[test]
    fn test_trigger_reloads_expired() {
        let mut len = LengthCounter::new(64);
        len.trigger();
        assert_eq!(len.value(), 64);
        len.load(60);
        len.trigger();
        assert_eq!(len.value(), 4);
    }
}
