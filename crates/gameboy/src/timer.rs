//! Game Boy Timer
//!
//! # Timer Registers
//!
//! - `$FF04 (DIV)`: Divider register - Increments at 16384 Hz, write resets to 0
//! - `$FF05 (TIMA)`: Timer counter - Increments at rate specified by TAC
//! - `$FF06 (TMA)`: Timer modulo - TIMA is loaded with this value on overflow
//! - `$FF07 (TAC)`: Timer control
//!   - Bit 2: Timer enable (0=stop, 1=run)
//!   - Bits 1-0: Clock select
//!     - 00: 4096 Hz (CPU clock / 1024)
//!     - 01: 262144 Hz (CPU clock / 16)
//!     - 10: 65536 Hz (CPU clock / 64)
//!     - 11: 16384 Hz (CPU clock / 256)
//!
//! The registers themselves live in the MMU; the timer only keeps the
//! sub-tick cycle counters. When TIMA overflows it is reloaded from TMA and
//! the timer interrupt is requested.

use serde::{Deserialize, Serialize};

use gb_core::cpu_lr35902::Interrupt;

use crate::io;
use crate::mmu::Mmu;

const DIV_PERIOD: u32 = 256;
/// Longest TIMA period (TAC clock select 00)
const MAX_TIMA_PERIOD: u32 = 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    /// Cycles since DIV last incremented
    div_cycles: u32,
    /// Cycles since TIMA last incremented
    tima_cycles: u32,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Sub-tick counters are below their periods
    pub(crate) fn is_consistent(&self) -> bool {
        self.div_cycles < DIV_PERIOD && self.tima_cycles < MAX_TIMA_PERIOD
    }

    fn tima_period(tac: u8) -> u32 {
        match tac & 0x03 {
            0 => MAX_TIMA_PERIOD,
            1 => 16,
            2 => 64,
            _ => 256,
        }
    }

    /// Advance by `cycles` CPU cycles
    pub fn tick(&mut self, mmu: &mut Mmu, cycles: u32) {
        if mmu.take_div_reset() {
            self.div_cycles = 0;
            self.tima_cycles = 0;
        }

        self.div_cycles += cycles;
        while self.div_cycles >= DIV_PERIOD {
            self.div_cycles -= DIV_PERIOD;
            let div = mmu.reg_mut(io::DIV);
            *div = div.wrapping_add(1);
        }

        let tac = mmu.reg(io::TAC);
        if tac & 0x04 == 0 {
            return;
        }

        let period = Self::tima_period(tac);
        self.tima_cycles += cycles;
        while self.tima_cycles >= period {
            self.tima_cycles -= period;
            let (tima, overflow) = mmu.reg(io::TIMA).overflowing_add(1);
            if overflow {
                *mmu.reg_mut(io::TIMA) = mmu.reg(io::TMA);
                mmu.request_interrupt(Interrupt::Timer);
            } else {
                *mmu.reg_mut(io::TIMA) = tima;
            }
        }
    }
}
