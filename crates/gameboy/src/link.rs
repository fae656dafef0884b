//! Serial link port (SB/SC)
//!
//! No partner device is attached. An internally clocked transfer
//! (SC = 0x81) shifts out eight bits at 8192 Hz, shifts in all ones, then
//! clears SC bit 7 and requests the serial interrupt. Externally clocked
//! transfers wait forever, as they would with no cable.

use serde::{Deserialize, Serialize};

use gb_core::cpu_lr35902::Interrupt;
use gb_core::logging::{log, LogCategory, LogLevel};

use crate::io;
use crate::mmu::Mmu;

/// Cycles for a full 8-bit transfer on the internal clock
pub const TRANSFER_CYCLES: u32 = 4096;

const SC_START: u8 = 0x80;
const SC_INTERNAL_CLOCK: u8 = 0x01;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Cycles into the current transfer, if one is running
    transfer: Option<u32>,
}

impl Link {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.transfer = None;
    }

    pub fn is_transferring(&self) -> bool {
        self.transfer.is_some()
    }

    /// A running transfer has not yet reached its end
    pub(crate) fn is_consistent(&self) -> bool {
        self.transfer.map_or(true, |elapsed| elapsed < TRANSFER_CYCLES)
    }

    pub fn clock(&mut self, mmu: &mut Mmu, cycles: u32) {
        let sc = mmu.reg(io::SC);
        if sc & (SC_START | SC_INTERNAL_CLOCK) != SC_START | SC_INTERNAL_CLOCK {
            self.transfer = None;
            return;
        }

        let elapsed = match self.transfer {
            Some(elapsed) => elapsed + cycles,
            None => {
                let sb = mmu.reg(io::SB);
                log(LogCategory::Stubs, LogLevel::Debug, || {
                    format!("serial transfer {:02X} with no partner", sb)
                });
                cycles
            }
        };

        if elapsed >= TRANSFER_CYCLES {
            *mmu.reg_mut(io::SB) = 0xFF;
            *mmu.reg_mut(io::SC) = sc & !SC_START;
            mmu.request_interrupt(Interrupt::Serial);
            self.transfer = None;
        } else {
            self.transfer = Some(elapsed);
        }
    }
}
