//! Fixed-size save states.
//!
//! Layout of a [`STATE_SIZE`]-byte state:
//!
//! | Offset | Size | Field                                     |
//! |--------|------|-------------------------------------------|
//! | 0      | 4    | Magic `GBCS`                              |
//! | 4      | 2    | Format version, little endian             |
//! | 6      | 4    | Payload length, little endian             |
//! | 10     | 1    | Header checksum of the cartridge          |
//! | 11     | n    | bincode payload                           |
//! | 11 + n | ...  | Zero padding                              |
//!
//! The payload holds the CPU registers, all MMU storage and banking state,
//! and the LCD, APU, link and timer counters. ROM contents are never saved.
//!
//! Loading decodes and validates the whole state before touching the
//! machine, so a rejected state leaves it unchanged.

use serde::{Deserialize, Serialize};

use gb_core::cpu_lr35902::Registers;
use gb_core::logging::{log, LogCategory, LogLevel};

use crate::apu::Apu;
use crate::cpu::Cpu;
use crate::error::StateError;
use crate::io;
use crate::lcd::LcdController;
use crate::link::Link;
use crate::mmu::Mmu;
use crate::timer::Timer;

/// Size of every save state in bytes
pub const STATE_SIZE: usize = 0x30000;
pub const STATE_MAGIC: [u8; 4] = *b"GBCS";
pub const STATE_VERSION: u16 = 1;

const HEADER_SIZE: usize = 11;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    registers: Registers,
    mmu: &'a Mmu,
    lcd: &'a LcdController,
    apu: &'a Apu,
    link: &'a Link,
    timer: &'a Timer,
}

#[derive(Deserialize)]
struct Snapshot {
    registers: Registers,
    mmu: Mmu,
    lcd: LcdController,
    apu: Apu,
    link: Link,
    timer: Timer,
}

/// Encode the machine into a `STATE_SIZE` buffer
pub fn save(cpu: &Cpu, rom_checksum: u8) -> Result<Vec<u8>, StateError> {
    let snapshot = SnapshotRef {
        registers: cpu.registers(),
        mmu: cpu.mmu(),
        lcd: cpu.lcd(),
        apu: cpu.apu(),
        link: cpu.link(),
        timer: cpu.timer(),
    };
    encode(&snapshot, rom_checksum)
}

fn encode(snapshot: &SnapshotRef<'_>, rom_checksum: u8) -> Result<Vec<u8>, StateError> {
    let payload = bincode::serialize(snapshot).map_err(|e| StateError::Encode(e.to_string()))?;
    if payload.len() > STATE_SIZE - HEADER_SIZE {
        return Err(StateError::PayloadTooLarge(payload.len()));
    }

    let mut out = Vec::with_capacity(STATE_SIZE);
    out.extend_from_slice(&STATE_MAGIC);
    out.extend_from_slice(&STATE_VERSION.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.push(rom_checksum);
    out.extend_from_slice(&payload);
    out.resize(STATE_SIZE, 0);

    log(LogCategory::Cpu, LogLevel::Debug, || {
        format!("saved state, payload {} bytes", payload.len())
    });
    Ok(out)
}

/// Validate `data` and, only if every check passes, load it into `cpu`.
pub fn load(cpu: &mut Cpu, rom_checksum: u8, data: &[u8]) -> Result<(), StateError> {
    if data.len() != STATE_SIZE {
        return Err(StateError::SizeMismatch {
            expected: STATE_SIZE,
            actual: data.len(),
        });
    }
    if data[0..4] != STATE_MAGIC {
        return Err(StateError::BadMagic);
    }
    let version = u16::from_le_bytes([data[4], data[5]]);
    if version != STATE_VERSION {
        return Err(StateError::UnsupportedVersion(version));
    }
    let len = u32::from_le_bytes([data[6], data[7], data[8], data[9]]) as usize;
    if len > STATE_SIZE - HEADER_SIZE {
        return Err(StateError::PayloadTooLarge(len));
    }
    if data[10] != rom_checksum {
        return Err(StateError::RomMismatch);
    }

    let snapshot: Snapshot = bincode::deserialize(&data[HEADER_SIZE..HEADER_SIZE + len])
        .map_err(|e| StateError::Decode(e.to_string()))?;

    if !cpu.mmu().layout_matches(&snapshot.mmu) {
        return Err(StateError::Decode("memory layout does not match cartridge".into()));
    }
    let ly = snapshot.mmu.reg(io::LY);
    if !snapshot.lcd.is_consistent(ly)
        || !snapshot.apu.is_consistent()
        || !snapshot.timer.is_consistent()
        || !snapshot.link.is_consistent()
    {
        return Err(StateError::Decode("counters out of range".into()));
    }

    cpu.restore(
        &snapshot.registers,
        snapshot.mmu,
        snapshot.lcd,
        snapshot.apu,
        snapshot.link,
        snapshot.timer,
    );
    log(LogCategory::Cpu, LogLevel::Debug, || "loaded state".to_string());
    Ok(())
}
