//! Sharp LR35902 CPU core (Game Boy CPU)
//!
//! This is a Z80-like CPU used in Game Boy and Game Boy Color.
//! It's similar to Z80 but with some instructions removed and others modified.
//!
//! # Interrupts
//!
//! The interrupt flag (IF, 0xFF0F) and enable (IE, 0xFFFF) registers live in
//! the memory map and are accessed through [`MemoryLr35902`]. Before each
//! instruction the CPU checks `IF & IE`; any pending source wakes it from
//! HALT/STOP, and with IME set the lowest pending bit is dispatched:
//!
//! | Bit | Source  | Vector |
//! |-----|---------|--------|
//! | 0   | V-Blank | 0x0040 |
//! | 1   | STAT    | 0x0048 |
//! | 2   | Timer   | 0x0050 |
//! | 3   | Serial  | 0x0058 |
//! | 4   | Joypad  | 0x0060 |
//!
//! `EI` takes effect after the instruction that follows it.
//!
//! # Illegal opcodes
//!
//! The eleven unused opcodes (0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED,
//! 0xF4, 0xFC, 0xFD) execute as 4-cycle no-ops and log a warning.

use serde::{Deserialize, Serialize};

use crate::logging::{log, LogCategory, LogLevel};

/// Interrupt flag register address
pub const REG_IF: u16 = 0xFF0F;
/// Interrupt enable register address
pub const REG_IE: u16 = 0xFFFF;

/// Interrupt sources in priority order (bit position in IF/IE)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Interrupt {
    VBlank = 0,
    Stat = 1,
    Timer = 2,
    Serial = 3,
    Joypad = 4,
}

impl Interrupt {
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::Stat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    /// Bit mask in IF/IE
    pub fn mask(self) -> u8 {
        1 << self as u8
    }

    /// Address the CPU jumps to when servicing this interrupt
    pub fn vector(self) -> u16 {
        0x0040 + 8 * self as u16
    }
}

/// Snapshot of the register file, used for save states and debugging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Registers {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub ime: bool,
    pub ime_pending: bool,
    pub halted: bool,
    pub stopped: bool,
    pub cycles: u64,
}

/// Memory interface trait for the LR35902 CPU
pub trait MemoryLr35902 {
    /// Read a byte from memory
    fn read(&self, addr: u16) -> u8;
    
    /// Write a byte to memory
    fn write(&mut self, addr: u16, val: u8);
}

/// Sharp LR35902 CPU state
#[derive(Debug)]
pub struct CpuLr35902<M: MemoryLr35902> {
    /// Accumulator & Flags (combined as AF)
    pub a: u8,
    pub f: u8,
    /// BC register pair
    pub b: u8,
    pub c: u8,
    /// DE register pair
    pub d: u8,
    pub e: u8,
    /// HL register pair
    pub h: u8,
    pub l: u8,
    /// Stack pointer
    pub sp: u16,
    /// Program counter
    pub pc: u16,
    /// Interrupt Master Enable flag
    pub ime: bool,
    /// Set by EI, moved into `ime` after the next instruction
    pub ime_pending: bool,
    /// Halted state
    pub halted: bool,
    /// Stopped state (for STOP instruction)
    pub stopped: bool,
    /// Total cycles executed
    pub cycles: u64,
    /// Memory interface
    pub memory: M,
}

const FLAG_Z: u8 = 0x80;
const FLAG_N: u8 = 0x40;
const FLAG_H: u8 = 0x20;
const FLAG_C: u8 = 0x10;

/// Build an F register value from the four flags
fn pack_flags(z: bool, n: bool, h: bool, c: bool) -> u8 {
    (u8::from(z) << 7) | (u8::from(n) << 6) | (u8::from(h) << 5) | (u8::from(c) << 4)
}

impl<M: MemoryLr35902> CpuLr35902<M> {
    /// Create a new LR35902 CPU
    pub fn new(memory: M) -> Self {
        Self {
            a: 0,
            f: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            sp: 0,
            pc: 0,
            ime: false,
            ime_pending: false,
            halted: false,
            stopped: false,
            cycles: 0,
            memory,
        }
    }

    /// Reset the CPU to the register values the DMG boot ROM leaves behind
    pub fn reset(&mut self) {
        self.a = 0x01;
        self.f = 0xB0;
        self.b = 0x00;
        self.c = 0x13;
        self.d = 0x00;
        self.e = 0xD8;
        self.h = 0x01;
        self.l = 0x4D;
        self.sp = 0xFFFE;
        self.pc = 0x100; // Cartridge entry point
        self.ime = false;
        self.ime_pending = false;
        self.halted = false;
        self.stopped = false;
        self.cycles = 0;
    }

    /// Execute one instruction, or dispatch one interrupt, and return the
    /// number of clock cycles consumed.
    ///
    /// While halted, each call idles for 4 cycles so the caller can keep
    /// clocking the rest of the machine until an interrupt is raised.
    pub fn step(&mut self) -> u32 {
        let cycles = self.step_inner();
        self.cycles += cycles as u64;
        cycles
    }

    fn step_inner(&mut self) -> u32 {
        if let Some(cycles) = self.service_interrupts() {
            return cycles;
        }
        if self.halted || self.stopped {
            return 4;
        }

        let enable_ime = std::mem::take(&mut self.ime_pending);
        let pc = self.pc;
        let opcode = self.read_pc();
        log(LogCategory::Cpu, LogLevel::Trace, || self.trace_line(pc, opcode));
        let cycles = self.execute(opcode);
        // DI right after EI cancels the pending enable
        if enable_ime && opcode != 0xF3 {
            self.ime = true;
        }
        cycles
    }

    /// Interrupts that are both requested and enabled
    pub fn pending_interrupts(&self) -> u8 {
        self.memory.read(REG_IF) & self.memory.read(REG_IE) & 0x1F
    }

    fn service_interrupts(&mut self) -> Option<u32> {
        let pending = self.pending_interrupts();
        if pending == 0 {
            return None;
        }
        self.halted = false;
        self.stopped = false;
        if !self.ime {
            return None;
        }

        let interrupt = Interrupt::ALL
            .into_iter()
            .find(|i| pending & i.mask() != 0)?;
        self.ime = false;
        self.ime_pending = false;
        let flags = self.memory.read(REG_IF);
        self.memory.write(REG_IF, flags & !interrupt.mask());
        self.push_u16(self.pc);
        self.pc = interrupt.vector();

        log(LogCategory::Interrupts, LogLevel::Trace, || {
            format!("dispatch {:?} -> {:04X}", interrupt, self.pc)
        });
        Some(20)
    }

    /// Copy out the register file
    pub fn registers(&self) -> Registers {
        Registers {
            a: self.a,
            f: self.f,
            b: self.b,
            c: self.c,
            d: self.d,
            e: self.e,
            h: self.h,
            l: self.l,
            sp: self.sp,
            pc: self.pc,
            ime: self.ime,
            ime_pending: self.ime_pending,
            halted: self.halted,
            stopped: self.stopped,
            cycles: self.cycles,
        }
    }

    /// Overwrite the register file
    pub fn set_registers(&mut self, regs: &Registers) {
        self.a = regs.a;
        self.f = regs.f & 0xF0;
        self.b = regs.b;
        self.c = regs.c;
        self.d = regs.d;
        self.e = regs.e;
        self.h = regs.h;
        self.l = regs.l;
        self.sp = regs.sp;
        self.pc = regs.pc;
        self.ime = regs.ime;
        self.ime_pending = regs.ime_pending;
        self.halted = regs.halted;
        self.stopped = regs.stopped;
        self.cycles = regs.cycles;
    }

    /// Register dump as it stands before `opcode` at `pc` executes.
    fn trace_line(&self, pc: u16, opcode: u8) -> String {
        format!(
            "{:04X}: {:02X}  A={:02X} F={:02X} BC={:04X} DE={:04X} HL={:04X} SP={:04X}",
            pc,
            opcode,
            self.a,
            self.f,
            self.bc(),
            self.de(),
            self.hl(),
            self.sp
        )
    }

    fn read_pc(&mut self) -> u8 {
        let val = self.memory.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        val
    }

    fn read_pc_u16(&mut self) -> u16 {
        let lo = self.read_pc();
        let hi = self.read_pc();
        u16::from_le_bytes([lo, hi])
    }

    fn push_u16(&mut self, val: u16) {
        let [hi, lo] = val.to_be_bytes();
        self.sp = self.sp.wrapping_sub(1);
        self.memory.write(self.sp, hi);
        self.sp = self.sp.wrapping_sub(1);
        self.memory.write(self.sp, lo);
    }

    fn pop_u16(&mut self) -> u16 {
        let lo = self.memory.read(self.sp);
        let hi = self.memory.read(self.sp.wrapping_add(1));
        self.sp = self.sp.wrapping_add(2);
        u16::from_le_bytes([lo, hi])
    }

    fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    fn set_hl(&mut self, val: u16) {
        [self.h, self.l] = val.to_be_bytes();
    }

    fn flag(&self, flag: u8) -> bool {
        self.f & flag != 0
    }

    /// 8-bit operand from its 3-bit encoding: B, C, D, E, H, L, (HL), A
    fn read_r8(&self, idx: u8) -> u8 {
        match idx & 0x07 {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => self.h,
            5 => self.l,
            6 => self.memory.read(self.hl()),
            _ => self.a,
        }
    }

    fn write_r8(&mut self, idx: u8, val: u8) {
        match idx & 0x07 {
            0 => self.b = val,
            1 => self.c = val,
            2 => self.d = val,
            3 => self.e = val,
            4 => self.h = val,
            5 => self.l = val,
            6 => self.memory.write(self.hl(), val),
            _ => self.a = val,
        }
    }

    /// Register pair from bits 5-4: BC, DE, HL, SP
    fn read_r16(&self, idx: u8) -> u16 {
        match idx & 0x03 {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            _ => self.sp,
        }
    }

    fn write_r16(&mut self, idx: u8, val: u16) {
        match idx & 0x03 {
            0 => [self.b, self.c] = val.to_be_bytes(),
            1 => [self.d, self.e] = val.to_be_bytes(),
            2 => self.set_hl(val),
            _ => self.sp = val,
        }
    }

    /// PUSH/POP use AF in place of SP
    fn read_stack_r16(&self, idx: u8) -> u16 {
        match idx & 0x03 {
            3 => u16::from_be_bytes([self.a, self.f]),
            other => self.read_r16(other),
        }
    }

    fn write_stack_r16(&mut self, idx: u8, val: u16) {
        match idx & 0x03 {
            3 => {
                let [a, f] = val.to_be_bytes();
                self.a = a;
                self.f = f & 0xF0;
            }
            other => self.write_r16(other, val),
        }
    }

    /// Address for LD (rr),A and LD A,(rr); HL+ and HL- adjust HL afterwards
    fn indirect_addr(&mut self, idx: u8) -> u16 {
        match idx & 0x03 {
            0 => self.bc(),
            1 => self.de(),
            2 => {
                let hl = self.hl();
                self.set_hl(hl.wrapping_add(1));
                hl
            }
            _ => {
                let hl = self.hl();
                self.set_hl(hl.wrapping_sub(1));
                hl
            }
        }
    }

    /// Condition in bits 4-3 of JR/JP/CALL/RET cc: NZ, Z, NC, C
    fn condition(&self, opcode: u8) -> bool {
        match (opcode >> 3) & 0x03 {
            0 => !self.flag(FLAG_Z),
            1 => self.flag(FLAG_Z),
            2 => !self.flag(FLAG_C),
            _ => self.flag(FLAG_C),
        }
    }

    /// ADD, ADC, SUB, SBC, AND, XOR, OR, CP against A
    fn alu(&mut self, op: u8, val: u8) {
        let a = self.a;
        let carry = u8::from(matches!(op, 1 | 3) && self.flag(FLAG_C));
        match op & 0x07 {
            0 | 1 => {
                let result = a as u16 + val as u16 + carry as u16;
                self.a = result as u8;
                self.f = pack_flags(
                    self.a == 0,
                    false,
                    (a & 0x0F) + (val & 0x0F) + carry > 0x0F,
                    result > 0xFF,
                );
            }
            2 | 3 | 7 => {
                let result = a as i16 - val as i16 - carry as i16;
                self.f = pack_flags(
                    result as u8 == 0,
                    true,
                    (a & 0x0F) < (val & 0x0F) + carry,
                    result < 0,
                );
                if op != 7 {
                    self.a = result as u8;
                }
            }
            4 => {
                self.a &= val;
                self.f = pack_flags(self.a == 0, false, true, false);
            }
            5 => {
                self.a ^= val;
                self.f = pack_flags(self.a == 0, false, false, false);
            }
            _ => {
                self.a |= val;
                self.f = pack_flags(self.a == 0, false, false, false);
            }
        }
    }

    /// CB rotate/shift group: RLC, RRC, RL, RR, SLA, SRA, SWAP, SRL
    fn shift(&mut self, op: u8, val: u8) -> u8 {
        let carry_in = u8::from(self.flag(FLAG_C));
        let (result, carry) = match op & 0x07 {
            0 => (val.rotate_left(1), val & 0x80 != 0),
            1 => (val.rotate_right(1), val & 0x01 != 0),
            2 => ((val << 1) | carry_in, val & 0x80 != 0),
            3 => ((val >> 1) | (carry_in << 7), val & 0x01 != 0),
            4 => (val << 1, val & 0x80 != 0),
            5 => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
            6 => (val.rotate_left(4), false),
            _ => (val >> 1, val & 0x01 != 0),
        };
        self.f = pack_flags(result == 0, false, false, carry);
        result
    }

    fn inc8(&mut self, val: u8) -> u8 {
        let result = val.wrapping_add(1);
        self.f = (self.f & FLAG_C) | pack_flags(result == 0, false, val & 0x0F == 0x0F, false);
        result
    }

    fn dec8(&mut self, val: u8) -> u8 {
        let result = val.wrapping_sub(1);
        self.f = (self.f & FLAG_C) | pack_flags(result == 0, true, val & 0x0F == 0, false);
        result
    }

    fn add_hl(&mut self, val: u16) {
        let hl = self.hl();
        let half = (hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF;
        let (result, carry) = hl.overflowing_add(val);
        self.f = (self.f & FLAG_Z) | pack_flags(false, false, half, carry);
        self.set_hl(result);
    }

    /// SP plus a signed immediate; flags come from the low byte
    fn sp_offset(&mut self) -> u16 {
        let offset = self.read_pc() as i8 as i16 as u16;
        let sp = self.sp;
        self.f = pack_flags(
            false,
            false,
            (sp & 0x0F) + (offset & 0x0F) > 0x0F,
            (sp & 0xFF) + (offset & 0xFF) > 0xFF,
        );
        sp.wrapping_add(offset)
    }

    fn daa(&mut self) {
        let subtract = self.flag(FLAG_N);
        let mut carry = self.flag(FLAG_C);
        let mut adjust = 0u8;
        if self.flag(FLAG_H) || (!subtract && self.a & 0x0F > 0x09) {
            adjust |= 0x06;
        }
        if carry || (!subtract && self.a > 0x99) {
            adjust |= 0x60;
            carry = true;
        }
        self.a = if subtract {
            self.a.wrapping_sub(adjust)
        } else {
            self.a.wrapping_add(adjust)
        };
        self.f = pack_flags(self.a == 0, subtract, false, carry);
    }

    fn jr(&mut self, taken: bool) -> u32 {
        let offset = self.read_pc() as i8;
        if taken {
            self.pc = self.pc.wrapping_add_signed(offset as i16);
            12
        } else {
            8
        }
    }

    fn call(&mut self, taken: bool) -> u32 {
        let addr = self.read_pc_u16();
        if taken {
            self.push_u16(self.pc);
            self.pc = addr;
            24
        } else {
            12
        }
    }

    /// Opcodes are decoded by field: bits 5-3 (`y`) and 2-0 (`z`) select
    /// the operand or operation within each block.
    fn execute(&mut self, opcode: u8) -> u32 {
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;
        let pair = opcode >> 4;
        let hl_cost = |idx: u8, plain: u32, indirect: u32| if idx == 6 { indirect } else { plain };

        match opcode {
            0x00 => 4,
            0x08 => {
                let addr = self.read_pc_u16();
                let [hi, lo] = self.sp.to_be_bytes();
                self.memory.write(addr, lo);
                self.memory.write(addr.wrapping_add(1), hi);
                20
            }
            0x10 => {
                self.read_pc();
                self.stopped = true;
                4
            }
            0x18 => self.jr(true),
            0x20 | 0x28 | 0x30 | 0x38 => {
                let taken = self.condition(opcode);
                self.jr(taken)
            }
            0x01 | 0x11 | 0x21 | 0x31 => {
                let val = self.read_pc_u16();
                self.write_r16(pair, val);
                12
            }
            0x09 | 0x19 | 0x29 | 0x39 => {
                self.add_hl(self.read_r16(pair));
                8
            }
            0x02 | 0x12 | 0x22 | 0x32 => {
                let addr = self.indirect_addr(pair);
                self.memory.write(addr, self.a);
                8
            }
            0x0A | 0x1A | 0x2A | 0x3A => {
                let addr = self.indirect_addr(pair);
                self.a = self.memory.read(addr);
                8
            }
            0x03 | 0x13 | 0x23 | 0x33 => {
                self.write_r16(pair, self.read_r16(pair).wrapping_add(1));
                8
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                self.write_r16(pair, self.read_r16(pair).wrapping_sub(1));
                8
            }
            0x00..=0x3F if z == 4 => {
                let val = self.read_r8(y);
                let result = self.inc8(val);
                self.write_r8(y, result);
                hl_cost(y, 4, 12)
            }
            0x00..=0x3F if z == 5 => {
                let val = self.read_r8(y);
                let result = self.dec8(val);
                self.write_r8(y, result);
                hl_cost(y, 4, 12)
            }
            0x00..=0x3F if z == 6 => {
                let val = self.read_pc();
                self.write_r8(y, val);
                hl_cost(y, 8, 12)
            }
            // RLCA, RRCA, RLA, RRA always clear Z
            0x07 | 0x0F | 0x17 | 0x1F => {
                self.a = self.shift(y, self.a);
                self.f &= !FLAG_Z;
                4
            }
            0x27 => {
                self.daa();
                4
            }
            0x2F => {
                self.a = !self.a;
                self.f |= FLAG_N | FLAG_H;
                4
            }
            0x37 => {
                self.f = (self.f & FLAG_Z) | FLAG_C;
                4
            }
            0x3F => {
                self.f = (self.f & (FLAG_Z | FLAG_C)) ^ FLAG_C;
                4
            }

            0x76 => {
                self.halted = true;
                4
            }
            0x40..=0x7F => {
                let val = self.read_r8(z);
                self.write_r8(y, val);
                if y == 6 || z == 6 {
                    8
                } else {
                    4
                }
            }
            0x80..=0xBF => {
                let val = self.read_r8(z);
                self.alu(y, val);
                hl_cost(z, 4, 8)
            }

            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                if self.condition(opcode) {
                    self.pc = self.pop_u16();
                    20
                } else {
                    8
                }
            }
            0xC9 => {
                self.pc = self.pop_u16();
                16
            }
            0xD9 => {
                self.pc = self.pop_u16();
                self.ime = true;
                16
            }
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let val = self.pop_u16();
                self.write_stack_r16(pair, val);
                12
            }
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                self.push_u16(self.read_stack_r16(pair));
                16
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let addr = self.read_pc_u16();
                if self.condition(opcode) {
                    self.pc = addr;
                    16
                } else {
                    12
                }
            }
            0xC3 => {
                self.pc = self.read_pc_u16();
                16
            }
            0xE9 => {
                self.pc = self.hl();
                4
            }
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let taken = self.condition(opcode);
                self.call(taken)
            }
            0xCD => self.call(true),
            0xC0..=0xFF if z == 6 => {
                let val = self.read_pc();
                self.alu(y, val);
                8
            }
            0xC0..=0xFF if z == 7 => {
                self.push_u16(self.pc);
                self.pc = (opcode & 0x38) as u16;
                16
            }
            0xCB => self.execute_cb(),

            0xE0 => {
                let addr = 0xFF00 | self.read_pc() as u16;
                self.memory.write(addr, self.a);
                12
            }
            0xF0 => {
                let addr = 0xFF00 | self.read_pc() as u16;
                self.a = self.memory.read(addr);
                12
            }
            0xE2 => {
                self.memory.write(0xFF00 | self.c as u16, self.a);
                8
            }
            0xF2 => {
                self.a = self.memory.read(0xFF00 | self.c as u16);
                8
            }
            0xEA => {
                let addr = self.read_pc_u16();
                self.memory.write(addr, self.a);
                16
            }
            0xFA => {
                let addr = self.read_pc_u16();
                self.a = self.memory.read(addr);
                16
            }
            0xE8 => {
                self.sp = self.sp_offset();
                16
            }
            0xF8 => {
                let val = self.sp_offset();
                self.set_hl(val);
                12
            }
            0xF9 => {
                self.sp = self.hl();
                8
            }
            0xF3 => {
                self.ime = false;
                self.ime_pending = false;
                4
            }
            0xFB => {
                self.ime_pending = true;
                4
            }

            _ => {
                let pc = self.pc.wrapping_sub(1);
                log(LogCategory::Cpu, LogLevel::Warn, || {
                    format!("illegal opcode {:02X} at {:04X}", opcode, pc)
                });
                4
            }
        }
    }

    fn execute_cb(&mut self) -> u32 {
        let opcode = self.read_pc();
        let bit = (opcode >> 3) & 0x07;
        let target = opcode & 0x07;
        let val = self.read_r8(target);

        let result = match opcode >> 6 {
            0 => self.shift(bit, val),
            1 => {
                self.f = (self.f & FLAG_C) | pack_flags(val & (1 << bit) == 0, false, true, false);
                return if target == 6 { 12 } else { 8 };
            }
            2 => val & !(1 << bit),
            _ => val | (1 << bit),
        };
        self.write_r8(target, result);
        if target == 6 {
            16
        } else {
            8
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ArrayMemory(Vec<u8>);

    impl MemoryLr35902 for ArrayMemory {
        fn read(&self, addr: u16) -> u8 {
            self.0[addr as usize]
        }

        fn write(&mut self, addr: u16, val: u8) {
            self.0[addr as usize] = val;
        }
    }

    /// CPU with `program` at 0x0000 and the stack at 0xD000
    fn cpu_with(program: &[u8]) -> CpuLr35902<ArrayMemory> {
        let mut ram = vec![0; 0x10000];
        ram[..program.len()].copy_from_slice(program);
        let mut cpu = CpuLr35902::new(ArrayMemory(ram));
        cpu.sp = 0xD000;
        cpu
    }

    fn flags(cpu: &CpuLr35902<ArrayMemory>) -> (bool, bool, bool, bool) {
        (
            cpu.flag(FLAG_Z),
            cpu.flag(FLAG_N),
            cpu.flag(FLAG_H),
            cpu.flag(FLAG_C),
        )
    }

    #[test]
    fn test_trace_line_shows_registers_before_execution() {
        let mut cpu = cpu_with(&[0x3E, 0x42, 0x00]);
        cpu.step();
        cpu.f = 0xB0;
        cpu.set_hl(0xC0DE);
        assert_eq!(
            cpu.trace_line(cpu.pc, 0x00),
            "0002: 00  A=42 F=B0 BC=0000 DE=0000 HL=C0DE SP=D000"
        );
    }

    #[test]
    fn test_loads_and_timing() {
        let mut cpu = cpu_with(&[
            0x01, 0x34, 0x12, // LD BC,$1234
            0x3E, 0x42, // LD A,$42
            0x02, // LD (BC),A
            0x21, 0x00, 0xC0, // LD HL,$C000
            0x36, 0x99, // LD (HL),$99
            0x46, // LD B,(HL)
        ]);
        let cycles: Vec<u32> = (0..6).map(|_| cpu.step()).collect();
        assert_eq!(cycles, vec![12, 8, 8, 12, 12, 8]);
        assert_eq!(cpu.memory.0[0x1234], 0x42);
        assert_eq!(cpu.b, 0x99);
        assert_eq!(cpu.cycles, 60);
    }

    #[test]
    fn test_hl_increment_and_decrement() {
        let mut cpu = cpu_with(&[0x22, 0x32, 0x2A]); // LD (HL+),A; LD (HL-),A; LD A,(HL+)
        cpu.set_hl(0xC000);
        cpu.a = 0x5A;
        cpu.step();
        assert_eq!(cpu.hl(), 0xC001);
        cpu.step();
        assert_eq!(cpu.hl(), 0xC000);
        assert_eq!(cpu.memory.0[0xC001], 0x5A);
        cpu.a = 0;
        cpu.step();
        assert_eq!((cpu.a, cpu.hl()), (0x5A, 0xC001));
    }

    #[test]
    fn test_inc_dec_keep_carry() {
        let mut cpu = cpu_with(&[0x04, 0x05, 0x05]); // INC B; DEC B; DEC B
        cpu.b = 0xFF;
        cpu.f = FLAG_C;
        cpu.step();
        assert_eq!(cpu.b, 0x00);
        assert_eq!(flags(&cpu), (true, false, true, true));
        cpu.step();
        assert_eq!(cpu.b, 0xFF);
        assert_eq!(flags(&cpu), (false, true, true, true));
        cpu.step();
        assert_eq!(flags(&cpu), (false, true, false, true));
    }

    #[test]
    fn test_inc_dec_memory_and_pairs() {
        let mut cpu = cpu_with(&[0x34, 0x03, 0x0B, 0x0B]); // INC (HL); INC BC; DEC BC; DEC BC
        cpu.set_hl(0xC000);
        assert_eq!(cpu.step(), 12);
        assert_eq!(cpu.memory.0[0xC000], 1);
        cpu.step();
        assert_eq!(cpu.bc(), 1);
        cpu.step();
        cpu.step();
        assert_eq!(cpu.bc(), 0xFFFF);
    }

    #[test]
    fn test_alu_results_and_flags() {
        // (opcode, a, b, carry in, result, z n h c)
        let cases = [
            (0x80, 0x3A, 0xC6, false, 0x00, (true, false, true, true)), // ADD
            (0x88, 0x0E, 0x01, true, 0x10, (false, false, true, false)), // ADC
            (0x90, 0x3E, 0x3E, false, 0x00, (true, true, false, false)), // SUB
            (0x98, 0x3B, 0x2A, true, 0x10, (false, true, false, false)), // SBC
            (0x90, 0x10, 0x20, false, 0xF0, (false, true, false, true)), // SUB borrow
            (0xA0, 0x5A, 0x3F, false, 0x1A, (false, false, true, false)), // AND
            (0xA8, 0xFF, 0xFF, true, 0x00, (true, false, false, false)), // XOR
            (0xB0, 0x00, 0x00, true, 0x00, (true, false, false, false)), // OR
            (0xB8, 0x3C, 0x2F, false, 0x3C, (false, true, true, false)), // CP
        ];
        for (opcode, a, b, carry, result, expected) in cases {
            let mut cpu = cpu_with(&[opcode]);
            cpu.a = a;
            cpu.b = b;
            cpu.f = if carry { FLAG_C } else { 0 };
            assert_eq!(cpu.step(), 4);
            assert_eq!(cpu.a, result, "opcode {:02X}", opcode);
            assert_eq!(flags(&cpu), expected, "opcode {:02X}", opcode);
        }
    }

    #[test]
    fn test_alu_immediate_and_indirect() {
        let mut cpu = cpu_with(&[0xC6, 0x05, 0x86, 0xFE, 0x0A]); // ADD A,5; ADD A,(HL); CP 10
        cpu.set_hl(0x0004);
        cpu.a = 0x01;
        assert_eq!(cpu.step(), 8);
        assert_eq!(cpu.step(), 8);
        assert_eq!(cpu.a, 0x10);
        cpu.step();
        assert!(!cpu.flag(FLAG_Z));
        assert!(!cpu.flag(FLAG_C));
    }

    #[test]
    fn test_daa_after_add_and_sub() {
        let mut cpu = cpu_with(&[0x80, 0x27, 0x90, 0x27]); // ADD A,B; DAA; SUB B; DAA
        cpu.a = 0x45;
        cpu.b = 0x38;
        cpu.step();
        cpu.step();
        assert_eq!(cpu.a, 0x83);
        cpu.step();
        cpu.step();
        assert_eq!(cpu.a, 0x45);
        assert!(!cpu.flag(FLAG_C));
    }

    #[test]
    fn test_accumulator_rotates_clear_zero() {
        let mut cpu = cpu_with(&[0x07, 0x1F]); // RLCA; RRA
        cpu.a = 0x80;
        cpu.step();
        assert_eq!(cpu.a, 0x01);
        assert_eq!(flags(&cpu), (false, false, false, true));
        cpu.a = 0x00;
        cpu.step();
        assert_eq!(cpu.a, 0x80);
        assert_eq!(flags(&cpu), (false, false, false, false));
    }

    #[test]
    fn test_flag_instructions() {
        let mut cpu = cpu_with(&[0x2F, 0x37, 0x3F]); // CPL; SCF; CCF
        cpu.a = 0x0F;
        cpu.f = FLAG_Z;
        cpu.step();
        assert_eq!(cpu.a, 0xF0);
        assert_eq!(flags(&cpu), (true, true, true, false));
        cpu.step();
        assert_eq!(flags(&cpu), (true, false, false, true));
        cpu.step();
        assert_eq!(flags(&cpu), (true, false, false, false));
    }

    #[test]
    fn test_add_hl_keeps_zero() {
        let mut cpu = cpu_with(&[0x09]); // ADD HL,BC
        cpu.set_hl(0x8FFF);
        cpu.write_r16(0, 0x7001);
        cpu.f = FLAG_Z;
        assert_eq!(cpu.step(), 8);
        assert_eq!(cpu.hl(), 0x0000);
        assert_eq!(flags(&cpu), (true, false, true, true));
    }

    #[test]
    fn test_sp_offset_flags() {
        let mut cpu = cpu_with(&[0xE8, 0xFF, 0xF8, 0x08]); // ADD SP,-1; LD HL,SP+8
        cpu.sp = 0x1000;
        assert_eq!(cpu.step(), 16);
        assert_eq!(cpu.sp, 0x0FFF);
        assert_eq!(flags(&cpu), (false, false, false, false));
        assert_eq!(cpu.step(), 12);
        assert_eq!(cpu.hl(), 0x1007);
        assert_eq!(flags(&cpu), (false, false, true, true));
    }

    #[test]
    fn test_jumps_and_conditions() {
        let mut cpu = cpu_with(&[0x18, 0x02, 0, 0, 0x20, 0xFA, 0x28, 0x10]);
        assert_eq!(cpu.step(), 12); // JR +2
        assert_eq!(cpu.pc, 4);
        cpu.f = FLAG_Z;
        assert_eq!(cpu.step(), 8); // JR NZ not taken
        assert_eq!(cpu.pc, 6);
        assert_eq!(cpu.step(), 12); // JR Z taken
        assert_eq!(cpu.pc, 0x18);

        let mut cpu = cpu_with(&[0xDA, 0x00, 0x20, 0xC3, 0x00, 0x30]); // JP C; JP
        assert_eq!(cpu.step(), 12);
        assert_eq!(cpu.step(), 16);
        assert_eq!(cpu.pc, 0x3000);
    }

    #[test]
    fn test_call_ret_and_rst() {
        let mut cpu = cpu_with(&[0xCD, 0x00, 0x02, 0xDF]); // CALL $0200; RST $18
        cpu.memory.0[0x200] = 0xC8; // RET Z
        cpu.memory.0[0x201] = 0xC9; // RET
        assert_eq!(cpu.step(), 24);
        assert_eq!((cpu.pc, cpu.sp), (0x0200, 0xCFFE));
        assert_eq!(cpu.step(), 8);
        assert_eq!(cpu.step(), 16);
        assert_eq!((cpu.pc, cpu.sp), (0x0003, 0xD000));
        assert_eq!(cpu.step(), 16);
        assert_eq!(cpu.pc, 0x0018);
        assert_eq!(cpu.memory.0[0xCFFE], 0x04);
    }

    #[test]
    fn test_push_pop_af_masks_flags() {
        let mut cpu = cpu_with(&[0xC5, 0xF1]); // PUSH BC; POP AF
        cpu.write_r16(0, 0x12FF);
        cpu.step();
        assert_eq!(cpu.step(), 12);
        assert_eq!((cpu.a, cpu.f), (0x12, 0xF0));
        assert_eq!(cpu.sp, 0xD000);
    }

    #[test]
    fn test_high_page_loads() {
        let mut cpu = cpu_with(&[0xE0, 0x80, 0xF2, 0xEA, 0x00, 0xC0]); // LDH ($80),A; LD A,(C); LD ($C000),A
        cpu.a = 0x77;
        cpu.c = 0x81;
        cpu.memory.0[0xFF81] = 0x33;
        assert_eq!(cpu.step(), 12);
        assert_eq!(cpu.memory.0[0xFF80], 0x77);
        assert_eq!(cpu.step(), 8);
        assert_eq!(cpu.a, 0x33);
        assert_eq!(cpu.step(), 16);
        assert_eq!(cpu.memory.0[0xC000], 0x33);
    }

    #[test]
    fn test_ld_a16_sp() {
        let mut cpu = cpu_with(&[0x08, 0x00, 0xC0]);
        cpu.sp = 0xBEEF;
        assert_eq!(cpu.step(), 20);
        assert_eq!(&cpu.memory.0[0xC000..0xC002], &[0xEF, 0xBE]);
    }

    #[test]
    fn test_cb_operations() {
        let mut cpu = cpu_with(&[
            0xCB, 0x11, // RL C
            0xCB, 0x37, // SWAP A
            0xCB, 0x7E, // BIT 7,(HL)
            0xCB, 0xC6, // SET 0,(HL)
            0xCB, 0x87, // RES 0,A
            0xCB, 0x28, // SRA B
        ]);
        cpu.c = 0x80;
        cpu.a = 0x1F;
        cpu.b = 0x81;
        cpu.set_hl(0xC000);

        assert_eq!(cpu.step(), 8);
        assert_eq!(cpu.c, 0x00);
        assert_eq!(flags(&cpu), (true, false, false, true));
        cpu.step();
        assert_eq!(cpu.a, 0xF1);
        assert_eq!(cpu.step(), 12);
        assert!(cpu.flag(FLAG_Z));
        assert_eq!(cpu.step(), 16);
        assert_eq!(cpu.memory.0[0xC000], 0x01);
        cpu.step();
        assert_eq!(cpu.a, 0xF0);
        cpu.step();
        assert_eq!(cpu.b, 0xC0);
        assert!(cpu.flag(FLAG_C));
    }

    #[test]
    fn test_halt() {
        let mut cpu = cpu_with(&[0x76]);
        cpu.step();
        assert!(cpu.halted);
        assert_eq!(cpu.step(), 4);
        assert_eq!(cpu.pc, 1);
    }

    #[test]
    fn test_ei_takes_effect_after_next_instruction() {
        let mut cpu = cpu_with(&[0xFB, 0x00, 0xF3]); // EI; NOP; DI
        cpu.step();
        assert!(!cpu.ime);
        assert!(cpu.ime_pending);
        cpu.step();
        assert!(cpu.ime);
        cpu.step();
        assert!(!cpu.ime);
    }

    #[test]
    fn test_di_cancels_pending_ei() {
        let mut cpu = cpu_with(&[0xFB, 0xF3]);
        cpu.step();
        cpu.step();
        assert!(!cpu.ime);
        assert!(!cpu.ime_pending);
    }

    #[test]
    fn test_reti_enables_interrupts() {
        let mut cpu = cpu_with(&[0xCD, 0x00, 0x02]);
        cpu.memory.0[0x200] = 0xD9; // RETI
        cpu.step();
        cpu.step();
        assert!(cpu.ime);
        assert_eq!(cpu.pc, 3);
    }

    #[test]
    fn test_interrupt_dispatch_priority() {
        let mut cpu = cpu_with(&[]);
        cpu.pc = 0x0200;
        cpu.ime = true;
        cpu.memory.0[REG_IE as usize] = 0x1F;
        cpu.memory.0[REG_IF as usize] = 0x14; // Timer and Joypad

        assert_eq!(cpu.step(), 20);
        assert_eq!(cpu.pc, 0x0050);
        assert!(!cpu.ime);
        assert_eq!(cpu.memory.0[REG_IF as usize], 0x10);
        assert_eq!(&cpu.memory.0[0xCFFE..0xD000], &[0x00, 0x02]);
    }

    #[test]
    fn test_interrupt_vectors() {
        let vectors: Vec<u16> = Interrupt::ALL.iter().map(|i| i.vector()).collect();
        assert_eq!(vectors, vec![0x40, 0x48, 0x50, 0x58, 0x60]);
    }

    #[test]
    fn test_disabled_interrupt_is_not_dispatched() {
        let mut cpu = cpu_with(&[]);
        cpu.ime = true;
        cpu.memory.0[REG_IE as usize] = 0x01;
        cpu.memory.0[REG_IF as usize] = 0x04;
        cpu.step();
        assert_eq!(cpu.pc, 1);
    }

    #[test]
    fn test_halt_wakes_without_ime() {
        let mut cpu = cpu_with(&[0x76]);
        cpu.memory.0[REG_IE as usize] = 0x01;
        cpu.step();
        assert!(cpu.halted);

        cpu.memory.0[REG_IF as usize] = 0x01;
        cpu.step();
        assert!(!cpu.halted);
        // Execution resumes after HALT rather than at the vector
        assert_eq!(cpu.pc, 2);
    }

    #[test]
    fn test_reset_post_boot_values() {
        let mut cpu = cpu_with(&[]);
        cpu.reset();
        let regs = cpu.registers();
        assert_eq!((regs.a, regs.f), (0x01, 0xB0));
        assert_eq!((cpu.bc(), cpu.de(), cpu.hl()), (0x0013, 0x00D8, 0x014D));
        assert_eq!((regs.sp, regs.pc), (0xFFFE, 0x0100));
    }

    #[test]
    fn test_registers_restore() {
        let mut cpu = cpu_with(&[]);
        cpu.reset();
        cpu.a = 0x42;
        cpu.halted = true;
        let saved = cpu.registers();

        let mut other = cpu_with(&[]);
        other.set_registers(&saved);
        assert_eq!(other.registers(), saved);
    }

    #[test]
    fn test_illegal_opcodes_are_nops() {
        for opcode in [0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD] {
            let mut cpu = cpu_with(&[opcode]);
            let before = cpu.registers();
            assert_eq!(cpu.step(), 4);
            assert_eq!(cpu.pc, 1);
            assert_eq!((cpu.a, cpu.f, cpu.sp), (before.a, before.f, before.sp));
        }
    }
}
