//! The CPU together with the subsystems it clocks.
//!
//! The LR35902 core owns the MMU as its memory. After every step the cycles
//! it consumed are forwarded, in order, to the timer, the LCD controller,
//! the APU and the link port, so all of them share one clock.

use gb_core::cpu_lr35902::{CpuLr35902, Registers};
use gb_core::logging::{log, LogCategory, LogLevel};

use crate::apu::Apu;
use crate::callbacks::Callbacks;
use crate::config::Config;
use crate::lcd::LcdController;
use crate::link::Link;
use crate::mmu::Mmu;
use crate::timer::Timer;

#[derive(Debug)]
pub struct Cpu {
    core: CpuLr35902<Mmu>,
    lcd: LcdController,
    apu: Apu,
    link: Link,
    timer: Timer,
}

impl Cpu {
    /// Build the machine around `mmu` in its post-boot state
    pub fn new(mmu: Mmu, config: &Config) -> Self {
        let mut cpu = Self {
            core: CpuLr35902::new(mmu),
            lcd: LcdController::new(config.color_theme.palette()),
            apu: Apu::new(config.sample_rate, config.audio_batch),
            link: Link::new(),
            timer: Timer::new(),
        };
        cpu.reset();
        cpu
    }

    /// Return registers and subsystems to their post-boot state. Memory
    /// contents and cartridge banking are kept.
    pub fn reset(&mut self) {
        self.core.memory.reset_io();
        self.core.reset();
        self.lcd.reset(&mut self.core.memory);
        self.apu.reset();
        self.link.reset();
        self.timer.reset();
        log(LogCategory::Cpu, LogLevel::Debug, || "reset to post-boot state".to_string());
    }

    /// Execute one instruction (or interrupt dispatch, or halted idle) and
    /// clock every subsystem by its cost.
    pub fn step(&mut self, callbacks: &mut Callbacks) -> u32 {
        let cycles = self.core.step();
        let mmu = &mut self.core.memory;
        self.timer.tick(mmu, cycles);
        self.lcd.clock(mmu, cycles, callbacks);
        self.apu.tick(mmu, cycles, callbacks);
        self.link.clock(mmu, cycles);
        cycles
    }

    pub fn is_halted(&self) -> bool {
        self.core.halted
    }

    pub fn registers(&self) -> Registers {
        self.core.registers()
    }

    pub fn set_registers(&mut self, regs: &Registers) {
        self.core.set_registers(regs);
    }

    pub fn mmu(&self) -> &Mmu {
        &self.core.memory
    }

    pub fn mmu_mut(&mut self) -> &mut Mmu {
        &mut self.core.memory
    }

    /// Write through the memory map from outside an instruction. Sound
    /// register writes reach the APU right away instead of waiting for the
    /// next step.
    pub fn write_memory(&mut self, addr: u16, val: u8) {
        self.core.memory.write(addr, val);
        self.apu.apply_writes(&mut self.core.memory);
    }

    pub fn lcd(&self) -> &LcdController {
        &self.lcd
    }

    pub fn lcd_mut(&mut self) -> &mut LcdController {
        &mut self.lcd
    }

    pub fn apu(&self) -> &Apu {
        &self.apu
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Replace all machine state with snapshot parts. The caller has
    /// already validated them against this machine.
    pub(crate) fn restore(
        &mut self,
        regs: &Registers,
        mmu: Mmu,
        lcd: LcdController,
        apu: Apu,
        link: Link,
        timer: Timer,
    ) {
        self.core.memory.restore(mmu);
        self.core.set_registers(regs);
        self.lcd.restore(lcd);
        self.apu.restore(apu);
        self.link = link;
        self.timer = timer;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io;
    use crate::mappers::Mapper;
    use gb_core::cpu_lr35902::Interrupt;

    fn make_cpu(program: &[u8]) -> Cpu {
        let mut rom = vec![0; 0x8000];
        rom[0x100..0x100 + program.len()].copy_from_slice(program);
        let mapper = Mapper::from_cart_type(0x00).expect("rom only");
        Cpu::new(Mmu::new(rom, mapper, 0), &Config::default())
    }

    #[test]
    fn test_post_boot_state() {
        let cpu = make_cpu(&[]);
        let regs = cpu.registers();
        assert_eq!(regs.pc, 0x0100);
        assert_eq!(regs.sp, 0xFFFE);
        assert_eq!(regs.a, 0x01);
        assert_eq!(cpu.mmu().read(io::LCDC), 0x91);
        assert_eq!(cpu.mmu().read(io::LY), 0);
    }

    #[test]
    fn test_step_clocks_subsystems() {
        // NOP forever
        let mut cpu = make_cpu(&[]);
        let mut cb = Callbacks::default();
        let mut total = 0;
        while total < 456 {
            total += cpu.step(&mut cb);
        }
        assert_eq!(total, 456);
        assert_eq!(cpu.mmu().read(io::LY), 1);
        assert_eq!(cpu.lcd().line_count(), 0);
    }

    #[test]
    fn test_halt_wakes_on_vblank() {
        // EI; HALT; then a NOP sled
        let mut cpu = make_cpu(&[0xFB, 0x76]);
        cpu.mmu_mut().write(0xFFFF, Interrupt::VBlank.mask());
        cpu.mmu_mut().write(io::IF, 0);
        let mut cb = Callbacks::default();

        cpu.step(&mut cb);
        cpu.step(&mut cb);
        assert!(cpu.is_halted());

        let mut steps = 0;
        while cpu.is_halted() && steps < 100_000 {
            cpu.step(&mut cb);
            steps += 1;
        }
        assert!(!cpu.is_halted());
        assert_eq!(cpu.mmu().read(io::LY), 144);
        assert_eq!(cpu.registers().pc, Interrupt::VBlank.vector());
    }

    #[test]
    fn test_timer_interrupt_dispatch() {
        // EI; JR -2
        let mut cpu = make_cpu(&[0xFB, 0x18, 0xFE]);
        cpu.mmu_mut().write(0xFFFF, Interrupt::Timer.mask());
        cpu.mmu_mut().write(io::IF, 0);
        cpu.mmu_mut().write(io::TIMA, 0xFF);
        cpu.mmu_mut().write(io::TAC, 0x05);
        let mut cb = Callbacks::default();

        for _ in 0..20 {
            cpu.step(&mut cb);
            if cpu.registers().pc == Interrupt::Timer.vector() {
                return;
            }
        }
        panic!("timer interrupt not dispatched");
    }

    #[test]
    fn test_host_sound_writes_apply_without_stepping() {
        let mut cpu = make_cpu(&[]);
        for _ in 0..10_000 {
            cpu.write_memory(io::NR12, 0xF0);
        }
        assert_eq!(cpu.mmu().pending_apu_writes(), 0);

        cpu.write_memory(io::NR14, 0x80);
        assert_eq!(cpu.mmu().reg(io::NR52) & 0x01, 0x01);

        cpu.write_memory(io::NR52, 0x00);
        assert_eq!(cpu.mmu().reg(io::NR12), 0x00);
        assert_eq!(cpu.mmu().reg(io::NR52) & 0x0F, 0x00);
        assert_eq!(cpu.mmu().pending_apu_writes(), 0);
    }

    #[test]
    fn test_reset_keeps_memory() {
        let mut cpu = make_cpu(&[]);
        cpu.mmu_mut().write(0xC000, 0x5A);
        cpu.mmu_mut().write(io::SCX, 0x10);
        let mut cb = Callbacks::default();
        for _ in 0..100 {
            cpu.step(&mut cb);
        }
        cpu.reset();
        assert_eq!(cpu.mmu().read(0xC000), 0x5A);
        assert_eq!(cpu.mmu().read(io::SCX), 0x00);
        assert_eq!(cpu.registers().pc, 0x0100);
        assert_eq!(cpu.registers().cycles, 0);
    }
}
