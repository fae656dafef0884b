//! Game Boy APU (Audio Processing Unit)
//!
//! Four channels:
//!
//! 1. Square with sweep (NR10-NR14)
//! 2. Square (NR21-NR24)
//! 3. Programmable wave (NR30-NR34, wave RAM at $FF30-$FF3F)
//! 4. Noise (NR41-NR44)
//!
//! NR50 sets the master volume per side, NR51 routes each channel to the
//! left and right outputs and NR52 powers the unit and reports which
//! channels are playing.
//!
//! ## Frame Sequencer
//!
//! Runs at 512 Hz (every 8192 cycles):
//! - Steps 0, 2, 4, 6: length counters
//! - Steps 2, 6: sweep
//! - Step 7: envelopes
//!
//! ## Output
//!
//! Channels are clocked at CPU speed. The mixer produces mono `f32` samples
//! in [-1.0, 1.0] at the configured sample rate and hands them to the audio
//! callback in fixed-size batches.
//!
//! Register writes reach the APU through the MMU's write queue and are
//! applied at the start of the next `tick`.

pub mod envelope;
pub mod length_counter;
pub mod noise;
pub mod square;
pub mod sweep;
pub mod wave;

use serde::{Deserialize, Serialize};

use gb_core::logging::{log, LogCategory, LogLevel};
use gb_core::types::AudioSample;

use crate::callbacks::Callbacks;
use crate::io;
use crate::mmu::Mmu;

pub use noise::NoiseChannel;
pub use square::SquareChannel;
pub use wave::WaveChannel;

pub const CPU_CLOCK_HZ: u32 = 4_194_304;
const FRAME_SEQUENCER_PERIOD: u32 = 8192;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Apu {
    pub square1: SquareChannel,
    pub square2: SquareChannel,
    pub wave: WaveChannel,
    pub noise: NoiseChannel,

    frame_seq_cycles: u32,
    frame_seq_step: u8,

    /// Output rate, in samples per second
    sample_rate: u32,
    /// Samples per callback batch
    batch_size: usize,
    /// Fractional sample position, in units of 1/sample_rate cycles
    sample_phase: u32,
    /// Samples not yet delivered
    samples: Vec<AudioSample>,

    /// Scratch queue exchanged with the MMU
    #[serde(skip)]
    writes: Vec<(u16, u8)>,
}

impl Apu {
    pub fn new(sample_rate: u32, batch_size: usize) -> Self {
        let sample_rate = sample_rate.clamp(1, CPU_CLOCK_HZ);
        let batch_size = batch_size.max(1);
        Self {
            square1: SquareChannel::with_sweep(),
            square2: SquareChannel::new(),
            wave: WaveChannel::new(),
            noise: NoiseChannel::new(),
            frame_seq_cycles: 0,
            frame_seq_step: 0,
            sample_rate,
            batch_size,
            sample_phase: 0,
            samples: Vec::with_capacity(batch_size),
            writes: Vec::new(),
        }
    }

    /// Silence all channels and restart the sequencer. Output settings and
    /// undelivered samples are kept.
    pub fn reset(&mut self) {
        self.power_off();
        self.sample_phase = 0;
    }

    fn power_off(&mut self) {
        self.square1 = SquareChannel::with_sweep();
        self.square2 = SquareChannel::new();
        self.wave = WaveChannel::new();
        self.noise = NoiseChannel::new();
        self.frame_seq_cycles = 0;
        self.frame_seq_step = 0;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Take channel state from a snapshot, keeping this instance's output
    /// settings.
    pub(crate) fn restore(&mut self, saved: Apu) {
        let sample_rate = self.sample_rate;
        let batch_size = self.batch_size;
        let writes = std::mem::take(&mut self.writes);
        *self = saved;
        self.sample_rate = sample_rate;
        self.batch_size = batch_size;
        self.writes = writes;
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.frame_seq_cycles < FRAME_SEQUENCER_PERIOD && self.sample_phase < CPU_CLOCK_HZ
    }

    fn write(&mut self, mmu: &mut Mmu, addr: u16, val: u8) {
        match addr {
            io::NR10..=io::NR14 => self.square1.write(addr - io::NR10, val),
            0xFF15..=io::NR24 => self.square2.write(addr - 0xFF15, val),
            io::NR30..=io::NR34 => self.wave.write(addr - io::NR30, val),
            0xFF1F..=io::NR44 => self.noise.write(addr - 0xFF1F, val),
            io::NR52 => {
                if val & 0x80 == 0 {
                    log(LogCategory::Apu, LogLevel::Debug, || "APU powered off".to_string());
                    self.power_off();
                    for reg in io::NR10..=io::NR51 {
                        *mmu.reg_mut(reg) = 0;
                    }
                }
            }
            // NR50/NR51 are read back from the register file when mixing
            _ => {}
        }
    }

    fn clock_frame_sequencer(&mut self) {
        match self.frame_seq_step {
            0 | 4 => self.clock_lengths(),
            2 | 6 => {
                self.clock_lengths();
                self.square1.clock_sweep();
            }
            7 => {
                self.square1.envelope.clock();
                self.square2.envelope.clock();
                self.noise.envelope.clock();
            }
            _ => {}
        }
        self.frame_seq_step = (self.frame_seq_step + 1) & 7;
    }

    fn clock_lengths(&mut self) {
        self.square1.clock_length();
        self.square2.clock_length();
        self.wave.clock_length();
        self.noise.clock_length();
    }

    /// Mix the four channels through NR51 routing and NR50 volume
    fn mix(&self, nr50: u8, nr51: u8) -> AudioSample {
        let dac = |enabled: bool, out: u8| -> f32 {
            if enabled {
                out as f32 / 7.5 - 1.0
            } else {
                0.0
            }
        };
        let channels = [
            dac(self.square1.dac_enabled(), self.square1.output()),
            dac(self.square2.dac_enabled(), self.square2.output()),
            dac(self.wave.dac_enabled(), self.wave.output()),
            dac(self.noise.dac_enabled(), self.noise.output()),
        ];

        let mut left = 0.0;
        let mut right = 0.0;
        for (i, &sample) in channels.iter().enumerate() {
            if nr51 & (0x10 << i) != 0 {
                left += sample;
            }
            if nr51 & (0x01 << i) != 0 {
                right += sample;
            }
        }
        let left_vol = (((nr50 >> 4) & 0x07) + 1) as f32 / 8.0;
        let right_vol = ((nr50 & 0x07) + 1) as f32 / 8.0;

        ((left * left_vol + right * right_vol) / 8.0).clamp(-1.0, 1.0)
    }

    fn status_bits(&self) -> u8 {
        (self.square1.enabled as u8)
            | (self.square2.enabled as u8) << 1
            | (self.wave.enabled as u8) << 2
            | (self.noise.enabled as u8) << 3
    }

    /// Apply sound register writes queued in `mmu` and refresh the NR52
    /// channel status bits.
    pub(crate) fn apply_writes(&mut self, mmu: &mut Mmu) {
        mmu.swap_apu_writes(&mut self.writes);
        let mut writes = std::mem::take(&mut self.writes);
        for (addr, val) in writes.drain(..) {
            self.write(mmu, addr, val);
        }
        self.writes = writes;
        self.refresh_status(mmu);
    }

    fn refresh_status(&self, mmu: &mut Mmu) {
        let nr52 = mmu.reg_mut(io::NR52);
        *nr52 = (*nr52 & 0x80) | self.status_bits();
    }

    /// Advance by `cycles` CPU cycles, emitting samples as they fall due
    pub fn tick(&mut self, mmu: &mut Mmu, cycles: u32, callbacks: &mut Callbacks) {
        self.apply_writes(mmu);

        let powered = mmu.apu_powered();
        let nr50 = mmu.reg(io::NR50);
        let nr51 = mmu.reg(io::NR51);

        let mut remaining = cycles;
        while remaining > 0 {
            // Cycles until the next sample point (ceiling division)
            let to_sample =
                (CPU_CLOCK_HZ - self.sample_phase).div_ceil(self.sample_rate).max(1);
            let to_sequencer = FRAME_SEQUENCER_PERIOD - self.frame_seq_cycles;
            let step = remaining.min(to_sample).min(to_sequencer);

            if powered {
                self.square1.tick(step);
                self.square2.tick(step);
                self.wave.tick(step, mmu.wave_ram());
                self.noise.tick(step);

                self.frame_seq_cycles += step;
                if self.frame_seq_cycles >= FRAME_SEQUENCER_PERIOD {
                    self.frame_seq_cycles -= FRAME_SEQUENCER_PERIOD;
                    self.clock_frame_sequencer();
                }
            }

            self.sample_phase += step * self.sample_rate;
            if self.sample_phase >= CPU_CLOCK_HZ {
                self.sample_phase -= CPU_CLOCK_HZ;
                let sample = if powered { self.mix(nr50, nr51) } else { 0.0 };
                self.samples.push(sample);
                if self.samples.len() >= self.batch_size {
                    callbacks.emit_audio(&self.samples);
                    self.samples.clear();
                }
            }
            remaining -= step;
        }

        self.refresh_status(mmu);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappers::Mapper;
    use std::sync::{Arc, Mutex};

    fn setup(sample_rate: u32, batch: usize) -> (Apu, Mmu) {
        let mapper = Mapper::from_cart_type(0x00).expect("rom only");
        let mmu = Mmu::new(vec![0; 0x8000], mapper, 0);
        (Apu::new(sample_rate, batch), mmu)
    }

    fn collect(cb: &mut Callbacks) -> Arc<Mutex<Vec<f32>>> {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink = out.clone();
        cb.audio = Some(Box::new(move |batch| sink.lock().unwrap().extend_from_slice(batch)));
        out
    }

    #[test]
    fn test_sample_rate_over_one_second() {
        let (mut apu, mut mmu) = setup(44100, 512);
        let mut cb = Callbacks::default();
        let out = collect(&mut cb);

        for _ in 0..CPU_CLOCK_HZ / 16 {
            apu.tick(&mut mmu, 16, &mut cb);
        }
        let delivered = out.lock().unwrap().len();
        assert_eq!(delivered + apu.samples.len(), 44100);
        assert_eq!(delivered % 512, 0);
    }

    #[test]
    fn test_batches_have_configured_size() {
        let (mut apu, mut mmu) = setup(32768, 4);
        let mut cb = Callbacks::default();
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink = sizes.clone();
        cb.audio = Some(Box::new(move |b| sink.lock().unwrap().push(b.len())));

        // 128 cycles per sample
        apu.tick(&mut mmu, 128 * 9, &mut cb);
        assert_eq!(*sizes.lock().unwrap(), vec![4, 4]);
        assert_eq!(apu.samples.len(), 1);
    }

    #[test]
    fn test_register_writes_trigger_channels() {
        let (mut apu, mut mmu) = setup(44100, 512);
        let mut cb = Callbacks::default();
        mmu.write(io::NR22, 0xF0);
        mmu.write(io::NR24, 0x80);
        apu.tick(&mut mmu, 4, &mut cb);
        assert!(apu.square2.enabled);
        assert_eq!(mmu.read(io::NR52) & 0x0F, 0x02);
    }

    #[test]
    fn test_length_expiry_clears_status() {
        let (mut apu, mut mmu) = setup(44100, 512);
        let mut cb = Callbacks::default();
        mmu.write(io::NR12, 0xF0);
        mmu.write(io::NR11, 63); // one length step
        mmu.write(io::NR14, 0xC0);
        apu.tick(&mut mmu, 4, &mut cb);
        assert_eq!(mmu.read(io::NR52) & 0x01, 0x01);

        apu.tick(&mut mmu, FRAME_SEQUENCER_PERIOD, &mut cb);
        assert_eq!(mmu.read(io::NR52) & 0x01, 0x00);
    }

    #[test]
    fn test_power_off_clears_registers_and_silences() {
        let (mut apu, mut mmu) = setup(32768, 1);
        let mut cb = Callbacks::default();
        let out = collect(&mut cb);
        mmu.write(io::NR12, 0xF0);
        mmu.write(io::NR14, 0x80);
        apu.tick(&mut mmu, 4, &mut cb);

        mmu.write(io::NR52, 0x00);
        apu.tick(&mut mmu, 128 * 4, &mut cb);
        assert_eq!(mmu.reg(io::NR12), 0);
        assert!(!apu.square1.enabled);
        assert_eq!(mmu.read(io::NR52) & 0x8F, 0x00);
        let out = out.lock().unwrap();
        assert!(out[out.len() - 4..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_samples_stay_in_range() {
        let (mut apu, mut mmu) = setup(44100, 64);
        let mut cb = Callbacks::default();
        let out = collect(&mut cb);
        mmu.write(io::NR50, 0x77);
        mmu.write(io::NR51, 0xFF);
        for (reg, val) in [(io::NR12, 0xF0), (io::NR22, 0xF0), (io::NR42, 0xF0), (io::NR30, 0x80)] {
            mmu.write(reg, val);
        }
        mmu.write(io::NR32, 0x20);
        for reg in [io::NR14, io::NR24, io::NR34, io::NR44] {
            mmu.write(reg, 0x80);
        }
        for _ in 0..10_000 {
            apu.tick(&mut mmu, 8, &mut cb);
        }
        let out = out.lock().unwrap();
        assert!(!out.is_empty());
        assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!(out.iter().any(|&s| s != out[0]));
    }

    #[test]
    fn test_unrouted_channels_are_silent() {
        let (mut apu, mut mmu) = setup(32768, 1);
        let mut cb = Callbacks::default();
        let out = collect(&mut cb);
        mmu.write(io::NR51, 0x00);
        mmu.write(io::NR22, 0xF0);
        mmu.write(io::NR24, 0x80);
        apu.tick(&mut mmu, 128 * 16, &mut cb);
        assert!(out.lock().unwrap().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_restore_keeps_output_settings() {
        let (mut apu, mut mmu) = setup(22050, 256);
        let mut cb = Callbacks::default();
        mmu.write(io::NR22, 0xF0);
        mmu.write(io::NR24, 0x80);
        apu.tick(&mut mmu, 100, &mut cb);
        let saved = apu.clone();

        let mut other = Apu::new(48000, 128);
        other.restore(saved);
        assert!(other.square2.enabled);
        assert_eq!(other.sample_rate(), 48000);
    }
}
