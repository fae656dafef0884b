//! Host callbacks for video and audio output.
//!
//! Callbacks run synchronously on the emulation thread, from inside
//! `update`/`emulate_frame`. They must return quickly and must not call back
//! into the emulator: any time spent in them stalls emulation.

use std::fmt;

use gb_core::types::{AudioSample, Frame};

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

/// One row of ARGB pixels
pub type Scanline = [u32; SCREEN_WIDTH];

/// Receives each rendered row with its line index (0-143)
pub type ScanlineCallback = Box<dyn FnMut(&Scanline, u8) + Send>;
/// Receives the completed frame when V-Blank begins
pub type VBlankCallback = Box<dyn FnMut(&Frame) + Send>;
/// Receives a batch of mono samples in [-1.0, 1.0]
pub type AudioSampleCallback = Box<dyn FnMut(&[AudioSample]) + Send>;

#[derive(Default)]
pub struct Callbacks {
    pub scanline: Option<ScanlineCallback>,
    pub vblank: Option<VBlankCallback>,
    pub audio: Option<AudioSampleCallback>,
}

impl Callbacks {
    pub(crate) fn emit_scanline(&mut self, line: &Scanline, ly: u8) {
        if let Some(cb) = self.scanline.as_mut() {
            cb(line, ly);
        }
    }

    pub(crate) fn emit_vblank(&mut self, frame: &Frame) {
        if let Some(cb) = self.vblank.as_mut() {
            cb(frame);
        }
    }

    pub(crate) fn emit_audio(&mut self, samples: &[AudioSample]) {
        if let Some(cb) = self.audio.as_mut() {
            cb(samples);
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("scanline", &self.scanline.is_some())
            .field("vblank", &self.vblank.is_some())
            .field("audio", &self.audio.is_some())
            .finish()
    }
}
