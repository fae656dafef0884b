//! Bounded host-side buffers for video and audio output.
//!
//! Hosts that cross a process or language boundary usually want fixed-size
//! buffers they can drain on their own schedule. Both buffers check capacity
//! on every append; whatever does not fit is dropped and counted.
//!
//! ```no_run
//! use std::sync::{Arc, Mutex};
//! use gameboycore::buffers::SampleBuffer;
//! use gameboycore::GameboyCore;
//!
//! let audio = Arc::new(Mutex::new(SampleBuffer::new(4096)));
//! let sink = audio.clone();
//! let mut core = GameboyCore::new();
//! core.set_audio_sample_callback(Box::new(move |samples| {
//!     if let Ok(mut buf) = sink.lock() {
//!         buf.push_slice(samples);
//!     }
//! }));
//! ```

use gb_core::types::AudioSample;

use crate::callbacks::{Scanline, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Append-only buffer with a hard capacity
#[derive(Debug, Clone)]
pub struct BoundedBuffer<T> {
    data: Vec<T>,
    capacity: usize,
    dropped: usize,
}

/// Mono samples in [-1.0, 1.0]
pub type SampleBuffer = BoundedBuffer<AudioSample>;

impl<T: Copy> BoundedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append as much of `items` as fits; returns how many were accepted.
    pub fn push_slice(&mut self, items: &[T]) -> usize {
        let room = self.capacity - self.data.len();
        let accepted = items.len().min(room);
        self.data.extend_from_slice(&items[..accepted]);
        self.dropped += items.len() - accepted;
        accepted
    }

    pub fn push(&mut self, item: T) -> bool {
        self.push_slice(&[item]) == 1
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items rejected since the last drain
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Take the contents, leaving the buffer empty and the drop count at 0
    pub fn drain(&mut self) -> Vec<T> {
        self.dropped = 0;
        std::mem::replace(&mut self.data, Vec::with_capacity(self.capacity))
    }
}

/// A 160x144 ARGB frame assembled from scanlines
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pixels: Vec<u32>,
    lines_written: usize,
    rejected: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            pixels: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            lines_written: 0,
            rejected: 0,
        }
    }

    /// Store one row. Rows outside the visible area are rejected.
    pub fn write_line(&mut self, line: &Scanline, ly: u8) -> bool {
        let y = ly as usize;
        if y >= SCREEN_HEIGHT {
            self.rejected += 1;
            return false;
        }
        self.pixels[y * SCREEN_WIDTH..(y + 1) * SCREEN_WIDTH].copy_from_slice(line);
        self.lines_written += 1;
        true
    }

    /// Rows stored since the last drain
    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Copy out the pixels and reset the counters. The pixels themselves are
    /// kept so a partially redrawn frame still shows the previous rows.
    pub fn drain(&mut self) -> Vec<u32> {
        self.lines_written = 0;
        self.rejected = 0;
        self.pixels.clone()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_buffer_drops_overflow() {
        let mut buf = SampleBuffer::new(4);
        assert_eq!(buf.push_slice(&[0.1, 0.2, 0.3]), 3);
        assert_eq!(buf.push_slice(&[0.4, 0.5, 0.6]), 1);
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.dropped(), 2);
        assert!(!buf.push(0.7));

        let out = buf.drain();
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.4]);
        assert!(buf.is_empty());
        assert_eq!(buf.dropped(), 0);
        assert!(buf.push(0.8));
    }

    #[test]
    fn test_zero_capacity_accepts_nothing() {
        let mut buf = SampleBuffer::new(0);
        assert_eq!(buf.push_slice(&[1.0]), 0);
        assert_eq!(buf.dropped(), 1);
    }

    #[test]
    fn test_frame_buffer_rows() {
        let mut fb = FrameBuffer::new();
        let line = [0xFF112233; SCREEN_WIDTH];
        assert!(fb.write_line(&line, 0));
        assert!(fb.write_line(&line, 143));
        assert!(!fb.write_line(&line, 144));
        assert_eq!(fb.lines_written(), 2);
        assert_eq!(fb.rejected(), 1);

        let pixels = fb.drain();
        assert_eq!(pixels[0], 0xFF112233);
        assert_eq!(pixels[143 * SCREEN_WIDTH + 159], 0xFF112233);
        assert_eq!(pixels[SCREEN_WIDTH], 0);
        assert_eq!(fb.lines_written(), 0);
    }
}
