//! Core emulator primitives and traits.

pub mod cpu_lr35902;
pub mod logging;
pub mod ppu;
pub mod types {
    use serde::{Deserialize, Serialize};

    /// A framebuffer of 32-bit ARGB pixels, row-major.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }

        /// Mutable view of one row, or None past the bottom edge.
        pub fn row_mut(&mut self, y: usize) -> Option<&mut [u32]> {
            let width = self.width as usize;
            self.pixels.get_mut(y * width..(y + 1) * width)
        }
    }

    /// Mono audio sample in the range [-1.0, 1.0]
    pub type AudioSample = f32;
}

/// A complete machine a host can drive frame by frame.
pub trait Machine {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset to initial power-on state
    fn reset(&mut self);

    /// Emulate until a frame is produced and return a framebuffer.
    fn step_frame(&mut self) -> Result<types::Frame, Self::Error>;

    /// Capture the machine state as bytes.
    /// Save states do not include ROM contents.
    fn save_state(&self) -> Result<Vec<u8>, Self::Error>;

    /// Restore a state produced by `save_state`. On error the machine is
    /// left as it was.
    fn load_state(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Check if this machine supports save/load state functionality
    fn supports_save_states(&self) -> bool {
        false
    }
}
