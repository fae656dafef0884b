//! Error types for cartridge loading and save states.

use thiserror::Error;

/// Reasons a ROM image is rejected at load time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartridgeError {
    #[error("cartridge header truncated: {len} bytes, need at least 0x150")]
    TruncatedHeader { len: usize },

    #[error("unsupported cartridge type 0x{0:02X}")]
    UnsupportedMapper(u8),

    #[error("invalid ROM size code 0x{0:02X}")]
    InvalidRomSize(u8),

    #[error("invalid RAM size code 0x{0:02X}")]
    InvalidRamSize(u8),
}

/// Reasons a save state is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("save state size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("not a save state (bad magic)")]
    BadMagic,

    #[error("unsupported save state version {0}")]
    UnsupportedVersion(u16),

    #[error("save state belongs to a different cartridge")]
    RomMismatch,

    #[error("save state payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("corrupt save state: {0}")]
    Decode(String),

    #[error("failed to encode save state: {0}")]
    Encode(String),
}

/// Errors surfaced by the `GameboyCore` facade
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("no cartridge loaded")]
    NoCartridge,

    #[error(transparent)]
    Cartridge(#[from] CartridgeError),

    #[error(transparent)]
    State(#[from] StateError),
}
