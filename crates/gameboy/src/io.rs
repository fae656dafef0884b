//! I/O register addresses (0xFF00-0xFF7F) and their read-back masks.

pub const P1: u16 = 0xFF00;
pub const SB: u16 = 0xFF01;
pub const SC: u16 = 0xFF02;
pub const DIV: u16 = 0xFF04;
pub const TIMA: u16 = 0xFF05;
pub const TMA: u16 = 0xFF06;
pub const TAC: u16 = 0xFF07;
pub const IF: u16 = 0xFF0F;

pub const NR10: u16 = 0xFF10;
pub const NR11: u16 = 0xFF11;
pub const NR12: u16 = 0xFF12;
pub const NR13: u16 = 0xFF13;
pub const NR14: u16 = 0xFF14;
pub const NR21: u16 = 0xFF16;
pub const NR22: u16 = 0xFF17;
pub const NR23: u16 = 0xFF18;
pub const NR24: u16 = 0xFF19;
pub const NR30: u16 = 0xFF1A;
pub const NR31: u16 = 0xFF1B;
pub const NR32: u16 = 0xFF1C;
pub const NR33: u16 = 0xFF1D;
pub const NR34: u16 = 0xFF1E;
pub const NR41: u16 = 0xFF20;
pub const NR42: u16 = 0xFF21;
pub const NR43: u16 = 0xFF22;
pub const NR44: u16 = 0xFF23;
pub const NR50: u16 = 0xFF24;
pub const NR51: u16 = 0xFF25;
pub const NR52: u16 = 0xFF26;
pub const WAVE_RAM: u16 = 0xFF30;

pub const LCDC: u16 = 0xFF40;
pub const STAT: u16 = 0xFF41;
pub const SCY: u16 = 0xFF42;
pub const SCX: u16 = 0xFF43;
pub const LY: u16 = 0xFF44;
pub const LYC: u16 = 0xFF45;
pub const DMA: u16 = 0xFF46;
pub const BGP: u16 = 0xFF47;
pub const OBP0: u16 = 0xFF48;
pub const OBP1: u16 = 0xFF49;
pub const WY: u16 = 0xFF4A;
pub const WX: u16 = 0xFF4B;

/// Bits that read back as 1 regardless of the stored value.
pub fn read_mask(addr: u16) -> u8 {
    match addr {
        P1 => 0xC0,
        SB => 0x00,
        SC => 0x7E,
        DIV | TIMA | TMA => 0x00,
        TAC => 0xF8,
        IF => 0xE0,
        NR10 => 0x80,
        NR11 | NR21 => 0x3F,
        NR12 | NR22 | NR42 | NR43 | NR50 | NR51 => 0x00,
        NR13 | NR23 | NR31 | NR33 | NR41 => 0xFF,
        NR14 | NR24 | NR34 | NR44 => 0xBF,
        NR30 => 0x7F,
        NR32 => 0x9F,
        NR52 => 0x70,
        0xFF30..=0xFF3F => 0x00,
        STAT => 0x80,
        LCDC | SCY..=WX => 0x00,
        _ => 0xFF,
    }
}

/// Register values left behind by the DMG boot ROM
pub const POST_BOOT: &[(u16, u8)] = &[
    (P1, 0xCF),
    (SB, 0x00),
    (SC, 0x7E),
    (DIV, 0xAB),
    (TIMA, 0x00),
    (TMA, 0x00),
    (TAC, 0x00),
    (IF, 0x01),
    (NR10, 0x80),
    (NR11, 0xBF),
    (NR12, 0xF3),
    (NR13, 0xFF),
    (NR14, 0xBF),
    (NR21, 0x3F),
    (NR22, 0x00),
    (NR23, 0xFF),
    (NR24, 0xBF),
    (NR30, 0x7F),
    (NR31, 0xFF),
    (NR32, 0x9F),
    (NR33, 0xFF),
    (NR34, 0xBF),
    (NR41, 0xFF),
    (NR42, 0x00),
    (NR43, 0x00),
    (NR44, 0xBF),
    (NR50, 0x77),
    (NR51, 0xF3),
    (NR52, 0xF0),
    (LCDC, 0x91),
    (STAT, 0x80),
    (SCY, 0x00),
    (SCX, 0x00),
    (LY, 0x00),
    (LYC, 0x00),
    (DMA, 0xFF),
    (BGP, 0xFC),
    (OBP0, 0xFF),
    (OBP1, 0xFF),
    (WY, 0x00),
    (WX, 0x00),
];
