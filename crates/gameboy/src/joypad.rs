//! Joypad input (P1, 0xFF00).
//!
//! The eight keys form a 2×4 matrix. The game selects a group by pulling
//! bit 4 (directions) or bit 5 (buttons) low; the low nibble then reads 0
//! for each pressed key of the selected group(s). The selection is resolved
//! at read time, so key changes are visible immediately.

use serde::{Deserialize, Serialize};

/// The eight Game Boy keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Key {
    pub const ALL: [Key; 8] = [
        Key::Right,
        Key::Left,
        Key::Up,
        Key::Down,
        Key::A,
        Key::B,
        Key::Select,
        Key::Start,
    ];

    /// Bit in the pressed mask: directions in the low nibble, buttons high
    fn mask(self) -> u8 {
        match self {
            Key::Right => 0x01,
            Key::Left => 0x02,
            Key::Up => 0x04,
            Key::Down => 0x08,
            Key::A => 0x10,
            Key::B => 0x20,
            Key::Select => 0x40,
            Key::Start => 0x80,
        }
    }
}

const SELECT_DIRECTIONS: u8 = 0x10;
const SELECT_BUTTONS: u8 = 0x20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Joypad {
    pressed: u8,
    select: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            pressed: 0,
            select: SELECT_DIRECTIONS | SELECT_BUTTONS,
        }
    }

    /// Returns true when the key was not already held, which is when the
    /// joypad interrupt fires.
    pub fn press(&mut self, key: Key) -> bool {
        let newly = self.pressed & key.mask() == 0;
        self.pressed |= key.mask();
        newly
    }

    pub fn release(&mut self, key: Key) {
        self.pressed &= !key.mask();
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed & key.mask() != 0
    }

    pub fn pressed_mask(&self) -> u8 {
        self.pressed
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & (SELECT_DIRECTIONS | SELECT_BUTTONS);
    }

    pub fn read(&self) -> u8 {
        let mut low = 0x0F;
        if self.select & SELECT_DIRECTIONS == 0 {
            low &= !(self.pressed & 0x0F);
        }
        if self.select & SELECT_BUTTONS == 0 {
            low &= !(self.pressed >> 4);
        }
        0xC0 | self.select | low
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_group_selected_reads_high() {
        let mut joy = Joypad::new();
        joy.press(Key::A);
        joy.press(Key::Down);
        assert_eq!(joy.read(), 0xFF);
    }

    #[test]
    fn test_direction_group() {
        let mut joy = Joypad::new();
        joy.press(Key::Left);
        joy.press(Key::Start);
        joy.write(0x20); // Bit 4 low: directions
        assert_eq!(joy.read(), 0xE0 | 0x0D);
    }

    #[test]
    fn test_button_group() {
        let mut joy = Joypad::new();
        joy.press(Key::Left);
        joy.press(Key::Start);
        joy.write(0x10); // Bit 5 low: buttons
        assert_eq!(joy.read(), 0xD0 | 0x07);
    }

    #[test]
    fn test_selection_resolved_at_read_time() {
        let mut joy = Joypad::new();
        joy.write(0x10);
        assert_eq!(joy.read() & 0x0F, 0x0F);
        joy.press(Key::B);
        assert_eq!(joy.read() & 0x0F, 0x0D);
        joy.release(Key::B);
        assert_eq!(joy.read() & 0x0F, 0x0F);
    }

    #[test]
    fn test_press_reports_new_edges() {
        let mut joy = Joypad::new();
        assert!(joy.press(Key::Select));
        assert!(!joy.press(Key::Select));
        assert!(joy.is_pressed(Key::Select));
        joy.release(Key::Select);
        assert!(joy.press(Key::Select));
        assert_eq!(joy.pressed_mask(), 0x40);
    }
}
