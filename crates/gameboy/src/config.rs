//! Host-facing emulator settings.

use serde::{Deserialize, Serialize};

use gb_core::ppu::ShadePalette;

/// Colours used for the four DMG shades
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorTheme {
    /// Neutral greys
    Default,
    /// Warm yellow-brown tint
    #[default]
    Gold,
    /// The original DMG green LCD
    Green,
}

impl ColorTheme {
    pub fn palette(self) -> ShadePalette {
        match self {
            ColorTheme::Default => {
                ShadePalette::from_rgb([(255, 255, 255), (196, 196, 196), (96, 96, 96), (0, 0, 0)])
            }
            ColorTheme::Gold => ShadePalette::from_rgb([
                (252, 232, 140),
                (220, 180, 92),
                (152, 124, 60),
                (76, 60, 28),
            ]),
            ColorTheme::Green => {
                ShadePalette::from_rgb([(155, 188, 15), (139, 172, 15), (48, 98, 48), (15, 56, 15)])
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Samples delivered per audio callback
    pub audio_batch: usize,
    pub color_theme: ColorTheme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            audio_batch: 512,
            color_theme: ColorTheme::default(),
        }
    }
}

impl Config {
    /// Parse settings saved by [`Config::to_json`]. Missing fields take
    /// their default values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_str(json)?;
        config.sanitize();
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn sanitize(&mut self) {
        if self.sample_rate == 0 {
            self.sample_rate = Self::default().sample_rate;
        }
        self.audio_batch = self.audio_batch.max(1);
    }
}
