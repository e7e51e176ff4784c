//! ARGB colour values used by the banner and text renderer.

use image::Rgba;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// A colour packed as `0xAARRGGBB`.
///
/// The alpha byte is a transparency: `0x00` is opaque and `0xFF` is fully
/// transparent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Colour(pub u32);

impl Colour {
    pub const BLACK: Colour = Colour(0x0000_0000);
    pub const WHITE: Colour = Colour(0x00FF_FFFF);

    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn rgb(self) -> [u8; 3] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }

    /// Keep only the alpha byte; used for text shadows.
    pub fn alpha_only(self) -> Colour {
        Colour(self.0 & 0xFF00_0000)
    }

    /// Convert to the font engine's 7-bit transparency scale.
    ///
    /// The engine composites with half the range, so the alpha byte is halved
    /// while the colour channels are left untouched.
    pub fn for_engine(self) -> Colour {
        Colour((((self.0 & 0xFF00_0000) >> 1) & 0xFF00_0000) | (self.0 & 0x00FF_FFFF))
    }

    /// Pixel for a colour already on the engine scale (transparency 0..=127).
    pub fn engine_rgba(self) -> Rgba<u8> {
        let transparency = u32::from(self.alpha().min(127));
        let opacity = 255 - (transparency * 255 / 127);
        let [r, g, b] = self.rgb();
        Rgba([r, g, b, opacity as u8])
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

/// Error returned when a colour string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColourError(pub String);

impl fmt::Display for ParseColourError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid colour '{}', expected #RRGGBB or #AARRGGBB",
            self.0
        )
    }
}

impl std::error::Error for ParseColourError {}

impl FromStr for Colour {
    type Err = ParseColourError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 && hex.len() != 8 {
            return Err(ParseColourError(s.to_string()));
        }
        u32::from_str_radix(hex, 16)
            .map(Colour)
            .map_err(|_| ParseColourError(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for Colour {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
