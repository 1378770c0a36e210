//! Hex color values stored in the config tree
//!
//! Colors travel as strings (`#RRGGBB` or `#AARRGGBB`, leading `#` optional)
//! and are kept parsed so consumers never re-validate them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// ARGB color parsed from a hex string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor {
    pub alpha: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl HexColor {
    pub const WHITE: HexColor = HexColor::rgb(0xFF, 0xFF, 0xFF);
    pub const BLACK: HexColor = HexColor::rgb(0x00, 0x00, 0x00);

    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { alpha: 0xFF, red, green, blue }
    }

    pub const fn from_argb32(argb: u32) -> Self {
        Self {
            alpha: (argb >> 24) as u8,
            red: (argb >> 16) as u8,
            green: (argb >> 8) as u8,
            blue: argb as u8,
        }
    }

    pub const fn argb32(self) -> u32 {
        (self.alpha as u32) << 24
            | (self.red as u32) << 16
            | (self.green as u32) << 8
            | self.blue as u32
    }

    /// Parse `RRGGBB` / `AARRGGBB`, with or without a leading `#`.
    /// Six-digit input gets full opacity.
    pub fn parse(input: &str) -> Option<Self> {
        let digits = input.strip_prefix('#').unwrap_or(input);
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let value = u32::from_str_radix(digits, 16).ok()?;
        match digits.len() {
            6 => Some(Self::from_argb32(0xFF00_0000 | value)),
            8 => Some(Self::from_argb32(value)),
            _ => None,
        }
    }

    /// Channels scaled to `0.0..=1.0`, in RGBA order
    pub fn to_rgba_f32(self) -> [f32; 4] {
        [
            f32::from(self.red) / 255.0,
            f32::from(self.green) / 255.0,
            f32::from(self.blue) / 255.0,
            f32::from(self.alpha) / 255.0,
        ]
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alpha == 0xFF {
            write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
        } else {
            write!(f, "#{:08x}", self.argb32())
        }
    }
}

impl FromStr for HexColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("'{s}' is not a #RRGGBB or #AARRGGBB color"))
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
