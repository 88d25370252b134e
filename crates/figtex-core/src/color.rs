use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Opaque 8-bit RGB color. Translucency is a property of the shape, not the color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Components scaled to `0.0..=1.0`, the form PostScript and LaTeX `\color[rgb]` expect.
    pub fn unit(self) -> [f64; 3] {
        [
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0,
        ]
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn scaled(self, k: f64) -> Self {
        let s = |c: u8| (f64::from(c) * k).round().clamp(0.0, 255.0) as u8;
        Self::rgb(s(self.r), s(self.g), s(self.b))
    }

    pub fn lerp(self, other: Color, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Self::rgb(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
        )
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        parse_color(text).ok_or_else(|| Error::InvalidColor {
            value: text.to_string(),
        })
    }
}

impl TryFrom<String> for Color {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_hex()
    }
}

/// A background or face fill: either a color or nothing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Fill {
    #[default]
    None,
    Color(Color),
}

impl Fill {
    pub fn color(self) -> Option<Color> {
        match self {
            Fill::None => None,
            Fill::Color(c) => Some(c),
        }
    }
}

impl FromStr for Fill {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "none" | "transparent" => Ok(Fill::None),
            _ => Ok(Fill::Color(text.parse()?)),
        }
    }
}

impl TryFrom<String> for Fill {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Fill> for String {
    fn from(value: Fill) -> Self {
        match value {
            Fill::None => "none".to_string(),
            Fill::Color(c) => c.to_hex(),
        }
    }
}

fn parse_color(text: &str) -> Option<Color> {
    let s = text.trim().to_ascii_lowercase();
    match s.as_str() {
        "white" | "w" => return Some(Color::WHITE),
        "black" | "k" => return Some(Color::BLACK),
        "red" | "r" => return Some(Color::rgb(255, 0, 0)),
        "green" | "g" => return Some(Color::rgb(0, 255, 0)),
        "blue" | "b" => return Some(Color::rgb(0, 0, 255)),
        _ => {}
    }

    let hex = s.strip_prefix('#')?;
    fn hex2(b: &[u8]) -> Option<u8> {
        let hi = (*b.first()? as char).to_digit(16)? as u8;
        let lo = (*b.get(1)? as char).to_digit(16)? as u8;
        Some((hi << 4) | lo)
    }
    fn hex1(c: u8) -> Option<u8> {
        let v = (c as char).to_digit(16)? as u8;
        Some((v << 4) | v)
    }

    let bytes = hex.as_bytes();
    match bytes.len() {
        3 => Some(Color::rgb(
            hex1(bytes[0])?,
            hex1(bytes[1])?,
            hex1(bytes[2])?,
        )),
        6 => Some(Color::rgb(
            hex2(&bytes[0..2])?,
            hex2(&bytes[2..4])?,
            hex2(&bytes[4..6])?,
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_hex_colors() {
        assert_eq!("white".parse::<Color>().unwrap(), Color::WHITE);
        assert_eq!("#f00".parse::<Color>().unwrap(), Color::rgb(255, 0, 0));
        assert_eq!("#102030".parse::<Color>().unwrap(), Color::rgb(16, 32, 48));
        assert!("#12345".parse::<Color>().is_err());
    }

    #[test]
    fn fill_none_round_trips_through_strings() {
        assert_eq!("none".parse::<Fill>().unwrap(), Fill::None);
        assert_eq!(String::from(Fill::Color(Color::BLACK)), "#000000");
    }
}
