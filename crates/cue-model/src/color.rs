//! Hex colors with a `transparent` sentinel.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A style color.
///
/// Serialized as `#rrggbbaa` (or `transparent`); parsed from `#rgb`,
/// `#rrggbb`, `#rrggbbaa` or `transparent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Color {
    /// Draw nothing.
    Transparent,
    /// Straight (non-premultiplied) RGBA.
    Rgba([u8; 4]),
}

impl Color {
    pub const WHITE: Color = Color::Rgba([255, 255, 255, 255]);
    pub const BLACK: Color = Color::Rgba([0, 0, 0, 255]);

    /// Parse a color string.
    pub fn parse(value: &str) -> Result<Self, ModelError> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("transparent") {
            return Ok(Color::Transparent);
        }

        let invalid = || ModelError::InvalidColor {
            value: value.to_string(),
        };

        let hex = trimmed.strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let mut rgba = [255u8; 4];
                for (i, c) in hex.chars().enumerate() {
                    let v = channel(&c.to_string())?;
                    rgba[i] = v * 17;
                }
                Ok(Color::Rgba(rgba))
            }
            6 | 8 => {
                let mut rgba = [255u8; 4];
                for i in 0..hex.len() / 2 {
                    rgba[i] = channel(&hex[i * 2..i * 2 + 2])?;
                }
                Ok(Color::Rgba(rgba))
            }
            _ => Err(invalid()),
        }
    }

    pub fn is_transparent(&self) -> bool {
        matches!(self, Color::Transparent)
    }

    /// RGBA channels, with `opacity` multiplied into alpha.
    ///
    /// Returns `None` for the transparent sentinel.
    pub fn with_opacity(&self, opacity: f64) -> Option<[u8; 4]> {
        match self {
            Color::Transparent => None,
            Color::Rgba([r, g, b, a]) => {
                let alpha = (*a as f64 * opacity.clamp(0.0, 1.0)).round() as u8;
                Some([*r, *g, *b, alpha])
            }
        }
    }
}

impl FromStr for Color {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::parse(s)
    }
}

impl TryFrom<String> for Color {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Transparent => f.write_str("transparent"),
            Color::Rgba([r, g, b, a]) => write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}"),
        }
    }
}
