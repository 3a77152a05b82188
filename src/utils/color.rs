//! Color utilities
//!
//! RGB values, hex conversion and straight-alpha compositing.

use std::fmt;

use image::Rgba;
use serde::{Deserialize, Serialize};

/// An opaque sRGB color
///
/// Serialized as a `#RRGGBB` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to hex string
    pub fn to_hex(self) -> String {
        rgb_to_hex(self.r, self.g, self.b)
    }

    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Attach an alpha channel
    pub fn with_alpha(self, alpha: u8) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, alpha])
    }

    /// Linear interpolation, `t` clamped to 0..=1
    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let (r, g, b) = blend_colors(self.to_tuple(), other.to_tuple(), t);
        Rgb::new(r, g, b)
    }

    fn to_tuple(self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Rgb::new(r, g, b)
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_hex()
    }
}

impl TryFrom<String> for Rgb {
    type Error = InvalidHexColor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_hex_color(&value).ok_or(InvalidHexColor(value))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hex color '{0}', expected #RRGGBB")]
pub struct InvalidHexColor(pub String);

/// Parse hex color string
///
/// Accepts formats: "#RRGGBB" or "RRGGBB"
pub fn parse_hex_color(hex: &str) -> Option<Rgb> {
    let hex = hex.trim_start_matches('#');

    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some(Rgb::new(r, g, b))
}

/// Convert RGB to hex string
pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{:02X}{:02X}{:02X}", r, g, b)
}

/// Blend two colors with alpha
///
/// result = fg * alpha + bg * (1 - alpha)
pub fn blend_colors(bg: (u8, u8, u8), fg: (u8, u8, u8), alpha: f32) -> (u8, u8, u8) {
    let alpha = alpha.clamp(0.0, 1.0);
    let inv_alpha = 1.0 - alpha;

    let mix = |f: u8, b: u8| (f as f32 * alpha + b as f32 * inv_alpha).round() as u8;

    (mix(fg.0, bg.0), mix(fg.1, bg.1), mix(fg.2, bg.2))
}

/// Source-over compositing of `fg` onto `bg`, both straight alpha
pub fn blend_rgba(bg: Rgba<u8>, fg: Rgba<u8>) -> Rgba<u8> {
    match fg.0[3] {
        0 => return bg,
        255 => return fg,
        _ => {}
    }

    let fg_alpha = fg.0[3] as f32 / 255.0;
    let bg_alpha = bg.0[3] as f32 / 255.0;

    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| {
        let value = (fg.0[i] as f32 * fg_alpha + bg.0[i] as f32 * bg_alpha * (1.0 - fg_alpha))
            / out_alpha;
        value.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_alpha * 255.0).round() as u8,
    ])
}

/// Scale the alpha channel by `coverage` (0..=1)
pub fn with_coverage(color: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let alpha = (color.0[3] as f32 * coverage.clamp(0.0, 1.0)).round() as u8;
    Rgba([color.0[0], color.0[1], color.0[2], alpha])
}
