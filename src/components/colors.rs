use std::fmt;
use std::str::FromStr;

use image::Rgba;

use crate::io::MaskError;

#[cfg(test)]
#[path = "colors_test.rs"]
mod colors_test;

// ============================================================================
// MASK COLOR — the RGB shared by every masked pixel
// ============================================================================

/// RGB colour of the mask overlay.  Opacity is a separate live setting
/// ([`crate::canvas::MaskStyle`]), so any alpha in a parsed colour string is
/// dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaskColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for MaskColor {
    fn default() -> Self {
        Self::BLACK
    }
}

impl MaskColor {
    pub const BLACK: MaskColor = MaskColor::new(0, 0, 0);
    pub const WHITE: MaskColor = MaskColor::new(255, 255, 255);
    pub const RED: MaskColor = MaskColor::new(255, 0, 0);
    pub const GREEN: MaskColor = MaskColor::new(0, 255, 0);
    pub const BLUE: MaskColor = MaskColor::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Swatches offered by the toolbar.
    pub fn presets() -> &'static [(&'static str, MaskColor)] {
        &[
            ("Black", MaskColor::BLACK),
            ("White", MaskColor::WHITE),
            ("Red", MaskColor::RED),
            ("Green", MaskColor::GREEN),
            ("Blue", MaskColor::BLUE),
        ]
    }

    /// Pixel value for a masked pixel with the given alpha.
    #[inline]
    pub fn with_alpha(self, alpha: u8) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, alpha])
    }

    /// Parse a CSS-style colour: `rgba(r, g, b, a)`, `rgb(r, g, b)`,
    /// `#rrggbb` or `#rgb`.
    pub fn parse(s: &str) -> Result<Self, MaskError> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();

        if let Some(hex) = lower.strip_prefix('#') {
            return Self::parse_hex(hex).ok_or_else(|| MaskError::InvalidColor(s.to_string()));
        }

        let body = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| MaskError::InvalidColor(s.to_string()))?;

        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(MaskError::InvalidColor(s.to_string()));
        }
        let channel = |p: &str| -> Result<u8, MaskError> {
            // Browsers accept fractional channels; round like they do.
            let v: f32 = p.parse().map_err(|_| MaskError::InvalidColor(s.to_string()))?;
            if !v.is_finite() {
                return Err(MaskError::InvalidColor(s.to_string()));
            }
            Ok(v.round().clamp(0.0, 255.0) as u8)
        };
        Ok(Self::new(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?))
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        let nibble = |c: u8| (c as char).to_digit(16).map(|d| d as u8);
        let bytes = hex.as_bytes();
        match bytes.len() {
            3 => {
                let r = nibble(bytes[0])?;
                let g = nibble(bytes[1])?;
                let b = nibble(bytes[2])?;
                Some(Self::new(r * 17, g * 17, b * 17))
            }
            6 => {
                let byte = |i: usize| Some(nibble(bytes[i])? * 16 + nibble(bytes[i + 1])?);
                Some(Self::new(byte(0)?, byte(2)?, byte(4)?))
            }
            _ => None,
        }
    }

    /// egui colour for overlays drawn by the host, with the given opacity.
    pub fn to_color32(self, opacity: f32) -> egui::Color32 {
        let a = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        egui::Color32::from_rgba_unmultiplied(self.r, self.g, self.b, a)
    }
}

impl FromStr for MaskColor {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MaskColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, 1)", self.r, self.g, self.b)
    }
}
