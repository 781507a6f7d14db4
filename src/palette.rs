//! Agent colours.
//!
//! Agents are split into contiguous colour classes: agent `i` uses palette
//! entry `i / ceil(population / palette_len)`. On the GPU this grouping is the
//! per-instance "divisor" that both the kernel and the compositor receive.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Maximum number of palette entries uploaded to the GPU.
pub const MAX_PALETTE: usize = 16;

/// Linear RGBA colour in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    #[serde(default = "opaque")]
    pub a: f32,
}

fn opaque() -> f32 {
    1.0
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const YELLOW: Color = Color::rgb(1.0, 1.0, 0.0);
    pub const CYAN: Color = Color::rgb(0.0, 1.0, 1.0);
    pub const MAGENTA: Color = Color::rgb(1.0, 0.0, 1.0);
    pub const ORANGE: Color = Color::rgb(1.0, 0.5, 0.0);
    pub const PINK: Color = Color::rgb(1.0, 0.5, 0.5);
    pub const LIME: Color = Color::rgb(0.5, 1.0, 0.5);
    pub const TEAL: Color = Color::rgb(0.0, 0.5, 0.5);
    pub const INDIGO: Color = Color::rgb(0.5, 0.0, 1.0);
    pub const SLATE: Color = Color::rgb(0.18, 0.24, 0.31);

    /// Look a colour up by its lowercase name.
    pub fn named(name: &str) -> Option<Self> {
        let color = match name {
            "red" => Self::RED,
            "green" => Self::GREEN,
            "blue" => Self::BLUE,
            "white" => Self::WHITE,
            "black" => Self::BLACK,
            "yellow" => Self::YELLOW,
            "cyan" => Self::CYAN,
            "magenta" | "purple" => Self::MAGENTA,
            "orange" => Self::ORANGE,
            "pink" => Self::PINK,
            "lime" => Self::LIME,
            "teal" => Self::TEAL,
            "indigo" => Self::INDIGO,
            "slate" => Self::SLATE,
            _ => return None,
        };
        Some(color)
    }

    /// Parse `#rrggbb` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .ok()
                .map(|v| v as f32 / 255.0)
        };
        Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

/// Ordered list of agent colour classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Color>", into = "Vec<Color>")]
pub struct Palette {
    colors: Vec<Color>,
}

impl Palette {
    pub fn new(colors: Vec<Color>) -> Result<Self, ConfigError> {
        if colors.is_empty() || colors.len() > MAX_PALETTE {
            return Err(ConfigError::PaletteSize {
                len: colors.len(),
                max: MAX_PALETTE,
            });
        }
        Ok(Self { colors })
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// Number of consecutive agents that share one palette entry.
    ///
    /// Never zero, so an empty population still yields a valid divisor.
    pub fn divisor(&self, population: u32) -> u32 {
        population.div_ceil(self.len() as u32).max(1)
    }

    /// Palette index of agent `index` in a population of `population`.
    pub fn class_of(&self, index: u32, population: u32) -> usize {
        ((index / self.divisor(population)) as usize).min(self.len() - 1)
    }

    /// Fixed-size GPU copy, unused slots zeroed.
    pub fn to_gpu(&self) -> [[f32; 4]; MAX_PALETTE] {
        let mut out = [[0.0; 4]; MAX_PALETTE];
        for (slot, color) in out.iter_mut().zip(&self.colors) {
            *slot = color.to_array();
        }
        out
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: vec![Color::RED, Color::CYAN, Color::YELLOW],
        }
    }
}

impl TryFrom<Vec<Color>> for Palette {
    type Error = ConfigError;

    fn try_from(colors: Vec<Color>) -> Result<Self, Self::Error> {
        Palette::new(colors)
    }
}

impl From<Palette> for Vec<Color> {
    fn from(palette: Palette) -> Self {
        palette.colors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisor_rounds_up() {
        let palette = Palette::default();
        assert_eq!(palette.divisor(1000), 334);
        assert_eq!(palette.divisor(3), 1);
        assert_eq!(palette.divisor(0), 1);
    }

    #[test]
    fn classes_are_contiguous_ranges() {
        let palette = Palette::default();
        assert_eq!(palette.class_of(0, 1000), 0);
        assert_eq!(palette.class_of(333, 1000), 0);
        assert_eq!(palette.class_of(334, 1000), 1);
        assert_eq!(palette.class_of(999, 1000), 2);
    }

    #[test]
    fn class_never_exceeds_palette() {
        let palette =
            Palette::new(vec![Color::RED, Color::GREEN, Color::BLUE, Color::WHITE]).unwrap();
        for i in 0..10 {
            assert!(palette.class_of(i, 10) < palette.len());
        }
    }

    #[test]
    fn rejects_oversized_palette() {
        let colors = vec![Color::WHITE; MAX_PALETTE + 1];
        assert!(matches!(Palette::new(colors), Err(ConfigError::PaletteSize { .. })));
        assert!(Palette::new(Vec::new()).is_err());
    }

    #[test]
    fn gpu_copy_zero_pads() {
        let gpu = Palette::default().to_gpu();
        assert_eq!(gpu[0], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(gpu[3], [0.0; 4]);
    }

    #[test]
    fn parses_hex_and_names() {
        assert_eq!(Color::from_hex("#ff0000"), Some(Color::RED));
        assert_eq!(Color::from_hex("00ffff"), Some(Color::CYAN));
        assert_eq!(Color::from_hex("#12345"), None);
        assert_eq!(Color::named("slate"), Some(Color::SLATE));
        assert_eq!(Color::named("mauve"), None);
    }

    #[test]
    fn palette_deserializes_from_list() {
        let palette: Palette = serde_json::from_str(r#"[{"r":1,"g":0,"b":0}]"#).unwrap();
        assert_eq!(palette.colors(), &[Color::RED]);
        assert!(serde_json::from_str::<Palette>("[]").is_err());
    }
}
