use std::fmt;
use std::str::FromStr;

use palette::{Darken, FromColor, Hsl, Hsv, Lab, Lighten, LinSrgb, Saturate, Srgb};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// An 8-bit sRGB color, rendered as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hex color '{0}'; expected #rgb or #rrggbb")]
pub struct ParseColorError(String);

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn gray(value: u8) -> Self {
        Self::rgb(value, value, value)
    }

    /// Components as floats in `[0, 1]`.
    pub fn to_srgb(self) -> Srgb {
        Srgb::new(
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        )
    }

    pub fn from_srgb(color: Srgb) -> Self {
        Self::rgb(
            quantize(color.red),
            quantize(color.green),
            quantize(color.blue),
        )
    }

    /// HSV saturation in `[0, 1]`.
    pub fn saturation(self) -> f32 {
        let hsv: Hsv = Hsv::from_color(self.to_srgb());
        hsv.saturation
    }

    /// Relative luminance (Rec. 709 weights over linearized sRGB).
    pub fn luminance(self) -> f32 {
        let linear: LinSrgb = self.to_srgb().into_linear();
        0.2126 * linear.red + 0.7152 * linear.green + 0.0722 * linear.blue
    }

    pub fn to_lab(self) -> Lab {
        Lab::from_color(self.to_srgb())
    }

    /// Euclidean distance in CIE L*a*b*.
    pub fn distance(self, other: Color) -> f32 {
        let a = self.to_lab();
        let b = other.to_lab();
        let dl = a.l - b.l;
        let da = a.a - b.a;
        let db = a.b - b.b;
        (dl * dl + da * da + db * db).sqrt()
    }

    /// Scales HSL lightness toward black by `factor`.
    pub fn darken(self, factor: f32) -> Self {
        let hsl: Hsl = Hsl::from_color(self.to_srgb());
        let adjusted: Srgb = Srgb::from_color(hsl.darken(factor));
        Self::from_srgb(adjusted)
    }

    /// Moves HSL lightness toward white by `factor`.
    pub fn lighten(self, factor: f32) -> Self {
        let hsl: Hsl = Hsl::from_color(self.to_srgb());
        let adjusted: Srgb = Srgb::from_color(hsl.lighten(factor));
        Self::from_srgb(adjusted)
    }

    /// Moves HSL saturation toward fully saturated by `factor`.
    pub fn saturate(self, factor: f32) -> Self {
        let hsl: Hsl = Hsl::from_color(self.to_srgb());
        let adjusted: Srgb = Srgb::from_color(hsl.saturate(factor));
        Self::from_srgb(adjusted)
    }
}

fn quantize(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(ParseColorError(value.to_string()));
        }

        let channel = |hex: &str| {
            u8::from_str_radix(hex, 16).map_err(|_| ParseColorError(value.to_string()))
        };

        match digits.len() {
            3 => {
                let expand = |index: usize| {
                    let nibble = &digits[index..index + 1];
                    channel(nibble).map(|v| v * 17)
                };
                Ok(Self::rgb(expand(0)?, expand(1)?, expand(2)?))
            }
            6 => Ok(Self::rgb(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            _ => Err(ParseColorError(value.to_string())),
        }
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// The four-color output of extraction, ordered `shadow, body, accent, highlight`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Palette {
    pub shadow: Color,
    pub body: Color,
    pub accent: Color,
    pub highlight: Color,
}

impl Palette {
    /// Neutral grays shown before any cover has been processed.
    pub const PLACEHOLDER: Palette = Palette {
        shadow: Color::gray(0x11),
        body: Color::gray(0x22),
        accent: Color::gray(0x33),
        highlight: Color::gray(0x44),
    };

    pub fn from_colors(colors: [Color; 4]) -> Self {
        let [shadow, body, accent, highlight] = colors;
        Self {
            shadow,
            body,
            accent,
            highlight,
        }
    }

    pub fn colors(&self) -> [Color; 4] {
        [self.shadow, self.body, self.accent, self.highlight]
    }

    pub fn to_hex(&self) -> [String; 4] {
        self.colors().map(|color| color.to_string())
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::PLACEHOLDER
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.shadow, self.body, self.accent, self.highlight
        )
    }
}
