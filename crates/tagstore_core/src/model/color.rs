//! Display colors assigned to tags.
//!
//! # Invariants
//! - Every color is a normalized upper-case `#RRGGBB` string.
//! - Color selection is a pure function of a seed over `PALETTE`.

use super::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Fixed palette new tags draw from when no color is supplied.
pub const PALETTE: &[&str] = &[
    "#000000", // Black
    "#0000FF", // Blue
    "#8A2BE2", // BlueViolet
    "#A52A2A", // Brown
    "#5F9EA0", // CadetBlue
    "#D2691E", // Chocolate
    "#6495ED", // CornflowerBlue
    "#DC143C", // Crimson
    "#00008B", // DarkBlue
    "#008B8B", // DarkCyan
    "#B8860B", // DarkGoldenRod
    "#006400", // DarkGreen
    "#8B008B", // DarkMagenta
    "#556B2F", // DarkOliveGreen
    "#9932CC", // DarkOrchid
    "#8B0000", // DarkRed
    "#483D8B", // DarkSlateBlue
    "#2F4F4F", // DarkSlateGray
    "#00CED1", // DarkTurquoise
    "#9400D3", // DarkViolet
    "#FF1493", // DeepPink
    "#00BFFF", // DeepSkyBlue
    "#696969", // DimGray
    "#1E90FF", // DodgerBlue
    "#B22222", // FireBrick
    "#228B22", // ForestGreen
    "#CD5C5C", // IndianRed
    "#4B0082", // Indigo
    "#191970", // MidnightBlue
    "#6B8E23", // OliveDrab
    "#FF4500", // OrangeRed
];

/// Hex display color, serialized as a plain string such as `"#0000FF"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    /// Parses and normalizes a `#RRGGBB` color.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix('#')
            .filter(|rest| rest.len() == 6 && rest.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| ValidationError::InvalidColor(value.to_string()))?;
        Ok(Self(format!("#{}", digits.to_ascii_uppercase())))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Picks one palette entry for the given seed.
pub fn pick_color(seed: u64) -> Color {
    let idx = (seed % PALETTE.len() as u64) as usize;
    Color(PALETTE[idx].to_string())
}

/// Picks a palette entry using a thread-local random seed.
pub fn random_color() -> Color {
    pick_color(rand::random::<u64>())
}
