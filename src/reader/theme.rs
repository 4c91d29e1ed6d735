use crate::engine::ThemeColors;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_FONT_SIZE_PX: u32 = 12;
pub const MAX_FONT_SIZE_PX: u32 = 36;
pub const FONT_SIZE_STEP_PX: u32 = 4;
pub const DEFAULT_FONT_SIZE_PX: u32 = 16;

pub fn clamp_font_size(px: u32) -> u32 {
    px.clamp(MIN_FONT_SIZE_PX, MAX_FONT_SIZE_PX)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeId {
    #[default]
    Light,
    Dark,
}

impl ThemeId {
    /// Colors shared by reader chrome and document content.
    pub fn colors(self) -> ThemeColors {
        let (background, text) = match self {
            ThemeId::Light => ("#ffffff", "#000000"),
            ThemeId::Dark => ("#121212", "#e0e0e0"),
        };
        ThemeColors {
            background: background.to_string(),
            text: text.to_string(),
        }
    }
}

impl fmt::Display for ThemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ThemeId::Light => "light",
            ThemeId::Dark => "dark",
        })
    }
}

impl FromStr for ThemeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(ThemeId::Light),
            "dark" => Ok(ThemeId::Dark),
            other => Err(format!("unknown theme '{other}' (expected light or dark)")),
        }
    }
}
