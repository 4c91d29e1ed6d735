//! Text pagination for a rendition.
//!
//! Sections are wrapped into lines of `columns` characters (breaking at
//! spaces where possible) and lines are grouped into screens of `rows` lines.
//! Everything is measured in characters, so a layout only depends on the
//! viewport size and the font size.

use crate::engine::location::Location;
use crate::epub::content::DocumentText;
use std::collections::HashMap;

/// Approximate glyph advance as a fraction of the font size.
const CHAR_WIDTH_EM: f32 = 0.5;
const LINE_HEIGHT_EM: f32 = 1.5;

/// One spine document, reduced to text.
#[derive(Debug, Clone)]
pub struct Section {
    pub path: String,
    chars: Vec<char>,
    anchors: HashMap<String, usize>,
}

impl Section {
    pub fn new(path: impl Into<String>, document: DocumentText) -> Self {
        Self {
            path: path.into(),
            chars: document.text.chars().collect(),
            anchors: document.anchors,
        }
    }

    pub fn char_len(&self) -> usize {
        self.chars.len()
    }

    pub fn anchor(&self, id: &str) -> Option<usize> {
        self.anchors.get(id).copied()
    }

    pub fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.chars.len());
        let start = start.min(end);
        self.chars[start..end].iter().collect()
    }
}

/// Characters per line and lines per screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenMetrics {
    pub columns: usize,
    pub rows: usize,
}

impl ScreenMetrics {
    pub fn for_viewport(width_px: u32, height_px: u32, font_size_px: u32) -> Self {
        let font = font_size_px.max(1) as f32;
        let columns = (width_px as f32 / (font * CHAR_WIDTH_EM)).floor() as usize;
        let rows = (height_px as f32 / (font * LINE_HEIGHT_EM)).floor() as usize;
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }
}

/// Start offsets of every wrapped line of `chars`.
fn line_starts(chars: &[char], columns: usize) -> Vec<usize> {
    let len = chars.len();
    let mut starts = Vec::new();
    let mut pos = 0;

    while pos < len {
        let para_end = chars[pos..]
            .iter()
            .position(|c| *c == '\n')
            .map_or(len, |i| pos + i);
        let mut line_start = pos;
        loop {
            starts.push(line_start);
            if para_end - line_start <= columns {
                break;
            }
            let limit = line_start + columns;
            let space = (line_start + 1..=limit).rev().find(|&i| chars[i] == ' ');
            line_start = match space {
                Some(i) => i + 1,
                None => limit,
            };
        }
        pos = para_end + 1;
    }

    if starts.is_empty() {
        starts.push(0);
    }
    starts
}

/// Start offsets of the screens of one section. Never empty: a section
/// without text still occupies one (blank) screen.
pub fn layout_section(section: &Section, metrics: ScreenMetrics) -> Vec<usize> {
    line_starts(&section.chars, metrics.columns)
        .chunks(metrics.rows)
        .map(|lines| lines[0])
        .collect()
}

/// Index of the screen containing `offset`.
pub fn screen_containing(screens: &[usize], offset: usize) -> usize {
    screens.partition_point(|&start| start <= offset).saturating_sub(1)
}

/// Location index: one boundary every `granularity` characters.
#[derive(Debug, Clone)]
pub struct PageIndex {
    granularity: usize,
    boundaries: Vec<Location>,
}

impl PageIndex {
    pub fn build(sections: &[Section], granularity: usize) -> Self {
        let granularity = granularity.max(1);
        let mut boundaries = Vec::new();
        for (spine, section) in sections.iter().enumerate() {
            boundaries.push(Location::new(spine, 0));
            let mut offset = granularity;
            while offset < section.char_len() {
                boundaries.push(Location::new(spine, offset));
                offset += granularity;
            }
        }
        Self {
            granularity,
            boundaries,
        }
    }

    pub fn granularity(&self) -> usize {
        self.granularity
    }

    pub fn total_pages(&self) -> usize {
        self.boundaries.len()
    }

    /// 1-based page number of `location`, always within `[1, total_pages]`
    /// for a non-empty index.
    pub fn page_of(&self, location: &Location) -> usize {
        let after = self
            .boundaries
            .partition_point(|b| b.reading_order(location).is_le());
        after.clamp(1, self.total_pages().max(1))
    }
}
