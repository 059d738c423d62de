use serde::Serialize;

use crate::style::CellStyle;

/// Pixel-space box, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Saturates at `u32::MAX` for boxes reaching past the coordinate range.
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.left.saturating_add(self.width)
    }

    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.top.saturating_add(self.height)
    }

    /// Horizontal distance from the right edge of `self` to the left edge of
    /// `next`; negative when the boxes overlap.
    #[must_use]
    pub fn gap_to(&self, next: &Self) -> i64 {
        i64::from(next.left) - i64::from(self.right())
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self::new(left, top, right - left, bottom - top)
    }

    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.left <= other.left
            && self.top <= other.top
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }
}

/// Anything with a box can be clustered into rows.
pub trait Positioned {
    fn bbox(&self) -> &BoundingBox;
}

/// One cleaned OCR word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: u8,
}

impl Positioned for Token {
    fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }
}

/// Tokens merged along a row by horizontal spacing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRun {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub token_count: usize,
    /// Set when the gap before this run in its row reached the column-break
    /// threshold.
    pub column_break: bool,
}

impl TextRun {
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

impl Positioned for TextRun {
    fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }
}

/// Elements sharing one vertical band, sorted left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<T> {
    pub reference_top: u32,
    pub elements: Vec<T>,
}

/// A run placed at a 1-based column of its row, with its presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedRun {
    pub run: TextRun,
    pub column: u16,
    pub style: CellStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridRow {
    pub reference_top: u32,
    pub cells: Vec<PlacedRun>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    pub rows: Vec<GridRow>,
}

impl Grid {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_count(&self) -> u16 {
        self.rows
            .iter()
            .flat_map(|row| row.cells.iter().map(|cell| cell.column))
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn run_count(&self) -> usize {
        self.rows.iter().map(|row| row.cells.len()).sum()
    }
}
