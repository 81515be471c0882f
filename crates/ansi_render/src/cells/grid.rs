use std::fmt::Write;

use super::atlas::GlyphAtlas;
use super::palette::PALETTE_SIZE;
use crate::RenderError;

/// Chosen glyph and style of one character cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellMatch {
    /// Index into the glyph atlas.
    pub glyph: usize,
    /// Foreground palette index (0-7), taken from the bright half when `bold` is set.
    pub fg: u8,
    /// Background palette index (0-7).
    pub bg: u8,
    pub bold: bool,
    pub underline: bool,
}

impl CellMatch {
    /// Checks that the glyph exists in `atlas` and both colors are palette indices.
    pub fn validate(&self, atlas: &GlyphAtlas) -> Result<(), RenderError> {
        let colors = usize::from(self.fg) < PALETTE_SIZE && usize::from(self.bg) < PALETTE_SIZE;
        if self.glyph >= atlas.len() || !colors {
            return Err(RenderError::InvalidCell {
                glyph: self.glyph,
                glyphs: atlas.len(),
                fg: self.fg,
                bg: self.bg,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellGrid {
    pub columns: usize,
    pub rows: usize,
    pub cells: Vec<CellMatch>,
}

impl CellGrid {
    pub fn new(columns: usize, rows: usize, cells: Vec<CellMatch>) -> Self {
        assert_eq!(columns * rows, cells.len());
        Self { columns, rows, cells }
    }

    pub fn get(&self, column: usize, row: usize) -> Option<&CellMatch> {
        if column >= self.columns {
            return None;
        }
        self.cells.get(row * self.columns + column)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[CellMatch]> + '_ {
        self.cells.chunks(self.columns.max(1))
    }

    /// Characters only, one string per row.
    pub fn plain_rows<'a>(&'a self, atlas: &'a GlyphAtlas) -> impl Iterator<Item = String> + 'a {
        self.rows().map(|row| row.iter().map(|cell| atlas.character(cell.glyph)).collect())
    }

    /// One string per row with SGR escapes for colors, bold and underline.
    ///
    /// Every cell restates its full style, and each row ends with a reset.
    pub fn ansi_rows<'a>(&'a self, atlas: &'a GlyphAtlas) -> impl Iterator<Item = String> + 'a {
        self.rows().map(|row| {
            let mut line = String::with_capacity(row.len() * 16);
            for cell in row {
                line.push_str("\x1b[0;");
                if cell.bold {
                    line.push_str("1;");
                }
                if cell.underline {
                    line.push_str("4;");
                }
                let _ = write!(line, "{};{}m", 30 + cell.fg, 40 + cell.bg);
                line.push(atlas.character(cell.glyph));
            }
            line.push_str("\x1b[0m");
            line
        })
    }
}
