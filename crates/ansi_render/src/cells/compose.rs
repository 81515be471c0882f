use rayon::prelude::*;

use super::atlas::GlyphAtlas;
use super::grid::{CellGrid, CellMatch};
use super::palette::{mix, Palette};
use crate::raster::{RgbRaster, RGB_CHANNELS};
use crate::RenderError;

/// Renders a matched cell grid back into pixels, as a terminal with the same font would.
///
/// Every cell is validated against `atlas` before anything is drawn.
pub fn compose(
    grid: &CellGrid,
    atlas: &GlyphAtlas,
    palette: &Palette,
) -> Result<RgbRaster, RenderError> {
    let glyph_width = atlas.glyph_width();
    let glyph_height = atlas.glyph_height();
    let degenerate = || RenderError::DegenerateGrid { columns: grid.columns, rows: grid.rows };
    let width = grid.columns.checked_mul(glyph_width).ok_or_else(degenerate)?;
    let height = grid.rows.checked_mul(glyph_height).ok_or_else(degenerate)?;
    width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(RGB_CHANNELS))
        .ok_or_else(degenerate)?;
    for cell in &grid.cells {
        cell.validate(atlas)?;
    }

    let mut output = RgbRaster::blank(width, height);
    if output.is_empty() {
        return Ok(output);
    }

    let stride = output.stride();
    // One band of pixel rows per row of cells.
    let rows: Vec<&[CellMatch]> = grid.rows().collect();
    output.data_mut().par_chunks_mut(stride * glyph_height).zip(rows).for_each(
        |(band, cells)| {
            for (column, cell) in cells.iter().enumerate() {
                let range = atlas.intensity_range(cell.bold);
                let glyph = atlas.glyph(cell.glyph, cell.bold);
                let underline = atlas.underline(cell.bold);
                let foreground = palette.foreground(usize::from(cell.fg), cell.bold);
                let background = palette.background(usize::from(cell.bg));

                for y in 0..glyph_height {
                    for x in 0..glyph_width {
                        let pos = y * glyph_width + x;
                        let mut intensity = glyph[pos];
                        if cell.underline {
                            intensity = intensity.max(underline[pos]);
                        }

                        let color = mix(background, foreground, range.position(intensity));
                        let offset = y * stride + (column * glyph_width + x) * RGB_CHANNELS;
                        band[offset..offset + RGB_CHANNELS].copy_from_slice(&color);
                    }
                }
            }
        },
    );

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::atlas::GlyphBitmap;

    fn atlas() -> GlyphAtlas {
        let glyphs = vec![GlyphBitmap {
            code_point: 'o' as u32,
            normal: vec![16, 128, 240, 16],
            bold: vec![0, 0, 0, 255],
        }];
        GlyphAtlas::from_glyphs(2, 2, glyphs, vec![16, 16, 240, 240], vec![0, 0, 255, 255])
            .unwrap()
    }

    #[test]
    fn range_ends_map_to_pure_colors() {
        let palette = Palette::vga();
        let cell = CellMatch { glyph: 0, fg: 2, bg: 4, bold: false, underline: false };
        let output = compose(&CellGrid::new(1, 1, vec![cell]), &atlas(), &palette).unwrap();

        assert_eq!(output.dimensions(), (2, 2));
        assert_eq!(output.pixel(0, 0), palette.background(4));
        assert_eq!(output.pixel(0, 1), palette.foreground(2, false));
        assert_eq!(output.pixel(1, 1), palette.background(4));
        // 128 sits between 16 and 240.
        assert_eq!(output.pixel(1, 0), [0, 85, 85]);
    }

    #[test]
    fn underline_and_bold_use_their_overlay() {
        let palette = Palette::vga();
        let cell = CellMatch { glyph: 0, fg: 7, bg: 0, bold: true, underline: true };
        let output = compose(&CellGrid::new(1, 1, vec![cell]), &atlas(), &palette).unwrap();

        assert_eq!(output.pixel(0, 0), [0, 0, 0]);
        assert_eq!(output.pixel(1, 0), [0, 0, 0]);
        assert_eq!(output.pixel(0, 1), [255, 255, 255]);
        assert_eq!(output.pixel(1, 1), [255, 255, 255]);
    }

    #[test]
    fn places_cells_at_their_offsets() {
        let palette = Palette::vga();
        let cells = vec![
            CellMatch { glyph: 0, fg: 1, bg: 1, bold: true, underline: false },
            CellMatch { glyph: 0, fg: 0, bg: 6, bold: false, underline: false },
        ];
        let output = compose(&CellGrid::new(1, 2, cells), &atlas(), &palette).unwrap();

        assert_eq!(output.dimensions(), (2, 4));
        assert_eq!(output.pixel(1, 1), palette.foreground(1, true));
        assert_eq!(output.pixel(0, 2), palette.background(6));
    }

    #[test]
    fn rejects_cells_outside_atlas_or_palette() {
        let palette = Palette::vga();
        let atlas = atlas();
        for cell in [
            CellMatch { glyph: 3, ..CellMatch::default() },
            CellMatch { fg: 8, ..CellMatch::default() },
            CellMatch { bg: 200, bold: true, ..CellMatch::default() },
        ] {
            let err = compose(&CellGrid::new(1, 1, vec![cell]), &atlas, &palette).unwrap_err();
            assert!(matches!(err, RenderError::InvalidCell { glyphs: 1, .. }), "{cell:?}");
        }
    }

    #[test]
    fn rejects_grid_too_large_to_allocate() {
        let grid = CellGrid { columns: usize::MAX / 2, rows: 1, cells: Vec::new() };
        let err = compose(&grid, &atlas(), &Palette::vga()).unwrap_err();
        assert!(matches!(err, RenderError::DegenerateGrid { .. }));
    }
}
