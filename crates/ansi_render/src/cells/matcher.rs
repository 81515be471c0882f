//! Per-cell search for the glyph, colors and style that best reproduce a block of pixels.
//!
//! Every cell tries all glyphs against all foreground/background pairs, in normal and bold
//! style, with and without underline. Cost is the summed squared RGB distance between the
//! rendered cell and the source block.
//!
//! The walk over a candidate's pixels is cut short once its running cost passes
//! `best * threshold`, where `threshold` starts at the quality setting and climbs by
//! `1 / area` per pixel. Below a quality of `1.0` this also drops candidates that would have
//! landed between `best * quality` and `best`, so the search is approximate on purpose and
//! gets faster the lower the quality is set.

use log::debug;
use rayon::prelude::*;

use super::atlas::{GlyphAtlas, IntensityRange};
use super::grid::{CellGrid, CellMatch};
use super::palette::{mix, Palette, Rgb, PALETTE_SIZE};
use crate::image_pipeline::resize::GridGeometry;
use crate::raster::RgbRaster;
use crate::RenderError;

/// Lookup slots per cell: the normal colors followed by the bright ones.
const LOOKUP_SLOTS: usize = PALETTE_SIZE * 2;

/// Cell-local scratch memory, allocated once per worker from the glyph size.
#[derive(Clone, Debug)]
pub(crate) struct MatchScratch {
    area: usize,
    /// Source pixels of the current cell block, row-major.
    target: Vec<Rgb>,
    /// Squared distance of every block pixel to each of the 16 palette colors.
    lookup: Vec<u32>,
}

impl MatchScratch {
    pub(crate) fn new(area: usize) -> Self {
        Self { area, target: vec![[0; 3]; area], lookup: vec![0; area * LOOKUP_SLOTS] }
    }

    /// Copies the block of cell (`column`, `row`) and fills the distance tables for it.
    fn load(
        &mut self,
        raster: &RgbRaster,
        geometry: &GridGeometry,
        palette: &Palette,
        column: usize,
        row: usize,
    ) {
        let xs = column * geometry.glyph_width;
        let ys = row * geometry.glyph_height;
        let mut pixels = self.target.iter_mut();
        for y in ys..ys + geometry.glyph_height {
            for x in xs..xs + geometry.glyph_width {
                if let Some(pixel) = pixels.next() {
                    *pixel = raster.pixel(x, y);
                }
            }
        }

        for (table, color) in self.lookup.chunks_exact_mut(self.area).zip(palette.iter()) {
            for (distance, &pixel) in table.iter_mut().zip(&self.target) {
                *distance = squared_distance(color, pixel);
            }
        }
    }

    #[inline]
    fn distance(&self, slot: usize, pixel: usize) -> u32 {
        self.lookup[slot * self.area + pixel]
    }
}

/// Remembers the last mixed color of a candidate, runs of equal intensity are common.
struct MixMemo {
    background: Rgb,
    foreground: Rgb,
    range: IntensityRange,
    last: Option<(u8, Rgb)>,
}

impl MixMemo {
    fn new(background: Rgb, foreground: Rgb, range: IntensityRange) -> Self {
        Self { background, foreground, range, last: None }
    }

    #[inline]
    fn color(&mut self, intensity: u8) -> Rgb {
        match self.last {
            Some((last, color)) if last == intensity => color,
            _ => {
                let color = mix(self.background, self.foreground, self.range.position(intensity));
                self.last = Some((intensity, color));
                color
            },
        }
    }
}

/// One `(glyph, fg, bg, bold)` combination under evaluation.
struct Candidate<'a> {
    glyph: &'a [u8],
    underline: &'a [u8],
    range: IntensityRange,
    bg_slot: usize,
    fg_slot: usize,
    memo: MixMemo,
}

impl Candidate<'_> {
    #[inline]
    fn pixel_cost(&mut self, scratch: &MatchScratch, pixel: usize, intensity: u8) -> u64 {
        let cost = if intensity == self.range.min {
            scratch.distance(self.bg_slot, pixel)
        } else if intensity == self.range.max {
            scratch.distance(self.fg_slot, pixel)
        } else {
            squared_distance(self.memo.color(intensity), scratch.target[pixel])
        };
        u64::from(cost)
    }
}

/// Searches every cell of a resampled raster for its best glyph and colors.
#[derive(Clone, Copy, Debug)]
pub struct CellMatcher<'a> {
    atlas: &'a GlyphAtlas,
    palette: &'a Palette,
    quality: f32,
}

impl<'a> CellMatcher<'a> {
    /// `quality` is the starting pruning threshold, in `(0, 1]`.
    pub fn new(
        atlas: &'a GlyphAtlas,
        palette: &'a Palette,
        quality: f32,
    ) -> Result<Self, RenderError> {
        if !(quality > 0.0 && quality <= 1.0) {
            return Err(RenderError::InvalidThreshold(quality));
        }
        Ok(Self { atlas, palette, quality })
    }

    pub fn match_grid(
        &self,
        raster: &RgbRaster,
        geometry: GridGeometry,
    ) -> Result<CellGrid, RenderError> {
        self.match_grid_with_progress(raster, geometry, &|_| {})
    }

    /// Like [`CellMatcher::match_grid`], calling `progress` with the index of every finished
    /// row of cells. Rows finish in no particular order.
    pub fn match_grid_with_progress(
        &self,
        raster: &RgbRaster,
        geometry: GridGeometry,
        progress: &(dyn Fn(usize) + Sync),
    ) -> Result<CellGrid, RenderError> {
        self.check_inputs(raster, &geometry)?;

        let mut cells = vec![CellMatch::default(); geometry.cell_count()];
        if cells.is_empty() {
            return Ok(CellGrid::new(geometry.columns, geometry.rows, cells));
        }

        let area = self.atlas.area();
        cells.par_chunks_mut(geometry.columns).enumerate().for_each_init(
            || MatchScratch::new(area),
            |scratch, (row, slots)| {
                for (column, slot) in slots.iter_mut().enumerate() {
                    scratch.load(raster, &geometry, self.palette, column, row);
                    *slot = self.search(scratch);
                }
                progress(row);
            },
        );

        debug!("matched {} cells against {} glyphs", cells.len(), self.atlas.len());
        Ok(CellGrid::new(geometry.columns, geometry.rows, cells))
    }

    /// Best match for a single cell.
    pub fn match_cell(
        &self,
        raster: &RgbRaster,
        geometry: GridGeometry,
        column: usize,
        row: usize,
    ) -> Result<CellMatch, RenderError> {
        self.check_inputs(raster, &geometry)?;
        check_cell_position(&geometry, column, row)?;

        let mut scratch = MatchScratch::new(self.atlas.area());
        scratch.load(raster, &geometry, self.palette, column, row);
        Ok(self.search(&scratch))
    }

    /// Exact, unpruned cost of rendering `cell` over the block of (`column`, `row`).
    pub fn cell_cost(
        &self,
        raster: &RgbRaster,
        geometry: GridGeometry,
        column: usize,
        row: usize,
        cell: &CellMatch,
    ) -> Result<u64, RenderError> {
        self.check_inputs(raster, &geometry)?;
        check_cell_position(&geometry, column, row)?;
        cell.validate(self.atlas)?;

        let range = self.atlas.intensity_range(cell.bold);
        let glyph = self.atlas.glyph(cell.glyph, cell.bold);
        let underline = self.atlas.underline(cell.bold);
        let foreground = self.palette.foreground(usize::from(cell.fg), cell.bold);
        let background = self.palette.background(usize::from(cell.bg));

        let xs = column * geometry.glyph_width;
        let ys = row * geometry.glyph_height;
        let mut total = 0;
        for y in 0..geometry.glyph_height {
            for x in 0..geometry.glyph_width {
                let pos = y * geometry.glyph_width + x;
                let mut intensity = glyph[pos];
                if cell.underline {
                    intensity = intensity.max(underline[pos]);
                }
                let color = mix(background, foreground, range.position(intensity));
                let target = raster.pixel(xs + x, ys + y);
                total += u64::from(squared_distance(color, target));
            }
        }
        Ok(total)
    }

    fn check_inputs(
        &self,
        raster: &RgbRaster,
        geometry: &GridGeometry,
    ) -> Result<(), RenderError> {
        let glyph_size = (self.atlas.glyph_width(), self.atlas.glyph_height());
        if (geometry.glyph_width, geometry.glyph_height) != glyph_size {
            return Err(RenderError::InvalidGlyphGeometry {
                what: "grid geometry".into(),
                expected: glyph_size,
                found: (geometry.glyph_width, geometry.glyph_height),
            });
        }

        let expected =
            geometry.pixel_width().saturating_mul(geometry.pixel_height()).saturating_mul(3);
        if raster.dimensions() != (geometry.pixel_width(), geometry.pixel_height()) {
            return Err(RenderError::RasterSize {
                width: geometry.pixel_width(),
                height: geometry.pixel_height(),
                expected,
                actual: raster.data().len(),
            });
        }

        Ok(())
    }

    /// Walks the whole search space for the cell loaded into `scratch`.
    fn search(&self, scratch: &MatchScratch) -> CellMatch {
        let mut best = u64::MAX / 2;
        let mut result = CellMatch::default();

        for glyph in 0..self.atlas.len() {
            for fg in 0..PALETTE_SIZE {
                for bg in 0..PALETTE_SIZE {
                    for bold in [false, true] {
                        // A blank glyph already covers uniform cells.
                        if !bold && fg == bg {
                            continue;
                        }

                        let range = self.atlas.intensity_range(bold);
                        let mut candidate = Candidate {
                            glyph: self.atlas.glyph(glyph, bold),
                            underline: self.atlas.underline(bold),
                            range,
                            bg_slot: bg,
                            fg_slot: if bold { fg + PALETTE_SIZE } else { fg },
                            memo: MixMemo::new(
                                self.palette.background(bg),
                                self.palette.foreground(fg, bold),
                                range,
                            ),
                        };

                        let mut cell =
                            CellMatch { glyph, fg: fg as u8, bg: bg as u8, bold, underline: false };
                        let outcome = self.evaluate(scratch, &mut candidate, best);

                        if outcome.plain < outcome.bound {
                            best = outcome.plain;
                            result = cell;
                        }
                        // `best` may have moved, so the bound is rebuilt from it.
                        if outcome.underlined < scale(best, outcome.threshold.min(1.0)) {
                            best = outcome.underlined;
                            cell.underline = true;
                            result = cell;
                        }
                    }
                }
            }
        }

        result
    }

    /// Accumulates the plain and underlined cost of one candidate until both pass the bound.
    fn evaluate(&self, scratch: &MatchScratch, candidate: &mut Candidate<'_>, best: u64) -> Walk {
        let area = scratch.area;
        let delta = 1.0 / area as f32;
        let mut walk = Walk { plain: 0, underlined: 0, threshold: self.quality, bound: 0 };

        for pixel in 0..area {
            let intensity = candidate.glyph[pixel];

            walk.threshold += delta;
            walk.bound = if walk.threshold > 1.0 { best } else { scale(best, walk.threshold) };

            let mut plain_cost = None;
            if walk.plain < walk.bound {
                let cost = candidate.pixel_cost(scratch, pixel, intensity);
                walk.plain += cost;
                plain_cost = Some(cost);
            }

            if walk.underlined < walk.bound {
                let combined = intensity.max(candidate.underline[pixel]);
                walk.underlined += match plain_cost {
                    Some(cost) if combined == intensity => cost,
                    _ => candidate.pixel_cost(scratch, pixel, combined),
                };
            } else if walk.plain >= walk.bound {
                break;
            }
        }

        walk
    }
}

/// Running state of one candidate's pixel walk.
#[derive(Clone, Copy, Debug)]
struct Walk {
    plain: u64,
    underlined: u64,
    threshold: f32,
    bound: u64,
}

fn check_cell_position(
    geometry: &GridGeometry,
    column: usize,
    row: usize,
) -> Result<(), RenderError> {
    if column >= geometry.columns || row >= geometry.rows {
        return Err(RenderError::CellOutOfRange {
            column,
            row,
            columns: geometry.columns,
            rows: geometry.rows,
        });
    }
    Ok(())
}

#[inline]
fn scale(best: u64, threshold: f32) -> u64 {
    (best as f64 * f64::from(threshold)) as u64
}

#[inline]
fn squared_distance(a: Rgb, b: Rgb) -> u32 {
    a.iter()
        .zip(b)
        .map(|(&a, b)| {
            let diff = i32::from(a) - i32::from(b);
            (diff * diff) as u32
        })
        .sum()
}
