//! Compares the pruned cell search against an exhaustive reference on small synthetic inputs.

use ansi_render::{
    CellMatch, CellMatcher, GlyphAtlas, GlyphBitmap, GridGeometry, Palette, RgbRaster,
    PALETTE_SIZE,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const GLYPH_WIDTH: usize = 3;
const GLYPH_HEIGHT: usize = 3;

/// Three glyphs with mid-range intensities so mixing and the memo get exercised.
fn atlas() -> GlyphAtlas {
    let glyphs = vec![
        GlyphBitmap { code_point: ' ' as u32, normal: vec![0; 9], bold: vec![0; 9] },
        GlyphBitmap {
            code_point: '/' as u32,
            normal: vec![0, 40, 255, 40, 255, 40, 255, 40, 0],
            bold: vec![0, 90, 255, 90, 255, 90, 255, 90, 0],
        },
        GlyphBitmap {
            code_point: '#' as u32,
            normal: vec![128, 128, 128, 200, 200, 200, 128, 128, 128],
            bold: vec![180, 180, 180, 255, 255, 255, 180, 180, 180],
        },
    ];
    let underline = vec![0, 0, 0, 0, 0, 0, 255, 255, 255];
    GlyphAtlas::from_glyphs(GLYPH_WIDTH, GLYPH_HEIGHT, glyphs, underline.clone(), underline)
        .unwrap()
}

fn random_raster(rng: &mut StdRng, columns: usize, rows: usize) -> RgbRaster {
    let width = columns * GLYPH_WIDTH;
    let height = rows * GLYPH_HEIGHT;
    let data = (0..width * height * 3).map(|_| rng.gen::<u8>()).collect();
    RgbRaster::new(width, height, data).unwrap()
}

/// Every combination the search considers.
fn search_space(glyphs: usize) -> Vec<CellMatch> {
    let mut space = Vec::new();
    for glyph in 0..glyphs {
        for fg in 0..PALETTE_SIZE as u8 {
            for bg in 0..PALETTE_SIZE as u8 {
                for bold in [false, true] {
                    if !bold && fg == bg {
                        continue;
                    }
                    for underline in [false, true] {
                        space.push(CellMatch { glyph, fg, bg, bold, underline });
                    }
                }
            }
        }
    }
    space
}

fn brute_force_minimum(
    matcher: &CellMatcher<'_>,
    raster: &RgbRaster,
    geometry: GridGeometry,
    column: usize,
    row: usize,
    space: &[CellMatch],
) -> u64 {
    space
        .iter()
        .map(|cell| matcher.cell_cost(raster, geometry, column, row, cell).unwrap())
        .min()
        .unwrap()
}

#[test]
fn unpruned_search_is_optimal() {
    let atlas = atlas();
    let palette = Palette::vga();
    let matcher = CellMatcher::new(&atlas, &palette, 1.0).unwrap();
    let space = search_space(atlas.len());
    let mut rng = StdRng::seed_from_u64(7);

    let geometry = GridGeometry::new(4, 3, GLYPH_WIDTH, GLYPH_HEIGHT).unwrap();
    let raster = random_raster(&mut rng, 4, 3);
    let grid = matcher.match_grid(&raster, geometry).unwrap();

    for row in 0..geometry.rows {
        for column in 0..geometry.columns {
            let chosen = grid.get(column, row).unwrap();
            let cost = matcher.cell_cost(&raster, geometry, column, row, chosen).unwrap();
            let minimum = brute_force_minimum(&matcher, &raster, geometry, column, row, &space);
            assert_eq!(cost, minimum, "cell ({column}, {row}) picked {chosen:?}");
        }
    }
}

#[test]
fn unpruned_search_is_optimal_on_two_glyphs_two_colors() {
    let glyphs = vec![
        GlyphBitmap { code_point: 'A' as u32, normal: vec![0, 0, 255, 255], bold: vec![0; 4] },
        GlyphBitmap { code_point: 'B' as u32, normal: vec![255, 255, 0, 0], bold: vec![0; 4] },
    ];
    let atlas = GlyphAtlas::from_glyphs(2, 2, glyphs, vec![0; 4], vec![255; 4]).unwrap();
    let mut normal = [[0, 0, 0]; PALETTE_SIZE];
    normal[1] = [255, 255, 255];
    let palette = Palette::new(normal, normal);
    let matcher = CellMatcher::new(&atlas, &palette, 1.0).unwrap();
    let space = search_space(atlas.len());

    let mut rng = StdRng::seed_from_u64(99);
    let geometry = GridGeometry::new(5, 5, 2, 2).unwrap();
    let data = (0..10 * 10 * 3).map(|_| rng.gen::<u8>()).collect();
    let raster = RgbRaster::new(10, 10, data).unwrap();
    let grid = matcher.match_grid(&raster, geometry).unwrap();

    for row in 0..5 {
        for column in 0..5 {
            let chosen = grid.get(column, row).unwrap();
            let cost = matcher.cell_cost(&raster, geometry, column, row, chosen).unwrap();
            let minimum = brute_force_minimum(&matcher, &raster, geometry, column, row, &space);
            assert_eq!(cost, minimum);
        }
    }
}

#[test]
fn pruned_search_never_beats_the_optimum() {
    let atlas = atlas();
    let palette = Palette::vga();
    let exact = CellMatcher::new(&atlas, &palette, 1.0).unwrap();
    let space = search_space(atlas.len());
    let mut rng = StdRng::seed_from_u64(1234);

    let geometry = GridGeometry::new(3, 3, GLYPH_WIDTH, GLYPH_HEIGHT).unwrap();
    let raster = random_raster(&mut rng, 3, 3);

    for quality in [0.05, 0.15, 0.5, 0.9] {
        let matcher = CellMatcher::new(&atlas, &palette, quality).unwrap();
        let grid = matcher.match_grid(&raster, geometry).unwrap();
        for row in 0..geometry.rows {
            for column in 0..geometry.columns {
                let chosen = grid.get(column, row).unwrap();
                let cost = exact.cell_cost(&raster, geometry, column, row, chosen).unwrap();
                let minimum = brute_force_minimum(&exact, &raster, geometry, column, row, &space);
                assert!(cost >= minimum);
            }
        }
    }
}

#[test]
fn search_is_deterministic() {
    let atlas = atlas();
    let palette = Palette::xterm();
    let matcher = CellMatcher::new(&atlas, &palette, 1.0).unwrap();
    let mut rng = StdRng::seed_from_u64(42);

    let geometry = GridGeometry::new(6, 4, GLYPH_WIDTH, GLYPH_HEIGHT).unwrap();
    let raster = random_raster(&mut rng, 6, 4);

    let first = matcher.match_grid(&raster, geometry).unwrap();
    let second = matcher.match_grid(&raster, geometry).unwrap();
    assert_eq!(first, second);
}

#[test]
fn never_reports_plain_cell_with_equal_colors() {
    let atlas = atlas();
    let palette = Palette::vga();
    let mut rng = StdRng::seed_from_u64(5);

    // Uniform blocks would be a perfect fit for fg == bg, which is never searched without bold.
    let mut raster = random_raster(&mut rng, 4, 2);
    for y in 0..GLYPH_HEIGHT {
        for x in 0..GLYPH_WIDTH {
            raster.set_pixel(x, y, palette.normal()[3]);
        }
    }

    for quality in [0.15, 1.0] {
        let matcher = CellMatcher::new(&atlas, &palette, quality).unwrap();
        let geometry = GridGeometry::new(4, 2, GLYPH_WIDTH, GLYPH_HEIGHT).unwrap();
        let grid = matcher.match_grid(&raster, geometry).unwrap();
        for cell in &grid.cells {
            assert!(cell.bold || cell.fg != cell.bg, "unexpected {cell:?}");
        }
        // The blank glyph over the matching background reproduces the block exactly.
        let first = grid.get(0, 0).unwrap();
        assert_eq!(matcher.cell_cost(&raster, geometry, 0, 0, first).unwrap(), 0);
    }
}

#[test]
fn progress_reports_every_row() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let atlas = atlas();
    let palette = Palette::vga();
    let matcher = CellMatcher::new(&atlas, &palette, 0.5).unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let geometry = GridGeometry::new(2, 5, GLYPH_WIDTH, GLYPH_HEIGHT).unwrap();
    let raster = random_raster(&mut rng, 2, 5);

    let finished = AtomicUsize::new(0);
    let rows = AtomicUsize::new(0);
    matcher
        .match_grid_with_progress(&raster, geometry, &|row| {
            finished.fetch_add(1, Ordering::Relaxed);
            rows.fetch_or(1 << row, Ordering::Relaxed);
        })
        .unwrap();

    assert_eq!(finished.load(Ordering::Relaxed), 5);
    assert_eq!(rows.load(Ordering::Relaxed), 0b11111);
}
