mod cells;
mod image_pipeline;
mod raster;

use std::path::Path;
use std::time::Instant;

use log::info;

pub use cells::{
    atlas::{FontRange, FontSheet, GlyphAtlas, GlyphBitmap, IntensityRange},
    compose::compose,
    grid::{CellGrid, CellMatch},
    matcher::CellMatcher,
    palette::{mix, Palette, Rgb, PALETTE_SIZE},
};
pub use image_pipeline::{
    loader::{load_gray, load_rgb, save_rgb, FontFiles, FontRangeFiles},
    resize::{bicubic_weight, resample, GridGeometry, ResampleKind},
};
pub use raster::{GrayRaster, RgbRaster, RGB_CHANNELS};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to load image: {0}")]
    Image(#[from] image::ImageError),
    #[error("{what} has size {found:?}, expected {expected:?}")]
    InvalidGlyphGeometry { what: String, expected: (usize, usize), found: (usize, usize) },
    #[error("character grid of {columns} x {rows} cells is empty")]
    DegenerateGrid { columns: usize, rows: usize },
    #[error("quality threshold {0} is outside of (0, 1]")]
    InvalidThreshold(f32),
    #[error("no glyphs loaded")]
    EmptyAtlas,
    #[error("cell ({column}, {row}) is outside of the {columns} x {rows} grid")]
    CellOutOfRange { column: usize, row: usize, columns: usize, rows: usize },
    #[error("cell refers to glyph {glyph} of {glyphs} or to colors {fg}/{bg} outside the palette")]
    InvalidCell { glyph: usize, glyphs: usize, fg: u8, bg: u8 },
    #[error("{width}x{height} raster needs {expected} bytes, got {actual}")]
    RasterSize { width: usize, height: usize, expected: usize, actual: usize },
}

#[derive(Clone, Debug)]
pub struct RenderConfig {
    /// Width of the character grid; rows follow from the image aspect ratio.
    pub columns: usize,
    /// Pruning threshold in (0, 1]. Lower is faster and less accurate.
    pub quality: f32,
    pub palette: Palette,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { columns: 200, quality: 0.15, palette: Palette::vga() }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.columns == 0 {
            return Err(RenderError::DegenerateGrid { columns: 0, rows: 0 });
        }
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(RenderError::InvalidThreshold(self.quality));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct RenderOutput {
    pub geometry: GridGeometry,
    /// Source resampled to the pixel size of the grid.
    pub resampled: RgbRaster,
    pub cells: CellGrid,
    /// The chosen cells drawn back into pixels.
    pub preview: RgbRaster,
}

/// Resample, match and compose pipeline over a fixed configuration and glyph atlas.
#[derive(Clone, Debug)]
pub struct AnsiRenderer {
    config: RenderConfig,
    atlas: GlyphAtlas,
}

impl AnsiRenderer {
    pub fn new(config: RenderConfig, atlas: GlyphAtlas) -> Result<Self, RenderError> {
        config.validate()?;
        Ok(Self { config, atlas })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn atlas(&self) -> &GlyphAtlas {
        &self.atlas
    }

    /// Grid for a source image of the given size.
    pub fn geometry(&self, width: usize, height: usize) -> Result<GridGeometry, RenderError> {
        GridGeometry::derive(
            width,
            height,
            self.config.columns,
            self.atlas.glyph_width(),
            self.atlas.glyph_height(),
        )
    }

    pub fn render_path<P: AsRef<Path>>(&self, path: P) -> Result<RenderOutput, RenderError> {
        let source = load_rgb(path)?;
        self.render(source)
    }

    pub fn render(&self, source: RgbRaster) -> Result<RenderOutput, RenderError> {
        self.render_with_progress(source, &|_| {})
    }

    /// Renders `source`, calling `progress` whenever a row of cells has been matched.
    pub fn render_with_progress(
        &self,
        source: RgbRaster,
        progress: &(dyn Fn(usize) + Sync),
    ) -> Result<RenderOutput, RenderError> {
        let geometry = self.geometry(source.width(), source.height())?;
        let matcher = CellMatcher::new(&self.atlas, &self.config.palette, self.config.quality)?;
        info!("Character grid is {} x {}", geometry.columns, geometry.rows);

        let start = Instant::now();
        let resampled = resample(source, geometry.pixel_width(), geometry.pixel_height());

        info!("Creating the result image...");
        let cells = matcher.match_grid_with_progress(&resampled, geometry, progress)?;
        let preview = compose(&cells, &self.atlas, &self.config.palette)?;
        info!("Rendered {} cells in {:.2?}", geometry.cell_count(), start.elapsed());

        Ok(RenderOutput { geometry, resampled, cells, preview })
    }
}
