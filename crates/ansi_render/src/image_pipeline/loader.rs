use std::path::{Path, PathBuf};

use image::GenericImageView;
use log::debug;

use crate::cells::atlas::{FontRange, FontSheet, GlyphAtlas};
use crate::raster::{GrayRaster, RgbRaster};
use crate::RenderError;

/// Sheet files of one font range.
#[derive(Clone, Debug)]
pub struct FontRangeFiles {
    pub normal: PathBuf,
    pub bold: PathBuf,
    pub range: FontRange,
}

/// Underline overlays and font sheets that make up a glyph atlas.
#[derive(Clone, Debug)]
pub struct FontFiles {
    pub underline: PathBuf,
    pub underline_bold: PathBuf,
    pub ranges: Vec<FontRangeFiles>,
}

impl FontFiles {
    pub fn load(&self) -> Result<GlyphAtlas, RenderError> {
        let underline = load_gray(&self.underline)?;
        let underline_bold = load_gray(&self.underline_bold)?;

        let sheets = self
            .ranges
            .iter()
            .map(|files| {
                Ok(FontSheet {
                    range: files.range,
                    normal: load_gray(&files.normal)?,
                    bold: load_gray(&files.bold)?,
                })
            })
            .collect::<Result<Vec<_>, RenderError>>()?;

        GlyphAtlas::from_sheets(&sheets, &underline, &underline_bold)
    }
}

pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbRaster, RenderError> {
    let image = image::open(path.as_ref())?;
    let (width, height) = image.dimensions();
    debug!("loaded {width}x{height} image from {}", path.as_ref().display());
    Ok(image.into())
}

/// Loads a grayscale glyph sheet or overlay, keeping only the first channel.
pub fn load_gray<P: AsRef<Path>>(path: P) -> Result<GrayRaster, RenderError> {
    let image = image::open(path.as_ref())?;
    Ok(GrayRaster::from_image(&image))
}

pub fn save_rgb<P: AsRef<Path>>(raster: RgbRaster, path: P) -> Result<(), RenderError> {
    raster.into_image().save(path.as_ref())?;
    debug!("wrote {}", path.as_ref().display());
    Ok(())
}
