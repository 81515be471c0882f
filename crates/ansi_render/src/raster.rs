use image::{DynamicImage, RgbImage};

use crate::RenderError;

/// Bytes per pixel of an [`RgbRaster`].
pub const RGB_CHANNELS: usize = 3;

/// Row-major, top-to-bottom RGB pixel buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbRaster {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl RgbRaster {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, RenderError> {
        let expected = width * height * RGB_CHANNELS;
        if data.len() != expected {
            return Err(RenderError::RasterSize { width, height, expected, actual: data.len() });
        }
        Ok(Self { width, height, data })
    }

    /// Black raster of the given size.
    pub fn blank(width: usize, height: usize) -> Self {
        Self { width, height, data: vec![0; width * height * RGB_CHANNELS] }
    }

    /// Raster filled with a single color.
    pub fn solid(width: usize, height: usize, color: [u8; 3]) -> Self {
        let data = color.iter().copied().cycle().take(width * height * RGB_CHANNELS).collect();
        Self { width, height, data }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes in one row of pixels.
    pub fn stride(&self) -> usize {
        self.width * RGB_CHANNELS
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let pos = (y * self.width + x) * RGB_CHANNELS;
        [self.data[pos], self.data[pos + 1], self.data[pos + 2]]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: [u8; 3]) {
        let pos = (y * self.width + x) * RGB_CHANNELS;
        self.data[pos..pos + RGB_CHANNELS].copy_from_slice(&color);
    }

    pub fn into_image(self) -> RgbImage {
        let (width, height) = (self.width as u32, self.height as u32);
        // Length was checked on construction.
        RgbImage::from_raw(width, height, self.data)
            .unwrap_or_else(|| RgbImage::new(width, height))
    }
}

impl From<RgbImage> for RgbRaster {
    fn from(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self { width: width as usize, height: height as usize, data: image.into_raw() }
    }
}

impl From<DynamicImage> for RgbRaster {
    fn from(image: DynamicImage) -> Self {
        image.into_rgb8().into()
    }
}

/// Single channel grayscale buffer, used for glyph sheets and overlays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayRaster {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl GrayRaster {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, RenderError> {
        let expected = width * height;
        if data.len() != expected {
            return Err(RenderError::RasterSize { width, height, expected, actual: data.len() });
        }
        Ok(Self { width, height, data })
    }

    /// Takes the first channel of a decoded image.
    ///
    /// Glyph sheets are expected to be grayscale, so converting through luma would only add
    /// rounding noise to the intensity range.
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let data = rgb.pixels().map(|pixel| pixel.0[0]).collect();
        Self { width: width as usize, height: height as usize, data }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
