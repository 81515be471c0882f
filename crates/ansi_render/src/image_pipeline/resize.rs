use log::{debug, info};
use rayon::prelude::*;

use crate::raster::{RgbRaster, RGB_CHANNELS};
use crate::RenderError;

/// Shape parameter of the cubic convolution kernel.
const BICUBIC_A: f32 = -0.5;

/// Character grid and the pixel size it covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridGeometry {
    pub columns: usize,
    pub rows: usize,
    pub glyph_width: usize,
    pub glyph_height: usize,
}

impl GridGeometry {
    /// Derives the row count that keeps the source aspect ratio for a fixed column count.
    ///
    /// Rows are rounded up so the whole source fits into the grid.
    pub fn derive(
        source_width: usize,
        source_height: usize,
        columns: usize,
        glyph_width: usize,
        glyph_height: usize,
    ) -> Result<Self, RenderError> {
        if columns == 0 || source_width == 0 || source_height == 0 || glyph_height == 0 {
            return Err(RenderError::DegenerateGrid { columns, rows: 0 });
        }

        let too_large = || RenderError::DegenerateGrid { columns, rows: 0 };
        let numerator = glyph_width
            .checked_mul(source_height)
            .and_then(|value| value.checked_mul(columns))
            .ok_or_else(too_large)?;
        let denominator = glyph_height.checked_mul(source_width).ok_or_else(too_large)?;
        let rows = numerator.div_ceil(denominator);

        Self::new(columns, rows, glyph_width, glyph_height)
    }

    pub fn new(
        columns: usize,
        rows: usize,
        glyph_width: usize,
        glyph_height: usize,
    ) -> Result<Self, RenderError> {
        if columns == 0 || rows == 0 || glyph_width == 0 || glyph_height == 0 {
            return Err(RenderError::DegenerateGrid { columns, rows });
        }

        // The pixel buffer must stay addressable.
        let pixel_bytes = columns
            .checked_mul(glyph_width)
            .zip(rows.checked_mul(glyph_height))
            .and_then(|(width, height)| width.checked_mul(height))
            .and_then(|pixels| pixels.checked_mul(RGB_CHANNELS));
        if pixel_bytes.is_none() {
            return Err(RenderError::DegenerateGrid { columns, rows });
        }

        Ok(Self { columns, rows, glyph_width, glyph_height })
    }

    pub fn cell_count(&self) -> usize {
        self.columns.saturating_mul(self.rows)
    }

    pub fn pixel_width(&self) -> usize {
        self.columns.saturating_mul(self.glyph_width)
    }

    pub fn pixel_height(&self) -> usize {
        self.rows.saturating_mul(self.glyph_height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResampleKind {
    /// Source already has the target size.
    Identity,
    /// At least one dimension grows.
    Bicubic,
    /// Neither dimension grows, at least one shrinks.
    Gaussian,
}

impl ResampleKind {
    pub fn select(source: (usize, usize), target: (usize, usize)) -> Self {
        if target.0 > source.0 || target.1 > source.1 {
            ResampleKind::Bicubic
        } else if target != source {
            ResampleKind::Gaussian
        } else {
            ResampleKind::Identity
        }
    }
}

/// Resamples `source` to exactly `width` x `height` pixels.
///
/// The source is consumed; when the size already matches it is handed back untouched.
pub fn resample(source: RgbRaster, width: usize, height: usize) -> RgbRaster {
    let kind = ResampleKind::select(source.dimensions(), (width, height));
    match kind {
        ResampleKind::Identity => {
            info!("Image size is {} x {}", source.width(), source.height());
            return source;
        },
        ResampleKind::Bicubic => info!(
            "Scaling up from {} x {} to {} x {}",
            source.width(),
            source.height(),
            width,
            height
        ),
        ResampleKind::Gaussian => info!(
            "Scaling down from {} x {} to {} x {}",
            source.width(),
            source.height(),
            width,
            height
        ),
    }

    if source.is_empty() || width == 0 || height == 0 {
        debug!("resampling degenerate raster, returning blank output");
        return RgbRaster::blank(width, height);
    }

    match kind {
        ResampleKind::Bicubic => upscale_bicubic(&source, width, height),
        _ => downscale_gaussian(&source, width, height),
    }
}

/// Cubic convolution weight for a sample `distance` pixels away.
pub fn bicubic_weight(distance: f32) -> f32 {
    let d = distance.abs();
    if d < 1.0 {
        d * d * ((BICUBIC_A + 2.0) * d - (BICUBIC_A + 3.0)) + 1.0
    } else if d < 2.0 {
        BICUBIC_A * (d * (d * (d - 5.0) + 8.0) - 4.0)
    } else {
        0.0
    }
}

fn upscale_bicubic(source: &RgbRaster, width: usize, height: usize) -> RgbRaster {
    let (src_width, src_height) = source.dimensions();
    let scale_x = src_width as f32 / width as f32;
    let scale_y = src_height as f32 / height as f32;
    let max_x = src_width as isize - 1;
    let max_y = src_height as isize - 1;

    let mut output = RgbRaster::blank(width, height);
    let stride = output.stride();

    output.data_mut().par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        let yo = y as f32 * scale_y;
        let yi = yo as isize;

        for (x, out) in row.chunks_exact_mut(RGB_CHANNELS).enumerate() {
            let xo = x as f32 * scale_x;
            let xi = xo as isize;

            let mut weight_sum = 0.0f32;
            let mut acc = [0.0f32; 3];
            for j in yi - 1..yi + 3 {
                let sy = j.clamp(0, max_y) as usize;
                let dy = yo - j as f32;
                for i in xi - 1..xi + 3 {
                    let sx = i.clamp(0, max_x) as usize;
                    let dx = xo - i as f32;
                    let weight = bicubic_weight((dx * dx + dy * dy).sqrt());
                    if weight == 0.0 {
                        continue;
                    }

                    let pixel = source.pixel(sx, sy);
                    weight_sum += weight;
                    for (channel, value) in acc.iter_mut().zip(pixel) {
                        *channel += f32::from(value) * weight;
                    }
                }
            }

            if weight_sum.abs() <= f32::EPSILON {
                let nearest =
                    source.pixel(xi.clamp(0, max_x) as usize, yi.clamp(0, max_y) as usize);
                out.copy_from_slice(&nearest);
                continue;
            }

            for (dst, channel) in out.iter_mut().zip(acc) {
                *dst = to_channel(channel / weight_sum);
            }
        }
    });

    output
}

/// Normalized Gaussian taps for one target sample.
#[derive(Clone, Debug)]
struct Taps {
    start: usize,
    weights: Vec<f32>,
}

/// Builds the taps for every target index of one axis.
///
/// Each target sample averages the source samples within one scale factor of its back-mapped
/// center, weighted by a Gaussian with a standard deviation of a third of the scale factor.
fn gaussian_taps(source_len: usize, target_len: usize) -> Vec<Taps> {
    let scale = source_len as f32 / target_len as f32;
    let variance = scale * scale / 9.0;
    let last = source_len as isize - 1;

    (0..target_len)
        .map(|index| {
            let center = index as f32 * scale + scale * 0.5;
            let start = ((center - scale) as isize).max(0);
            let end = ((center + scale).ceil() as isize).min(last);

            // The Gaussian's leading factor cancels in the normalization.
            let mut weights: Vec<f32> = (start..=end)
                .map(|pos| {
                    let distance = center - pos as f32;
                    (-(distance * distance) / (2.0 * variance)).exp()
                })
                .collect();

            let sum: f32 = weights.iter().sum();
            if sum > 0.0 {
                weights.iter_mut().for_each(|weight| *weight /= sum);
            }

            Taps { start: start as usize, weights }
        })
        .collect()
}

fn downscale_gaussian(source: &RgbRaster, width: usize, height: usize) -> RgbRaster {
    let (src_width, src_height) = source.dimensions();

    // Horizontal pass into a `width` x `src_height` intermediate.
    let horizontal = gaussian_taps(src_width, width);
    let mut temp = RgbRaster::blank(width, src_height);
    let temp_stride = temp.stride();
    let src_stride = source.stride();
    temp.data_mut().par_chunks_mut(temp_stride).enumerate().for_each(|(y, row)| {
        let src_row = &source.data()[y * src_stride..(y + 1) * src_stride];
        for (out, taps) in row.chunks_exact_mut(RGB_CHANNELS).zip(&horizontal) {
            let mut acc = [0.0f32; 3];
            for (offset, weight) in taps.weights.iter().enumerate() {
                let pos = (taps.start + offset) * RGB_CHANNELS;
                for (channel, acc) in acc.iter_mut().enumerate() {
                    *acc += f32::from(src_row[pos + channel]) * weight;
                }
            }
            for (dst, value) in out.iter_mut().zip(acc) {
                *dst = to_channel(value);
            }
        }
    });

    // Vertical pass consumes the intermediate.
    let vertical = gaussian_taps(src_height, height);
    let mut output = RgbRaster::blank(width, height);
    let stride = output.stride();
    output.data_mut().par_chunks_mut(stride).zip(&vertical).for_each(|(row, taps)| {
        let mut acc = vec![0.0f32; stride];
        for (offset, weight) in taps.weights.iter().enumerate() {
            let y = taps.start + offset;
            let src_row = &temp.data()[y * temp_stride..(y + 1) * temp_stride];
            for (acc, &value) in acc.iter_mut().zip(src_row) {
                *acc += f32::from(value) * weight;
            }
        }
        for (dst, value) in row.iter_mut().zip(acc) {
            *dst = to_channel(value);
        }
    });

    output
}

fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
