use std::collections::HashSet;

use log::{debug, info};

use crate::raster::GrayRaster;
use crate::RenderError;

/// Contiguous run of code points drawn side by side in one glyph sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontRange {
    pub first_code_point: u32,
    pub glyph_count: usize,
}

/// Normal and bold sheets of one font range.
#[derive(Clone, Debug)]
pub struct FontSheet {
    pub range: FontRange,
    pub normal: GrayRaster,
    pub bold: GrayRaster,
}

/// Grayscale bitmaps of a single character, row-major at the atlas glyph size.
#[derive(Clone, Debug)]
pub struct GlyphBitmap {
    pub code_point: u32,
    pub normal: Vec<u8>,
    pub bold: Vec<u8>,
}

/// Global intensity span of one style, used to place a glyph pixel between background and
/// foreground.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntensityRange {
    pub min: u8,
    pub max: u8,
}

impl IntensityRange {
    const EMPTY: Self = Self { min: u8::MAX, max: u8::MIN };

    fn include(&mut self, pixels: &[u8]) {
        for &value in pixels {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
    }

    /// Relative position of `intensity` in the range, `0.0` at `min` and `1.0` at `max`.
    #[inline]
    pub fn position(&self, intensity: u8) -> f32 {
        if self.max <= self.min {
            return 0.0;
        }
        f32::from(intensity.saturating_sub(self.min)) / f32::from(self.max - self.min)
    }
}

#[derive(Clone, Debug)]
struct StyleSet {
    glyphs: Vec<u8>,
    underline: Vec<u8>,
    range: IntensityRange,
}

/// Immutable glyph bitmaps of every loaded character in normal and bold style.
#[derive(Clone, Debug)]
pub struct GlyphAtlas {
    glyph_width: usize,
    glyph_height: usize,
    code_points: Vec<u32>,
    normal: StyleSet,
    bold: StyleSet,
}

impl GlyphAtlas {
    /// Cuts glyphs out of font sheets.
    ///
    /// The glyph size is taken from the normal underline overlay; the bold overlay and all sheets
    /// have to agree with it.
    pub fn from_sheets(
        sheets: &[FontSheet],
        underline: &GrayRaster,
        underline_bold: &GrayRaster,
    ) -> Result<Self, RenderError> {
        let glyph_width = underline.width();
        let glyph_height = underline.height();

        let mut glyphs = Vec::new();
        for (index, sheet) in sheets.iter().enumerate() {
            let count = sheet.range.glyph_count;
            for (raster, style) in [(&sheet.normal, "normal"), (&sheet.bold, "bold")] {
                if raster.height() != glyph_height || raster.width() < count * glyph_width {
                    return Err(RenderError::InvalidGlyphGeometry {
                        what: format!("{style} sheet {index}"),
                        expected: (count * glyph_width, glyph_height),
                        found: (raster.width(), raster.height()),
                    });
                }
            }
            if sheet.normal.width() != sheet.bold.width() {
                return Err(RenderError::InvalidGlyphGeometry {
                    what: format!("bold sheet {index}"),
                    expected: (sheet.normal.width(), glyph_height),
                    found: (sheet.bold.width(), sheet.bold.height()),
                });
            }

            for offset in 0..count {
                glyphs.push(GlyphBitmap {
                    code_point: sheet.range.first_code_point + offset as u32,
                    normal: cut_glyph(&sheet.normal, offset, glyph_width, glyph_height),
                    bold: cut_glyph(&sheet.bold, offset, glyph_width, glyph_height),
                });
            }
        }

        if (underline_bold.width(), underline_bold.height()) != (glyph_width, glyph_height) {
            return Err(RenderError::InvalidGlyphGeometry {
                what: "bold underline".into(),
                expected: (glyph_width, glyph_height),
                found: (underline_bold.width(), underline_bold.height()),
            });
        }

        Self::from_glyphs(
            glyph_width,
            glyph_height,
            glyphs,
            underline.data().to_vec(),
            underline_bold.data().to_vec(),
        )
    }

    /// Builds the atlas from individual bitmaps of `glyph_width` x `glyph_height` pixels.
    ///
    /// A code point seen before keeps its first glyph; later duplicates are dropped.
    pub fn from_glyphs(
        glyph_width: usize,
        glyph_height: usize,
        glyphs: Vec<GlyphBitmap>,
        underline: Vec<u8>,
        underline_bold: Vec<u8>,
    ) -> Result<Self, RenderError> {
        let area = glyph_width * glyph_height;
        if area == 0 {
            return Err(RenderError::InvalidGlyphGeometry {
                what: "glyph size".into(),
                expected: (1, 1),
                found: (glyph_width, glyph_height),
            });
        }

        let check = |what: String, pixels: &[u8]| {
            if pixels.len() == area {
                Ok(())
            } else {
                Err(RenderError::InvalidGlyphGeometry {
                    what,
                    expected: (glyph_width, glyph_height),
                    found: (pixels.len(), 1),
                })
            }
        };
        check("underline".into(), underline.as_slice())?;
        check("bold underline".into(), underline_bold.as_slice())?;

        let mut seen = HashSet::with_capacity(glyphs.len());
        let mut code_points = Vec::with_capacity(glyphs.len());
        let mut normal = Vec::with_capacity(glyphs.len() * area);
        let mut bold = Vec::with_capacity(glyphs.len() * area);
        for glyph in glyphs {
            check(format!("glyph U+{:04X}", glyph.code_point), glyph.normal.as_slice())?;
            check(format!("bold glyph U+{:04X}", glyph.code_point), glyph.bold.as_slice())?;
            if !seen.insert(glyph.code_point) {
                debug!("skipping duplicate glyph U+{:04X}", glyph.code_point);
                continue;
            }
            code_points.push(glyph.code_point);
            normal.extend_from_slice(&glyph.normal);
            bold.extend_from_slice(&glyph.bold);
        }

        if code_points.is_empty() {
            return Err(RenderError::EmptyAtlas);
        }

        let normal = StyleSet::new(normal, underline);
        let bold = StyleSet::new(bold, underline_bold);
        info!("Normal color range: {}-{}", normal.range.min, normal.range.max);
        info!("Bold color range:   {}-{}", bold.range.min, bold.range.max);
        debug!("glyph atlas holds {} glyphs of {glyph_width}x{glyph_height}", code_points.len());

        Ok(Self { glyph_width, glyph_height, code_points, normal, bold })
    }

    pub fn glyph_width(&self) -> usize {
        self.glyph_width
    }

    pub fn glyph_height(&self) -> usize {
        self.glyph_height
    }

    /// Pixels per glyph.
    pub fn area(&self) -> usize {
        self.glyph_width * self.glyph_height
    }

    /// Number of distinct characters.
    pub fn len(&self) -> usize {
        self.code_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code_points.is_empty()
    }

    #[inline]
    pub fn glyph(&self, index: usize, bold: bool) -> &[u8] {
        let area = self.area();
        &self.style(bold).glyphs[index * area..(index + 1) * area]
    }

    #[inline]
    pub fn underline(&self, bold: bool) -> &[u8] {
        &self.style(bold).underline
    }

    #[inline]
    pub fn intensity_range(&self, bold: bool) -> IntensityRange {
        self.style(bold).range
    }

    pub fn code_point(&self, index: usize) -> Option<u32> {
        self.code_points.get(index).copied()
    }

    /// Character for a glyph index, `U+FFFD` when the index or code point is invalid.
    pub fn character(&self, index: usize) -> char {
        self.code_point(index).and_then(char::from_u32).unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    fn style(&self, bold: bool) -> &StyleSet {
        if bold {
            &self.bold
        } else {
            &self.normal
        }
    }
}

impl StyleSet {
    fn new(glyphs: Vec<u8>, underline: Vec<u8>) -> Self {
        let mut range = IntensityRange::EMPTY;
        range.include(&glyphs);
        range.include(&underline);
        Self { glyphs, underline, range }
    }
}

fn cut_glyph(
    sheet: &GrayRaster,
    offset: usize,
    glyph_width: usize,
    glyph_height: usize,
) -> Vec<u8> {
    let start = offset * glyph_width;
    (0..glyph_height)
        .flat_map(|y| {
            let row = y * sheet.width() + start;
            sheet.data()[row..row + glyph_width].iter().copied()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(width: usize, height: usize, data: Vec<u8>) -> GrayRaster {
        GrayRaster::new(width, height, data).unwrap()
    }

    #[test]
    fn cuts_glyphs_from_sheets() {
        // Two 2x2 glyphs side by side.
        let normal = sheet(4, 2, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let bold = sheet(4, 2, vec![11, 12, 13, 14, 15, 16, 17, 18]);
        let sheets = [FontSheet {
            range: FontRange { first_code_point: 65, glyph_count: 2 },
            normal,
            bold,
        }];
        let underline = sheet(2, 2, vec![0, 0, 0, 200]);

        let atlas = GlyphAtlas::from_sheets(&sheets, &underline, &underline).unwrap();
        assert_eq!(atlas.len(), 2);
        assert_eq!(atlas.glyph(0, false), &[1, 2, 5, 6]);
        assert_eq!(atlas.glyph(1, false), &[3, 4, 7, 8]);
        assert_eq!(atlas.glyph(1, true), &[13, 14, 17, 18]);
        assert_eq!(atlas.character(1), 'B');
        assert_eq!(atlas.intensity_range(false), IntensityRange { min: 0, max: 200 });
        assert_eq!(atlas.intensity_range(true), IntensityRange { min: 0, max: 200 });
    }

    #[test]
    fn intensity_range_is_per_style() {
        let glyphs = vec![
            GlyphBitmap { code_point: 32, normal: vec![10, 10, 10, 10], bold: vec![0; 4] },
            GlyphBitmap { code_point: 33, normal: vec![10, 90, 90, 10], bold: vec![0, 0, 250, 0] },
        ];
        let atlas =
            GlyphAtlas::from_glyphs(2, 2, glyphs, vec![20, 20, 20, 20], vec![5, 5, 5, 5]).unwrap();
        assert_eq!(atlas.intensity_range(false), IntensityRange { min: 10, max: 90 });
        assert_eq!(atlas.intensity_range(true), IntensityRange { min: 0, max: 250 });
    }

    #[test]
    fn drops_duplicate_code_points() {
        let glyphs = vec![
            GlyphBitmap { code_point: 65, normal: vec![1; 4], bold: vec![1; 4] },
            GlyphBitmap { code_point: 66, normal: vec![2; 4], bold: vec![2; 4] },
            GlyphBitmap { code_point: 65, normal: vec![3; 4], bold: vec![3; 4] },
        ];
        let atlas = GlyphAtlas::from_glyphs(2, 2, glyphs, vec![0; 4], vec![0; 4]).unwrap();
        assert_eq!(atlas.len(), 2);
        assert_eq!(atlas.glyph(0, false), &[1; 4]);
        assert_eq!(atlas.code_point(1), Some(66));
        assert_eq!(atlas.code_point(2), None);
    }

    #[test]
    fn rejects_mismatched_geometry() {
        let sheets = [FontSheet {
            range: FontRange { first_code_point: 32, glyph_count: 2 },
            normal: sheet(4, 3, vec![0; 12]),
            bold: sheet(4, 3, vec![0; 12]),
        }];
        let underline = sheet(2, 2, vec![0; 4]);
        let err = GlyphAtlas::from_sheets(&sheets, &underline, &underline).unwrap_err();
        assert!(matches!(err, RenderError::InvalidGlyphGeometry { .. }));

        let narrow_bold = [FontSheet {
            range: FontRange { first_code_point: 32, glyph_count: 1 },
            normal: sheet(2, 2, vec![0; 4]),
            bold: sheet(3, 2, vec![0; 6]),
        }];
        assert!(GlyphAtlas::from_sheets(&narrow_bold, &underline, &underline).is_err());

        let bold_underline = sheet(3, 2, vec![0; 6]);
        assert!(GlyphAtlas::from_sheets(&[], &underline, &bold_underline).is_err());

        let glyphs = vec![GlyphBitmap { code_point: 65, normal: vec![0; 3], bold: vec![0; 4] }];
        assert!(GlyphAtlas::from_glyphs(2, 2, glyphs, vec![0; 4], vec![0; 4]).is_err());
    }

    #[test]
    fn rejects_empty_atlas() {
        let underline = sheet(2, 2, vec![0; 4]);
        let err = GlyphAtlas::from_sheets(&[], &underline, &underline).unwrap_err();
        assert!(matches!(err, RenderError::EmptyAtlas));
    }

    #[test]
    fn position_spans_range() {
        let range = IntensityRange { min: 50, max: 150 };
        assert_eq!(range.position(50), 0.0);
        assert_eq!(range.position(150), 1.0);
        assert_eq!(range.position(100), 0.5);
        assert_eq!(IntensityRange { min: 7, max: 7 }.position(7), 0.0);
    }
}
