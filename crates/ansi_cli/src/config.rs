//! TOML configuration for the command line front-end.
//!
//! Every key is optional. A missing file yields the built-in defaults, which point at the
//! `font/` directory next to the working directory.

use std::path::{Path, PathBuf};

use ansi_render::{FontFiles, FontRange, FontRangeFiles, Palette, RenderConfig, Rgb, PALETTE_SIZE};
use anyhow::{Context, Result};
use clap::ValueEnum;
use log::{debug, warn};
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CliConfig {
    pub columns: usize,
    pub quality: f32,
    pub palette: PaletteConfig,
    pub font: FontConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        let render = RenderConfig::default();
        Self {
            columns: render.columns,
            quality: render.quality,
            palette: PaletteConfig::default(),
            font: FontConfig::default(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PaletteScheme {
    #[default]
    Vga,
    Xterm,
}

/// Named scheme, optionally replaced table by table.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PaletteConfig {
    pub scheme: PaletteScheme,
    pub normal: Option<[Rgb; PALETTE_SIZE]>,
    pub bold: Option<[Rgb; PALETTE_SIZE]>,
}

impl PaletteConfig {
    pub fn palette(&self) -> Palette {
        let base = match self.scheme {
            PaletteScheme::Vga => Palette::vga(),
            PaletteScheme::Xterm => Palette::xterm(),
        };
        Palette::new(self.normal.unwrap_or(*base.normal()), self.bold.unwrap_or(*base.bold()))
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FontConfig {
    pub underline: PathBuf,
    pub underline_bold: PathBuf,
    pub ranges: Vec<RangeConfig>,
}

impl Default for FontConfig {
    fn default() -> Self {
        let ranges = [(32, 126), (161, 255), (2404, 2417), (2534, 2554)]
            .into_iter()
            .map(|(first, last)| RangeConfig {
                normal: PathBuf::from(format!("font/unicode-{first}-{last}.bmp")),
                bold: PathBuf::from(format!("font/unicode-{first}-{last}-bold.bmp")),
                first,
                count: (last - first + 1) as usize,
            })
            .collect();

        Self {
            underline: PathBuf::from("font/underline.bmp"),
            underline_bold: PathBuf::from("font/underline-bold.bmp"),
            ranges,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct RangeConfig {
    pub normal: PathBuf,
    pub bold: PathBuf,
    /// Code point of the leftmost glyph.
    pub first: u32,
    pub count: usize,
}

impl CliConfig {
    /// Loads `path`, falling back to defaults when no file is given or it does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        let mut config: CliConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {:?}", path))?;
        debug!("Loaded config from {}", path.display());

        if let Some(base) = path.parent() {
            config.font.resolve(base);
        }
        Ok(config)
    }

    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            columns: self.columns,
            quality: self.quality,
            palette: self.palette.palette(),
        }
    }

    pub fn font_files(&self) -> FontFiles {
        FontFiles {
            underline: self.font.underline.clone(),
            underline_bold: self.font.underline_bold.clone(),
            ranges: self
                .font
                .ranges
                .iter()
                .map(|range| FontRangeFiles {
                    normal: range.normal.clone(),
                    bold: range.bold.clone(),
                    range: FontRange { first_code_point: range.first, glyph_count: range.count },
                })
                .collect(),
        }
    }
}

impl FontConfig {
    /// Makes relative sheet paths relative to `base`.
    fn resolve(&mut self, base: &Path) {
        let join = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        join(&mut self.underline);
        join(&mut self.underline_bold);
        for range in &mut self.ranges {
            join(&mut range.normal);
            join(&mut range.bold);
        }
    }
}
