mod config;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use ansi_render::{load_rgb, save_rgb, AnsiRenderer, RenderOutput, RgbRaster};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, Frame};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use walkdir::WalkDir;

use crate::config::{CliConfig, PaletteConfig, PaletteScheme};

#[derive(Parser, Debug)]
#[command(author, version, about = "Render images and animations as colored ANSI cells")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// TOML file with grid, palette and font settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Width of the character grid
    #[arg(long, global = true)]
    columns: Option<usize>,
    /// Search pruning threshold in (0, 1]; lower is faster
    #[arg(long, global = true)]
    quality: Option<f32>,
    /// Built-in color scheme, replacing any palette from the config file
    #[arg(long, global = true, value_enum)]
    palette: Option<PaletteScheme>,
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the ANSI rendering to stdout
    Preview(PreviewArgs),
    /// Render an image and write the composited preview to disk
    Convert(ConvertArgs),
    /// Render an animation (GIF file or directory of frames) frame by frame
    Animate(AnimateArgs),
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Input image path
    input: PathBuf,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Input image path
    input: PathBuf,
    /// Preview image path
    #[arg(short, long)]
    output: PathBuf,
    /// Also write the ANSI text to this file
    #[arg(long)]
    text: Option<PathBuf>,
    /// Also write the resampled source image
    #[arg(long)]
    resampled: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct AnimateArgs {
    /// Input animation path (GIF file or directory of images)
    input: PathBuf,
    /// Output directory for frame files
    #[arg(short, long)]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let start = Instant::now();
    let renderer = cli.renderer()?;
    match cli.command {
        Commands::Preview(args) => preview(&renderer, args)?,
        Commands::Convert(args) => convert(&renderer, args)?,
        Commands::Animate(args) => animate(&renderer, args)?,
    }
    info!("Finished in {:.2?}", start.elapsed());

    Ok(())
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

impl Cli {
    /// Config file values with command line overrides applied.
    fn config(&self) -> Result<CliConfig> {
        let mut config = CliConfig::load(self.config.as_deref())?;
        if let Some(columns) = self.columns {
            config.columns = columns;
        }
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if let Some(scheme) = self.palette {
            config.palette = PaletteConfig { scheme, ..PaletteConfig::default() };
        }
        Ok(config)
    }

    fn renderer(&self) -> Result<AnsiRenderer> {
        let config = self.config()?;
        let atlas = config.font_files().load().context("failed to load font sheets")?;
        AnsiRenderer::new(config.render_config(), atlas).context("invalid render settings")
    }
}

fn preview(renderer: &AnsiRenderer, args: PreviewArgs) -> Result<()> {
    let output = render_image(renderer, &args.input)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for row in output.cells.ansi_rows(renderer.atlas()) {
        writeln!(out, "{}", row)?;
    }
    Ok(())
}

fn convert(renderer: &AnsiRenderer, args: ConvertArgs) -> Result<()> {
    let output = render_image(renderer, &args.input)?;

    if let Some(path) = &args.text {
        write_rows(path, output.cells.ansi_rows(renderer.atlas()))?;
    }
    if let Some(path) = &args.resampled {
        save_rgb(output.resampled, path).with_context(|| format!("failed to write {:?}", path))?;
    }
    save_rgb(output.preview, &args.output)
        .with_context(|| format!("failed to write {:?}", args.output))?;

    info!("Preview written to {:?}", args.output);
    Ok(())
}

/// Renders one image with a progress bar over rows of cells.
fn render_image(renderer: &AnsiRenderer, path: &Path) -> Result<RenderOutput> {
    let source = load_rgb(path).with_context(|| format!("failed to open image {:?}", path))?;
    let geometry = renderer.geometry(source.width(), source.height())?;

    let progress = progress_bar(geometry.rows, "rows")?;
    let output = renderer
        .render_with_progress(source, &|_| progress.inc(1))
        .with_context(|| format!("failed to render {:?}", path))?;
    progress.finish_and_clear();

    Ok(output)
}

fn animate(renderer: &AnsiRenderer, args: AnimateArgs) -> Result<()> {
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create output directory {:?}", args.out_dir))?;

    let frames = load_frames(&args.input)?;
    let progress = progress_bar(frames.len(), "frames")?;

    for (index, frame) in frames.into_iter().enumerate() {
        let source = RgbRaster::from(DynamicImage::ImageRgba8(frame.into_buffer()));
        let output =
            renderer.render(source).with_context(|| format!("failed to render frame {}", index))?;

        let image_path = args.out_dir.join(format!("frame_{:04}.png", index));
        save_rgb(output.preview, &image_path)
            .with_context(|| format!("failed to write {:?}", image_path))?;
        let text_path = args.out_dir.join(format!("frame_{:04}.txt", index));
        write_rows(&text_path, output.cells.ansi_rows(renderer.atlas()))?;

        progress.inc(1);
    }

    progress.finish_with_message(format!("Frames written to {:?}", args.out_dir));
    Ok(())
}

fn progress_bar(len: usize, unit: &str) -> Result<ProgressBar> {
    let progress = ProgressBar::new(len as u64);
    let template =
        format!("{{spinner}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit}");
    progress.set_style(ProgressStyle::with_template(&template)?.progress_chars("=> "));
    Ok(progress)
}

fn write_rows(path: &Path, rows: impl IntoIterator<Item = String>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
    let mut file = BufWriter::new(file);
    for row in rows {
        writeln!(file, "{}", row)?;
    }
    file.flush()?;
    Ok(())
}

fn load_frames(path: &Path) -> Result<Vec<Frame>> {
    if path.is_dir() {
        load_frames_from_directory(path)
    } else {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if extension == "gif" {
            load_frames_from_gif(path)
        } else {
            let image =
                image::open(path).with_context(|| format!("failed to open image {:?}", path))?;
            Ok(vec![Frame::new(image.into_rgba8())])
        }
    }
}

fn load_frames_from_gif(path: &Path) -> Result<Vec<Frame>> {
    let file = File::open(path).with_context(|| format!("failed to open GIF {:?}", path))?;
    let decoder =
        GifDecoder::new(file).with_context(|| format!("failed to decode GIF {:?}", path))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .with_context(|| format!("failed to collect frames from {:?}", path))?;
    info!("Decoded {} frames from {:?}", frames.len(), path);
    Ok(frames)
}

fn load_frames_from_directory(path: &Path) -> Result<Vec<Frame>> {
    let mut entries: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().to_path_buf())
        .collect();
    entries.sort();
    if entries.is_empty() {
        anyhow::bail!("no image files found in {:?}", path);
    }

    let mut frames = Vec::with_capacity(entries.len());
    for entry in entries {
        let image =
            image::open(&entry).with_context(|| format!("failed to open image {:?}", entry))?;
        frames.push(Frame::new(image.into_rgba8()));
    }
    Ok(frames)
}
