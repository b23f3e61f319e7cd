//! Command-line configuration for tiffo.
//!
//! Every subcommand is a clap `Args` struct with its own `validate()`.
//! Options shared by commands that open files live in [`ReadArgs`].
//!
//! # Environment Variables
//!
//! - `TIFFO_BLOCK_SIZE` - Range cache block size in bytes (default: 256KB)
//! - `TIFFO_CACHE_BLOCKS` - Range cache capacity in blocks (default: 64)
//! - `TIFFO_MEAN_THRESHOLD` - Noise suppression mean cutoff (default: 300)
//! - `TIFFO_SPREAD_THRESHOLD` - Noise suppression p95-p5 cutoff (default: 300)
//! - `TIFFO_PALETTE` - Palette file for `colorize`
//! - `TIFFO_THREADS` - Worker threads for `scale` (default: 0, rayon picks)
//! - `TIFFO_JPEG_QUALITY` - Quality for JPEG output (default: 75)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::compose::{DEFAULT_MEAN_THRESHOLD, DEFAULT_SPREAD_THRESHOLD};
use crate::format::tiff::{
    Compression, ReaderOptions, DEFAULT_JPEG_QUALITY, DEFAULT_STRIP_CACHE, MAX_JPEG_QUALITY,
    MIN_JPEG_QUALITY,
};
use crate::io::{DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCKS};
use crate::raster::{ScaleMethod, TILE_ALIGNMENT};

// =============================================================================
// Default Values
// =============================================================================

/// Default worker threads for `scale`; 0 lets rayon use every core.
pub const DEFAULT_THREADS: usize = 0;

/// Default scale method name.
pub const DEFAULT_SCALE_METHOD: ScaleArg = ScaleArg::Mean;

// =============================================================================
// CLI Arguments
// =============================================================================

/// tiffo - tiled TIFF raster tools.
///
/// Reads classic and BigTIFF files, composes gray channels into RGB images
/// and rewrites directories with new compression or layout.
#[derive(Parser, Debug, Clone)]
#[command(name = "tiffo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the header and a summary of every directory.
    Probe(ProbeConfig),
    /// Merge two or three 8-bit gray directories into one RGB directory.
    #[command(name = "gray2rgb")]
    GrayToRgb(GrayToRgbConfig),
    /// Per-channel means of one or all directories.
    Mean(MeanConfig),
    /// False-color composition of selected channels through a palette.
    Colorize(ColorizeConfig),
    /// Zero out tiles that carry only noise, writing LZW output.
    Compress(CompressConfig),
    /// Rewrite one directory with a new compression or tile size.
    Copy(CopyConfig),
    /// Downsample one directory.
    Scale(ScaleConfig),
}

impl Command {
    /// Validate the selected subcommand.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Command::Probe(_) => Ok(()),
            Command::GrayToRgb(config) => config.validate(),
            Command::Mean(config) => config.read.validate(),
            Command::Colorize(config) => config.validate(),
            Command::Compress(config) => config.read.validate(),
            Command::Copy(config) => config.validate(),
            Command::Scale(config) => config.validate(),
        }
    }
}

// =============================================================================
// Shared Options
// =============================================================================

/// Range cache options for commands that read TIFF files.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Block size in bytes for the range cache.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, env = "TIFFO_BLOCK_SIZE")]
    pub block_size: usize,

    /// Maximum number of blocks kept by the range cache.
    #[arg(long, default_value_t = DEFAULT_CACHE_BLOCKS, env = "TIFFO_CACHE_BLOCKS")]
    pub cache_blocks: usize,
}

impl Default for ReadArgs {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_CACHE_BLOCKS,
        }
    }
}

impl ReadArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.block_size < 1024 || self.block_size > 16 * 1024 * 1024 {
            return Err("block_size must be between 1KB and 16MB".to_string());
        }
        if self.cache_blocks == 0 {
            return Err("cache_blocks must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            block_size: self.block_size,
            cache_blocks: self.cache_blocks,
            strip_cache: DEFAULT_STRIP_CACHE,
        }
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ProbeConfig {
    /// File to inspect.
    pub input: PathBuf,

    /// Print JSON instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(flatten)]
    pub read: ReadArgs,
}

/// Inputs are either one multi-directory file or separate files per channel.
#[derive(Args, Debug, Clone)]
pub struct GrayToRgbConfig {
    /// `<input> <output>`, or just `<output>` with -r/-g/-b.
    #[arg(num_args = 1..=2, required = true)]
    pub paths: Vec<PathBuf>,

    /// File holding the red channel.
    #[arg(short, long)]
    pub red: Option<PathBuf>,

    /// File holding the green channel.
    #[arg(short, long)]
    pub green: Option<PathBuf>,

    /// File holding the blue channel (left empty when absent).
    #[arg(short, long)]
    pub blue: Option<PathBuf>,

    #[command(flatten)]
    pub read: ReadArgs,
}

/// Where the gray sources of `gray2rgb` come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraySources {
    /// First two or three directories of one file
    Directories(PathBuf),
    /// First directory of each file, in red, green, blue order
    Files(Vec<PathBuf>),
}

impl GrayToRgbConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.read.validate()?;
        self.sources().map(|_| ())
    }

    /// Resolve the positional and channel arguments.
    pub fn sources(&self) -> Result<GraySources, String> {
        let any_channel = self.red.is_some() || self.green.is_some() || self.blue.is_some();
        match (self.paths.len(), any_channel) {
            (2, false) => Ok(GraySources::Directories(self.paths[0].clone())),
            (1, true) => match (&self.red, &self.green) {
                (Some(red), Some(green)) => {
                    let mut files = vec![red.clone(), green.clone()];
                    files.extend(self.blue.clone());
                    Ok(GraySources::Files(files))
                }
                _ => Err("both --red and --green are required with separate channel files".to_string()),
            },
            (2, true) => Err("give either an input file or -r/-g/-b, not both".to_string()),
            _ => Err("expected <input> <output>, or -r R -g G [-b B] <output>".to_string()),
        }
    }

    /// The last positional path.
    pub fn output(&self) -> Option<&PathBuf> {
        self.paths.last()
    }
}

#[derive(Args, Debug, Clone)]
pub struct MeanConfig {
    /// File to measure.
    pub input: PathBuf,

    /// Only measure this directory.
    #[arg(short, long)]
    pub directory: Option<usize>,

    /// Print JSON instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(flatten)]
    pub read: ReadArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ColorizeConfig {
    pub input: PathBuf,
    pub output: PathBuf,

    /// Palette file: one `index,name,r,g,b,lower,upper` line per channel.
    #[arg(short, long, env = "TIFFO_PALETTE")]
    pub palette: PathBuf,

    /// Palette positions to compose, comma separated.
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub channels: Vec<usize>,

    #[command(flatten)]
    pub read: ReadArgs,
}

impl ColorizeConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.read.validate()?;
        if self.channels.is_empty() {
            return Err("at least one channel must be selected".to_string());
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct CompressConfig {
    pub input: PathBuf,
    pub output: PathBuf,

    /// Tiles whose mean reaches this are kept.
    #[arg(long, default_value_t = DEFAULT_MEAN_THRESHOLD, env = "TIFFO_MEAN_THRESHOLD")]
    pub mean_threshold: u32,

    /// Tiles whose p95 - p5 spread exceeds this are kept.
    #[arg(long, default_value_t = DEFAULT_SPREAD_THRESHOLD, env = "TIFFO_SPREAD_THRESHOLD")]
    pub spread_threshold: u32,

    #[command(flatten)]
    pub read: ReadArgs,
}

/// Output compression choices.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionArg {
    None,
    Lzw,
    Deflate,
    Packbits,
    Jpeg,
}

impl CompressionArg {
    pub fn code(self) -> u16 {
        let compression = match self {
            CompressionArg::None => Compression::None,
            CompressionArg::Lzw => Compression::Lzw,
            CompressionArg::Deflate => Compression::AdobeDeflate,
            CompressionArg::Packbits => Compression::PackBits,
            CompressionArg::Jpeg => Compression::Jpeg,
        };
        compression.as_u16()
    }
}

#[derive(Args, Debug, Clone)]
pub struct CopyConfig {
    pub input: PathBuf,
    pub output: PathBuf,

    /// Directory to copy.
    #[arg(short, long, default_value_t = 0)]
    pub directory: usize,

    /// Output compression (default: same as the source).
    #[arg(long, value_enum)]
    pub compression: Option<CompressionArg>,

    /// Output tile size; must be a multiple of 16.
    #[arg(long)]
    pub tile_size: Option<u32>,

    /// Quality for JPEG output (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "TIFFO_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    #[command(flatten)]
    pub read: ReadArgs,
}

impl CopyConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.read.validate()?;
        if let Some(size) = self.tile_size {
            if size == 0 || size % TILE_ALIGNMENT != 0 {
                return Err(format!("tile_size must be a non-zero multiple of {}", TILE_ALIGNMENT));
            }
        }
        validate_quality(self.jpeg_quality)
    }
}

/// Scale aggregation choices.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleArg {
    Mean,
    Mode,
}

impl From<ScaleArg> for ScaleMethod {
    fn from(arg: ScaleArg) -> Self {
        match arg {
            ScaleArg::Mean => ScaleMethod::Mean,
            ScaleArg::Mode => ScaleMethod::Mode,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScaleConfig {
    pub input: PathBuf,
    pub output: PathBuf,

    /// Scale factor in (0, 1].
    #[arg(short, long)]
    pub factor: f64,

    /// How each output pixel aggregates its window.
    #[arg(short, long, value_enum, default_value_t = DEFAULT_SCALE_METHOD)]
    pub method: ScaleArg,

    /// Worker threads (0 uses every core).
    #[arg(short, long, default_value_t = DEFAULT_THREADS, env = "TIFFO_THREADS")]
    pub threads: usize,

    /// Directory to scale.
    #[arg(short, long, default_value_t = 0)]
    pub directory: usize,

    /// Quality for JPEG output (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "TIFFO_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    #[command(flatten)]
    pub read: ReadArgs,
}

impl ScaleConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.read.validate()?;
        if !(self.factor > 0.0 && self.factor <= 1.0) {
            return Err(format!("factor must be in (0, 1], got {}", self.factor));
        }
        validate_quality(self.jpeg_quality)
    }
}

fn validate_quality(quality: u8) -> Result<(), String> {
    if !(MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality) {
        return Err(format!(
            "jpeg_quality must be between {} and {}",
            MIN_JPEG_QUALITY, MAX_JPEG_QUALITY
        ));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tiffo").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_probe_defaults() {
        let cli = parse(&["probe", "a.tif"]);
        assert!(!cli.verbose);
        match cli.command {
            Command::Probe(config) => {
                assert_eq!(config.input, PathBuf::from("a.tif"));
                assert!(!config.json);
                assert_eq!(config.read.block_size, DEFAULT_BLOCK_SIZE);
                assert_eq!(config.read.cache_blocks, DEFAULT_CACHE_BLOCKS);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_gray2rgb_single_file() {
        let cli = parse(&["gray2rgb", "in.tif", "out.tif"]);
        let Command::GrayToRgb(config) = cli.command else {
            panic!("expected gray2rgb");
        };
        assert_eq!(
            config.sources().unwrap(),
            GraySources::Directories(PathBuf::from("in.tif"))
        );
        assert_eq!(config.output(), Some(&PathBuf::from("out.tif")));
    }

    #[test]
    fn test_gray2rgb_channel_files() {
        let cli = parse(&["gray2rgb", "-r", "r.tif", "-g", "g.tif", "out.tif"]);
        let Command::GrayToRgb(config) = cli.command else {
            panic!("expected gray2rgb");
        };
        assert_eq!(
            config.sources().unwrap(),
            GraySources::Files(vec![PathBuf::from("r.tif"), PathBuf::from("g.tif")])
        );
        assert_eq!(config.output(), Some(&PathBuf::from("out.tif")));
    }

    #[test]
    fn test_gray2rgb_invalid_combinations() {
        let cli = parse(&["gray2rgb", "-r", "r.tif", "out.tif"]);
        assert!(cli.command.validate().unwrap_err().contains("--green"));

        let cli = parse(&["gray2rgb", "-r", "r.tif", "-g", "g.tif", "in.tif", "out.tif"]);
        assert!(cli.command.validate().is_err());

        let cli = parse(&["gray2rgb", "out.tif"]);
        assert!(cli.command.validate().is_err());
    }

    #[test]
    fn test_colorize_channels() {
        let cli = parse(&[
            "colorize", "in.tif", "out.tif", "--palette", "p.txt", "--channels", "0,2,5",
        ]);
        let Command::Colorize(config) = cli.command else {
            panic!("expected colorize");
        };
        assert_eq!(config.channels, vec![0, 2, 5]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_compress_thresholds() {
        let cli = parse(&["compress", "in.tif", "out.tif", "--mean-threshold", "120"]);
        let Command::Compress(config) = cli.command else {
            panic!("expected compress");
        };
        assert_eq!(config.mean_threshold, 120);
        assert_eq!(config.spread_threshold, DEFAULT_SPREAD_THRESHOLD);
    }

    #[test]
    fn test_copy_validation() {
        let cli = parse(&["copy", "in.tif", "out.tif", "--compression", "lzw", "--tile-size", "128"]);
        let Command::Copy(mut config) = cli.command else {
            panic!("expected copy");
        };
        assert_eq!(config.compression.map(CompressionArg::code), Some(5));
        assert!(config.validate().is_ok());

        config.tile_size = Some(100);
        assert!(config.validate().is_err());

        config.tile_size = None;
        config.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scale_validation() {
        let cli = parse(&["scale", "in.tif", "out.tif", "--factor", "0.5", "--method", "mode"]);
        let Command::Scale(mut config) = cli.command else {
            panic!("expected scale");
        };
        assert_eq!(ScaleMethod::from(config.method), ScaleMethod::Mode);
        assert_eq!(config.threads, DEFAULT_THREADS);
        assert!(config.validate().is_ok());

        config.factor = 1.5;
        assert!(config.validate().is_err());
        config.factor = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_cache_sizes() {
        let mut read = ReadArgs::default();
        assert!(read.validate().is_ok());

        read.cache_blocks = 0;
        assert!(read.validate().is_err());

        let read = ReadArgs {
            block_size: 512,
            ..ReadArgs::default()
        };
        assert!(read.validate().unwrap_err().contains("block_size"));
    }

    #[test]
    fn test_compression_codes() {
        assert_eq!(CompressionArg::None.code(), 1);
        assert_eq!(CompressionArg::Deflate.code(), 8);
        assert_eq!(CompressionArg::Packbits.code(), 32773);
        assert_eq!(CompressionArg::Jpeg.code(), 7);
    }
}
