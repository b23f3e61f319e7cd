//! tiffo - tiled TIFF raster tools.
//!
//! This binary parses the command line, sets up logging and runs one
//! subcommand. Exit code 0 on success, 1 on any reported failure.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiffo::{
    compose::{
        directory_mean, ChannelMeans, Colorizer, GrayMerge, GraySource, NoiseSuppressor, Palette,
        SuppressionThresholds,
    },
    config::{
        Cli, ColorizeConfig, Command, CompressConfig, CopyConfig, GraySources, GrayToRgbConfig,
        MeanConfig, ProbeConfig, ReadArgs, ScaleConfig,
    },
    copy::TagCopier,
    error::{PreconditionError, RasterError},
    format::tiff::{
        Compression, HeaderProbe, TiffFile, TiffTag, TiffWriter, WriterOptions,
    },
    io::{BlockCache, FileRangeReader},
    raster::{RasterReader, RasterWriter},
};

type LocalFile = TiffFile<BlockCache<FileRangeReader>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = cli.command.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Command::Probe(config) => run_probe(config).await,
        Command::GrayToRgb(config) => run_gray_to_rgb(config).await,
        Command::Mean(config) => run_mean(config).await,
        Command::Colorize(config) => run_colorize(config).await,
        Command::Compress(config) => run_compress(config).await,
        Command::Copy(config) => run_copy(config).await,
        Command::Scale(config) => run_scale(config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = ?e.kind(), "{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
///
/// Logs go to stderr so that stdout carries only command output.
fn init_logging(verbose: bool) {
    let env_filter = if verbose { "tiffo=debug" } else { "tiffo=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Helpers
// =============================================================================

async fn open(path: &Path, read: &ReadArgs) -> Result<LocalFile, RasterError> {
    let file = TiffFile::open_path(path, &read.reader_options()).await?;
    info!(
        path = %path.display(),
        directories = file.directory_count(),
        bigtiff = file.is_bigtiff(),
        "opened file"
    );
    Ok(file)
}

/// Output files keep the byte order and offset width of their source.
fn create(path: &Path, like: &LocalFile) -> Result<TiffWriter<std::io::BufWriter<std::fs::File>>, RasterError> {
    let options = WriterOptions {
        byte_order: like.byte_order(),
        bigtiff: like.is_bigtiff(),
    };
    Ok(TiffWriter::create(path, options)?)
}

/// Finish `writer`, or remove the partial output at `path` if anything
/// before or during the finish failed.
fn finish_output<T, W: std::io::Write + std::io::Seek>(
    path: &Path,
    writer: TiffWriter<W>,
    written: Result<T, RasterError>,
) -> Result<T, RasterError> {
    let result = written.and_then(|value| writer.finish().map(|_| value).map_err(RasterError::from));
    if result.is_err() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), "Failed to remove partial output: {}", e);
        }
    }
    result
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize output: {}", e),
    }
}

// =============================================================================
// Probe Command
// =============================================================================

async fn run_probe(config: ProbeConfig) -> Result<(), RasterError> {
    let probe = HeaderProbe::from_path(&config.input).await?;
    let file = open(&config.input, &config.read).await?;
    let summaries: Vec<_> = file.directories().iter().map(|d| d.summary()).collect();

    if config.json {
        print_json(&serde_json::json!({
            "header": probe,
            "directories": summaries,
        }));
        return Ok(());
    }

    println!("{}", probe);
    for summary in &summaries {
        println!();
        println!(
            "Directory {} at offset {}: {}x{}, {}",
            summary.index, summary.offset, summary.width, summary.height, summary.compression
        );
        for tag in &summary.tags {
            println!(
                "  {:>5} {:<28} {:<9} [{}] {}",
                tag.id, tag.name, tag.field_type, tag.count, tag.value
            );
        }
    }
    Ok(())
}

// =============================================================================
// Gray to RGB Command
// =============================================================================

async fn run_gray_to_rgb(config: GrayToRgbConfig) -> Result<(), RasterError> {
    // validate() has already rejected bad argument combinations
    let (Ok(sources), Some(output)) = (config.sources(), config.output()) else {
        return Err(PreconditionError::SourceCount(config.paths.len()).into());
    };
    let copier = TagCopier::new();

    match sources {
        GraySources::Directories(input) => {
            let file = open(&input, &config.read).await?;
            let merge = GrayMerge::from_file(&file)?;
            merge.validate()?;
            let mut writer = create(output, &file)?;
            let written = merge.write_to(&mut writer, &copier).await;
            finish_output(output, writer, written)?;
        }
        GraySources::Files(paths) => {
            let mut files = Vec::with_capacity(paths.len());
            for path in &paths {
                files.push(open(path, &config.read).await?);
            }
            let merge = GrayMerge::new(files.iter().map(|f| GraySource::new(f, 0)).collect())?;
            merge.validate()?;
            let mut writer = create(output, &files[0])?;
            let written = merge.write_to(&mut writer, &copier).await;
            finish_output(output, writer, written)?;
        }
    }
    info!(output = %output.display(), "wrote RGB image");
    Ok(())
}

// =============================================================================
// Mean Command
// =============================================================================

#[derive(Serialize)]
struct DirectoryMeans {
    directory: usize,
    #[serde(flatten)]
    means: ChannelMeans,
}

async fn run_mean(config: MeanConfig) -> Result<(), RasterError> {
    let file = open(&config.input, &config.read).await?;
    let directories: Vec<usize> = match config.directory {
        Some(d) => vec![d],
        None => (0..file.directory_count()).collect(),
    };

    let mut results = Vec::with_capacity(directories.len());
    for directory in directories {
        let means = directory_mean(&file, directory).await?;
        results.push(DirectoryMeans { directory, means });
    }

    if config.json {
        print_json(&results);
        return Ok(());
    }
    for DirectoryMeans { directory, means } in &results {
        if means.mode.channels() == 3 {
            println!(
                "{}: r={:.3} g={:.3} b={:.3} ({} pixels)",
                directory, means.r, means.g, means.b, means.pixels
            );
        } else {
            println!("{}: gray={:.3} ({} pixels)", directory, means.gray, means.pixels);
        }
    }
    Ok(())
}

// =============================================================================
// Colorize Command
// =============================================================================

async fn run_colorize(config: ColorizeConfig) -> Result<(), RasterError> {
    let palette = Palette::load(&config.palette).await?;
    let file = open(&config.input, &config.read).await?;
    let colorizer = Colorizer::new(&file, &palette, &config.channels)?;
    colorizer.validate()?;

    let copier = TagCopier::new().with_compression(Compression::Lzw.as_u16());
    let mut writer = create(&config.output, &file)?;
    let written = colorizer.write_to(&mut writer, &copier).await;
    finish_output(&config.output, writer, written)?;
    info!(output = %config.output.display(), "wrote colorized image");
    Ok(())
}

// =============================================================================
// Compress Command
// =============================================================================

async fn run_compress(config: CompressConfig) -> Result<(), RasterError> {
    let file = open(&config.input, &config.read).await?;
    let thresholds = SuppressionThresholds {
        mean: config.mean_threshold,
        spread: config.spread_threshold,
    };
    let suppressor = NoiseSuppressor::new(&file).with_thresholds(thresholds);
    suppressor.validate()?;

    let copier = TagCopier::new().with_compression(Compression::Lzw.as_u16());
    let mut writer = create(&config.output, &file)?;
    let written = suppressor.write_to(&mut writer, &copier).await;
    let report = finish_output(&config.output, writer, written)?;

    let tiles: usize = report.directories.iter().map(|d| d.tiles).sum();
    let dropped: usize = report.directories.iter().map(|d| d.dropped).sum();
    info!(
        output = %config.output.display(),
        directories = report.directories.len(),
        tiles,
        dropped,
        "wrote suppressed image"
    );
    Ok(())
}

// =============================================================================
// Copy Command
// =============================================================================

async fn run_copy(config: CopyConfig) -> Result<(), RasterError> {
    let file = open(&config.input, &config.read).await?;
    let raster = RasterReader::new(&file).read(config.directory).await?;

    let mut copier = TagCopier::new().with_jpeg_quality(config.jpeg_quality);
    if let Some(compression) = config.compression {
        copier = copier.with_compression(compression.code());
    }
    if let Some(size) = config.tile_size {
        copier = copier.with_tile_size(size, size);
    }
    let dir = copier.copy_all(file.directory(config.directory)?);

    let mut writer = create(&config.output, &file)?;
    let written = RasterWriter::new(&mut writer).write(&raster, dir);
    finish_output(&config.output, writer, written)?;
    info!(
        output = %config.output.display(),
        width = raster.width(),
        height = raster.height(),
        mode = %raster.mode(),
        "copied directory"
    );
    Ok(())
}

// =============================================================================
// Scale Command
// =============================================================================

async fn run_scale(config: ScaleConfig) -> Result<(), RasterError> {
    let file = open(&config.input, &config.read).await?;
    let raster = RasterReader::new(&file).read(config.directory).await?;
    let scaled = raster.scale(config.factor, config.method.into(), config.threads)?;

    let copier = TagCopier::new().with_jpeg_quality(config.jpeg_quality);
    let mut dir = copier.copy_all(file.directory(config.directory)?);
    dir.set_long(TiffTag::ImageWidth, scaled.width())
        .set_long(TiffTag::ImageLength, scaled.height());

    let mut writer = create(&config.output, &file)?;
    let written = RasterWriter::new(&mut writer).write(&scaled, dir);
    finish_output(&config.output, writer, written)?;
    info!(
        output = %config.output.display(),
        width = scaled.width(),
        height = scaled.height(),
        "wrote scaled image"
    );
    Ok(())
}
