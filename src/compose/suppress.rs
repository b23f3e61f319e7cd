//! Noise suppression: zero out tiles that carry no signal.

use std::io::{Seek, Write};

use serde::Serialize;
use tracing::{debug, info};

use crate::copy::TagCopier;
use crate::error::{PreconditionError, RasterError};
use crate::format::tiff::{TiffFile, TiffWriter};
use crate::io::RangeReader;
use crate::raster::{read_sample, DirectoryModel, TileGrid};

use super::mirror_layout;

pub const DEFAULT_MEAN_THRESHOLD: u32 = 300;
pub const DEFAULT_SPREAD_THRESHOLD: u32 = 300;

/// Cutoffs deciding whether a tile is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SuppressionThresholds {
    /// Tiles whose integer mean reaches this are kept
    pub mean: u32,
    /// Tiles whose p95 - p5 spread exceeds this are kept
    pub spread: u32,
}

impl Default for SuppressionThresholds {
    fn default() -> Self {
        Self {
            mean: DEFAULT_MEAN_THRESHOLD,
            spread: DEFAULT_SPREAD_THRESHOLD,
        }
    }
}

/// Intensity statistics of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileStats {
    pub mean: u32,
    pub p5: u32,
    pub p95: u32,
}

impl TileStats {
    /// Mean and 5th/95th percentiles of `samples`, which is sorted in place.
    pub fn compute(samples: &mut [u32]) -> Self {
        if samples.is_empty() {
            return Self { mean: 0, p5: 0, p95: 0 };
        }
        let n = samples.len();
        let sum: u64 = samples.iter().map(|&v| v as u64).sum();
        samples.sort_unstable();
        Self {
            mean: (sum / n as u64) as u32,
            p5: samples[(0.05 * n as f64) as usize],
            p95: samples[((0.95 * n as f64) as usize).min(n - 1)],
        }
    }

    pub fn spread(&self) -> u32 {
        self.p95.saturating_sub(self.p5)
    }

    pub fn keep(&self, thresholds: &SuppressionThresholds) -> bool {
        self.mean >= thresholds.mean || self.spread() > thresholds.spread
    }
}

/// Tiles seen and dropped in one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectorySuppression {
    pub directory: usize,
    pub tiles: usize,
    pub dropped: usize,
}

impl DirectorySuppression {
    pub fn drop_rate(&self) -> f64 {
        if self.tiles == 0 {
            0.0
        } else {
            self.dropped as f64 / self.tiles as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuppressionReport {
    pub directories: Vec<DirectorySuppression>,
}

/// Rewrites every directory of a tiled file, zeroing tiles below both
/// thresholds and copying the rest unchanged.
pub struct NoiseSuppressor<'a, R> {
    file: &'a TiffFile<R>,
    thresholds: SuppressionThresholds,
}

impl<'a, R: RangeReader> NoiseSuppressor<'a, R> {
    pub fn new(file: &'a TiffFile<R>) -> Self {
        Self {
            file,
            thresholds: SuppressionThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: SuppressionThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Check that every directory is tiled with a supported mode.
    ///
    /// # Errors
    /// `NotTiled` for the first strip directory, or the mode error of the
    /// first directory without one.
    pub fn validate(&self) -> Result<(), RasterError> {
        for dir in self.file.directories() {
            let model = DirectoryModel::from_directory(dir);
            if !model.is_tiled() {
                return Err(PreconditionError::NotTiled(model.index).into());
            }
            model.raster_mode()?;
        }
        Ok(())
    }

    /// Write one output directory per input directory.
    ///
    /// # Errors
    /// `NotTiled` for a strip directory; tile failures carry the coordinate.
    pub async fn write_to<W: Write + Seek>(
        &self,
        writer: &mut TiffWriter<W>,
        copier: &TagCopier,
    ) -> Result<SuppressionReport, RasterError> {
        self.validate()?;
        let mut report = SuppressionReport::default();
        for index in 0..self.file.directory_count() {
            let stats = self.suppress_directory(index, writer, copier).await?;
            info!(
                directory = index,
                tiles = stats.tiles,
                dropped = stats.dropped,
                drop_rate = format!("{:.3}", stats.drop_rate()),
                "finished directory"
            );
            report.directories.push(stats);
        }
        Ok(report)
    }

    async fn suppress_directory<W: Write + Seek>(
        &self,
        index: usize,
        writer: &mut TiffWriter<W>,
        copier: &TagCopier,
    ) -> Result<DirectorySuppression, RasterError> {
        let source = self.file.directory(index)?;
        let model = DirectoryModel::from_directory(source);
        if !model.is_tiled() {
            return Err(PreconditionError::NotTiled(index).into());
        }
        let mode = model.raster_mode()?;
        let element = mode.element_size();

        let mut dir = copier.copy_all(source);
        mirror_layout(&mut dir, &model, mode.pixel_bytes());

        let grid = TileGrid::new(model.width, model.height, model.tile_width, model.tile_height);
        let mut samples = Vec::new();
        let mut blank = Vec::new();
        let mut dropped = 0;
        for tile in grid.iter() {
            let data = self
                .file
                .read_tile(index, tile.x, tile.y)
                .await
                .map_err(|source| RasterError::TileRead {
                    x: tile.x,
                    y: tile.y,
                    source,
                })?;

            samples.clear();
            samples.extend(data.chunks_exact(element).map(read_sample));
            let stats = TileStats::compute(&mut samples);

            let pixels = if stats.keep(&self.thresholds) {
                &data
            } else {
                debug!(
                    x = tile.x,
                    y = tile.y,
                    mean = stats.mean,
                    p5 = stats.p5,
                    p95 = stats.p95,
                    "dropping tile"
                );
                dropped += 1;
                blank.resize(data.len(), 0);
                &blank
            };
            writer
                .write_tile(&mut dir, tile.x, tile.y, pixels)
                .map_err(|source| RasterError::TileWrite {
                    x: tile.x,
                    y: tile.y,
                    source,
                })?;
        }

        writer.write_directory(dir)?;
        Ok(DirectorySuppression {
            directory: index,
            tiles: grid.len(),
            dropped,
        })
    }
}
