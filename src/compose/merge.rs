use std::io::{Seek, Write};

use tracing::{debug, info};

use crate::copy::TagCopier;
use crate::error::{PreconditionError, RasterError};
use crate::format::tiff::{Directory, TiffFile, TiffWriter};
use crate::io::RangeReader;
use crate::raster::{DirectoryModel, Mode, TileGrid};

use super::{mirror_layout, prepare_rgb};

/// One gray input of a merge: a directory of an open file.
pub struct GraySource<'a, R> {
    pub file: &'a TiffFile<R>,
    pub directory: usize,
}

impl<'a, R> GraySource<'a, R> {
    pub fn new(file: &'a TiffFile<R>, directory: usize) -> Self {
        Self { file, directory }
    }
}

/// Interleaves two or three 8-bit gray directories into one RGB directory.
///
/// Sources map to red, green and blue in order; with two sources the blue
/// channel is zero. Tiled sources produce a tiled output with the same tile
/// size, strip sources are merged one scanline at a time.
pub struct GrayMerge<'a, R> {
    sources: Vec<GraySource<'a, R>>,
}

impl<'a, R: RangeReader> GrayMerge<'a, R> {
    /// # Errors
    /// Returns `SourceCount` unless there are two or three sources.
    pub fn new(sources: Vec<GraySource<'a, R>>) -> Result<Self, PreconditionError> {
        if !(2..=3).contains(&sources.len()) {
            return Err(PreconditionError::SourceCount(sources.len()));
        }
        Ok(Self { sources })
    }

    /// Merge the first three directories of one file (or two, if that is all
    /// it has).
    pub fn from_file(file: &'a TiffFile<R>) -> Result<Self, PreconditionError> {
        let count = file.directory_count().min(3);
        Self::new((0..count).map(|d| GraySource::new(file, d)).collect())
    }

    /// Check every source before any pixel is touched.
    ///
    /// # Errors
    /// - `NotGray8` for a source that is not 8-bit min-is-black
    /// - `DimensionMismatch` when sizes or organization differ
    /// - `ChunkSizeMismatch` when tile shapes or scanline byte sizes differ
    pub fn validate(&self) -> Result<Vec<DirectoryModel>, RasterError> {
        let mut models = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let dir = source.file.directory(source.directory)?;
            let model = DirectoryModel::from_directory(dir);
            model.require_gray8()?;
            models.push(model);
        }

        let first = &models[0];
        let first_dir = self.sources[0].file.directory(self.sources[0].directory)?;
        let chunk_len = |dir: &Directory| {
            if dir.is_tiled() {
                dir.tile_len()
            } else {
                dir.scanline_len()
            }
        };
        let expected = chunk_len(first_dir);

        for (source, model) in self.sources.iter().zip(&models).skip(1) {
            if (model.width, model.height) != (first.width, first.height)
                || model.is_tiled() != first.is_tiled()
            {
                return Err(PreconditionError::DimensionMismatch(format!(
                    "directory {} is {}x{} ({}), directory {} is {}x{} ({})",
                    first.index,
                    first.width,
                    first.height,
                    organization(first),
                    model.index,
                    model.width,
                    model.height,
                    organization(model)
                ))
                .into());
            }
            let actual = chunk_len(source.file.directory(source.directory)?);
            if actual != expected
                || (model.tile_width, model.tile_height) != (first.tile_width, first.tile_height)
            {
                return Err(PreconditionError::ChunkSizeMismatch {
                    directory: model.index,
                    expected,
                    actual,
                }
                .into());
            }
        }
        Ok(models)
    }

    /// Write the merged directory to `writer`, tags copied from the first
    /// source by `copier`.
    pub async fn write_to<W: Write + Seek>(
        &self,
        writer: &mut TiffWriter<W>,
        copier: &TagCopier,
    ) -> Result<(), RasterError> {
        let models = self.validate()?;
        let first = &models[0];
        let mut dir = copier.copy_all(self.sources[0].file.directory(self.sources[0].directory)?);
        prepare_rgb(&mut dir)?;
        mirror_layout(&mut dir, first, Mode::Rgb8.pixel_bytes());

        if first.is_tiled() {
            let grid = TileGrid::new(first.width, first.height, first.tile_width, first.tile_height);
            let mut out = Vec::new();
            for tile in grid.iter() {
                let mut planes = Vec::with_capacity(self.sources.len());
                for input in &self.sources {
                    let data = input
                        .file
                        .read_tile(input.directory, tile.x, tile.y)
                        .await
                        .map_err(|source| RasterError::TileRead {
                            x: tile.x,
                            y: tile.y,
                            source,
                        })?;
                    planes.push(data);
                }
                interleave(&planes, &mut out);
                writer
                    .write_tile(&mut dir, tile.x, tile.y, &out)
                    .map_err(|source| RasterError::TileWrite {
                        x: tile.x,
                        y: tile.y,
                        source,
                    })?;
            }
        } else {
            debug!(height = first.height, "merging scanlines");
            let mut out = Vec::new();
            for row in 0..first.height {
                let mut planes = Vec::with_capacity(self.sources.len());
                for input in &self.sources {
                    let line = input
                        .file
                        .read_scanline(input.directory, row)
                        .await
                        .map_err(|source| RasterError::ScanlineRead { row, source })?;
                    planes.push(line);
                }
                interleave(&planes, &mut out);
                writer
                    .write_scanline(&mut dir, row, &out)
                    .map_err(|source| RasterError::ScanlineWrite { row, source })?;
            }
        }

        writer.write_directory(dir)?;
        info!(
            sources = self.sources.len(),
            width = first.width,
            height = first.height,
            tiled = first.is_tiled(),
            "merged gray directories into RGB"
        );
        Ok(())
    }
}

fn organization(model: &DirectoryModel) -> &'static str {
    if model.is_tiled() {
        "tiled"
    } else {
        "strips"
    }
}

/// `out[3i + c] = planes[c][i]`; a missing blue plane reads as zero.
fn interleave<P: AsRef<[u8]>>(planes: &[P], out: &mut Vec<u8>) {
    let len = planes[0].as_ref().len();
    out.clear();
    out.resize(len * 3, 0);
    for (c, plane) in planes.iter().enumerate() {
        for (i, &v) in plane.as_ref().iter().enumerate() {
            out[i * 3 + c] = v;
        }
    }
}
