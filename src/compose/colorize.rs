use std::io::{Seek, Write};

use tracing::{debug, info};

use crate::copy::TagCopier;
use crate::error::{PreconditionError, RasterError};
use crate::format::tiff::{TiffFile, TiffWriter};
use crate::io::RangeReader;
use crate::raster::{read_sample, DirectoryModel, Mode, TileGrid};

use super::{combine, mirror_layout, prepare_rgb, Channel, Palette};

/// False-color composition of selected channels of a multi-directory file.
///
/// Channel `n` of the palette is read from directory `n` of the file. Only
/// tiled inputs are supported; every selected directory must share the
/// same size and tile layout.
pub struct Colorizer<'a, R> {
    file: &'a TiffFile<R>,
    selected: Vec<usize>,
    channels: Vec<&'a Channel>,
}

impl<'a, R: RangeReader> Colorizer<'a, R> {
    /// # Errors
    /// - `NoChannelsSelected` for an empty selection
    /// - `ChannelNotInPalette` / `ChannelNotInImage` when the largest
    ///   selected position is out of range
    pub fn new(file: &'a TiffFile<R>, palette: &'a Palette, selected: &[usize]) -> Result<Self, PreconditionError> {
        let channels = palette.select(selected)?;
        let max = selected.iter().copied().max().unwrap_or(0);
        if max >= file.directory_count() {
            return Err(PreconditionError::ChannelNotInImage {
                channel: max,
                directories: file.directory_count(),
            });
        }
        for channel in &channels {
            debug!(channel = %channel, "selected channel");
        }
        Ok(Self {
            file,
            selected: selected.to_vec(),
            channels,
        })
    }

    /// Check the selected directories before any pixel is touched.
    ///
    /// Returns the first selected directory's model and the shared mode.
    ///
    /// # Errors
    /// - `NotTiled` for a strip directory
    /// - `UnsupportedMode` for multi-sample directories
    /// - `DimensionMismatch` / `ChunkSizeMismatch` when directories disagree
    pub fn validate(&self) -> Result<(DirectoryModel, Mode), RasterError> {
        let mut checked: Vec<(DirectoryModel, usize)> = Vec::with_capacity(self.selected.len());
        for &index in &self.selected {
            let dir = self.file.directory(index)?;
            let model = DirectoryModel::from_directory(dir);
            if !model.is_tiled() {
                return Err(PreconditionError::NotTiled(index).into());
            }
            if model.raster_mode()?.channels() != 1 {
                return Err(PreconditionError::UnsupportedMode {
                    samples: model.samples_per_pixel,
                    bits: model.bits_per_sample,
                }
                .into());
            }
            checked.push((model, dir.tile_len()));
        }

        let (reference, tile_len) = checked
            .first()
            .cloned()
            .ok_or(PreconditionError::NoChannelsSelected)?;
        for (model, len) in &checked[1..] {
            if (model.width, model.height) != (reference.width, reference.height) {
                return Err(PreconditionError::DimensionMismatch(format!(
                    "directory {} is {}x{}, directory {} is {}x{}",
                    reference.index,
                    reference.width,
                    reference.height,
                    model.index,
                    model.width,
                    model.height
                ))
                .into());
            }
            if *len != tile_len
                || (model.tile_width, model.tile_height) != (reference.tile_width, reference.tile_height)
            {
                return Err(PreconditionError::ChunkSizeMismatch {
                    directory: model.index,
                    expected: tile_len,
                    actual: *len,
                }
                .into());
            }
        }
        let mode = reference.raster_mode()?;
        Ok((reference, mode))
    }

    /// Write the composed RGB directory, tags copied from the first
    /// selected directory by `copier`.
    pub async fn write_to<W: Write + Seek>(
        &self,
        writer: &mut TiffWriter<W>,
        copier: &TagCopier,
    ) -> Result<(), RasterError> {
        let (model, mode) = self.validate()?;
        let element = mode.element_size();
        let mut dir = copier.copy_all(self.file.directory(model.index)?);
        prepare_rgb(&mut dir)?;
        mirror_layout(&mut dir, &model, Mode::Rgb8.pixel_bytes());

        let grid = TileGrid::new(model.width, model.height, model.tile_width, model.tile_height);
        let pixels = model.tile_width as usize * model.tile_height as usize;
        let mut out = vec![0u8; pixels * 3];
        let mut values = vec![0u32; self.selected.len()];

        for (n, tile) in grid.iter().enumerate() {
            if n % grid.tiles_across().max(1) as usize == 0 {
                debug!(tile = n + 1, tiles = grid.len(), "colorizing tile row");
            }
            let mut tiles = Vec::with_capacity(self.selected.len());
            for &index in &self.selected {
                let data = self
                    .file
                    .read_tile(index, tile.x, tile.y)
                    .await
                    .map_err(|source| RasterError::TileRead {
                        x: tile.x,
                        y: tile.y,
                        source,
                    })?;
                tiles.push(data);
            }

            for (i, rgb) in out.chunks_exact_mut(3).enumerate() {
                for (value, data) in values.iter_mut().zip(&tiles) {
                    *value = read_sample(&data[i * element..(i + 1) * element]);
                }
                rgb.copy_from_slice(&combine(&values, &self.channels));
            }

            writer
                .write_tile(&mut dir, tile.x, tile.y, &out)
                .map_err(|source| RasterError::TileWrite {
                    x: tile.x,
                    y: tile.y,
                    source,
                })?;
        }

        writer.write_directory(dir)?;
        info!(
            channels = self.selected.len(),
            tiles = grid.len(),
            width = model.width,
            height = model.height,
            "colorized image"
        );
        Ok(())
    }
}
