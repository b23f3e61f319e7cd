use tracing::debug;

use crate::error::{PreconditionError, RasterError};
use crate::format::tiff::TiffFile;
use crate::io::RangeReader;

use super::{DirectoryModel, Raster, TileGrid};

/// Reads whole directories into rasters.
pub struct RasterReader<'a, R> {
    file: &'a TiffFile<R>,
}

impl<'a, R: RangeReader> RasterReader<'a, R> {
    pub fn new(file: &'a TiffFile<R>) -> Self {
        Self { file }
    }

    /// Geometry of a directory.
    pub fn model(&self, directory: usize) -> Result<DirectoryModel, RasterError> {
        Ok(DirectoryModel::from_directory(self.file.directory(directory)?))
    }

    /// Read a directory into a new raster.
    ///
    /// Any failed tile or scanline aborts the read; no partial raster is
    /// returned.
    ///
    /// # Errors
    /// - `Precondition` if the directory's layout has no raster mode
    /// - `TileRead`/`ScanlineRead` with the failing coordinate
    pub async fn read(&self, directory: usize) -> Result<Raster, RasterError> {
        let model = self.model(directory)?;
        self.read_model(&model).await
    }

    /// Read the directory described by `model`.
    pub async fn read_model(&self, model: &DirectoryModel) -> Result<Raster, RasterError> {
        let mode = model.raster_mode()?;
        let mut raster = Raster::new(model.width, model.height, mode);

        if model.is_tiled() {
            self.read_tiled(model, &mut raster).await?;
        } else {
            self.read_lined(model, &mut raster).await?;
        }

        debug!(
            directory = model.index,
            width = model.width,
            height = model.height,
            mode = %mode,
            tiled = model.is_tiled(),
            "read raster"
        );
        Ok(raster)
    }

    async fn read_tiled(&self, model: &DirectoryModel, raster: &mut Raster) -> Result<(), RasterError> {
        let pixel_bytes = raster.mode().pixel_bytes();
        let tile_row_bytes = model.tile_width as usize * pixel_bytes;
        let tile_len = tile_row_bytes * model.tile_height as usize;
        let row_bytes = raster.row_bytes();
        let grid = TileGrid::new(model.width, model.height, model.tile_width, model.tile_height);

        for tile in grid.iter() {
            let data = self
                .file
                .read_tile(model.index, tile.x, tile.y)
                .await
                .map_err(|source| RasterError::TileRead {
                    x: tile.x,
                    y: tile.y,
                    source,
                })?;
            if data.len() != tile_len {
                return Err(PreconditionError::ChunkSizeMismatch {
                    directory: model.index,
                    expected: tile_len,
                    actual: data.len(),
                }
                .into());
            }

            let span = tile.width as usize * pixel_bytes;
            let dst = raster.as_bytes_mut();
            for row in 0..tile.height as usize {
                let src_start = row * tile_row_bytes;
                let dst_start = (tile.y as usize + row) * row_bytes + tile.x as usize * pixel_bytes;
                dst[dst_start..dst_start + span].copy_from_slice(&data[src_start..src_start + span]);
            }
        }
        Ok(())
    }

    async fn read_lined(&self, model: &DirectoryModel, raster: &mut Raster) -> Result<(), RasterError> {
        let row_bytes = raster.row_bytes();
        for row in 0..model.height {
            let line = self
                .file
                .read_scanline(model.index, row)
                .await
                .map_err(|source| RasterError::ScanlineRead { row, source })?;
            if line.len() != row_bytes {
                return Err(PreconditionError::ChunkSizeMismatch {
                    directory: model.index,
                    expected: row_bytes,
                    actual: line.len(),
                }
                .into());
            }
            let start = row as usize * row_bytes;
            raster.as_bytes_mut()[start..start + row_bytes].copy_from_slice(&line);
        }
        Ok(())
    }
}
