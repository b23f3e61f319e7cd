use std::io::{Seek, Write};

use tracing::debug;

use crate::error::{PreconditionError, RasterError};
use crate::format::tiff::{DirectoryBuilder, TagValue, TiffTag, TiffWriter};

use super::{Mode, Raster, TileGrid};

/// Output tile dimensions must be multiples of this.
pub const TILE_ALIGNMENT: u32 = 16;

/// Fail unless both tile dimensions are non-zero multiples of 16.
pub fn validate_tile_size(width: u32, height: u32) -> Result<(), PreconditionError> {
    if width == 0 || height == 0 || width % TILE_ALIGNMENT != 0 || height % TILE_ALIGNMENT != 0 {
        return Err(PreconditionError::TileNotMultipleOf16 { width, height });
    }
    Ok(())
}

/// Set the sample layout tags for `mode`, keeping an existing photometric.
///
/// # Errors
/// Returns `ModeMismatch` if the builder already declares a different
/// sample layout.
pub fn apply_mode(dir: &mut DirectoryBuilder, mode: Mode) -> Result<(), PreconditionError> {
    let declared = (
        dir.get_u16(TiffTag::SamplesPerPixel),
        dir.get_u16(TiffTag::BitsPerSample),
    );
    if let (Some(samples), Some(bits)) = declared {
        let matches = samples as usize == mode.channels() && bits == mode.bits_per_sample();
        if !matches {
            return Err(PreconditionError::ModeMismatch {
                raster: mode.name(),
                destination: Mode::from_samples(samples, bits).map_or("unsupported", Mode::name),
            });
        }
    }

    dir.set_tag(
        TiffTag::BitsPerSample,
        TagValue::Short(vec![mode.bits_per_sample(); mode.channels()]),
    )
    .set_short(TiffTag::SamplesPerPixel, mode.channels() as u16);
    if dir.get_tag(TiffTag::PhotometricInterpretation).is_none() {
        dir.set_short(TiffTag::PhotometricInterpretation, mode.default_photometric());
    }
    if mode == Mode::Quad8 && dir.get_tag(TiffTag::ExtraSamples).is_none() {
        // unassociated alpha
        dir.set_short(TiffTag::ExtraSamples, 2);
    }
    Ok(())
}

/// Writes rasters into new directories.
pub struct RasterWriter<'a, W: Write + Seek> {
    writer: &'a mut TiffWriter<W>,
}

impl<'a, W: Write + Seek> RasterWriter<'a, W> {
    pub fn new(writer: &'a mut TiffWriter<W>) -> Self {
        Self { writer }
    }

    /// Write `raster` as the directory described by `dir`.
    ///
    /// Tiled output is the primary path. A builder without tile tags is
    /// written as strips.
    ///
    /// # Errors
    /// - `Precondition` for a tile size that is not a multiple of 16, a
    ///   size mismatch, or a conflicting sample layout
    /// - `TileWrite`/`ScanlineWrite` with the failing coordinate
    pub fn write(&mut self, raster: &Raster, mut dir: DirectoryBuilder) -> Result<(), RasterError> {
        if dir.width() != raster.width() || dir.height() != raster.height() {
            return Err(PreconditionError::DimensionMismatch(format!(
                "raster is {}x{}, destination is {}x{}",
                raster.width(),
                raster.height(),
                dir.width(),
                dir.height()
            ))
            .into());
        }
        apply_mode(&mut dir, raster.mode())?;

        if dir.is_tiled() {
            self.write_tiled(raster, &mut dir)?;
        } else {
            debug!(
                width = raster.width(),
                height = raster.height(),
                "writing raster as strips"
            );
            self.write_lined(raster, &mut dir)?;
        }

        self.writer.write_directory(dir)?;
        Ok(())
    }

    fn write_tiled(&mut self, raster: &Raster, dir: &mut DirectoryBuilder) -> Result<(), RasterError> {
        let tile_width = dir.get_u32(TiffTag::TileWidth).unwrap_or(0);
        let tile_height = dir.get_u32(TiffTag::TileLength).unwrap_or(0);
        validate_tile_size(tile_width, tile_height)?;

        let pixel_bytes = raster.mode().pixel_bytes();
        let tile_row_bytes = tile_width as usize * pixel_bytes;
        let row_bytes = raster.row_bytes();
        let src = raster.as_bytes();
        let mut tile_buf = vec![0u8; tile_row_bytes * tile_height as usize];

        let grid = TileGrid::new(raster.width(), raster.height(), tile_width, tile_height);
        for tile in grid.iter() {
            tile_buf.fill(0);
            let span = tile.width as usize * pixel_bytes;
            for row in 0..tile.height as usize {
                let src_start = (tile.y as usize + row) * row_bytes + tile.x as usize * pixel_bytes;
                let dst_start = row * tile_row_bytes;
                tile_buf[dst_start..dst_start + span].copy_from_slice(&src[src_start..src_start + span]);
            }
            self.writer
                .write_tile(dir, tile.x, tile.y, &tile_buf)
                .map_err(|source| RasterError::TileWrite {
                    x: tile.x,
                    y: tile.y,
                    source,
                })?;
        }
        Ok(())
    }

    fn write_lined(&mut self, raster: &Raster, dir: &mut DirectoryBuilder) -> Result<(), RasterError> {
        for row in 0..raster.height() {
            let line = raster.row(row)?;
            self.writer
                .write_scanline(dir, row, line)
                .map_err(|source| RasterError::ScanlineWrite { row, source })?;
        }
        Ok(())
    }
}
