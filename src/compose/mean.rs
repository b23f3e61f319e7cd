//! Per-channel means, streamed from a directory or taken from a raster.

use serde::Serialize;
use tracing::debug;

use crate::error::{PreconditionError, RasterError};
use crate::format::tiff::TiffFile;
use crate::io::RangeReader;
use crate::raster::{read_sample, DirectoryModel, Mode, Raster, TileGrid};

/// Mean of each channel over every in-bounds pixel.
///
/// RGB directories fill `r`, `g` and `b`; gray directories fill `gray`.
/// Channels the directory does not have are zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelMeans {
    pub mode: Mode,
    pub pixels: u64,
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub gray: f64,
}

struct Accumulator {
    mode: Mode,
    element: usize,
    channels: usize,
    sums: [u128; 3],
    pixels: u64,
}

impl Accumulator {
    fn new(mode: Mode) -> Result<Self, PreconditionError> {
        if mode == Mode::Quad8 {
            return Err(PreconditionError::UnsupportedMode {
                samples: 4,
                bits: 8,
            });
        }
        Ok(Self {
            mode,
            element: mode.element_size(),
            channels: mode.channels(),
            sums: [0; 3],
            pixels: 0,
        })
    }

    /// Add a run of whole pixels.
    fn add(&mut self, bytes: &[u8]) {
        for pixel in bytes.chunks_exact(self.element * self.channels) {
            for (c, sample) in pixel.chunks_exact(self.element).enumerate() {
                self.sums[c] += read_sample(sample) as u128;
            }
            self.pixels += 1;
        }
    }

    fn finish(self) -> ChannelMeans {
        let mean = |sum: u128| {
            if self.pixels == 0 {
                0.0
            } else {
                sum as f64 / self.pixels as f64
            }
        };
        let mut means = ChannelMeans {
            mode: self.mode,
            pixels: self.pixels,
            r: 0.0,
            g: 0.0,
            b: 0.0,
            gray: 0.0,
        };
        if self.channels == 3 {
            means.r = mean(self.sums[0]);
            means.g = mean(self.sums[1]);
            means.b = mean(self.sums[2]);
        } else {
            means.gray = mean(self.sums[0]);
        }
        means
    }
}

/// Means of one directory without materializing its raster.
///
/// Tiled directories are walked tile by tile, only the in-bounds part of
/// each edge tile counted. Strip directories are walked line by line.
///
/// # Errors
/// `UnsupportedMode` for 4-channel data; read failures carry the tile or row.
pub async fn directory_mean<R: RangeReader>(
    file: &TiffFile<R>,
    directory: usize,
) -> Result<ChannelMeans, RasterError> {
    let model = DirectoryModel::from_directory(file.directory(directory)?);
    let mode = model.raster_mode()?;
    let mut acc = Accumulator::new(mode)?;
    let pixel_bytes = mode.pixel_bytes();

    if model.is_tiled() {
        let grid = TileGrid::new(model.width, model.height, model.tile_width, model.tile_height);
        let tile_row = model.tile_width as usize * pixel_bytes;
        for tile in grid.iter() {
            let data = file
                .read_tile(directory, tile.x, tile.y)
                .await
                .map_err(|source| RasterError::TileRead {
                    x: tile.x,
                    y: tile.y,
                    source,
                })?;
            let span = tile.width as usize * pixel_bytes;
            for row in data.chunks(tile_row).take(tile.height as usize) {
                acc.add(&row[..span.min(row.len())]);
            }
        }
    } else {
        for row in 0..model.height {
            let line = file
                .read_scanline(directory, row)
                .await
                .map_err(|source| RasterError::ScanlineRead { row, source })?;
            acc.add(&line);
        }
    }

    let means = acc.finish();
    debug!(directory, pixels = means.pixels, "computed channel means");
    Ok(means)
}

impl Raster {
    /// Per-channel means of the whole raster.
    ///
    /// # Errors
    /// `UnsupportedMode` for Quad8.
    pub fn mean(&self) -> Result<ChannelMeans, PreconditionError> {
        let mut acc = Accumulator::new(self.mode())?;
        acc.add(self.as_bytes());
        Ok(acc.finish())
    }
}
