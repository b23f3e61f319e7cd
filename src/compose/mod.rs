//! Compositors that derive new directories from existing ones.
//!
//! All of them stream tile by tile (or line by line) from the source
//! directories into a [`TiffWriter`](crate::format::tiff::TiffWriter)
//! without materializing whole rasters.

mod colorize;
mod mean;
mod merge;
mod palette;
mod suppress;

pub use colorize::Colorizer;
pub use mean::{directory_mean, ChannelMeans};
pub use merge::{GrayMerge, GraySource};
pub use palette::{combine, Channel, Palette};
pub use suppress::{
    DirectorySuppression, NoiseSuppressor, SuppressionReport, SuppressionThresholds, TileStats,
    DEFAULT_MEAN_THRESHOLD, DEFAULT_SPREAD_THRESHOLD,
};

use crate::copy::default_rows_per_strip;
use crate::error::PreconditionError;
use crate::format::tiff::{photometric, DirectoryBuilder, TiffTag};
use crate::raster::{apply_mode, DirectoryModel, Mode};

/// Tags describing the source samples that no longer hold for 8-bit RGB.
const SOURCE_SAMPLE_TAGS: [u16; 8] = [
    277, // SamplesPerPixel
    258, // BitsPerSample
    338, // ExtraSamples
    339, // SampleFormat
    280, // MinSampleValue
    281, // MaxSampleValue
    340, // SMinSampleValue
    341, // SMaxSampleValue
];

/// Turn a builder copied from a gray source into an 8-bit RGB one.
pub(crate) fn prepare_rgb(dir: &mut DirectoryBuilder) -> Result<(), PreconditionError> {
    for tag in SOURCE_SAMPLE_TAGS {
        dir.remove(tag);
    }
    dir.set_short(TiffTag::PhotometricInterpretation, photometric::RGB);
    apply_mode(dir, Mode::Rgb8)
}

/// Give `dir` the same chunk organization as `source`.
///
/// Compositors work one source chunk at a time, so an output tile must
/// cover exactly one source tile.
pub(crate) fn mirror_layout(dir: &mut DirectoryBuilder, source: &DirectoryModel, pixel_bytes: usize) {
    if source.is_tiled() {
        dir.set_tiled(source.tile_width, source.tile_height);
    } else if dir.is_tiled() {
        let rows = default_rows_per_strip(source.width as usize * pixel_bytes, source.height);
        dir.set_rows_per_strip(rows);
    }
}
