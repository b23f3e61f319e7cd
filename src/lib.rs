//! # tiffo
//!
//! Tiled raster access for multi-directory TIFF and BigTIFF files.
//!
//! Fluorescence microscopy and similar workflows store one gray channel per
//! directory of a single file. This library reads such files through a
//! block-cached range reader, exposes each directory as a typed raster
//! description, and derives new files from them at the tile or strip level
//! without materializing whole images.
//!
//! ## Architecture
//!
//! - [`io`] - byte-range readers and the block cache
//! - [`mod@format`] - TIFF/BigTIFF header probe, directory parsing, chunk codecs and the writer
//! - [`raster`] - pixel modes, raster buffers, whole-directory read/write, scaling
//! - [`copy`] - tag copying from a source directory into a new one
//! - [`compose`] - gray-to-RGB merge, palette colorization, noise suppression, channel means
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use tiffo::{GrayMerge, ReaderOptions, TagCopier, TiffFile, TiffWriter, WriterOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let file = TiffFile::open_path("channels.tif", &ReaderOptions::default()).await?;
//!     let merge = GrayMerge::from_file(&file)?;
//!
//!     let mut writer = TiffWriter::create("rgb.tif", WriterOptions::default())?;
//!     merge.write_to(&mut writer, &TagCopier::new()).await?;
//!     writer.finish()?;
//!     Ok(())
//! }
//! ```

pub mod compose;
pub mod config;
pub mod copy;
pub mod error;
pub mod format;
pub mod io;
pub mod raster;

// Re-export commonly used types
pub use compose::{
    directory_mean, ChannelMeans, Colorizer, GrayMerge, GraySource, NoiseSuppressor, Palette,
    SuppressionReport, SuppressionThresholds,
};
pub use config::{Cli, Command};
pub use copy::{TagCopier, COPY_TABLE};
pub use error::{ErrorKind, IoError, PaletteError, PreconditionError, RasterError, TiffError};
pub use format::tiff::{
    ByteOrder, Compression, Directory, DirectoryBuilder, FieldType, HeaderProbe, ReaderOptions,
    TagValue, TiffFile, TiffTag, TiffWriter, WriterOptions,
};
pub use io::{BlockCache, FileRangeReader, MemoryRangeReader, RangeReader};
pub use raster::{DirectoryModel, Image, Mode, Raster, RasterReader, RasterWriter, ScaleMethod};
