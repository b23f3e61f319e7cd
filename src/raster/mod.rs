//! Whole-directory pixel access.
//!
//! A [`DirectoryModel`] captures the geometry of one directory, a
//! [`RasterReader`] turns it into an owned [`Raster`], and a
//! [`RasterWriter`] puts a raster back into a new directory, tiled or as
//! strips.

mod buffer;
mod grid;
mod image;
mod mode;
mod model;
mod reader;
mod scale;
mod writer;

pub use buffer::Raster;
pub(crate) use buffer::read_sample;
pub use grid::{TileGrid, TileRect};
pub use image::Image;
pub use mode::Mode;
pub use model::DirectoryModel;
pub use reader::RasterReader;
pub use scale::ScaleMethod;
pub use writer::{apply_mode, validate_tile_size, RasterWriter, TILE_ALIGNMENT};
