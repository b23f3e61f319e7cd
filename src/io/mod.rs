//! Byte-range access to TIFF sources.
//!
//! Everything above this layer reads through [`RangeReader`]. Local files
//! use [`FileRangeReader`]; [`BlockCache`] batches the many small scattered
//! reads that directory parsing produces into fixed-size block fetches.

mod block_cache;
mod range_reader;

pub use block_cache::{BlockCache, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCKS};
pub use range_reader::{FileRangeReader, MemoryRangeReader, RangeReader};
