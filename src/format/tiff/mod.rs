//! TIFF and BigTIFF codec layer.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. All multi-byte values must be read respecting this order.
//!
//! - **Classic TIFF vs BigTIFF**: Classic TIFF uses 32-bit offsets (max 4GB files),
//!   while BigTIFF uses 64-bit offsets. Reader and writer handle both.
//!
//! - **IFD (Image File Directory)**: one image of a multi-image file. Multi-channel
//!   microscopy files store one channel per directory.
//!
//! - **Chunks**: pixel data is cut into tiles or strips, each compressed on its own.
//!   [`TiffFile`] decodes them on demand; [`TiffWriter`] encodes and appends them.

mod codec;
mod directory;
mod file;
mod jpeg;
mod parser;
mod probe;
mod tags;
mod values;
mod writer;

pub use codec::{can_encode, decode_chunk, encode_chunk, ChunkParams};
pub use directory::{ChunkLayout, Directory, DirectorySummary, SampleLayout, TagSummary};
pub use file::{chunk_params, ReaderOptions, TiffFile, DEFAULT_STRIP_CACHE, MAX_DIRECTORIES};
pub use jpeg::{
    is_abbreviated_stream, is_complete_stream, merge_jpeg_tables, prepare_chunk_jpeg,
    DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use parser::{
    ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE, VERSION_BIGTIFF,
    VERSION_TIFF,
};
pub use probe::{HeaderProbe, TiffVariant, PROBE_SIZE};
pub use tags::{
    compression_name, field_type_name, fill_order, orientation, photometric, planar, predictor,
    sample_format, tag_name, Compression, FieldType, TiffTag,
};
pub use values::{TagValue, ValueReader};
pub use writer::{BuilderGeometry, DirectoryBuilder, TiffWriter, WriterOptions};
