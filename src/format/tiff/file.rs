//! Random access to the directories and chunks of a TIFF file.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::Path;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::TiffError;
use crate::io::{BlockCache, FileRangeReader, RangeReader, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCKS};

use super::codec::{decode_chunk, ChunkParams};
use super::directory::Directory;
use super::jpeg::DEFAULT_JPEG_QUALITY;
use super::parser::{ByteOrder, Ifd, TiffHeader, BIGTIFF_HEADER_SIZE};

/// Upper bound on the directory chain length.
pub const MAX_DIRECTORIES: usize = 4096;

/// Default number of decoded strips kept for scanline reads.
pub const DEFAULT_STRIP_CACHE: usize = 16;

/// Options for opening files from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Block size of the range cache in bytes
    pub block_size: usize,
    /// Number of blocks kept by the range cache
    pub cache_blocks: usize,
    /// Number of decoded strips kept for scanline access
    pub strip_cache: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_CACHE_BLOCKS,
            strip_cache: DEFAULT_STRIP_CACHE,
        }
    }
}

/// A parsed TIFF file: header, every directory in chain order, and chunk access.
///
/// Directories are resolved once at open time. Chunk reads go through the
/// underlying [`RangeReader`]; decoded strips are cached so that reading a
/// strip image one scanline at a time decodes each strip once.
pub struct TiffFile<R> {
    reader: R,
    header: TiffHeader,
    directories: Vec<Directory>,
    strips: Mutex<LruCache<(usize, usize), Bytes>>,
}

impl TiffFile<BlockCache<FileRangeReader>> {
    /// Open a file on disk behind a block cache.
    pub async fn open_path(path: impl AsRef<Path>, options: &ReaderOptions) -> Result<Self, TiffError> {
        let file = FileRangeReader::open(path).await?;
        let reader = BlockCache::with_capacity(file, options.block_size, options.cache_blocks);
        Self::open_with(reader, options.strip_cache).await
    }
}

impl<R: RangeReader> TiffFile<R> {
    /// Parse the header and every directory reachable from it.
    pub async fn open(reader: R) -> Result<Self, TiffError> {
        Self::open_with(reader, DEFAULT_STRIP_CACHE).await
    }

    /// Like [`TiffFile::open`] with an explicit strip cache capacity.
    ///
    /// # Errors
    /// - Any header error (`InvalidMagic`, `InvalidVersion`, ...)
    /// - `InvalidIfdOffset` if a directory lies outside the file
    /// - `MissingTag`/`InvalidTagValue` if a directory lacks geometry or chunk tags
    pub async fn open_with(reader: R, strip_cache: usize) -> Result<Self, TiffError> {
        let header_len = std::cmp::min(reader.size(), BIGTIFF_HEADER_SIZE as u64) as usize;
        let header_bytes = reader.read_exact_at(0, header_len).await?;
        let header = TiffHeader::parse(&header_bytes, reader.size())?;

        let ifds = Self::walk_chain(&reader, &header).await?;
        let mut directories = Vec::with_capacity(ifds.len());
        for (index, ifd) in ifds.iter().enumerate() {
            directories.push(Directory::load(&reader, &header, ifd, index).await?);
        }

        debug!(
            source = reader.identifier(),
            bigtiff = header.is_bigtiff,
            directories = directories.len(),
            "opened tiff"
        );

        let capacity = NonZeroUsize::new(strip_cache).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            reader,
            header,
            directories,
            strips: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Follow the next-IFD chain from the header.
    async fn walk_chain(reader: &R, header: &TiffHeader) -> Result<Vec<Ifd>, TiffError> {
        let mut ifds = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = header.first_ifd_offset;

        while offset != 0 {
            if ifds.len() >= MAX_DIRECTORIES {
                warn!(limit = MAX_DIRECTORIES, "directory chain too long, stopping");
                break;
            }
            if !seen.insert(offset) {
                warn!(offset, "directory chain loops back, stopping");
                break;
            }

            let count_size = header.ifd_count_size() as u64;
            if offset.saturating_add(count_size) > reader.size() {
                return Err(TiffError::InvalidIfdOffset(offset));
            }
            let count_bytes = reader.read_exact_at(offset, count_size as usize).await?;
            let entry_count = header.read_entry_count(&count_bytes);

            let entry_bytes = entry_count.saturating_mul(header.ifd_entry_size() as u64);
            if offset.saturating_add(entry_bytes) > reader.size() {
                return Err(TiffError::InvalidIfdOffset(offset));
            }
            let ifd_size = Ifd::calculate_size(entry_count, header);
            let ifd_bytes = reader.read_exact_at(offset, ifd_size).await?;
            let ifd = Ifd::parse(&ifd_bytes, offset, header)?;

            offset = ifd.next_ifd_offset;
            ifds.push(ifd);
        }

        Ok(ifds)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    pub fn is_bigtiff(&self) -> bool {
        self.header.is_bigtiff
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn identifier(&self) -> &str {
        self.reader.identifier()
    }

    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    pub fn directories(&self) -> &[Directory] {
        &self.directories
    }

    /// Directory at `index` in chain order.
    pub fn directory(&self, index: usize) -> Result<&Directory, TiffError> {
        self.directories
            .get(index)
            .ok_or(TiffError::DirectoryNotFound {
                index,
                count: self.directories.len(),
            })
    }

    // -------------------------------------------------------------------------
    // Chunks
    // -------------------------------------------------------------------------

    /// Stored (still compressed) bytes of a chunk; empty if it was never written.
    pub async fn read_raw_chunk(&self, directory: usize, chunk: usize) -> Result<Bytes, TiffError> {
        let dir = self.directory(directory)?;
        let (offset, count) = dir.chunk_location(chunk)?;
        if count == 0 {
            return Ok(Bytes::new());
        }
        Ok(self.reader.read_exact_at(offset, count as usize).await?)
    }

    /// Decode any chunk by index.
    pub async fn read_chunk(&self, directory: usize, chunk: usize) -> Result<Vec<u8>, TiffError> {
        let raw = self.read_raw_chunk(directory, chunk).await?;
        let dir = self.directory(directory)?;
        decode_chunk(&raw, &chunk_params(dir, chunk, self.header.byte_order))
    }

    /// Decode the tile containing pixel `(x, y)` of sample plane 0.
    ///
    /// The buffer always holds a full tile, including padding beyond the
    /// image edge.
    pub async fn read_tile(&self, directory: usize, x: u32, y: u32) -> Result<Vec<u8>, TiffError> {
        self.read_tile_plane(directory, x, y, 0).await
    }

    /// Decode the tile containing pixel `(x, y)` of a given sample plane.
    pub async fn read_tile_plane(
        &self,
        directory: usize,
        x: u32,
        y: u32,
        plane: u16,
    ) -> Result<Vec<u8>, TiffError> {
        let chunk = self.directory(directory)?.tile_index(x, y, plane)?;
        self.read_chunk(directory, chunk).await
    }

    /// Decode a strip, going through the strip cache.
    pub async fn read_strip(&self, directory: usize, strip: usize) -> Result<Bytes, TiffError> {
        let key = (directory, strip);
        if let Some(data) = self.strips.lock().await.get(&key) {
            return Ok(data.clone());
        }

        let data = Bytes::from(self.read_chunk(directory, strip).await?);
        self.strips.lock().await.put(key, data.clone());
        Ok(data)
    }

    /// One decoded scanline of a strip directory.
    pub async fn read_scanline(&self, directory: usize, row: u32) -> Result<Bytes, TiffError> {
        let dir = self.directory(directory)?;
        let (strip, row_in_strip) = dir.strip_for_row(row)?;
        let line = dir.scanline_len();
        let data = self.read_strip(directory, strip).await?;
        let start = row_in_strip as usize * line;
        Ok(data.slice(start..start + line))
    }
}

/// Codec parameters for one chunk of `dir`.
pub fn chunk_params(dir: &Directory, chunk: usize, byte_order: ByteOrder) -> ChunkParams<'_> {
    let samples = dir.samples();
    let (width, rows) = dir.chunk_dimensions(chunk);
    ChunkParams {
        compression: dir.compression(),
        predictor: dir.predictor(),
        bits_per_sample: samples.bits_per_sample,
        samples: samples.samples_per_chunk_pixel(),
        width,
        rows,
        byte_order,
        jpeg_tables: dir.jpeg_tables().map(|t| &t[..]),
        jpeg_quality: DEFAULT_JPEG_QUALITY,
    }
}
