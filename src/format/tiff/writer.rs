//! Writing TIFF and BigTIFF files.
//!
//! Chunk data is appended to the stream as soon as it is written; each
//! directory's IFD follows its own data. The IFD layout is: entry count,
//! sorted entries, next-IFD offset, then the out-of-line values of the
//! entries that did not fit in the value field. Directories are linked by
//! patching the previous next-IFD field (or the header) once the new IFD
//! position is known.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{IoError, TiffError};

use super::codec::{encode_chunk, ChunkParams};
use super::directory::{ChunkLayout, SampleLayout};
use super::jpeg::DEFAULT_JPEG_QUALITY;
use super::parser::{ByteOrder, TiffHeader};
use super::tags::{planar, predictor, Compression, TiffTag};
use super::values::TagValue;

fn write_error(e: std::io::Error) -> TiffError {
    TiffError::Io(IoError::Write(e.to_string()))
}

/// Output file options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriterOptions {
    pub byte_order: ByteOrder,
    pub bigtiff: bool,
}

// =============================================================================
// DirectoryBuilder
// =============================================================================

/// Tags and chunk locations of a directory being written.
///
/// The chunk layout is derived from the tags (TileWidth/TileLength or
/// RowsPerStrip) the first time a chunk is written and must not change
/// afterwards.
#[derive(Debug, Clone)]
pub struct DirectoryBuilder {
    tags: BTreeMap<u16, TagValue>,
    jpeg_quality: u8,
    /// (offset, byte count) per chunk, (0, 0) until written
    chunks: Vec<(u64, u64)>,
    /// Rows buffered by `write_scanline` for the current strip
    pending: Vec<u8>,
    next_row: u32,
}

/// Geometry a builder's tags describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderGeometry {
    pub width: u32,
    pub height: u32,
    pub layout: ChunkLayout,
    pub samples: SampleLayout,
}

impl BuilderGeometry {
    pub fn chunk_count(&self) -> usize {
        self.layout.chunks_per_plane() * self.samples.planes() as usize
    }

    /// Pixel width and rows of a chunk.
    pub fn chunk_dimensions(&self, index: usize) -> (u32, u32) {
        match self.layout {
            ChunkLayout::Tiled {
                tile_width,
                tile_height,
                ..
            } => (tile_width, tile_height),
            ChunkLayout::Strips {
                rows_per_strip,
                strips_per_image,
            } => {
                let strip = (index % strips_per_image.max(1) as usize) as u32;
                let rows = rows_per_strip.min(self.height.saturating_sub(strip * rows_per_strip));
                (self.width, rows)
            }
        }
    }

    pub fn scanline_len(&self) -> usize {
        self.samples.row_bytes(self.width)
    }

    /// Bytes in one full tile, 0 for strip layouts.
    pub fn tile_len(&self) -> usize {
        match self.layout {
            ChunkLayout::Tiled {
                tile_width,
                tile_height,
                ..
            } => self.samples.row_bytes(tile_width) * tile_height as usize,
            ChunkLayout::Strips { .. } => 0,
        }
    }
}

impl DirectoryBuilder {
    /// A builder with the image dimensions set.
    pub fn new(width: u32, height: u32) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert(TiffTag::ImageWidth.as_u16(), TagValue::Long(vec![width]));
        tags.insert(TiffTag::ImageLength.as_u16(), TagValue::Long(vec![height]));
        Self {
            tags,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            chunks: Vec::new(),
            pending: Vec::new(),
            next_row: 0,
        }
    }

    pub fn set(&mut self, tag_id: u16, value: TagValue) -> &mut Self {
        self.tags.insert(tag_id, value);
        self
    }

    pub fn set_tag(&mut self, tag: TiffTag, value: TagValue) -> &mut Self {
        self.set(tag.as_u16(), value)
    }

    /// Set a tag to a single SHORT.
    pub fn set_short(&mut self, tag: TiffTag, value: u16) -> &mut Self {
        self.set_tag(tag, TagValue::Short(vec![value]))
    }

    /// Set a tag to a single LONG.
    pub fn set_long(&mut self, tag: TiffTag, value: u32) -> &mut Self {
        self.set_tag(tag, TagValue::Long(vec![value]))
    }

    pub fn get(&self, tag_id: u16) -> Option<&TagValue> {
        self.tags.get(&tag_id)
    }

    pub fn get_tag(&self, tag: TiffTag) -> Option<&TagValue> {
        self.get(tag.as_u16())
    }

    pub fn get_u32(&self, tag: TiffTag) -> Option<u32> {
        self.get_tag(tag).and_then(TagValue::first_u32)
    }

    pub fn get_u16(&self, tag: TiffTag) -> Option<u16> {
        self.get_tag(tag).and_then(TagValue::first_u16)
    }

    pub fn remove(&mut self, tag_id: u16) -> Option<TagValue> {
        self.tags.remove(&tag_id)
    }

    pub fn tags(&self) -> impl Iterator<Item = (u16, &TagValue)> {
        self.tags.iter().map(|(&id, v)| (id, v))
    }

    /// Quality used when Compression is JPEG.
    pub fn set_jpeg_quality(&mut self, quality: u8) -> &mut Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Switch to a tiled layout.
    pub fn set_tiled(&mut self, tile_width: u32, tile_height: u32) -> &mut Self {
        self.remove(TiffTag::RowsPerStrip.as_u16());
        self.set_long(TiffTag::TileWidth, tile_width);
        self.set_long(TiffTag::TileLength, tile_height)
    }

    /// Switch to a strip layout.
    pub fn set_rows_per_strip(&mut self, rows: u32) -> &mut Self {
        self.remove(TiffTag::TileWidth.as_u16());
        self.remove(TiffTag::TileLength.as_u16());
        self.set_long(TiffTag::RowsPerStrip, rows)
    }

    pub fn width(&self) -> u32 {
        self.get_u32(TiffTag::ImageWidth).unwrap_or(0)
    }

    pub fn height(&self) -> u32 {
        self.get_u32(TiffTag::ImageLength).unwrap_or(0)
    }

    pub fn is_tiled(&self) -> bool {
        self.get_u32(TiffTag::TileWidth).is_some() && self.get_u32(TiffTag::TileLength).is_some()
    }

    /// Geometry described by the current tags.
    ///
    /// # Errors
    /// Returns `MissingTag` if width or length is unset and
    /// `InvalidTagValue` for a zero tile dimension.
    pub fn geometry(&self) -> Result<BuilderGeometry, TiffError> {
        let width = self
            .get_u32(TiffTag::ImageWidth)
            .ok_or(TiffError::MissingTag("ImageWidth"))?;
        let height = self
            .get_u32(TiffTag::ImageLength)
            .ok_or(TiffError::MissingTag("ImageLength"))?;
        let samples = SampleLayout {
            samples_per_pixel: self.get_u16(TiffTag::SamplesPerPixel).unwrap_or(1).max(1),
            bits_per_sample: self.get_u16(TiffTag::BitsPerSample).unwrap_or(8),
            planar_config: self
                .get_u16(TiffTag::PlanarConfiguration)
                .unwrap_or(planar::CONTIG),
        };

        let layout = match (
            self.get_u32(TiffTag::TileWidth),
            self.get_u32(TiffTag::TileLength),
        ) {
            (Some(tw), Some(th)) => {
                if tw == 0 || th == 0 {
                    return Err(TiffError::InvalidTagValue {
                        tag: "TileWidth",
                        message: format!("tile size {}x{} is empty", tw, th),
                    });
                }
                ChunkLayout::tiled(width, height, tw, th)
            }
            _ => ChunkLayout::strips(height, self.get_u32(TiffTag::RowsPerStrip).unwrap_or(0)),
        };

        Ok(BuilderGeometry {
            width,
            height,
            layout,
            samples,
        })
    }

    fn chunk_params(&self, geometry: &BuilderGeometry, chunk: usize, byte_order: ByteOrder) -> ChunkParams<'static> {
        let (width, rows) = geometry.chunk_dimensions(chunk);
        ChunkParams {
            compression: self
                .get_u16(TiffTag::Compression)
                .unwrap_or(Compression::None.as_u16()),
            predictor: self.get_u16(TiffTag::Predictor).unwrap_or(predictor::NONE),
            bits_per_sample: geometry.samples.bits_per_sample,
            samples: geometry.samples.samples_per_chunk_pixel(),
            width,
            rows,
            byte_order,
            jpeg_tables: None,
            jpeg_quality: self.jpeg_quality,
        }
    }

    /// Freeze the chunk table to the current geometry.
    fn ensure_chunks(&mut self, geometry: &BuilderGeometry) -> Result<(), TiffError> {
        let count = geometry.chunk_count();
        if self.chunks.is_empty() {
            self.chunks = vec![(0, 0); count];
        } else if self.chunks.len() != count {
            return Err(TiffError::Encode(format!(
                "chunk layout changed after writing started ({} chunks, now {})",
                self.chunks.len(),
                count
            )));
        }
        Ok(())
    }
}

// =============================================================================
// TiffWriter
// =============================================================================

/// Streaming TIFF writer.
pub struct TiffWriter<W: Write + Seek> {
    out: W,
    header: TiffHeader,
    /// Position of the offset field that must point at the next IFD
    link_position: u64,
    directories: usize,
}

impl TiffWriter<BufWriter<File>> {
    /// Create (or truncate) a file on disk.
    pub fn create(path: impl AsRef<Path>, options: WriterOptions) -> Result<Self, TiffError> {
        let file = File::create(path.as_ref()).map_err(write_error)?;
        Self::new(BufWriter::new(file), options)
    }
}

impl<W: Write + Seek> TiffWriter<W> {
    /// Start a file by writing its header; the first-IFD offset is patched later.
    pub fn new(mut out: W, options: WriterOptions) -> Result<Self, TiffError> {
        let header = TiffHeader {
            byte_order: options.byte_order,
            is_bigtiff: options.bigtiff,
            first_ifd_offset: 0,
        };
        let start = out.stream_position().map_err(write_error)?;
        out.write_all(&header.encode()).map_err(write_error)?;
        Ok(Self {
            out,
            link_position: start + header.first_offset_position(),
            header,
            directories: 0,
        })
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    pub fn is_bigtiff(&self) -> bool {
        self.header.is_bigtiff
    }

    /// Directories written so far.
    pub fn directory_count(&self) -> usize {
        self.directories
    }

    /// Encode and append one chunk.
    pub fn write_chunk(&mut self, dir: &mut DirectoryBuilder, chunk: usize, pixels: &[u8]) -> Result<(), TiffError> {
        let geometry = dir.geometry()?;
        dir.ensure_chunks(&geometry)?;
        if chunk >= dir.chunks.len() {
            return Err(TiffError::ChunkOutOfRange {
                index: chunk,
                count: dir.chunks.len(),
            });
        }

        let params = dir.chunk_params(&geometry, chunk, self.header.byte_order);
        let stored = encode_chunk(pixels, &params)?;
        let offset = self.append(&stored)?;
        dir.chunks[chunk] = (offset, stored.len() as u64);
        Ok(())
    }

    /// Write the tile containing pixel `(x, y)`; `pixels` is one full tile.
    pub fn write_tile(&mut self, dir: &mut DirectoryBuilder, x: u32, y: u32, pixels: &[u8]) -> Result<(), TiffError> {
        let geometry = dir.geometry()?;
        let ChunkLayout::Tiled {
            tile_width,
            tile_height,
            tiles_across,
            tiles_down,
        } = geometry.layout
        else {
            return Err(TiffError::InvalidTagValue {
                tag: "TileWidth",
                message: "directory is not tiled".to_string(),
            });
        };
        let (tx, ty) = (x / tile_width, y / tile_height);
        if x >= geometry.width || y >= geometry.height || tx >= tiles_across || ty >= tiles_down {
            return Err(TiffError::ChunkOutOfRange {
                index: ty as usize * tiles_across as usize + tx as usize,
                count: geometry.chunk_count(),
            });
        }
        self.write_chunk(dir, ty as usize * tiles_across as usize + tx as usize, pixels)
    }

    /// Write one scanline of a strip directory.
    ///
    /// Rows must arrive in order; each strip is encoded once its last row
    /// has been written.
    pub fn write_scanline(&mut self, dir: &mut DirectoryBuilder, row: u32, line: &[u8]) -> Result<(), TiffError> {
        let geometry = dir.geometry()?;
        let ChunkLayout::Strips { rows_per_strip, .. } = geometry.layout else {
            return Err(TiffError::InvalidTagValue {
                tag: "RowsPerStrip",
                message: "directory is tiled".to_string(),
            });
        };
        if row != dir.next_row || row >= geometry.height {
            return Err(TiffError::Encode(format!(
                "scanline {} written out of order (expected {} of {})",
                row, dir.next_row, geometry.height
            )));
        }
        if line.len() != geometry.scanline_len() {
            return Err(TiffError::Encode(format!(
                "scanline holds {} bytes, expected {}",
                line.len(),
                geometry.scanline_len()
            )));
        }

        dir.pending.extend_from_slice(line);
        dir.next_row += 1;
        if dir.next_row % rows_per_strip == 0 || dir.next_row == geometry.height {
            let strip = (row / rows_per_strip) as usize;
            let data = std::mem::take(&mut dir.pending);
            self.write_chunk(dir, strip, &data)?;
        }
        Ok(())
    }

    /// Emit the IFD for `dir` and link it into the chain.
    ///
    /// A strip left half-written by `write_scanline` is padded with zero
    /// rows. Chunks never written are recorded with offset and count 0.
    pub fn write_directory(&mut self, mut dir: DirectoryBuilder) -> Result<(), TiffError> {
        let geometry = dir.geometry()?;
        dir.ensure_chunks(&geometry)?;

        if !dir.pending.is_empty() {
            if let ChunkLayout::Strips { rows_per_strip, .. } = geometry.layout {
                let strip = ((dir.next_row - 1) / rows_per_strip) as usize;
                let (_, rows) = geometry.chunk_dimensions(strip);
                warn!(
                    strip,
                    written = dir.pending.len() / geometry.scanline_len().max(1),
                    rows,
                    "padding incomplete strip"
                );
                let mut data = std::mem::take(&mut dir.pending);
                data.resize(geometry.scanline_len() * rows as usize, 0);
                self.write_chunk(&mut dir, strip, &data)?;
            }
        }

        let (offsets_tag, counts_tag) = if geometry.layout.is_tiled() {
            (TiffTag::TileOffsets, TiffTag::TileByteCounts)
        } else {
            (TiffTag::StripOffsets, TiffTag::StripByteCounts)
        };
        let offsets: Vec<u64> = dir.chunks.iter().map(|c| c.0).collect();
        let counts: Vec<u64> = dir.chunks.iter().map(|c| c.1).collect();
        dir.tags.insert(offsets_tag.as_u16(), self.offset_array(offsets));
        dir.tags.insert(counts_tag.as_u16(), self.offset_array(counts));
        if let ChunkLayout::Strips { rows_per_strip, .. } = geometry.layout {
            dir.tags
                .insert(TiffTag::RowsPerStrip.as_u16(), TagValue::Long(vec![rows_per_strip]));
        }

        let ifd_offset = self.encode_ifd(&dir.tags)?;
        debug!(
            directory = self.directories,
            offset = ifd_offset,
            chunks = dir.chunks.len(),
            "wrote directory"
        );
        self.directories += 1;
        Ok(())
    }

    /// Flush and hand back the stream.
    ///
    /// # Errors
    /// Returns `Encode` if no directory was written, since such a file has
    /// no valid first-IFD offset.
    pub fn finish(mut self) -> Result<W, TiffError> {
        if self.directories == 0 {
            return Err(TiffError::Encode("no directories written".to_string()));
        }
        self.out.flush().map_err(write_error)?;
        Ok(self.out)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn offset_array(&self, values: Vec<u64>) -> TagValue {
        if self.header.is_bigtiff && values.iter().any(|&v| v > u32::MAX as u64) {
            TagValue::Long8(values)
        } else {
            TagValue::Long(values.into_iter().map(|v| v as u32).collect())
        }
    }

    /// Append bytes at the end of the stream, word aligned; returns their offset.
    fn append(&mut self, data: &[u8]) -> Result<u64, TiffError> {
        let mut pos = self.out.seek(SeekFrom::End(0)).map_err(write_error)?;
        if pos % 2 == 1 {
            self.out.write_all(&[0]).map_err(write_error)?;
            pos += 1;
        }
        self.check_offset(pos + data.len() as u64)?;
        self.out.write_all(data).map_err(write_error)?;
        Ok(pos)
    }

    fn check_offset(&self, end: u64) -> Result<(), TiffError> {
        if !self.header.is_bigtiff && end > u32::MAX as u64 {
            return Err(TiffError::Encode(format!(
                "file would grow to {} bytes, beyond classic TIFF offsets; use BigTIFF",
                end
            )));
        }
        Ok(())
    }

    fn write_offset(&mut self, value: u64) -> Result<(), TiffError> {
        let bo = self.header.byte_order;
        let bytes = if self.header.is_bigtiff {
            bo.u64_bytes(value).to_vec()
        } else {
            bo.u32_bytes(value as u32).to_vec()
        };
        self.out.write_all(&bytes).map_err(write_error)
    }

    fn encode_ifd(&mut self, tags: &BTreeMap<u16, TagValue>) -> Result<u64, TiffError> {
        let bo = self.header.byte_order;
        let value_size = self.header.value_offset_size();

        let ifd_offset = self.append(&[])?;
        let count = tags.len() as u64;
        let extra_offset = ifd_offset
            + self.header.ifd_count_size() as u64
            + count * self.header.ifd_entry_size() as u64
            + self.header.ifd_next_offset_size() as u64;

        let mut ifd = Vec::new();
        if self.header.is_bigtiff {
            ifd.extend_from_slice(&bo.u64_bytes(count));
        } else {
            ifd.extend_from_slice(&bo.u16_bytes(count as u16));
        }

        let mut extra = Vec::new();
        for (&tag_id, value) in tags {
            let data = value.encode(bo);
            ifd.extend_from_slice(&bo.u16_bytes(tag_id));
            ifd.extend_from_slice(&bo.u16_bytes(value.field_type().as_u16()));
            if self.header.is_bigtiff {
                ifd.extend_from_slice(&bo.u64_bytes(value.count() as u64));
            } else {
                ifd.extend_from_slice(&bo.u32_bytes(value.count() as u32));
            }

            if data.len() > value_size {
                let offset = extra_offset + extra.len() as u64;
                if self.header.is_bigtiff {
                    ifd.extend_from_slice(&bo.u64_bytes(offset));
                } else {
                    ifd.extend_from_slice(&bo.u32_bytes(offset as u32));
                }
                extra.extend_from_slice(&data);
                if extra.len() % 2 == 1 {
                    extra.push(0);
                }
            } else {
                let mut field = data;
                field.resize(value_size, 0);
                ifd.extend_from_slice(&field);
            }
        }

        let next_position = ifd_offset + ifd.len() as u64;
        ifd.resize(ifd.len() + self.header.ifd_next_offset_size(), 0);
        ifd.extend_from_slice(&extra);

        self.check_offset(ifd_offset + ifd.len() as u64)?;
        self.out.write_all(&ifd).map_err(write_error)?;

        // Link the new IFD from the header or the previous directory
        self.out
            .seek(SeekFrom::Start(self.link_position))
            .map_err(write_error)?;
        self.write_offset(ifd_offset)?;
        self.out.seek(SeekFrom::End(0)).map_err(write_error)?;
        self.link_position = next_position;

        Ok(ifd_offset)
    }
}
