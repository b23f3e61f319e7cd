//! Resolved directories.
//!
//! A [`Directory`] is an IFD whose tag values have all been read and
//! decoded, plus the chunk layout (tiles or strips) those values describe.
//! It is immutable once built: reading pixels never changes it.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Serialize;
use tracing::warn;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{Ifd, TiffHeader};
use super::tags::{compression_name, planar, tag_name, Compression, TiffTag};
use super::values::{TagValue, ValueReader};

// =============================================================================
// ChunkLayout
// =============================================================================

/// How a directory's pixel data is cut into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkLayout {
    /// Fixed-size rectangular tiles, row-major
    Tiled {
        tile_width: u32,
        tile_height: u32,
        tiles_across: u32,
        tiles_down: u32,
    },
    /// Horizontal bands of `rows_per_strip` rows, the last one possibly shorter
    Strips {
        rows_per_strip: u32,
        strips_per_image: u32,
    },
}

impl ChunkLayout {
    /// Build a tiled layout covering `width x height`.
    pub fn tiled(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Self {
        ChunkLayout::Tiled {
            tile_width,
            tile_height,
            tiles_across: width.div_ceil(tile_width.max(1)),
            tiles_down: height.div_ceil(tile_height.max(1)),
        }
    }

    /// Build a strip layout covering `height` rows.
    ///
    /// A RowsPerStrip of 0 or larger than the image means one strip.
    pub fn strips(height: u32, rows_per_strip: u32) -> Self {
        let rows_per_strip = if rows_per_strip == 0 || rows_per_strip > height {
            height.max(1)
        } else {
            rows_per_strip
        };
        ChunkLayout::Strips {
            rows_per_strip,
            strips_per_image: height.div_ceil(rows_per_strip),
        }
    }

    /// Chunks per sample plane.
    pub fn chunks_per_plane(&self) -> usize {
        match *self {
            ChunkLayout::Tiled {
                tiles_across,
                tiles_down,
                ..
            } => tiles_across as usize * tiles_down as usize,
            ChunkLayout::Strips {
                strips_per_image, ..
            } => strips_per_image as usize,
        }
    }

    pub fn is_tiled(&self) -> bool {
        matches!(self, ChunkLayout::Tiled { .. })
    }
}

/// Per-pixel sample layout as stored in chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleLayout {
    pub samples_per_pixel: u16,
    pub bits_per_sample: u16,
    pub planar_config: u16,
}

impl SampleLayout {
    /// Samples interleaved in one chunk pixel.
    pub fn samples_per_chunk_pixel(&self) -> u16 {
        if self.planar_config == planar::SEPARATE {
            1
        } else {
            self.samples_per_pixel
        }
    }

    /// Number of sample planes.
    pub fn planes(&self) -> u16 {
        if self.planar_config == planar::SEPARATE {
            self.samples_per_pixel
        } else {
            1
        }
    }

    /// Bytes in one row of `width` chunk pixels.
    pub fn row_bytes(&self, width: u32) -> usize {
        let bits = width as usize
            * self.samples_per_chunk_pixel() as usize
            * self.bits_per_sample as usize;
        bits.div_ceil(8)
    }
}

// =============================================================================
// Directory
// =============================================================================

/// A fully resolved directory.
#[derive(Debug, Clone)]
pub struct Directory {
    index: usize,
    offset: u64,
    tags: BTreeMap<u16, TagValue>,
    width: u32,
    height: u32,
    samples: SampleLayout,
    layout: ChunkLayout,
    chunk_offsets: Vec<u64>,
    chunk_byte_counts: Vec<u64>,
    jpeg_tables: Option<Bytes>,
}

impl Directory {
    /// Resolve every entry of `ifd`.
    ///
    /// Entries with unknown field types or unreadable values are skipped
    /// with a warning; only the geometry and chunk tags are mandatory.
    ///
    /// # Errors
    /// - `MissingTag` if width, length or the chunk offset/count tags are absent
    /// - `InvalidTagValue` if the chunk arrays are shorter than the layout needs
    pub async fn load<R: RangeReader>(
        reader: &R,
        header: &TiffHeader,
        ifd: &Ifd,
        index: usize,
    ) -> Result<Self, TiffError> {
        let values = ValueReader::new(reader, header);
        let mut tags = BTreeMap::new();

        for entry in &ifd.entries {
            match values.read_value(entry).await {
                Ok(value) => {
                    tags.insert(entry.tag_id, value);
                }
                Err(TiffError::Io(e)) => return Err(TiffError::Io(e)),
                Err(e) => warn!(
                    directory = index,
                    tag = entry.tag_id,
                    name = tag_name(entry.tag_id).unwrap_or("unknown"),
                    error = %e,
                    "skipping unreadable tag"
                ),
            }
        }

        Self::from_tags(index, ifd.offset, tags)
    }

    /// Build a directory from already decoded tags.
    pub fn from_tags(
        index: usize,
        offset: u64,
        tags: BTreeMap<u16, TagValue>,
    ) -> Result<Self, TiffError> {
        let get_u32 = |tag: TiffTag| tags.get(&tag.as_u16()).and_then(TagValue::first_u32);
        let get_u16 = |tag: TiffTag| tags.get(&tag.as_u16()).and_then(TagValue::first_u16);

        let width = get_u32(TiffTag::ImageWidth).ok_or(TiffError::MissingTag("ImageWidth"))?;
        let height = get_u32(TiffTag::ImageLength).ok_or(TiffError::MissingTag("ImageLength"))?;

        let samples = SampleLayout {
            samples_per_pixel: get_u16(TiffTag::SamplesPerPixel).unwrap_or(1).max(1),
            bits_per_sample: get_u16(TiffTag::BitsPerSample).unwrap_or(8),
            planar_config: get_u16(TiffTag::PlanarConfiguration).unwrap_or(planar::CONTIG),
        };

        let tile_dims = get_u32(TiffTag::TileWidth).zip(get_u32(TiffTag::TileLength));
        let (layout, offsets_tag, counts_tag) = match tile_dims {
            Some((tw, th)) if tw > 0 && th > 0 => (
                ChunkLayout::tiled(width, height, tw, th),
                TiffTag::TileOffsets,
                TiffTag::TileByteCounts,
            ),
            _ => (
                ChunkLayout::strips(height, get_u32(TiffTag::RowsPerStrip).unwrap_or(u32::MAX)),
                TiffTag::StripOffsets,
                TiffTag::StripByteCounts,
            ),
        };

        let array = |tag: TiffTag, name: &'static str| -> Result<Vec<u64>, TiffError> {
            let value = tags.get(&tag.as_u16()).ok_or(TiffError::MissingTag(name))?;
            value.as_u64_vec().ok_or_else(|| TiffError::InvalidTagValue {
                tag: name,
                message: format!("expected unsigned integers, got {}", value.field_type().name()),
            })
        };
        let chunk_offsets = array(offsets_tag, if layout.is_tiled() { "TileOffsets" } else { "StripOffsets" })?;
        let chunk_byte_counts = array(
            counts_tag,
            if layout.is_tiled() { "TileByteCounts" } else { "StripByteCounts" },
        )?;

        let expected = layout.chunks_per_plane() * samples.planes() as usize;
        if chunk_offsets.len() < expected || chunk_byte_counts.len() < expected {
            return Err(TiffError::InvalidTagValue {
                tag: if layout.is_tiled() { "TileOffsets" } else { "StripOffsets" },
                message: format!(
                    "layout needs {} chunks, found {} offsets and {} byte counts",
                    expected,
                    chunk_offsets.len(),
                    chunk_byte_counts.len()
                ),
            });
        }

        let jpeg_tables = tags
            .get(&TiffTag::JpegTables.as_u16())
            .and_then(TagValue::as_bytes)
            .map(Bytes::copy_from_slice);

        Ok(Self {
            index,
            offset,
            tags,
            width,
            height,
            samples,
            layout,
            chunk_offsets,
            chunk_byte_counts,
            jpeg_tables,
        })
    }

    // -------------------------------------------------------------------------
    // Tag access
    // -------------------------------------------------------------------------

    /// Position of this directory in the file's chain.
    pub fn index(&self) -> usize {
        self.index
    }

    /// File offset of the IFD.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn get(&self, tag_id: u16) -> Option<&TagValue> {
        self.tags.get(&tag_id)
    }

    pub fn get_tag(&self, tag: TiffTag) -> Option<&TagValue> {
        self.get(tag.as_u16())
    }

    /// First value of a tag as u32.
    pub fn get_u32(&self, tag: TiffTag) -> Option<u32> {
        self.get_tag(tag).and_then(TagValue::first_u32)
    }

    /// First value of a tag as u16.
    pub fn get_u16(&self, tag: TiffTag) -> Option<u16> {
        self.get_tag(tag).and_then(TagValue::first_u16)
    }

    /// All tags in id order.
    pub fn tags(&self) -> impl Iterator<Item = (u16, &TagValue)> {
        self.tags.iter().map(|(&id, value)| (id, value))
    }

    // -------------------------------------------------------------------------
    // Geometry
    // -------------------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn samples(&self) -> SampleLayout {
        self.samples
    }

    pub fn layout(&self) -> ChunkLayout {
        self.layout
    }

    pub fn is_tiled(&self) -> bool {
        self.layout.is_tiled()
    }

    /// Compression id, 1 (none) when absent.
    pub fn compression(&self) -> u16 {
        self.get_u16(TiffTag::Compression)
            .unwrap_or(Compression::None.as_u16())
    }

    /// Predictor id, 1 (none) when absent.
    pub fn predictor(&self) -> u16 {
        self.get_u16(TiffTag::Predictor).unwrap_or(1)
    }

    pub fn jpeg_tables(&self) -> Option<&Bytes> {
        self.jpeg_tables.as_ref()
    }

    // -------------------------------------------------------------------------
    // Chunks
    // -------------------------------------------------------------------------

    /// Total number of chunks, all planes included.
    pub fn chunk_count(&self) -> usize {
        self.layout.chunks_per_plane() * self.samples.planes() as usize
    }

    /// File offset and stored byte count of a chunk.
    pub fn chunk_location(&self, index: usize) -> Result<(u64, u64), TiffError> {
        if index >= self.chunk_count() {
            return Err(TiffError::ChunkOutOfRange {
                index,
                count: self.chunk_count(),
            });
        }
        Ok((self.chunk_offsets[index], self.chunk_byte_counts[index]))
    }

    /// Pixel width and row count of a decoded chunk.
    ///
    /// Tiles always decode to the full tile size; the last strip may hold
    /// fewer rows.
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
                let first_row = strip * rows_per_strip;
                let rows = rows_per_strip.min(self.height.saturating_sub(first_row));
                (self.width, rows)
            }
        }
    }

    /// Decoded size of a chunk in bytes.
    pub fn chunk_decoded_len(&self, index: usize) -> usize {
        let (w, rows) = self.chunk_dimensions(index);
        self.samples.row_bytes(w) * rows as usize
    }

    /// Chunk index of the tile containing pixel `(x, y)`.
    pub fn tile_index(&self, x: u32, y: u32, plane: u16) -> Result<usize, TiffError> {
        match self.layout {
            ChunkLayout::Tiled {
                tile_width,
                tile_height,
                tiles_across,
                tiles_down,
            } => {
                let (tx, ty) = (x / tile_width, y / tile_height);
                if x >= self.width()
                    || y >= self.height()
                    || tx >= tiles_across
                    || ty >= tiles_down
                    || plane >= self.samples.planes()
                {
                    return Err(TiffError::ChunkOutOfRange {
                        index: (ty as usize) * tiles_across as usize + tx as usize,
                        count: self.chunk_count(),
                    });
                }
                Ok(plane as usize * self.layout.chunks_per_plane()
                    + ty as usize * tiles_across as usize
                    + tx as usize)
            }
            ChunkLayout::Strips { .. } => Err(TiffError::InvalidTagValue {
                tag: "TileWidth",
                message: format!("directory {} is not tiled", self.index),
            }),
        }
    }

    /// Strip index containing `row`, and the row's position inside it.
    pub fn strip_for_row(&self, row: u32) -> Result<(usize, u32), TiffError> {
        match self.layout {
            ChunkLayout::Strips { rows_per_strip, .. } if row < self.height => {
                Ok(((row / rows_per_strip) as usize, row % rows_per_strip))
            }
            ChunkLayout::Strips { .. } => Err(TiffError::ChunkOutOfRange {
                index: row as usize,
                count: self.height as usize,
            }),
            ChunkLayout::Tiled { .. } => Err(TiffError::InvalidTagValue {
                tag: "RowsPerStrip",
                message: format!("directory {} is tiled", self.index),
            }),
        }
    }

    /// Bytes in one full scanline.
    pub fn scanline_len(&self) -> usize {
        self.samples.row_bytes(self.width)
    }

    /// Bytes in one full decoded tile, 0 for strip layouts.
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

    /// Serializable summary for diagnostics.
    pub fn summary(&self) -> DirectorySummary {
        DirectorySummary {
            index: self.index,
            offset: self.offset,
            width: self.width,
            height: self.height,
            layout: self.layout,
            samples: self.samples,
            compression: compression_name(self.compression()),
            tags: self
                .tags
                .iter()
                .map(|(&id, value)| TagSummary {
                    id,
                    name: tag_name(id).unwrap_or("Unknown"),
                    field_type: value.field_type().name(),
                    count: value.count(),
                    value: value.to_string(),
                })
                .collect(),
        }
    }
}

/// Diagnostic view of a directory.
#[derive(Debug, Clone, Serialize)]
pub struct DirectorySummary {
    pub index: usize,
    pub offset: u64,
    pub width: u32,
    pub height: u32,
    pub layout: ChunkLayout,
    pub samples: SampleLayout,
    pub compression: String,
    pub tags: Vec<TagSummary>,
}

/// Diagnostic view of one tag.
#[derive(Debug, Clone, Serialize)]
pub struct TagSummary {
    pub id: u16,
    pub name: &'static str,
    pub field_type: &'static str,
    pub count: usize,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_tags(width: u32, height: u32) -> BTreeMap<u16, TagValue> {
        let mut tags = BTreeMap::new();
        tags.insert(256, TagValue::Long(vec![width]));
        tags.insert(257, TagValue::Long(vec![height]));
        tags
    }

    fn tiled_tags(width: u32, height: u32, tile: u32) -> BTreeMap<u16, TagValue> {
        let mut tags = base_tags(width, height);
        let n = (width.div_ceil(tile) * height.div_ceil(tile)) as usize;
        tags.insert(322, TagValue::Short(vec![tile as u16]));
        tags.insert(323, TagValue::Short(vec![tile as u16]));
        tags.insert(324, TagValue::Long((0..n as u32).map(|i| 1000 + i * 10).collect()));
        tags.insert(325, TagValue::Long(vec![10; n]));
        tags
    }

    #[test]
    fn test_tiled_layout() {
        let dir = Directory::from_tags(0, 8, tiled_tags(100, 40, 32)).unwrap();
        assert_eq!(
            dir.layout(),
            ChunkLayout::Tiled {
                tile_width: 32,
                tile_height: 32,
                tiles_across: 4,
                tiles_down: 2
            }
        );
        assert_eq!(dir.chunk_count(), 8);
        assert_eq!(dir.tile_index(99, 39, 0).unwrap(), 7);
        assert_eq!(dir.chunk_location(5).unwrap(), (1050, 10));
        assert_eq!(dir.tile_len(), 32 * 32);
        // inside the last tile column but past the image edge
        assert!(dir.tile_index(100, 0, 0).is_err());
        assert!(dir.tile_index(0, 40, 0).is_err());
        assert!(matches!(
            dir.tile_index(127, 0, 0),
            Err(TiffError::ChunkOutOfRange { index: 3, count: 8 })
        ));
        assert!(matches!(
            dir.chunk_location(8),
            Err(TiffError::ChunkOutOfRange { index: 8, count: 8 })
        ));
    }

    #[test]
    fn test_strip_layout_last_strip_short() {
        let mut tags = base_tags(10, 25);
        tags.insert(277, TagValue::Short(vec![3]));
        tags.insert(278, TagValue::Long(vec![10]));
        tags.insert(273, TagValue::Long(vec![100, 400, 700]));
        tags.insert(279, TagValue::Long(vec![300, 300, 150]));

        let dir = Directory::from_tags(1, 8, tags).unwrap();
        assert_eq!(dir.chunk_count(), 3);
        assert_eq!(dir.scanline_len(), 30);
        assert_eq!(dir.chunk_dimensions(2), (10, 5));
        assert_eq!(dir.chunk_decoded_len(2), 150);
        assert_eq!(dir.strip_for_row(24).unwrap(), (2, 4));
        assert!(dir.strip_for_row(25).is_err());
    }

    #[test]
    fn test_missing_rows_per_strip_is_one_strip() {
        let mut tags = base_tags(8, 8);
        tags.insert(273, TagValue::Long(vec![16]));
        tags.insert(279, TagValue::Long(vec![64]));
        let dir = Directory::from_tags(0, 8, tags).unwrap();
        assert_eq!(
            dir.layout(),
            ChunkLayout::Strips {
                rows_per_strip: 8,
                strips_per_image: 1
            }
        );
    }

    #[test]
    fn test_missing_required_tags() {
        let mut tags = BTreeMap::new();
        tags.insert(256, TagValue::Long(vec![8]));
        assert!(matches!(
            Directory::from_tags(0, 8, tags),
            Err(TiffError::MissingTag("ImageLength"))
        ));

        let tags = base_tags(8, 8);
        assert!(matches!(
            Directory::from_tags(0, 8, tags),
            Err(TiffError::MissingTag("StripOffsets"))
        ));
    }

    #[test]
    fn test_short_chunk_arrays_rejected() {
        let mut tags = tiled_tags(64, 64, 16);
        tags.insert(325, TagValue::Long(vec![1; 3]));
        assert!(matches!(
            Directory::from_tags(0, 8, tags),
            Err(TiffError::InvalidTagValue { .. })
        ));
    }

    #[test]
    fn test_planar_separate_chunks() {
        let mut tags = tiled_tags(32, 32, 16);
        tags.insert(277, TagValue::Short(vec![3]));
        tags.insert(284, TagValue::Short(vec![2]));
        tags.insert(324, TagValue::Long(vec![0; 12]));
        tags.insert(325, TagValue::Long(vec![0; 12]));
        let dir = Directory::from_tags(0, 8, tags).unwrap();
        assert_eq!(dir.chunk_count(), 12);
        assert_eq!(dir.tile_index(20, 20, 2).unwrap(), 11);
        assert_eq!(dir.tile_len(), 256);
    }

    #[test]
    fn test_summary_lists_tags() {
        let dir = Directory::from_tags(0, 8, tiled_tags(32, 32, 16)).unwrap();
        let summary = dir.summary();
        assert_eq!(summary.compression, "None");
        let names: Vec<_> = summary.tags.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            ["ImageWidth", "ImageLength", "TileWidth", "TileLength", "TileOffsets", "TileByteCounts"]
        );
    }
}
