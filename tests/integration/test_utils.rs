//! Test utilities for integration tests.
//!
//! This module provides a request-tracking mock reader and helpers that
//! build TIFF files in memory, either by hand or through the crate's own
//! writer.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use tiffo::error::IoError;
use tiffo::format::tiff::{ByteOrder, DirectoryBuilder, TiffFile, TiffWriter, WriterOptions};
use tiffo::io::{MemoryRangeReader, RangeReader};
use tiffo::raster::{Mode, Raster, RasterWriter};

// =============================================================================
// Mock Range Reader with Request Tracking
// =============================================================================

/// A mock range reader that tracks all read requests.
///
/// This is useful for verifying cache behavior and request patterns.
pub struct TrackingMockReader {
    data: Bytes,
    identifier: String,
    request_count: Arc<AtomicUsize>,
    requests: Arc<RwLock<Vec<(u64, usize)>>>,
}

impl TrackingMockReader {
    pub fn new(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(data),
            identifier: identifier.into(),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub async fn get_requests(&self) -> Vec<(u64, usize)> {
        self.requests.read().await.clone()
    }

    pub fn reset_tracking(&self) {
        self.request_count.store(0, Ordering::SeqCst);
    }
}

impl Clone for TrackingMockReader {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            identifier: self.identifier.clone(),
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
        }
    }
}

#[async_trait]
impl RangeReader for TrackingMockReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push((offset, len));

        let start = offset as usize;
        let end = start + len;
        if end > self.data.len() {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        Ok(self.data.slice(start..end))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// Pixel Patterns
// =============================================================================

/// Deterministic 8-bit gray pattern; different seeds give different planes.
pub fn gray_pattern(width: u32, height: u32, seed: u32) -> Vec<u8> {
    (0..width * height)
        .map(|i| ((i * 7 + seed * 31) % 251) as u8)
        .collect()
}

pub fn gray8(width: u32, height: u32, seed: u32) -> Raster {
    Raster::from_vec(width, height, Mode::Gray8, gray_pattern(width, height, seed)).unwrap()
}

/// 16-bit gray raster from explicit sample values, native byte order.
pub fn gray16(width: u32, height: u32, samples: &[u16]) -> Raster {
    let data = samples.iter().flat_map(|v| v.to_ne_bytes()).collect();
    Raster::from_vec(width, height, Mode::Gray16, data).unwrap()
}

// =============================================================================
// Writer-based TIFF Creation
// =============================================================================

/// Chunk organization of a generated directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Square tiles of this size
    Tiled(u32),
    /// Strips of this many rows
    Strips(u32),
}

/// Write each raster as one directory of an in-memory TIFF.
pub fn build_tiff(rasters: &[Raster], layout: Layout, compression: u16, options: WriterOptions) -> Vec<u8> {
    let mut writer = TiffWriter::new(Cursor::new(Vec::new()), options).unwrap();
    for raster in rasters {
        let mut dir = DirectoryBuilder::new(raster.width(), raster.height());
        dir.set_short(tiffo::TiffTag::Compression, compression);
        match layout {
            Layout::Tiled(size) => dir.set_tiled(size, size),
            Layout::Strips(rows) => dir.set_rows_per_strip(rows),
        };
        RasterWriter::new(&mut writer).write(raster, dir).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Uncompressed little-endian classic TIFF.
pub fn build_simple(rasters: &[Raster], layout: Layout) -> Vec<u8> {
    build_tiff(rasters, layout, 1, WriterOptions::default())
}

pub async fn open_memory(data: Vec<u8>) -> TiffFile<MemoryRangeReader> {
    TiffFile::open(MemoryRangeReader::new(data, "memory.tif"))
        .await
        .unwrap()
}

// =============================================================================
// Hand-built TIFF Creation
// =============================================================================

/// Create a minimal 16x16 single-tile 8-bit gray TIFF byte by byte.
///
/// Layout:
/// - 0-7: header
/// - 8-133: IFD (10 entries * 12 bytes + 2 entry count + 4 next IFD)
/// - 200-455: uncompressed tile data
pub fn create_raw_gray_tiff(byte_order: ByteOrder) -> Vec<u8> {
    let tile_data_offset = 200u32;
    let pixels = gray_pattern(16, 16, 3);
    let mut data = vec![0u8; tile_data_offset as usize + pixels.len()];

    let write_u16 = |data: &mut [u8], offset: usize, value: u16| match byte_order {
        ByteOrder::LittleEndian => data[offset..offset + 2].copy_from_slice(&value.to_le_bytes()),
        ByteOrder::BigEndian => data[offset..offset + 2].copy_from_slice(&value.to_be_bytes()),
    };
    let write_u32 = |data: &mut [u8], offset: usize, value: u32| match byte_order {
        ByteOrder::LittleEndian => data[offset..offset + 4].copy_from_slice(&value.to_le_bytes()),
        ByteOrder::BigEndian => data[offset..offset + 4].copy_from_slice(&value.to_be_bytes()),
    };

    match byte_order {
        ByteOrder::LittleEndian => data[..2].copy_from_slice(b"II"),
        ByteOrder::BigEndian => data[..2].copy_from_slice(b"MM"),
    }
    write_u16(&mut data, 2, 42);
    write_u32(&mut data, 4, 8);

    let entries: [(u16, u16, u32); 10] = [
        (256, 4, 16),                // ImageWidth
        (257, 4, 16),                // ImageLength
        (258, 3, 8),                 // BitsPerSample
        (259, 3, 1),                 // Compression: none
        (262, 3, 1),                 // Photometric: min-is-black
        (277, 3, 1),                 // SamplesPerPixel
        (322, 4, 16),                // TileWidth
        (323, 4, 16),                // TileLength
        (324, 4, tile_data_offset),  // TileOffsets
        (325, 4, pixels.len() as u32), // TileByteCounts
    ];
    write_u16(&mut data, 8, entries.len() as u16);
    let mut offset = 10;
    for (tag, typ, value) in entries {
        write_u16(&mut data, offset, tag);
        write_u16(&mut data, offset + 2, typ);
        write_u32(&mut data, offset + 4, 1);
        // SHORT values are left-justified in the value field
        if typ == 3 {
            write_u16(&mut data, offset + 8, value as u16);
        } else {
            write_u32(&mut data, offset + 8, value);
        }
        offset += 12;
    }
    write_u32(&mut data, offset, 0);

    data[tile_data_offset as usize..].copy_from_slice(&pixels);
    data
}

// =============================================================================
// Validation Helpers
// =============================================================================

/// Check if data starts with TIFF magic bytes.
pub fn is_tiff_magic(data: &[u8]) -> bool {
    if data.len() < 4 {
        return false;
    }

    (data[0] == b'I' && data[1] == b'I' && data[2] == 42 && data[3] == 0)
        || (data[0] == b'M' && data[1] == b'M' && data[2] == 0 && data[3] == 42)
}

/// Check if data starts with BigTIFF magic bytes.
pub fn is_bigtiff_magic(data: &[u8]) -> bool {
    if data.len() < 8 {
        return false;
    }

    if data[0] == b'I' && data[1] == b'I' {
        let version = u16::from_le_bytes([data[2], data[3]]);
        version == 43
    } else if data[0] == b'M' && data[1] == b'M' {
        let version = u16::from_be_bytes([data[2], data[3]]);
        version == 43
    } else {
        false
    }
}
