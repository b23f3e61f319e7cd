//! JPEG chunk handling.
//!
//! TIFF files with compression 7 often store "abbreviated" JPEG streams in
//! each tile or strip: the quantization (DQT) and Huffman (DHT) tables are
//! kept once in the `JPEGTables` tag instead of being repeated per chunk.
//! Before a chunk can be handed to a JPEG decoder the two must be spliced
//! back together:
//!
//! 1. `JPEGTables` starts with SOI (FFD8) and ends with EOI (FFD9)
//! 2. chunk data also starts with SOI and ends with EOI
//! 3. strip EOI from the tables, strip SOI from the chunk, concatenate

use std::io::Cursor;

use bytes::{Bytes, BytesMut};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, ImageReader, RgbImage};

use crate::error::TiffError;

// =============================================================================
// JPEG Markers
// =============================================================================

/// Start Of Image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// End Of Image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Define Huffman Table marker
pub const DHT: [u8; 2] = [0xFF, 0xC4];

/// Define Quantization Table marker
pub const DQT: [u8; 2] = [0xFF, 0xDB];

/// Start Of Scan marker
pub const SOS: [u8; 2] = [0xFF, 0xDA];

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// Stream Analysis
// =============================================================================

/// Check if JPEG data is an abbreviated stream (missing tables).
///
/// An abbreviated stream starts with SOI but reaches SOS without any DQT or
/// DHT marker in between.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    if data.len() < 4 || data[0..2] != SOI {
        return false;
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        let marker = [data[pos], data[pos + 1]];
        if marker == DQT || marker == DHT {
            return false;
        }
        if marker == SOS {
            return true;
        }

        // Skip marker segment (marker + 2-byte length + payload)
        if pos + 3 < data.len() && marker[1] != 0x00 && marker[1] != 0xD8 && marker[1] != 0xD9 {
            let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
            pos += 2 + length;
        } else {
            pos += 2;
        }
    }

    false
}

/// Check if JPEG data carries its own quantization tables.
pub fn is_complete_stream(data: &[u8]) -> bool {
    if data.len() < 4 || data[0..2] != SOI {
        return false;
    }
    data[2..].windows(2).any(|w| w == DQT)
}

/// Merge `JPEGTables` with abbreviated chunk data.
///
/// # Arguments
/// * `tables` - JPEGTables data (starts with SOI, ends with EOI)
/// * `chunk` - Abbreviated chunk data (starts with SOI, ends with EOI)
pub fn merge_jpeg_tables(tables: &[u8], chunk: &[u8]) -> Bytes {
    if tables.is_empty() {
        return Bytes::copy_from_slice(chunk);
    }
    if chunk.is_empty() {
        return Bytes::new();
    }

    let tables_end = if tables.len() >= 2 && tables[tables.len() - 2..] == EOI {
        tables.len() - 2
    } else {
        tables.len()
    };
    let chunk_start = if chunk.len() >= 2 && chunk[0..2] == SOI {
        2
    } else {
        0
    };

    let mut result = BytesMut::with_capacity(tables_end + chunk.len() - chunk_start);
    result.extend_from_slice(&tables[..tables_end]);
    result.extend_from_slice(&chunk[chunk_start..]);
    result.freeze()
}

/// Prepare chunk data for decoding, merging tables if needed.
pub fn prepare_chunk_jpeg(tables: Option<&[u8]>, chunk: &[u8]) -> Bytes {
    if is_complete_stream(chunk) {
        return Bytes::copy_from_slice(chunk);
    }
    match tables {
        Some(tables) if is_abbreviated_stream(chunk) => merge_jpeg_tables(tables, chunk),
        _ => Bytes::copy_from_slice(chunk),
    }
}

// =============================================================================
// Pixel Codec
// =============================================================================

/// Decode a JPEG chunk into interleaved 8-bit samples.
///
/// # Arguments
/// * `tables` - Optional JPEGTables from the directory
/// * `chunk` - Stored chunk bytes
/// * `samples` - Samples per pixel expected by the directory (1 or 3)
///
/// # Errors
/// Returns `Decode` if the stream is not valid JPEG or `samples` is neither 1 nor 3.
pub fn decode_jpeg(tables: Option<&[u8]>, chunk: &[u8], samples: u16) -> Result<Vec<u8>, TiffError> {
    let data = prepare_chunk_jpeg(tables, chunk);
    let img = ImageReader::with_format(Cursor::new(&data[..]), image::ImageFormat::Jpeg)
        .decode()
        .map_err(|e| TiffError::Decode(format!("jpeg: {}", e)))?;

    match samples {
        1 => Ok(img.into_luma8().into_raw()),
        3 => Ok(img.into_rgb8().into_raw()),
        other => Err(TiffError::Decode(format!(
            "jpeg: {} samples per pixel not supported",
            other
        ))),
    }
}

/// Encode interleaved 8-bit gray or RGB samples as a complete JPEG stream.
///
/// Quality is clamped to 1..=100.
///
/// # Errors
/// Returns `Encode` if the buffer does not match the dimensions or the
/// encoder fails.
pub fn encode_jpeg(
    pixels: &[u8],
    width: u32,
    height: u32,
    samples: u16,
    quality: u8,
) -> Result<Vec<u8>, TiffError> {
    let quality = quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY);
    let size_error = || TiffError::Encode(format!(
        "jpeg: buffer of {} bytes does not hold {}x{}x{}",
        pixels.len(),
        width,
        height,
        samples
    ));

    let img = match samples {
        1 => DynamicImage::ImageLuma8(
            GrayImage::from_raw(width, height, pixels.to_vec()).ok_or_else(size_error)?,
        ),
        3 => DynamicImage::ImageRgb8(
            RgbImage::from_raw(width, height, pixels.to_vec()).ok_or_else(size_error)?,
        ),
        other => {
            return Err(TiffError::Encode(format!(
                "jpeg: {} samples per pixel not supported",
                other
            )))
        }
    };

    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, quality)
        .encode_image(&img)
        .map_err(|e| TiffError::Encode(format!("jpeg: {}", e)))?;
    Ok(output)
}
