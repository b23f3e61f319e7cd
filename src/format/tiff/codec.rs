//! Chunk compression and prediction.
//!
//! A chunk (tile or strip) goes through two stages on its way between the
//! file and a pixel buffer:
//!
//! - decompression (none, LZW, Deflate, PackBits or JPEG)
//! - horizontal prediction and byte-order normalization for wide samples
//!
//! Decoded buffers always hold samples in native byte order; the file byte
//! order only exists on the compressed side.

use std::io::{Read, Write};

use salzweg::decoder::TiffStyleDecoder;
use salzweg::encoder::TiffStyleEncoder;

use crate::error::TiffError;

use super::jpeg::{decode_jpeg, encode_jpeg, DEFAULT_JPEG_QUALITY};
use super::parser::ByteOrder;
use super::tags::{compression_name, predictor, Compression};

/// Everything needed to turn stored chunk bytes into pixels and back.
#[derive(Debug, Clone, Copy)]
pub struct ChunkParams<'a> {
    pub compression: u16,
    pub predictor: u16,
    pub bits_per_sample: u16,
    /// Interleaved samples per chunk pixel
    pub samples: u16,
    /// Chunk width in pixels
    pub width: u32,
    /// Chunk height in rows
    pub rows: u32,
    pub byte_order: ByteOrder,
    pub jpeg_tables: Option<&'a [u8]>,
    pub jpeg_quality: u8,
}

impl<'a> ChunkParams<'a> {
    /// Parameters for an uncompressed chunk of 8-bit samples.
    pub fn new(width: u32, rows: u32, samples: u16, bits_per_sample: u16) -> Self {
        Self {
            compression: Compression::None.as_u16(),
            predictor: predictor::NONE,
            bits_per_sample,
            samples,
            width,
            rows,
            byte_order: ByteOrder::native(),
            jpeg_tables: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn row_bytes(&self) -> usize {
        (self.width as usize * self.samples as usize * self.bits_per_sample as usize).div_ceil(8)
    }

    /// Decoded chunk size in bytes.
    pub fn expected_len(&self) -> usize {
        self.row_bytes() * self.rows as usize
    }

    fn sample_bytes(&self) -> usize {
        self.bits_per_sample as usize / 8
    }
}

// =============================================================================
// Decode
// =============================================================================

/// Decode stored chunk bytes into a native-order pixel buffer.
///
/// An empty chunk (byte count 0) decodes to zeros. A decoded buffer longer
/// than the chunk is truncated; a shorter one is an error.
///
/// # Errors
/// - `UnsupportedCompression` for schemes other than none, LZW, JPEG,
///   Deflate and PackBits
/// - `Decode` if the payload is corrupt or the predictor cannot be undone
pub fn decode_chunk(data: &[u8], params: &ChunkParams<'_>) -> Result<Vec<u8>, TiffError> {
    let expected = params.expected_len();
    if data.is_empty() {
        return Ok(vec![0; expected]);
    }

    let mut buf = decompress(data, params)?;
    if buf.len() < expected {
        return Err(TiffError::Decode(format!(
            "{} chunk decoded to {} bytes, expected {}",
            compression_name(params.compression),
            buf.len(),
            expected
        )));
    }
    buf.truncate(expected);

    swap_to_native(&mut buf, params.sample_bytes(), params.byte_order);
    match params.predictor {
        predictor::NONE => {}
        predictor::HORIZONTAL => undo_horizontal(&mut buf, params)?,
        other => {
            return Err(TiffError::Decode(format!("predictor {} not supported", other)));
        }
    }
    Ok(buf)
}

fn decompress(data: &[u8], params: &ChunkParams<'_>) -> Result<Vec<u8>, TiffError> {
    match Compression::from_u16(params.compression) {
        Some(Compression::None) => Ok(data.to_vec()),
        Some(Compression::Lzw) => TiffStyleDecoder::decode_to_vec(data)
            .map_err(|e| TiffError::Decode(format!("lzw: {:?}", e))),
        Some(Compression::AdobeDeflate) | Some(Compression::Deflate) => {
            let mut buf = Vec::with_capacity(params.expected_len());
            flate2::read::ZlibDecoder::new(data)
                .read_to_end(&mut buf)
                .map_err(|e| TiffError::Decode(format!("deflate: {}", e)))?;
            Ok(buf)
        }
        Some(Compression::PackBits) => packbits_decode(data, params.expected_len()),
        Some(Compression::Jpeg) => {
            if params.bits_per_sample != 8 {
                return Err(TiffError::Decode(format!(
                    "jpeg: {} bits per sample not supported",
                    params.bits_per_sample
                )));
            }
            decode_jpeg(params.jpeg_tables, data, params.samples)
        }
        _ => Err(TiffError::UnsupportedCompression(compression_name(
            params.compression,
        ))),
    }
}

// =============================================================================
// Encode
// =============================================================================

/// Encode a native-order pixel buffer into stored chunk bytes.
///
/// # Errors
/// - `UnsupportedCompression` for schemes that cannot be written
/// - `Encode` if the buffer size is wrong or the encoder fails
pub fn encode_chunk(pixels: &[u8], params: &ChunkParams<'_>) -> Result<Vec<u8>, TiffError> {
    let expected = params.expected_len();
    if pixels.len() != expected {
        return Err(TiffError::Encode(format!(
            "chunk buffer holds {} bytes, expected {}",
            pixels.len(),
            expected
        )));
    }

    let compression = Compression::from_u16(params.compression);
    if compression == Some(Compression::Jpeg) {
        if params.bits_per_sample != 8 {
            return Err(TiffError::Encode(format!(
                "jpeg: {} bits per sample not supported",
                params.bits_per_sample
            )));
        }
        return encode_jpeg(
            pixels,
            params.width,
            params.rows,
            params.samples,
            params.jpeg_quality,
        );
    }

    let mut buf = pixels.to_vec();
    match params.predictor {
        predictor::NONE => {}
        predictor::HORIZONTAL => apply_horizontal(&mut buf, params)?,
        other => {
            return Err(TiffError::Encode(format!("predictor {} not supported", other)));
        }
    }
    swap_to_native(&mut buf, params.sample_bytes(), params.byte_order);

    match compression {
        Some(Compression::None) => Ok(buf),
        Some(Compression::Lzw) => TiffStyleEncoder::encode_to_vec(&buf[..])
            .map_err(|e| TiffError::Encode(format!("lzw: {:?}", e))),
        Some(Compression::AdobeDeflate) | Some(Compression::Deflate) => {
            let mut encoder =
                flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(&buf)
                .map_err(|e| TiffError::Encode(format!("deflate: {}", e)))?;
            encoder
                .finish()
                .map_err(|e| TiffError::Encode(format!("deflate: {}", e)))
        }
        Some(Compression::PackBits) => Ok(packbits_encode(&buf, params.row_bytes())),
        _ => Err(TiffError::UnsupportedCompression(compression_name(
            params.compression,
        ))),
    }
}

/// Whether chunks with this compression id can be written.
pub fn can_encode(compression: u16) -> bool {
    matches!(
        Compression::from_u16(compression),
        Some(
            Compression::None
                | Compression::Lzw
                | Compression::Jpeg
                | Compression::AdobeDeflate
                | Compression::Deflate
                | Compression::PackBits
        )
    )
}

// =============================================================================
// Byte order and prediction
// =============================================================================

/// Swap multi-byte samples between file order and native order.
///
/// The operation is its own inverse, so it serves both directions.
fn swap_to_native(buf: &mut [u8], sample_bytes: usize, byte_order: ByteOrder) {
    if sample_bytes < 2 || byte_order == ByteOrder::native() {
        return;
    }
    for sample in buf.chunks_exact_mut(sample_bytes) {
        sample.reverse();
    }
}

fn check_predictor(params: &ChunkParams<'_>) -> Result<usize, TiffError> {
    match params.bits_per_sample {
        8 | 16 | 32 => Ok(params.sample_bytes()),
        bits => Err(TiffError::Decode(format!(
            "horizontal predictor with {} bits per sample not supported",
            bits
        ))),
    }
}

macro_rules! horizontal {
    ($buf:expr, $row_bytes:expr, $stride:expr, $ty:ty, $op:ident, $reverse:expr) => {{
        const N: usize = std::mem::size_of::<$ty>();
        for row in $buf.chunks_exact_mut($row_bytes) {
            let count = row.len() / N;
            let read = |row: &[u8], i: usize| {
                let mut b = [0u8; N];
                b.copy_from_slice(&row[i * N..(i + 1) * N]);
                <$ty>::from_ne_bytes(b)
            };
            let indices: Box<dyn Iterator<Item = usize>> = if $reverse {
                Box::new(($stride..count).rev())
            } else {
                Box::new($stride..count)
            };
            for i in indices {
                let value = read(row, i).$op(read(row, i - $stride));
                row[i * N..(i + 1) * N].copy_from_slice(&value.to_ne_bytes());
            }
        }
    }};
}

/// Integrate horizontal differences, left to right within each row.
fn undo_horizontal(buf: &mut [u8], params: &ChunkParams<'_>) -> Result<(), TiffError> {
    let sample_bytes = check_predictor(params)?;
    let row_bytes = params.row_bytes();
    let stride = params.samples as usize;
    if row_bytes == 0 {
        return Ok(());
    }
    match sample_bytes {
        1 => horizontal!(buf, row_bytes, stride, u8, wrapping_add, false),
        2 => horizontal!(buf, row_bytes, stride, u16, wrapping_add, false),
        _ => horizontal!(buf, row_bytes, stride, u32, wrapping_add, false),
    }
    Ok(())
}

/// Replace samples with horizontal differences, right to left within each row.
fn apply_horizontal(buf: &mut [u8], params: &ChunkParams<'_>) -> Result<(), TiffError> {
    let sample_bytes = check_predictor(params).map_err(|e| TiffError::Encode(e.to_string()))?;
    let row_bytes = params.row_bytes();
    let stride = params.samples as usize;
    if row_bytes == 0 {
        return Ok(());
    }
    match sample_bytes {
        1 => horizontal!(buf, row_bytes, stride, u8, wrapping_sub, true),
        2 => horizontal!(buf, row_bytes, stride, u16, wrapping_sub, true),
        _ => horizontal!(buf, row_bytes, stride, u32, wrapping_sub, true),
    }
    Ok(())
}

// =============================================================================
// PackBits
// =============================================================================

/// Expand a PackBits stream.
fn packbits_decode(data: &[u8], expected: usize) -> Result<Vec<u8>, TiffError> {
    let mut out = Vec::with_capacity(expected);
    let mut pos = 0;
    while pos < data.len() && out.len() < expected {
        let header = data[pos] as i8;
        pos += 1;
        match header {
            0..=127 => {
                let len = header as usize + 1;
                let literal = data.get(pos..pos + len).ok_or_else(|| {
                    TiffError::Decode(format!("packbits: literal run past end at byte {}", pos))
                })?;
                out.extend_from_slice(literal);
                pos += len;
            }
            -127..=-1 => {
                let byte = *data.get(pos).ok_or_else(|| {
                    TiffError::Decode(format!("packbits: repeat run past end at byte {}", pos))
                })?;
                out.resize(out.len() + (1 - header as isize) as usize, byte);
                pos += 1;
            }
            // -128 is a no-op
            _ => {}
        }
    }
    Ok(out)
}

/// Compress with PackBits, never letting a run cross a row boundary.
fn packbits_encode(data: &[u8], row_bytes: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 128 + 1);
    for row in data.chunks(row_bytes.max(1)) {
        let mut i = 0;
        while i < row.len() {
            let run = run_length(row, i);
            if run >= 2 {
                out.push((1 - run as i16) as i8 as u8);
                out.push(row[i]);
                i += run;
                continue;
            }
            let start = i;
            while i < row.len() && i - start < 128 && run_length(row, i) < 2 {
                i += 1;
            }
            out.push((i - start - 1) as u8);
            out.extend_from_slice(&row[start..i]);
        }
    }
    out
}

fn run_length(row: &[u8], start: usize) -> usize {
    let byte = row[start];
    row[start..]
        .iter()
        .take(128)
        .take_while(|&&b| b == byte)
        .count()
}
