//! Pre-flight header probe.
//!
//! [`HeaderProbe`] inspects the first bytes of a file without going through
//! the directory parser. It answers three questions (byte order, classic or
//! BigTIFF, where the first directory lives) and rejects files whose header
//! is malformed before any further I/O is attempted.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tokio::io::AsyncReadExt;

use crate::error::{IoError, TiffError};
use crate::io::RangeReader;

use super::parser::{ByteOrder, VERSION_BIGTIFF, VERSION_TIFF};

/// Number of bytes read from the start of the file.
pub const PROBE_SIZE: usize = 1024;

/// Classic (32-bit offsets) or BigTIFF (64-bit offsets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TiffVariant {
    Classic,
    Big,
}

impl TiffVariant {
    /// Width of file offsets in bits.
    pub const fn offset_bits(self) -> u32 {
        match self {
            TiffVariant::Classic => 32,
            TiffVariant::Big => 64,
        }
    }
}

/// Result of probing a file header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderProbe {
    pub byte_order: ByteOrder,
    /// Raw format id (42 or 43)
    pub format_id: u16,
    pub variant: TiffVariant,
    /// Byte position of the first-directory offset field
    pub offset_field_start: usize,
    /// Width of the first-directory offset field in bytes
    pub offset_field_len: usize,
    pub first_directory_offset: u64,
}

impl HeaderProbe {
    /// Probe a header from raw bytes (normally the first 1024 of a file).
    ///
    /// # Errors
    /// - `InvalidMagic` if the first two bytes are neither "II" nor "MM"
    /// - `InvalidVersion` if the format id is not 42 or 43
    /// - `NonZeroReserved` if a BigTIFF header has bytes 6-7 set
    /// - `FileTooSmall` if the header is truncated
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TiffError> {
        if bytes.len() < 4 {
            return Err(TiffError::FileTooSmall {
                required: 4,
                actual: bytes.len() as u64,
            });
        }

        let byte_order = match &bytes[0..2] {
            b"II" => ByteOrder::LittleEndian,
            b"MM" => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(u16::from_le_bytes([bytes[0], bytes[1]]))),
        };

        let format_id = byte_order.read_u16(&bytes[2..4]);
        let (variant, offset_field_start, offset_field_len) = match format_id {
            VERSION_TIFF => (TiffVariant::Classic, 4, 4),
            VERSION_BIGTIFF => (TiffVariant::Big, 8, 8),
            other => return Err(TiffError::InvalidVersion(other)),
        };

        let end = offset_field_start + offset_field_len;
        if bytes.len() < end {
            return Err(TiffError::FileTooSmall {
                required: end as u64,
                actual: bytes.len() as u64,
            });
        }

        if variant == TiffVariant::Big {
            let reserved = byte_order.read_u16(&bytes[6..8]);
            if reserved != 0 {
                return Err(TiffError::NonZeroReserved(reserved));
            }
        }

        let field = &bytes[offset_field_start..end];
        let first_directory_offset = match variant {
            TiffVariant::Classic => byte_order.read_u32(field) as u64,
            TiffVariant::Big => byte_order.read_u64(field),
        };

        Ok(Self {
            byte_order,
            format_id,
            variant,
            offset_field_start,
            offset_field_len,
            first_directory_offset,
        })
    }

    /// Probe a file on disk, reading at most [`PROBE_SIZE`] bytes.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, TiffError> {
        let file = tokio::fs::File::open(path.as_ref())
            .await
            .map_err(IoError::from)?;
        let mut buf = Vec::with_capacity(PROBE_SIZE);
        file.take(PROBE_SIZE as u64)
            .read_to_end(&mut buf)
            .await
            .map_err(IoError::from)?;
        Self::from_bytes(&buf)
    }

    /// Probe through a range reader.
    pub async fn from_reader<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let len = std::cmp::min(reader.size(), PROBE_SIZE as u64) as usize;
        let bytes = reader.read_exact_at(0, len).await?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for HeaderProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (marker, name) = match self.byte_order {
            ByteOrder::LittleEndian => ("II", "little"),
            ByteOrder::BigEndian => ("MM", "big"),
        };
        writeln!(f, "Endian ID: {marker} -- {name}")?;
        writeln!(
            f,
            "TIFF ID: {} -- {}-bit TIFF",
            self.format_id,
            self.variant.offset_bits()
        )?;
        write!(f, "First IFD offset: 0x{:x}", self.first_directory_offset)
    }
}
