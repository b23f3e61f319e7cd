//! TIFF tag value reading and encoding.
//!
//! Values are stored either inline in the IFD entry (when they fit in the
//! 4/8-byte value field) or at an offset in the file. [`ValueReader`]
//! resolves both cases into a typed [`TagValue`], fetching offset values in
//! a single range request so that large arrays such as TileOffsets cost one
//! read.

use std::fmt;

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::FieldType;

// =============================================================================
// TagValue
// =============================================================================

/// A decoded tag value: one vector per TIFF field type.
///
/// ASCII values keep their raw bytes, NUL terminators included, so that
/// multi-string tags (e.g. InkNames) survive a copy unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Byte(Vec<u8>),
    Ascii(Vec<u8>),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
    SByte(Vec<i8>),
    Undefined(Vec<u8>),
    SShort(Vec<i16>),
    SLong(Vec<i32>),
    SRational(Vec<(i32, i32)>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Ifd(Vec<u32>),
    Long8(Vec<u64>),
    SLong8(Vec<i64>),
    Ifd8(Vec<u64>),
}

/// Split `bytes` into `count` chunks of `N` bytes and map each one.
fn chunks<const N: usize, T>(bytes: &[u8], count: usize, f: impl Fn(&[u8]) -> T) -> Vec<T> {
    bytes.chunks_exact(N).take(count).map(f).collect()
}

impl TagValue {
    /// ASCII value from a string; a NUL terminator is appended.
    pub fn ascii(s: &str) -> Self {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        TagValue::Ascii(bytes)
    }

    /// Decode `count` values of `field_type` from `bytes`.
    ///
    /// # Errors
    /// Returns `InvalidTagValue` if `bytes` is shorter than the values need.
    pub fn decode(
        field_type: FieldType,
        count: usize,
        bytes: &[u8],
        byte_order: ByteOrder,
    ) -> Result<Self, TiffError> {
        let needed = field_type.size_in_bytes() * count;
        if bytes.len() < needed {
            return Err(TiffError::InvalidTagValue {
                tag: field_type.name(),
                message: format!("need {} bytes for {} values, got {}", needed, count, bytes.len()),
            });
        }
        let bytes = &bytes[..needed];
        let bo = byte_order;

        let value = match field_type {
            FieldType::Byte => TagValue::Byte(bytes.to_vec()),
            FieldType::Ascii => TagValue::Ascii(bytes.to_vec()),
            FieldType::Undefined => TagValue::Undefined(bytes.to_vec()),
            FieldType::SByte => TagValue::SByte(bytes.iter().map(|&b| b as i8).collect()),
            FieldType::Short => TagValue::Short(chunks::<2, _>(bytes, count, |c| bo.read_u16(c))),
            FieldType::SShort => {
                TagValue::SShort(chunks::<2, _>(bytes, count, |c| bo.read_u16(c) as i16))
            }
            FieldType::Long => TagValue::Long(chunks::<4, _>(bytes, count, |c| bo.read_u32(c))),
            FieldType::SLong => {
                TagValue::SLong(chunks::<4, _>(bytes, count, |c| bo.read_u32(c) as i32))
            }
            FieldType::Ifd => TagValue::Ifd(chunks::<4, _>(bytes, count, |c| bo.read_u32(c))),
            FieldType::Float => TagValue::Float(chunks::<4, _>(bytes, count, |c| {
                f32::from_bits(bo.read_u32(c))
            })),
            FieldType::Rational => TagValue::Rational(chunks::<8, _>(bytes, count, |c| {
                (bo.read_u32(c), bo.read_u32(&c[4..]))
            })),
            FieldType::SRational => TagValue::SRational(chunks::<8, _>(bytes, count, |c| {
                (bo.read_u32(c) as i32, bo.read_u32(&c[4..]) as i32)
            })),
            FieldType::Double => TagValue::Double(chunks::<8, _>(bytes, count, |c| {
                f64::from_bits(bo.read_u64(c))
            })),
            FieldType::Long8 => TagValue::Long8(chunks::<8, _>(bytes, count, |c| bo.read_u64(c))),
            FieldType::SLong8 => {
                TagValue::SLong8(chunks::<8, _>(bytes, count, |c| bo.read_u64(c) as i64))
            }
            FieldType::Ifd8 => TagValue::Ifd8(chunks::<8, _>(bytes, count, |c| bo.read_u64(c))),
        };
        Ok(value)
    }

    /// Encode the values in the given byte order.
    pub fn encode(&self, byte_order: ByteOrder) -> Vec<u8> {
        let bo = byte_order;
        let mut out = Vec::with_capacity(self.byte_len());
        match self {
            TagValue::Byte(v) | TagValue::Ascii(v) | TagValue::Undefined(v) => {
                out.extend_from_slice(v)
            }
            TagValue::SByte(v) => out.extend(v.iter().map(|&b| b as u8)),
            TagValue::Short(v) => v.iter().for_each(|&x| out.extend_from_slice(&bo.u16_bytes(x))),
            TagValue::SShort(v) => v
                .iter()
                .for_each(|&x| out.extend_from_slice(&bo.u16_bytes(x as u16))),
            TagValue::Long(v) | TagValue::Ifd(v) => {
                v.iter().for_each(|&x| out.extend_from_slice(&bo.u32_bytes(x)))
            }
            TagValue::SLong(v) => v
                .iter()
                .for_each(|&x| out.extend_from_slice(&bo.u32_bytes(x as u32))),
            TagValue::Float(v) => v
                .iter()
                .for_each(|&x| out.extend_from_slice(&bo.u32_bytes(x.to_bits()))),
            TagValue::Rational(v) => v.iter().for_each(|&(n, d)| {
                out.extend_from_slice(&bo.u32_bytes(n));
                out.extend_from_slice(&bo.u32_bytes(d));
            }),
            TagValue::SRational(v) => v.iter().for_each(|&(n, d)| {
                out.extend_from_slice(&bo.u32_bytes(n as u32));
                out.extend_from_slice(&bo.u32_bytes(d as u32));
            }),
            TagValue::Double(v) => v
                .iter()
                .for_each(|&x| out.extend_from_slice(&bo.u64_bytes(x.to_bits()))),
            TagValue::Long8(v) | TagValue::Ifd8(v) => {
                v.iter().for_each(|&x| out.extend_from_slice(&bo.u64_bytes(x)))
            }
            TagValue::SLong8(v) => v
                .iter()
                .for_each(|&x| out.extend_from_slice(&bo.u64_bytes(x as u64))),
        }
        out
    }

    /// Field type this value is stored as.
    pub fn field_type(&self) -> FieldType {
        match self {
            TagValue::Byte(_) => FieldType::Byte,
            TagValue::Ascii(_) => FieldType::Ascii,
            TagValue::Short(_) => FieldType::Short,
            TagValue::Long(_) => FieldType::Long,
            TagValue::Rational(_) => FieldType::Rational,
            TagValue::SByte(_) => FieldType::SByte,
            TagValue::Undefined(_) => FieldType::Undefined,
            TagValue::SShort(_) => FieldType::SShort,
            TagValue::SLong(_) => FieldType::SLong,
            TagValue::SRational(_) => FieldType::SRational,
            TagValue::Float(_) => FieldType::Float,
            TagValue::Double(_) => FieldType::Double,
            TagValue::Ifd(_) => FieldType::Ifd,
            TagValue::Long8(_) => FieldType::Long8,
            TagValue::SLong8(_) => FieldType::SLong8,
            TagValue::Ifd8(_) => FieldType::Ifd8,
        }
    }

    /// Number of values (the IFD entry count).
    pub fn count(&self) -> usize {
        match self {
            TagValue::Byte(v) | TagValue::Ascii(v) | TagValue::Undefined(v) => v.len(),
            TagValue::SByte(v) => v.len(),
            TagValue::Short(v) => v.len(),
            TagValue::SShort(v) => v.len(),
            TagValue::Long(v) | TagValue::Ifd(v) => v.len(),
            TagValue::SLong(v) => v.len(),
            TagValue::Float(v) => v.len(),
            TagValue::Rational(v) => v.len(),
            TagValue::SRational(v) => v.len(),
            TagValue::Double(v) => v.len(),
            TagValue::Long8(v) | TagValue::Ifd8(v) => v.len(),
            TagValue::SLong8(v) => v.len(),
        }
    }

    /// Encoded size in bytes.
    pub fn byte_len(&self) -> usize {
        self.count() * self.field_type().size_in_bytes()
    }

    /// All values widened to u64, for unsigned integer types only.
    pub fn as_u64_vec(&self) -> Option<Vec<u64>> {
        match self {
            TagValue::Byte(v) => Some(v.iter().map(|&x| x as u64).collect()),
            TagValue::Short(v) => Some(v.iter().map(|&x| x as u64).collect()),
            TagValue::Long(v) | TagValue::Ifd(v) => Some(v.iter().map(|&x| x as u64).collect()),
            TagValue::Long8(v) | TagValue::Ifd8(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// First value as u64, for unsigned integer types.
    pub fn first_u64(&self) -> Option<u64> {
        match self {
            TagValue::Byte(v) => v.first().map(|&x| x as u64),
            TagValue::Short(v) => v.first().map(|&x| x as u64),
            TagValue::Long(v) | TagValue::Ifd(v) => v.first().map(|&x| x as u64),
            TagValue::Long8(v) | TagValue::Ifd8(v) => v.first().copied(),
            _ => None,
        }
    }

    /// First value as u32, if it is an unsigned integer that fits.
    pub fn first_u32(&self) -> Option<u32> {
        self.first_u64().and_then(|v| u32::try_from(v).ok())
    }

    /// First value as u16, if it is an unsigned integer that fits.
    pub fn first_u16(&self) -> Option<u16> {
        self.first_u64().and_then(|v| u16::try_from(v).ok())
    }

    /// First string of an ASCII value (up to the first NUL).
    pub fn as_str(&self) -> Option<String> {
        match self {
            TagValue::Ascii(bytes) => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            _ => None,
        }
    }

    /// Raw bytes of Byte/Undefined/Ascii values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TagValue::Byte(v) | TagValue::Undefined(v) | TagValue::Ascii(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    /// Compact rendering: strings quoted, at most eight values then a count.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_SHOWN: usize = 8;

        fn list<T: fmt::Display>(
            f: &mut fmt::Formatter<'_>,
            items: impl Iterator<Item = T>,
            total: usize,
        ) -> fmt::Result {
            for (i, item) in items.take(MAX_SHOWN).enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{item}")?;
            }
            if total > MAX_SHOWN {
                write!(f, " ... ({total} values)")?;
            }
            Ok(())
        }

        let n = self.count();
        match self {
            TagValue::Ascii(_) => write!(f, "{:?}", self.as_str().unwrap_or_default()),
            TagValue::Byte(v) | TagValue::Undefined(v) => list(f, v.iter(), n),
            TagValue::SByte(v) => list(f, v.iter(), n),
            TagValue::Short(v) => list(f, v.iter(), n),
            TagValue::SShort(v) => list(f, v.iter(), n),
            TagValue::Long(v) | TagValue::Ifd(v) => list(f, v.iter(), n),
            TagValue::SLong(v) => list(f, v.iter(), n),
            TagValue::Float(v) => list(f, v.iter(), n),
            TagValue::Double(v) => list(f, v.iter(), n),
            TagValue::Long8(v) | TagValue::Ifd8(v) => list(f, v.iter(), n),
            TagValue::SLong8(v) => list(f, v.iter(), n),
            TagValue::Rational(v) => list(f, v.iter().map(|(a, b)| format!("{a}/{b}")), n),
            TagValue::SRational(v) => list(f, v.iter().map(|(a, b)| format!("{a}/{b}")), n),
        }
    }
}

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values from a TIFF file.
///
/// Combines a RangeReader with the file header so values are read
/// respecting the file's byte order and entry layout.
pub struct ValueReader<'a, R: RangeReader> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader> ValueReader<'a, R> {
    /// Create a new ValueReader.
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    /// Get the byte order from the header.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Read raw bytes for an IFD entry's value.
    ///
    /// Inline values come from the entry itself; offset values are fetched
    /// from the file in one request.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline {
            return Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ));
        }

        let offset = entry.value_offset(self.header.byte_order);
        if offset.checked_add(size).map_or(true, |end| end > self.reader.size()) {
            return Err(TiffError::InvalidTagValue {
                tag: "value offset",
                message: format!(
                    "tag {} points {} bytes at offset {} past end of file",
                    entry.tag_id, size, offset
                ),
            });
        }
        Ok(self.reader.read_exact_at(offset, size as usize).await?)
    }

    /// Read and decode an entry's value.
    pub async fn read_value(&self, entry: &IfdEntry) -> Result<TagValue, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        let bytes = self.read_bytes(entry).await?;
        TagValue::decode(field_type, entry.count as usize, &bytes, self.byte_order())
    }
}

// =============================================================================
// Tests
// =============================================================================
