//! TIFF tag and field type vocabulary.
//!
//! This module defines:
//! - Field types that determine how values are encoded, with their names
//! - Tag IDs used by the codec, the raster engine and the tag copier
//! - A static id -> name table for diagnostics
//! - Compression schemes and the enumerated values of common tags
//!
//! The definitions cover both classic TIFF and BigTIFF.

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
///
/// All TIFF 6.0 types plus the three BigTIFF additions are defined, so any
/// entry in a well-formed file can be decoded and re-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer
    Byte = 1,
    /// 8-bit ASCII character, NUL terminated
    Ascii = 2,
    /// Unsigned 16-bit integer
    Short = 3,
    /// Unsigned 32-bit integer
    Long = 4,
    /// Two Longs: numerator, denominator
    Rational = 5,
    /// Signed 8-bit integer
    SByte = 6,
    /// Opaque byte
    Undefined = 7,
    /// Signed 16-bit integer
    SShort = 8,
    /// Signed 32-bit integer
    SLong = 9,
    /// Two SLongs: numerator, denominator
    SRational = 10,
    /// IEEE single precision float
    Float = 11,
    /// IEEE double precision float
    Double = 12,
    /// 32-bit IFD offset
    Ifd = 13,
    /// Unsigned 64-bit integer (BigTIFF)
    Long8 = 16,
    /// Signed 64-bit integer (BigTIFF)
    SLong8 = 17,
    /// 64-bit IFD offset (BigTIFF)
    Ifd8 = 18,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::SByte | FieldType::Undefined => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float | FieldType::Ifd => 4,
            FieldType::Rational
            | FieldType::SRational
            | FieldType::Double
            | FieldType::Long8
            | FieldType::SLong8
            | FieldType::Ifd8 => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    ///
    /// Returns `None` for unknown type values (14, 15 and anything above 18).
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            6 => Some(FieldType::SByte),
            7 => Some(FieldType::Undefined),
            8 => Some(FieldType::SShort),
            9 => Some(FieldType::SLong),
            10 => Some(FieldType::SRational),
            11 => Some(FieldType::Float),
            12 => Some(FieldType::Double),
            13 => Some(FieldType::Ifd),
            16 => Some(FieldType::Long8),
            17 => Some(FieldType::SLong8),
            18 => Some(FieldType::Ifd8),
            _ => None,
        }
    }

    /// Numeric type id.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Diagnostic name, in the `TIFF_*` spelling used by libtiff.
    pub const fn name(self) -> &'static str {
        match self {
            FieldType::Byte => "TIFF_BYTE",
            FieldType::Ascii => "TIFF_ASCII",
            FieldType::Short => "TIFF_SHORT",
            FieldType::Long => "TIFF_LONG",
            FieldType::Rational => "TIFF_RATIONAL",
            FieldType::SByte => "TIFF_SBYTE",
            FieldType::Undefined => "TIFF_UNDEFINED",
            FieldType::SShort => "TIFF_SSHORT",
            FieldType::SLong => "TIFF_SLONG",
            FieldType::SRational => "TIFF_SRATIONAL",
            FieldType::Float => "TIFF_FLOAT",
            FieldType::Double => "TIFF_DOUBLE",
            FieldType::Ifd => "TIFF_IFD",
            FieldType::Long8 => "TIFF_LONG8",
            FieldType::SLong8 => "TIFF_SLONG8",
            FieldType::Ifd8 => "TIFF_IFD8",
        }
    }

    /// Maximum bytes that can be stored inline in a classic TIFF IFD entry.
    pub const INLINE_THRESHOLD_TIFF: usize = 4;

    /// Maximum bytes that can be stored inline in a BigTIFF IFD entry.
    pub const INLINE_THRESHOLD_BIGTIFF: usize = 8;

    /// Check if a value with this type and count fits inline in an entry.
    #[inline]
    pub fn fits_inline(self, count: u64, is_bigtiff: bool) -> bool {
        let threshold = if is_bigtiff {
            Self::INLINE_THRESHOLD_BIGTIFF
        } else {
            Self::INLINE_THRESHOLD_TIFF
        };
        (self.size_in_bytes() as u64)
            .checked_mul(count)
            .is_some_and(|total| total <= threshold as u64)
    }
}

/// Name of a field type id, or `None` if the id is not a TIFF type.
pub fn field_type_name(value: u16) -> Option<&'static str> {
    FieldType::from_u16(value).map(FieldType::name)
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// TIFF tag IDs the crate refers to by name.
///
/// Tags not listed here are still parsed, resolved and copied by id; this
/// enum only gives names to the ones code needs to address directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    // -------------------------------------------------------------------------
    // Basic Image Structure
    // -------------------------------------------------------------------------
    SubFileType = 254,
    ImageWidth = 256,
    ImageLength = 257,
    BitsPerSample = 258,
    Compression = 259,
    PhotometricInterpretation = 262,
    FillOrder = 266,
    ImageDescription = 270,
    Orientation = 274,
    SamplesPerPixel = 277,
    PlanarConfiguration = 284,
    SampleFormat = 339,
    ExtraSamples = 338,

    // -------------------------------------------------------------------------
    // Strip Organization
    // -------------------------------------------------------------------------
    StripOffsets = 273,
    RowsPerStrip = 278,
    StripByteCounts = 279,

    // -------------------------------------------------------------------------
    // Tile Organization
    // -------------------------------------------------------------------------
    TileWidth = 322,
    TileLength = 323,
    TileOffsets = 324,
    TileByteCounts = 325,

    // -------------------------------------------------------------------------
    // Compression helpers
    // -------------------------------------------------------------------------
    Predictor = 317,
    /// Shared JPEG quantization and Huffman tables for abbreviated streams
    JpegTables = 347,
    Group3Options = 292,
    Group4Options = 293,
    BadFaxLines = 326,
    CleanFaxData = 327,
    ConsecutiveBadFaxLines = 328,
    FaxRecvParams = 34908,
    FaxSubAddress = 34909,
    FaxRecvTime = 34910,

    // -------------------------------------------------------------------------
    // Color and ink description
    // -------------------------------------------------------------------------
    TransferFunction = 301,
    ColorMap = 320,
    InkNames = 333,
    NumberOfInks = 334,
    YCbCrSubSampling = 530,
    IccProfile = 34675,

    // -------------------------------------------------------------------------
    // Document metadata
    // -------------------------------------------------------------------------
    XResolution = 282,
    YResolution = 283,
    ResolutionUnit = 296,
    PageNumber = 297,
    Software = 305,
}

impl TiffTag {
    /// Create a TiffTag from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        use TiffTag::*;
        let tag = match value {
            254 => SubFileType,
            256 => ImageWidth,
            257 => ImageLength,
            258 => BitsPerSample,
            259 => Compression,
            262 => PhotometricInterpretation,
            266 => FillOrder,
            270 => ImageDescription,
            273 => StripOffsets,
            274 => Orientation,
            277 => SamplesPerPixel,
            278 => RowsPerStrip,
            279 => StripByteCounts,
            282 => XResolution,
            283 => YResolution,
            284 => PlanarConfiguration,
            292 => Group3Options,
            293 => Group4Options,
            296 => ResolutionUnit,
            297 => PageNumber,
            301 => TransferFunction,
            305 => Software,
            317 => Predictor,
            320 => ColorMap,
            322 => TileWidth,
            323 => TileLength,
            324 => TileOffsets,
            325 => TileByteCounts,
            326 => BadFaxLines,
            327 => CleanFaxData,
            328 => ConsecutiveBadFaxLines,
            333 => InkNames,
            334 => NumberOfInks,
            338 => ExtraSamples,
            339 => SampleFormat,
            347 => JpegTables,
            530 => YCbCrSubSampling,
            34675 => IccProfile,
            34908 => FaxRecvParams,
            34909 => FaxSubAddress,
            34910 => FaxRecvTime,
            _ => return None,
        };
        Some(tag)
    }

    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Diagnostic name of the tag.
    pub fn name(self) -> &'static str {
        tag_name(self.as_u16()).unwrap_or("Unknown")
    }
}

/// Tag id -> diagnostic name, sorted by id.
const TAG_NAMES: &[(u16, &str)] = &[
    (254, "SubFileType"),
    (255, "OldSubFileType"),
    (256, "ImageWidth"),
    (257, "ImageLength"),
    (258, "BitsPerSample"),
    (259, "Compression"),
    (262, "Photometric"),
    (263, "Threshholding"),
    (264, "CellWidth"),
    (265, "CellLength"),
    (266, "FillOrder"),
    (269, "DocumentName"),
    (270, "ImageDescription"),
    (271, "Make"),
    (272, "Model"),
    (273, "StripOffsets"),
    (274, "Orientation"),
    (277, "SamplesPerPixel"),
    (278, "RowsPerStrip"),
    (279, "StripByteCounts"),
    (280, "MinSampleValue"),
    (281, "MaxSampleValue"),
    (282, "XResolution"),
    (283, "YResolution"),
    (284, "PlanarConfig"),
    (285, "PageName"),
    (286, "XPosition"),
    (287, "YPosition"),
    (288, "FreeOffsets"),
    (289, "FreeByteCounts"),
    (290, "GrayResponseUnit"),
    (291, "GrayResponseCurve"),
    (292, "Group3Options"),
    (293, "Group4Options"),
    (296, "ResolutionUnit"),
    (297, "PageNumber"),
    (300, "ColorResponseUnit"),
    (301, "TransferFunction"),
    (305, "Software"),
    (306, "DateTime"),
    (315, "Artist"),
    (316, "HostComputer"),
    (317, "Predictor"),
    (318, "Whitepoint"),
    (319, "PrimaryChromaticities"),
    (320, "Colormap"),
    (321, "HalftoneHints"),
    (322, "TileWidth"),
    (323, "TileLength"),
    (324, "TileOffsets"),
    (325, "TileByteCounts"),
    (326, "BadFaxLines"),
    (327, "CleanFaxData"),
    (328, "ConsecutiveBadFaxLines"),
    (330, "SubIFD"),
    (332, "InkSet"),
    (333, "InkNames"),
    (334, "NumberOfInks"),
    (336, "DotRange"),
    (337, "TargetPrinter"),
    (338, "ExtraSamples"),
    (339, "SampleFormat"),
    (340, "SMinSampleValue"),
    (341, "SMaxSampleValue"),
    (347, "JPEGTables"),
    (512, "JPEGProcessingMode"),
    (513, "JPEGInterchangeFormat"),
    (514, "JPEGInterchangeFormatLength"),
    (515, "JPEGRestartInterval"),
    (517, "JPEGLosslessPredictors"),
    (518, "JPEGPointTransform"),
    (519, "JPEGQTables"),
    (520, "JPEGDCTables"),
    (521, "JPEGACTables"),
    (529, "YCbCrCoefficients"),
    (530, "YCbCrSubsampling"),
    (531, "YCbCrPositioning"),
    (532, "ReferenceBlackWhite"),
    (32768, "OLD BOGUS Matteing tag"),
    (32953, "IgReferencePoints (Island Graphics)"),
    (32954, "IgRegionTackPoint (Island Graphics)"),
    (32955, "IgRegionWarpCorners (Island Graphics)"),
    (32956, "IgRegionAffine (Island Graphics)"),
    (32995, "OBSOLETE Matteing (Silicon Graphics)"),
    (32996, "OBSOLETE DataType (Silicon Graphics)"),
    (32997, "ImageDepth (Silicon Graphics)"),
    (32998, "TileDepth (Silicon Graphics)"),
    (33432, "Copyright"),
    (34675, "ICC Profile"),
    (34750, "JBIG Options"),
    (34908, "FaxRecvParams"),
    (34909, "FaxSubAddress"),
    (34910, "FaxRecvTime"),
    (37439, "StoNits"),
];

/// Diagnostic name of a tag id, or `None` for private/unknown tags.
pub fn tag_name(id: u16) -> Option<&'static str> {
    TAG_NAMES
        .binary_search_by_key(&id, |&(tag, _)| tag)
        .ok()
        .map(|idx| TAG_NAMES[idx].1)
}

// =============================================================================
// Compression Values
// =============================================================================

/// TIFF compression scheme identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Compression {
    /// No compression
    None = 1,
    /// CCITT modified Huffman RLE
    CcittRle = 2,
    /// CCITT Group 3 fax
    CcittFax3 = 3,
    /// CCITT Group 4 fax
    CcittFax4 = 4,
    /// LZW
    Lzw = 5,
    /// "Old-style" JPEG
    OldJpeg = 6,
    /// JPEG (TIFF technote 2)
    Jpeg = 7,
    /// Deflate with the official tag value
    AdobeDeflate = 8,
    /// Macintosh RLE
    PackBits = 32773,
    /// Deflate with the legacy private tag value
    Deflate = 32946,
    /// JPEG 2000 (Aperio)
    Jpeg2000 = 33003,
    /// SGI 32-bit log luminance
    SgiLog = 34676,
    /// SGI 24-bit log luminance
    SgiLog24 = 34677,
}

impl Compression {
    /// Create a Compression from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            2 => Some(Compression::CcittRle),
            3 => Some(Compression::CcittFax3),
            4 => Some(Compression::CcittFax4),
            5 => Some(Compression::Lzw),
            6 => Some(Compression::OldJpeg),
            7 => Some(Compression::Jpeg),
            8 => Some(Compression::AdobeDeflate),
            32773 => Some(Compression::PackBits),
            32946 => Some(Compression::Deflate),
            33003 => Some(Compression::Jpeg2000),
            34676 => Some(Compression::SgiLog),
            34677 => Some(Compression::SgiLog24),
            _ => None,
        }
    }

    /// Numeric compression id.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Whether chunks in this scheme can be decoded and encoded.
    #[inline]
    pub const fn is_supported(self) -> bool {
        matches!(
            self,
            Compression::None
                | Compression::Lzw
                | Compression::Jpeg
                | Compression::AdobeDeflate
                | Compression::PackBits
                | Compression::Deflate
        )
    }

    /// Whether the scheme is one of the SGI log-luminance codecs.
    #[inline]
    pub const fn is_sgi_log(self) -> bool {
        matches!(self, Compression::SgiLog | Compression::SgiLog24)
    }

    /// Get a human-readable name for the compression scheme.
    pub const fn name(self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::CcittRle => "CCITT RLE",
            Compression::CcittFax3 => "CCITT Group 3",
            Compression::CcittFax4 => "CCITT Group 4",
            Compression::Lzw => "LZW",
            Compression::OldJpeg => "Old JPEG",
            Compression::Jpeg => "JPEG",
            Compression::AdobeDeflate => "Adobe Deflate",
            Compression::PackBits => "PackBits",
            Compression::Deflate => "Deflate",
            Compression::Jpeg2000 => "JPEG 2000",
            Compression::SgiLog => "SGI LogL",
            Compression::SgiLog24 => "SGI LogLuv",
        }
    }
}

/// Human-readable name for a raw compression value.
pub fn compression_name(value: u16) -> String {
    Compression::from_u16(value)
        .map(|c| c.name().to_string())
        .unwrap_or_else(|| format!("Unknown ({value})"))
}

// =============================================================================
// Enumerated tag values
// =============================================================================

/// PhotometricInterpretation values.
pub mod photometric {
    pub const MIN_IS_WHITE: u16 = 0;
    pub const MIN_IS_BLACK: u16 = 1;
    pub const RGB: u16 = 2;
    pub const PALETTE: u16 = 3;
    pub const MASK: u16 = 4;
    pub const SEPARATED: u16 = 5;
    pub const YCBCR: u16 = 6;
    pub const LOGL: u16 = 32844;
    pub const LOGLUV: u16 = 32845;
}

/// PlanarConfiguration values.
pub mod planar {
    /// Samples interleaved per pixel
    pub const CONTIG: u16 = 1;
    /// One plane per sample
    pub const SEPARATE: u16 = 2;
}

/// Orientation values (origin of row 0 / column 0).
pub mod orientation {
    pub const TOP_LEFT: u16 = 1;
    pub const TOP_RIGHT: u16 = 2;
    pub const BOT_RIGHT: u16 = 3;
    pub const BOT_LEFT: u16 = 4;
    pub const LEFT_TOP: u16 = 5;
    pub const RIGHT_TOP: u16 = 6;
    pub const RIGHT_BOT: u16 = 7;
    pub const LEFT_BOT: u16 = 8;
}

/// Predictor values.
pub mod predictor {
    pub const NONE: u16 = 1;
    pub const HORIZONTAL: u16 = 2;
    pub const FLOATING_POINT: u16 = 3;
}

/// SampleFormat values.
pub mod sample_format {
    pub const UINT: u16 = 1;
    pub const INT: u16 = 2;
    pub const IEEE_FP: u16 = 3;
    pub const VOID: u16 = 4;
}

/// FillOrder values.
pub mod fill_order {
    pub const MSB_TO_LSB: u16 = 1;
    pub const LSB_TO_MSB: u16 = 2;
}

// =============================================================================
// Tests
// =============================================================================
