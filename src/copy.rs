//! Tag-preserving directory copy.
//!
//! [`TagCopier`] builds the [`DirectoryBuilder`] for an output directory
//! from a source [`Directory`]: a fixed table of descriptive tags is copied
//! as is, and the layout, compression and orientation tags are derived
//! with their own rules.

use tracing::{debug, warn};

use crate::format::tiff::{
    field_type_name, orientation, photometric, tag_name, Compression, Directory, DirectoryBuilder,
    FieldType, TagValue, TiffTag, DEFAULT_JPEG_QUALITY,
};

use self::TagCount::{Exact, Variable};

// =============================================================================
// Copy table
// =============================================================================

/// Number of values a copied tag must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagCount {
    Exact(u16),
    /// Any number of values
    Variable,
}

/// One entry of the copy table: tag id, expected count and declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyTag {
    pub id: u16,
    pub count: TagCount,
    pub field_type: FieldType,
}

const fn entry(id: u16, count: TagCount, field_type: FieldType) -> CopyTag {
    CopyTag {
        id,
        count,
        field_type,
    }
}

/// Descriptive tags copied verbatim when present on the source.
pub const COPY_TABLE: &[CopyTag] = &[
    entry(254, Exact(1), FieldType::Long),       // SubFileType
    entry(263, Exact(1), FieldType::Short),      // Threshholding
    entry(269, Exact(1), FieldType::Ascii),      // DocumentName
    entry(270, Exact(1), FieldType::Ascii),      // ImageDescription
    entry(271, Exact(1), FieldType::Ascii),      // Make
    entry(272, Exact(1), FieldType::Ascii),      // Model
    entry(280, Exact(1), FieldType::Short),      // MinSampleValue
    entry(281, Exact(1), FieldType::Short),      // MaxSampleValue
    entry(282, Exact(1), FieldType::Rational),   // XResolution
    entry(283, Exact(1), FieldType::Rational),   // YResolution
    entry(285, Exact(1), FieldType::Ascii),      // PageName
    entry(286, Exact(1), FieldType::Rational),   // XPosition
    entry(287, Exact(1), FieldType::Rational),   // YPosition
    entry(296, Exact(1), FieldType::Short),      // ResolutionUnit
    entry(305, Exact(1), FieldType::Ascii),      // Software
    entry(306, Exact(1), FieldType::Ascii),      // DateTime
    entry(315, Exact(1), FieldType::Ascii),      // Artist
    entry(316, Exact(1), FieldType::Ascii),      // HostComputer
    entry(318, Variable, FieldType::Rational),   // WhitePoint
    entry(319, Variable, FieldType::Rational),   // PrimaryChromaticities
    entry(321, Exact(2), FieldType::Short),      // HalftoneHints
    entry(332, Exact(1), FieldType::Short),      // InkSet
    entry(336, Exact(2), FieldType::Short),      // DotRange
    entry(337, Exact(1), FieldType::Ascii),      // TargetPrinter
    entry(339, Exact(1), FieldType::Short),      // SampleFormat
    entry(529, Variable, FieldType::Rational),   // YCbCrCoefficients
    entry(530, Exact(2), FieldType::Short),      // YCbCrSubsampling
    entry(531, Exact(1), FieldType::Short),      // YCbCrPositioning
    entry(532, Variable, FieldType::Rational),   // ReferenceBlackWhite
    entry(338, Variable, FieldType::Short),      // ExtraSamples
    entry(340, Exact(1), FieldType::Double),     // SMinSampleValue
    entry(341, Exact(1), FieldType::Double),     // SMaxSampleValue
    entry(37439, Exact(1), FieldType::Double),   // StoNits
];

/// Whether `value` has the shape `tag` declares.
///
/// ASCII tags hold one string whatever their byte count. A LONG entry
/// also accepts SHORT storage, since writers may pick either.
fn matches_declared(value: &TagValue, tag: &CopyTag) -> bool {
    let type_ok = match (tag.field_type, value) {
        (FieldType::Short, TagValue::Short(_)) => true,
        (FieldType::Long, TagValue::Long(_) | TagValue::Short(_)) => true,
        (FieldType::Rational, TagValue::Rational(_)) => true,
        (FieldType::Ascii, TagValue::Ascii(_)) => true,
        (FieldType::Double, TagValue::Double(_)) => true,
        _ => false,
    };
    let count_ok = match tag.count {
        _ if tag.field_type == FieldType::Ascii => true,
        Exact(n) => value.count() == n as usize,
        Variable => value.count() > 0,
    };
    type_ok && count_ok
}

// =============================================================================
// Layout defaults
// =============================================================================

/// Tile size used when neither the caller nor the source gives one.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Target strip size in bytes for the default RowsPerStrip.
pub const DEFAULT_STRIP_BYTES: usize = 8192;

/// Round a requested tile size to something a tiled directory can use.
///
/// Zero dimensions become 256 and everything is rounded up to a multiple
/// of 16.
pub fn default_tile_size(width: u32, height: u32) -> (u32, u32) {
    let round = |v: u32| {
        let v = if v == 0 { DEFAULT_TILE_SIZE } else { v };
        v.div_ceil(16) * 16
    };
    (round(width), round(height))
}

/// Rows per strip giving roughly 8 KiB strips, clamped to the image height.
pub fn default_rows_per_strip(scanline_bytes: usize, height: u32) -> u32 {
    let rows = (DEFAULT_STRIP_BYTES / scanline_bytes.max(1)).max(1);
    (rows as u32).min(height.max(1))
}

/// Map an orientation to one the output can represent.
///
/// Right-to-left and bottom-right origins are flipped to their left-hand
/// equivalent; unknown values become top-left. Both cases warn.
pub fn normalize_orientation(value: u16) -> u16 {
    match value {
        orientation::BOT_RIGHT | orientation::RIGHT_BOT => {
            warn!(orientation = value, "using bottom-left orientation");
            orientation::BOT_LEFT
        }
        orientation::TOP_LEFT
        | orientation::BOT_LEFT
        | orientation::LEFT_TOP
        | orientation::LEFT_BOT => value,
        _ => {
            warn!(orientation = value, "using top-left orientation");
            orientation::TOP_LEFT
        }
    }
}

// =============================================================================
// TagCopier
// =============================================================================

/// Copies tags from a source directory into a new output directory.
///
/// By default every derived tag follows the source; the builder methods
/// force specific values instead.
#[derive(Debug, Clone)]
pub struct TagCopier {
    compression: Option<u16>,
    fill_order: Option<u16>,
    tiled: Option<bool>,
    tile_size: Option<(u32, u32)>,
    rows_per_strip: Option<u32>,
    predictor: Option<u16>,
    jpeg_quality: u8,
}

impl Default for TagCopier {
    fn default() -> Self {
        Self::new()
    }
}

impl TagCopier {
    pub fn new() -> Self {
        Self {
            compression: None,
            fill_order: None,
            tiled: None,
            tile_size: None,
            rows_per_strip: None,
            predictor: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Write every directory with this compression.
    pub fn with_compression(mut self, compression: u16) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn with_fill_order(mut self, fill_order: u16) -> Self {
        self.fill_order = Some(fill_order);
        self
    }

    /// Force tiled output with the given tile size (rounded to multiples of 16).
    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tiled = Some(true);
        self.tile_size = Some((width, height));
        self
    }

    /// Force strip output; `rows` of 0 picks the default.
    pub fn with_strips(mut self, rows: u32) -> Self {
        self.tiled = Some(false);
        self.rows_per_strip = (rows > 0).then_some(rows);
        self
    }

    /// Predictor used with LZW and Deflate instead of the source's.
    pub fn with_predictor(mut self, predictor: u16) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Copy one tag if the source has it with the declared shape.
    ///
    /// Returns whether the tag was copied. Absent tags are skipped quietly;
    /// a type the copier cannot handle or a value of the wrong shape is
    /// skipped with a warning.
    pub fn copy_tag(&self, src: &Directory, dst: &mut DirectoryBuilder, tag: &CopyTag) -> bool {
        let Some(value) = src.get(tag.id) else {
            return false;
        };
        let name = tag_name(tag.id).unwrap_or("Unknown");
        if !matches!(
            tag.field_type,
            FieldType::Short | FieldType::Long | FieldType::Rational | FieldType::Ascii | FieldType::Double
        ) {
            warn!(
                tag = tag.id,
                name,
                field_type = tag.field_type.name(),
                "data type not supported, tag skipped"
            );
            return false;
        }
        if !matches_declared(value, tag) {
            warn!(
                tag = tag.id,
                name,
                expected = tag.field_type.name(),
                actual = field_type_name(value.field_type().as_u16()).unwrap_or("Unknown"),
                count = value.count(),
                "tag value has unexpected shape, tag skipped"
            );
            return false;
        }
        debug!(tag = tag.id, name, "copying tag");
        dst.set(tag.id, value.clone());
        true
    }

    /// Copy a tag only when present, whatever its type.
    fn copy_present(src: &Directory, dst: &mut DirectoryBuilder, tag: TiffTag) -> bool {
        match src.get_tag(tag) {
            Some(value) => {
                dst.set_tag(tag, value.clone());
                true
            }
            None => false,
        }
    }

    /// Build the output directory for `src`.
    pub fn copy_all(&self, src: &Directory) -> DirectoryBuilder {
        let mut dst = DirectoryBuilder::new(src.width(), src.height());
        dst.set_jpeg_quality(self.jpeg_quality);

        Self::copy_present(src, &mut dst, TiffTag::BitsPerSample);
        Self::copy_present(src, &mut dst, TiffTag::SamplesPerPixel);
        let samples_per_pixel = src.samples().samples_per_pixel;

        let compression = self.compression.unwrap_or_else(|| src.compression());
        dst.set_short(TiffTag::Compression, compression);

        match Compression::from_u16(compression) {
            Some(c) if c.is_sgi_log() => {
                let value = if samples_per_pixel == 1 {
                    photometric::LOGL
                } else {
                    photometric::LOGLUV
                };
                dst.set_short(TiffTag::PhotometricInterpretation, value);
            }
            _ => {
                Self::copy_present(src, &mut dst, TiffTag::PhotometricInterpretation);
            }
        }

        match self.fill_order {
            Some(fill_order) => {
                dst.set_short(TiffTag::FillOrder, fill_order);
            }
            None => {
                Self::copy_present(src, &mut dst, TiffTag::FillOrder);
            }
        }

        let source_orientation = src
            .get_u16(TiffTag::Orientation)
            .unwrap_or(orientation::TOP_LEFT);
        dst.set_short(TiffTag::Orientation, normalize_orientation(source_orientation));

        self.copy_layout(src, &mut dst);

        Self::copy_present(src, &mut dst, TiffTag::PlanarConfiguration);
        if samples_per_pixel <= 4 {
            Self::copy_present(src, &mut dst, TiffTag::TransferFunction);
        }
        Self::copy_present(src, &mut dst, TiffTag::ColorMap);

        match Compression::from_u16(compression) {
            Some(Compression::Jpeg) => {
                dst.set_jpeg_quality(self.jpeg_quality);
            }
            Some(Compression::Lzw | Compression::AdobeDeflate | Compression::Deflate) => {
                match self.predictor {
                    Some(predictor) => {
                        dst.set_short(TiffTag::Predictor, predictor);
                    }
                    None => {
                        Self::copy_present(src, &mut dst, TiffTag::Predictor);
                    }
                }
            }
            Some(Compression::CcittFax3 | Compression::CcittFax4) => {
                if compression == Compression::CcittFax3.as_u16() {
                    Self::copy_present(src, &mut dst, TiffTag::Group3Options);
                } else {
                    Self::copy_present(src, &mut dst, TiffTag::Group4Options);
                }
                for tag in [
                    TiffTag::BadFaxLines,
                    TiffTag::CleanFaxData,
                    TiffTag::ConsecutiveBadFaxLines,
                    TiffTag::FaxRecvParams,
                    TiffTag::FaxRecvTime,
                    TiffTag::FaxSubAddress,
                ] {
                    Self::copy_present(src, &mut dst, tag);
                }
            }
            _ => {}
        }

        Self::copy_present(src, &mut dst, TiffTag::IccProfile);
        if Self::copy_present(src, &mut dst, TiffTag::NumberOfInks) {
            Self::copy_present(src, &mut dst, TiffTag::InkNames);
        }
        Self::copy_present(src, &mut dst, TiffTag::PageNumber);

        let copied = COPY_TABLE
            .iter()
            .filter(|tag| self.copy_tag(src, &mut dst, tag))
            .count();
        debug!(
            directory = src.index(),
            copied,
            compression,
            tiled = dst.is_tiled(),
            "copied directory tags"
        );
        dst
    }

    fn copy_layout(&self, src: &Directory, dst: &mut DirectoryBuilder) {
        let tiled = self.tiled.unwrap_or_else(|| src.is_tiled());
        if tiled {
            let (w, h) = self.tile_size.unwrap_or_else(|| {
                (
                    src.get_u32(TiffTag::TileWidth).unwrap_or(0),
                    src.get_u32(TiffTag::TileLength).unwrap_or(0),
                )
            });
            let (w, h) = default_tile_size(w, h);
            dst.set_tiled(w, h);
        } else {
            let rows = self
                .rows_per_strip
                .or_else(|| src.get_u32(TiffTag::RowsPerStrip))
                .unwrap_or_else(|| default_rows_per_strip(src.scanline_len(), src.height()));
            dst.set_rows_per_strip(rows.min(src.height()).max(1));
        }
    }
}
