//! Directory geometry for the raster paths.

use serde::Serialize;
use tracing::warn;

use crate::error::PreconditionError;
use crate::format::tiff::{
    photometric, planar, sample_format, ChunkLayout, Directory, TiffTag,
};

use super::Mode;

/// Geometry and pixel-encoding tags of one directory.
///
/// Optional tags that are missing are replaced by their TIFF defaults and
/// reported with a warning. Built once per directory and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryModel {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// 0 when the directory is organized in strips
    pub tile_width: u32,
    /// 0 when the directory is organized in strips
    pub tile_height: u32,
    pub bits_per_sample: u16,
    pub samples_per_pixel: u16,
    pub photometric: u16,
    pub planar_config: u16,
    pub sample_format: u16,
    pub compression: u16,
}

impl DirectoryModel {
    pub const DEFAULT_SAMPLES_PER_PIXEL: u16 = 1;
    pub const DEFAULT_BITS_PER_SAMPLE: u16 = 8;
    pub const DEFAULT_PHOTOMETRIC: u16 = photometric::MIN_IS_BLACK;
    pub const DEFAULT_PLANAR_CONFIG: u16 = planar::CONTIG;
    pub const DEFAULT_SAMPLE_FORMAT: u16 = sample_format::UINT;

    /// Read the geometry of `dir`.
    pub fn from_directory(dir: &Directory) -> Self {
        let index = dir.index();
        let optional = |tag: TiffTag, default: u16| -> u16 {
            dir.get_u16(tag).unwrap_or_else(|| {
                warn!(
                    directory = index,
                    tag = tag.name(),
                    default,
                    "tag missing, using default"
                );
                default
            })
        };

        let samples_per_pixel = optional(TiffTag::SamplesPerPixel, Self::DEFAULT_SAMPLES_PER_PIXEL);
        let bits_per_sample = optional(TiffTag::BitsPerSample, Self::DEFAULT_BITS_PER_SAMPLE);
        let photometric = optional(TiffTag::PhotometricInterpretation, Self::DEFAULT_PHOTOMETRIC);
        let planar_config = optional(TiffTag::PlanarConfiguration, Self::DEFAULT_PLANAR_CONFIG);
        let sample_format = optional(TiffTag::SampleFormat, Self::DEFAULT_SAMPLE_FORMAT);

        let (tile_width, tile_height) = match dir.layout() {
            ChunkLayout::Tiled {
                tile_width,
                tile_height,
                ..
            } => (tile_width, tile_height),
            ChunkLayout::Strips { .. } => (0, 0),
        };

        Self {
            index,
            width: dir.width(),
            height: dir.height(),
            tile_width,
            tile_height,
            bits_per_sample,
            samples_per_pixel,
            photometric,
            planar_config,
            sample_format,
            compression: dir.compression(),
        }
    }

    pub fn is_tiled(&self) -> bool {
        self.tile_width > 0 && self.tile_height > 0
    }

    /// Mode derived from samples per pixel and bits per sample.
    pub fn mode(&self) -> Result<Mode, PreconditionError> {
        Mode::from_samples(self.samples_per_pixel, self.bits_per_sample)
    }

    /// Mode, checked against the stored layout so pixels can be copied as is.
    ///
    /// # Errors
    /// - `UnsupportedMode` if no mode matches
    /// - `UnsupportedLayout` for separate sample planes or when the stored
    ///   samples do not have the mode's shape
    pub fn raster_mode(&self) -> Result<Mode, PreconditionError> {
        let mode = self.mode()?;
        let layout_error = |reason: String| PreconditionError::UnsupportedLayout {
            directory: self.index,
            reason,
        };

        if self.planar_config == planar::SEPARATE && self.samples_per_pixel > 1 {
            return Err(layout_error("separate sample planes".to_string()));
        }
        if mode.channels() != self.samples_per_pixel as usize
            || mode.bits_per_sample() != self.bits_per_sample
        {
            return Err(layout_error(format!(
                "{} sample(s) of {} bits stored, {} expects {} of {}",
                self.samples_per_pixel,
                self.bits_per_sample,
                mode,
                mode.channels(),
                mode.bits_per_sample()
            )));
        }
        Ok(mode)
    }

    /// Whether this is an 8-bit, single sample, min-is-black directory.
    pub fn is_gray8(&self) -> bool {
        self.bits_per_sample == 8
            && self.samples_per_pixel == 1
            && self.photometric == photometric::MIN_IS_BLACK
    }

    /// Fail unless this is an 8-bit min-is-black directory.
    pub fn require_gray8(&self) -> Result<(), PreconditionError> {
        if self.is_gray8() {
            Ok(())
        } else {
            Err(PreconditionError::NotGray8 {
                directory: self.index,
                bits: self.bits_per_sample,
                photometric: self.photometric,
            })
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::tiff::TagValue;
    use std::collections::BTreeMap;

    fn directory(extra: &[(u16, TagValue)]) -> Directory {
        let mut tags = BTreeMap::new();
        tags.insert(256, TagValue::Long(vec![20]));
        tags.insert(257, TagValue::Long(vec![10]));
        tags.insert(273, TagValue::Long(vec![8]));
        tags.insert(279, TagValue::Long(vec![200]));
        for (id, value) in extra {
            tags.insert(*id, value.clone());
        }
        Directory::from_tags(0, 8, tags).unwrap()
    }

    #[test]
    fn test_defaults_when_tags_missing() {
        let model = DirectoryModel::from_directory(&directory(&[]));
        assert_eq!(model.samples_per_pixel, 1);
        assert_eq!(model.bits_per_sample, 8);
        assert_eq!(model.photometric, photometric::MIN_IS_BLACK);
        assert_eq!(model.planar_config, planar::CONTIG);
        assert_eq!(model.sample_format, sample_format::UINT);
        assert!(!model.is_tiled());
        assert_eq!(model.raster_mode().unwrap(), Mode::Gray8);
        assert!(model.is_gray8());
    }

    #[test]
    fn test_rgb_model() {
        let model = DirectoryModel::from_directory(&directory(&[
            (258, TagValue::Short(vec![8, 8, 8])),
            (277, TagValue::Short(vec![3])),
            (262, TagValue::Short(vec![2])),
        ]));
        assert_eq!(model.raster_mode().unwrap(), Mode::Rgb8);
        assert_eq!(
            model.require_gray8(),
            Err(PreconditionError::NotGray8 {
                directory: 0,
                bits: 8,
                photometric: 2
            })
        );
    }

    #[test]
    fn test_layout_mismatch_rejected() {
        // Four 8-bit samples derive Gray8, which cannot hold them
        let model = DirectoryModel::from_directory(&directory(&[
            (258, TagValue::Short(vec![8, 8, 8, 8])),
            (277, TagValue::Short(vec![4])),
        ]));
        assert_eq!(model.mode().unwrap(), Mode::Gray8);
        assert!(matches!(
            model.raster_mode(),
            Err(PreconditionError::UnsupportedLayout { .. })
        ));

        let model = DirectoryModel::from_directory(&directory(&[
            (258, TagValue::Short(vec![16, 16, 16])),
            (277, TagValue::Short(vec![3])),
        ]));
        assert!(model.raster_mode().is_err());
    }

    #[test]
    fn test_sample_format_read_when_present() {
        let model = DirectoryModel::from_directory(&directory(&[
            (258, TagValue::Short(vec![32])),
            (339, TagValue::Short(vec![sample_format::IEEE_FP])),
        ]));
        assert_eq!(model.sample_format, sample_format::IEEE_FP);
        assert_eq!(model.raster_mode().unwrap(), Mode::Gray32);
    }

    #[test]
    fn test_white_is_zero_is_not_gray8() {
        let model = DirectoryModel::from_directory(&directory(&[(262, TagValue::Short(vec![0]))]));
        assert!(!model.is_gray8());
        assert_eq!(model.raster_mode().unwrap(), Mode::Gray8);
    }
}
